//! Byte transport from a live stream.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to start transport: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("connection closed")]
    Closed,
    #[error("no data within {0:?}")]
    Timeout(Duration),
}

/// Opens connections to a stream locator.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, locator: &str) -> Result<Box<dyn TransportStream>, TransportError>;
}

/// One open connection.
#[async_trait]
pub trait TransportStream: Send {
    /// Read the next bytes into `buf`. `Ok(0)` means the stream ended; either
    /// that or an error means the connection must be discarded.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Tear the connection down. Safe to call more than once.
    async fn close(&mut self);
}
