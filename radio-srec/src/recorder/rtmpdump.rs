//! `rtmpdump` child process as a transport.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use process_utils::tokio_command;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tracing::{debug, warn};

use super::transport::{TransportConnector, TransportError, TransportStream};

/// Size of the first read, which decides whether a connection came up.
const FIRST_READ_SIZE: usize = 4096;

pub struct RtmpdumpConnector {
    program: PathBuf,
    connect_timeout: Duration,
}

impl RtmpdumpConnector {
    pub fn new(program: impl Into<PathBuf>, connect_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl TransportConnector for RtmpdumpConnector {
    /// Spawn `rtmpdump -q -i <locator> -o -` and wait for its first bytes.
    async fn connect(&self, locator: &str) -> Result<Box<dyn TransportStream>, TransportError> {
        let mut child = tokio_command(&self.program)
            .args(["-q", "-i", locator, "-o", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(TransportError::Spawn)?;

        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill().await;
            return Err(TransportError::Connect("stdout not captured".to_string()));
        };

        let mut first = vec![0u8; FIRST_READ_SIZE];
        let read = tokio::time::timeout(self.connect_timeout, stdout.read(&mut first)).await;

        match read {
            Ok(Ok(0)) => {
                let status = child.wait().await.ok();
                Err(TransportError::Connect(format!(
                    "{} exited before sending data ({})",
                    self.program.display(),
                    status.map_or_else(|| "unknown status".to_string(), |s| s.to_string())
                )))
            }
            Ok(Ok(n)) => {
                first.truncate(n);
                debug!(pid = ?child.id(), bytes = n, "rtmpdump connected");
                Ok(Box::new(RtmpdumpStream {
                    child,
                    stdout,
                    pending: first,
                    pending_offset: 0,
                    closed: false,
                }))
            }
            Ok(Err(e)) => {
                let _ = child.kill().await;
                Err(TransportError::Read(e))
            }
            Err(_) => {
                let _ = child.kill().await;
                Err(TransportError::Timeout(self.connect_timeout))
            }
        }
    }
}

struct RtmpdumpStream {
    child: Child,
    stdout: ChildStdout,
    /// Bytes from the first read, handed out before reading stdout again.
    pending: Vec<u8>,
    pending_offset: usize,
    closed: bool,
}

#[async_trait]
impl TransportStream for RtmpdumpStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        if self.pending_offset < self.pending.len() {
            let rest = &self.pending[self.pending_offset..];
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.pending_offset += n;
            return Ok(n);
        }

        self.stdout.read(buf).await.map_err(TransportError::Read)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "Failed to stop rtmpdump");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_tool(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("rtmpdump");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_first_bytes_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "printf 'FLV'; sleep 1; printf 'DATA'");
        let connector = RtmpdumpConnector::new(tool, Duration::from_secs(10));

        let mut stream = connector.connect("rtmpe://example/live").await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 2];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"FLVDATA");

        stream.close().await;
        assert!(matches!(stream.read(&mut buf).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_immediate_exit_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "exit 1");
        let connector = RtmpdumpConnector::new(tool, Duration::from_secs(10));

        let result = connector.connect("rtmpe://example/live").await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_missing_tool_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let connector = RtmpdumpConnector::new(dir.path().join("absent"), Duration::from_secs(1));

        let result = connector.connect("rtmpe://example/live").await;
        assert!(matches!(result, Err(TransportError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_silent_tool_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_tool(dir.path(), "sleep 5");
        let connector = RtmpdumpConnector::new(tool, Duration::from_millis(200));

        let result = connector.connect("rtmpe://example/live").await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }
}
