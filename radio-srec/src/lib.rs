//! radio-srec: unattended recorder for scheduled internet radio programs.
//!
//! Every station runs its own worker that walks the program schedule and
//! records each program to a file, reconnecting on transient failures.
//! Stations of the same provider share one credential refresh coordinator.

pub mod app;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod scheduler;
pub mod station;
pub mod utils;

pub use error::{Error, Result};
