//! Station workers and their supervisor.

mod supervisor;
mod worker;

pub use supervisor::{Supervisor, SupervisorConfig, SupervisorReport};
pub use worker::{StationWorker, WorkerReport};
