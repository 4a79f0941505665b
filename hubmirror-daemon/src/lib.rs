//! Periodic sync runner: one pipeline run per interval until ctrl-c.

mod error;
pub mod paths;
mod runtime;

pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_schedule, start_blocking, ScheduleStats};
