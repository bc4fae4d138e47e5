//! Multi-threaded broadcast workload.

mod runner;
mod stats;

pub use runner::{Workload, WorkloadConfig};
pub use stats::RunStats;
