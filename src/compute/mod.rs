//! Background compute execution.

mod worker;

pub use worker::{ComputeWorker, ComputeWorkerConfig};
