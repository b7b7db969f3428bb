//! Batch execution

mod coordinator;
mod worker;

pub use coordinator::{
    BatchCoordinator, BatchProgress, ProgressCallback, SUMMARY_FILE, new_run_id,
};
pub use worker::{EvalWorker, InProcessWorker, ProcessWorker};
