//! SpatialBench
//!
//! Benchmark harness for autonomous spatial-omics analysis agents. The
//! evaluation harness lives in [`eval`], the grading engine in [`graders`].

pub use spatialbench_eval as eval;
pub use spatialbench_graders as graders;
