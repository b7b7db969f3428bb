//! SpatialBench grading engine
//!
//! Scores structured agent answers for spatial transcriptomics evaluations.
//!
//! # Features
//!
//! - **Answer extraction**: recover the `<EVAL_ANSWER>` payload submitted
//!   through the `submit_response` tool from a typed transcript
//! - **Scoring strategies**: numeric tolerance, label set Jaccard, cell type
//!   distribution, marker gene precision/recall and separation, spatial
//!   adjacency, multiple choice
//! - **Safe boundary**: the registry turns unknown grader types, malformed
//!   answers and grader panics into result records instead of errors
//!
//! # Example
//!
//! ```rust,ignore
//! use spatialbench_graders::{GraderRegistry, GraderSpec};
//!
//! let registry = GraderRegistry::builtin();
//! let spec = GraderSpec::new("multiple_choice", serde_json::json!({"correct_answer": "B"}));
//! let outcome = registry.grade_answer(&spec, &answer);
//! println!("{}", outcome.result().reasoning);
//! ```

pub mod error;
mod fields;
pub mod graders;
pub mod registry;
pub mod result;
pub mod transcript;
pub mod types;

// Re-exports for convenience
pub use error::{GraderError, GraderOutcome};
pub use graders::{
    DistributionComparisonGrader, Grader, LabelSetJaccardGrader, MarkerGenePrecisionRecallGrader,
    MarkerGeneSeparationGrader, MultipleChoiceGrader, NumericToleranceGrader,
    SpatialAdjacencyGrader, grader_for,
};
pub use registry::{GradeOutcome, GraderRegistry};
pub use result::{GraderResult, Metrics};
pub use transcript::{ContentBlock, Message, Role, Transcript, extract_answer};
pub use types::{AgentAnswer, GraderKind, GraderSpec};
