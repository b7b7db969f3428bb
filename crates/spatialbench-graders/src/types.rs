//! Grader identity and task-level grader configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::GraderError;

/// Structured answer written by an agent. No fixed schema; each grader
/// declares the fields it requires.
pub type AgentAnswer = serde_json::Map<String, Value>;

/// Closed set of grader strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraderKind {
    NumericTolerance,
    LabelSetJaccard,
    DistributionComparison,
    MarkerGenePrecisionRecall,
    MarkerGeneSeparation,
    SpatialAdjacency,
    MultipleChoice,
}

impl GraderKind {
    /// Type tag used in task specs
    pub fn as_str(&self) -> &'static str {
        match self {
            GraderKind::NumericTolerance => "numeric_tolerance",
            GraderKind::LabelSetJaccard => "label_set_jaccard",
            GraderKind::DistributionComparison => "distribution_comparison",
            GraderKind::MarkerGenePrecisionRecall => "marker_gene_precision_recall",
            GraderKind::MarkerGeneSeparation => "marker_gene_separation",
            GraderKind::SpatialAdjacency => "spatial_adjacency",
            GraderKind::MultipleChoice => "multiple_choice",
        }
    }

    /// Get all grader kinds
    pub fn all() -> &'static [GraderKind] {
        &[
            GraderKind::NumericTolerance,
            GraderKind::LabelSetJaccard,
            GraderKind::DistributionComparison,
            GraderKind::MarkerGenePrecisionRecall,
            GraderKind::MarkerGeneSeparation,
            GraderKind::SpatialAdjacency,
            GraderKind::MultipleChoice,
        ]
    }
}

impl fmt::Display for GraderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraderKind {
    type Err = GraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GraderKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| GraderError::UnknownType(s.to_string()))
    }
}

/// Grader section of a task spec: `{"type": ..., "config": {...}}`.
///
/// The type is kept as a raw string so that an unknown type survives parsing
/// and is reported at grading time instead of rejecting the whole spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraderSpec {
    #[serde(rename = "type")]
    pub grader_type: String,

    #[serde(default = "empty_config")]
    pub config: Value,
}

fn empty_config() -> Value {
    Value::Object(serde_json::Map::new())
}

impl GraderSpec {
    /// Create a grader spec
    pub fn new(grader_type: impl Into<String>, config: Value) -> Self {
        Self {
            grader_type: grader_type.into(),
            config,
        }
    }

    /// Resolve the grader type, if it names a built-in strategy
    pub fn kind(&self) -> Result<GraderKind, GraderError> {
        self.grader_type.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trips_through_tag() {
        for kind in GraderKind::all() {
            assert_eq!(kind.as_str().parse::<GraderKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "fuzzy_match".parse::<GraderKind>().unwrap_err();
        assert_eq!(err, GraderError::UnknownType("fuzzy_match".into()));
    }

    #[test]
    fn test_spec_config_defaults_to_empty_object() {
        let spec: GraderSpec = serde_json::from_value(json!({"type": "multiple_choice"})).unwrap();
        assert_eq!(spec.config, json!({}));
        assert_eq!(spec.kind().unwrap(), GraderKind::MultipleChoice);
    }
}
