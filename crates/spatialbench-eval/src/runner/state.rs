//! Evaluation state machine states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a single evaluation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvalState {
    Init,
    StageData,
    InvokeAgent,
    CollectAnswer,
    Grade,
    Cleanup,
    Done,
}

impl EvalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalState::Init => "INIT",
            EvalState::StageData => "STAGE_DATA",
            EvalState::InvokeAgent => "INVOKE_AGENT",
            EvalState::CollectAnswer => "COLLECT_ANSWER",
            EvalState::Grade => "GRADE",
            EvalState::Cleanup => "CLEANUP",
            EvalState::Done => "DONE",
        }
    }

    /// Next state on the normal path
    pub fn next(&self) -> Option<EvalState> {
        match self {
            EvalState::Init => Some(EvalState::StageData),
            EvalState::StageData => Some(EvalState::InvokeAgent),
            EvalState::InvokeAgent => Some(EvalState::CollectAnswer),
            EvalState::CollectAnswer => Some(EvalState::Grade),
            EvalState::Grade => Some(EvalState::Cleanup),
            EvalState::Cleanup => Some(EvalState::Done),
            EvalState::Done => None,
        }
    }
}

impl fmt::Display for EvalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_reaches_done() {
        let mut state = EvalState::Init;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            state = next;
            visited.push(state);
        }
        assert_eq!(visited.len(), 7);
        assert_eq!(state, EvalState::Done);
        assert_eq!(EvalState::CollectAnswer.to_string(), "COLLECT_ANSWER");
    }
}
