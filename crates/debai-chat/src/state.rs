//! Turn state machine with validated transitions.
//!
//! Received -> Routed -> ArgsExtracted -> Invoked -> Replied -> Logged
//! Routed -> Replied (conversational answer)
//! Routed / ArgsExtracted -> Failed

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Received,
    Routed,
    ArgsExtracted,
    Invoked,
    Replied,
    Logged,
    Failed,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Received => "received",
            TurnState::Routed => "routed",
            TurnState::ArgsExtracted => "args_extracted",
            TurnState::Invoked => "invoked",
            TurnState::Replied => "replied",
            TurnState::Logged => "logged",
            TurnState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Logged | TurnState::Failed)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate that a state transition is allowed.
pub fn validate_transition(from: TurnState, to: TurnState) -> Result<(), ChatError> {
    let valid = matches!(
        (from, to),
        (TurnState::Received, TurnState::Routed)
            | (TurnState::Routed, TurnState::ArgsExtracted)
            | (TurnState::Routed, TurnState::Replied)
            | (TurnState::Routed, TurnState::Failed)
            | (TurnState::ArgsExtracted, TurnState::Invoked)
            | (TurnState::ArgsExtracted, TurnState::Failed)
            | (TurnState::Invoked, TurnState::Replied)
            | (TurnState::Replied, TurnState::Logged)
    );

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition { from, to })
    }
}

/// The states one turn has visited, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTrace {
    visited: Vec<TurnState>,
}

impl TurnTrace {
    pub fn new() -> Self {
        Self {
            visited: vec![TurnState::Received],
        }
    }

    pub fn current(&self) -> TurnState {
        self.visited
            .last()
            .copied()
            .unwrap_or(TurnState::Received)
    }

    pub fn advance(&mut self, to: TurnState) -> Result<(), ChatError> {
        validate_transition(self.current(), to)?;
        self.visited.push(to);
        Ok(())
    }

    pub fn visited(&self) -> &[TurnState] {
        &self.visited
    }

    pub fn into_visited(self) -> Vec<TurnState> {
        self.visited
    }
}

impl Default for TurnTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- valid transitions ----

    #[test]
    fn test_tool_path() {
        let mut trace = TurnTrace::new();
        for to in [
            TurnState::Routed,
            TurnState::ArgsExtracted,
            TurnState::Invoked,
            TurnState::Replied,
            TurnState::Logged,
        ] {
            trace.advance(to).unwrap();
        }
        assert_eq!(trace.current(), TurnState::Logged);
        assert_eq!(trace.visited().len(), 6);
        assert!(trace.current().is_terminal());
    }

    #[test]
    fn test_conversational_path() {
        assert!(validate_transition(TurnState::Routed, TurnState::Replied).is_ok());
    }

    #[test]
    fn test_failure_paths() {
        assert!(validate_transition(TurnState::Routed, TurnState::Failed).is_ok());
        assert!(validate_transition(TurnState::ArgsExtracted, TurnState::Failed).is_ok());
    }

    // ---- invalid transitions ----

    #[test]
    fn test_skipping_states_rejected() {
        assert!(validate_transition(TurnState::Received, TurnState::Invoked).is_err());
        assert!(validate_transition(TurnState::Routed, TurnState::Invoked).is_err());
        assert!(validate_transition(TurnState::Invoked, TurnState::Failed).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for to in [TurnState::Received, TurnState::Routed, TurnState::Logged] {
            assert!(validate_transition(TurnState::Failed, to).is_err());
            assert!(validate_transition(TurnState::Logged, to).is_err());
        }
    }

    #[test]
    fn test_rejected_advance_leaves_trace_unchanged() {
        let mut trace = TurnTrace::new();
        let err = trace.advance(TurnState::Replied).unwrap_err();
        assert!(matches!(
            err,
            ChatError::InvalidTransition {
                from: TurnState::Received,
                to: TurnState::Replied
            }
        ));
        assert_eq!(trace.visited(), &[TurnState::Received]);
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&TurnState::ArgsExtracted).unwrap(),
            "\"args_extracted\""
        );
    }
}
