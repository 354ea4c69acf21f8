//! Error types for the chat engine.

use std::time::Duration;

use debai_action::error::{CollaboratorError, CompletionError};
use debai_core::error::DebaiError;

use crate::state::TurnState;

/// Errors from the chat engine. Everything the user can fix by
/// rephrasing is a reply, not an error; these are the rest.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("invalid turn transition: {from} -> {to}")]
    InvalidTransition { from: TurnState, to: TurnState },
    #[error("completion service timed out after {0:?}")]
    TransportTimeout(Duration),
    #[error("completion service error: {0}")]
    Upstream(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("invalid file: {0}")]
    InvalidFile(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CompletionError> for ChatError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Timeout(after) => ChatError::TransportTimeout(after),
            other => ChatError::Upstream(other.to_string()),
        }
    }
}

impl From<CollaboratorError> for ChatError {
    fn from(err: CollaboratorError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<DebaiError> for ChatError {
    fn from(err: DebaiError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(4000).to_string(),
            "message exceeds maximum length of 4000 characters"
        );
        let err = ChatError::InvalidTransition {
            from: TurnState::Received,
            to: TurnState::Invoked,
        };
        assert_eq!(err.to_string(), "invalid turn transition: received -> invoked");
    }

    #[test]
    fn test_from_completion_error() {
        let err: ChatError = CompletionError::Timeout(Duration::from_secs(30)).into();
        assert!(matches!(err, ChatError::TransportTimeout(d) if d == Duration::from_secs(30)));

        let err: ChatError = CompletionError::Unreachable("refused".to_string()).into();
        assert!(matches!(err, ChatError::Upstream(_)));
    }

    #[test]
    fn test_from_collaborator_error() {
        let err: ChatError = CollaboratorError::Unavailable("db locked".to_string()).into();
        assert_eq!(err.to_string(), "storage error: Service unavailable: db locked");
    }
}
