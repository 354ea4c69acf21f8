//! Error types for the tool layer.

use std::time::Duration;

use debai_core::error::DebaiError;

use crate::types::{Arguments, ToolKind};

/// Errors from resolving and invoking tools.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: ToolKind, reason: String },
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Errors from turning free text into validated arguments.
///
/// `partial` carries whatever was extracted so the conversation can
/// continue from it on the next turn.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Missing required parameters for {tool}: {}", .missing.join(", "))]
    Incomplete {
        tool: ToolKind,
        missing: Vec<String>,
        partial: Arguments,
    },
    #[error("Cannot tell {} apart in \"{span}\"", .params.join(" and "))]
    Ambiguous {
        tool: ToolKind,
        params: Vec<String>,
        span: String,
        partial: Arguments,
    },
    #[error("Extraction failed: {0}")]
    Oracle(#[from] CompletionError),
}

impl ExtractionError {
    /// The partially extracted arguments, if any.
    pub fn partial(&self) -> Option<&Arguments> {
        match self {
            ExtractionError::Incomplete { partial, .. }
            | ExtractionError::Ambiguous { partial, .. } => Some(partial),
            ExtractionError::Oracle(_) => None,
        }
    }
}

/// Failures reported by the email, directory and document collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Email delivery failed: {0}")]
    Delivery(String),
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error("Document generation failed: {0}")]
    Generation(String),
    #[error("No employees matched '{0}'")]
    NoMatch(String),
    #[error("Employee '{0}' not found")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl CollaboratorError {
    /// True for failures of the backing service itself, as opposed to
    /// problems with the request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, CollaboratorError::Unavailable(_))
    }
}

impl From<DebaiError> for CollaboratorError {
    fn from(err: DebaiError) -> Self {
        match err {
            DebaiError::Duplicate(msg) => CollaboratorError::Duplicate(msg),
            DebaiError::NotFound(name) => CollaboratorError::NotFound(name),
            other => CollaboratorError::Unavailable(other.to_string()),
        }
    }
}

/// Errors from the completion service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion service timed out after {0:?}")]
    Timeout(Duration),
    #[error("Completion service unreachable: {0}")]
    Unreachable(String),
    #[error("Completion service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed completion output: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Transport failures may succeed on retry; malformed output will not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CompletionError::Malformed(_))
    }
}
