//! Completion service contract.
//!
//! The agent loop asks a completion service two things: which tool (if
//! any) a message calls for, and what argument values the message
//! contains. Implementations range from a hosted chat-completions model
//! to a deterministic keyword router.

pub mod keyword;
pub mod openai;
pub mod retry;

use async_trait::async_trait;
use serde_json::{Map, Value};

use debai_core::types::Turn;

use crate::error::CompletionError;
use crate::types::ToolDeclaration;

pub use keyword::KeywordRouter;
pub use openai::OpenAiCompatible;
pub use retry::RetryingCompletion;

/// Everything the service sees when selecting a tool.
#[derive(Debug, Clone, Copy)]
pub struct RoutingRequest<'a> {
    pub message: &'a str,
    /// Recent turns, oldest first.
    pub context: &'a [Turn],
    pub summary: Option<&'a str>,
    pub menu: &'a [ToolDeclaration],
}

/// A tool chosen by name, with the service's confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolChoice {
    pub name: String,
    pub confidence: f32,
}

/// Routing decision: call a tool, or just answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Routing {
    Tool(ToolChoice),
    Reply(String),
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &str;

    /// Select zero or one tool for the message.
    async fn select_tool(&self, request: &RoutingRequest<'_>) -> Result<Routing, CompletionError>;

    /// Extract raw parameter values for `decl` from `text`. Keys are
    /// parameter names; values are unvalidated.
    async fn extract(
        &self,
        text: &str,
        decl: &ToolDeclaration,
    ) -> Result<Map<String, Value>, CompletionError>;
}
