//! Tools for the DebAI assistant.
//!
//! Declares the tool menu, extracts typed arguments from free text, talks
//! to the completion service, and dispatches tool calls to the email,
//! employee and document collaborators.

pub mod completion;
pub mod error;
pub mod extract;
pub mod handler;
pub mod registry;
pub mod signature;
pub mod types;

pub use completion::{
    CompletionService, KeywordRouter, OpenAiCompatible, RetryingCompletion, Routing,
    RoutingRequest, ToolChoice,
};
pub use error::{ActionError, CollaboratorError, CompletionError, ExtractionError};
pub use extract::ParameterExtractor;
pub use handler::{
    ActionDispatcher, DispatchContext, DocumentRenderer, EmailSender, EmployeeDirectory,
    FileRenderer, OutboxMailer, SmtpMailer, SqliteDirectory,
};
pub use registry::ToolRegistry;
pub use types::{
    ActionDetail, ActionResult, ArgValue, Arguments, DocumentFormat, DocumentRequest, ParamSpec,
    ParamType, ToolCall, ToolDeclaration, ToolKind,
};
