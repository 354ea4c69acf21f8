//! Collaborator contracts and typed tool dispatch.
//!
//! Each [`ToolCall`] variant has exactly one handler function. The
//! [`ActionDispatcher`] owns the collaborators and routes a call to its
//! handler with an exhaustive match.

pub mod document;
pub mod email;
pub mod employee;
pub mod render;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::CollaboratorError;
use crate::types::{ActionResult, ToolCall};

pub use document::{DocumentRenderer, FileRenderer};
pub use email::{EmailSender, OutboxMailer, OutgoingEmail, SmtpMailer};
pub use employee::{EmployeeDirectory, SqliteDirectory};

/// Per-turn inputs that do not come from the extracted arguments.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub session: String,
    /// Files uploaded in this session, attached to outgoing email.
    pub attachments: Vec<PathBuf>,
    /// Where generated documents for this session go.
    pub output_dir: PathBuf,
}

pub struct ActionDispatcher {
    mailer: Arc<dyn EmailSender>,
    directory: Arc<dyn EmployeeDirectory>,
    renderer: Arc<dyn DocumentRenderer>,
    sender_name: String,
}

impl ActionDispatcher {
    pub fn new(
        mailer: Arc<dyn EmailSender>,
        directory: Arc<dyn EmployeeDirectory>,
        renderer: Arc<dyn DocumentRenderer>,
        sender_name: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            directory,
            renderer,
            sender_name: sender_name.into(),
        }
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn directory(&self) -> &Arc<dyn EmployeeDirectory> {
        &self.directory
    }

    /// Invoke the collaborator for `call`.
    pub async fn dispatch(
        &self,
        call: ToolCall,
        ctx: &DispatchContext,
    ) -> Result<ActionResult, CollaboratorError> {
        let tool = call.kind();
        debug!(session = %ctx.session, tool = %tool, "Dispatching tool call");

        let detail = match &call {
            ToolCall::SendEmail { to, draft } => {
                email::send_one(
                    self.mailer.as_ref(),
                    to,
                    draft,
                    &self.sender_name,
                    &ctx.attachments,
                )
                .await
            }
            ToolCall::EmailEmployees { recipients, draft } => {
                email::broadcast(
                    self.mailer.as_ref(),
                    self.directory.as_ref(),
                    recipients,
                    draft,
                    &self.sender_name,
                    &ctx.attachments,
                )
                .await
            }
            ToolCall::AddEmployee(employee) => {
                employee::add_employee(self.directory.as_ref(), employee).await
            }
            ToolCall::UpdateEmployee(update) => {
                employee::update_employee(self.directory.as_ref(), update).await
            }
            ToolCall::DeleteEmployee { name } => {
                employee::delete_employee(self.directory.as_ref(), name).await
            }
            ToolCall::ListEmployees(filter) => {
                employee::list_employees(self.directory.as_ref(), filter).await
            }
            ToolCall::CreateDocument(request) => {
                document::create_document(self.renderer.as_ref(), request, &ctx.output_dir).await
            }
        };

        match detail {
            Ok(detail) => Ok(ActionResult { tool, detail }),
            Err(e) => {
                warn!(session = %ctx.session, tool = %tool, error = %e, "Tool call failed");
                Err(e)
            }
        }
    }
}
