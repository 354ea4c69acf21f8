//! Email delivery.
//!
//! [`SmtpMailer`] sends through an SMTP relay with STARTTLS;
//! [`OutboxMailer`] writes RFC 5322 `.eml` files to a directory instead,
//! for offline runs and tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};
use uuid::Uuid;

use debai_core::config::EmailConfig;
use debai_core::types::{Employee, EmployeeFilter};

use crate::error::CollaboratorError;
use crate::extract::schema::is_email;
use crate::handler::employee::EmployeeDirectory;
use crate::signature;
use crate::types::{ActionDetail, EmailDraft, SkippedRecipient};

/// A fully composed email, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, email: &OutgoingEmail) -> Result<(), CollaboratorError>;
}

fn sender_mailbox(config: &EmailConfig) -> Result<Mailbox, CollaboratorError> {
    let address = config
        .sender_address
        .parse()
        .map_err(|e| CollaboratorError::Unavailable(format!("invalid sender address: {}", e)))?;
    Ok(Mailbox::new(Some(config.sender_name.clone()), address))
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Build the MIME message, reading attachments from disk.
async fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<Message, CollaboratorError> {
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| CollaboratorError::Delivery(format!("invalid recipient '{}': {}", email.to, e)))?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.clone());

    let message = if email.attachments.is_empty() {
        builder.singlepart(SinglePart::plain(email.body.clone()))
    } else {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(email.body.clone()));
        for path in &email.attachments {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                CollaboratorError::Delivery(format!("cannot read attachment {}: {}", path.display(), e))
            })?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());
            let content_type = ContentType::parse(content_type_for(path))
                .map_err(|e| CollaboratorError::Delivery(e.to_string()))?;
            parts = parts.singlepart(Attachment::new(filename).body(bytes, content_type));
        }
        builder.multipart(parts)
    };

    message.map_err(|e| CollaboratorError::Delivery(e.to_string()))
}

// =============================================================================
// SMTP
// =============================================================================

/// Sends mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig, password: String) -> Result<Self, CollaboratorError> {
        let username = if config.username.is_empty() {
            config.sender_address.clone()
        } else {
            config.username.clone()
        };
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| CollaboratorError::Unavailable(format!("SMTP relay: {}", e)))?
            .port(config.smtp_port)
            .credentials(Credentials::new(username, password))
            .build();
        Ok(Self {
            transport,
            from: sender_mailbox(config)?,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpMailer {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), CollaboratorError> {
        let message = build_message(&self.from, email).await?;
        self.transport
            .send(message)
            .await
            .map_err(|e| CollaboratorError::Delivery(e.to_string()))?;
        info!(to = %email.to, attachments = email.attachments.len(), "Email sent via SMTP");
        Ok(())
    }
}

// =============================================================================
// Outbox
// =============================================================================

/// Writes each message as an `.eml` file instead of sending it.
pub struct OutboxMailer {
    dir: PathBuf,
    from: Mailbox,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>, config: &EmailConfig) -> Result<Self, CollaboratorError> {
        Ok(Self {
            dir: dir.into(),
            from: sender_mailbox(config)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl EmailSender for OutboxMailer {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), CollaboratorError> {
        let message = build_message(&self.from, email).await?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        let path = self.dir.join(format!("{}.eml", Uuid::new_v4()));
        tokio::fs::write(&path, message.formatted())
            .await
            .map_err(|e| CollaboratorError::Delivery(e.to_string()))?;
        info!(to = %email.to, path = %path.display(), "Email written to outbox");
        Ok(())
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn attachment_names(attachments: &[PathBuf]) -> Vec<String> {
    attachments
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

/// Send one signed email to a single address.
pub async fn send_one(
    mailer: &dyn EmailSender,
    to: &str,
    draft: &EmailDraft,
    sender_name: &str,
    attachments: &[PathBuf],
) -> Result<ActionDetail, CollaboratorError> {
    let email = OutgoingEmail {
        to: to.to_string(),
        subject: draft.subject.clone(),
        body: signature::sign(&draft.body, sender_name),
        attachments: attachments.to_vec(),
    };
    mailer.send(&email).await?;
    Ok(ActionDetail::EmailSent {
        to: email.to,
        subject: email.subject,
        attachments: attachment_names(attachments),
    })
}

const EVERYONE: &[&str] = &[
    "all",
    "everyone",
    "everybody",
    "all employees",
    "employees",
    "all staff",
    "staff",
    "the team",
    "whole team",
    "the whole team",
    "team",
    "all of them",
];

/// Leading words dropped from a recipient description.
const RECIPIENT_PREFIXES: &[&str] = &["all ", "the ", "our ", "every ", "each "];

/// Resolve a recipient description ("all", "Rahul", "data scientists")
/// to a directory filter. `None` means everyone.
pub fn recipient_filter(recipients: &str) -> Option<Vec<EmployeeFilter>> {
    let term = recipients.trim().to_lowercase();
    if term.is_empty() || EVERYONE.contains(&term.as_str()) {
        return None;
    }
    let mut term = term.as_str();
    while let Some(rest) = RECIPIENT_PREFIXES.iter().find_map(|p| term.strip_prefix(p)) {
        term = rest.trim_start();
    }
    Some(vec![
        EmployeeFilter::by_name(term),
        EmployeeFilter::by_role(term),
    ])
}

/// Email every employee matching `recipients`. Records with invalid
/// addresses and failed deliveries are skipped and reported.
pub async fn broadcast(
    mailer: &dyn EmailSender,
    directory: &dyn EmployeeDirectory,
    recipients: &str,
    draft: &EmailDraft,
    sender_name: &str,
    attachments: &[PathBuf],
) -> Result<ActionDetail, CollaboratorError> {
    let mut employees = Vec::new();
    match recipient_filter(recipients) {
        None => employees = directory.query(&EmployeeFilter::default()).await?,
        Some(filters) => {
            for filter in filters {
                for employee in directory.query(&filter).await? {
                    if !employees.iter().any(|e: &Employee| e.id == employee.id) {
                        employees.push(employee);
                    }
                }
            }
        }
    }
    if employees.is_empty() {
        return Err(CollaboratorError::NoMatch(recipients.to_string()));
    }

    let body = signature::sign(&draft.body, sender_name);
    let mut sent = Vec::new();
    let mut skipped = Vec::new();
    let mut failures = 0;
    for employee in employees {
        if !is_email(&employee.email) {
            skipped.push(SkippedRecipient {
                name: employee.name.clone(),
                email: employee.email.clone(),
                reason: "invalid email address".to_string(),
            });
            continue;
        }
        let email = OutgoingEmail {
            to: employee.email.clone(),
            subject: draft.subject.clone(),
            body: body.clone(),
            attachments: attachments.to_vec(),
        };
        match mailer.send(&email).await {
            Ok(()) => sent.push(employee),
            Err(e) => {
                warn!(to = %employee.email, error = %e, "Broadcast delivery failed");
                failures += 1;
                skipped.push(SkippedRecipient {
                    name: employee.name.clone(),
                    email: employee.email.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if sent.is_empty() && failures > 0 {
        return Err(CollaboratorError::Delivery(format!(
            "no message to '{}' could be delivered",
            recipients
        )));
    }
    Ok(ActionDetail::EmailBroadcast {
        subject: draft.subject.clone(),
        sent,
        skipped,
    })
}
