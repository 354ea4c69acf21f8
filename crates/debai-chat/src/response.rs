//! Reply composition.
//!
//! Turns action results, extraction failures and collaborator errors
//! into the text sent back to the user.

use debai_action::error::{CollaboratorError, ExtractionError};
use debai_action::registry::ToolRegistry;
use debai_action::types::{ActionDetail, ActionResult, ToolDeclaration, ToolKind};
use debai_core::types::{Employee, EmployeeFilter};

/// Join labels as "a", "a and b" or "a, b and c".
fn join_labels(labels: &[String]) -> String {
    match labels {
        [] => String::new(),
        [one] => one.clone(),
        [rest @ .., last] => format!("{} and {}", rest.join(", "), last),
    }
}

/// What the user asked for, as the object of "To ... I still need".
fn action_phrase(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::SendEmail => "send the email",
        ToolKind::EmailEmployees => "email your colleagues",
        ToolKind::AddEmployee => "add the employee",
        ToolKind::UpdateEmployee => "update the employee",
        ToolKind::DeleteEmployee => "remove the employee",
        ToolKind::ListEmployees => "list employees",
        ToolKind::CreateDocument => "create the document",
    }
}

fn filter_phrase(filter: &EmployeeFilter) -> String {
    match (&filter.role, &filter.name) {
        (Some(role), Some(name)) => format!(" with role '{}' named '{}'", role, name),
        (Some(role), None) => format!(" with role '{}'", role),
        (None, Some(name)) => format!(" named '{}'", name),
        (None, None) => String::new(),
    }
}

/// Builds user-facing replies.
pub struct ReplyComposer {
    /// Employees listed before the reply is cut short.
    pub max_listed: usize,
}

impl ReplyComposer {
    pub fn new(max_listed: usize) -> Self {
        Self { max_listed }
    }

    // -- Successful calls --

    pub fn success(&self, result: &ActionResult) -> String {
        match &result.detail {
            ActionDetail::EmailSent {
                to,
                subject,
                attachments,
            } => {
                let mut reply = format!("Email sent to {} with subject \"{}\".", to, subject);
                if !attachments.is_empty() {
                    reply.push_str(&format!(" Attached: {}.", attachments.join(", ")));
                }
                reply
            }
            ActionDetail::EmailBroadcast {
                subject,
                sent,
                skipped,
            } => {
                let mut reply = format!(
                    "Email \"{}\" sent to {} employee{}",
                    subject,
                    sent.len(),
                    if sent.len() == 1 { "" } else { "s" }
                );
                if sent.is_empty() {
                    reply.push('.');
                } else {
                    let names: Vec<String> = sent
                        .iter()
                        .map(|e| format!("{} ({})", e.name, e.email))
                        .collect();
                    reply.push_str(&format!(": {}.", names.join(", ")));
                }
                if !skipped.is_empty() {
                    let names: Vec<String> = skipped
                        .iter()
                        .map(|s| format!("{} ({})", s.name, s.reason))
                        .collect();
                    reply.push_str(&format!(" Skipped: {}.", names.join(", ")));
                }
                reply
            }
            ActionDetail::EmployeeAdded { employee } => format!(
                "Added {} ({}) to the employee directory with email {} and phone {}.",
                employee.name, employee.role, employee.email, employee.phone
            ),
            ActionDetail::EmployeeUpdated {
                field,
                value,
                employees,
            } => {
                let names: Vec<&str> = employees.iter().map(|e| e.name.as_str()).collect();
                format!(
                    "Updated the {} of {} to {}.",
                    field.label(),
                    join_labels(&names.iter().map(|n| n.to_string()).collect::<Vec<_>>()),
                    value
                )
            }
            ActionDetail::EmployeeDeleted { name, employees } => match employees.len() {
                1 => format!(
                    "Removed {} ({}) from the employee directory.",
                    employees[0].name, employees[0].role
                ),
                n => format!("Removed {} employees named {} from the employee directory.", n, name),
            },
            ActionDetail::EmployeeList { filter, employees } => {
                self.employee_list(filter, employees)
            }
            ActionDetail::DocumentCreated {
                title,
                format,
                filename,
                ..
            } => format!("Created {} \"{}\": {}", format.label(), title, filename),
        }
    }

    fn employee_list(&self, filter: &EmployeeFilter, employees: &[Employee]) -> String {
        let scope = filter_phrase(filter);
        if employees.is_empty() {
            return format!("No employees found{}.", scope);
        }
        let mut reply = format!(
            "Found {} employee{}{}:",
            employees.len(),
            if employees.len() == 1 { "" } else { "s" },
            scope
        );
        for e in employees.iter().take(self.max_listed) {
            reply.push_str(&format!("\n- {}, {}, {}, {}", e.name, e.role, e.email, e.phone));
        }
        if employees.len() > self.max_listed {
            reply.push_str(&format!("\n...and {} more", employees.len() - self.max_listed));
        }
        reply
    }

    // -- Clarifications --

    pub fn missing(&self, decl: &ToolDeclaration, missing: &[String]) -> String {
        let labels: Vec<String> = missing
            .iter()
            .map(|name| {
                decl.get_param(name)
                    .map(|p| p.label.clone())
                    .unwrap_or_else(|| name.clone())
            })
            .collect();
        format!(
            "To {} I still need the {}. Please tell me {}.",
            action_phrase(decl.kind),
            join_labels(&labels),
            if labels.len() == 1 { "it" } else { "them" }
        )
    }

    pub fn ambiguous(&self, decl: &ToolDeclaration, params: &[String], span: &str) -> String {
        let labels: Vec<String> = params
            .iter()
            .map(|name| {
                decl.get_param(name)
                    .map(|p| p.label.clone())
                    .unwrap_or_else(|| name.clone())
            })
            .collect();
        let example: Vec<String> = params.iter().map(|p| format!("{} <{}>", p, p)).collect();
        format!(
            "I couldn't tell the {} apart in \"{}\". Please say which is which, for example \"{}\".",
            join_labels(&labels),
            span,
            example.join(" ")
        )
    }

    /// Clarification for an extraction failure that carries no oracle error.
    pub fn extraction(&self, decl: &ToolDeclaration, err: &ExtractionError) -> String {
        match err {
            ExtractionError::Incomplete { missing, .. } => self.missing(decl, missing),
            ExtractionError::Ambiguous { params, span, .. } => self.ambiguous(decl, params, span),
            ExtractionError::Oracle(e) => format!("I couldn't read the details of that request ({}).", e),
        }
    }

    pub fn unknown_tool(&self, name: &str, registry: &ToolRegistry) -> String {
        format!(
            "I don't have a tool called '{}'. I can use: {}.",
            name,
            registry.names()
        )
    }

    pub fn low_confidence(&self, decl: &ToolDeclaration) -> String {
        format!(
            "I'm not sure what you'd like me to do. Did you mean to {}? Please rephrase with a bit more detail.",
            decl.description.to_lowercase()
        )
    }

    pub fn invalid_arguments(&self, reason: &str) -> String {
        format!("I couldn't use those details: {}.", reason)
    }

    pub fn cancelled(&self) -> String {
        "Okay, nothing was done.".to_string()
    }

    // -- Collaborator failures --

    pub fn collaborator_error(&self, err: &CollaboratorError) -> String {
        match err {
            CollaboratorError::Duplicate(_) => {
                "That employee already exists in the directory.".to_string()
            }
            CollaboratorError::Delivery(detail) => format!("I couldn't send the email: {}", detail),
            CollaboratorError::Generation(detail) => {
                format!("I couldn't create the document: {}", detail)
            }
            CollaboratorError::NoMatch(term) => {
                format!("No employees matched '{}', so no email was sent.", term)
            }
            CollaboratorError::NotFound(name) => {
                format!("I couldn't find an employee named '{}' in the directory.", name)
            }
            CollaboratorError::Unavailable(detail) => {
                format!("That service is unavailable right now: {}", detail)
            }
        }
    }
}

impl Default for ReplyComposer {
    fn default() -> Self {
        Self::new(25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use debai_action::types::{DocumentFormat, SkippedRecipient};
    use debai_core::types::EmployeeField;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn employee(name: &str, role: &str) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role: role.to_string(),
            email: format!("{}@corp.com", name.to_lowercase()),
            phone: "5550100".to_string(),
            created_at: Utc::now(),
        }
    }

    fn result(tool: ToolKind, detail: ActionDetail) -> ActionResult {
        ActionResult { tool, detail }
    }

    // ---- success ----

    #[test]
    fn test_email_sent_reply() {
        let reply = ReplyComposer::default().success(&result(
            ToolKind::SendEmail,
            ActionDetail::EmailSent {
                to: "boss@corp.com".to_string(),
                subject: "Lunch".to_string(),
                attachments: vec!["menu.pdf".to_string()],
            },
        ));
        assert_eq!(
            reply,
            "Email sent to boss@corp.com with subject \"Lunch\". Attached: menu.pdf."
        );
    }

    #[test]
    fn test_broadcast_reply_lists_sent_and_skipped() {
        let reply = ReplyComposer::default().success(&result(
            ToolKind::EmailEmployees,
            ActionDetail::EmailBroadcast {
                subject: "Standup".to_string(),
                sent: vec![employee("Priya", "data scientist")],
                skipped: vec![SkippedRecipient {
                    name: "Arjun".to_string(),
                    email: "bad".to_string(),
                    reason: "invalid email address".to_string(),
                }],
            },
        ));
        assert_eq!(
            reply,
            "Email \"Standup\" sent to 1 employee: Priya (priya@corp.com). Skipped: Arjun (invalid email address)."
        );
    }

    #[test]
    fn test_employee_added_reply_names_employee() {
        let reply = ReplyComposer::default().success(&result(
            ToolKind::AddEmployee,
            ActionDetail::EmployeeAdded {
                employee: employee("Rahul", "backend developer"),
            },
        ));
        assert!(reply.starts_with("Added Rahul (backend developer)"));
    }

    #[test]
    fn test_employee_updated_reply() {
        let mut rahul = employee("Rahul", "backend developer");
        rahul.phone = "9876543210".to_string();
        let reply = ReplyComposer::default().success(&result(
            ToolKind::UpdateEmployee,
            ActionDetail::EmployeeUpdated {
                field: EmployeeField::Phone,
                value: "9876543210".to_string(),
                employees: vec![rahul],
            },
        ));
        assert_eq!(reply, "Updated the phone number of Rahul to 9876543210.");
    }

    #[test]
    fn test_employee_deleted_reply() {
        let composer = ReplyComposer::default();
        let reply = composer.success(&result(
            ToolKind::DeleteEmployee,
            ActionDetail::EmployeeDeleted {
                name: "John".to_string(),
                employees: vec![employee("John", "designer")],
            },
        ));
        assert_eq!(reply, "Removed John (designer) from the employee directory.");

        let reply = composer.success(&result(
            ToolKind::DeleteEmployee,
            ActionDetail::EmployeeDeleted {
                name: "John".to_string(),
                employees: vec![employee("John", "designer"), employee("John", "accountant")],
            },
        ));
        assert_eq!(reply, "Removed 2 employees named John from the employee directory.");
    }

    #[test]
    fn test_not_found_reply() {
        let reply = ReplyComposer::default()
            .collaborator_error(&CollaboratorError::NotFound("Jane".to_string()));
        assert_eq!(reply, "I couldn't find an employee named 'Jane' in the directory.");
    }

    #[test]
    fn test_employee_list_reply_truncates() {
        let composer = ReplyComposer::new(2);
        let employees = vec![
            employee("A", "dev"),
            employee("B", "dev"),
            employee("C", "dev"),
        ];
        let reply = composer.success(&result(
            ToolKind::ListEmployees,
            ActionDetail::EmployeeList {
                filter: EmployeeFilter::by_role("dev"),
                employees,
            },
        ));
        assert!(reply.starts_with("Found 3 employees with role 'dev':"));
        assert!(reply.ends_with("...and 1 more"));

        let empty = composer.success(&result(
            ToolKind::ListEmployees,
            ActionDetail::EmployeeList {
                filter: EmployeeFilter::default(),
                employees: vec![],
            },
        ));
        assert_eq!(empty, "No employees found.");
    }

    #[test]
    fn test_document_reply_names_file() {
        let reply = ReplyComposer::default().success(&result(
            ToolKind::CreateDocument,
            ActionDetail::DocumentCreated {
                title: "Q3 Summary".to_string(),
                format: DocumentFormat::Pdf,
                filename: "Q3_Summary.pdf".to_string(),
                path: PathBuf::from("/tmp/Q3_Summary.pdf"),
            },
        ));
        assert_eq!(reply, "Created PDF \"Q3 Summary\": Q3_Summary.pdf");
    }

    // ---- clarifications ----

    #[test]
    fn test_missing_names_fields_by_label() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::AddEmployee);
        let reply = ReplyComposer::default().missing(
            decl,
            &["role".to_string(), "email".to_string(), "phone".to_string()],
        );
        assert_eq!(
            reply,
            "To add the employee I still need the role, email address and phone number. Please tell me them."
        );
    }

    #[test]
    fn test_ambiguous_reply() {
        let registry = ToolRegistry::builtin();
        let decl = registry.get_kind(ToolKind::AddEmployee);
        let reply = ReplyComposer::default().ambiguous(
            decl,
            &["name".to_string(), "role".to_string()],
            "Bob Smith engineer",
        );
        assert!(reply.contains("\"Bob Smith engineer\""));
        assert!(reply.contains("name <name> role <role>"));
    }

    #[test]
    fn test_duplicate_reply() {
        let reply = ReplyComposer::default()
            .collaborator_error(&CollaboratorError::Duplicate("Rahul Saha".to_string()));
        assert_eq!(reply, "That employee already exists in the directory.");
    }

    #[test]
    fn test_join_labels() {
        assert_eq!(join_labels(&[]), "");
        assert_eq!(join_labels(&["a".to_string()]), "a");
        assert_eq!(join_labels(&["a".to_string(), "b".to_string()]), "a and b");
        assert_eq!(
            join_labels(&["a".to_string(), "b".to_string(), "c".to_string()]),
            "a, b and c"
        );
    }
}
