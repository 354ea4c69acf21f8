//! Tool registry.
//!
//! Holds the immutable set of tool declarations published to the
//! completion service and used by the extractor.

use crate::error::ActionError;
use crate::types::{ArgValue, Choice, ParamSpec, ToolDeclaration, ToolKind};

/// Ordered, read-only collection of tool declarations.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDeclaration>,
}

impl ToolRegistry {
    /// Registry with the built-in tools.
    pub fn builtin() -> Self {
        Self {
            tools: vec![
                send_email(),
                email_employees(),
                add_employee(),
                update_employee(),
                delete_employee(),
                list_employees(),
                create_document(),
            ],
        }
    }

    /// All declarations, in registration order.
    pub fn list(&self) -> &[ToolDeclaration] {
        &self.tools
    }

    /// Look up a declaration by tool name.
    pub fn get(&self, name: &str) -> Result<&ToolDeclaration, ActionError> {
        self.tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ActionError::UnknownTool(name.to_string()))
    }

    /// Declaration for a built-in tool kind.
    pub fn get_kind(&self, kind: ToolKind) -> &ToolDeclaration {
        self.tools
            .iter()
            .find(|t| t.kind == kind)
            .unwrap_or_else(|| unreachable!("builtin registry declares every ToolKind"))
    }

    /// Comma-separated tool names, for clarification replies.
    pub fn names(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The declarations as JSON, as offered to the completion service.
    pub fn menu(&self) -> serde_json::Value {
        serde_json::to_value(&self.tools).unwrap_or_default()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// Built-in declarations
// =============================================================================

fn subject_param() -> ParamSpec {
    ParamSpec::text("subject")
        .required()
        .describe("Subject line of the email")
        .markers(&["about", "regarding", "titled", "with subject", "subject line"])
}

fn body_param() -> ParamSpec {
    ParamSpec::text("body")
        .required()
        .label("message")
        .describe("Body of the email, without a signature")
        .markers(&[
            "saying",
            "that says",
            "with message",
            "with the message",
            "message body",
            "telling them",
            "content",
        ])
        .greedy()
        .verbatim()
}

fn send_email() -> ToolDeclaration {
    ToolDeclaration::new(ToolKind::SendEmail, "Send an email to a single address")
        .param(
            ParamSpec::email("to")
                .required()
                .label("recipient address")
                .describe("Recipient email address")
                .markers(&["recipient", "send to", "address"]),
        )
        .param(subject_param())
        .param(body_param())
        .keywords(&[
            "send", "email", "e-mail", "mail", "write", "compose", "draft", "shoot", "an",
        ])
}

fn email_employees() -> ToolDeclaration {
    ToolDeclaration::new(
        ToolKind::EmailEmployees,
        "Email employees selected by name or role, or everyone",
    )
    .param(
        ParamSpec::text("recipients")
            .required()
            .describe("Employee name, role, or \"all\"")
            .markers(&["to", "recipients are"])
            .leading_run(),
    )
    .param(subject_param())
    .param(body_param())
    .keywords(&[
        "send", "email", "e-mail", "mail", "write", "compose", "draft", "shoot", "an",
    ])
}

fn name_param(description: &str) -> ParamSpec {
    ParamSpec::text("name")
        .required()
        .describe(description)
        .markers(&["named", "called", "name is", "employee name"])
}

fn add_employee() -> ToolDeclaration {
    ToolDeclaration::new(ToolKind::AddEmployee, "Add an employee to the directory")
        .param(name_param("Full name of the employee"))
        .param(
            ParamSpec::text("role")
                .required()
                .describe("Job role, such as \"backend developer\"")
                .markers(&[
                    "as",
                    "titled",
                    "job",
                    "job type",
                    "job_type",
                    "job role",
                    "job title",
                    "position",
                    "designation",
                    "working as",
                ])
                .parenthetical(),
        )
        .param(
            ParamSpec::email("email")
                .required()
                .label("email address")
                .describe("Work email address")
                .markers(&["email id", "email address", "e-mail", "mail", "mail id"]),
        )
        .param(
            ParamSpec::phone("phone")
                .required()
                .label("phone number")
                .describe("Contact phone number")
                .markers(&[
                    "phone number",
                    "phone no",
                    "mobile",
                    "mobile number",
                    "contact",
                    "contact number",
                    "number",
                ]),
        )
        .keywords(&[
            "add", "store", "insert", "register", "save", "onboard", "new", "employee",
            "employees", "staff", "member", "record", "details", "database", "db", "directory",
        ])
}

fn update_employee() -> ToolDeclaration {
    ToolDeclaration::new(
        ToolKind::UpdateEmployee,
        "Change the email, phone or role of an existing employee",
    )
    .param(name_param("Full name of the employee to update"))
    .param(
        ParamSpec::choice(
            "field",
            vec![
                Choice::new("email", &["e-mail", "mail"]),
                Choice::new("phone", &["mobile", "number", "contact"]),
                Choice::new("role", &["job", "position", "designation", "title"]),
            ],
        )
        .required()
        .describe("Which field to change"),
    )
    .param(
        ParamSpec::text("value")
            .required()
            .label("new value")
            .describe("New value for the field")
            .markers(&["to", "as", "new value", "set to", "changed to"])
            .greedy()
            .verbatim(),
    )
    .keywords(&[
        "update", "change", "modify", "edit", "set", "correct", "employee", "employees",
        "staff", "member", "record", "details", "info", "id", "address", "database", "db",
        "directory", "field",
    ])
}

fn delete_employee() -> ToolDeclaration {
    ToolDeclaration::new(ToolKind::DeleteEmployee, "Remove an employee from the directory")
        .param(name_param("Full name of the employee to remove"))
        .keywords(&[
            "delete", "remove", "erase", "drop", "offboard", "employee", "employees", "staff",
            "member", "record", "records", "entry", "database", "db", "directory",
        ])
}

fn list_employees() -> ToolDeclaration {
    ToolDeclaration::new(
        ToolKind::ListEmployees,
        "List employees, optionally filtered by role or name",
    )
    .param(
        ParamSpec::text("role")
            .describe("Role to filter by")
            .markers(&["as", "with role", "job type", "position", "working as"]),
    )
    .param(
        ParamSpec::text("name")
            .describe("Name to filter by")
            .markers(&["named", "called", "name is"]),
    )
    .keywords(&[
        "list", "show", "display", "get", "find", "view", "who", "are", "is", "all",
        "every", "everyone", "employee", "employees", "staff", "team", "members",
        "people", "directory", "our", "me", "working", "here",
    ])
}

fn create_document() -> ToolDeclaration {
    ToolDeclaration::new(ToolKind::CreateDocument, "Generate a document file")
        .param(
            ParamSpec::choice(
                "format",
                vec![
                    Choice::new("docx", &["word", "doc"]),
                    Choice::new("pdf", &[]),
                    Choice::new("xlsx", &["excel", "spreadsheet", "xls", "sheet"]),
                    Choice::new("txt", &["text"]),
                ],
            )
            .describe("Output format")
            .default_value(ArgValue::Text("docx".to_string()))
            .markers(&["as a", "in", "file type"]),
        )
        .param(
            ParamSpec::text("title")
                .required()
                .describe("Document title")
                .markers(&["titled", "called", "named", "about", "on"]),
        )
        .param(
            ParamSpec::text("filename")
                .describe("File name without extension")
                .markers(&["file name", "save as"]),
        )
        .param(
            ParamSpec::text("content")
                .describe("Document body; lines starting with \"## \" start sections")
                .default_value(ArgValue::Text(String::new()))
                .markers(&["with content", "containing", "saying", "body", "that says"])
                .greedy()
                .verbatim(),
        )
        .keywords(&[
            "create", "make", "generate", "write", "prepare", "draft", "build", "new",
            "document", "file", "report",
        ])
}
