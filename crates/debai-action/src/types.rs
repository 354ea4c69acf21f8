//! Core types for the tool layer.
//!
//! Tool declarations, argument values, typed tool calls and the results
//! handlers hand back to the agent loop.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use debai_core::types::{Employee, EmployeeField, EmployeeFilter, EmployeeUpdate, NewEmployee};

use crate::error::ActionError;
use crate::extract::schema;

// =============================================================================
// Enums
// =============================================================================

/// The fixed set of tools the assistant can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    SendEmail,
    EmailEmployees,
    AddEmployee,
    UpdateEmployee,
    DeleteEmployee,
    ListEmployees,
    CreateDocument,
}

impl ToolKind {
    pub const ALL: [ToolKind; 7] = [
        ToolKind::SendEmail,
        ToolKind::EmailEmployees,
        ToolKind::AddEmployee,
        ToolKind::UpdateEmployee,
        ToolKind::DeleteEmployee,
        ToolKind::ListEmployees,
        ToolKind::CreateDocument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::SendEmail => "send_email",
            ToolKind::EmailEmployees => "email_employees",
            ToolKind::AddEmployee => "add_employee",
            ToolKind::UpdateEmployee => "update_employee",
            ToolKind::DeleteEmployee => "delete_employee",
            ToolKind::ListEmployees => "list_employees",
            ToolKind::CreateDocument => "create_document",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown tool: {}", s))
    }
}

/// Output formats supported by the document generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Docx,
    Pdf,
    Xlsx,
    Txt,
}

impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Txt => "txt",
        }
    }

    /// Human-readable name used in replies.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentFormat::Docx => "Word document",
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Xlsx => "Excel spreadsheet",
            DocumentFormat::Txt => "text file",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for DocumentFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "docx" | "doc" | "word" => Ok(DocumentFormat::Docx),
            "pdf" => Ok(DocumentFormat::Pdf),
            "xlsx" | "xls" | "excel" | "spreadsheet" => Ok(DocumentFormat::Xlsx),
            "txt" | "text" => Ok(DocumentFormat::Txt),
            other => Err(format!("Unsupported document format: {}", other)),
        }
    }
}

// =============================================================================
// Declarations
// =============================================================================

/// One allowed value of a choice parameter, with the spellings that map to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub value: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl Choice {
    pub fn new(value: &str, aliases: &[&str]) -> Self {
        Self {
            value: value.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn matches(&self, word: &str) -> bool {
        let word = word.trim().trim_start_matches('.').to_lowercase();
        self.value == word || self.aliases.iter().any(|a| *a == word)
    }
}

/// Value type of a tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamType {
    Text,
    Email,
    Phone,
    Integer,
    Boolean,
    Choice { choices: Vec<Choice> },
}

impl ParamType {
    /// Resolve a word to a choice value, if this is a choice type.
    pub fn choice_for(&self, word: &str) -> Option<&str> {
        match self {
            ParamType::Choice { choices } => choices
                .iter()
                .find(|c| c.matches(word))
                .map(|c| c.value.as_str()),
            _ => None,
        }
    }
}

/// Declaration of a single tool parameter.
///
/// The marker and boundary fields drive the marker-based extractor and are
/// not part of the published tool menu.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub label: String,
    pub description: String,
    #[serde(flatten)]
    pub ty: ParamType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ArgValue>,
    #[serde(skip)]
    pub markers: Vec<String>,
    /// Consumes the rest of the message once its marker is seen.
    #[serde(skip)]
    pub greedy: bool,
    /// Fed from a parenthetical group such as "(backend developer)".
    #[serde(skip)]
    pub parenthetical: bool,
    /// Keeps punctuation and spacing of the original text.
    #[serde(skip)]
    pub verbatim: bool,
    /// Prefers unmarked words at the start of the message over a marker
    /// that appears after another parameter's marker.
    #[serde(skip)]
    pub leading_run: bool,
}

impl ParamSpec {
    pub fn new(name: &str, ty: ParamType) -> Self {
        Self {
            name: name.to_string(),
            label: name.replace('_', " "),
            description: String::new(),
            ty,
            required: false,
            default: None,
            markers: vec![name.replace('_', " ")],
            greedy: false,
            parenthetical: false,
            verbatim: false,
            leading_run: false,
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, ParamType::Text)
    }

    pub fn email(name: &str) -> Self {
        Self::new(name, ParamType::Email)
    }

    pub fn phone(name: &str) -> Self {
        Self::new(name, ParamType::Phone)
    }

    pub fn choice(name: &str, choices: Vec<Choice>) -> Self {
        Self::new(name, ParamType::Choice { choices })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn default_value(mut self, value: ArgValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Add marker phrases. The parameter name is always a marker.
    pub fn markers(mut self, markers: &[&str]) -> Self {
        for marker in markers {
            let marker = marker.to_lowercase();
            if !self.markers.contains(&marker) {
                self.markers.push(marker);
            }
        }
        self
    }

    pub fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    pub fn parenthetical(mut self) -> Self {
        self.parenthetical = true;
        self
    }

    pub fn verbatim(mut self) -> Self {
        self.verbatim = true;
        self
    }

    pub fn leading_run(mut self) -> Self {
        self.leading_run = true;
        self
    }
}

/// Declaration of a tool: identity, description and parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub kind: ToolKind,
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    /// Words that name the tool itself and carry no argument value.
    #[serde(skip)]
    pub keywords: Vec<String>,
}

impl ToolDeclaration {
    pub fn new(kind: ToolKind, description: &str) -> Self {
        Self {
            kind,
            name: kind.as_str().to_string(),
            description: description.to_string(),
            params: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn keywords(mut self, words: &[&str]) -> Self {
        self.keywords.extend(words.iter().map(|w| w.to_string()));
        self
    }

    pub fn get_param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    /// A copy of this declaration without the parameters already present
    /// in `known`.
    pub fn without(&self, known: &Arguments) -> ToolDeclaration {
        let mut restricted = self.clone();
        restricted.params.retain(|p| !known.contains(&p.name));
        restricted
    }
}

// =============================================================================
// Arguments
// =============================================================================

/// A validated argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ArgValue::Bool(b) => serde_json::Value::Bool(*b),
            ArgValue::Integer(i) => serde_json::Value::from(*i),
            ArgValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(true) => f.write_str("yes"),
            ArgValue::Bool(false) => f.write_str("no"),
            ArgValue::Integer(i) => write!(f, "{}", i),
            ArgValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Text(s.to_string())
    }
}

/// Validated arguments for one tool invocation, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(BTreeMap<String, ArgValue>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(ArgValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.0.iter()
    }

    /// Copy every entry of `other` into `self`, overwriting.
    pub fn merge(&mut self, other: Arguments) {
        self.0.extend(other.0);
    }

    /// Render these arguments as a marker-annotated message.
    ///
    /// Extracting the result against the same declaration reproduces the
    /// arguments. Greedy parameters come last so they cannot swallow
    /// the others, and text values are quoted so marker words inside them
    /// stay part of the value.
    pub fn canonical_text(&self, decl: &ToolDeclaration) -> String {
        let mut parts = Vec::new();
        let ordered = decl
            .params
            .iter()
            .filter(|p| !p.greedy)
            .chain(decl.params.iter().filter(|p| p.greedy));
        for spec in ordered {
            if let Some(value) = self.get(&spec.name) {
                let value = value.to_string();
                if value.is_empty() {
                    continue;
                }
                let value = if spec.ty == ParamType::Text {
                    quote(&value)
                } else {
                    value
                };
                parts.push(format!("{} {}", spec.name.replace('_', " "), value));
            }
        }
        parts.join(" ")
    }
}

/// Wrap in straight quotes, or curly ones when the text has a straight quote.
fn quote(value: &str) -> String {
    if value.contains('"') {
        format!("\u{201c}{}\u{201d}", value)
    } else {
        format!("\"{}\"", value)
    }
}

// =============================================================================
// Tool calls
// =============================================================================

/// Subject and body of an outgoing email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// One titled block of document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub heading: Option<String>,
    pub body: String,
}

/// Everything the document renderer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub format: DocumentFormat,
    pub title: String,
    pub filename: Option<String>,
    pub sections: Vec<Section>,
}

impl DocumentRequest {
    /// Split free-form content into sections at lines starting with `## `.
    pub fn sections_from_content(content: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut heading: Option<String> = None;
        let mut body: Vec<&str> = Vec::new();

        for line in content.lines() {
            if let Some(h) = line.trim_start().strip_prefix("## ") {
                if heading.is_some() || body.iter().any(|l| !l.trim().is_empty()) {
                    sections.push(Section {
                        heading: heading.take(),
                        body: body.join("\n").trim().to_string(),
                    });
                }
                heading = Some(h.trim().to_string());
                body.clear();
            } else {
                body.push(line);
            }
        }
        if heading.is_some() || body.iter().any(|l| !l.trim().is_empty()) {
            sections.push(Section {
                heading,
                body: body.join("\n").trim().to_string(),
            });
        }
        sections
    }
}

/// A fully typed tool invocation. One variant per tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SendEmail { to: String, draft: EmailDraft },
    EmailEmployees { recipients: String, draft: EmailDraft },
    AddEmployee(NewEmployee),
    UpdateEmployee(EmployeeUpdate),
    DeleteEmployee { name: String },
    ListEmployees(EmployeeFilter),
    CreateDocument(DocumentRequest),
}

impl ToolCall {
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolCall::SendEmail { .. } => ToolKind::SendEmail,
            ToolCall::EmailEmployees { .. } => ToolKind::EmailEmployees,
            ToolCall::AddEmployee(_) => ToolKind::AddEmployee,
            ToolCall::UpdateEmployee(_) => ToolKind::UpdateEmployee,
            ToolCall::DeleteEmployee { .. } => ToolKind::DeleteEmployee,
            ToolCall::ListEmployees(_) => ToolKind::ListEmployees,
            ToolCall::CreateDocument(_) => ToolKind::CreateDocument,
        }
    }

    /// Build a typed call from validated arguments.
    pub fn from_arguments(kind: ToolKind, args: &Arguments) -> Result<Self, ActionError> {
        let text = |name: &str| -> Result<String, ActionError> {
            args.get_str(name)
                .map(str::to_string)
                .ok_or_else(|| ActionError::InvalidArguments {
                    tool: kind,
                    reason: format!("missing '{}'", name),
                })
        };
        let optional = |name: &str| args.get_str(name).map(str::to_string);

        let call = match kind {
            ToolKind::SendEmail => ToolCall::SendEmail {
                to: text("to")?,
                draft: EmailDraft {
                    subject: text("subject")?,
                    body: text("body")?,
                },
            },
            ToolKind::EmailEmployees => ToolCall::EmailEmployees {
                recipients: text("recipients")?,
                draft: EmailDraft {
                    subject: text("subject")?,
                    body: text("body")?,
                },
            },
            ToolKind::AddEmployee => ToolCall::AddEmployee(NewEmployee {
                name: text("name")?,
                role: text("role")?,
                email: text("email")?,
                phone: text("phone")?,
            }),
            ToolKind::UpdateEmployee => {
                let field = text("field")?
                    .parse::<EmployeeField>()
                    .map_err(|reason| ActionError::InvalidArguments { tool: kind, reason })?;
                ToolCall::UpdateEmployee(EmployeeUpdate {
                    name: without_possessive(&text("name")?),
                    field,
                    value: field_value(kind, field, &text("value")?)?,
                })
            }
            ToolKind::DeleteEmployee => ToolCall::DeleteEmployee {
                name: without_possessive(&text("name")?),
            },
            ToolKind::ListEmployees => ToolCall::ListEmployees(EmployeeFilter {
                role: optional("role"),
                name: optional("name"),
            }),
            ToolKind::CreateDocument => {
                let format = text("format")?
                    .parse::<DocumentFormat>()
                    .map_err(|reason| ActionError::InvalidArguments { tool: kind, reason })?;
                ToolCall::CreateDocument(DocumentRequest {
                    format,
                    title: text("title")?,
                    filename: optional("filename"),
                    sections: DocumentRequest::sections_from_content(
                        &optional("content").unwrap_or_default(),
                    ),
                })
            }
        };
        Ok(call)
    }
}

/// "Rahul Saha's" refers to Rahul Saha.
fn without_possessive(name: &str) -> String {
    let name = name.trim();
    ["'s", "\u{2019}s"]
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name)
        .to_string()
}

/// Check a new field value against the field's type. Phone numbers come
/// back normalized.
fn field_value(kind: ToolKind, field: EmployeeField, raw: &str) -> Result<String, ActionError> {
    let spec = match field {
        EmployeeField::Email => ParamSpec::email("value"),
        EmployeeField::Phone => ParamSpec::phone("value"),
        EmployeeField::Role => ParamSpec::text("value"),
    };
    let trimmed = raw.trim().trim_end_matches(['.', '!']);
    schema::coerce(&spec, &serde_json::Value::String(trimmed.to_string()))
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| ActionError::InvalidArguments {
            tool: kind,
            reason: format!("'{}' is not a valid {}", raw.trim(), field.label()),
        })
}

// =============================================================================
// Results
// =============================================================================

/// Why a broadcast recipient was not emailed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecipient {
    pub name: String,
    pub email: String,
    pub reason: String,
}

/// Tool-specific payload of a successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionDetail {
    EmailSent {
        to: String,
        subject: String,
        attachments: Vec<String>,
    },
    EmailBroadcast {
        subject: String,
        sent: Vec<Employee>,
        skipped: Vec<SkippedRecipient>,
    },
    EmployeeAdded {
        employee: Employee,
    },
    EmployeeUpdated {
        field: EmployeeField,
        value: String,
        employees: Vec<Employee>,
    },
    EmployeeDeleted {
        name: String,
        employees: Vec<Employee>,
    },
    EmployeeList {
        filter: EmployeeFilter,
        employees: Vec<Employee>,
    },
    DocumentCreated {
        title: String,
        format: DocumentFormat,
        filename: String,
        path: PathBuf,
    },
}

/// Outcome of a successful tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub tool: ToolKind,
    pub detail: ActionDetail,
}
