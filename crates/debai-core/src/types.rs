use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// UTC timestamp used across all records.
pub type Timestamp = DateTime<Utc>;

// =============================================================================
// Conversation
// =============================================================================

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// One message in a session's history. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: Timestamp,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Employee directory
// =============================================================================

/// A stored employee record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: String,
    pub created_at: Timestamp,
}

/// Fields required to add an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: String,
}

/// Employee fields that can change after the record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeField {
    Email,
    Phone,
    Role,
}

impl EmployeeField {
    pub const ALL: [EmployeeField; 3] = [EmployeeField::Email, EmployeeField::Phone, EmployeeField::Role];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeField::Email => "email",
            EmployeeField::Phone => "phone",
            EmployeeField::Role => "role",
        }
    }

    /// Human-readable name used in replies.
    pub fn label(&self) -> &'static str {
        match self {
            EmployeeField::Email => "email address",
            EmployeeField::Phone => "phone number",
            EmployeeField::Role => "role",
        }
    }
}

impl fmt::Display for EmployeeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmployeeField {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" | "e-mail" | "mail" | "email_id" => Ok(EmployeeField::Email),
            "phone" | "mobile" | "number" | "contact" | "phone_number" => Ok(EmployeeField::Phone),
            "role" | "job" | "job_type" | "position" | "title" | "designation" => {
                Ok(EmployeeField::Role)
            }
            other => Err(format!("Unknown employee field: {}", other)),
        }
    }
}

/// A change to one field of the employees with a given name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeUpdate {
    pub name: String,
    pub field: EmployeeField,
    pub value: String,
}

/// Optional filters for employee lookups. Both fields match
/// case-insensitively on substrings; an empty filter matches everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeFilter {
    pub role: Option<String>,
    pub name: Option<String>,
}

impl EmployeeFilter {
    pub fn by_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            role: None,
            name: Some(name.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.name.is_none()
    }
}
