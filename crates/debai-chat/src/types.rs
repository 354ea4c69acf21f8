//! Shared types for the chat engine.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use debai_action::types::{Arguments, ToolKind};
use debai_core::config::DebaiConfig;
use debai_core::types::Timestamp;

use crate::state::TurnState;

// =============================================================================
// Configuration
// =============================================================================

/// Limits and thresholds for the agent loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub max_message_length: usize,
    /// Turns of history handed to the completion service.
    pub context_turns: usize,
    /// Tool choices below this confidence become clarifications.
    pub min_confidence: f32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 4000,
            context_turns: 50,
            min_confidence: 0.4,
        }
    }
}

impl From<&DebaiConfig> for ChatConfig {
    fn from(config: &DebaiConfig) -> Self {
        Self {
            max_message_length: config.chat.max_message_length,
            context_turns: config.memory.context_turns,
            min_confidence: config.llm.min_confidence,
        }
    }
}

// =============================================================================
// Turns
// =============================================================================

/// Result of one `handle_message` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    /// `Logged` or `Failed`.
    pub state: TurnState,
    pub tool: Option<ToolKind>,
    pub trace: Vec<TurnState>,
    /// Files generated during this turn.
    pub generated_files: Vec<String>,
}

/// Arguments gathered for a tool call that is still missing fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCall {
    pub tool: ToolKind,
    pub arguments: Arguments,
    pub missing: Vec<String>,
}

/// Session events counted in memory statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    EmailSent,
    DocumentCreated,
}

// =============================================================================
// Memory statistics
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryStats {
    pub exists: bool,
    /// Turns currently held.
    pub turn_count: usize,
    /// Turns ever appended, evicted ones included.
    pub total_turns: u64,
    pub oldest_timestamp: Option<Timestamp>,
    pub newest_timestamp: Option<Timestamp>,
    pub emails_sent: u64,
    pub documents_created: u64,
    pub has_summary: bool,
    pub created_at: Option<Timestamp>,
}

// =============================================================================
// Session files
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Uploaded,
    Generated,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Uploaded => f.write_str("uploaded"),
            FileKind::Generated => f.write_str("generated"),
        }
    }
}

impl std::str::FromStr for FileKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uploaded" | "upload" => Ok(FileKind::Uploaded),
            "generated" | "document" => Ok(FileKind::Generated),
            other => Err(format!("Unknown file type: {}", other)),
        }
    }
}

/// A file stored for a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

/// File names held for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionFileList {
    pub uploaded: Vec<String>,
    pub generated: Vec<String>,
}

impl SessionFileList {
    pub fn total_count(&self) -> usize {
        self.uploaded.len() + self.generated.len()
    }
}
