//! Conversational core of DebAI.
//!
//! Session memory, session file storage, the turn state machine, reply
//! composition, and the agent loop that ties them to the tool layer.

pub mod error;
pub mod files;
pub mod memory;
pub mod orchestrator;
pub mod response;
pub mod state;
pub mod types;

pub use error::ChatError;
pub use files::SessionFiles;
pub use memory::MemoryStore;
pub use orchestrator::ChatOrchestrator;
pub use response::ReplyComposer;
pub use state::{validate_transition, TurnState, TurnTrace};
pub use types::{
    ChatConfig, FileKind, MemoryStats, Milestone, PendingCall, SessionFileList, StoredFile,
    TurnOutcome,
};
