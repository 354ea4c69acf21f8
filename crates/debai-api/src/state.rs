//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use debai_chat::ChatOrchestrator;
use debai_core::config::DebaiConfig;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The
/// orchestrator owns every piece of mutable session state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, read-only once the server starts.
    pub config: Arc<DebaiConfig>,
    /// The agent loop and the session memory and files behind it.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: DebaiConfig, orchestrator: ChatOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            start_time: Instant::now(),
        }
    }
}
