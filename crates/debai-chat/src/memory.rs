//! Bounded per-session conversation memory.
//!
//! Each session key owns a FIFO log of at most `max_turns` turns plus
//! metadata (milestone counters, a rolling summary of the older half of
//! the log, and any pending clarification). Nothing is persisted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::debug;

use debai_core::config::MemoryConfig;
use debai_core::types::{Role, Timestamp, Turn};

use crate::types::{MemoryStats, Milestone, PendingCall};

/// User turns shorter than this are not summary topics.
const TOPIC_MIN_CHARS: usize = 20;
const TOPIC_SNIPPET_CHARS: usize = 50;
const MAX_SUMMARY_TOPICS: usize = 3;

#[derive(Debug, Clone)]
struct Entry {
    turn: Turn,
    milestone: Option<Milestone>,
}

#[derive(Debug)]
struct SessionLog {
    entries: VecDeque<Entry>,
    created_at: Timestamp,
    total_appended: u64,
    emails_sent: u64,
    documents_created: u64,
    summary: Option<String>,
    pending: Option<PendingCall>,
}

impl SessionLog {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            created_at: Utc::now(),
            total_appended: 0,
            emails_sent: 0,
            documents_created: 0,
            summary: None,
            pending: None,
        }
    }

    /// Summarise the older half of the log.
    fn summarise(&self) -> String {
        let older = self.entries.iter().take(self.entries.len() / 2);
        let mut emails = 0;
        let mut documents = 0;
        let mut topics = Vec::new();
        for entry in older {
            match entry.milestone {
                Some(Milestone::EmailSent) => emails += 1,
                Some(Milestone::DocumentCreated) => documents += 1,
                None => {}
            }
            let text = entry.turn.text.trim();
            if entry.turn.role == Role::User && text.chars().count() > TOPIC_MIN_CHARS {
                let snippet: String = text.chars().take(TOPIC_SNIPPET_CHARS).collect();
                topics.push(format!("{}...", snippet));
            }
        }

        let mut parts = Vec::new();
        if emails > 0 {
            parts.push(format!("Sent {} emails", emails));
        }
        if documents > 0 {
            parts.push(format!("Created {} documents", documents));
        }
        if !topics.is_empty() {
            topics.truncate(MAX_SUMMARY_TOPICS);
            parts.push(format!("Discussed: {}", topics.join(", ")));
        }
        if parts.is_empty() {
            "General conversation".to_string()
        } else {
            parts.join("; ")
        }
    }

    fn refresh_summary(&mut self, threshold: usize) {
        if self.entries.len() >= threshold {
            self.summary = Some(self.summarise());
        }
    }
}

/// In-process store of session memory logs.
pub struct MemoryStore {
    max_turns: usize,
    summary_threshold: usize,
    sessions: Mutex<HashMap<String, SessionLog>>,
}

impl MemoryStore {
    pub fn new(max_turns: usize, summary_threshold: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            summary_threshold: summary_threshold.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.max_turns, config.summary_threshold)
    }

    pub fn capacity(&self) -> usize {
        self.max_turns
    }

    /// The map holds no invariant spanning entries, so a poisoned lock is
    /// still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionLog>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a turn, creating the session if new and evicting the oldest
    /// turns beyond capacity.
    pub fn append(&self, session: &str, turn: Turn) {
        let mut sessions = self.lock();
        let log = sessions
            .entry(session.to_string())
            .or_insert_with(SessionLog::new);
        log.entries.push_back(Entry {
            turn,
            milestone: None,
        });
        log.total_appended += 1;
        while log.entries.len() > self.max_turns {
            log.entries.pop_front();
        }
        log.refresh_summary(self.summary_threshold);
    }

    /// The most recent `limit` turns, oldest first.
    pub fn recent(&self, session: &str, limit: usize) -> Vec<Turn> {
        let sessions = self.lock();
        match sessions.get(session) {
            Some(log) => {
                let skip = log.entries.len().saturating_sub(limit);
                log.entries.iter().skip(skip).map(|e| e.turn.clone()).collect()
            }
            None => Vec::new(),
        }
    }

    /// Discard the log and all metadata for `session`.
    pub fn clear(&self, session: &str) {
        if self.lock().remove(session).is_some() {
            debug!(session = %session, "Session memory cleared");
        }
    }

    pub fn stats(&self, session: &str) -> MemoryStats {
        let sessions = self.lock();
        let Some(log) = sessions.get(session) else {
            return MemoryStats::default();
        };
        MemoryStats {
            exists: true,
            turn_count: log.entries.len(),
            total_turns: log.total_appended,
            oldest_timestamp: log.entries.front().map(|e| e.turn.timestamp),
            newest_timestamp: log.entries.back().map(|e| e.turn.timestamp),
            emails_sent: log.emails_sent,
            documents_created: log.documents_created,
            has_summary: log.summary.is_some(),
            created_at: Some(log.created_at),
        }
    }

    /// Turns whose text contains `query`, case-insensitively.
    pub fn search(&self, session: &str, query: &str) -> Vec<Turn> {
        let needle = query.to_lowercase();
        let sessions = self.lock();
        sessions
            .get(session)
            .map(|log| {
                log.entries
                    .iter()
                    .filter(|e| e.turn.text.to_lowercase().contains(&needle))
                    .map(|e| e.turn.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rolling summary of the older half of the log, once the log has
    /// reached the summary threshold.
    pub fn summary(&self, session: &str) -> Option<String> {
        self.lock().get(session).and_then(|log| log.summary.clone())
    }

    /// One-line description of the session for the stats endpoint.
    pub fn context_summary(&self, session: &str) -> String {
        let sessions = self.lock();
        match sessions.get(session) {
            Some(log) => format!(
                "Conversation started {}. Messages exchanged: {}. Emails sent: {}. Documents created: {}.",
                log.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                log.total_appended,
                log.emails_sent,
                log.documents_created
            ),
            None => "No previous conversation.".to_string(),
        }
    }

    /// Count a milestone against the session and tag its newest turn.
    pub fn record(&self, session: &str, milestone: Milestone) {
        let mut sessions = self.lock();
        let log = sessions
            .entry(session.to_string())
            .or_insert_with(SessionLog::new);
        match milestone {
            Milestone::EmailSent => log.emails_sent += 1,
            Milestone::DocumentCreated => log.documents_created += 1,
        }
        if let Some(entry) = log.entries.back_mut() {
            entry.milestone = Some(milestone);
        }
        log.refresh_summary(self.summary_threshold);
    }

    /// Remember arguments gathered for a call that still lacks fields.
    /// Replaces any earlier pending call.
    pub fn set_pending(&self, session: &str, pending: PendingCall) {
        self.lock()
            .entry(session.to_string())
            .or_insert_with(SessionLog::new)
            .pending = Some(pending);
    }

    pub fn pending(&self, session: &str) -> Option<PendingCall> {
        self.lock().get(session).and_then(|log| log.pending.clone())
    }

    pub fn take_pending(&self, session: &str) -> Option<PendingCall> {
        self.lock()
            .get_mut(session)
            .and_then(|log| log.pending.take())
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debai_action::types::{Arguments, ToolKind};

    fn store() -> MemoryStore {
        MemoryStore::new(50, 40)
    }

    // ---- append / recent ----

    #[test]
    fn test_recent_in_chronological_order() {
        let store = store();
        store.append("s1", Turn::user("one"));
        store.append("s1", Turn::assistant("two"));
        store.append("s1", Turn::user("three"));

        let recent = store.recent("s1", 2);
        let texts: Vec<&str> = recent.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);
        assert_eq!(store.recent("s1", 100).len(), 3);
    }

    #[test]
    fn test_capacity_fifo_eviction() {
        let store = store();
        for i in 0..60 {
            store.append("s1", Turn::user(format!("m{}", i)));
        }
        let all = store.recent("s1", usize::MAX);
        assert_eq!(all.len(), 50);
        assert_eq!(all[0].text, "m10");
        assert_eq!(all[49].text, "m59");

        let stats = store.stats("s1");
        assert_eq!(stats.turn_count, 50);
        assert_eq!(stats.total_turns, 60);
    }

    #[test]
    fn test_unknown_session_is_empty() {
        let store = store();
        assert!(store.recent("nobody", 10).is_empty());
        assert!(!store.stats("nobody").exists);
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = store();
        store.append("a", Turn::user("hello a"));
        store.append("b", Turn::user("hello b"));
        assert_eq!(store.recent("a", 10)[0].text, "hello a");
        assert_eq!(store.session_count(), 2);
    }

    // ---- clear ----

    #[test]
    fn test_clear_is_idempotent() {
        let store = store();
        store.append("s1", Turn::user("hi"));
        store.record("s1", Milestone::EmailSent);
        store.clear("s1");
        store.clear("s1");
        assert!(store.recent("s1", 10).is_empty());
        assert_eq!(store.stats("s1"), MemoryStats::default());
    }

    // ---- stats / summary ----

    #[test]
    fn test_stats_timestamps_and_milestones() {
        let store = store();
        store.append("s1", Turn::user("send it"));
        store.append("s1", Turn::assistant("Email sent"));
        store.record("s1", Milestone::EmailSent);

        let stats = store.stats("s1");
        assert!(stats.exists);
        assert_eq!(stats.emails_sent, 1);
        assert_eq!(stats.documents_created, 0);
        assert!(stats.oldest_timestamp.unwrap() <= stats.newest_timestamp.unwrap());
        assert!(!stats.has_summary);
    }

    #[test]
    fn test_summary_after_threshold() {
        let store = MemoryStore::new(10, 4);
        store.append("s1", Turn::user("please email the quarterly numbers to finance"));
        store.append("s1", Turn::assistant("Email sent to finance@corp.com"));
        store.record("s1", Milestone::EmailSent);
        assert!(store.summary("s1").is_none());

        store.append("s1", Turn::user("thanks"));
        store.append("s1", Turn::assistant("You're welcome!"));
        let summary = store.summary("s1").unwrap();
        assert_eq!(
            summary,
            "Sent 1 emails; Discussed: please email the quarterly numbers to finance..."
        );
        assert!(store.stats("s1").has_summary);
    }

    #[test]
    fn test_summary_general_conversation() {
        let store = MemoryStore::new(10, 2);
        store.append("s1", Turn::user("hi"));
        store.append("s1", Turn::assistant("hello"));
        assert_eq!(store.summary("s1").unwrap(), "General conversation");
    }

    #[test]
    fn test_search_case_insensitive() {
        let store = store();
        store.append("s1", Turn::user("Create a PDF titled Budget"));
        store.append("s1", Turn::assistant("Created Budget.pdf"));
        store.append("s1", Turn::user("thanks"));
        assert_eq!(store.search("s1", "budget").len(), 2);
        assert!(store.search("s1", "payroll").is_empty());
    }

    #[test]
    fn test_context_summary() {
        let store = store();
        assert_eq!(store.context_summary("s1"), "No previous conversation.");
        store.append("s1", Turn::user("hi"));
        assert!(store.context_summary("s1").contains("Messages exchanged: 1."));
    }

    // ---- pending clarification ----

    #[test]
    fn test_pending_round_trip() {
        let store = store();
        let mut arguments = Arguments::new();
        arguments.insert("name", "John".into());
        store.set_pending(
            "s1",
            PendingCall {
                tool: ToolKind::AddEmployee,
                arguments,
                missing: vec!["role".to_string()],
            },
        );
        assert_eq!(store.pending("s1").unwrap().tool, ToolKind::AddEmployee);
        assert!(store.take_pending("s1").is_some());
        assert!(store.take_pending("s1").is_none());
    }

    #[test]
    fn test_clear_drops_pending() {
        let store = store();
        store.set_pending(
            "s1",
            PendingCall {
                tool: ToolKind::SendEmail,
                arguments: Arguments::new(),
                missing: vec!["to".to_string()],
            },
        );
        store.clear("s1");
        assert!(store.pending("s1").is_none());
    }
}
