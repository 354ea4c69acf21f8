//! Chat orchestrator: the agent loop.
//!
//! One call to [`ChatOrchestrator::handle_message`] is one turn: read
//! memory, route, extract, dispatch, compose the reply, write memory.

use std::sync::Arc;

use tracing::{debug, info, warn};

use debai_action::completion::keyword::{small_talk, SmallTalk, CAPABILITIES};
use debai_action::completion::{CompletionService, Routing, RoutingRequest};
use debai_action::error::{ActionError, CompletionError, ExtractionError};
use debai_action::extract::ParameterExtractor;
use debai_action::handler::{ActionDispatcher, DispatchContext};
use debai_action::registry::ToolRegistry;
use debai_action::types::{ActionDetail, Arguments, ToolCall, ToolDeclaration, ToolKind};
use debai_core::types::Turn;

use crate::error::ChatError;
use crate::files::SessionFiles;
use crate::memory::MemoryStore;
use crate::response::ReplyComposer;
use crate::state::{TurnState, TurnTrace};
use crate::types::{ChatConfig, Milestone, PendingCall, TurnOutcome};

/// Where routing sent this turn.
enum Decision {
    Reply(String),
    Fail(String),
    Tool {
        kind: ToolKind,
        known: Arguments,
    },
}

/// Reply text plus what the turn produced.
struct Composed {
    reply: String,
    milestone: Option<Milestone>,
    generated_files: Vec<String>,
}

impl Composed {
    fn text(reply: String) -> Self {
        Self {
            reply,
            milestone: None,
            generated_files: Vec::new(),
        }
    }
}

fn fallback_reply() -> String {
    format!("I'm not sure what you'd like me to do. {}", CAPABILITIES)
}

/// Central coordinator for chat turns.
pub struct ChatOrchestrator {
    config: ChatConfig,
    registry: ToolRegistry,
    oracle: Arc<dyn CompletionService>,
    extractor: ParameterExtractor,
    dispatcher: ActionDispatcher,
    memory: Arc<MemoryStore>,
    files: SessionFiles,
    composer: ReplyComposer,
}

impl ChatOrchestrator {
    pub fn new(
        config: ChatConfig,
        oracle: Arc<dyn CompletionService>,
        dispatcher: ActionDispatcher,
        memory: Arc<MemoryStore>,
        files: SessionFiles,
    ) -> Self {
        Self {
            config,
            registry: ToolRegistry::builtin(),
            extractor: ParameterExtractor::new(Arc::clone(&oracle)),
            oracle,
            dispatcher,
            memory,
            files,
            composer: ReplyComposer::default(),
        }
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn files(&self) -> &SessionFiles {
        &self.files
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Handle one user message for `session`.
    ///
    /// Transport failures of the completion service propagate and leave
    /// memory untouched; everything else becomes a reply.
    pub async fn handle_message(
        &self,
        session: &str,
        message: &str,
    ) -> Result<TurnOutcome, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        let mut trace = TurnTrace::new();
        let decision = self.decide(session, message).await?;
        trace.advance(TurnState::Routed)?;

        let (composed, tool) = match decision {
            Decision::Reply(reply) => {
                trace.advance(TurnState::Replied)?;
                (Composed::text(reply), None)
            }
            Decision::Fail(reply) => {
                trace.advance(TurnState::Failed)?;
                (Composed::text(reply), None)
            }
            Decision::Tool { kind, known } => {
                let composed = self.run_tool(session, message, kind, known, &mut trace).await?;
                (composed, Some(kind))
            }
        };

        self.memory.append(session, Turn::user(message));
        self.memory.append(session, Turn::assistant(composed.reply.clone()));
        if let Some(milestone) = composed.milestone {
            self.memory.record(session, milestone);
        }
        if trace.current() == TurnState::Replied {
            trace.advance(TurnState::Logged)?;
        }

        let state = trace.current();
        info!(
            session = %session,
            tool = ?tool.map(|k| k.as_str()),
            state = %state,
            "Turn handled"
        );
        Ok(TurnOutcome {
            reply: composed.reply,
            state,
            tool,
            trace: trace.into_visited(),
            generated_files: composed.generated_files,
        })
    }

    /// Route the message, taking any pending clarification into account.
    async fn decide(&self, session: &str, message: &str) -> Result<Decision, ChatError> {
        let talk = small_talk(message);
        let pending = self.memory.pending(session);

        if talk == Some(SmallTalk::Cancel) && pending.is_some() {
            self.memory.take_pending(session);
            return Ok(Decision::Reply(self.composer.cancelled()));
        }
        // Small talk never continues a pending call.
        let continuation = pending.filter(|_| talk.is_none());

        let context = self.memory.recent(session, self.config.context_turns);
        let summary = self.memory.summary(session);
        let request = RoutingRequest {
            message,
            context: &context,
            summary: summary.as_deref(),
            menu: self.registry.list(),
        };
        let routing = match self.oracle.select_tool(&request).await {
            Ok(routing) => Some(routing),
            Err(CompletionError::Malformed(reason)) => {
                warn!(session = %session, reason = %reason, "Malformed routing output, treating as no tool");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let decision = match (routing, continuation) {
            (Some(Routing::Tool(choice)), continuation) => match self.registry.get(&choice.name) {
                Err(_) => Decision::Fail(self.composer.unknown_tool(&choice.name, &self.registry)),
                Ok(decl) => match continuation {
                    Some(pending) if pending.tool == decl.kind => Decision::Tool {
                        kind: pending.tool,
                        known: pending.arguments,
                    },
                    Some(pending) if choice.confidence < self.config.min_confidence => {
                        Decision::Tool {
                            kind: pending.tool,
                            known: pending.arguments,
                        }
                    }
                    _ if choice.confidence < self.config.min_confidence => {
                        debug!(tool = %decl.kind, confidence = choice.confidence, "Tool choice below threshold");
                        Decision::Fail(self.composer.low_confidence(decl))
                    }
                    _ => Decision::Tool {
                        kind: decl.kind,
                        known: Arguments::new(),
                    },
                },
            },
            (_, Some(pending)) => Decision::Tool {
                kind: pending.tool,
                known: pending.arguments,
            },
            (Some(Routing::Reply(reply)), None) if !reply.trim().is_empty() => {
                Decision::Reply(reply)
            }
            (_, None) => Decision::Reply(fallback_reply()),
        };

        // A new routing supersedes the stored clarification.
        if !matches!(decision, Decision::Reply(_)) {
            self.memory.take_pending(session);
        }
        Ok(decision)
    }

    /// Extract, dispatch and compose for one tool.
    async fn run_tool(
        &self,
        session: &str,
        message: &str,
        kind: ToolKind,
        known: Arguments,
        trace: &mut TurnTrace,
    ) -> Result<Composed, ChatError> {
        let decl = self.registry.get_kind(kind);
        let extracted = self.extractor.extract(message, decl, &known).await;
        trace.advance(TurnState::ArgsExtracted)?;

        let arguments = match extracted {
            Ok(arguments) => arguments,
            Err(ExtractionError::Oracle(e)) => return Err(e.into()),
            Err(err) => {
                trace.advance(TurnState::Failed)?;
                self.remember_partial(session, decl, &err);
                return Ok(Composed::text(self.composer.extraction(decl, &err)));
            }
        };

        let call = match ToolCall::from_arguments(kind, &arguments) {
            Ok(call) => call,
            Err(err) => {
                trace.advance(TurnState::Failed)?;
                let reason = match err {
                    ActionError::InvalidArguments { reason, .. } => reason,
                    other => other.to_string(),
                };
                return Ok(Composed::text(self.composer.invalid_arguments(&reason)));
            }
        };

        let ctx = DispatchContext {
            session: session.to_string(),
            attachments: match kind {
                ToolKind::SendEmail | ToolKind::EmailEmployees => {
                    self.files.attachments(session).await?
                }
                _ => Vec::new(),
            },
            output_dir: self.files.output_dir(session),
        };

        trace.advance(TurnState::Invoked)?;
        let composed = match self.dispatcher.dispatch(call, &ctx).await {
            Ok(result) => {
                let milestone = match result.detail {
                    ActionDetail::EmailSent { .. } | ActionDetail::EmailBroadcast { .. } => {
                        Some(Milestone::EmailSent)
                    }
                    ActionDetail::DocumentCreated { .. } => Some(Milestone::DocumentCreated),
                    _ => None,
                };
                let generated_files = match &result.detail {
                    ActionDetail::DocumentCreated { filename, .. } => vec![filename.clone()],
                    _ => Vec::new(),
                };
                Composed {
                    reply: self.composer.success(&result),
                    milestone,
                    generated_files,
                }
            }
            Err(e) if e.is_infrastructure() => return Err(e.into()),
            Err(e) => Composed::text(self.composer.collaborator_error(&e)),
        };
        trace.advance(TurnState::Replied)?;
        Ok(composed)
    }

    fn remember_partial(&self, session: &str, decl: &ToolDeclaration, err: &ExtractionError) {
        let missing = match err {
            ExtractionError::Incomplete { missing, .. } => missing.clone(),
            ExtractionError::Ambiguous { params, .. } => params.clone(),
            ExtractionError::Oracle(_) => return,
        };
        let arguments = err.partial().cloned().unwrap_or_default();
        debug!(
            session = %session,
            tool = %decl.kind,
            missing = ?missing,
            "Awaiting clarification"
        );
        self.memory.set_pending(
            session,
            PendingCall {
                tool: decl.kind,
                arguments,
                missing,
            },
        );
    }

    /// Tool selection only. Reads no memory and writes none.
    pub async fn route(&self, message: &str) -> Result<Routing, ChatError> {
        let request = RoutingRequest {
            message,
            context: &[],
            summary: None,
            menu: self.registry.list(),
        };
        match self.oracle.select_tool(&request).await {
            Ok(routing) => Ok(routing),
            Err(CompletionError::Malformed(_)) => Ok(Routing::Reply(fallback_reply())),
            Err(e) => Err(e.into()),
        }
    }

    /// Forget the session: memory, pending clarification and files.
    pub async fn clear_session(&self, session: &str) -> Result<(), ChatError> {
        self.memory.clear(session);
        self.files.clear(session).await?;
        info!(session = %session, "Session cleared");
        Ok(())
    }

    pub fn history(&self, session: &str, limit: usize) -> Vec<Turn> {
        self.memory.recent(session, limit)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Map, Value};

    use debai_action::completion::{KeywordRouter, ToolChoice};
    use debai_action::error::CollaboratorError;
    use debai_action::handler::{
        EmailSender, EmployeeDirectory, FileRenderer, OutgoingEmail, SqliteDirectory,
    };
    use debai_core::types::{Employee, EmployeeField, EmployeeFilter, NewEmployee, Role};
    use debai_storage::{Database, EmployeeRepository};

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl EmailSender for RecordingMailer {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, email: &OutgoingEmail) -> Result<(), CollaboratorError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    /// Counts calls to a real SQLite directory.
    struct CountingDirectory {
        inner: SqliteDirectory,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmployeeDirectory for CountingDirectory {
        async fn add(&self, employee: &NewEmployee) -> Result<Employee, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.add(employee).await
        }

        async fn query(&self, filter: &EmployeeFilter) -> Result<Vec<Employee>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.query(filter).await
        }

        async fn update(
            &self,
            name: &str,
            field: EmployeeField,
            value: &str,
        ) -> Result<Vec<Employee>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.update(name, field, value).await
        }

        async fn delete(&self, name: &str) -> Result<Vec<Employee>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(name).await
        }
    }

    /// Oracle whose routing always fails with the given error.
    struct FailingOracle(CompletionError);

    #[async_trait]
    impl CompletionService for FailingOracle {
        fn name(&self) -> &str {
            "failing"
        }

        async fn select_tool(&self, _request: &RoutingRequest<'_>) -> Result<Routing, CompletionError> {
            Err(self.0.clone())
        }

        async fn extract(
            &self,
            _text: &str,
            _decl: &ToolDeclaration,
        ) -> Result<Map<String, Value>, CompletionError> {
            Err(self.0.clone())
        }
    }

    /// Oracle that always picks one tool with a fixed confidence and
    /// leaves extraction to the marker parser.
    struct FixedChoice(&'static str, f32);

    #[async_trait]
    impl CompletionService for FixedChoice {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn select_tool(&self, _request: &RoutingRequest<'_>) -> Result<Routing, CompletionError> {
            Ok(Routing::Tool(ToolChoice {
                name: self.0.to_string(),
                confidence: self.1,
            }))
        }

        async fn extract(
            &self,
            _text: &str,
            _decl: &ToolDeclaration,
        ) -> Result<Map<String, Value>, CompletionError> {
            Ok(Map::new())
        }
    }

    struct Harness {
        orchestrator: ChatOrchestrator,
        mailer: Arc<RecordingMailer>,
        directory: Arc<CountingDirectory>,
        _dir: tempfile::TempDir,
    }

    fn harness_with(oracle: Arc<dyn CompletionService>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::in_memory().unwrap());
        let directory = Arc::new(CountingDirectory {
            inner: SqliteDirectory::new(Arc::new(EmployeeRepository::new(db))),
            calls: AtomicUsize::new(0),
        });
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&mailer) as Arc<dyn EmailSender>,
            Arc::clone(&directory) as Arc<dyn EmployeeDirectory>,
            Arc::new(FileRenderer::new()),
            "DebAI Assistant",
        );
        let files = SessionFiles::new(dir.path().join("uploads"), dir.path().join("generated"), 1024 * 1024);
        let orchestrator = ChatOrchestrator::new(
            ChatConfig::default(),
            oracle,
            dispatcher,
            Arc::new(MemoryStore::new(50, 40)),
            files,
        );
        Harness {
            orchestrator,
            mailer,
            directory,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(KeywordRouter::new()))
    }

    // ---- validation ----

    #[tokio::test]
    async fn test_empty_and_long_messages_rejected() {
        let h = harness();
        assert!(matches!(
            h.orchestrator.handle_message("s1", "   ").await,
            Err(ChatError::EmptyMessage)
        ));
        let long = "a".repeat(4001);
        assert!(matches!(
            h.orchestrator.handle_message("s1", &long).await,
            Err(ChatError::MessageTooLong(4000))
        ));
        assert!(h.orchestrator.history("s1", 10).is_empty());
    }

    // ---- tool turns ----

    #[tokio::test]
    async fn test_add_employee_turn() {
        let h = harness();
        let outcome = h
            .orchestrator
            .handle_message(
                "s1",
                "add Rahul Saha (backend developer) with email rahul@gmail.com and phone 8394847563",
            )
            .await
            .unwrap();
        assert_eq!(outcome.state, TurnState::Logged);
        assert_eq!(outcome.tool, Some(ToolKind::AddEmployee));
        assert!(outcome.reply.contains("Rahul Saha"));
        assert_eq!(
            outcome.trace,
            vec![
                TurnState::Received,
                TurnState::Routed,
                TurnState::ArgsExtracted,
                TurnState::Invoked,
                TurnState::Replied,
                TurnState::Logged,
            ]
        );
        assert_eq!(h.orchestrator.history("s1", 10).len(), 2);
    }

    #[tokio::test]
    async fn test_user_turn_logged_before_reply() {
        let h = harness();
        let message = "list all backend developers";
        let outcome = h.orchestrator.handle_message("s1", message).await.unwrap();

        let history = h.orchestrator.history("s1", 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text, message);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].text, outcome.reply);

        h.orchestrator.handle_message("s1", "thanks").await.unwrap();
        let roles: Vec<_> = h
            .orchestrator
            .history("s1", 10)
            .iter()
            .map(|t| t.role)
            .collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_update_and_delete_employee_turns() {
        let h = harness();
        h.orchestrator
            .handle_message(
                "s1",
                "add Rahul Saha (backend developer) with email rahul@gmail.com and phone 8394847563",
            )
            .await
            .unwrap();

        let outcome = h
            .orchestrator
            .handle_message("s1", "update Rahul Saha's phone number to 9876543210")
            .await
            .unwrap();
        assert_eq!(outcome.tool, Some(ToolKind::UpdateEmployee));
        assert_eq!(outcome.state, TurnState::Logged);
        assert!(outcome.reply.contains("9876543210"), "{}", outcome.reply);

        let outcome = h
            .orchestrator
            .handle_message("s1", "delete employee Rahul Saha from the database")
            .await
            .unwrap();
        assert_eq!(outcome.tool, Some(ToolKind::DeleteEmployee));
        assert!(outcome.reply.contains("Removed Rahul Saha"), "{}", outcome.reply);

        let outcome = h
            .orchestrator
            .handle_message("s1", "delete employee Rahul Saha from the database")
            .await
            .unwrap();
        assert_eq!(outcome.state, TurnState::Logged);
        assert_eq!(
            outcome.reply,
            "I couldn't find an employee named 'Rahul Saha' in the directory."
        );
        assert_eq!(h.orchestrator.history("s1", 10).len(), 6);
    }

    #[tokio::test]
    async fn test_send_email_signs_and_counts_milestone() {
        let h = harness();
        let outcome = h
            .orchestrator
            .handle_message("s1", "send an email to boss@corp.com about lunch saying See you tomorrow.")
            .await
            .unwrap();
        assert_eq!(outcome.state, TurnState::Logged);
        assert!(outcome.reply.contains("boss@corp.com"));

        let sent = h.mailer.sent.lock().unwrap();
        assert_eq!(sent[0].body, "See you tomorrow.\n\nBest regards,\nDebAI Assistant");
        drop(sent);
        assert_eq!(h.orchestrator.memory().stats("s1").emails_sent, 1);
    }

    #[tokio::test]
    async fn test_uploads_are_attached() {
        let h = harness();
        h.orchestrator
            .files()
            .save_upload("s1", "plan.txt", b"plan")
            .await
            .unwrap();
        h.orchestrator
            .handle_message("s1", "send an email to boss@corp.com about plan saying attached")
            .await
            .unwrap();
        let sent = h.mailer.sent.lock().unwrap();
        assert_eq!(sent[0].attachments.len(), 1);
        assert!(sent[0].attachments[0].ends_with("plan.txt"));
    }

    #[tokio::test]
    async fn test_create_document_reports_generated_file() {
        let h = harness();
        let outcome = h
            .orchestrator
            .handle_message("s1", "create a pdf titled Q3 Summary")
            .await
            .unwrap();
        assert_eq!(outcome.generated_files, vec!["Q3_Summary.pdf"]);
        let list = h.orchestrator.files().list("s1").await.unwrap();
        assert_eq!(list.generated, vec!["Q3_Summary.pdf"]);
        assert_eq!(h.orchestrator.memory().stats("s1").documents_created, 1);
    }

    #[tokio::test]
    async fn test_duplicate_employee_is_a_reply() {
        let h = harness();
        let msg = "store name Sayandip Roy as data scientist email sayandip@gmail.com phone 92374626373";
        h.orchestrator.handle_message("s1", msg).await.unwrap();
        let outcome = h.orchestrator.handle_message("s1", msg).await.unwrap();
        assert_eq!(outcome.state, TurnState::Logged);
        assert_eq!(outcome.reply, "That employee already exists in the directory.");
    }

    // ---- clarification ----

    #[tokio::test]
    async fn test_incomplete_asks_for_missing_fields() {
        let h = harness();
        let outcome = h
            .orchestrator
            .handle_message("s1", "add employee John")
            .await
            .unwrap();
        assert_eq!(outcome.state, TurnState::Failed);
        assert!(outcome.reply.contains("role"));
        assert!(outcome.reply.contains("email"));
        assert!(outcome.reply.contains("phone"));
        assert_eq!(h.directory.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.orchestrator.history("s1", 10).len(), 2);
        assert!(h.orchestrator.memory().pending("s1").is_some());
    }

    #[tokio::test]
    async fn test_clarification_continues_pending_call() {
        let h = harness();
        h.orchestrator
            .handle_message("s1", "add employee John")
            .await
            .unwrap();
        let outcome = h
            .orchestrator
            .handle_message("s1", "designer, john@corp.com, 9876543210")
            .await
            .unwrap();
        assert_eq!(outcome.state, TurnState::Logged);
        assert_eq!(outcome.tool, Some(ToolKind::AddEmployee));
        assert!(outcome.reply.starts_with("Added John (designer)"));
        assert!(h.orchestrator.memory().pending("s1").is_none());
    }

    #[tokio::test]
    async fn test_cancel_drops_pending_call() {
        let h = harness();
        h.orchestrator
            .handle_message("s1", "add employee John")
            .await
            .unwrap();
        let outcome = h.orchestrator.handle_message("s1", "never mind").await.unwrap();
        assert_eq!(outcome.reply, "Okay, nothing was done.");
        assert_eq!(outcome.state, TurnState::Logged);
        assert!(h.orchestrator.memory().pending("s1").is_none());
    }

    #[tokio::test]
    async fn test_thanks_keeps_pending_call() {
        let h = harness();
        h.orchestrator
            .handle_message("s1", "add employee John")
            .await
            .unwrap();
        let outcome = h.orchestrator.handle_message("s1", "thanks").await.unwrap();
        assert_eq!(outcome.tool, None);
        assert!(h.orchestrator.memory().pending("s1").is_some());
    }

    // ---- conversational and failure paths ----

    #[tokio::test]
    async fn test_unrecognised_input_is_conversational() {
        let h = harness();
        let outcome = h
            .orchestrator
            .handle_message("s1", "what is the weather like on mars")
            .await
            .unwrap();
        assert_eq!(outcome.state, TurnState::Logged);
        assert_eq!(
            outcome.trace,
            vec![
                TurnState::Received,
                TurnState::Routed,
                TurnState::Replied,
                TurnState::Logged
            ]
        );
        assert_eq!(h.orchestrator.history("s1", 10).len(), 2);
        assert_eq!(h.directory.calls.load(Ordering::SeqCst), 0);
        assert!(h.mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_with_menu() {
        let h = harness_with(Arc::new(FixedChoice("launch_rocket", 0.9)));
        let outcome = h.orchestrator.handle_message("s1", "launch it").await.unwrap();
        assert_eq!(outcome.state, TurnState::Failed);
        assert!(outcome.reply.contains("launch_rocket"));
        assert!(outcome.reply.contains("send_email"));
    }

    #[tokio::test]
    async fn test_low_confidence_fails() {
        let h = harness_with(Arc::new(FixedChoice("list_employees", 0.2)));
        let outcome = h.orchestrator.handle_message("s1", "hmm people").await.unwrap();
        assert_eq!(outcome.state, TurnState::Failed);
        assert_eq!(h.directory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_leaves_memory_unchanged() {
        let h = harness_with(Arc::new(FailingOracle(CompletionError::Timeout(
            Duration::from_secs(30),
        ))));
        let err = h
            .orchestrator
            .handle_message("s1", "list all employees")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::TransportTimeout(_)));
        assert!(h.orchestrator.history("s1", 10).is_empty());
        assert!(!h.orchestrator.memory().stats("s1").exists);
    }

    #[tokio::test]
    async fn test_unreachable_is_upstream() {
        let h = harness_with(Arc::new(FailingOracle(CompletionError::Unreachable(
            "refused".to_string(),
        ))));
        let err = h.orchestrator.route("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_malformed_routing_is_no_tool() {
        let h = harness_with(Arc::new(FailingOracle(CompletionError::Malformed(
            "not json".to_string(),
        ))));
        let outcome = h.orchestrator.handle_message("s1", "hello").await.unwrap();
        assert_eq!(outcome.tool, None);
        assert!(outcome.reply.starts_with("I'm not sure"));
    }

    // ---- session management ----

    #[tokio::test]
    async fn test_clear_session() {
        let h = harness();
        h.orchestrator
            .handle_message("s1", "create a pdf titled Q3 Summary")
            .await
            .unwrap();
        h.orchestrator.clear_session("s1").await.unwrap();
        assert!(h.orchestrator.history("s1", 10).is_empty());
        assert_eq!(h.orchestrator.files().list("s1").await.unwrap().total_count(), 0);
    }
}
