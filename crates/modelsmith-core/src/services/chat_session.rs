use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::gateway::{CompletionGateway, GatewayError, GenerateRequest};
use crate::models::{
    Attachment, Message, ModelType, Project, ProjectsStore, RequestCoordinator, RequestTicket,
    StoreError, StoreResult, WorkspaceSnapshot,
};
use crate::prompts;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications for whoever renders the session.
/// Each variant carries `project_id` so subscribers can filter.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    RequestStarted {
        project_id: String,
        request_id: String,
        model: ModelType,
    },
    RequestCompleted {
        project_id: String,
        request_id: String,
    },
    RequestFailed {
        project_id: String,
        request_id: String,
        error: String,
    },
    RequestStopped {
        project_id: String,
        request_id: String,
    },
    ResponseDiscarded {
        project_id: String,
        request_id: String,
    },
    SchemaUpdated {
        project_id: String,
    },
}

/// How a `send` call ended
#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    /// The placeholder was replaced by the response
    Completed,
    /// The placeholder was replaced by an error message
    Failed(GatewayError),
    /// The request was stopped or superseded; its result had no effect
    Discarded,
}

struct SessionState {
    store: ProjectsStore,
    coordinator: RequestCoordinator,
}

/// One UI session: the project state, the single tracked request and the
/// gateway used to answer it.
///
/// Cloning is cheap and every clone shares the same state. All mutations
/// happen synchronously under one lock; the lock is never held while
/// waiting on the gateway.
#[derive(Clone)]
pub struct ChatSession {
    state: Arc<Mutex<SessionState>>,
    gateway: Arc<dyn CompletionGateway>,
    events: broadcast::Sender<SessionEvent>,
    request_timeout: Option<Duration>,
}

impl ChatSession {
    pub fn new(store: ProjectsStore, gateway: Arc<dyn CompletionGateway>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(SessionState {
                store,
                coordinator: RequestCoordinator::new(),
            })),
            gateway,
            events,
            request_timeout: None,
        }
    }

    /// Bound how long a single gateway call may take
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // --- Requests ---

    /// Send a user turn to the active project and wait for the AI response.
    ///
    /// The user message and a placeholder are appended immediately. When the
    /// gateway resolves, the placeholder is replaced by the response (or by an
    /// error message), unless the request was stopped or superseded in the
    /// meantime, in which case the result is dropped.
    pub async fn send(
        &self,
        text: &str,
        model: ModelType,
        attachments: Vec<Attachment>,
    ) -> StoreResult<SendOutcome> {
        let project_id = self.state.lock().store.active_id().to_string();
        self.send_to(&project_id, text, model, attachments).await
    }

    /// Like [`send`](Self::send), but for an explicit project
    pub async fn send_to(
        &self,
        project_id: &str,
        text: &str,
        model: ModelType,
        attachments: Vec<Attachment>,
    ) -> StoreResult<SendOutcome> {
        let (ticket, request) = {
            let mut state = self.state.lock();
            if state.store.get(project_id).is_none() {
                return Err(StoreError::ProjectNotFound(project_id.to_string()));
            }

            // A request still in flight is superseded; settle its placeholder first
            if let Some(previous) = state.coordinator.stop() {
                Self::settle_stopped(&mut state.store, &previous);
                self.emit(SessionEvent::RequestStopped {
                    project_id: previous.project_id.clone(),
                    request_id: previous.request_id.clone(),
                });
            }

            state
                .store
                .append_message(project_id, Message::user(text, attachments.clone()))?;

            let history = state
                .store
                .get(project_id)
                .map(|p| p.messages().to_vec())
                .unwrap_or_default();
            let request = GenerateRequest::from_messages(text, model, &history, attachments);

            let placeholder = Message::placeholder(model);
            let ticket = state.coordinator.begin(project_id, &placeholder.id, model);
            state.store.append_message(project_id, placeholder)?;
            (ticket, request)
        };

        info!(
            project_id = %ticket.project_id,
            request_id = %ticket.request_id,
            model = %model,
            "Sending message"
        );
        self.emit(SessionEvent::RequestStarted {
            project_id: ticket.project_id.clone(),
            request_id: ticket.request_id.clone(),
            model,
        });

        let result = self.call_gateway(request, &ticket).await;
        Ok(self.resolve(&ticket, result))
    }

    async fn call_gateway(
        &self,
        request: GenerateRequest,
        ticket: &RequestTicket,
    ) -> Result<String, GatewayError> {
        let call = self.gateway.generate(request, ticket.cancel_flag());
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(GatewayError::Timeout(limit))),
            None => call.await,
        }
    }

    /// Apply a gateway result if `ticket` is still the tracked request
    fn resolve(&self, ticket: &RequestTicket, result: Result<String, GatewayError>) -> SendOutcome {
        let mut state = self.state.lock();

        if !state.coordinator.finish(ticket) {
            debug!(request_id = %ticket.request_id, "Discarding stale response");
            self.emit(SessionEvent::ResponseDiscarded {
                project_id: ticket.project_id.clone(),
                request_id: ticket.request_id.clone(),
            });
            return SendOutcome::Discarded;
        }

        let schema_before = Self::schema_of(&state.store, &ticket.project_id);

        let (outcome, applied) = match result {
            Ok(text) => {
                let reply = Message::ai(text, Some(ticket.model));
                let applied = state
                    .store
                    .replace_message(&ticket.project_id, &ticket.placeholder_id, reply);
                (SendOutcome::Completed, applied)
            }
            Err(error) => {
                warn!(request_id = %ticket.request_id, error = %error, "Completion failed");
                let message =
                    Message::ai(prompts::error_message(&error.to_string()), Some(ticket.model));
                let placeholder_id = ticket.placeholder_id.as_str();
                let applied = state
                    .store
                    .remove_messages_matching(&ticket.project_id, |m| m.id == placeholder_id)
                    .and_then(|_| state.store.append_message(&ticket.project_id, message))
                    .map(|_| true);
                (SendOutcome::Failed(error), applied)
            }
        };

        match applied {
            Ok(true) => {}
            Ok(false) => {
                // The placeholder was edited away while the request was in flight
                warn!(request_id = %ticket.request_id, "Placeholder gone, dropping response");
                self.emit(SessionEvent::ResponseDiscarded {
                    project_id: ticket.project_id.clone(),
                    request_id: ticket.request_id.clone(),
                });
                return SendOutcome::Discarded;
            }
            Err(e) => {
                // The project was deleted while the request was in flight
                warn!(request_id = %ticket.request_id, error = %e, "Dropping response");
                self.emit(SessionEvent::ResponseDiscarded {
                    project_id: ticket.project_id.clone(),
                    request_id: ticket.request_id.clone(),
                });
                return SendOutcome::Discarded;
            }
        }

        match &outcome {
            SendOutcome::Failed(error) => self.emit(SessionEvent::RequestFailed {
                project_id: ticket.project_id.clone(),
                request_id: ticket.request_id.clone(),
                error: error.to_string(),
            }),
            _ => self.emit(SessionEvent::RequestCompleted {
                project_id: ticket.project_id.clone(),
                request_id: ticket.request_id.clone(),
            }),
        }

        if Self::schema_of(&state.store, &ticket.project_id) != schema_before {
            self.emit(SessionEvent::SchemaUpdated {
                project_id: ticket.project_id.clone(),
            });
        }

        debug!(request_id = %ticket.request_id, "Request resolved");
        outcome
    }

    /// Stop the pending request. Its eventual response is discarded and the
    /// placeholder becomes a "stopped" marker. Returns false when idle.
    ///
    /// The network call itself keeps running unless the gateway honors the
    /// cancel flag.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        let Some(ticket) = state.coordinator.stop() else {
            return false;
        };

        Self::settle_stopped(&mut state.store, &ticket);
        info!(request_id = %ticket.request_id, "Generation stopped");
        self.emit(SessionEvent::RequestStopped {
            project_id: ticket.project_id.clone(),
            request_id: ticket.request_id.clone(),
        });
        true
    }

    fn settle_stopped(store: &mut ProjectsStore, ticket: &RequestTicket) {
        let marker = Message::ai(prompts::STOPPED_MARKER, Some(ticket.model));
        match store.replace_message(&ticket.project_id, &ticket.placeholder_id, marker) {
            Ok(true) => {}
            Ok(false) => debug!(request_id = %ticket.request_id, "No placeholder to settle"),
            Err(e) => debug!(request_id = %ticket.request_id, error = %e, "No placeholder to settle"),
        }
    }

    fn schema_of(store: &ProjectsStore, project_id: &str) -> Option<String> {
        store.get(project_id).map(|p| p.schema_code().to_string())
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().coordinator.is_pending()
    }

    // --- Read access ---

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        self.state.lock().store.snapshot()
    }

    pub fn active_project(&self) -> Project {
        self.state.lock().store.active().clone()
    }

    /// Run a read-only query against the store
    pub fn read<R>(&self, f: impl FnOnce(&ProjectsStore) -> R) -> R {
        f(&self.state.lock().store)
    }

    /// Run a mutation against the store under the session lock.
    ///
    /// Message edits made here bypass the request coordinator.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut ProjectsStore) -> R) -> R {
        f(&mut self.state.lock().store)
    }

    // --- Project, document and schema handlers ---

    pub fn create_project(&self, name: &str) -> StoreResult<String> {
        self.state.lock().store.create_project(name)
    }

    pub fn update_project(&self, id: &str, name: &str, description: &str) -> StoreResult<()> {
        self.state.lock().store.update_project(id, name, description)
    }

    pub fn delete_project(&self, id: &str) -> StoreResult<()> {
        self.state.lock().store.delete_project(id).map(|_| ())
    }

    pub fn select_project(&self, id: &str) -> StoreResult<()> {
        self.state.lock().store.set_active(id)
    }

    pub fn add_document(&self, title: &str, content: &str) -> StoreResult<String> {
        self.state.lock().store.add_document(title, content)
    }

    pub fn update_document(&self, doc_id: &str, content: &str) -> StoreResult<()> {
        self.state.lock().store.update_document(doc_id, content)
    }

    pub fn delete_document(&self, doc_id: &str) -> StoreResult<()> {
        self.state.lock().store.delete_document(doc_id)
    }

    pub fn update_schema(&self, code: &str) -> StoreResult<()> {
        let project_id = {
            let mut state = self.state.lock();
            state.store.update_schema(code)?;
            state.store.active_id().to_string()
        };
        self.emit(SessionEvent::SchemaUpdated { project_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sender;
    use crate::services::scripted_gateway::{ScriptedGateway, StaticGateway};

    fn session_with(gateway: impl CompletionGateway) -> ChatSession {
        ChatSession::new(ProjectsStore::default(), Arc::new(gateway))
    }

    #[tokio::test]
    async fn test_successful_send_replaces_placeholder() {
        let session = session_with(StaticGateway::replying("Here is your model."));
        let before = session.active_project().messages().len();

        let outcome = session.send("hello", ModelType::Fast, Vec::new()).await.unwrap();

        assert_eq!(outcome, SendOutcome::Completed);
        let project = session.active_project();
        let messages = project.messages();
        assert_eq!(messages.len(), before + 2);
        assert!(messages.iter().all(|m| !m.is_thinking()));
        let last = messages.last().unwrap();
        assert_eq!(last.sender, Sender::Ai);
        assert_eq!(last.content, "Here is your model.");
        assert_eq!(last.model_used, Some(ModelType::Fast));
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_failed_send_appends_error_message() {
        let session = session_with(StaticGateway::failing(GatewayError::Service(
            "quota exceeded".to_string(),
        )));

        let outcome = session.send("hello", ModelType::Expert, Vec::new()).await.unwrap();

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        let project = session.active_project();
        assert!(!project.has_placeholder());
        let last = project.last_message().unwrap();
        assert_eq!(last.content, "**Error:** quota exceeded");
        assert_eq!(last.model_used, Some(ModelType::Expert));
        assert_eq!(project.messages()[project.messages().len() - 2].content, "hello");
    }

    #[tokio::test]
    async fn test_placeholder_visible_while_pending() {
        let (gateway, mut calls) = ScriptedGateway::new();
        let session = session_with(gateway);

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.send("hi", ModelType::Expert, Vec::new()).await }
        });

        let call = calls.recv().await.unwrap();
        assert!(session.is_loading());
        assert!(session.active_project().has_placeholder());
        assert_eq!(call.request.history.last().unwrap().content, "hi");

        call.succeed("ok");
        assert_eq!(task.await.unwrap().unwrap(), SendOutcome::Completed);
        assert!(!session.active_project().has_placeholder());
    }

    #[tokio::test]
    async fn test_stop_then_stale_response_has_no_effect() {
        let (gateway, mut calls) = ScriptedGateway::new();
        let session = session_with(gateway);

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.send("slow one", ModelType::Expert, Vec::new()).await }
        });
        let call = calls.recv().await.unwrap();

        assert!(session.stop());
        assert!(call.cancel.load(std::sync::atomic::Ordering::Relaxed));
        let after_stop = session.snapshot();
        let last = session.active_project().last_message().cloned().unwrap();
        assert_eq!(last.content, prompts::STOPPED_MARKER);
        assert!(!last.is_thinking());

        call.succeed("```mermaid\nerDiagram\n```");
        assert_eq!(task.await.unwrap().unwrap(), SendOutcome::Discarded);
        assert_eq!(session.snapshot(), after_stop);
    }

    #[tokio::test]
    async fn test_stop_when_idle_changes_nothing() {
        let session = session_with(StaticGateway::replying("x"));
        let before = session.snapshot();
        assert!(!session.stop());
        assert_eq!(session.snapshot(), before);
    }

    #[tokio::test]
    async fn test_second_send_supersedes_first() {
        let (gateway, mut calls) = ScriptedGateway::new();
        let session = session_with(gateway);

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.send("first", ModelType::Fast, Vec::new()).await }
        });
        let first_call = calls.recv().await.unwrap();

        let second = tokio::spawn({
            let session = session.clone();
            async move { session.send("second", ModelType::Fast, Vec::new()).await }
        });
        let second_call = calls.recv().await.unwrap();

        second_call.succeed("answer to second");
        first_call.succeed("answer to first");

        assert_eq!(second.await.unwrap().unwrap(), SendOutcome::Completed);
        assert_eq!(first.await.unwrap().unwrap(), SendOutcome::Discarded);

        let project = session.active_project();
        let contents: Vec<&str> = project.messages()[1..]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(
            contents,
            ["first", prompts::STOPPED_MARKER, "second", "answer to second"]
        );
    }

    #[tokio::test]
    async fn test_timeout_becomes_error_message() {
        let (gateway, mut calls) = ScriptedGateway::new();
        let session = session_with(gateway).with_request_timeout(Duration::from_millis(20));

        let outcome = session.send("hello", ModelType::Fast, Vec::new()).await.unwrap();
        // Keep the call alive until after the timeout fired
        let _call = calls.recv().await.unwrap();

        assert_eq!(
            outcome,
            SendOutcome::Failed(GatewayError::Timeout(Duration::from_millis(20)))
        );
        let project = session.active_project();
        assert!(!project.has_placeholder());
        assert_eq!(
            project.last_message().unwrap().content,
            "**Error:** The AI service did not respond within 0.02 seconds"
        );
    }

    #[tokio::test]
    async fn test_response_lands_in_originating_project() {
        let (gateway, mut calls) = ScriptedGateway::new();
        let session = session_with(gateway);
        let origin = session.read(|store| store.active_id().to_string());

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.send("hello", ModelType::Fast, Vec::new()).await }
        });
        let call = calls.recv().await.unwrap();

        let other = session.create_project("Other").unwrap();
        call.succeed("for origin");
        task.await.unwrap().unwrap();

        session.read(|store| {
            assert_eq!(
                store.get(&origin).unwrap().last_message().unwrap().content,
                "for origin"
            );
            assert_eq!(store.get(&other).unwrap().messages().len(), 1);
        });
    }

    #[tokio::test]
    async fn test_send_after_restoring_pending_workspace() {
        let reply = "```mermaid\nerDiagram\n  ORDER ||--o{ LINE : has\n```";
        let mut saved = ProjectsStore::with_default_project();
        let id = saved.active_id().to_string();
        saved
            .append_message(&id, Message::user("old question", Vec::new()))
            .unwrap();
        saved
            .append_message(&id, Message::placeholder(ModelType::Expert))
            .unwrap();

        let session = ChatSession::new(
            ProjectsStore::from_snapshot(saved.snapshot()),
            Arc::new(StaticGateway::replying(reply)),
        );
        let outcome = session
            .send("new question", ModelType::Expert, Vec::new())
            .await
            .unwrap();

        assert_eq!(outcome, SendOutcome::Completed);
        let project = session.active_project();
        assert!(project.messages().iter().all(|m| !m.is_thinking()));
        let contents: Vec<&str> = project.messages()[1..]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["old question", "new question", reply]);
        assert_eq!(project.schema_code(), "erDiagram\n  ORDER ||--o{ LINE : has\n");
    }

    #[tokio::test]
    async fn test_response_settles_its_own_placeholder() {
        let (gateway, mut calls) = ScriptedGateway::new();
        let session = session_with(gateway);
        let id = session.read(|store| store.active_id().to_string());
        // A placeholder that no request owns, ahead of the real one
        session
            .with_store(|store| store.append_message(&id, Message::placeholder(ModelType::Fast)))
            .unwrap();

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.send("hello", ModelType::Fast, Vec::new()).await }
        });
        calls.recv().await.unwrap().succeed("answer");
        assert_eq!(task.await.unwrap().unwrap(), SendOutcome::Completed);

        let project = session.active_project();
        let messages = project.messages();
        assert_eq!(messages.last().unwrap().content, "answer");
        assert!(messages[1].is_thinking());
        assert_eq!(messages.iter().filter(|m| m.is_thinking()).count(), 1);
    }

    #[tokio::test]
    async fn test_response_discarded_when_placeholder_removed() {
        let (gateway, mut calls) = ScriptedGateway::new();
        let session = session_with(gateway);
        let id = session.read(|store| store.active_id().to_string());
        let mut events = session.subscribe();

        let task = tokio::spawn({
            let session = session.clone();
            async move { session.send("hello", ModelType::Fast, Vec::new()).await }
        });
        let call = calls.recv().await.unwrap();
        session
            .with_store(|store| store.remove_messages_matching(&id, Message::is_thinking))
            .unwrap();

        call.succeed("lost answer");
        assert_eq!(task.await.unwrap().unwrap(), SendOutcome::Discarded);

        let project = session.active_project();
        assert!(project.messages().iter().all(|m| m.content != "lost answer"));
        assert_eq!(project.last_message().unwrap().content, "hello");
        assert!(!session.is_loading());
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::RequestStarted { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::ResponseDiscarded { .. }
        ));
    }

    #[tokio::test]
    async fn test_send_to_targets_given_project() {
        let session = session_with(StaticGateway::replying("for the first one"));
        let first = session.read(|store| store.active_id().to_string());
        let second = session.create_project("Second").unwrap();

        let outcome = session
            .send_to(&first, "hello", ModelType::Fast, Vec::new())
            .await
            .unwrap();

        assert_eq!(outcome, SendOutcome::Completed);
        session.read(|store| {
            assert_eq!(store.active_id(), second);
            assert_eq!(
                store.get(&first).unwrap().last_message().unwrap().content,
                "for the first one"
            );
            assert_eq!(store.get(&second).unwrap().messages().len(), 1);
        });
        assert!(matches!(
            session.send_to("nope", "hello", ModelType::Fast, Vec::new()).await,
            Err(StoreError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_with_store_mutation_is_shared_by_clones() {
        let session = session_with(StaticGateway::replying("x"));
        let clone = session.clone();

        let id = clone.with_store(|store| store.create_project("Shared")).unwrap();

        assert_eq!(session.active_project().id(), id);
        assert_eq!(session.snapshot().projects.len(), 2);
    }

    #[tokio::test]
    async fn test_events_published() {
        let session = session_with(StaticGateway::replying(
            "```mermaid\nclassDiagram\n  class Post\n```",
        ));
        let mut events = session.subscribe();

        session.send("go", ModelType::Fast, Vec::new()).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), SessionEvent::RequestStarted { .. }));
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::RequestCompleted { .. }));
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::SchemaUpdated { .. }));
    }
}
