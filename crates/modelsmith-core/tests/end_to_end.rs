use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;
use parking_lot::Mutex;

use modelsmith_core::models::{Sender, encode_files};
use modelsmith_core::repositories::{WorkspaceJsonRepository, WorkspaceRepository};
use modelsmith_core::services::{GenerateRequest, StaticGateway};
use modelsmith_core::{
    ChatSession, CompletionGateway, GatewayError, ModelType, ProjectsStore, SendOutcome, prompts,
};

const BLOG_SCHEMA: &str = "erDiagram\n    AUTHOR ||--o{ POST : writes\n    POST ||--o{ COMMENT : has\n";

/// Records every request it receives and answers with a fixed text
struct RecordingGateway {
    seen: Mutex<Vec<GenerateRequest>>,
    reply: String,
}

#[async_trait]
impl CompletionGateway for RecordingGateway {
    async fn generate(
        &self,
        request: GenerateRequest,
        _cancel: Arc<AtomicBool>,
    ) -> Result<String, GatewayError> {
        self.seen.lock().push(request);
        Ok(self.reply.clone())
    }
}

#[tokio::test]
async fn test_new_project_conversation_promotes_schema() {
    let reply = format!("Here is the model:\n\n```mermaid\n{BLOG_SCHEMA}```\n\nLet me know.");
    let session = ChatSession::new(
        ProjectsStore::with_default_project(),
        Arc::new(StaticGateway::replying(reply.clone())),
    );

    let id = session.create_project("Alpha").unwrap();
    let outcome = session
        .send("design a blog schema", ModelType::Expert, Vec::new())
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Completed);

    let project = session.active_project();
    assert_eq!(project.id(), id);
    assert_eq!(project.schema_code(), BLOG_SCHEMA);

    let messages = project.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, prompts::welcome_message("Alpha"));
    assert_eq!(messages[1].sender, Sender::User);
    assert_eq!(messages[2].content, reply);
    assert_eq!(messages[2].model_used, Some(ModelType::Expert));
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_attachments_reach_gateway_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let ddl = dir.path().join("shop.sql");
    std::fs::write(&ddl, "CREATE TABLE orders (id INT);").unwrap();
    let missing = dir.path().join("missing.sql");

    let attachments = encode_files(&[ddl, missing]).await;
    assert_eq!(attachments.len(), 1);

    let gateway = Arc::new(RecordingGateway {
        seen: Mutex::new(Vec::new()),
        reply: "Orders look fine.".to_string(),
    });
    let session = ChatSession::new(ProjectsStore::with_default_project(), gateway.clone());

    session
        .send("review this DDL", ModelType::Fast, attachments.clone())
        .await
        .unwrap();

    let seen = gateway.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].attachments, attachments);
    assert_eq!(seen[0].model, ModelType::Fast);
    assert!(seen[0].history.iter().all(|h| !h.content.is_empty()));

    let project = session.active_project();
    let user_turn = &project.messages()[project.messages().len() - 2];
    assert_eq!(user_turn.attachments[0].name, "shop.sql");
    assert_eq!(user_turn.attachments[0].mime_type, "application/sql");
    assert_eq!(
        user_turn.attachments[0].decode_data().unwrap(),
        b"CREATE TABLE orders (id INT);"
    );
}

#[tokio::test]
async fn test_workspace_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let repo = WorkspaceJsonRepository::at(dir.path().join("workspace.json"));

    let session = ChatSession::new(
        ProjectsStore::with_default_project(),
        Arc::new(StaticGateway::failing(GatewayError::Service(
            "quota exceeded".to_string(),
        ))),
    );
    session.create_project("Beta").unwrap();
    let outcome = session
        .send("hello", ModelType::Fast, Vec::new())
        .await
        .unwrap();
    assert!(matches!(outcome, SendOutcome::Failed(_)));
    repo.save(session.snapshot()).await.unwrap();

    let restored = ProjectsStore::from_snapshot(repo.load().await.unwrap().unwrap());
    let project = restored.active();
    assert_eq!(project.name(), "Beta");
    assert_eq!(
        project.messages().last().unwrap().content,
        prompts::error_message("quota exceeded")
    );
    assert!(!project.has_placeholder());
}
