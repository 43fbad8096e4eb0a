use serde::{Deserialize, Serialize};
use tracing::debug;

use super::document::ProjectDocument;
use super::error::{StoreError, StoreResult};
use super::message::{Message, new_id};
use super::model_type::ModelType;
use super::schema_extractor::extract_schema;
use crate::prompts;

/// A user's workspace: one conversation, its documents and the derived schema.
///
/// The message list is only reachable through the mutation methods below so
/// that every change re-runs schema extraction on the newest message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    messages: Vec<Message>,
    #[serde(default)]
    documents: Vec<ProjectDocument>,
    #[serde(default)]
    schema_code: String,
}

impl Project {
    /// Create a project seeded with a welcome message and an empty schema
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let welcome = Message::ai(prompts::welcome_message(&name), Some(ModelType::Expert));

        Self {
            id: new_id(),
            name,
            description: String::new(),
            messages: vec![welcome],
            documents: Vec::new(),
            schema_code: String::new(),
        }
    }

    /// The sample project present on first start
    pub fn demo() -> Self {
        let mut intro = Message::ai(prompts::INITIAL_MESSAGE, Some(ModelType::Expert));
        intro.id = "init".to_string();

        Self {
            id: prompts::DEFAULT_PROJECT_ID.to_string(),
            name: prompts::DEFAULT_PROJECT_NAME.to_string(),
            description: prompts::DEFAULT_PROJECT_DESCRIPTION.to_string(),
            messages: vec![intro],
            documents: vec![ProjectDocument::new(
                prompts::DEFAULT_DOCUMENT_TITLE,
                prompts::DEFAULT_DOCUMENT_CONTENT,
            )],
            schema_code: prompts::DEFAULT_SCHEMA.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn documents(&self) -> &[ProjectDocument] {
        &self.documents
    }

    pub fn document(&self, doc_id: &str) -> Option<&ProjectDocument> {
        self.documents.iter().find(|d| d.id == doc_id)
    }

    pub fn schema_code(&self) -> &str {
        &self.schema_code
    }

    pub fn has_placeholder(&self) -> bool {
        self.messages.iter().any(Message::is_thinking)
    }

    pub fn set_details(&mut self, name: String, description: String) {
        self.name = name;
        self.description = description;
    }

    /// Direct schema edit, bypassing extraction
    pub fn set_schema_code(&mut self, code: impl Into<String>) {
        self.schema_code = code.into();
    }

    /// Append a message at the end of the conversation
    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
        self.refresh_schema();
    }

    /// Replace the message with `match_id` in place.
    /// Returns false (and changes nothing) when no message matches.
    pub fn replace_message(&mut self, match_id: &str, new_message: Message) -> bool {
        let Some(slot) = self.messages.iter_mut().find(|m| m.id == match_id) else {
            return false;
        };
        *slot = new_message;
        self.refresh_schema();
        true
    }

    /// Drop every message matching `predicate`, returning how many were removed
    pub fn remove_messages_matching(&mut self, predicate: impl Fn(&Message) -> bool) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !predicate(m));
        let removed = before - self.messages.len();
        if removed > 0 {
            self.refresh_schema();
        }
        removed
    }

    /// Remove placeholders left behind by requests that never resolved,
    /// e.g. in a workspace saved while a request was pending
    pub fn drop_placeholders(&mut self) -> usize {
        let removed = self.remove_messages_matching(Message::is_thinking);
        if removed > 0 {
            debug!(project_id = %self.id, removed, "Dropped orphaned placeholders");
        }
        removed
    }

    pub fn add_document(&mut self, document: ProjectDocument) {
        self.documents.push(document);
    }

    pub fn update_document(&mut self, doc_id: &str, content: String) -> StoreResult<()> {
        let doc = self
            .documents
            .iter_mut()
            .find(|d| d.id == doc_id)
            .ok_or_else(|| StoreError::DocumentNotFound(doc_id.to_string()))?;
        doc.set_content(content);
        Ok(())
    }

    pub fn delete_document(&mut self, doc_id: &str) -> StoreResult<ProjectDocument> {
        let index = self
            .documents
            .iter()
            .position(|d| d.id == doc_id)
            .ok_or_else(|| StoreError::DocumentNotFound(doc_id.to_string()))?;
        Ok(self.documents.remove(index))
    }

    fn refresh_schema(&mut self) {
        if let Some(schema) = extract_schema(self.messages.last()) {
            debug!(project_id = %self.id, "Schema extracted from latest AI message");
            self.schema_code = schema;
        }
    }
}
