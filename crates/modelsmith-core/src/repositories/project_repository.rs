//! Storage boundary for projects and their related records.
//!
//! Every operation is scoped to the authenticated owner. Records owned by
//! someone else are indistinguishable from records that do not exist.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BoxFuture;
use super::error::{RepositoryError, RepositoryResult};

/// Identity supplied by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reject requests that arrive without an authenticated user
pub fn require_user(user: Option<UserId>) -> RepositoryResult<UserId> {
    user.filter(|u| !u.0.is_empty())
        .ok_or(RepositoryError::Unauthenticated)
}

fn default_project_status() -> String {
    "active".to_string()
}

fn default_document_status() -> String {
    "pending".to_string()
}

fn default_version() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: i64,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_project_status")]
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub project_id: i64,
    pub filename: String,
    pub storage_path: Option<String>,
    pub file_type: Option<String>,
    pub content: Option<String>,
    #[serde(default = "default_document_status")]
    pub status: String,
    pub uploaded_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementRecord {
    pub id: i64,
    pub project_id: i64,
    pub source_document_id: Option<i64>,
    pub title: Option<String>,
    pub analysis_content: String,
    pub structured_data: Option<serde_json::Value>,
    #[serde(default = "default_version")]
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A saved schema design: DDL, diagram and the accompanying report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub id: i64,
    pub project_id: i64,
    pub requirement_id: Option<i64>,
    pub ddl_script: Option<String>,
    pub mermaid_diagram: Option<String>,
    pub design_report: Option<String>,
    #[serde(default = "default_version")]
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: i64,
    pub project_id: i64,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: i64,
    pub chat_id: i64,
    pub role: ChatRole,
    pub content: String,
    pub meta_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A project together with its live related records
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDetails {
    pub project: ProjectRecord,
    pub documents: Vec<DocumentRecord>,
    pub requirements: Vec<RequirementRecord>,
    pub schemas: Vec<SchemaRecord>,
    pub chats: Vec<ChatRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatDetails {
    pub chat: ChatRecord,
    pub messages: Vec<ChatMessageRecord>,
}

// --- Inputs ---

#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// Partial update; `None` leaves the field as is
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub filename: String,
    pub storage_path: Option<String>,
    pub file_type: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewRequirement {
    pub source_document_id: Option<i64>,
    pub title: Option<String>,
    pub analysis_content: String,
    pub structured_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSchema {
    pub requirement_id: Option<i64>,
    pub ddl_script: Option<String>,
    pub mermaid_diagram: Option<String>,
    pub design_report: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewChat {
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub meta_data: Option<serde_json::Value>,
}

pub const MAX_NAME_LEN: usize = 256;

/// Field limits shared by all implementations
pub(crate) fn validate_name(field: &'static str, value: &str) -> RepositoryResult<()> {
    if value.trim().is_empty() || value.chars().count() > MAX_NAME_LEN {
        return Err(RepositoryError::InvalidData {
            message: format!("{field} must be 1-{MAX_NAME_LEN} characters"),
        });
    }
    Ok(())
}

/// Owner-scoped persistence for projects, documents, requirements, schemas and chats.
///
/// Deletes are soft: records get a `deleted_at` stamp and drop out of reads.
pub trait ProjectRepository: Send + Sync + 'static {
    // --- Projects ---

    /// Live projects of `owner`, newest first
    fn list_projects(&self, owner: &UserId) -> BoxFuture<'static, RepositoryResult<Vec<ProjectRecord>>>;

    /// A project with its related records, or `None` if missing or not owned
    fn get_project(
        &self,
        owner: &UserId,
        id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Option<ProjectDetails>>>;

    fn create_project(
        &self,
        owner: &UserId,
        input: NewProject,
    ) -> BoxFuture<'static, RepositoryResult<ProjectRecord>>;

    fn update_project(
        &self,
        owner: &UserId,
        id: i64,
        update: ProjectUpdate,
    ) -> BoxFuture<'static, RepositoryResult<()>>;

    fn delete_project(&self, owner: &UserId, id: i64) -> BoxFuture<'static, RepositoryResult<()>>;

    // --- Documents ---

    fn create_document(
        &self,
        owner: &UserId,
        project_id: i64,
        input: NewDocument,
    ) -> BoxFuture<'static, RepositoryResult<DocumentRecord>>;

    /// Documents of an owned project, newest first; empty for foreign projects
    fn list_documents(
        &self,
        owner: &UserId,
        project_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Vec<DocumentRecord>>>;

    fn delete_document(&self, owner: &UserId, id: i64) -> BoxFuture<'static, RepositoryResult<()>>;

    // --- Requirements ---

    fn create_requirement(
        &self,
        owner: &UserId,
        project_id: i64,
        input: NewRequirement,
    ) -> BoxFuture<'static, RepositoryResult<RequirementRecord>>;

    fn list_requirements(
        &self,
        owner: &UserId,
        project_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Vec<RequirementRecord>>>;

    // --- Schemas ---

    fn create_schema(
        &self,
        owner: &UserId,
        project_id: i64,
        input: NewSchema,
    ) -> BoxFuture<'static, RepositoryResult<SchemaRecord>>;

    fn list_schemas(
        &self,
        owner: &UserId,
        project_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Vec<SchemaRecord>>>;

    // --- Chats ---

    fn create_chat(
        &self,
        owner: &UserId,
        project_id: i64,
        input: NewChat,
    ) -> BoxFuture<'static, RepositoryResult<ChatRecord>>;

    /// Chats of an owned project, most recently active first
    fn list_chats(
        &self,
        owner: &UserId,
        project_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Vec<ChatRecord>>>;

    /// `None` when the chat does not exist; `AccessDenied` when it belongs to someone else
    fn get_chat(
        &self,
        owner: &UserId,
        chat_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Option<ChatDetails>>>;

    fn delete_chat(&self, owner: &UserId, chat_id: i64) -> BoxFuture<'static, RepositoryResult<()>>;

    /// Append a message and bump the chat's `updated_at`
    fn send_message(
        &self,
        owner: &UserId,
        chat_id: i64,
        input: NewChatMessage,
    ) -> BoxFuture<'static, RepositoryResult<ChatMessageRecord>>;
}
