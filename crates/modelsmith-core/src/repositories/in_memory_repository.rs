use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use super::BoxFuture;
use super::error::{RepositoryError, RepositoryResult};
use super::project_repository::{
    ChatDetails, ChatMessageRecord, ChatRecord, DocumentRecord, NewChat, NewChatMessage,
    NewDocument, NewProject, NewRequirement, NewSchema, ProjectDetails, ProjectRecord,
    ProjectRepository, ProjectUpdate, RequirementRecord, SchemaRecord, UserId, validate_name,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    projects: Vec<ProjectRecord>,
    documents: Vec<DocumentRecord>,
    requirements: Vec<RequirementRecord>,
    schemas: Vec<SchemaRecord>,
    chats: Vec<ChatRecord>,
    messages: Vec<ChatMessageRecord>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// A live project owned by `owner`
    fn owned_project(&self, owner: &UserId, id: i64) -> Option<&ProjectRecord> {
        self.projects
            .iter()
            .find(|p| p.id == id && &p.owner_id == owner && p.deleted_at.is_none())
    }

    fn owns_project(&self, owner: &UserId, id: i64) -> bool {
        self.owned_project(owner, id).is_some()
    }

    fn live_documents(&self, project_id: i64) -> Vec<DocumentRecord> {
        let mut docs: Vec<_> = self
            .documents
            .iter()
            .filter(|d| d.project_id == project_id && d.deleted_at.is_none())
            .cloned()
            .collect();
        docs.sort_by(|a, b| (b.uploaded_at, b.id).cmp(&(a.uploaded_at, a.id)));
        docs
    }

    fn requirements_of(&self, project_id: i64) -> Vec<RequirementRecord> {
        let mut reqs: Vec<_> = self
            .requirements
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        reqs.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        reqs
    }

    fn schemas_of(&self, project_id: i64) -> Vec<SchemaRecord> {
        let mut schemas: Vec<_> = self
            .schemas
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        schemas.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        schemas
    }

    fn live_chats(&self, project_id: i64) -> Vec<ChatRecord> {
        let mut chats: Vec<_> = self
            .chats
            .iter()
            .filter(|c| c.project_id == project_id && c.deleted_at.is_none())
            .cloned()
            .collect();
        chats.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)));
        chats
    }

    /// Index of a live chat reachable by `owner`.
    ///
    /// `Ok(None)` when no live chat has that id; `AccessDenied` when its
    /// project belongs to someone else or is gone.
    fn chat_index(&self, owner: &UserId, chat_id: i64) -> RepositoryResult<Option<usize>> {
        let Some(index) = self
            .chats
            .iter()
            .position(|c| c.id == chat_id && c.deleted_at.is_none())
        else {
            return Ok(None);
        };
        if !self.owns_project(owner, self.chats[index].project_id) {
            return Err(RepositoryError::AccessDenied("Chat"));
        }
        Ok(Some(index))
    }
}

/// Process-local [`ProjectRepository`]. Ids are allocated from one counter
/// shared by all tables.
#[derive(Clone, Default)]
pub struct InMemoryProjectRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectRepository for InMemoryProjectRepository {
    fn list_projects(&self, owner: &UserId) -> BoxFuture<'static, RepositoryResult<Vec<ProjectRecord>>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let tables = tables.lock();
            let mut projects: Vec<_> = tables
                .projects
                .iter()
                .filter(|p| p.owner_id == owner && p.deleted_at.is_none())
                .cloned()
                .collect();
            projects.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            Ok(projects)
        })
    }

    fn get_project(
        &self,
        owner: &UserId,
        id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Option<ProjectDetails>>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let tables = tables.lock();
            let Some(project) = tables.owned_project(&owner, id).cloned() else {
                return Ok(None);
            };
            Ok(Some(ProjectDetails {
                documents: tables.live_documents(id),
                requirements: tables.requirements_of(id),
                schemas: tables.schemas_of(id),
                chats: tables.live_chats(id),
                project,
            }))
        })
    }

    fn create_project(
        &self,
        owner: &UserId,
        input: NewProject,
    ) -> BoxFuture<'static, RepositoryResult<ProjectRecord>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            validate_name("Project name", &input.name)?;

            let mut tables = tables.lock();
            let now = Utc::now();
            let record = ProjectRecord {
                id: tables.allocate_id(),
                owner_id: owner,
                name: input.name,
                description: input.description,
                status: input.status.unwrap_or_else(|| "active".to_string()),
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            tables.projects.push(record.clone());
            debug!(project_id = record.id, "Project created");
            Ok(record)
        })
    }

    fn update_project(
        &self,
        owner: &UserId,
        id: i64,
        update: ProjectUpdate,
    ) -> BoxFuture<'static, RepositoryResult<()>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            if let Some(name) = &update.name {
                validate_name("Project name", name)?;
            }

            let mut tables = tables.lock();
            let project = tables
                .projects
                .iter_mut()
                .find(|p| p.id == id && p.owner_id == owner && p.deleted_at.is_none())
                .ok_or(RepositoryError::AccessDenied("Project"))?;

            if let Some(name) = update.name {
                project.name = name;
            }
            if let Some(description) = update.description {
                project.description = Some(description);
            }
            if let Some(status) = update.status {
                project.status = status;
            }
            project.updated_at = Utc::now();
            Ok(())
        })
    }

    fn delete_project(&self, owner: &UserId, id: i64) -> BoxFuture<'static, RepositoryResult<()>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let mut tables = tables.lock();
            let project = tables
                .projects
                .iter_mut()
                .find(|p| p.id == id && p.owner_id == owner && p.deleted_at.is_none())
                .ok_or(RepositoryError::AccessDenied("Project"))?;
            project.deleted_at = Some(Utc::now());
            debug!(project_id = id, "Project soft-deleted");
            Ok(())
        })
    }

    fn create_document(
        &self,
        owner: &UserId,
        project_id: i64,
        input: NewDocument,
    ) -> BoxFuture<'static, RepositoryResult<DocumentRecord>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            validate_name("Filename", &input.filename)?;

            let mut tables = tables.lock();
            if !tables.owns_project(&owner, project_id) {
                return Err(RepositoryError::AccessDenied("Project"));
            }
            let record = DocumentRecord {
                id: tables.allocate_id(),
                project_id,
                filename: input.filename,
                storage_path: input.storage_path,
                file_type: input.file_type,
                content: input.content,
                status: "pending".to_string(),
                uploaded_at: Utc::now(),
                deleted_at: None,
            };
            tables.documents.push(record.clone());
            Ok(record)
        })
    }

    fn list_documents(
        &self,
        owner: &UserId,
        project_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Vec<DocumentRecord>>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let tables = tables.lock();
            if !tables.owns_project(&owner, project_id) {
                return Ok(Vec::new());
            }
            Ok(tables.live_documents(project_id))
        })
    }

    fn delete_document(&self, owner: &UserId, id: i64) -> BoxFuture<'static, RepositoryResult<()>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let mut tables = tables.lock();
            let index = tables
                .documents
                .iter()
                .position(|d| d.id == id && d.deleted_at.is_none())
                .filter(|&i| tables.owns_project(&owner, tables.documents[i].project_id))
                .ok_or(RepositoryError::AccessDenied("Document"))?;
            tables.documents[index].deleted_at = Some(Utc::now());
            Ok(())
        })
    }

    fn create_requirement(
        &self,
        owner: &UserId,
        project_id: i64,
        input: NewRequirement,
    ) -> BoxFuture<'static, RepositoryResult<RequirementRecord>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            if input.analysis_content.trim().is_empty() {
                return Err(RepositoryError::InvalidData {
                    message: "Analysis content must not be empty".to_string(),
                });
            }

            let mut tables = tables.lock();
            if !tables.owns_project(&owner, project_id) {
                return Err(RepositoryError::AccessDenied("Project"));
            }
            let now = Utc::now();
            let record = RequirementRecord {
                id: tables.allocate_id(),
                project_id,
                source_document_id: input.source_document_id,
                title: input.title,
                analysis_content: input.analysis_content,
                structured_data: input.structured_data,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            tables.requirements.push(record.clone());
            Ok(record)
        })
    }

    fn list_requirements(
        &self,
        owner: &UserId,
        project_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Vec<RequirementRecord>>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let tables = tables.lock();
            if !tables.owns_project(&owner, project_id) {
                return Ok(Vec::new());
            }
            Ok(tables.requirements_of(project_id))
        })
    }

    fn create_schema(
        &self,
        owner: &UserId,
        project_id: i64,
        input: NewSchema,
    ) -> BoxFuture<'static, RepositoryResult<SchemaRecord>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let mut tables = tables.lock();
            if !tables.owns_project(&owner, project_id) {
                return Err(RepositoryError::AccessDenied("Project"));
            }
            let record = SchemaRecord {
                id: tables.allocate_id(),
                project_id,
                requirement_id: input.requirement_id,
                ddl_script: input.ddl_script,
                mermaid_diagram: input.mermaid_diagram,
                design_report: input.design_report,
                version: 1,
                created_at: Utc::now(),
            };
            tables.schemas.push(record.clone());
            Ok(record)
        })
    }

    fn list_schemas(
        &self,
        owner: &UserId,
        project_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Vec<SchemaRecord>>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let tables = tables.lock();
            if !tables.owns_project(&owner, project_id) {
                return Ok(Vec::new());
            }
            Ok(tables.schemas_of(project_id))
        })
    }

    fn create_chat(
        &self,
        owner: &UserId,
        project_id: i64,
        input: NewChat,
    ) -> BoxFuture<'static, RepositoryResult<ChatRecord>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let mut tables = tables.lock();
            if !tables.owns_project(&owner, project_id) {
                return Err(RepositoryError::AccessDenied("Project"));
            }
            let now = Utc::now();
            let record = ChatRecord {
                id: tables.allocate_id(),
                project_id,
                title: input.title,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            };
            tables.chats.push(record.clone());
            Ok(record)
        })
    }

    fn list_chats(
        &self,
        owner: &UserId,
        project_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Vec<ChatRecord>>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let tables = tables.lock();
            if !tables.owns_project(&owner, project_id) {
                return Ok(Vec::new());
            }
            Ok(tables.live_chats(project_id))
        })
    }

    fn get_chat(
        &self,
        owner: &UserId,
        chat_id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Option<ChatDetails>>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let tables = tables.lock();
            let Some(index) = tables.chat_index(&owner, chat_id)? else {
                return Ok(None);
            };
            let chat = tables.chats[index].clone();
            let mut messages: Vec<_> = tables
                .messages
                .iter()
                .filter(|m| m.chat_id == chat_id)
                .cloned()
                .collect();
            messages.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
            Ok(Some(ChatDetails { chat, messages }))
        })
    }

    fn delete_chat(&self, owner: &UserId, chat_id: i64) -> BoxFuture<'static, RepositoryResult<()>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let mut tables = tables.lock();
            let index = tables
                .chat_index(&owner, chat_id)?
                .ok_or(RepositoryError::AccessDenied("Chat"))?;
            tables.chats[index].deleted_at = Some(Utc::now());
            Ok(())
        })
    }

    fn send_message(
        &self,
        owner: &UserId,
        chat_id: i64,
        input: NewChatMessage,
    ) -> BoxFuture<'static, RepositoryResult<ChatMessageRecord>> {
        let tables = self.tables.clone();
        let owner = owner.clone();

        Box::pin(async move {
            let mut tables = tables.lock();
            let index = tables
                .chat_index(&owner, chat_id)?
                .ok_or(RepositoryError::AccessDenied("Chat"))?;

            let now = Utc::now();
            let record = ChatMessageRecord {
                id: tables.allocate_id(),
                chat_id,
                role: input.role,
                content: input.content,
                meta_data: input.meta_data,
                created_at: now,
            };
            tables.messages.push(record.clone());
            tables.chats[index].updated_at = now;
            Ok(record)
        })
    }
}
