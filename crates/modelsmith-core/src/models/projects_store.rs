use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::document::{ProjectDocument, template_content};
use super::error::{StoreError, StoreResult};
use super::message::Message;
use super::project::Project;

/// Serializable copy of the whole store, used for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub projects: Vec<Project>,
    pub active_project_id: String,
}

/// Application state: every project plus the one the user is working in.
///
/// Always holds at least one project, and `active_project_id` always names
/// one of them.
#[derive(Debug, Clone)]
pub struct ProjectsStore {
    projects: Vec<Project>,
    active_project_id: String,
}

impl ProjectsStore {
    /// Start with the demo project as the only (and active) project
    pub fn with_default_project() -> Self {
        let demo = Project::demo();
        Self {
            active_project_id: demo.id().to_string(),
            projects: vec![demo],
        }
    }

    /// Rebuild a store from a snapshot. An empty snapshot falls back to the demo
    /// project, and a dangling active id falls back to the first project.
    /// Placeholders are dropped: no request survives a restart.
    pub fn from_snapshot(mut snapshot: WorkspaceSnapshot) -> Self {
        if snapshot.projects.is_empty() {
            return Self::with_default_project();
        }
        for project in &mut snapshot.projects {
            project.drop_placeholders();
        }

        let active_project_id = if snapshot
            .projects
            .iter()
            .any(|p| p.id() == snapshot.active_project_id)
        {
            snapshot.active_project_id
        } else {
            snapshot.projects[0].id().to_string()
        };

        Self {
            projects: snapshot.projects,
            active_project_id,
        }
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            projects: self.projects.clone(),
            active_project_id: self.active_project_id.clone(),
        }
    }

    // --- Projects ---

    /// Create a project and make it active. Returns the new project's id.
    pub fn create_project(&mut self, name: &str) -> StoreResult<String> {
        if name.trim().is_empty() {
            return Err(StoreError::EmptyField { field: "Project name" });
        }

        let project = Project::new(name);
        let id = project.id().to_string();
        self.projects.push(project);
        self.active_project_id = id.clone();

        info!(project_id = %id, name, "Created project");
        Ok(id)
    }

    /// Overwrite name and description. Unlike creation, no field is validated.
    pub fn update_project(&mut self, id: &str, name: &str, description: &str) -> StoreResult<()> {
        self.get_mut(id)?
            .set_details(name.to_string(), description.to_string());
        Ok(())
    }

    /// Delete a project. The last remaining project cannot be deleted.
    pub fn delete_project(&mut self, id: &str) -> StoreResult<Project> {
        let index = self
            .projects
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| StoreError::ProjectNotFound(id.to_string()))?;

        if self.projects.len() == 1 {
            return Err(StoreError::LastProject);
        }

        let removed = self.projects.remove(index);

        // If we deleted the active project, switch to the first remaining one
        if self.active_project_id == id {
            self.active_project_id = self.projects[0].id().to_string();
        }

        info!(project_id = %id, active = %self.active_project_id, "Deleted project");
        Ok(removed)
    }

    pub fn set_active(&mut self, id: &str) -> StoreResult<()> {
        if !self.projects.iter().any(|p| p.id() == id) {
            return Err(StoreError::ProjectNotFound(id.to_string()));
        }
        self.active_project_id = id.to_string();
        Ok(())
    }

    pub fn active_id(&self) -> &str {
        &self.active_project_id
    }

    pub fn active(&self) -> &Project {
        self.projects
            .iter()
            .find(|p| p.id() == self.active_project_id)
            .unwrap_or(&self.projects[0])
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id() == id)
    }

    fn get_mut(&mut self, id: &str) -> StoreResult<&mut Project> {
        self.projects
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or_else(|| StoreError::ProjectNotFound(id.to_string()))
    }

    fn active_mut(&mut self) -> StoreResult<&mut Project> {
        let id = self.active_project_id.clone();
        self.get_mut(&id)
    }

    /// All projects in creation order
    pub fn list(&self) -> &[Project] {
        &self.projects
    }

    pub fn count(&self) -> usize {
        self.projects.len()
    }

    // --- Messages ---

    pub fn append_message(&mut self, project_id: &str, message: Message) -> StoreResult<()> {
        self.get_mut(project_id)?.append_message(message);
        Ok(())
    }

    /// Replace a message in place. Ok(false) means nothing matched.
    pub fn replace_message(
        &mut self,
        project_id: &str,
        match_id: &str,
        new_message: Message,
    ) -> StoreResult<bool> {
        Ok(self
            .get_mut(project_id)?
            .replace_message(match_id, new_message))
    }

    pub fn remove_messages_matching(
        &mut self,
        project_id: &str,
        predicate: impl Fn(&Message) -> bool,
    ) -> StoreResult<usize> {
        Ok(self.get_mut(project_id)?.remove_messages_matching(predicate))
    }

    // --- Documents (active project) ---

    /// Add a document to the active project. An empty body gets a starter template.
    pub fn add_document(&mut self, title: &str, content: &str) -> StoreResult<String> {
        if title.trim().is_empty() {
            return Err(StoreError::EmptyField {
                field: "Document title",
            });
        }

        let content = if content.is_empty() {
            template_content(title)
        } else {
            content.to_string()
        };
        let doc = ProjectDocument::new(title, content);
        let doc_id = doc.id.clone();
        self.active_mut()?.add_document(doc);

        debug!(doc_id = %doc_id, "Added document");
        Ok(doc_id)
    }

    pub fn update_document(&mut self, doc_id: &str, content: &str) -> StoreResult<()> {
        self.active_mut()?
            .update_document(doc_id, content.to_string())
    }

    pub fn delete_document(&mut self, doc_id: &str) -> StoreResult<()> {
        self.active_mut()?.delete_document(doc_id)?;
        Ok(())
    }

    // --- Schema (active project) ---

    /// Manual schema edit for the active project
    pub fn update_schema(&mut self, code: &str) -> StoreResult<()> {
        self.active_mut()?.set_schema_code(code);
        Ok(())
    }
}

impl Default for ProjectsStore {
    fn default() -> Self {
        Self::with_default_project()
    }
}
