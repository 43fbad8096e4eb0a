use std::path::{Path, PathBuf};

use tracing::debug;

use super::{BoxFuture, RepositoryResult, app_config_dir};
use crate::models::WorkspaceSnapshot;
use crate::settings::settings_repository::write_atomically;

pub trait WorkspaceRepository: Send + Sync + 'static {
    /// The saved workspace, or `None` when nothing was saved yet
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<WorkspaceSnapshot>>>;

    fn save(&self, snapshot: WorkspaceSnapshot) -> BoxFuture<'static, RepositoryResult<()>>;
}

/// Workspace stored as JSON, by default in ~/.config/modelsmith/workspace.json
pub struct WorkspaceJsonRepository {
    file_path: PathBuf,
}

impl WorkspaceJsonRepository {
    pub fn new() -> RepositoryResult<Self> {
        Ok(Self::at(app_config_dir()?.join("workspace.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl WorkspaceRepository for WorkspaceJsonRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<Option<WorkspaceSnapshot>>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            if !tokio::fs::try_exists(&path).await? {
                debug!(path = %path.display(), "No saved workspace");
                return Ok(None);
            }

            let contents = tokio::fs::read_to_string(&path).await?;
            let snapshot: WorkspaceSnapshot = serde_json::from_str(&contents)?;
            debug!(projects = snapshot.projects.len(), "Workspace loaded");
            Ok(Some(snapshot))
        })
    }

    fn save(&self, snapshot: WorkspaceSnapshot) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let json = serde_json::to_string_pretty(&snapshot)?;
            write_atomically(&path, json).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, ProjectsStore};

    #[tokio::test]
    async fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = WorkspaceJsonRepository::at(dir.path().join("workspace.json"));
        assert!(repo.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_restore_store() {
        let dir = tempfile::tempdir().unwrap();
        let repo = WorkspaceJsonRepository::at(dir.path().join("workspace.json"));

        let mut store = ProjectsStore::with_default_project();
        let id = store.create_project("Library").unwrap();
        store
            .append_message(&id, Message::user("model loans", Vec::new()))
            .unwrap();
        repo.save(store.snapshot()).await.unwrap();

        let restored = ProjectsStore::from_snapshot(repo.load().await.unwrap().unwrap());
        assert_eq!(restored.count(), 2);
        assert_eq!(restored.active_id(), id);
        let project = restored.active();
        assert_eq!(project.name(), "Library");
        assert_eq!(project.messages().last().unwrap().content, "model loans");
    }
}
