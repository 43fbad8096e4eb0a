pub mod error;
pub mod in_memory_repository;
pub mod project_repository;
pub mod workspace_repository;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_repository::InMemoryProjectRepository;
pub use project_repository::{
    ChatDetails, ChatMessageRecord, ChatRecord, ChatRole, DocumentRecord, NewChat,
    NewChatMessage, NewDocument, NewProject, NewRequirement, NewSchema, ProjectDetails,
    ProjectRecord, ProjectRepository, ProjectUpdate, RequirementRecord, SchemaRecord, UserId,
    require_user,
};
pub use workspace_repository::{WorkspaceJsonRepository, WorkspaceRepository};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// ~/.config/modelsmith (platform equivalent)
pub fn app_config_dir() -> RepositoryResult<PathBuf> {
    dirs::config_dir()
        .ok_or_else(|| RepositoryError::InitializationError {
            message: "Could not determine config directory".to_string(),
        })
        .map(|p| p.join("modelsmith"))
}
