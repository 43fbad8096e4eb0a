use std::path::{Path, PathBuf};

use tracing::debug;

use super::app_settings::AppSettings;
use crate::repositories::{BoxFuture, RepositoryError, RepositoryResult, app_config_dir};

pub trait SettingsRepository: Send + Sync + 'static {
    /// Load settings, falling back to defaults when nothing was saved yet
    fn load(&self) -> BoxFuture<'static, RepositoryResult<AppSettings>>;

    fn save(&self, settings: AppSettings) -> BoxFuture<'static, RepositoryResult<()>>;
}

/// Settings stored as pretty-printed JSON, by default in ~/.config/modelsmith/settings.json
pub struct SettingsJsonRepository {
    file_path: PathBuf,
}

impl SettingsJsonRepository {
    pub fn new() -> RepositoryResult<Self> {
        Ok(Self::at(app_config_dir()?.join("settings.json")))
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

impl SettingsRepository for SettingsJsonRepository {
    fn load(&self) -> BoxFuture<'static, RepositoryResult<AppSettings>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            if !tokio::fs::try_exists(&path).await? {
                debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(AppSettings::default());
            }

            let contents = tokio::fs::read_to_string(&path).await?;
            let settings: AppSettings = serde_json::from_str(&contents)?;
            Ok(settings)
        })
    }

    fn save(&self, settings: AppSettings) -> BoxFuture<'static, RepositoryResult<()>> {
        let path = self.file_path.clone();

        Box::pin(async move {
            let json = serde_json::to_string_pretty(&settings)?;
            write_atomically(&path, json).await
        })
    }
}

/// Write through a temp file and rename so readers never see a partial file
pub(crate) async fn write_atomically(path: &Path, contents: String) -> RepositoryResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, contents).await?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(RepositoryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelType;

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SettingsJsonRepository::at(dir.path().join("settings.json"));

        assert_eq!(repo.load().await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SettingsJsonRepository::at(dir.path().join("nested").join("settings.json"));

        let settings = AppSettings {
            default_model: ModelType::Fast,
            request_timeout_secs: 60,
            ..AppSettings::default()
        };
        repo.save(settings.clone()).await.unwrap();

        assert_eq!(repo.load().await.unwrap(), settings);
        assert!(!repo.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_malformed_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = SettingsJsonRepository::at(&path).load().await;
        assert!(matches!(result, Err(RepositoryError::SerializationError(_))));
    }
}
