use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::ModelType;

pub const API_KEY_ENV: &str = "GOOGLE_GEMINI_KEY";

fn default_request_timeout_secs() -> u64 {
    300
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Gemini API key; the environment variable takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_model: ModelType,
    /// Upper bound for a single completion call; 0 disables the limit
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where the workspace snapshot lives; defaults to the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: ModelType::default(),
            request_timeout_secs: default_request_timeout_secs(),
            workspace_path: None,
        }
    }
}

impl AppSettings {
    /// Overlay values taken from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
    }

    fn apply_api_key_override(&mut self, value: Option<String>) {
        if let Some(key) = value.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"request_timeout_secs": 0, "default_model": "gemini-2.5-flash"}"#)
                .unwrap();
        assert_eq!(settings.request_timeout(), None);
        assert_eq!(settings.default_model, ModelType::Fast);
    }

    #[test]
    fn test_env_key_overrides_file_key() {
        let mut settings = AppSettings {
            api_key: Some("from-file".to_string()),
            ..AppSettings::default()
        };
        settings.apply_api_key_override(Some("from-env".to_string()));
        assert_eq!(settings.api_key.as_deref(), Some("from-env"));

        settings.apply_api_key_override(Some("   ".to_string()));
        assert_eq!(settings.api_key.as_deref(), Some("from-env"));

        settings.apply_api_key_override(None);
        assert_eq!(settings.api_key.as_deref(), Some("from-env"));
    }
}
