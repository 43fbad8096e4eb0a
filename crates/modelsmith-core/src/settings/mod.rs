pub mod app_settings;
pub mod settings_repository;

pub use app_settings::{API_KEY_ENV, AppSettings};
pub use settings_repository::{SettingsJsonRepository, SettingsRepository};
