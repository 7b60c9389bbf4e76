//! User configuration, loaded through confy
//!
//! Missing keys fall back to their defaults, so an old config file keeps
//! working when new settings appear.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use weekwise_core::{SortKey, ViewMode, ViewParams};

use crate::error::Result;
use crate::session::ConfiguredSession;

/// Name confy stores the configuration under
pub const APP_NAME: &str = "weekwise";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the task document
    pub data_directory: PathBuf,
    /// File name of the task document inside `data_directory`
    pub task_filename: String,
    /// Signed-in user; unset means read-only
    pub user_id: Option<String>,
    /// Initial view parameters
    pub view: ViewDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            task_filename: "tasks.json".to_string(),
            user_id: None,
            view: ViewDefaults::default(),
        }
    }
}

/// View parameters a session starts with
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewDefaults {
    pub mode: ViewMode,
    pub sort: SortKey,
    pub show_completed: bool,
    pub show_descriptions: bool,
}

impl Default for ViewDefaults {
    fn default() -> Self {
        Self {
            mode: ViewMode::Week,
            sort: SortKey::DateAsc,
            show_completed: true,
            show_descriptions: false,
        }
    }
}

fn default_data_directory() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .or_else(|| dirs::data_local_dir().map(|dir| dir.join(APP_NAME)))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Load from the platform config location, writing defaults on first run
    pub fn load() -> Result<Self> {
        Ok(confy::load(APP_NAME, None)?)
    }

    /// Full path of the task document
    pub fn tasks_path(&self) -> PathBuf {
        self.data_directory.join(&self.task_filename)
    }

    pub fn session(&self) -> ConfiguredSession {
        ConfiguredSession::from_config(self.user_id.as_deref())
    }

    /// Starting view parameters
    pub fn view_params(&self) -> ViewParams {
        ViewParams::new(self.view.mode)
            .with_sort(self.view.sort)
            .with_completed(self.view.show_completed)
            .with_descriptions(self.view.show_descriptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.task_filename, "tasks.json");
        assert!(config.user_id.is_none());
        assert!(config.tasks_path().ends_with("tasks.json"));

        let params = config.view_params();
        assert_eq!(params.mode, ViewMode::Week);
        assert_eq!(params.sort, SortKey::DateAsc);
        assert!(params.show_completed);
        assert!(!params.show_descriptions);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"user_id":"me","view":{"mode":"all","sort":"title-asc"}}"#,
        )
        .unwrap();

        assert_eq!(config.task_filename, "tasks.json");
        assert_eq!(config.session().current_user_id().unwrap().as_str(), "me");
        assert_eq!(config.view.mode, ViewMode::All);
        assert_eq!(config.view.sort, SortKey::TitleAsc);
        assert!(config.view.show_completed);
    }
}
