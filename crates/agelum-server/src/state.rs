use std::path::PathBuf;

use agelum_core::settings::{apply_project_config, ProjectConfig, SettingsStore, UserSettings};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::AppError;
use crate::process::ProcessManager;

/// What a mutation touched, so subscribers refetch only that view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Items,
    Files,
    Tests,
    App,
    Settings,
    /// Anything may have changed; refetch everything.
    All,
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: SettingsStore,
    /// Project used when a request names no `repo`.
    pub default_root: Option<PathBuf>,
    pub processes: ProcessManager,
    pub event_tx: broadcast::Sender<Topic>,
    /// Gemini API base URL; replaced in tests.
    pub google_base_url: Option<String>,
}

impl AppState {
    pub fn new(settings: SettingsStore, default_root: Option<PathBuf>) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            settings,
            default_root,
            processes: ProcessManager::new(),
            event_tx: tx,
            google_base_url: None,
        }
    }

    /// Tell SSE subscribers which part of the workspace changed.
    pub fn notify(&self, topic: Topic) {
        let _ = self.event_tx.send(topic);
    }

    pub fn load_settings(&self) -> Result<UserSettings, AppError> {
        Ok(self.settings.load()?)
    }

    pub fn project(&self, repo: &str) -> Result<ProjectConfig, AppError> {
        Ok(self.settings.resolve_project(repo)?)
    }

    /// Directory of `repo`, or the default project when `repo` is absent.
    pub fn repo_root(&self, repo: Option<&str>) -> Result<PathBuf, AppError> {
        match repo.map(str::trim).filter(|r| !r.is_empty()) {
            Some(name) => Ok(self.project(name)?.path),
            None => self
                .default_root
                .clone()
                .ok_or_else(|| AppError::bad_request("Repository is required")),
        }
    }

    /// Project config for `repo`; without one, a config synthesised for the
    /// default root from its `.agelum/config.json` and `package.json`.
    pub fn target_project(&self, repo: Option<&str>) -> Result<ProjectConfig, AppError> {
        if let Some(name) = repo.map(str::trim).filter(|r| !r.is_empty()) {
            return self.project(name);
        }
        let path = self.repo_root(None)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string());
        let mut project = ProjectConfig {
            id: name.clone(),
            name,
            path,
            ..ProjectConfig::default()
        };
        apply_project_config(&mut project);
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_repo_without_default_is_bad_request() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(SettingsStore::new(dir.path()), None);
        assert!(state.repo_root(None).is_err());
        assert!(state.repo_root(Some("  ")).is_err());
    }

    #[test]
    fn missing_repo_falls_back_to_default_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(
            SettingsStore::new(dir.path()),
            Some(PathBuf::from("/srv/app")),
        );
        assert_eq!(state.repo_root(None).unwrap(), PathBuf::from("/srv/app"));
    }
}
