use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgelumError {
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("project path is not a directory: {0}")]
    NotADirectory(String),

    #[error("repository already configured: {0}")]
    ProjectExists(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("{kind} not found: {id}")]
    ItemNotFound { kind: String, id: String },

    #[error("invalid state '{state}' for {kind}")]
    InvalidState { kind: String, state: String },

    #[error("invalid item kind: {0}")]
    InvalidKind(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("test not found: {0}")]
    TestNotFound(String),

    #[error("test already exists: {0}")]
    TestExists(String),

    #[error("invalid test: {0}")]
    InvalidTest(String),

    #[error("invalid id '{0}': must not be empty or contain path separators")]
    InvalidId(String),

    #[error("invalid report: {0}")]
    InvalidReport(String),

    #[error("agent-browser not found on PATH")]
    BrowserToolMissing,

    #[error("home directory not found: set HOME or AGELUM_HOME")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, AgelumError>;
