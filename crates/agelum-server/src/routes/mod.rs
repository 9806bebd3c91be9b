pub mod annotations;
pub mod app;
pub mod board;
pub mod events;
pub mod files;
pub mod items;
pub mod migrate;
pub mod record;
pub mod repositories;
pub mod settings;
pub mod tests;

use serde::Deserialize;

/// `?repo=<name>` on read routes.
#[derive(Debug, Default, Deserialize)]
pub struct RepoQuery {
    #[serde(default)]
    pub repo: Option<String>,
}
