pub mod annotation;
pub mod board;
pub mod browser;
pub mod document;
pub mod error;
pub mod frontmatter;
pub mod io;
pub mod item;
pub mod migrate;
pub mod naming;
pub mod paths;
pub mod report;
pub mod settings;
pub mod store;
pub mod structure;
pub mod testing;
pub mod types;

pub use error::{AgelumError, Result};
