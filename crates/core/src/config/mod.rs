//! Configuration loading from the `.videoforge/` directory.

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
pub use models::{AppConfig, PromptLibrary, PromptTemplate, Settings, StylePreset};
