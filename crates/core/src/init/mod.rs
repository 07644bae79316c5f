//! Initialization module for creating .videoforge directory structures.
//!
//! This module provides functionality to initialize a new videoforge
//! project by generating a `.videoforge/` directory with pre-configured
//! templates for:
//! - Global configuration (`config.toml`)
//! - Per-step prompt templates (`prompts/*.md`)
//! - Style presets (`presets/*.yaml`)
//!
//! # Example
//!
//! ```no_run
//! use vf_core::init::{generate_videoforge_structure, InitOptions};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = InitOptions {
//!     target_dir: PathBuf::from("."),
//!     force: false,
//!     minimal: false,
//! };
//!
//! generate_videoforge_structure(options).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod templates;

// Re-export commonly used types for convenience
pub use error::{InitError, InitResult};
pub use generator::{generate_videoforge_structure, InitOptions};
pub use templates::{get_template, list_templates};
