//! Directory structure and file generation for .videoforge initialization.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};

/// Options for initializing a .videoforge directory.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Target directory where .videoforge will be created.
    pub target_dir: PathBuf,

    /// Overwrite an existing .videoforge directory if it exists.
    pub force: bool,

    /// Create a minimal setup (config and default preset only, no
    /// prompt templates — the built-in fallback prompts apply).
    pub minimal: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
            minimal: false,
        }
    }
}

/// Generate a complete .videoforge directory structure with templates.
///
/// Creates:
/// ```text
/// .videoforge/
/// ├── config.toml
/// ├── presets/
/// │   └── default.yaml
/// └── prompts/
///     ├── research-topic.md
///     ├── ...
///     └── thumbnail.md        (unless minimal)
/// ```
///
/// # Errors
///
/// Returns an `InitError` if the directory already exists (without the
/// force flag), a template is missing from the embedded assets, or file
/// system operations fail.
pub async fn generate_videoforge_structure(options: InitOptions) -> InitResult<()> {
    let vf_dir = options.target_dir.join(".videoforge");

    if vf_dir.exists() && !options.force {
        return Err(InitError::DirectoryExists(vf_dir));
    }

    fs::create_dir_all(vf_dir.join("prompts")).map_err(|source| InitError::DirectoryCreate {
        path: vf_dir.join("prompts"),
        source,
    })?;
    fs::create_dir_all(vf_dir.join("presets")).map_err(|source| InitError::DirectoryCreate {
        path: vf_dir.join("presets"),
        source,
    })?;

    write_template_file(&vf_dir, "config.toml")?;
    write_template_file(&vf_dir, "presets/default.yaml")?;

    if !options.minimal {
        for prompt_path in list_templates("prompts/") {
            write_template_file(&vf_dir, &prompt_path)?;
        }
    }

    Ok(())
}

/// Helper function to write a template file to the target directory.
fn write_template_file(vf_dir: &Path, template_path: &str) -> InitResult<()> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = vf_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path,
        source,
    })?;

    Ok(())
}
