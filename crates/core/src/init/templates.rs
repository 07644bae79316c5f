//! Embedded template files for .videoforge initialization.
//!
//! This module uses `rust-embed` to embed template files from the crate
//! `templates/` directory into the binary at compile time, so `init` can
//! scaffold a `.videoforge/` structure without external file
//! dependencies.
//!
//! During development with the `debug-embed` feature, files are read
//! from the filesystem at runtime, allowing quick iteration without
//! recompilation.

use rust_embed::RustEmbed;

/// Embedded template files from the crate `templates/` directory.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/templates"]
pub struct TemplateAssets;

/// Get template file content by path.
///
/// # Arguments
/// * `path` - Relative path from templates root (e.g., "config.toml", "prompts/hook.md")
///
/// # Returns
/// The file content as a String, or None if the file doesn't exist.
pub fn get_template(path: &str) -> Option<String> {
    TemplateAssets::get(path).map(|file| String::from_utf8_lossy(file.data.as_ref()).to_string())
}

/// List all template files in a directory.
///
/// # Arguments
/// * `prefix` - Directory prefix (e.g., "prompts/", "presets/")
///
/// # Returns
/// A vector of file paths that match the prefix.
pub fn list_templates(prefix: &str) -> Vec<String> {
    TemplateAssets::iter()
        .filter(|path| path.starts_with(prefix))
        .map(|path| path.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_template() {
        let config = get_template("config.toml");
        assert!(config.is_some(), "config.toml should be embedded");
        let content = config.unwrap();
        assert!(
            content.contains("script-model ="),
            "config.toml should contain the script model setting"
        );
    }

    #[test]
    fn test_get_default_preset_template() {
        let preset = get_template("presets/default.yaml");
        assert!(preset.is_some(), "presets/default.yaml should be embedded");
        assert!(preset.unwrap().contains("id: default"));
    }

    #[test]
    fn test_prompt_templates_cover_text_steps() {
        let prompts = list_templates("prompts/");
        assert!(
            prompts.len() >= 10,
            "every text step should have a prompt template"
        );
        assert!(prompts.contains(&"prompts/scene-breakdown.md".to_string()));
        assert!(prompts.contains(&"prompts/script-draft.md".to_string()));
    }

    #[test]
    fn test_get_nonexistent_template() {
        let result = get_template("nonexistent.txt");
        assert!(result.is_none(), "Nonexistent files should return None");
    }
}
