//! Configuration file loader for the `.videoforge/` directory structure.
//!
//! This module provides functionality to load and parse all
//! configuration files from the `.videoforge/` directory, including:
//! - `config.toml`: Global settings
//! - `prompts/*.md`: Per-step prompt templates with YAML front matter
//! - `presets/*.yaml`: Visual style presets

use gray_matter::engine::YAML;
use gray_matter::Matter;
use serde::Deserialize;
use std::path::Path;
use vf_protocol::StepId;
use walkdir::WalkDir;

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::models::{AppConfig, PromptLibrary, PromptTemplate, Settings, StylePreset};

/// Front matter of a prompt template file.
#[derive(Debug, Deserialize)]
struct PromptFrontMatter {
    step: StepId,
    #[serde(default)]
    model: Option<String>,
}

/// Loads all configuration from the `.videoforge/` directory.
///
/// If directories or files are missing (but the root exists), the
/// corresponding sections default rather than error.
///
/// # Errors
///
/// Returns `ConfigError` if files exist but cannot be read, have invalid
/// syntax (TOML, YAML, or Markdown front matter), or name an unknown
/// step id.
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let vf_dir = root.join(".videoforge");

    // If .videoforge doesn't exist, return default config
    if !vf_dir.exists() {
        return Ok(AppConfig::default());
    }

    let settings = load_settings(&vf_dir)?;
    let prompts = load_prompts(&vf_dir)?;
    let presets = load_presets(&vf_dir)?;

    Ok(AppConfig {
        settings,
        prompts,
        presets,
    })
}

/// Loads global settings from `config.toml`.
fn load_settings(vf_dir: &Path) -> ConfigResult<Settings> {
    let config_path = vf_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(Settings::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let settings: Settings =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path,
            source,
        })?;

    Ok(settings)
}

/// Loads all prompt templates from `prompts/*.md`.
fn load_prompts(vf_dir: &Path) -> ConfigResult<PromptLibrary> {
    let prompts_dir = vf_dir.join("prompts");

    if !prompts_dir.exists() {
        return Ok(PromptLibrary::default());
    }

    let mut library = PromptLibrary::default();

    for entry in WalkDir::new(&prompts_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: prompts_dir.clone(),
            source,
        })?;

        let path = entry.path();

        // Only process .md files
        if path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        // Parse Markdown with YAML front matter
        let matter = Matter::<YAML>::new();
        let result = matter.parse(&content);

        let front: PromptFrontMatter = result
            .data
            .ok_or_else(|| ConfigError::MarkdownParse {
                path: path.to_path_buf(),
                reason: "Missing YAML front matter".to_string(),
            })?
            .deserialize()
            .map_err(|e| ConfigError::MarkdownParse {
                path: path.to_path_buf(),
                reason: format!("Failed to deserialize front matter: {e}"),
            })?;

        library.insert(PromptTemplate {
            step: front.step,
            model: front.model,
            template: result.content,
        });
    }

    Ok(library)
}

/// Loads all style presets from `presets/*.yaml`.
fn load_presets(vf_dir: &Path) -> ConfigResult<Vec<StylePreset>> {
    let presets_dir = vf_dir.join("presets");

    if !presets_dir.exists() {
        return Ok(Vec::new());
    }

    let mut presets = Vec::new();

    for entry in WalkDir::new(&presets_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: presets_dir.clone(),
            source,
        })?;

        let path = entry.path();

        // Only process .yaml and .yml files
        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("yaml") && ext != Some("yml") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let preset: StylePreset =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?;

        presets.push(preset);
    }

    Ok(presets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_config_acceptance() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let vf_dir = root.join(".videoforge");

        fs::create_dir_all(vf_dir.join("prompts")).expect("Failed to create prompts dir");
        fs::create_dir_all(vf_dir.join("presets")).expect("Failed to create presets dir");

        let config_toml = r#"
script-model = "claude-sonnet-4-5"
voice-id = "narrator-1"
frames-per-scene = 48
"#;
        fs::write(vf_dir.join("config.toml"), config_toml).expect("Failed to write config.toml");

        let hook_md = r#"---
step: hook
model: claude-haiku-3-5
---

Write a two-sentence hook for {{topic}}."#;
        fs::write(vf_dir.join("prompts/hook.md"), hook_md).expect("Failed to write prompt file");

        let preset_yaml = r#"id: noir
name: Film noir
image-style: "high contrast black and white, hard shadows"
voice-id: narrator-3
"#;
        fs::write(vf_dir.join("presets/noir.yaml"), preset_yaml)
            .expect("Failed to write preset file");

        let config = load_config(root).await.expect("Failed to load config");

        assert_eq!(config.settings.script_model, "claude-sonnet-4-5");
        assert_eq!(config.settings.voice_id, "narrator-1");
        assert_eq!(config.settings.frames_per_scene, 48);

        assert_eq!(config.prompts.len(), 1);
        let hook = config.prompts.get(StepId::Hook).expect("hook template");
        assert_eq!(hook.model.as_deref(), Some("claude-haiku-3-5"));
        assert!(hook.template.contains("{{topic}}"));

        assert_eq!(config.presets.len(), 1);
        assert_eq!(config.presets[0].id, "noir");
        assert_eq!(config.presets[0].voice_id.as_deref(), Some("narrator-3"));
    }

    #[tokio::test]
    async fn test_load_config_empty_directory() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();

        // No .videoforge directory exists
        let config = load_config(root)
            .await
            .expect("Should handle missing .videoforge");

        assert_eq!(config.settings.script_model, Settings::default().script_model);
        assert!(config.prompts.is_empty());
        assert!(config.presets.is_empty());
    }

    #[tokio::test]
    async fn test_load_config_invalid_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let vf_dir = root.join(".videoforge");

        fs::create_dir_all(&vf_dir).expect("Failed to create .videoforge");
        fs::write(vf_dir.join("config.toml"), "script-model = [invalid toml")
            .expect("Failed to write config.toml");

        let result = load_config(root).await;
        assert!(result.is_err(), "Should fail on invalid TOML");

        if let Err(ConfigError::TomlParse { path, .. }) = result {
            assert!(path.ends_with("config.toml"));
        } else {
            panic!("Expected TomlParse error");
        }
    }

    #[tokio::test]
    async fn test_load_config_prompt_without_frontmatter() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let vf_dir = root.join(".videoforge");

        fs::create_dir_all(vf_dir.join("prompts")).expect("Failed to create prompts dir");
        fs::write(vf_dir.join("prompts/hook.md"), "Just a prompt body")
            .expect("Failed to write prompt file");

        let result = load_config(root).await;
        assert!(result.is_err(), "Should fail on prompt without front matter");

        if let Err(ConfigError::MarkdownParse { path, reason }) = result {
            assert!(path.ends_with("hook.md"));
            assert!(reason.contains("Missing YAML front matter"));
        } else {
            panic!("Expected MarkdownParse error");
        }
    }

    #[tokio::test]
    async fn test_load_config_prompt_with_unknown_step() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let vf_dir = root.join(".videoforge");

        fs::create_dir_all(vf_dir.join("prompts")).expect("Failed to create prompts dir");
        let bad_md = "---\nstep: mysteryStep\n---\n\nBody";
        fs::write(vf_dir.join("prompts/bad.md"), bad_md).expect("Failed to write prompt file");

        let result = load_config(root).await;
        assert!(result.is_err(), "Unknown step ids must be rejected");
    }

    #[tokio::test]
    async fn test_load_config_ignores_non_matching_files() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let vf_dir = root.join(".videoforge");

        fs::create_dir_all(vf_dir.join("prompts")).expect("Failed to create prompts dir");
        fs::create_dir_all(vf_dir.join("presets")).expect("Failed to create presets dir");
        fs::write(vf_dir.join("prompts/readme.txt"), "Not a template")
            .expect("Failed to write txt file");
        fs::write(vf_dir.join("presets/notes.txt"), "Not a preset")
            .expect("Failed to write txt file");

        let config = load_config(root)
            .await
            .expect("Should ignore non-matching files");

        assert!(config.prompts.is_empty());
        assert!(config.presets.is_empty());
    }

    #[tokio::test]
    async fn test_load_config_yml_extension() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let vf_dir = root.join(".videoforge");

        fs::create_dir_all(vf_dir.join("presets")).expect("Failed to create presets dir");
        let preset_yaml = "id: paper\nname: Paper cutout\nimage-style: \"layered paper cutout\"\n";
        fs::write(vf_dir.join("presets/paper.yml"), preset_yaml)
            .expect("Failed to write preset file");

        let config = load_config(root).await.expect("Should load .yml files");

        assert_eq!(config.presets.len(), 1);
        assert_eq!(config.presets[0].id, "paper");
    }
}
