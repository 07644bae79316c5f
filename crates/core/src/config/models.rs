//! Configuration models that aggregate all settings.
//!
//! `AppConfig` combines the global settings from `config.toml`, the
//! per-step prompt templates from `prompts/*.md` and the style presets
//! from `presets/*.yaml` into a single configuration object.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use vf_protocol::StepId;

/// Global settings from `.videoforge/config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Default script model when the project has no selection.
    pub script_model: String,

    /// Default image model.
    pub image_model: String,

    /// Default video model.
    pub video_model: String,

    /// Default narrator voice.
    pub voice_id: String,

    /// Default style preset id.
    pub style_preset: String,

    /// Frames requested per scene clip.
    pub frames_per_scene: u32,

    /// Where the file-backed snapshot store persists the project.
    pub snapshot_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            script_model: "claude-sonnet-4-5".to_string(),
            image_model: "image-gen-3".to_string(),
            video_model: "video-gen-2".to_string(),
            voice_id: String::new(),
            style_preset: "default".to_string(),
            frames_per_scene: 96,
            snapshot_path: PathBuf::from(".videoforge/project.json"),
        }
    }
}

/// A per-step prompt template loaded from `prompts/*.md`.
///
/// The YAML front matter names the step (and optionally a model
/// override); the Markdown body is the template with `{{variable}}`
/// placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub step: StepId,
    pub model: Option<String>,
    pub template: String,
}

/// All prompt templates, keyed by step.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    templates: BTreeMap<StepId, PromptTemplate>,
}

impl PromptLibrary {
    pub fn insert(&mut self, template: PromptTemplate) {
        self.templates.insert(template.step, template);
    }

    pub fn get(&self, step: StepId) -> Option<&PromptTemplate> {
        self.templates.get(&step)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Resolve the prompt for a step: the loaded template when present,
    /// a built-in fallback otherwise, interpolated against `vars`.
    pub fn resolve(&self, step: StepId, vars: &BTreeMap<String, String>) -> String {
        let template = self
            .templates
            .get(&step)
            .map(|t| t.template.clone())
            .unwrap_or_else(|| default_template(step));
        render(&template, vars)
    }
}

/// Interpolate `{{key}}` placeholders. Unknown placeholders are left in
/// place so a missing variable is visible in the resolved prompt.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered.trim().to_string()
}

/// Built-in fallback template for a text step.
fn default_template(step: StepId) -> String {
    let instruction = match step {
        StepId::ResearchTopic => "Summarize what makes this topic compelling for a short video.",
        StepId::TitleIdeas => "Propose five title options and pick the strongest angle.",
        StepId::Hook => "Write a two-sentence opening hook.",
        StepId::Outline => "Outline the video in five to seven sections.",
        StepId::ScriptDraft => "Write the full narration script following the outline:\n{{outline}}",
        StepId::ScriptPolish => "Tighten and polish this draft:\n{{scriptDraft}}",
        StepId::NarrationMarkup => {
            "Rewrite the script as TTS-ready narration with pause markers:\n{{scriptPolish}}"
        }
        StepId::ImageStyleGuide => "Describe a consistent visual style for the scene images.",
        StepId::SceneBreakdown => {
            "Split the script into scenes as a JSON array of objects with \
             scene, imagePrompt, videoPrompt, startSecs and endSecs fields.\n\
             Script:\n{{scriptPolish}}\nWord timings:\n{{wordTimings}}"
        }
        StepId::VideoMetadata => {
            "Write the title, description and tags for this video:\n{{scriptPolish}}"
        }
        StepId::Thumbnail => {
            "Design a bold, high-contrast thumbnail image for the strongest of these \
             titles:\n{{titleIdeas}}"
        }
        // Media steps resolve their inputs from state, not from a
        // prompt template; this is only reached by single-step runs.
        _ => "Produce this step's output.",
    };
    format!("{{{{topic}}}}\n\n{instruction}")
}

/// A visual style preset from `presets/*.yaml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct StylePreset {
    pub id: String,
    pub name: String,

    /// Style fragment appended to image prompts.
    pub image_style: String,

    /// Optional voice override for this preset.
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// Unified application configuration loaded from `.videoforge/`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Global settings from `config.toml`.
    pub settings: Settings,

    /// All prompt templates loaded from `prompts/*.md`.
    pub prompts: PromptLibrary,

    /// All style presets loaded from `presets/*.yaml`.
    pub presets: Vec<StylePreset>,
}

impl AppConfig {
    /// The image-style fragment for a preset id, if known.
    pub fn style_prompt(&self, preset_id: &str) -> Option<&str> {
        self.presets
            .iter()
            .find(|p| p.id == preset_id)
            .map(|p| p.image_style.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_interpolates_known_vars() {
        let mut vars = BTreeMap::new();
        vars.insert("topic".to_string(), "Black holes".to_string());

        let rendered = render("{{topic}}\n\nWrite a hook about {{topic}}.", &vars);
        assert_eq!(rendered, "Black holes\n\nWrite a hook about Black holes.");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let vars = BTreeMap::new();
        let rendered = render("{{mystery}}", &vars);
        assert_eq!(rendered, "{{mystery}}");
    }

    #[test]
    fn test_resolve_falls_back_to_builtin() {
        let library = PromptLibrary::default();
        let mut vars = BTreeMap::new();
        vars.insert("topic".to_string(), "Black holes".to_string());

        let prompt = library.resolve(StepId::Hook, &vars);
        assert!(prompt.starts_with("Black holes"));
        assert!(prompt.contains("hook"));
    }

    #[test]
    fn test_resolve_prefers_loaded_template() {
        let mut library = PromptLibrary::default();
        library.insert(PromptTemplate {
            step: StepId::Hook,
            model: None,
            template: "Custom hook prompt for {{topic}}".to_string(),
        });
        let mut vars = BTreeMap::new();
        vars.insert("topic".to_string(), "Volcanoes".to_string());

        let prompt = library.resolve(StepId::Hook, &vars);
        assert_eq!(prompt, "Custom hook prompt for Volcanoes");
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert!(!settings.script_model.is_empty());
        assert_eq!(settings.frames_per_scene, 96);
    }
}
