//! Narration audio synthesis adapter.

use async_trait::async_trait;
use vf_protocol::StepId;

use crate::adapters::base::{AdapterError, StepAdapter, StepContext};
use crate::state::transitions;

pub struct NarrationAudioAdapter;

#[async_trait]
impl StepAdapter for NarrationAudioAdapter {
    fn id(&self) -> StepId {
        StepId::NarrationAudio
    }

    async fn execute(&self, cx: &StepContext) -> Result<(), AdapterError> {
        let state = cx.store.get();
        let text = {
            let markup = state.step(StepId::NarrationMarkup).response;
            if markup.trim().is_empty() {
                state.step(StepId::ScriptPolish).response
            } else {
                markup
            }
        };
        if text.trim().is_empty() {
            return Err(AdapterError::MissingInput {
                step: StepId::NarrationAudio,
                reason: "no narration text available".to_string(),
            });
        }

        let voice = resolve_voice(cx, &state.models.voice_id, &state.models.style_preset);
        cx.store
            .update(|s| s.step_mut(StepId::NarrationAudio).prompt = text.clone());

        let artifact = cx.collaborators.speech.synthesize(&text, &voice).await?;

        cx.store.try_update(|s| {
            transitions::complete_step(s, StepId::NarrationAudio, artifact.path.clone(), None)?;
            s.narration_audio_path = artifact.path.clone();
            Ok::<(), crate::state::StateError>(())
        })?;
        Ok(())
    }
}

/// Project voice, then the preset's voice override, then the configured
/// default voice.
fn resolve_voice(cx: &StepContext, project_voice: &str, preset_id: &str) -> String {
    if !project_voice.is_empty() {
        return project_voice.to_string();
    }
    if let Some(preset) = cx.config.presets.iter().find(|p| p.id == preset_id) {
        if let Some(voice) = &preset.voice_id {
            return voice.clone();
        }
    }
    cx.config.settings.voice_id.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vf_protocol::{PipelineState, StepStatus};

    use crate::clients::Collaborators;
    use crate::config::{AppConfig, StylePreset};
    use crate::state::StateStore;

    fn context(state: PipelineState) -> StepContext {
        StepContext {
            store: StateStore::new(state),
            collaborators: Arc::new(Collaborators::mock()),
            config: Arc::new(AppConfig::default()),
        }
    }

    async fn run_adapter(cx: &StepContext) -> Result<(), AdapterError> {
        cx.store
            .try_update(|s| transitions::begin_step(s, StepId::NarrationAudio))?;
        NarrationAudioAdapter.execute(cx).await
    }

    #[tokio::test]
    async fn test_synthesizes_from_narration_markup() {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");
        state.step_mut(StepId::NarrationMarkup).response = "narration text".to_string();
        let cx = context(state);

        run_adapter(&cx).await.expect("adapter run");

        let state = cx.store.get();
        assert_eq!(state.step(StepId::NarrationAudio).status, StepStatus::Success);
        assert!(!state.narration_audio_path.is_empty());
        assert_eq!(state.step(StepId::NarrationAudio).response, state.narration_audio_path);
    }

    #[tokio::test]
    async fn test_falls_back_to_polished_script() {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");
        state.step_mut(StepId::ScriptPolish).response = "polished script".to_string();
        let cx = context(state);

        run_adapter(&cx).await.expect("adapter run");

        assert_eq!(
            cx.store.get().step(StepId::NarrationAudio).prompt,
            "polished script"
        );
    }

    #[tokio::test]
    async fn test_missing_narration_text_is_an_input_error() {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");
        let cx = context(state);

        let result = run_adapter(&cx).await;
        assert!(matches!(result, Err(AdapterError::MissingInput { .. })));
    }

    #[test]
    fn test_voice_resolution_order() {
        let mut config = AppConfig::default();
        config.settings.voice_id = "config-voice".to_string();
        config.presets.push(StylePreset {
            id: "noir".to_string(),
            name: "Film noir".to_string(),
            image_style: "high contrast".to_string(),
            voice_id: Some("preset-voice".to_string()),
        });
        let cx = StepContext {
            store: StateStore::new(PipelineState::new()),
            collaborators: Arc::new(Collaborators::mock()),
            config: Arc::new(config),
        };

        assert_eq!(resolve_voice(&cx, "project-voice", "noir"), "project-voice");
        assert_eq!(resolve_voice(&cx, "", "noir"), "preset-voice");
        assert_eq!(resolve_voice(&cx, "", "unknown"), "config-voice");
    }
}
