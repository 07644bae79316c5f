//! Reference-image generation adapter.
//!
//! Produces one anchor image from the style guide; the scene-image
//! adapter passes it as the reference for visual consistency.

use async_trait::async_trait;
use vf_protocol::StepId;

use crate::adapters::base::{style_fragment, AdapterError, StepAdapter, StepContext};
use crate::clients::ImageRequest;
use crate::state::transitions;

pub struct ReferenceImageAdapter;

#[async_trait]
impl StepAdapter for ReferenceImageAdapter {
    fn id(&self) -> StepId {
        StepId::ReferenceImage
    }

    async fn execute(&self, cx: &StepContext) -> Result<(), AdapterError> {
        let state = cx.store.get();
        let style_guide = state.step(StepId::ImageStyleGuide).response;
        if style_guide.trim().is_empty() {
            return Err(AdapterError::MissingInput {
                step: StepId::ReferenceImage,
                reason: "no image style guide available".to_string(),
            });
        }

        let prompt = format!("Reference frame for \"{}\".\n{style_guide}", state.topic);
        cx.store
            .update(|s| s.step_mut(StepId::ReferenceImage).prompt = prompt.clone());

        let model = if state.models.image_model.is_empty() {
            cx.config.settings.image_model.clone()
        } else {
            state.models.image_model.clone()
        };
        let url = cx
            .collaborators
            .image
            .generate(&ImageRequest {
                prompt,
                model,
                reference_url: None,
                style: style_fragment(cx, &state),
            })
            .await?;

        cx.store.try_update(|s| {
            transitions::complete_step(s, StepId::ReferenceImage, url.clone(), None)?;
            s.reference_image_url = url.clone();
            Ok::<(), crate::state::StateError>(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vf_protocol::{PipelineState, StepStatus};

    use crate::clients::Collaborators;
    use crate::config::AppConfig;
    use crate::state::StateStore;

    #[tokio::test]
    async fn test_writes_reference_image_url() {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");
        state.step_mut(StepId::ImageStyleGuide).response = "painterly, warm light".to_string();
        let cx = StepContext {
            store: StateStore::new(state),
            collaborators: Arc::new(Collaborators::mock()),
            config: Arc::new(AppConfig::default()),
        };

        cx.store
            .try_update(|s| transitions::begin_step(s, StepId::ReferenceImage))
            .expect("begin");
        ReferenceImageAdapter.execute(&cx).await.expect("adapter run");

        let state = cx.store.get();
        assert_eq!(state.step(StepId::ReferenceImage).status, StepStatus::Success);
        assert!(!state.reference_image_url.is_empty());
        assert_eq!(state.step(StepId::ReferenceImage).response, state.reference_image_url);
    }

    #[tokio::test]
    async fn test_missing_style_guide_is_an_input_error() {
        let cx = StepContext {
            store: StateStore::new(PipelineState::new()),
            collaborators: Arc::new(Collaborators::mock()),
            config: Arc::new(AppConfig::default()),
        };

        cx.store
            .try_update(|s| transitions::begin_step(s, StepId::ReferenceImage))
            .expect("begin");
        let result = ReferenceImageAdapter.execute(&cx).await;
        assert!(matches!(result, Err(AdapterError::MissingInput { .. })));
    }
}
