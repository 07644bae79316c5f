//! Thumbnail generation adapter.

use async_trait::async_trait;
use vf_protocol::StepId;

use crate::adapters::base::{prompt_vars, style_fragment, AdapterError, StepAdapter, StepContext};
use crate::clients::ImageRequest;
use crate::state::transitions;

pub struct ThumbnailAdapter;

#[async_trait]
impl StepAdapter for ThumbnailAdapter {
    fn id(&self) -> StepId {
        StepId::Thumbnail
    }

    async fn execute(&self, cx: &StepContext) -> Result<(), AdapterError> {
        let state = cx.store.get();
        if state.step(StepId::TitleIdeas).response.trim().is_empty() {
            return Err(AdapterError::MissingInput {
                step: StepId::Thumbnail,
                reason: "no title ideas to build the thumbnail from".to_string(),
            });
        }

        let prompt = cx
            .config
            .prompts
            .resolve(StepId::Thumbnail, &prompt_vars(&state));
        cx.store
            .update(|s| s.step_mut(StepId::Thumbnail).prompt = prompt.clone());

        let model = if state.models.image_model.is_empty() {
            cx.config.settings.image_model.clone()
        } else {
            state.models.image_model.clone()
        };
        let reference = if state.reference_image_url.is_empty() {
            None
        } else {
            Some(state.reference_image_url.clone())
        };
        let url = cx
            .collaborators
            .image
            .generate(&ImageRequest {
                prompt,
                model,
                reference_url: reference,
                style: style_fragment(cx, &state),
            })
            .await?;

        cx.store.try_update(|s| {
            transitions::complete_step(s, StepId::Thumbnail, url.clone(), None)?;
            s.thumbnail_path = url.clone();
            Ok::<(), crate::state::StateError>(())
        })?;
        Ok(())
    }
}
