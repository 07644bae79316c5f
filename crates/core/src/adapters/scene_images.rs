//! Scene-image generation adapter.
//!
//! Generates the first-frame (and optional last-frame) image for every
//! scene that does not have one yet. Scenes are dispatched in
//! fixed-size batches of two concurrent siblings with all-settled
//! semantics: one sibling's failure does not abort the other, and a
//! batch's results are applied in a single state replacement after the
//! whole batch settles.

use async_trait::async_trait;
use vf_protocol::{SceneAsset, SceneStatus, StepId};

use crate::adapters::base::{style_fragment, AdapterError, StepAdapter, StepContext};
use crate::clients::{CollaboratorError, ImageRequest};
use crate::state::transitions;

/// Concurrent sibling generations per batch.
pub const SCENE_FAN_OUT: usize = 2;

pub struct SceneImagesAdapter;

type SceneResult = (u32, Result<(String, String), CollaboratorError>);

impl SceneImagesAdapter {
    async fn generate_for(
        cx: &StepContext,
        model: &str,
        style: Option<String>,
        reference: Option<String>,
        scene: &SceneAsset,
    ) -> SceneResult {
        let first = cx
            .collaborators
            .image
            .generate(&ImageRequest {
                prompt: scene.first_frame_prompt.clone(),
                model: model.to_string(),
                reference_url: reference.clone(),
                style: style.clone(),
            })
            .await;
        let first = match first {
            Ok(url) => url,
            Err(e) => return (scene.scene_number, Err(e)),
        };

        if scene.last_frame_prompt.trim().is_empty() {
            return (scene.scene_number, Ok((first, String::new())));
        }
        let last = cx
            .collaborators
            .image
            .generate(&ImageRequest {
                prompt: scene.last_frame_prompt.clone(),
                model: model.to_string(),
                reference_url: reference,
                style,
            })
            .await;
        match last {
            Ok(last) => (scene.scene_number, Ok((first, last))),
            Err(e) => (scene.scene_number, Err(e)),
        }
    }
}

#[async_trait]
impl StepAdapter for SceneImagesAdapter {
    fn id(&self) -> StepId {
        StepId::SceneImages
    }

    async fn execute(&self, cx: &StepContext) -> Result<(), AdapterError> {
        let state = cx.store.get();
        if state.scenes.is_empty() {
            return Err(AdapterError::MissingInput {
                step: StepId::SceneImages,
                reason: "the scene list is empty".to_string(),
            });
        }

        // Scenes that already have an image (from an earlier partial
        // run) are not regenerated.
        let pending: Vec<SceneAsset> = state
            .scenes
            .iter()
            .filter(|s| s.image_url.is_empty())
            .cloned()
            .collect();

        let model = if state.models.image_model.is_empty() {
            cx.config.settings.image_model.clone()
        } else {
            state.models.image_model.clone()
        };
        let style = style_fragment(cx, &state);
        let reference = if state.reference_image_url.is_empty() {
            None
        } else {
            Some(state.reference_image_url.clone())
        };

        if let Some(first) = pending.first() {
            let prompt = first.first_frame_prompt.clone();
            cx.store
                .update(|s| s.step_mut(StepId::SceneImages).prompt = prompt.clone());
        }

        let mut failed = 0usize;
        let mut first_error: Option<String> = None;
        for chunk in pending.chunks(SCENE_FAN_OUT) {
            let results: Vec<SceneResult> = match chunk {
                [a] => vec![Self::generate_for(cx, &model, style.clone(), reference.clone(), a).await],
                [a, b] => {
                    let (ra, rb) = tokio::join!(
                        Self::generate_for(cx, &model, style.clone(), reference.clone(), a),
                        Self::generate_for(cx, &model, style.clone(), reference.clone(), b),
                    );
                    vec![ra, rb]
                }
                _ => Vec::new(),
            };

            for (_, result) in &results {
                if let Err(e) = result {
                    failed += 1;
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }

            // No result from the next batch lands before this whole
            // batch has been applied.
            cx.store.update(|s| {
                for (number, result) in &results {
                    if let Some(scene) = s.scenes.iter_mut().find(|sc| sc.scene_number == *number)
                    {
                        match result {
                            Ok((image, last)) => {
                                scene.image_url = image.clone();
                                scene.last_frame_url = last.clone();
                                scene.status = SceneStatus::ImagesReady;
                            }
                            Err(_) => scene.status = SceneStatus::Failed,
                        }
                    }
                }
            });
        }

        if failed > 0 {
            return Err(AdapterError::SceneFailures {
                failed,
                total: pending.len(),
                first: first_error.unwrap_or_default(),
            });
        }

        let response = format!("{} scene image(s) generated", pending.len());
        cx.store
            .try_update(|s| transitions::complete_step(s, StepId::SceneImages, response.clone(), None))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vf_protocol::{PipelineState, StepStatus, TimeRange};

    use crate::clients::mock::MockImageClient;
    use crate::clients::Collaborators;
    use crate::config::AppConfig;
    use crate::state::StateStore;

    fn state_with_scenes(count: u32) -> PipelineState {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");
        for i in 1..=count {
            let mut scene = SceneAsset::new(
                i,
                TimeRange {
                    start_secs: (i - 1) as f64 * 4.0,
                    end_secs: i as f64 * 4.0,
                },
            );
            scene.first_frame_prompt = format!("scene {i}");
            state.scenes.push(scene);
        }
        state
    }

    fn context(state: PipelineState, image: Arc<MockImageClient>) -> StepContext {
        let collaborators = Collaborators {
            image,
            ..Collaborators::mock()
        };
        StepContext {
            store: StateStore::new(state),
            collaborators: Arc::new(collaborators),
            config: Arc::new(AppConfig::default()),
        }
    }

    async fn run_adapter(cx: &StepContext) -> Result<(), AdapterError> {
        cx.store
            .try_update(|s| transitions::begin_step(s, StepId::SceneImages))?;
        SceneImagesAdapter.execute(cx).await
    }

    #[tokio::test]
    async fn test_generates_every_scene() {
        let image = Arc::new(MockImageClient::success());
        let cx = context(state_with_scenes(5), Arc::clone(&image));

        run_adapter(&cx).await.expect("adapter run");

        let state = cx.store.get();
        assert_eq!(state.step(StepId::SceneImages).status, StepStatus::Success);
        assert!(state
            .scenes
            .iter()
            .all(|s| !s.image_url.is_empty() && s.status == SceneStatus::ImagesReady));
        assert_eq!(image.call_count(), 5);
    }

    #[tokio::test]
    async fn test_rerun_skips_scenes_with_images() {
        let image = Arc::new(MockImageClient::success());
        let mut state = state_with_scenes(4);
        state.scenes[0].image_url = "existing-1.png".to_string();
        state.scenes[1].image_url = "existing-2.png".to_string();
        let cx = context(state, Arc::clone(&image));

        run_adapter(&cx).await.expect("adapter run");

        let state = cx.store.get();
        assert_eq!(state.scenes[0].image_url, "existing-1.png");
        assert_eq!(image.call_count(), 2);
        assert!(state.step(StepId::SceneImages).response.contains('2'));
    }

    #[tokio::test]
    async fn test_all_failures_reported_after_settling() {
        let image = Arc::new(MockImageClient::failing());
        let cx = context(state_with_scenes(3), Arc::clone(&image));

        let result = run_adapter(&cx).await;

        // Every sibling was attempted despite the failures.
        assert_eq!(image.call_count(), 3);
        match result {
            Err(AdapterError::SceneFailures { failed, total, .. }) => {
                assert_eq!(failed, 3);
                assert_eq!(total, 3);
            }
            other => panic!("expected SceneFailures, got {other:?}"),
        }
        let state = cx.store.get();
        assert!(state.scenes.iter().all(|s| s.status == SceneStatus::Failed));
    }

    #[tokio::test]
    async fn test_last_frame_prompt_generates_second_image() {
        let image = Arc::new(MockImageClient::success());
        let mut state = state_with_scenes(1);
        state.scenes[0].last_frame_prompt = "closing frame".to_string();
        let cx = context(state, Arc::clone(&image));

        run_adapter(&cx).await.expect("adapter run");

        let state = cx.store.get();
        assert!(!state.scenes[0].last_frame_url.is_empty());
        assert_eq!(image.call_count(), 2);
    }
}
