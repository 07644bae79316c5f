//! Scene-video generation adapter.
//!
//! Turns each scene's first-frame image (and optional last-frame image)
//! into a video clip. Same bounded fan-out and all-settled batching as
//! the scene-image adapter.

use async_trait::async_trait;
use vf_protocol::{SceneAsset, SceneStatus, StepId};

use crate::adapters::base::{AdapterError, StepAdapter, StepContext};
use crate::adapters::scene_images::SCENE_FAN_OUT;
use crate::clients::{ClipRequest, CollaboratorError};
use crate::state::transitions;

pub struct SceneVideosAdapter;

type SceneResult = (u32, Result<String, CollaboratorError>);

impl SceneVideosAdapter {
    async fn generate_for(
        cx: &StepContext,
        model: &str,
        frame_count: u32,
        scene: &SceneAsset,
    ) -> SceneResult {
        if scene.image_url.is_empty() {
            return (
                scene.scene_number,
                Err(CollaboratorError::InvalidResponse(format!(
                    "scene {} has no start image",
                    scene.scene_number
                ))),
            );
        }
        let request = ClipRequest {
            start_image_url: scene.image_url.clone(),
            end_image_url: if scene.last_frame_url.is_empty() {
                None
            } else {
                Some(scene.last_frame_url.clone())
            },
            prompt: scene.video_prompt.clone(),
            model: model.to_string(),
            frame_count,
        };
        (
            scene.scene_number,
            cx.collaborators.video.generate(&request).await,
        )
    }
}

#[async_trait]
impl StepAdapter for SceneVideosAdapter {
    fn id(&self) -> StepId {
        StepId::SceneVideos
    }

    async fn execute(&self, cx: &StepContext) -> Result<(), AdapterError> {
        let state = cx.store.get();
        if state.scenes.is_empty() {
            return Err(AdapterError::MissingInput {
                step: StepId::SceneVideos,
                reason: "the scene list is empty".to_string(),
            });
        }

        let pending: Vec<SceneAsset> = state
            .scenes
            .iter()
            .filter(|s| s.video_url.is_empty())
            .cloned()
            .collect();

        let model = if state.models.video_model.is_empty() {
            cx.config.settings.video_model.clone()
        } else {
            state.models.video_model.clone()
        };
        let frame_count = cx.config.settings.frames_per_scene;

        if let Some(first) = pending.first() {
            let prompt = first.video_prompt.clone();
            cx.store
                .update(|s| s.step_mut(StepId::SceneVideos).prompt = prompt.clone());
        }

        let mut failed = 0usize;
        let mut first_error: Option<String> = None;
        for chunk in pending.chunks(SCENE_FAN_OUT) {
            let results: Vec<SceneResult> = match chunk {
                [a] => vec![Self::generate_for(cx, &model, frame_count, a).await],
                [a, b] => {
                    let (ra, rb) = tokio::join!(
                        Self::generate_for(cx, &model, frame_count, a),
                        Self::generate_for(cx, &model, frame_count, b),
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

            cx.store.update(|s| {
                for (number, result) in &results {
                    if let Some(scene) = s.scenes.iter_mut().find(|sc| sc.scene_number == *number)
                    {
                        match result {
                            Ok(url) => {
                                scene.video_url = url.clone();
                                scene.status = SceneStatus::VideoReady;
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

        let response = format!("{} scene clip(s) generated", pending.len());
        cx.store
            .try_update(|s| transitions::complete_step(s, StepId::SceneVideos, response.clone(), None))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vf_protocol::{PipelineState, StepStatus, TimeRange};

    use crate::clients::mock::MockVideoClient;
    use crate::clients::Collaborators;
    use crate::config::AppConfig;
    use crate::state::StateStore;

    fn state_with_ready_scenes(count: u32) -> PipelineState {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");
        for i in 1..=count {
            let mut scene = SceneAsset::new(i, TimeRange::default());
            scene.first_frame_prompt = format!("scene {i}");
            scene.video_prompt = format!("camera move {i}");
            scene.image_url = format!("image-{i}.png");
            scene.status = SceneStatus::ImagesReady;
            state.scenes.push(scene);
        }
        state
    }

    fn context(state: PipelineState, video: Arc<MockVideoClient>) -> StepContext {
        let collaborators = Collaborators {
            video,
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
            .try_update(|s| transitions::begin_step(s, StepId::SceneVideos))?;
        SceneVideosAdapter.execute(cx).await
    }

    #[tokio::test]
    async fn test_generates_clip_per_scene() {
        let video = Arc::new(MockVideoClient::success());
        let cx = context(state_with_ready_scenes(4), Arc::clone(&video));

        run_adapter(&cx).await.expect("adapter run");

        let state = cx.store.get();
        assert_eq!(state.step(StepId::SceneVideos).status, StepStatus::Success);
        assert!(state
            .scenes
            .iter()
            .all(|s| !s.video_url.is_empty() && s.status == SceneStatus::VideoReady));
        assert_eq!(video.call_count(), 4);
    }

    #[tokio::test]
    async fn test_quota_failure_settles_whole_batch() {
        let video = Arc::new(MockVideoClient::quota_exceeded());
        let cx = context(state_with_ready_scenes(4), Arc::clone(&video));

        let result = run_adapter(&cx).await;

        // All four siblings were attempted; none aborted the others.
        assert_eq!(video.call_count(), 4);
        match result {
            Err(AdapterError::SceneFailures { failed, first, .. }) => {
                assert_eq!(failed, 4);
                assert!(first.contains("quota exceeded"));
            }
            other => panic!("expected SceneFailures, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rerun_skips_scenes_with_clips() {
        let video = Arc::new(MockVideoClient::success());
        let mut state = state_with_ready_scenes(3);
        state.scenes[0].video_url = "existing.mp4".to_string();
        let cx = context(state, Arc::clone(&video));

        run_adapter(&cx).await.expect("adapter run");

        assert_eq!(video.call_count(), 2);
        assert_eq!(cx.store.get().scenes[0].video_url, "existing.mp4");
    }
}
