//! Final video assembly adapter.

use async_trait::async_trait;
use vf_protocol::{SceneAsset, StepId};

use crate::adapters::base::{AdapterError, StepAdapter, StepContext};
use crate::clients::{AssemblyRequest, ClipSegment};
use crate::state::transitions;

pub struct AssemblyAdapter;

#[async_trait]
impl StepAdapter for AssemblyAdapter {
    fn id(&self) -> StepId {
        StepId::AssembleVideo
    }

    async fn execute(&self, cx: &StepContext) -> Result<(), AdapterError> {
        let state = cx.store.get();
        if state.narration_audio_path.is_empty() {
            return Err(AdapterError::MissingInput {
                step: StepId::AssembleVideo,
                reason: "no narration audio available".to_string(),
            });
        }

        let mut scenes: Vec<&SceneAsset> = state.scenes.iter().collect();
        scenes.sort_by_key(|s| s.scene_number);
        if scenes.is_empty() || scenes.iter().any(|s| s.video_url.is_empty()) {
            return Err(AdapterError::MissingInput {
                step: StepId::AssembleVideo,
                reason: "not every scene has a video clip".to_string(),
            });
        }

        let clips: Vec<ClipSegment> = scenes
            .iter()
            .map(|s| ClipSegment {
                video_url: s.video_url.clone(),
                audio_range: s.audio_range,
            })
            .collect();
        let summary = format!("{} clips + narration", clips.len());
        cx.store
            .update(|s| s.step_mut(StepId::AssembleVideo).prompt = summary.clone());

        let url = cx
            .collaborators
            .assembler
            .assemble(&AssemblyRequest {
                clips,
                narration_audio_path: state.narration_audio_path.clone(),
            })
            .await?;

        cx.store.try_update(|s| {
            transitions::complete_step(s, StepId::AssembleVideo, url.clone(), None)?;
            s.final_video_path = url.clone();
            Ok::<(), crate::state::StateError>(())
        })?;
        Ok(())
    }
}
