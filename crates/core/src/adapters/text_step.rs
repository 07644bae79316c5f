//! Generic single-step text adapter.
//!
//! Serves every text-generation step that has no named adapter: all
//! batch-domain steps when run individually, plus the scene-breakdown
//! and video-metadata tail steps. The scene-breakdown response is parsed
//! into the scene list as this adapter's derived write-back.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_stream::StreamExt;
use vf_protocol::{SceneAsset, SceneStatus, StepId, StepRunMetrics, TimeRange};

use crate::adapters::base::{prompt_vars, script_model, AdapterError, StepAdapter, StepContext};
use crate::clients::{TextEvent, TextRequest};
use crate::metrics;
use crate::state::transitions;

pub struct TextStepAdapter {
    step: StepId,
}

impl TextStepAdapter {
    pub fn new(step: StepId) -> Self {
        Self { step }
    }
}

#[async_trait]
impl StepAdapter for TextStepAdapter {
    fn id(&self) -> StepId {
        self.step
    }

    async fn execute(&self, cx: &StepContext) -> Result<(), AdapterError> {
        let state = cx.store.get();
        let prompt = cx.config.prompts.resolve(self.step, &prompt_vars(&state));
        let model = script_model(cx, &state, self.step);
        cx.store.update(|s| s.step_mut(self.step).prompt = prompt.clone());

        let started = Instant::now();
        let mut stream = cx
            .collaborators
            .script
            .generate(&TextRequest {
                step: self.step,
                model: model.clone(),
                prompt,
            })
            .await?;

        let mut response = String::new();
        let mut prompt_tokens = 0u64;
        let mut completion_tokens = 0u64;
        while let Some(event) = stream.next().await {
            match event? {
                TextEvent::Chunk(chunk) => response.push_str(&chunk),
                TextEvent::Usage {
                    prompt_tokens: p,
                    completion_tokens: c,
                } => {
                    prompt_tokens = p;
                    completion_tokens = c;
                }
                TextEvent::Completed => break,
            }
        }

        if response.trim().is_empty() {
            return Err(AdapterError::InvalidResponse {
                step: self.step,
                reason: "empty response".to_string(),
            });
        }

        let scenes = if self.step == StepId::SceneBreakdown {
            Some(parse_scene_breakdown(&response)?)
        } else {
            None
        };

        let step_metrics = StepRunMetrics {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_usd: metrics::estimate_cost_usd(&model, prompt_tokens, completion_tokens),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        cx.store.try_update(|s| {
            transitions::complete_step(s, self.step, response.clone(), Some(step_metrics.clone()))?;
            if let Some(scenes) = &scenes {
                s.scenes = scenes.clone();
            }
            Ok::<(), crate::state::StateError>(())
        })?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneBreakdownItem {
    scene: u32,
    image_prompt: String,
    #[serde(default)]
    last_frame_prompt: String,
    video_prompt: String,
    start_secs: f64,
    end_secs: f64,
}

/// Parse the scene list out of a breakdown response.
///
/// Models wrap the JSON in prose often enough that we cut from the first
/// `[` to the last `]` before parsing.
fn parse_scene_breakdown(response: &str) -> Result<Vec<SceneAsset>, AdapterError> {
    let start = response.find('[');
    let end = response.rfind(']');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => {
            return Err(AdapterError::InvalidResponse {
                step: StepId::SceneBreakdown,
                reason: "no JSON array in response".to_string(),
            })
        }
    };

    let items: Vec<SceneBreakdownItem> =
        serde_json::from_str(json).map_err(|e| AdapterError::InvalidResponse {
            step: StepId::SceneBreakdown,
            reason: format!("scene list does not parse: {e}"),
        })?;

    if items.is_empty() {
        return Err(AdapterError::InvalidResponse {
            step: StepId::SceneBreakdown,
            reason: "scene list is empty".to_string(),
        });
    }

    Ok(items
        .into_iter()
        .map(|item| {
            let mut scene = SceneAsset::new(
                item.scene,
                TimeRange {
                    start_secs: item.start_secs,
                    end_secs: item.end_secs,
                },
            );
            scene.first_frame_prompt = item.image_prompt;
            scene.last_frame_prompt = item.last_frame_prompt;
            scene.video_prompt = item.video_prompt;
            scene.status = SceneStatus::Pending;
            scene
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scene_breakdown_with_prose_wrapper() {
        let response = r#"Here are the scenes:
[
  {"scene": 1, "imagePrompt": "a lighthouse", "videoPrompt": "slow pan", "startSecs": 0.0, "endSecs": 4.0},
  {"scene": 2, "imagePrompt": "a storm", "lastFramePrompt": "calm sea", "videoPrompt": "waves crash", "startSecs": 4.0, "endSecs": 9.5}
]
Let me know if you want changes."#;

        let scenes = parse_scene_breakdown(response).expect("parse");
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].scene_number, 1);
        assert_eq!(scenes[0].first_frame_prompt, "a lighthouse");
        assert!(scenes[0].last_frame_prompt.is_empty());
        assert_eq!(scenes[1].last_frame_prompt, "calm sea");
        assert!((scenes[1].audio_range.end_secs - 9.5).abs() < f64::EPSILON);
        assert_eq!(scenes[1].status, SceneStatus::Pending);
    }

    #[test]
    fn test_parse_scene_breakdown_rejects_prose_only() {
        let result = parse_scene_breakdown("I could not produce scenes.");
        assert!(matches!(
            result,
            Err(AdapterError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_parse_scene_breakdown_rejects_empty_list() {
        let result = parse_scene_breakdown("[]");
        assert!(matches!(
            result,
            Err(AdapterError::InvalidResponse { .. })
        ));
    }
}
