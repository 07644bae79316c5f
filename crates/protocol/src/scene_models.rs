//! Per-scene asset records.
//!
//! A scene is one segment of the final video: its image/video prompts,
//! the generated media references, and the slice of narration audio it
//! covers. Scenes are created by the scene-breakdown step and mutated by
//! the scene-image and scene-video adapters.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A time range inside the narration audio, in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeRange {
    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }
}

/// One word of the narration with its audio timing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    pub word: String,
    pub range: TimeRange,
}

/// Generation progress of a single scene.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SceneStatus {
    Pending,
    ImagesReady,
    VideoReady,
    Failed,
}

/// Prompts, generated media references and audio timing for one scene.
///
/// `scene_number` is the unique key; empty URL strings mean "not
/// generated yet" and lose against non-empty values when a server
/// snapshot is merged back into local state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct SceneAsset {
    pub scene_number: u32,

    /// Prompt for the scene's first-frame image.
    #[serde(default)]
    pub first_frame_prompt: String,

    /// Prompt for an optional last-frame image (empty when unused).
    #[serde(default)]
    pub last_frame_prompt: String,

    /// Prompt for the scene's video clip.
    #[serde(default)]
    pub video_prompt: String,

    /// Generated first-frame image reference.
    #[serde(default)]
    pub image_url: String,

    /// Generated last-frame image reference.
    #[serde(default)]
    pub last_frame_url: String,

    /// Generated video clip reference.
    #[serde(default)]
    pub video_url: String,

    /// The slice of narration audio this scene covers.
    #[serde(default)]
    pub audio_range: TimeRange,

    pub status: SceneStatus,
}

impl SceneAsset {
    /// A new scene with prompts but no generated media.
    pub fn new(scene_number: u32, audio_range: TimeRange) -> Self {
        Self {
            scene_number,
            first_frame_prompt: String::new(),
            last_frame_prompt: String::new(),
            video_prompt: String::new(),
            image_url: String::new(),
            last_frame_url: String::new(),
            video_url: String::new(),
            audio_range,
            status: SceneStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_duration() {
        let range = TimeRange {
            start_secs: 2.5,
            end_secs: 6.0,
        };
        assert!((range.duration_secs() - 3.5).abs() < f64::EPSILON);

        let inverted = TimeRange {
            start_secs: 6.0,
            end_secs: 2.5,
        };
        assert_eq!(inverted.duration_secs(), 0.0);
    }

    #[test]
    fn test_scene_asset_round_trip() {
        let mut scene = SceneAsset::new(
            3,
            TimeRange {
                start_secs: 0.0,
                end_secs: 4.2,
            },
        );
        scene.first_frame_prompt = "a red lighthouse at dusk".to_string();
        scene.image_url = "assets/scene-3.png".to_string();
        scene.status = SceneStatus::ImagesReady;

        let json = serde_json::to_string(&scene).expect("serialize");
        let back: SceneAsset = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, scene);
    }
}
