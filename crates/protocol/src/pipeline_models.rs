//! The pipeline aggregate root and its persisted snapshot shape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::run_models::RunAllState;
use crate::scene_models::{SceneAsset, WordTiming};
use crate::step_models::{StepId, StepRunState, UsageTotals};

/// Current snapshot document version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Model and voice selections for the project.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ModelSelection {
    #[serde(default)]
    pub script_model: String,

    #[serde(default)]
    pub image_model: String,

    #[serde(default)]
    pub video_model: String,

    #[serde(default)]
    pub voice_id: String,

    /// Visual style preset id from `.videoforge/presets/`.
    #[serde(default)]
    pub style_preset: String,
}

/// The full aggregate describing one project's generation progress.
///
/// All components read and mutate this through the state store; it is
/// replaced as a whole snapshot, never partially written. The step map's
/// key set is always the full registry: entries missing from a loaded
/// snapshot are synthesized as idle on access, and ids outside the
/// registry fail deserialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    #[ts(type = "string")]
    pub project_id: Uuid,

    #[serde(default)]
    pub topic: String,

    #[serde(default)]
    pub models: ModelSelection,

    #[serde(default)]
    pub steps: BTreeMap<StepId, StepRunState>,

    #[serde(default)]
    pub scenes: Vec<SceneAsset>,

    /// Word-level narration timing produced by the timestamps step.
    #[serde(default)]
    pub word_timings: Vec<WordTiming>,

    /// Reference image generated locally; may not have round-tripped
    /// through the snapshot store yet.
    #[serde(default)]
    pub reference_image_url: String,

    #[serde(default)]
    pub narration_audio_path: String,

    #[serde(default)]
    pub thumbnail_path: String,

    #[serde(default)]
    pub script_path: String,

    #[serde(default)]
    pub final_video_path: String,

    /// Totals recomputed from the current step map.
    #[serde(default)]
    pub current_totals: UsageTotals,

    /// Running totals for this session; accumulate across reruns.
    #[serde(default)]
    pub session_totals: UsageTotals,

    /// Running totals across all sessions of this project.
    #[serde(default)]
    pub cumulative_totals: UsageTotals,

    #[serde(default)]
    pub run_all: RunAllState,
}

impl PipelineState {
    /// A fresh project: all steps idle, totals zero.
    pub fn new() -> Self {
        let mut steps = BTreeMap::new();
        for id in StepId::ALL {
            steps.insert(id, StepRunState::idle(id));
        }
        Self {
            project_id: Uuid::new_v4(),
            topic: String::new(),
            models: ModelSelection::default(),
            steps,
            scenes: Vec::new(),
            word_timings: Vec::new(),
            reference_image_url: String::new(),
            narration_audio_path: String::new(),
            thumbnail_path: String::new(),
            script_path: String::new(),
            final_video_path: String::new(),
            current_totals: UsageTotals::default(),
            session_totals: UsageTotals::default(),
            cumulative_totals: UsageTotals::default(),
            run_all: RunAllState::idle(),
        }
    }

    /// Read one step's run state, synthesizing an idle entry when the
    /// loaded snapshot was missing it.
    pub fn step(&self, id: StepId) -> StepRunState {
        self.steps
            .get(&id)
            .cloned()
            .unwrap_or_else(|| StepRunState::idle(id))
    }

    /// Mutable access to one step's run state, inserting an idle entry
    /// when missing.
    pub fn step_mut(&mut self, id: StepId) -> &mut StepRunState {
        self.steps.entry(id).or_insert_with(|| StepRunState::idle(id))
    }

    /// Ensure the step map's key set is exactly the registry.
    pub fn ensure_all_steps(&mut self) {
        for id in StepId::ALL {
            self.steps.entry(id).or_insert_with(|| StepRunState::idle(id));
        }
    }

    /// Wholesale reset for an explicit "new project": a fresh aggregate
    /// with a new project id; model selections are kept.
    pub fn reset(&mut self) {
        let models = self.models.clone();
        *self = PipelineState::new();
        self.models = models;
    }

    /// Change the topic.
    ///
    /// A change that is not whitespace-only clears all derived content:
    /// steps back to idle, scenes, timings and asset references dropped,
    /// current totals zeroed, run state back to idle. Session and
    /// cumulative totals are spend records and survive.
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        let topic = topic.into();
        let changed = topic.trim() != self.topic.trim();
        self.topic = topic;
        if !changed {
            return;
        }
        for id in StepId::ALL {
            self.steps.insert(id, StepRunState::idle(id));
        }
        self.scenes.clear();
        self.word_timings.clear();
        self.reference_image_url.clear();
        self.narration_audio_path.clear();
        self.thumbnail_path.clear();
        self.script_path.clear();
        self.final_video_path.clear();
        self.current_totals = UsageTotals::default();
        self.run_all = RunAllState::idle();
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

/// The self-describing document persisted by the snapshot store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub version: u32,

    pub saved_at: DateTime<Utc>,

    pub state: PipelineState,
}

impl ProjectSnapshot {
    pub fn new(state: PipelineState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            state,
        }
    }
}
