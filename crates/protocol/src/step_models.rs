//! Pipeline step identifiers and per-step run state.
//!
//! The step sequence is fixed: the first eight steps form the batch
//! domain (produced by one aggregated script-model call), the remaining
//! nine are dispatched individually by the run-all engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Execution domain of a step.
///
/// Batch steps are produced together by a single aggregated call that is
/// atomic from the engine's perspective; dispatched steps run one at a
/// time through their own adapter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepDomain {
    /// Produced by the aggregated script-model call.
    Batch,

    /// Dispatched individually through a step adapter.
    Dispatched,
}

/// Stable identifier of one pipeline step.
///
/// Declaration order is the fixed execution order. Snapshots serialize
/// ids in camelCase (`researchTopic`, `sceneImages`, ...); ids outside
/// this set are rejected at deserialization.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TS,
)]
#[serde(rename_all = "camelCase")]
pub enum StepId {
    ResearchTopic,
    TitleIdeas,
    Hook,
    Outline,
    ScriptDraft,
    ScriptPolish,
    NarrationMarkup,
    ImageStyleGuide,
    NarrationAudio,
    Timestamps,
    SceneBreakdown,
    ReferenceImage,
    SceneImages,
    SceneVideos,
    AssembleVideo,
    Thumbnail,
    VideoMetadata,
}

impl StepId {
    /// All steps in execution order.
    pub const ALL: [StepId; 17] = [
        StepId::ResearchTopic,
        StepId::TitleIdeas,
        StepId::Hook,
        StepId::Outline,
        StepId::ScriptDraft,
        StepId::ScriptPolish,
        StepId::NarrationMarkup,
        StepId::ImageStyleGuide,
        StepId::NarrationAudio,
        StepId::Timestamps,
        StepId::SceneBreakdown,
        StepId::ReferenceImage,
        StepId::SceneImages,
        StepId::SceneVideos,
        StepId::AssembleVideo,
        StepId::Thumbnail,
        StepId::VideoMetadata,
    ];

    /// Total number of steps.
    pub const COUNT: usize = Self::ALL.len();

    /// Index of the last batch-domain step.
    pub const LAST_BATCH_INDEX: usize = 7;

    /// Position of this step in the fixed execution order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Execution domain of this step.
    pub fn domain(self) -> StepDomain {
        if self.index() <= Self::LAST_BATCH_INDEX {
            StepDomain::Batch
        } else {
            StepDomain::Dispatched
        }
    }

    /// The serialized camelCase spelling, usable as a template variable
    /// or map key.
    pub fn key(self) -> &'static str {
        match self {
            StepId::ResearchTopic => "researchTopic",
            StepId::TitleIdeas => "titleIdeas",
            StepId::Hook => "hook",
            StepId::Outline => "outline",
            StepId::ScriptDraft => "scriptDraft",
            StepId::ScriptPolish => "scriptPolish",
            StepId::NarrationMarkup => "narrationMarkup",
            StepId::ImageStyleGuide => "imageStyleGuide",
            StepId::NarrationAudio => "narrationAudio",
            StepId::Timestamps => "timestamps",
            StepId::SceneBreakdown => "sceneBreakdown",
            StepId::ReferenceImage => "referenceImage",
            StepId::SceneImages => "sceneImages",
            StepId::SceneVideos => "sceneVideos",
            StepId::AssembleVideo => "assembleVideo",
            StepId::Thumbnail => "thumbnail",
            StepId::VideoMetadata => "videoMetadata",
        }
    }

    /// Human-readable label for progress display.
    pub fn label(self) -> &'static str {
        match self {
            StepId::ResearchTopic => "Topic research",
            StepId::TitleIdeas => "Title ideas",
            StepId::Hook => "Opening hook",
            StepId::Outline => "Outline",
            StepId::ScriptDraft => "Script draft",
            StepId::ScriptPolish => "Script polish",
            StepId::NarrationMarkup => "Narration markup",
            StepId::ImageStyleGuide => "Image style guide",
            StepId::NarrationAudio => "Narration audio",
            StepId::Timestamps => "Timestamps",
            StepId::SceneBreakdown => "Scene breakdown",
            StepId::ReferenceImage => "Reference image",
            StepId::SceneImages => "Scene images",
            StepId::SceneVideos => "Scene videos",
            StepId::AssembleVideo => "Video assembly",
            StepId::Thumbnail => "Thumbnail",
            StepId::VideoMetadata => "Video metadata",
        }
    }

    /// The batch-domain steps, in order.
    pub fn batch_steps() -> &'static [StepId] {
        &Self::ALL[..=Self::LAST_BATCH_INDEX]
    }

    /// The individually dispatched tail steps, in order.
    pub fn tail_steps() -> &'static [StepId] {
        &Self::ALL[Self::LAST_BATCH_INDEX + 1..]
    }
}

/// Lifecycle status of a single step.
///
/// The progression order used when merging a server snapshot against
/// local state is Idle < Running < {Success, Error, Stale}.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Step has not run (or was reset).
    Idle,

    /// Step is currently executing.
    Running,

    /// Step finished and its outputs are current.
    Success,

    /// Step finished with an error.
    Error,

    /// Step succeeded, but an upstream input changed afterwards.
    Stale,
}

impl StepStatus {
    /// Rank in the merge progress order.
    pub fn progress_rank(self) -> u8 {
        match self {
            StepStatus::Idle => 0,
            StepStatus::Running => 1,
            StepStatus::Success | StepStatus::Error | StepStatus::Stale => 2,
        }
    }

    /// Whether this status represents a finished execution.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Error | StepStatus::Stale
        )
    }
}

/// Token and cost metrics for one successful step execution.
///
/// Attached to a step's run state once, when the execution completes;
/// a rerun replaces the whole record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct StepRunMetrics {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub duration_ms: u64,
}

/// Running token/cost totals.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    pub total_tokens: u64,
    pub cost_usd: f64,
}

/// The run state of one step inside the pipeline aggregate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct StepRunState {
    pub id: StepId,

    pub status: StepStatus,

    /// The resolved prompt text the step was (last) executed with.
    #[serde(default)]
    pub prompt: String,

    /// The response text the step produced. Empty until the step has
    /// succeeded at least once.
    #[serde(default)]
    pub response: String,

    /// Metrics of the most recent successful execution.
    #[serde(default)]
    pub metrics: Option<StepRunMetrics>,

    /// Error message of the most recent failed execution. Cleared on the
    /// next transition to Running.
    #[serde(default)]
    pub error: Option<String>,
}

impl StepRunState {
    /// A fresh idle state for the given step.
    pub fn idle(id: StepId) -> Self {
        Self {
            id,
            status: StepStatus::Idle,
            prompt: String::new(),
            response: String::new(),
            metrics: None,
            error: None,
        }
    }
}
