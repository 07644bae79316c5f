//! Base StepAdapter trait and supporting types.
//!
//! Each adapter owns the full execution of its step: building the
//! request from the current state, invoking its collaborator, and
//! writing back its step's run state plus any derived pipeline fields.
//! The engine never looks inside an adapter; it inspects only the
//! resulting step status.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use vf_protocol::{PipelineState, StepId};

use crate::clients::{CollaboratorError, Collaborators};
use crate::config::AppConfig;
use crate::state::{StateError, StateStore};

/// Everything an adapter needs to execute.
#[derive(Clone)]
pub struct StepContext {
    pub store: StateStore,
    pub collaborators: Arc<Collaborators>,
    pub config: Arc<AppConfig>,
}

/// Errors from step adapters.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Missing input for {step:?}: {reason}")]
    MissingInput { step: StepId, reason: String },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Malformed response for {step:?}: {reason}")]
    InvalidResponse { step: StepId, reason: String },

    #[error("{failed} of {total} scene generations failed: {first}")]
    SceneFailures {
        failed: usize,
        total: usize,
        first: String,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

/// One step's executor.
#[async_trait]
pub trait StepAdapter: Send + Sync {
    fn id(&self) -> StepId;

    /// Execute the step against the live state. The dispatcher has
    /// already moved the step to Running; on `Ok` the adapter must have
    /// completed it, on `Err` the dispatcher records the failure.
    async fn execute(&self, cx: &StepContext) -> Result<(), AdapterError>;
}

/// Template variables for prompt resolution: the topic, every step's
/// response under its id key, and the formatted word timings.
pub fn prompt_vars(state: &PipelineState) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert("topic".to_string(), state.topic.clone());
    for id in StepId::ALL {
        vars.insert(id.key().to_string(), state.step(id).response);
    }
    let timings = state
        .word_timings
        .iter()
        .map(|w| {
            format!(
                "{:.2}-{:.2} {}",
                w.range.start_secs, w.range.end_secs, w.word
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    vars.insert("wordTimings".to_string(), timings);
    vars.insert("sceneCount".to_string(), state.scenes.len().to_string());
    vars
}

/// The script model for a step: template override, then the project
/// selection, then the configured default.
pub fn script_model(cx: &StepContext, state: &PipelineState, step: StepId) -> String {
    if let Some(template) = cx.config.prompts.get(step) {
        if let Some(model) = &template.model {
            return model.clone();
        }
    }
    if !state.models.script_model.is_empty() {
        return state.models.script_model.clone();
    }
    cx.config.settings.script_model.clone()
}

/// The image-style fragment for the project's preset, if any.
pub fn style_fragment(cx: &StepContext, state: &PipelineState) -> Option<String> {
    let preset_id = if state.models.style_preset.is_empty() {
        cx.config.settings.style_preset.as_str()
    } else {
        state.models.style_preset.as_str()
    };
    cx.config.style_prompt(preset_id).map(|s| s.to_string())
}
