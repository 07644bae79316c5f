//! Run-all execution state.
//!
//! `RunAllState` is the embedded snapshot of the orchestration state
//! machine: where the run is, what completed, what failed and why. It is
//! persisted inside the pipeline snapshot so a crashed or abandoned
//! session can offer a targeted resume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::step_models::StepId;

/// Lifecycle status of a run-all execution.
///
/// Completed, Error and Cancelled are terminal but re-enterable via an
/// explicit resume or restart.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunAllStatus {
    Idle,
    Running,
    Completed,
    Error,
    Cancelled,
}

/// Machine-readable classification of a run abort.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunErrorCode {
    /// A required input was missing before a step or the whole run.
    Validation,

    /// An adapter's external call failed, or a step finished in Error.
    StepExecution,

    /// User-requested stop observed at a checkpoint.
    Cancelled,

    /// An internal invariant was violated.
    Internal,
}

/// Classified, user-facing description of a run abort.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    pub code: RunErrorCode,
    pub message: String,
    pub retryable: bool,

    /// Optional recovery hint ("select a voice in settings", ...).
    #[serde(default)]
    pub hint: Option<String>,
}

impl RunError {
    pub fn new(code: RunErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Derived progress information for display.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_index: usize,
    pub total: usize,
    pub percent: f32,
    pub label: String,
}

/// Snapshot of the run-all state machine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RunAllState {
    pub status: RunAllStatus,

    #[serde(default)]
    pub current_step_id: Option<StepId>,

    #[serde(default)]
    pub current_step_index: Option<usize>,

    /// Always equal to the registry size.
    pub total_steps: usize,

    /// Tail steps completed by this run, in execution order, no
    /// duplicates. Carryover steps skipped during a resume are recorded
    /// in `skipped_step_ids` instead.
    #[serde(default)]
    pub completed_step_ids: Vec<StepId>,

    /// Steps not re-run because they were before the resume index or
    /// already successful when the run was resumed.
    #[serde(default)]
    pub skipped_step_ids: Vec<StepId>,

    #[serde(default)]
    pub failed_step_id: Option<StepId>,

    #[serde(default)]
    pub error: Option<RunError>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_resume: bool,
}

impl RunAllState {
    /// The initial Idle snapshot.
    pub fn idle() -> Self {
        Self {
            status: RunAllStatus::Idle,
            current_step_id: None,
            current_step_index: None,
            total_steps: StepId::COUNT,
            completed_step_ids: Vec::new(),
            skipped_step_ids: Vec::new(),
            failed_step_id: None,
            error: None,
            started_at: None,
            is_resume: false,
        }
    }

    /// Derived progress: current index / total / percent / label.
    ///
    /// A completed run reports 100% regardless of the last current index.
    pub fn progress(&self) -> Progress {
        let current_index = match self.status {
            RunAllStatus::Completed => self.total_steps,
            _ => self.current_step_index.unwrap_or(0),
        };
        let percent = if self.total_steps == 0 {
            0.0
        } else {
            (current_index as f32 / self.total_steps as f32) * 100.0
        };
        let label = match self.status {
            RunAllStatus::Idle => "Idle".to_string(),
            RunAllStatus::Completed => "Completed".to_string(),
            RunAllStatus::Cancelled => "Cancelled".to_string(),
            RunAllStatus::Error => self
                .failed_step_id
                .map(|s| format!("Failed at {}", s.label()))
                .unwrap_or_else(|| "Failed".to_string()),
            RunAllStatus::Running => self
                .current_step_id
                .map(|s| s.label().to_string())
                .unwrap_or_else(|| "Running".to_string()),
        };
        Progress {
            current_index,
            total: self.total_steps,
            percent,
            label,
        }
    }
}

impl Default for RunAllState {
    fn default() -> Self {
        Self::idle()
    }
}
