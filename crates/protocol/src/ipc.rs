//! Operation/Event protocol between the hosting application and the core.
//!
//! The core never renders anything: the host sends `Op` commands and
//! subscribes to the `Event` stream. Communication is asynchronous and
//! channel-based, so persistence lag or a long external call never
//! blocks the host.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::run_models::{Progress, RunError};
use crate::step_models::{StepId, StepRunMetrics};

/// Operations sent from the hosting application to the core.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "startRun",
///   "payload": { "resume": false }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Op {
    /// Start the full pipeline run; `resume` re-enters at the recorded
    /// failure index instead of restarting from the first step.
    StartRun { resume: bool },

    /// Resume from a retryable Error or Cancelled terminal state.
    ResumeRun,

    /// Cooperatively cancel the in-progress run.
    CancelRun,

    /// Return the run-all state machine to its initial Idle snapshot.
    ResetRun,

    /// Execute a single step outside a full run.
    RunStep { step: StepId },

    /// Request a progress event.
    GetProgress,

    /// Shut down the core gracefully.
    Shutdown,
}

/// Events sent from the core to the hosting application.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A run-all execution has started.
    RunStarted {
        #[ts(type = "string")]
        project_id: Uuid,
        resume: bool,
    },

    /// A step began executing.
    StepStarted {
        #[ts(type = "string")]
        project_id: Uuid,
        step: StepId,
        index: usize,
    },

    /// A step finished successfully.
    StepCompleted {
        #[ts(type = "string")]
        project_id: Uuid,
        step: StepId,
        metrics: Option<StepRunMetrics>,
    },

    /// A step was not re-run during a resume.
    StepSkipped {
        #[ts(type = "string")]
        project_id: Uuid,
        step: StepId,
    },

    /// A step finished in error; the run aborts after this event.
    StepFailed {
        #[ts(type = "string")]
        project_id: Uuid,
        step: StepId,
        error: RunError,
    },

    /// The aggregated batch call finished successfully.
    BatchCompleted {
        #[ts(type = "string")]
        project_id: Uuid,
        steps: Vec<StepId>,
    },

    /// The whole run completed.
    RunCompleted {
        #[ts(type = "string")]
        project_id: Uuid,
    },

    /// The run aborted with a classified error.
    RunFailed {
        #[ts(type = "string")]
        project_id: Uuid,
        failed_step: Option<StepId>,
        error: RunError,
    },

    /// The run stopped at a cancellation checkpoint.
    RunCancelled {
        #[ts(type = "string")]
        project_id: Uuid,
    },

    /// Derived progress changed.
    ProgressUpdate {
        #[ts(type = "string")]
        project_id: Uuid,
        progress: Progress,
    },

    /// A background save completed and its response was merged.
    SaveCompleted {
        #[ts(type = "string")]
        project_id: Uuid,
    },

    /// A background save failed; orchestration continues.
    SaveFailed {
        #[ts(type = "string")]
        project_id: Uuid,
        error: String,
    },
}
