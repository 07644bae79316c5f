//! Validated step-status transitions.
//!
//! Step statuses form a closed set with an explicit transition table;
//! components go through these functions instead of assigning statuses
//! ad hoc, and invalid transitions are rejected with a typed error.

use thiserror::Error;
use vf_protocol::{PipelineState, StepId, StepRunMetrics, StepStatus};

use crate::metrics;

/// Errors from state mutation helpers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid status transition for {step:?}: {from:?} -> {to:?}")]
    InvalidTransition {
        step: StepId,
        from: StepStatus,
        to: StepStatus,
    },
}

/// The transition table.
///
/// Running and the terminal statuses are mutually exclusive by
/// construction (one enum field); this table additionally forbids
/// skipping Running and re-entering Running from Running.
pub fn can_transition(from: StepStatus, to: StepStatus) -> bool {
    use StepStatus::*;
    matches!(
        (from, to),
        (Idle, Running)
            | (Running, Success)
            | (Running, Error)
            | (Running, Idle)
            | (Success, Running)
            | (Success, Stale)
            | (Success, Idle)
            | (Error, Running)
            | (Error, Idle)
            | (Stale, Running)
            | (Stale, Idle)
    )
}

fn transition(state: &mut PipelineState, id: StepId, to: StepStatus) -> Result<(), StateError> {
    let step = state.step_mut(id);
    if !can_transition(step.status, to) {
        return Err(StateError::InvalidTransition {
            step: id,
            from: step.status,
            to,
        });
    }
    step.status = to;
    Ok(())
}

/// Move a step to Running; clears any prior error message.
pub fn begin_step(state: &mut PipelineState, id: StepId) -> Result<(), StateError> {
    transition(state, id, StepStatus::Running)?;
    state.step_mut(id).error = None;
    Ok(())
}

/// Complete a Running step with its response and optional metrics.
///
/// Metrics, when present, are recorded on the session/cumulative
/// accumulators and the current totals are recomputed.
pub fn complete_step(
    state: &mut PipelineState,
    id: StepId,
    response: String,
    step_metrics: Option<StepRunMetrics>,
) -> Result<(), StateError> {
    transition(state, id, StepStatus::Success)?;
    let step = state.step_mut(id);
    step.response = response;
    step.error = None;
    step.metrics = step_metrics.clone();
    if let Some(m) = &step_metrics {
        metrics::record_step_metrics(state, m);
    }
    Ok(())
}

/// Fail a Running step with an error message.
pub fn fail_step(state: &mut PipelineState, id: StepId, message: &str) -> Result<(), StateError> {
    transition(state, id, StepStatus::Error)?;
    state.step_mut(id).error = Some(message.to_string());
    Ok(())
}

/// Mark a previously successful step stale because an upstream input
/// changed. Stale steps neither block a fresh run nor count as already
/// complete during a resume.
pub fn mark_step_stale(state: &mut PipelineState, id: StepId) -> Result<(), StateError> {
    transition(state, id, StepStatus::Stale)
}

/// Return a step to Idle (used when clearing a failure before a resume,
/// or rolling back batch members after an aborted batch call).
pub fn reset_step(state: &mut PipelineState, id: StepId) -> Result<(), StateError> {
    transition(state, id, StepStatus::Idle)
}

/// Clear every step's Error status back to Idle, preserving Success
/// outputs. Used when a run starts without resuming.
pub fn clear_step_errors(state: &mut PipelineState) {
    for id in StepId::ALL {
        let step = state.step_mut(id);
        if step.status == StepStatus::Error {
            step.status = StepStatus::Idle;
            step.error = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut state = PipelineState::new();
        let id = StepId::Hook;

        begin_step(&mut state, id).expect("idle -> running");
        assert_eq!(state.step(id).status, StepStatus::Running);

        complete_step(&mut state, id, "hook text".to_string(), None)
            .expect("running -> success");
        assert_eq!(state.step(id).status, StepStatus::Success);
        assert_eq!(state.step(id).response, "hook text");
    }

    #[test]
    fn test_running_is_exclusive() {
        let mut state = PipelineState::new();
        let id = StepId::Hook;

        begin_step(&mut state, id).expect("idle -> running");
        let err = begin_step(&mut state, id).expect_err("running -> running rejected");
        assert!(matches!(err, StateError::InvalidTransition { .. }));
    }

    #[test]
    fn test_cannot_complete_idle_step() {
        let mut state = PipelineState::new();
        let result = complete_step(&mut state, StepId::Hook, String::new(), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_begin_clears_prior_error() {
        let mut state = PipelineState::new();
        let id = StepId::SceneVideos;

        begin_step(&mut state, id).expect("idle -> running");
        fail_step(&mut state, id, "quota exceeded").expect("running -> error");
        assert_eq!(
            state.step(id).error.as_deref(),
            Some("quota exceeded")
        );

        begin_step(&mut state, id).expect("error -> running");
        assert!(state.step(id).error.is_none());
    }

    #[test]
    fn test_stale_from_success_only() {
        let mut state = PipelineState::new();
        let id = StepId::ScriptDraft;

        assert!(mark_step_stale(&mut state, id).is_err());

        begin_step(&mut state, id).expect("idle -> running");
        complete_step(&mut state, id, "draft".to_string(), None).expect("running -> success");
        mark_step_stale(&mut state, id).expect("success -> stale");
        assert_eq!(state.step(id).status, StepStatus::Stale);
    }

    #[test]
    fn test_clear_step_errors_preserves_success() {
        let mut state = PipelineState::new();

        begin_step(&mut state, StepId::Hook).expect("begin");
        complete_step(&mut state, StepId::Hook, "hook".to_string(), None).expect("complete");
        begin_step(&mut state, StepId::Outline).expect("begin");
        fail_step(&mut state, StepId::Outline, "boom").expect("fail");

        clear_step_errors(&mut state);

        assert_eq!(state.step(StepId::Hook).status, StepStatus::Success);
        assert_eq!(state.step(StepId::Hook).response, "hook");
        assert_eq!(state.step(StepId::Outline).status, StepStatus::Idle);
        assert!(state.step(StepId::Outline).error.is_none());
    }

    #[test]
    fn test_completion_records_metrics() {
        let mut state = PipelineState::new();
        let id = StepId::Hook;

        begin_step(&mut state, id).expect("begin");
        let m = StepRunMetrics {
            prompt_tokens: 60,
            completion_tokens: 40,
            total_tokens: 100,
            cost_usd: 0.01,
            duration_ms: 250,
        };
        complete_step(&mut state, id, "hook".to_string(), Some(m)).expect("complete");

        assert_eq!(state.session_totals.total_tokens, 100);
        assert_eq!(state.cumulative_totals.total_tokens, 100);
        assert_eq!(state.current_totals.total_tokens, 100);
    }
}
