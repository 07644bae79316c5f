//! Step-dependency validation.
//!
//! Two entry points: [`validate_preflight`] runs once before a full run,
//! [`validate_before_step`] runs against the current state immediately
//! before each dispatched step. Error-severity issues block; warnings are
//! informational only.

use vf_protocol::{PipelineState, StepId};

use crate::steps::registry;

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Blocks execution of the associated step (or, during preflight,
    /// the whole run).
    Error,

    /// Informational only; never blocks.
    Warning,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    pub step: StepId,
    pub message: String,
    pub hint: Option<String>,
}

impl Issue {
    pub fn error(step: StepId, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            step,
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(step: StepId, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            step,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        self.hint = hint;
        self
    }
}

/// Whether any issue blocks execution.
pub fn has_blocking(issues: &[Issue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}

/// The first blocking issue, if any.
pub fn first_blocking(issues: &[Issue]) -> Option<&Issue> {
    issues.iter().find(|i| i.severity == Severity::Error)
}

/// Global prerequisites checked once before any step runs.
pub fn validate_preflight(state: &PipelineState) -> Vec<Issue> {
    let mut issues = Vec::new();

    if state.topic.trim().is_empty() {
        issues.push(
            Issue::error(StepId::ResearchTopic, "no topic set")
                .with_hint(Some("enter a topic before running the pipeline".to_string())),
        );
    }

    if state.models.voice_id.is_empty() {
        issues.push(Issue::warning(
            StepId::NarrationAudio,
            "no voice selected; the default narrator voice will be used",
        ));
    }

    if state.models.style_preset.is_empty() {
        issues.push(Issue::warning(
            StepId::SceneImages,
            "no style preset selected; images will use the model default",
        ));
    }

    issues
}

/// Check that every input field the registry declares as required for
/// `step` is present and non-empty in `state`.
pub fn validate_before_step(state: &PipelineState, step: StepId) -> Vec<Issue> {
    let spec = registry::spec(step);
    let mut issues = Vec::new();

    for requirement in spec.requires {
        if let Some((message, hint)) = requirement.check(state) {
            issues.push(Issue::error(step, message).with_hint(hint));
        }
    }

    for requirement in spec.recommends {
        if let Some((message, hint)) = requirement.check(state) {
            issues.push(Issue::warning(step, message).with_hint(hint));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_protocol::{SceneAsset, TimeRange};

    #[test]
    fn test_preflight_blocks_on_empty_topic() {
        let state = PipelineState::new();
        let issues = validate_preflight(&state);

        assert!(has_blocking(&issues));
        let blocking = first_blocking(&issues).expect("blocking issue");
        assert_eq!(blocking.step, StepId::ResearchTopic);
        assert!(blocking.hint.is_some());
    }

    #[test]
    fn test_preflight_warnings_do_not_block() {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");

        let issues = validate_preflight(&state);

        // Missing voice and preset produce warnings only.
        assert!(!has_blocking(&issues));
        assert!(issues.iter().any(|i| i.step == StepId::NarrationAudio));
    }

    #[test]
    fn test_before_step_missing_required_input() {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");

        let issues = validate_before_step(&state, StepId::NarrationAudio);

        assert!(has_blocking(&issues));
        assert!(issues[0].message.contains("Narration markup"));
    }

    #[test]
    fn test_before_step_satisfied() {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");
        state.step_mut(StepId::NarrationMarkup).response = "narration text".to_string();
        state.models.voice_id = "narrator-1".to_string();

        let issues = validate_before_step(&state, StepId::NarrationAudio);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_before_step_recommendation_is_warning() {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");
        state
            .scenes
            .push(SceneAsset::new(1, TimeRange::default()));

        let issues = validate_before_step(&state, StepId::SceneImages);

        // Scene list present, reference image missing: warning only.
        assert!(!has_blocking(&issues));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }
}
