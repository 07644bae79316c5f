//! Timestamp extraction adapter.

use async_trait::async_trait;
use vf_protocol::StepId;

use crate::adapters::base::{AdapterError, StepAdapter, StepContext};
use crate::state::transitions;

pub struct TimestampsAdapter;

#[async_trait]
impl StepAdapter for TimestampsAdapter {
    fn id(&self) -> StepId {
        StepId::Timestamps
    }

    async fn execute(&self, cx: &StepContext) -> Result<(), AdapterError> {
        let state = cx.store.get();
        let audio_path = state.narration_audio_path.clone();
        if audio_path.is_empty() {
            return Err(AdapterError::MissingInput {
                step: StepId::Timestamps,
                reason: "no narration audio to align".to_string(),
            });
        }

        cx.store
            .update(|s| s.step_mut(StepId::Timestamps).prompt = audio_path.clone());

        let timings = cx.collaborators.timestamps.extract(&audio_path).await?;
        if timings.is_empty() {
            return Err(AdapterError::InvalidResponse {
                step: StepId::Timestamps,
                reason: "no word timings returned".to_string(),
            });
        }

        let total_secs = timings
            .last()
            .map(|w| w.range.end_secs)
            .unwrap_or_default();
        let response = format!("{} words timed across {total_secs:.1}s", timings.len());

        cx.store.try_update(|s| {
            transitions::complete_step(s, StepId::Timestamps, response.clone(), None)?;
            s.word_timings = timings.clone();
            Ok::<(), crate::state::StateError>(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vf_protocol::{PipelineState, StepStatus};

    use crate::clients::Collaborators;
    use crate::config::AppConfig;
    use crate::state::StateStore;

    #[tokio::test]
    async fn test_extracts_timings_into_state() {
        let mut state = PipelineState::new();
        state.set_topic("Black holes");
        state.narration_audio_path = "mock://narration.mp3".to_string();
        let cx = StepContext {
            store: StateStore::new(state),
            collaborators: Arc::new(Collaborators::mock()),
            config: Arc::new(AppConfig::default()),
        };

        cx.store
            .try_update(|s| transitions::begin_step(s, StepId::Timestamps))
            .expect("begin");
        TimestampsAdapter.execute(&cx).await.expect("adapter run");

        let state = cx.store.get();
        assert_eq!(state.step(StepId::Timestamps).status, StepStatus::Success);
        assert!(!state.word_timings.is_empty());
        assert!(state.step(StepId::Timestamps).response.contains("words timed"));
    }

    #[tokio::test]
    async fn test_missing_audio_is_an_input_error() {
        let cx = StepContext {
            store: StateStore::new(PipelineState::new()),
            collaborators: Arc::new(Collaborators::mock()),
            config: Arc::new(AppConfig::default()),
        };

        cx.store
            .try_update(|s| transitions::begin_step(s, StepId::Timestamps))
            .expect("begin");
        let result = TimestampsAdapter.execute(&cx).await;
        assert!(matches!(result, Err(AdapterError::MissingInput { .. })));
    }
}
