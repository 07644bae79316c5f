//! Aggregated batch adapter for the script steps.
//!
//! The eight batch-domain steps are produced by one external call that
//! is atomic from the engine's perspective: either every included step
//! completes, or the whole call fails and the included steps are rolled
//! back (the first carries the error, the rest return to Idle).

use std::collections::BTreeMap;
use std::time::Instant;

use vf_protocol::{StepId, StepRunMetrics};

use crate::adapters::base::{prompt_vars, script_model, AdapterError, StepContext};
use crate::clients::BatchRequest;
use crate::metrics;
use crate::state::transitions;

pub struct BatchAdapter;

impl BatchAdapter {
    /// Run the aggregated call for the given batch steps.
    pub async fn run(cx: &StepContext, include: &[StepId]) -> Result<(), AdapterError> {
        let state = cx.store.get();
        let vars = prompt_vars(&state);
        let model = script_model(cx, &state, StepId::ScriptDraft);
        let prompts: Vec<(StepId, String)> = include
            .iter()
            .map(|id| (*id, cx.config.prompts.resolve(*id, &vars)))
            .collect();

        cx.store.try_update(|s| {
            for (id, prompt) in &prompts {
                transitions::begin_step(s, *id)?;
                s.step_mut(*id).prompt = prompt.clone();
            }
            Ok::<(), crate::state::StateError>(())
        })?;

        let started = Instant::now();
        let request = BatchRequest {
            topic: state.topic.clone(),
            model: model.clone(),
            prompts,
        };
        let response = match cx.collaborators.script.generate_batch(&request).await {
            Ok(response) => response,
            Err(e) => {
                Self::roll_back(cx, include, &e.to_string())?;
                return Err(e.into());
            }
        };

        let mut outputs: BTreeMap<StepId, _> = BTreeMap::new();
        for output in response.outputs {
            outputs.insert(output.step, output);
        }
        if let Some(missing) = include.iter().find(|id| !outputs.contains_key(id)) {
            let reason = format!("batch response is missing \"{}\"", missing.label());
            Self::roll_back(cx, include, &reason)?;
            return Err(AdapterError::InvalidResponse {
                step: *missing,
                reason,
            });
        }

        // Applied in a single replacement so no observer sees a
        // half-completed batch.
        let duration_ms = (started.elapsed().as_millis() as u64) / include.len().max(1) as u64;
        cx.store.try_update(|s| {
            for id in include {
                let output = &outputs[id];
                let step_metrics = StepRunMetrics {
                    prompt_tokens: output.prompt_tokens,
                    completion_tokens: output.completion_tokens,
                    total_tokens: output.prompt_tokens + output.completion_tokens,
                    cost_usd: metrics::estimate_cost_usd(
                        &model,
                        output.prompt_tokens,
                        output.completion_tokens,
                    ),
                    duration_ms,
                };
                transitions::complete_step(s, *id, output.text.clone(), Some(step_metrics))?;
            }
            Ok::<(), crate::state::StateError>(())
        })?;
        Ok(())
    }

    /// On a failed batch call the first included step records the error
    /// and the rest return to Idle.
    fn roll_back(cx: &StepContext, include: &[StepId], message: &str) -> Result<(), AdapterError> {
        cx.store.try_update(|s| {
            let mut steps = include.iter();
            if let Some(first) = steps.next() {
                transitions::fail_step(s, *first, message)?;
            }
            for id in steps {
                transitions::reset_step(s, *id)?;
            }
            Ok::<(), crate::state::StateError>(())
        })?;
        Ok(())
    }
}
