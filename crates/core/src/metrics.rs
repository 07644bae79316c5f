//! Token and cost accounting.
//!
//! Two distinct shapes on purpose: [`step_totals`] is a recomputation
//! over the current step map, so a rerun of a step replaces its own
//! contribution; [`accumulate`] is a true running accumulator fed one
//! delta per newly completed execution, so session and cumulative totals
//! reflect total spend across reruns.

use std::collections::BTreeMap;

use vf_protocol::{PipelineState, StepId, StepRunMetrics, StepRunState, UsageTotals};

/// Sum tokens and cost across the current run state of every step.
pub fn step_totals(steps: &BTreeMap<StepId, StepRunState>) -> UsageTotals {
    let mut totals = UsageTotals::default();
    for step in steps.values() {
        if let Some(metrics) = &step.metrics {
            totals.total_tokens += metrics.total_tokens;
            totals.cost_usd += metrics.cost_usd;
        }
    }
    totals
}

/// Add one newly completed step's metrics to a running total.
pub fn accumulate(prev: UsageTotals, metrics: &StepRunMetrics) -> UsageTotals {
    UsageTotals {
        total_tokens: prev.total_tokens + metrics.total_tokens,
        cost_usd: prev.cost_usd + metrics.cost_usd,
    }
}

/// Record one completed execution on the aggregate: session and
/// cumulative totals accumulate the delta, current totals are recomputed
/// from the step map.
pub fn record_step_metrics(state: &mut PipelineState, metrics: &StepRunMetrics) {
    state.session_totals = accumulate(state.session_totals, metrics);
    state.cumulative_totals = accumulate(state.cumulative_totals, metrics);
    state.current_totals = step_totals(&state.steps);
}

/// Prices in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Pricing for a script model, by normalized name.
///
/// Unknown models price at zero rather than failing; cost estimates are
/// advisory.
pub fn pricing_for(model: &str) -> ModelPricing {
    if model.contains("claude-sonnet-4") {
        ModelPricing {
            input_per_million: 3.00,
            output_per_million: 15.00,
        }
    } else if model.contains("claude-haiku") {
        ModelPricing {
            input_per_million: 1.00,
            output_per_million: 5.00,
        }
    } else if model.contains("gemini-2.5-flash") {
        ModelPricing {
            input_per_million: 0.30,
            output_per_million: 2.50,
        }
    } else if model.contains("gemini-2.0-flash") {
        ModelPricing {
            input_per_million: 0.10,
            output_per_million: 0.40,
        }
    } else {
        ModelPricing {
            input_per_million: 0.0,
            output_per_million: 0.0,
        }
    }
}

/// Estimate the USD cost of one call from its token counts.
pub fn estimate_cost_usd(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    let pricing = pricing_for(model);
    (prompt_tokens as f64 / 1_000_000.0) * pricing.input_per_million
        + (completion_tokens as f64 / 1_000_000.0) * pricing.output_per_million
}
