//! Custom assertions over collected engine events.

use std::time::Duration;

use tokio::sync::mpsc;
use vf_protocol::{Event, StepId};

/// Collect events until a terminal run event arrives or the timeout
/// elapses.
pub async fn collect_until_terminal(
    rx: &mut mpsc::Receiver<Event>,
    timeout: Duration,
) -> Vec<Event> {
    let mut events = Vec::new();
    let start = tokio::time::Instant::now();

    while start.elapsed() < timeout {
        match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            Ok(Some(event)) => {
                let is_terminal = matches!(
                    &event,
                    Event::RunCompleted { .. }
                        | Event::RunFailed { .. }
                        | Event::RunCancelled { .. }
                );
                events.push(event);
                if is_terminal {
                    break;
                }
            }
            Ok(None) => break,  // Channel closed
            Err(_) => continue, // Timeout, keep waiting
        }
    }

    events
}

pub fn has_run_started(events: &[Event]) -> bool {
    events.iter().any(|e| matches!(e, Event::RunStarted { .. }))
}

pub fn has_run_completed(events: &[Event]) -> bool {
    events.iter().any(|e| matches!(e, Event::RunCompleted { .. }))
}

pub fn has_run_failed(events: &[Event]) -> bool {
    events.iter().any(|e| matches!(e, Event::RunFailed { .. }))
}

pub fn count_run_started(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::RunStarted { .. }))
        .count()
}

pub fn step_started_order(events: &[Event]) -> Vec<StepId> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StepStarted { step, .. } => Some(*step),
            _ => None,
        })
        .collect()
}

pub fn completed_steps(events: &[Event]) -> Vec<StepId> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StepCompleted { step, .. } => Some(*step),
            _ => None,
        })
        .collect()
}

pub fn skipped_steps(events: &[Event]) -> Vec<StepId> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StepSkipped { step, .. } => Some(*step),
            _ => None,
        })
        .collect()
}

/// The RunStarted event must precede every step event, and a terminal
/// event must close the sequence.
pub fn assert_event_sequence(events: &[Event]) {
    let started_at = events
        .iter()
        .position(|e| matches!(e, Event::RunStarted { .. }))
        .expect("RunStarted should be present");
    let first_step = events
        .iter()
        .position(|e| matches!(e, Event::StepStarted { .. } | Event::StepSkipped { .. }));
    if let Some(first_step) = first_step {
        assert!(
            started_at < first_step,
            "RunStarted should precede step events"
        );
    }
    assert!(
        matches!(
            events.last(),
            Some(
                Event::RunCompleted { .. }
                    | Event::RunFailed { .. }
                    | Event::RunCancelled { .. }
                    | Event::ProgressUpdate { .. }
            )
        ),
        "run should end with a terminal event"
    );
}
