//! The run-all engine.
//!
//! Sequences the full pipeline: preflight validation, the atomic batch
//! phase, then the tail steps one at a time with per-step validation and
//! cancellation checkpoints. Terminal states (Completed, Error,
//! Cancelled) are re-enterable through an explicit resume or restart.
//! The engine signals the auto-save queue but never awaits it, so
//! persistence lag never blocks step progression.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;
use vf_protocol::{
    Event, Progress, RunAllState, RunAllStatus, RunError, RunErrorCode, StepId, StepStatus,
};

use crate::adapters::StepContext;
use crate::autosave::AutoSaveQueue;
use crate::clients::{Collaborators, SnapshotStore};
use crate::config::AppConfig;
use crate::dispatch::StepDispatcher;
use crate::state::{transitions, StateStore};
use crate::validate::{self, Issue};

pub struct RunAllEngine {
    store: StateStore,
    dispatcher: StepDispatcher,
    autosave: AutoSaveQueue,
    collaborators: Arc<Collaborators>,
    config: Arc<AppConfig>,
    events_tx: mpsc::Sender<Event>,
    cancel_requested: Arc<AtomicBool>,
    run_guard: Arc<AtomicBool>,
}

impl RunAllEngine {
    pub fn new(
        store: StateStore,
        collaborators: Arc<Collaborators>,
        config: Arc<AppConfig>,
        snapshots: Arc<dyn SnapshotStore>,
        events_tx: mpsc::Sender<Event>,
    ) -> Self {
        let autosave = AutoSaveQueue::new(store.clone(), snapshots, events_tx.clone());
        Self {
            store,
            dispatcher: StepDispatcher::new(),
            autosave,
            collaborators,
            config,
            events_tx,
            cancel_requested: Arc::new(AtomicBool::new(false)),
            run_guard: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn autosave(&self) -> &AutoSaveQueue {
        &self.autosave
    }

    /// Derived progress of the current run.
    pub fn progress(&self) -> Progress {
        self.store.get().run_all.progress()
    }

    /// Start the full pipeline.
    ///
    /// Calling while a run is in progress is a no-op that reports
    /// Running. The returned status is the terminal outcome; failures
    /// are modeled outcomes, not `Err` (those are reserved for internal
    /// invariant violations).
    pub async fn start(&self, resume: bool) -> Result<RunAllStatus> {
        if self.run_guard.swap(true, Ordering::SeqCst) {
            // Reentrancy guard: leave the in-progress run untouched.
            return Ok(RunAllStatus::Running);
        }
        self.cancel_requested.store(false, Ordering::SeqCst);
        let outcome = self.run_inner(resume).await;
        // Persistence is signalled on every exit path.
        self.autosave.queue_save();
        self.run_guard.store(false, Ordering::SeqCst);
        outcome
    }

    /// Resume after a retryable failure or a cancellation: clears the
    /// failed step's Error status, then re-enters at the recorded
    /// failure index.
    pub async fn resume(&self) -> Result<RunAllStatus> {
        let state = self.store.get();
        match state.run_all.status {
            RunAllStatus::Error | RunAllStatus::Cancelled => {}
            other => anyhow::bail!("resume is only valid from Error or Cancelled (current: {other:?})"),
        }
        if let Some(error) = &state.run_all.error {
            if !error.retryable {
                anyhow::bail!("recorded error is not retryable: {}", error.message);
            }
        }
        if let Some(failed) = state.run_all.failed_step_id {
            if state.step(failed).status == StepStatus::Error {
                self.store
                    .try_update(|s| transitions::reset_step(s, failed))?;
            }
        }
        self.start(true).await
    }

    /// Cooperative cancellation: observed at the checkpoints around
    /// external calls; an in-flight call always runs to completion
    /// first.
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Return the run-all state machine to its initial Idle snapshot.
    pub fn reset(&self) -> Result<()> {
        if self.run_guard.load(Ordering::SeqCst) {
            anyhow::bail!("cannot reset while a run is in progress");
        }
        self.cancel_requested.store(false, Ordering::SeqCst);
        self.store.update(|s| s.run_all = RunAllState::idle());
        self.autosave.queue_save();
        Ok(())
    }

    /// Execute a single step outside a full run.
    pub async fn run_single_step(&self, id: StepId) -> Result<StepStatus> {
        if self.run_guard.swap(true, Ordering::SeqCst) {
            anyhow::bail!("a run is already in progress");
        }
        let result = self.single_step_inner(id).await;
        self.autosave.queue_save();
        self.run_guard.store(false, Ordering::SeqCst);
        result
    }

    fn context(&self) -> StepContext {
        StepContext {
            store: self.store.clone(),
            collaborators: Arc::clone(&self.collaborators),
            config: Arc::clone(&self.config),
        }
    }

    fn cancel_observed(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: Event) {
        let _ = self.events_tx.send(event).await;
    }

    async fn emit_progress(&self, project_id: Uuid) {
        let progress = self.store.get().run_all.progress();
        self.emit(Event::ProgressUpdate {
            project_id,
            progress,
        })
        .await;
    }

    async fn set_current(&self, project_id: Uuid, id: StepId) {
        self.store.update(|s| {
            s.run_all.current_step_id = Some(id);
            s.run_all.current_step_index = Some(id.index());
        });
        self.emit(Event::StepStarted {
            project_id,
            step: id,
            index: id.index(),
        })
        .await;
        self.emit_progress(project_id).await;
    }

    async fn record_skipped(&self, project_id: Uuid, id: StepId) {
        self.store.update(|s| {
            if !s.run_all.skipped_step_ids.contains(&id) {
                s.run_all.skipped_step_ids.push(id);
            }
        });
        self.emit(Event::StepSkipped {
            project_id,
            step: id,
        })
        .await;
    }

    async fn abort_cancelled(&self, project_id: Uuid) -> Result<RunAllStatus> {
        self.store.update(|s| {
            s.run_all.status = RunAllStatus::Cancelled;
            s.run_all.error = Some(RunError::new(
                RunErrorCode::Cancelled,
                "run cancelled by user",
                true,
            ));
        });
        self.emit(Event::RunCancelled { project_id }).await;
        self.emit_progress(project_id).await;
        Ok(RunAllStatus::Cancelled)
    }

    async fn abort_validation(&self, project_id: Uuid, issue: Issue) -> Result<RunAllStatus> {
        let mut error = RunError::new(RunErrorCode::Validation, issue.message.clone(), true);
        if let Some(hint) = &issue.hint {
            error = error.with_hint(hint.clone());
        }
        self.abort_failed(project_id, issue.step, error).await
    }

    async fn abort_step_failure(
        &self,
        project_id: Uuid,
        step: StepId,
        message: String,
    ) -> Result<RunAllStatus> {
        let error = RunError::new(RunErrorCode::StepExecution, message, true);
        self.abort_failed(project_id, step, error).await
    }

    async fn abort_failed(
        &self,
        project_id: Uuid,
        step: StepId,
        error: RunError,
    ) -> Result<RunAllStatus> {
        self.store.update(|s| {
            s.run_all.status = RunAllStatus::Error;
            s.run_all.failed_step_id = Some(step);
            s.run_all.error = Some(error.clone());
        });
        self.emit(Event::StepFailed {
            project_id,
            step,
            error: error.clone(),
        })
        .await;
        self.emit(Event::RunFailed {
            project_id,
            failed_step: Some(step),
            error,
        })
        .await;
        self.emit_progress(project_id).await;
        Ok(RunAllStatus::Error)
    }

    async fn run_inner(&self, resume: bool) -> Result<RunAllStatus> {
        let project_id = self.store.get().project_id;

        // Preflight: any blocking issue aborts before a single step is
        // dispatched.
        let issues = validate::validate_preflight(&self.store.get());
        if let Some(issue) = validate::first_blocking(&issues) {
            let issue = issue.clone();
            let mut error = RunError::new(RunErrorCode::Validation, issue.message.clone(), true);
            if let Some(hint) = &issue.hint {
                error = error.with_hint(hint.clone());
            }
            self.store.update(|s| {
                s.run_all.status = RunAllStatus::Error;
                s.run_all.failed_step_id = Some(issue.step);
                s.run_all.error = Some(error.clone());
            });
            self.emit(Event::RunFailed {
                project_id,
                failed_step: Some(issue.step),
                error,
            })
            .await;
            return Ok(RunAllStatus::Error);
        }

        // The resume index comes from the failure recorded before this
        // run resets the run-all snapshot.
        let prior_failed = self.store.get().run_all.failed_step_id;

        if !resume {
            self.store.update(transitions::clear_step_errors);
        }

        self.store.update(|s| {
            s.run_all = RunAllState {
                status: RunAllStatus::Running,
                current_step_id: Some(StepId::ALL[0]),
                current_step_index: Some(0),
                total_steps: StepId::COUNT,
                completed_step_ids: Vec::new(),
                skipped_step_ids: Vec::new(),
                failed_step_id: None,
                error: None,
                started_at: Some(Utc::now()),
                is_resume: resume,
            };
        });
        self.emit(Event::RunStarted {
            project_id,
            resume,
        })
        .await;
        self.emit_progress(project_id).await;

        let resume_index = if resume {
            prior_failed.map(|s| s.index()).unwrap_or(0)
        } else {
            0
        };
        let cx = self.context();

        // ---- Batch phase ----
        if resume_index <= StepId::LAST_BATCH_INDEX {
            let state = self.store.get();
            let mut include = Vec::new();
            for id in StepId::batch_steps() {
                if resume && state.step(*id).status == StepStatus::Success {
                    // Already-completed carryover, not a fresh completion.
                    self.record_skipped(project_id, *id).await;
                } else {
                    include.push(*id);
                }
            }
            if !include.is_empty() {
                if self.cancel_observed() {
                    return self.abort_cancelled(project_id).await;
                }
                let first_included = include[0];
                self.set_current(project_id, first_included).await;
                self.autosave.queue_save();

                let result = self.dispatcher.run_batch(&cx, &include).await;

                if self.cancel_observed() {
                    return self.abort_cancelled(project_id).await;
                }
                if let Err(e) = result {
                    let message = self
                        .store
                        .get()
                        .step(first_included)
                        .error
                        .unwrap_or_else(|| e.to_string());
                    return self
                        .abort_step_failure(project_id, first_included, message)
                        .await;
                }
                self.emit(Event::BatchCompleted {
                    project_id,
                    steps: include,
                })
                .await;
                self.autosave.queue_save();
            }
        } else {
            for id in StepId::batch_steps() {
                self.record_skipped(project_id, *id).await;
            }
        }

        // ---- Tail phase ----
        for id in StepId::tail_steps() {
            let id = *id;
            if id.index() < resume_index {
                self.record_skipped(project_id, id).await;
                continue;
            }
            if resume && self.store.get().step(id).status == StepStatus::Success {
                self.record_skipped(project_id, id).await;
                continue;
            }

            // (a) persist the intent before dispatching.
            self.set_current(project_id, id).await;
            self.autosave.queue_save();

            // (b) per-step validation against the current state.
            let issues = validate::validate_before_step(&self.store.get(), id);
            if let Some(issue) = validate::first_blocking(&issues) {
                return self.abort_validation(project_id, issue.clone()).await;
            }

            // (c) cancellation checkpoint before the external call.
            if self.cancel_observed() {
                return self.abort_cancelled(project_id).await;
            }

            // (d) dispatch and await the adapter.
            let result = self.dispatcher.run_step(&cx, id).await;

            // (e) cancellation checkpoint after the external call.
            if self.cancel_observed() {
                return self.abort_cancelled(project_id).await;
            }

            // (f) only the resulting status matters to the engine.
            let after = self.store.get().step(id);
            if after.status == StepStatus::Error || result.is_err() {
                let message = after
                    .error
                    .or_else(|| result.err().map(|e| e.to_string()))
                    .unwrap_or_else(|| "step failed".to_string());
                return self.abort_step_failure(project_id, id, message).await;
            }

            // (g) record the completion.
            self.store.update(|s| {
                if !s.run_all.completed_step_ids.contains(&id) {
                    s.run_all.completed_step_ids.push(id);
                }
            });
            self.emit(Event::StepCompleted {
                project_id,
                step: id,
                metrics: after.metrics,
            })
            .await;
            self.autosave.queue_save();
        }

        self.store.update(|s| {
            s.run_all.status = RunAllStatus::Completed;
            s.run_all.current_step_id = None;
            s.run_all.current_step_index = None;
        });
        self.emit(Event::RunCompleted { project_id }).await;
        self.emit_progress(project_id).await;
        Ok(RunAllStatus::Completed)
    }

    async fn single_step_inner(&self, id: StepId) -> Result<StepStatus> {
        let project_id = self.store.get().project_id;

        let issues = validate::validate_before_step(&self.store.get(), id);
        if let Some(issue) = validate::first_blocking(&issues) {
            anyhow::bail!("cannot run \"{}\": {}", id.label(), issue.message);
        }

        self.emit(Event::StepStarted {
            project_id,
            step: id,
            index: id.index(),
        })
        .await;

        let cx = self.context();
        let result = self.dispatcher.run_step(&cx, id).await;
        let after = self.store.get().step(id);
        match result {
            Ok(()) => {
                self.emit(Event::StepCompleted {
                    project_id,
                    step: id,
                    metrics: after.metrics.clone(),
                })
                .await;
            }
            Err(_) => {
                let error = RunError::new(
                    RunErrorCode::StepExecution,
                    after.error.clone().unwrap_or_else(|| "step failed".to_string()),
                    true,
                );
                self.emit(Event::StepFailed {
                    project_id,
                    step: id,
                    error,
                })
                .await;
            }
        }
        Ok(after.status)
    }
}
