//! Background coalesced persistence of the pipeline state.
//!
//! Two invariants: no two save operations ever overlap, and no
//! `queue_save` signal is dropped. A burst of N signals while one save
//! is in flight collapses into exactly one trailing save. Every save
//! reads the snapshot through the live state store at the moment it
//! starts, never from a value captured earlier, and every successful
//! response is merged back with the local-wins-on-progress rules.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use vf_protocol::{Event, ProjectSnapshot};

use crate::clients::{SaveError, SnapshotStore};
use crate::state::{merge, StateStore};

/// Handle to the auto-save queue. Clones share one queue.
#[derive(Clone)]
pub struct AutoSaveQueue {
    inner: Arc<Inner>,
}

struct Inner {
    store: StateStore,
    snapshots: Arc<dyn SnapshotStore>,
    events_tx: mpsc::Sender<Event>,
    pending: AtomicBool,
    processing: AtomicBool,
    advisory_error: Mutex<Option<String>>,
}

impl AutoSaveQueue {
    pub fn new(
        store: StateStore,
        snapshots: Arc<dyn SnapshotStore>,
        events_tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                snapshots,
                events_tx,
                pending: AtomicBool::new(false),
                processing: AtomicBool::new(false),
                advisory_error: Mutex::new(None),
            }),
        }
    }

    /// Request a save. Returns immediately; the save happens on a
    /// background task. Signals arriving while a save is in flight
    /// coalesce into one trailing save.
    pub fn queue_save(&self) {
        self.inner.pending.store(true, Ordering::SeqCst);
        if !self.inner.processing.swap(true, Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                Inner::run_loop(inner).await;
            });
        }
    }

    /// User-initiated save: surfaces its error to the caller instead of
    /// the sticky advisory. Takes the processing slot, so a manual save
    /// never overlaps a background one.
    pub async fn save_now(&self) -> Result<(), SaveError> {
        while self.inner.processing.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let result = async {
            let snapshot = ProjectSnapshot::new((*self.inner.store.get()).clone());
            let accepted = self.inner.snapshots.save(&snapshot).await?;
            self.inner.apply_accepted(accepted);
            Ok(())
        }
        .await;
        self.inner.processing.store(false, Ordering::SeqCst);
        // Signals that arrived while the slot was held still get their
        // trailing save.
        if self.inner.pending.load(Ordering::SeqCst) {
            self.queue_save();
        }
        result
    }

    /// The sticky advisory from the most recent failed background save,
    /// cleared automatically by the next success.
    pub fn advisory_error(&self) -> Option<String> {
        self.inner
            .advisory_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether a background save is queued or in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.pending.load(Ordering::SeqCst) || self.inner.processing.load(Ordering::SeqCst)
    }

    /// Wait until the queue has drained.
    pub async fn idle(&self) {
        while self.is_busy() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

impl Inner {
    async fn run_loop(inner: Arc<Inner>) {
        loop {
            if !inner.pending.swap(false, Ordering::SeqCst) {
                inner.processing.store(false, Ordering::SeqCst);
                // A signal may have slipped in after the swap above but
                // before processing was released; reclaim the loop if
                // nobody else has.
                if inner.pending.load(Ordering::SeqCst)
                    && !inner.processing.swap(true, Ordering::SeqCst)
                {
                    continue;
                }
                return;
            }
            inner.save_once().await;
        }
    }

    /// Exactly one save of the snapshot that is current right now.
    async fn save_once(&self) {
        let snapshot = ProjectSnapshot::new((*self.store.get()).clone());
        let project_id = snapshot.state.project_id;
        match self.snapshots.save(&snapshot).await {
            Ok(accepted) => {
                self.apply_accepted(accepted);
                let _ = self
                    .events_tx
                    .send(Event::SaveCompleted { project_id })
                    .await;
            }
            Err(e) => {
                *self
                    .advisory_error
                    .lock()
                    .unwrap_or_else(|err| err.into_inner()) = Some(e.to_string());
                let _ = self
                    .events_tx
                    .send(Event::SaveFailed {
                        project_id,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    fn apply_accepted(&self, accepted: ProjectSnapshot) {
        *self
            .advisory_error
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = None;
        self.store
            .update(|local| merge::merge_server_snapshot(local, &accepted.state));
    }
}
