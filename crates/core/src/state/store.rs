//! The authoritative pipeline-state cell.
//!
//! One exclusively-owned, always-current snapshot that every component
//! reads through immediately before use. Updates replace the whole
//! snapshot under the lock, so readers always see a complete prior or
//! complete new state, never a partial write. Asynchronous code must
//! call [`StateStore::get`] after its await points rather than hold on
//! to a snapshot captured earlier.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use vf_protocol::PipelineState;

/// Shared handle to the single authoritative [`PipelineState`].
///
/// Cloning the store clones the handle, not the state; all clones see
/// the same snapshot cell. Subscribers receive every replacement through
/// a watch channel.
#[derive(Clone)]
pub struct StateStore {
    shared: Arc<Shared>,
}

struct Shared {
    state: RwLock<Arc<PipelineState>>,
    watch_tx: watch::Sender<Arc<PipelineState>>,
}

impl StateStore {
    pub fn new(initial: PipelineState) -> Self {
        let initial = Arc::new(initial);
        let (watch_tx, _) = watch::channel(Arc::clone(&initial));
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(initial),
                watch_tx,
            }),
        }
    }

    /// The current snapshot. Cheap; clones an `Arc`, not the state.
    pub fn get(&self) -> Arc<PipelineState> {
        match self.shared.state.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Apply a mutation as a whole-snapshot replacement and return the
    /// new snapshot.
    pub fn update<F>(&self, mutate: F) -> Arc<PipelineState>
    where
        F: FnOnce(&mut PipelineState),
    {
        let next = {
            let mut guard = match self.shared.state.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let mut next = (**guard).clone();
            mutate(&mut next);
            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            next
        };
        let _ = self.shared.watch_tx.send(Arc::clone(&next));
        next
    }

    /// Apply a fallible mutation. On error nothing is replaced and
    /// subscribers see no change.
    pub fn try_update<F, E>(&self, mutate: F) -> Result<Arc<PipelineState>, E>
    where
        F: FnOnce(&mut PipelineState) -> Result<(), E>,
    {
        let next = {
            let mut guard = match self.shared.state.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let mut next = (**guard).clone();
            mutate(&mut next)?;
            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            next
        };
        let _ = self.shared.watch_tx.send(Arc::clone(&next));
        Ok(next)
    }

    /// Replace the snapshot wholesale (e.g. after loading a project).
    pub fn replace(&self, state: PipelineState) -> Arc<PipelineState> {
        self.update(|current| *current = state)
    }

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PipelineState>> {
        self.shared.watch_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_protocol::StepId;

    #[test]
    fn test_get_returns_current_snapshot() {
        let store = StateStore::new(PipelineState::new());
        store.update(|s| s.set_topic("Black holes"));

        assert_eq!(store.get().topic, "Black holes");
    }

    #[test]
    fn test_old_snapshot_is_not_mutated() {
        let store = StateStore::new(PipelineState::new());
        let before = store.get();

        store.update(|s| s.set_topic("Black holes"));

        // The captured snapshot is immutable; only the live cell moved.
        assert!(before.topic.is_empty());
        assert_eq!(store.get().topic, "Black holes");
    }

    #[test]
    fn test_clones_share_one_cell() {
        let store = StateStore::new(PipelineState::new());
        let other = store.clone();

        other.update(|s| {
            s.step_mut(StepId::Hook).response = "hook text".to_string();
        });

        assert_eq!(store.get().step(StepId::Hook).response, "hook text");
    }

    #[tokio::test]
    async fn test_subscribers_observe_replacements() {
        let store = StateStore::new(PipelineState::new());
        let mut rx = store.subscribe();

        store.update(|s| s.set_topic("Volcanoes"));

        rx.changed().await.expect("watch channel open");
        assert_eq!(rx.borrow().topic, "Volcanoes");
    }
}
