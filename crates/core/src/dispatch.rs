//! Step-to-adapter routing.
//!
//! Pure routing: a step id maps to the aggregated batch adapter, one of
//! the named tail adapters, or the generic text adapter. The dispatcher
//! also owns the Running/Error bracketing around an adapter execution so
//! every adapter sees the same lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use vf_protocol::StepId;

use crate::adapters::{
    AdapterError, AssemblyAdapter, BatchAdapter, NarrationAudioAdapter, ReferenceImageAdapter,
    SceneImagesAdapter, SceneVideosAdapter, StepAdapter, StepContext, TextStepAdapter,
    ThumbnailAdapter, TimestampsAdapter,
};
use crate::state::transitions;

pub struct StepDispatcher {
    adapters: BTreeMap<StepId, Arc<dyn StepAdapter>>,
}

impl StepDispatcher {
    pub fn new() -> Self {
        let mut adapters: BTreeMap<StepId, Arc<dyn StepAdapter>> = BTreeMap::new();
        for id in StepId::ALL {
            let adapter: Arc<dyn StepAdapter> = match id {
                StepId::NarrationAudio => Arc::new(NarrationAudioAdapter),
                StepId::Timestamps => Arc::new(TimestampsAdapter),
                StepId::ReferenceImage => Arc::new(ReferenceImageAdapter),
                StepId::SceneImages => Arc::new(SceneImagesAdapter),
                StepId::SceneVideos => Arc::new(SceneVideosAdapter),
                StepId::AssembleVideo => Arc::new(AssemblyAdapter),
                StepId::Thumbnail => Arc::new(ThumbnailAdapter),
                // Batch-domain steps run through the generic text
                // adapter when dispatched individually; scene breakdown
                // and video metadata always do.
                _ => Arc::new(TextStepAdapter::new(id)),
            };
            adapters.insert(id, adapter);
        }
        Self { adapters }
    }

    pub fn adapter_for(&self, id: StepId) -> Arc<dyn StepAdapter> {
        Arc::clone(&self.adapters[&id])
    }

    /// Execute one step: Running, then the adapter, recording an Error
    /// status with the adapter's message if it fails.
    pub async fn run_step(&self, cx: &StepContext, id: StepId) -> Result<(), AdapterError> {
        cx.store.try_update(|s| transitions::begin_step(s, id))?;
        match self.adapter_for(id).execute(cx).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                let _ = cx
                    .store
                    .try_update(|s| transitions::fail_step(s, id, &message));
                Err(e)
            }
        }
    }

    /// Execute the aggregated batch call for the given batch steps.
    pub async fn run_batch(
        &self,
        cx: &StepContext,
        include: &[StepId],
    ) -> Result<(), AdapterError> {
        BatchAdapter::run(cx, include).await
    }
}

impl Default for StepDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
