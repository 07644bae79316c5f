//! Conflict-resolving merge of a server snapshot into local state.
//!
//! Applied to the response of every successful save. The rules are
//! local-wins-on-progress: a save response must never roll back work the
//! session produced while the save was in flight. Token/cost totals are
//! recomputed through the accumulator rules, never taken verbatim from
//! the (possibly stale) server snapshot.

use vf_protocol::{PipelineState, SceneAsset, StepId};

use crate::metrics;

/// Merge `server` (the snapshot store's accepted document) into `local`.
pub fn merge_server_snapshot(local: &mut PipelineState, server: &PipelineState) {
    // Step map: per step, keep the local record whenever it is further
    // along or carries content the server lacks. A locally Running step
    // always wins: the save response is by construction older than the
    // execution that is in flight right now.
    for id in StepId::ALL {
        let local_step = local.step(id);
        let server_step = server.step(id);

        let local_further =
            server_step.status.progress_rank() < local_step.status.progress_rank();
        let local_live = local_step.status == vf_protocol::StepStatus::Running;
        let local_has_response =
            !local_step.response.trim().is_empty() && server_step.response.trim().is_empty();
        let local_has_metrics = local_step.metrics.is_some() && server_step.metrics.is_none();

        if !(local_further || local_live || local_has_response || local_has_metrics) {
            local.steps.insert(id, server_step);
        }
    }

    // Scene assets: match by scene number; keep non-empty local media
    // fields over empty server ones, otherwise prefer the server's
    // values. Local scenes the server does not know yet are kept
    // verbatim.
    let local_scenes = std::mem::take(&mut local.scenes);
    let mut merged: Vec<SceneAsset> = Vec::with_capacity(server.scenes.len());
    for server_scene in &server.scenes {
        let scene = match local_scenes
            .iter()
            .find(|s| s.scene_number == server_scene.scene_number)
        {
            Some(local_scene) => merge_scene(local_scene, server_scene),
            None => server_scene.clone(),
        };
        merged.push(scene);
    }
    for local_scene in local_scenes {
        if !merged
            .iter()
            .any(|s| s.scene_number == local_scene.scene_number)
        {
            merged.push(local_scene);
        }
    }
    merged.sort_by_key(|s| s.scene_number);
    local.scenes = merged;

    // Scalars produced locally but possibly not round-tripped yet.
    merge_scalar(&mut local.reference_image_url, &server.reference_image_url);
    merge_scalar(&mut local.narration_audio_path, &server.narration_audio_path);
    merge_scalar(&mut local.thumbnail_path, &server.thumbnail_path);
    merge_scalar(&mut local.script_path, &server.script_path);
    merge_scalar(&mut local.final_video_path, &server.final_video_path);

    if local.word_timings.is_empty() && !server.word_timings.is_empty() {
        local.word_timings = server.word_timings.clone();
    }

    // Topic, model selections, the run-all snapshot and the running
    // accumulators stay local: the session owns them. Current totals are
    // recomputed from the merged step map.
    local.ensure_all_steps();
    local.current_totals = metrics::step_totals(&local.steps);
}

fn merge_scene(local: &SceneAsset, server: &SceneAsset) -> SceneAsset {
    let mut merged = server.clone();
    keep_local_when_server_empty(&mut merged.image_url, &local.image_url);
    keep_local_when_server_empty(&mut merged.last_frame_url, &local.last_frame_url);
    keep_local_when_server_empty(&mut merged.video_url, &local.video_url);
    // A scene with locally generated media must not regress to Pending.
    if !local.video_url.is_empty() && merged.video_url == local.video_url {
        merged.status = local.status;
    } else if !local.image_url.is_empty() && merged.image_url == local.image_url {
        merged.status = local.status;
    }
    merged
}

fn keep_local_when_server_empty(target: &mut String, local: &str) {
    if target.is_empty() && !local.is_empty() {
        *target = local.to_string();
    }
}

fn merge_scalar(local: &mut String, server: &str) {
    if !server.is_empty() || local.is_empty() {
        *local = server.to_string();
    }
}
