//! Test fixtures: a full engine harness over the offline mocks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use vf_core::clients::mock::{
    MemorySnapshotStore, MockAssemblerClient, MockImageClient, MockScriptModel, MockSpeechClient,
    MockTimestampClient, MockVideoClient,
};
use vf_core::clients::{
    AudioArtifact, CollaboratorError, Collaborators, ScriptModelClient, SnapshotStore, SpeechClient,
};
use vf_core::config::AppConfig;
use vf_core::engine::RunAllEngine;
use vf_core::state::StateStore;
use vf_protocol::{Event, PipelineState};

/// A wired-up engine with handles to every mock it talks to.
pub struct Harness {
    pub engine: Arc<RunAllEngine>,
    pub events_rx: mpsc::Receiver<Event>,
    pub snapshots: Arc<MemorySnapshotStore>,
    pub script: Arc<MockScriptModel>,
    pub image: Arc<MockImageClient>,
    pub video: Arc<MockVideoClient>,
}

/// Build a harness with an event channel of the given capacity.
///
/// A capacity of 1 makes the test a lock-step consumer of the engine's
/// events, which some tests use to act at an exact point of the run.
pub fn harness_with_capacity(topic: &str, capacity: usize) -> Harness {
    let mut state = PipelineState::new();
    state.set_topic(topic);
    state.models.voice_id = "narrator-1".to_string();

    let script = Arc::new(MockScriptModel::success());
    let image = Arc::new(MockImageClient::success());
    let video = Arc::new(MockVideoClient::success());
    let snapshots = Arc::new(MemorySnapshotStore::new());

    let collaborators = Collaborators {
        script: Arc::clone(&script) as Arc<dyn ScriptModelClient>,
        speech: Arc::new(MockSpeechClient::success()),
        timestamps: Arc::new(MockTimestampClient::success()),
        image: Arc::clone(&image) as _,
        video: Arc::clone(&video) as _,
        assembler: Arc::new(MockAssemblerClient::success()),
    };

    let (events_tx, events_rx) = mpsc::channel(capacity);
    let engine = Arc::new(RunAllEngine::new(
        StateStore::new(state),
        Arc::new(collaborators),
        Arc::new(AppConfig::default()),
        Arc::clone(&snapshots) as Arc<dyn SnapshotStore>,
        events_tx,
    ));

    Harness {
        engine,
        events_rx,
        snapshots,
        script,
        image,
        video,
    }
}

pub fn harness(topic: &str) -> Harness {
    harness_with_capacity(topic, 256)
}

/// Speech client that takes a while, so a test can overlap calls with a
/// running pipeline.
pub struct SlowSpeechClient {
    delay: Duration,
}

impl SlowSpeechClient {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl SpeechClient for SlowSpeechClient {
    async fn synthesize(
        &self,
        _text: &str,
        _voice_id: &str,
    ) -> Result<AudioArtifact, CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        Ok(AudioArtifact {
            path: "mock://narration-slow.mp3".to_string(),
            duration_secs: 16.0,
        })
    }
}
