//! Offline mock collaborators.
//!
//! Used by tests and by the CLI's offline mode. Mocks are deterministic:
//! text responses derive from the step and prompt, media references are
//! counted `mock://` URLs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vf_protocol::{ProjectSnapshot, StepId, TimeRange, WordTiming};

use super::{
    AssemblerClient, AssemblyRequest, AudioArtifact, BatchRequest, BatchResponse, BatchStepOutput,
    ClipRequest, CollaboratorError, Collaborators, ImageClient, ImageRequest, SaveError,
    ScriptModelClient, SnapshotStore, SpeechClient, TextEvent, TextRequest, TextStream,
    TimestampClient, VideoClient,
};

fn canned_text(step: StepId, topic: &str) -> String {
    match step {
        StepId::SceneBreakdown => {
            // Four scenes over a sixteen second narration.
            let mut items = Vec::new();
            for i in 0..4u32 {
                items.push(format!(
                    r#"{{"scene": {}, "imagePrompt": "scene {} of {topic}", "videoPrompt": "camera move over scene {}", "startSecs": {}.0, "endSecs": {}.0}}"#,
                    i + 1,
                    i + 1,
                    i + 1,
                    i * 4,
                    (i + 1) * 4,
                ));
            }
            format!("[{}]", items.join(", "))
        }
        _ => format!("{} for \"{topic}\"", step.label()),
    }
}

/// Scripted script-model mock.
pub struct MockScriptModel {
    available: bool,
    fail_batch: Option<String>,
    fail_step: Mutex<Option<(StepId, String)>>,
    calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl MockScriptModel {
    pub fn success() -> Self {
        Self {
            available: true,
            fail_batch: None,
            fail_step: Mutex::new(None),
            calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_batch(message: impl Into<String>) -> Self {
        Self {
            fail_batch: Some(message.into()),
            ..Self::success()
        }
    }

    pub fn failing_step(step: StepId, message: impl Into<String>) -> Self {
        let mock = Self::success();
        *mock.fail_step.lock().unwrap_or_else(|e| e.into_inner()) = Some((step, message.into()));
        mock
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_call_count(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptModelClient for MockScriptModel {
    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn generate(&self, request: &TextRequest) -> Result<TextStream, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((step, message)) =
            self.fail_step.lock().unwrap_or_else(|e| e.into_inner()).clone()
        {
            if step == request.step {
                return Err(CollaboratorError::Api(message));
            }
        }

        // The prompt carries the topic after interpolation; the canned
        // text only needs a stable marker.
        let topic = request
            .prompt
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        let text = canned_text(request.step, &topic);
        let events = vec![
            Ok(TextEvent::Chunk(text)),
            Ok(TextEvent::Usage {
                prompt_tokens: 120,
                completion_tokens: 80,
            }),
            Ok(TextEvent::Completed),
        ];
        Ok(Box::pin(tokio_stream::iter(events)))
    }

    async fn generate_batch(
        &self,
        request: &BatchRequest,
    ) -> Result<BatchResponse, CollaboratorError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_batch {
            return Err(CollaboratorError::Api(message.clone()));
        }

        let outputs = request
            .prompts
            .iter()
            .map(|(step, _prompt)| BatchStepOutput {
                step: *step,
                text: canned_text(*step, &request.topic),
                prompt_tokens: 100,
                completion_tokens: 60,
            })
            .collect();
        Ok(BatchResponse { outputs })
    }
}

/// Speech synthesis mock.
pub struct MockSpeechClient {
    fail: bool,
}

impl MockSpeechClient {
    pub fn success() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl SpeechClient for MockSpeechClient {
    async fn synthesize(
        &self,
        _text: &str,
        voice_id: &str,
    ) -> Result<AudioArtifact, CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Api("voice synthesis failed".to_string()));
        }
        let voice = if voice_id.is_empty() { "default" } else { voice_id };
        Ok(AudioArtifact {
            path: format!("mock://narration-{voice}.mp3"),
            duration_secs: 16.0,
        })
    }
}

/// Timestamp extraction mock: eight evenly spaced words over 16s.
pub struct MockTimestampClient {
    fail: bool,
}

impl MockTimestampClient {
    pub fn success() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl TimestampClient for MockTimestampClient {
    async fn extract(&self, _audio_path: &str) -> Result<Vec<WordTiming>, CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Api("alignment failed".to_string()));
        }
        let words = ["every", "word", "of", "the", "narration", "has", "a", "time"];
        Ok(words
            .iter()
            .enumerate()
            .map(|(i, word)| WordTiming {
                word: (*word).to_string(),
                range: TimeRange {
                    start_secs: i as f64 * 2.0,
                    end_secs: (i + 1) as f64 * 2.0,
                },
            })
            .collect())
    }
}

/// Image generation mock with a call counter.
pub struct MockImageClient {
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockImageClient {
    pub fn success() -> Self {
        Self {
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageClient for MockImageClient {
    async fn generate(&self, _request: &ImageRequest) -> Result<String, CollaboratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Api("image generation failed".to_string()));
        }
        Ok(format!("mock://image-{n}.png"))
    }
}

/// Video clip generation mock with a switchable failure gate.
pub struct MockVideoClient {
    fail_message: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl MockVideoClient {
    pub fn success() -> Self {
        Self {
            fail_message: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn quota_exceeded() -> Self {
        Self {
            fail_message: Mutex::new(Some("quota exceeded".to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_message(&self, message: Option<String>) {
        *self.fail_message.lock().unwrap_or_else(|e| e.into_inner()) = message;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoClient for MockVideoClient {
    async fn generate(&self, _request: &ClipRequest) -> Result<String, CollaboratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(message) = &*self.fail_message.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(CollaboratorError::Api(message.clone()));
        }
        Ok(format!("mock://clip-{n}.mp4"))
    }
}

/// Assembly mock.
pub struct MockAssemblerClient {
    fail: bool,
}

impl MockAssemblerClient {
    pub fn success() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl AssemblerClient for MockAssemblerClient {
    async fn check_availability(&self) -> bool {
        true
    }

    async fn assemble(&self, request: &AssemblyRequest) -> Result<String, CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Api("assembly failed".to_string()));
        }
        Ok(format!("mock://final-{}-clips.mp4", request.clips.len()))
    }
}

/// In-memory snapshot store with controllable latency, failure and
/// server response, for exercising the auto-save queue.
pub struct MemorySnapshotStore {
    delay: Option<Duration>,
    fail: AtomicBool,
    respond_with: Mutex<Option<ProjectSnapshot>>,
    saves: Mutex<Vec<ProjectSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            delay: None,
            fail: AtomicBool::new(false),
            respond_with: Mutex::new(None),
            saves: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Respond to the next saves with a fixed server-side document
    /// instead of echoing the saved one.
    pub fn respond_with(&self, snapshot: ProjectSnapshot) {
        *self.respond_with.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot);
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn last_saved(&self) -> Option<ProjectSnapshot> {
        self.saves
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl Default for MemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &ProjectSnapshot) -> Result<ProjectSnapshot, SaveError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SaveError::Rejected("storage unavailable".to_string()));
        }
        self.saves
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(snapshot.clone());
        let response = self
            .respond_with
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        Ok(response.unwrap_or_else(|| snapshot.clone()))
    }
}

impl Collaborators {
    /// A full offline bundle.
    pub fn mock() -> Self {
        Self {
            script: Arc::new(MockScriptModel::success()),
            speech: Arc::new(MockSpeechClient::success()),
            timestamps: Arc::new(MockTimestampClient::success()),
            image: Arc::new(MockImageClient::success()),
            video: Arc::new(MockVideoClient::success()),
            assembler: Arc::new(MockAssemblerClient::success()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_mock_script_model_streams_text_and_usage() {
        let mock = MockScriptModel::success();
        let request = TextRequest {
            step: StepId::Hook,
            model: "test-model".to_string(),
            prompt: "Black holes".to_string(),
        };

        let stream = mock.generate(&request).await.expect("stream");
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Ok(TextEvent::Chunk(_))));
        assert!(matches!(events[1], Ok(TextEvent::Usage { .. })));
        assert_eq!(events[2], Ok(TextEvent::Completed));
    }

    #[tokio::test]
    async fn test_mock_scene_breakdown_is_valid_json() {
        let text = canned_text(StepId::SceneBreakdown, "Black holes");
        let parsed: serde_json::Value = serde_json::from_str(&text).expect("valid JSON");
        assert_eq!(parsed.as_array().map(|a| a.len()), Some(4));
    }

    #[tokio::test]
    async fn test_mock_batch_covers_requested_steps() {
        let mock = MockScriptModel::success();
        let request = BatchRequest {
            topic: "Black holes".to_string(),
            model: "test-model".to_string(),
            prompts: vec![
                (StepId::Hook, "p1".to_string()),
                (StepId::Outline, "p2".to_string()),
            ],
        };

        let response = mock.generate_batch(&request).await.expect("batch");
        assert_eq!(response.outputs.len(), 2);
        assert_eq!(response.outputs[0].step, StepId::Hook);
    }

    #[tokio::test]
    async fn test_memory_store_records_and_echoes() {
        let store = MemorySnapshotStore::new();
        let snapshot = ProjectSnapshot::new(vf_protocol::PipelineState::new());

        let accepted = store.save(&snapshot).await.expect("save");
        assert_eq!(store.save_count(), 1);
        assert_eq!(accepted.state.project_id, snapshot.state.project_id);
    }
}
