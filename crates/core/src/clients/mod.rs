//! External collaborator interfaces.
//!
//! Every generation backend the pipeline talks to is an opaque
//! collaborator behind one of these traits. Adapters depend only on the
//! traits; bundled implementations are the offline mocks in [`mock`],
//! the file-backed snapshot store in [`file_store`] and the ffmpeg
//! assembler in [`local_assembler`].

pub mod file_store;
pub mod local_assembler;
pub mod mock;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_stream::Stream;
use vf_protocol::{ProjectSnapshot, StepId, TimeRange, WordTiming};

pub use file_store::FileSnapshotStore;
pub use local_assembler::LocalAssembler;

/// Errors from collaborator calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("Collaborator not available: {0}")]
    NotAvailable(String),

    #[error("API call failed: {0}")]
    Api(String),

    #[error("Malformed response: {0}")]
    InvalidResponse(String),
}

/// Streamed output of a single text-generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEvent {
    /// A chunk of response text.
    Chunk(String),

    /// Token usage, reported once near the end of the stream.
    Usage {
        prompt_tokens: u64,
        completion_tokens: u64,
    },

    Completed,
}

pub type TextStream = Pin<Box<dyn Stream<Item = Result<TextEvent, CollaboratorError>> + Send>>;

/// Request for one text step.
#[derive(Debug, Clone)]
pub struct TextRequest {
    pub step: StepId,
    pub model: String,
    pub prompt: String,
}

/// Request for the aggregated batch call covering the script steps.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub topic: String,
    pub model: String,
    pub prompts: Vec<(StepId, String)>,
}

/// Output for one step of a batch call.
#[derive(Debug, Clone)]
pub struct BatchStepOutput {
    pub step: StepId,
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct BatchResponse {
    pub outputs: Vec<BatchStepOutput>,
}

/// The script model: single text steps and the aggregated batch call.
#[async_trait]
pub trait ScriptModelClient: Send + Sync {
    async fn check_availability(&self) -> bool;

    async fn generate(&self, request: &TextRequest) -> Result<TextStream, CollaboratorError>;

    /// One atomic call producing all requested batch steps, or failing
    /// as a whole.
    async fn generate_batch(
        &self,
        request: &BatchRequest,
    ) -> Result<BatchResponse, CollaboratorError>;
}

/// A synthesized narration artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub path: String,
    pub duration_secs: f64,
}

/// Narration audio synthesizer.
#[async_trait]
pub trait SpeechClient: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<AudioArtifact, CollaboratorError>;
}

/// Word-level timestamp extraction from narration audio.
#[async_trait]
pub trait TimestampClient: Send + Sync {
    async fn extract(&self, audio_path: &str) -> Result<Vec<WordTiming>, CollaboratorError>;
}

/// Request for one generated image.
#[derive(Debug, Clone, Default)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: String,
    pub reference_url: Option<String>,
    pub style: Option<String>,
}

/// Image generator; returns a reference to the generated image.
#[async_trait]
pub trait ImageClient: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<String, CollaboratorError>;
}

/// Request for one video clip.
#[derive(Debug, Clone)]
pub struct ClipRequest {
    pub start_image_url: String,
    pub end_image_url: Option<String>,
    pub prompt: String,
    pub model: String,
    pub frame_count: u32,
}

/// Video clip generator; returns a reference to the generated clip.
#[async_trait]
pub trait VideoClient: Send + Sync {
    async fn generate(&self, request: &ClipRequest) -> Result<String, CollaboratorError>;
}

/// One clip of the final assembly, with the narration slice it covers.
#[derive(Debug, Clone)]
pub struct ClipSegment {
    pub video_url: String,
    pub audio_range: TimeRange,
}

#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    pub clips: Vec<ClipSegment>,
    pub narration_audio_path: String,
}

/// Final video assembler.
#[async_trait]
pub trait AssemblerClient: Send + Sync {
    async fn check_availability(&self) -> bool;

    async fn assemble(&self, request: &AssemblyRequest) -> Result<String, CollaboratorError>;
}

/// Errors from snapshot persistence.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode snapshot: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Snapshot store rejected the save: {0}")]
    Rejected(String),
}

/// Project snapshot persistence.
///
/// A save returns the accepted (possibly normalized) document, which the
/// auto-save queue merges back into local state.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &ProjectSnapshot) -> Result<ProjectSnapshot, SaveError>;
}

/// The bundle of generation collaborators handed to step adapters.
#[derive(Clone)]
pub struct Collaborators {
    pub script: Arc<dyn ScriptModelClient>,
    pub speech: Arc<dyn SpeechClient>,
    pub timestamps: Arc<dyn TimestampClient>,
    pub image: Arc<dyn ImageClient>,
    pub video: Arc<dyn VideoClient>,
    pub assembler: Arc<dyn AssemblerClient>,
}
