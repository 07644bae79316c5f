//! Local ffmpeg-based video assembler.
//!
//! Concatenates the generated scene clips and lays the narration audio
//! under them. Only the invocation plumbing lives here; clip generation
//! is a remote collaborator's job.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{AssemblerClient, AssemblyRequest, CollaboratorError};

/// Assembler shelling out to a local `ffmpeg` binary.
pub struct LocalAssembler {
    output_dir: PathBuf,
}

impl LocalAssembler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn concat_list(request: &AssemblyRequest) -> String {
        let mut list = String::new();
        for clip in &request.clips {
            list.push_str(&format!("file '{}'\n", clip.video_url));
        }
        list
    }
}

#[async_trait]
impl AssemblerClient for LocalAssembler {
    async fn check_availability(&self) -> bool {
        which::which("ffmpeg").is_ok()
    }

    async fn assemble(&self, request: &AssemblyRequest) -> Result<String, CollaboratorError> {
        if request.clips.is_empty() {
            return Err(CollaboratorError::InvalidResponse(
                "no clips to assemble".to_string(),
            ));
        }
        if !self.check_availability().await {
            return Err(CollaboratorError::NotAvailable(
                "ffmpeg not found on PATH".to_string(),
            ));
        }

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| CollaboratorError::Api(format!("cannot create output dir: {e}")))?;

        let list_path = self.output_dir.join("clips.txt");
        std::fs::write(&list_path, Self::concat_list(request))
            .map_err(|e| CollaboratorError::Api(format!("cannot write concat list: {e}")))?;

        let output_path = self.output_dir.join("final.mp4");
        let status = Command::new("ffmpeg")
            .arg("-y")
            .args(["-f", "concat", "-safe", "0"])
            .arg("-i")
            .arg(&list_path)
            .arg("-i")
            .arg(&request.narration_audio_path)
            .args(["-map", "0:v", "-map", "1:a", "-c:v", "copy", "-shortest"])
            .arg(&output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| CollaboratorError::Api(format!("failed to spawn ffmpeg: {e}")))?;

        if !status.success() {
            return Err(CollaboratorError::Api(format!(
                "ffmpeg exited with {status}"
            )));
        }

        Ok(output_path.to_string_lossy().to_string())
    }
}
