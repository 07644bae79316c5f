//! File-backed snapshot store.
//!
//! Persists the project snapshot as pretty-printed JSON. The write goes
//! through a temporary file in the same directory followed by a rename,
//! so a crash mid-save never leaves a truncated document behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vf_protocol::ProjectSnapshot;

use super::{SaveError, SnapshotStore};

/// Snapshot store writing to a single JSON file.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a previously saved snapshot.
    pub fn load(&self) -> Result<ProjectSnapshot, SaveError> {
        let content = std::fs::read_to_string(&self.path)?;
        let mut snapshot: ProjectSnapshot = serde_json::from_str(&content)?;
        snapshot.state.ensure_all_steps();
        Ok(snapshot)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &ProjectSnapshot) -> Result<ProjectSnapshot, SaveError> {
        let json = serde_json::to_string_pretty(snapshot)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| SaveError::Io(e.error))?;

        // The accepted document is the parse of what actually landed on
        // disk; this is the normalization the merge sees.
        let accepted: ProjectSnapshot = serde_json::from_str(&json)?;
        Ok(accepted)
    }
}
