//! # Upload Workspace
//!
//! Owns the on-disk side of a job: where the uploaded bytes are written,
//! where ffmpeg writes its result, and removing both afterwards.
//!
//! Every job gets a fresh UUID prefix, so concurrent uploads of files with
//! the same name never share a path.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Extension used when neither the name nor the media type gives one.
const FALLBACK_EXTENSION: &str = "audio";

/// Directory that holds in-flight job files.
#[derive(Debug, Clone)]
pub struct UploadWorkspace {
    dir: PathBuf,
}

/// Paths belonging to one job.
#[derive(Debug, Clone)]
pub struct JobFiles {
    pub id: Uuid,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl UploadWorkspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it is missing.
    pub async fn ensure(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Reserve input/output paths for a new job. Nothing is created on disk.
    ///
    /// Both paths keep the original extension so ffmpeg picks the same
    /// container for the output as the input. Names without a usable
    /// extension take one from `content_type`.
    pub fn allocate(&self, original_name: &str, content_type: &str) -> JobFiles {
        let id = Uuid::new_v4();
        let ext = extension_of(original_name, content_type);
        JobFiles {
            id,
            input: self.dir.join(format!("{}-input.{}", id, ext)),
            output: self.dir.join(format!("{}-changed_bpm.{}", id, ext)),
        }
    }
}

impl JobFiles {
    /// Remove both files. Safe to call more than once.
    pub async fn cleanup(&self) {
        for path in [&self.input, &self.output] {
            match tokio::fs::remove_file(path).await {
                Ok(()) => debug!(job = %self.id, path = %path.display(), "Removed job file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(job = %self.id, path = %path.display(), error = %e, "Failed to remove job file"),
            }
        }
    }
}

/// Attachment name offered to the client, e.g. `changed_bpm_140.wav`.
pub fn download_name(original_name: &str, content_type: &str, target_bpm: f64) -> String {
    format!(
        "changed_bpm_{}.{}",
        target_bpm,
        extension_of(original_name, content_type)
    )
}

/// Lower-cased extension of the final path component, limited to ASCII
/// alphanumerics so client-supplied names cannot inject path separators.
fn extension_of(name: &str, content_type: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| media_extension(content_type).to_string())
}

/// Container extension ffmpeg can mux for an accepted upload media type.
fn media_extension(content_type: &str) -> &'static str {
    match content_type {
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        _ => FALLBACK_EXTENSION,
    }
}
