//! # External Transcoder
//!
//! Applies a `StageChain` to an audio file by running the `ffmpeg` binary
//! with the chain as a sequential `atempo` filter graph. Decoding and
//! encoding happen entirely inside ffmpeg; this module only builds the
//! command line and interprets the exit status.
//!
//! ## Command shape:
//! ```text
//! ffmpeg -hide_banner -loglevel error -y -i <input> -filter:a atempo=2.00,atempo=1.25 <output>
//! ```

use crate::tempo::StageChain;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info};

/// Ways a transcode can fail.
#[derive(Debug)]
pub enum TranscodeError {
    /// The binary could not be started (missing, not executable, ...)
    Spawn { binary: PathBuf, source: std::io::Error },

    /// ffmpeg ran but exited unsuccessfully
    Failed { status: Option<i32>, stderr: String },

    /// ffmpeg did not finish within the configured timeout and was killed
    TimedOut { after: Duration },
}

impl fmt::Display for TranscodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeError::Spawn { binary, source } => {
                write!(f, "failed to start {}: {}", binary.display(), source)
            }
            TranscodeError::Failed { status: Some(code), stderr } => {
                write!(f, "ffmpeg exited with status {}: {}", code, stderr)
            }
            TranscodeError::Failed { status: None, stderr } => {
                write!(f, "ffmpeg terminated by signal: {}", stderr)
            }
            TranscodeError::TimedOut { after } => {
                write!(f, "ffmpeg did not finish within {}s", after.as_secs())
            }
        }
    }
}

impl std::error::Error for TranscodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranscodeError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Runs ffmpeg with a fixed binary path and timeout.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Command-line arguments (excluding the binary) for one transcode.
    pub fn args(&self, input: &Path, output: &Path, chain: &StageChain) -> Vec<OsString> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-filter:a".into(),
            chain.to_filter_chain().into(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Transcode `input` into `output`, applying every stage in order.
    ///
    /// The child is killed if the timeout elapses; `output` may then be
    /// partially written and must be cleaned up by the caller.
    pub async fn run(
        &self,
        input: &Path,
        output: &Path,
        chain: &StageChain,
    ) -> Result<(), TranscodeError> {
        let started = Instant::now();
        let args = self.args(input, output, chain);
        debug!(binary = %self.binary.display(), ?args, "Spawning transcoder");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let output_result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| TranscodeError::Spawn {
                binary: self.binary.clone(),
                source,
            })?,
            Err(_) => {
                error!(timeout_secs = self.timeout.as_secs(), "Transcoder timed out");
                return Err(TranscodeError::TimedOut { after: self.timeout });
            }
        };

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr).trim().to_string();
            error!(status = ?output_result.status.code(), stderr = %stderr, "Transcoder failed");
            return Err(TranscodeError::Failed {
                status: output_result.status.code(),
                stderr,
            });
        }

        info!(
            stages = chain.len(),
            filter = %chain.to_filter_chain(),
            duration_ms = %started.elapsed().as_millis(),
            "Transcode completed"
        );
        Ok(())
    }
}

/// Stand-in ffmpeg binaries for tests: small shell scripts that receive the
/// real argument list.
#[cfg(all(test, unix))]
pub(crate) mod fake {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Copies the input (`$6`) to the output (`$9`).
    pub const COPY_INPUT: &str = "cp \"$6\" \"$9\"";

    /// Never finishes on its own.
    pub const HANG: &str = "exec sleep 30";

    /// Write an executable `/bin/sh` script named `ffmpeg` into `dir`.
    pub fn install(dir: &Path, body: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("ffmpeg");
        // fs::write closes the handle before exec, avoiding ETXTBSY.
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tempo::decompose;

    #[test]
    fn test_args_order() {
        let transcoder = FfmpegTranscoder::new("ffmpeg", Duration::from_secs(5));
        let chain = decompose(5.0).unwrap();
        let args = transcoder.args(Path::new("in.wav"), Path::new("out.wav"), &chain);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-i",
                "in.wav",
                "-filter:a",
                "atempo=2.00,atempo=2.00,atempo=1.25",
                "out.wav",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let transcoder = FfmpegTranscoder::new(
            "/nonexistent/bin/ffmpeg-that-is-not-here",
            Duration::from_secs(5),
        );
        let chain = decompose(1.0).unwrap();
        let err = transcoder
            .run(Path::new("in.wav"), Path::new("out.wav"), &chain)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Spawn { .. }));
        assert!(err.to_string().contains("ffmpeg-that-is-not-here"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        // `false` ignores its arguments and exits 1.
        let transcoder = FfmpegTranscoder::new("false", Duration::from_secs(5));
        let chain = decompose(1.0).unwrap();
        let err = transcoder
            .run(Path::new("in.wav"), Path::new("out.wav"), &chain)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Failed { status: Some(1), .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_transcoder_times_out() {
        let dir = std::env::temp_dir().join(format!("bpm-shifter-bin-{}", uuid::Uuid::new_v4()));
        let binary = fake::install(&dir, fake::HANG).unwrap();

        let transcoder = FfmpegTranscoder::new(&binary, Duration::from_secs(1));
        let chain = decompose(1.0).unwrap();
        let started = Instant::now();
        let err = transcoder
            .run(Path::new("in.wav"), Path::new("out.wav"), &chain)
            .await
            .unwrap_err();

        assert!(matches!(err, TranscodeError::TimedOut { after } if after == Duration::from_secs(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(err.to_string().contains("1s"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_writes_output() {
        let dir = std::env::temp_dir().join(format!("bpm-shifter-bin-{}", uuid::Uuid::new_v4()));
        let binary = fake::install(&dir, fake::COPY_INPUT).unwrap();
        let input = dir.join("in.wav");
        let output = dir.join("out.wav");
        std::fs::write(&input, b"RIFF").unwrap();

        let transcoder = FfmpegTranscoder::new(&binary, Duration::from_secs(5));
        transcoder.run(&input, &output, &decompose(2.5).unwrap()).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"RIFF");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
