use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;

/// Why a batch produced no compressed output.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("encoder timed out after {0:?}")]
    Timeout(Duration),
    #[error("encoder exited with {status}: {stderr}")]
    Exit { status: ExitStatus, stderr: String },
    #[error("encoder output file not created: {}", .0.display())]
    MissingOutput(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Arguments for one encoder run over a numbered image sequence.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    /// printf-style pattern, e.g. `batch_000001_%06d.jpg`. Numbering starts at 1.
    pub input_pattern: PathBuf,
    pub output: PathBuf,
    pub frame_count: usize,
    pub fps: u32,
    pub bitrate: String,
    pub preset: String,
    pub scale: Option<(u32, u32)>,
}

impl EncodeJob {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-nostdin".into(),
            "-loglevel".into(),
            "error".into(),
            "-framerate".into(),
            self.fps.to_string().into(),
            "-start_number".into(),
            "1".into(),
            "-i".into(),
            self.input_pattern.clone().into_os_string(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.preset.clone().into(),
            "-b:v".into(),
            self.bitrate.clone().into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ];
        if let Some((width, height)) = self.scale {
            args.push("-vf".into());
            args.push(format!("scale={}:{}", width, height).into());
        }
        args.push("-frames:v".into());
        args.push(self.frame_count.to_string().into());
        args.push(self.output.clone().into_os_string());
        args
    }
}

/// Handle on the external encoder binary.
#[derive(Debug, Clone)]
pub struct ExternalEncoder {
    path: PathBuf,
    timeout: Duration,
}

impl ExternalEncoder {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `<encoder> -version` and returns the first line of its banner.
    pub async fn verify(&self) -> anyhow::Result<String> {
        let output = tokio::process::Command::new(&self.path)
            .arg("-version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| {
                format!(
                    "encoder not found: {}. Install FFmpeg to use video compression",
                    self.path.display()
                )
            })?;
        if !output.status.success() {
            anyhow::bail!(
                "encoder {} -version exited with {}",
                self.path.display(),
                output.status
            );
        }
        let banner = String::from_utf8_lossy(&output.stdout);
        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }

    /// Runs one job under the hard timeout and reads back the encoded stream.
    /// The child is killed if the timeout fires.
    pub async fn run(&self, job: &EncodeJob) -> Result<Bytes, EncodeError> {
        let mut cmd = tokio::process::Command::new(&self.path);
        cmd.args(job.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!(
            "running encoder: {} frames -> {}",
            job.frame_count,
            job.output.display()
        );
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => return Err(EncodeError::Timeout(self.timeout)),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EncodeError::Exit {
                status: output.status,
                stderr: if stderr.is_empty() {
                    "unknown error".to_string()
                } else {
                    stderr
                },
            });
        }

        match tokio::fs::read(&job.output).await {
            Ok(data) if !data.is_empty() => Ok(Bytes::from(data)),
            Ok(_) => Err(EncodeError::MissingOutput(job.output.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EncodeError::MissingOutput(job.output.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(all(test, unix))]
#[path = "encoder_test.rs"]
mod encoder_test;
