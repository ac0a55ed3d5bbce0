use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use tokio::sync::{Mutex, Semaphore};

use crate::{
    config::CompressionConfig,
    encoder::{EncodeError, EncodeJob, ExternalEncoder},
    frame::{RgbFrame, batch_dimensions},
    scratch::{self, ScratchFiles},
};

#[derive(Debug, Default)]
struct SessionState {
    frame_count: u64,
    batch_seq: u64,
    temp_files: Vec<PathBuf>,
    // set by cleanup; a closed session accepts no more batches
    closed: bool,
}

/// Encoding state for one (session, device) pair.
///
/// The state lock is held for the whole encode, so a second batch for the
/// same pair waits until the first one has finished.
#[derive(Debug)]
pub struct CompressionSession {
    session_id: String,
    device_id: String,
    dir: PathBuf,
    state: Mutex<SessionState>,
}

impl CompressionSession {
    pub(crate) fn create(session_id: &str, device_id: &str, dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create scratch directory {}", dir.display()))?;
        log::debug!("created compression session: {}", dir.display());
        Ok(Self {
            session_id: session_id.to_string(),
            device_id: device_id.to_string(),
            dir,
            state: Mutex::new(SessionState::default()),
        })
    }

    /// Frames submitted to this session so far.
    pub async fn frame_count(&self) -> u64 {
        self.state.lock().await.frame_count
    }

    /// Encodes one batch. Returns the frames back when the session was
    /// cleaned up before the batch got its turn.
    pub(crate) async fn compress(
        &self,
        frames: Vec<RgbFrame>,
        encoder: &ExternalEncoder,
        config: &CompressionConfig,
        permits: &Semaphore,
    ) -> Result<Result<Bytes, EncodeError>, Vec<RgbFrame>> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(frames);
        }
        state.batch_seq += 1;
        let prefix = format!("batch_{:06}", state.batch_seq);

        let result = self
            .encode_batch(&mut state, &prefix, frames, encoder, config, permits)
            .await;
        // scratch guards have dropped by now; keep only what survived removal
        state.temp_files.retain(|p| p.exists());
        Ok(result)
    }

    async fn encode_batch(
        &self,
        state: &mut SessionState,
        prefix: &str,
        frames: Vec<RgbFrame>,
        encoder: &ExternalEncoder,
        config: &CompressionConfig,
        permits: &Semaphore,
    ) -> Result<Bytes, EncodeError> {
        batch_dimensions(&frames)?;
        let frame_count = frames.len();
        state.frame_count += frame_count as u64;

        let _permit = permits
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("encoder pool closed"))?;

        let output = self.dir.join(format!("{}.mp4", prefix));
        let mut output_guard = ScratchFiles::new();
        output_guard.push(output.clone());
        state.temp_files.push(output.clone());

        let dir = self.dir.clone();
        let image_prefix = prefix.to_string();
        let quality = config.jpeg_quality;
        let images = tokio::task::spawn_blocking(move || {
            write_frames(&dir, &image_prefix, &frames, quality)
        })
        .await
        .map_err(|e| anyhow::anyhow!("frame writer task failed: {}", e))??;
        state.temp_files.extend(images.paths().iter().cloned());

        let job = EncodeJob {
            input_pattern: self.dir.join(format!("{}_%06d.jpg", prefix)),
            output,
            frame_count,
            fps: config.fps,
            bitrate: config.bitrate.clone(),
            preset: config.preset.clone(),
            scale: config.scale(),
        };
        encoder.run(&job).await
    }

    /// Waits for an in-flight encode, removes the files this session created
    /// and closes it. `detach` runs before the session lock is released, so a
    /// batch queued behind the cleanup only sees the closed session.
    pub(crate) async fn cleanup(&self, detach: impl FnOnce()) {
        let mut state = self.state.lock().await;
        for path in state.temp_files.drain(..) {
            scratch::remove_file_best_effort(&path);
        }
        scratch::remove_dir_if_empty(&self.dir);
        state.closed = true;
        detach();
        log::debug!(
            "closed compression session {}_{}: {}",
            self.session_id,
            self.device_id,
            self.dir.display()
        );
    }
}

/// Writes `frames` as `{prefix}_000001.jpg`, `{prefix}_000002.jpg`, ...
fn write_frames(
    dir: &Path,
    prefix: &str,
    frames: &[RgbFrame],
    quality: u8,
) -> anyhow::Result<ScratchFiles> {
    let mut files = ScratchFiles::new();
    for (i, frame) in frames.iter().enumerate() {
        let path = dir.join(format!("{}_{:06}.jpg", prefix, i + 1));
        files.push(path.clone());
        frame
            .write_jpeg(&path, quality)
            .with_context(|| format!("failed to save frame {}", i))?;
    }
    Ok(files)
}
