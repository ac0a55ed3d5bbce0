use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::Context;
use bytes::Bytes;
use tokio::sync::Semaphore;

use crate::{
    config::CompressionConfig,
    encoder::{EncodeError, ExternalEncoder},
    frame::RgbFrame,
    session::CompressionSession,
};

type SessionKey = (String, String);

/// Owns the compression sessions of every (session, device) pair.
///
/// Encodes for different pairs run concurrently up to
/// `max_concurrent_encodes`; encodes for the same pair run one at a time in
/// submission order.
pub struct CompressionSessionManager {
    config: CompressionConfig,
    encoder: ExternalEncoder,
    sessions: Mutex<HashMap<SessionKey, Arc<CompressionSession>>>,
    permits: Semaphore,
}

impl CompressionSessionManager {
    /// Verifies the encoder binary and prepares the output directory. A
    /// missing encoder is fatal: compression must not be enabled without it.
    pub async fn new(config: CompressionConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let encoder = ExternalEncoder::new(config.encoder_path.clone(), config.encode_timeout());
        let version = encoder.verify().await?;
        log::info!(
            "encoder available: {} ({}, timeout {:?})",
            version,
            encoder.path().display(),
            encoder.timeout()
        );

        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!(
                "failed to create output directory {}",
                config.output_dir.display()
            )
        })?;

        log::info!(
            "initialized compressor: {} fps, bitrate={}, preset={}, scale={:?}",
            config.fps,
            config.bitrate,
            config.preset,
            config.scale()
        );
        let permits = Semaphore::new(config.max_concurrent_encodes);
        Ok(Self {
            config,
            encoder,
            sessions: Mutex::new(HashMap::new()),
            permits,
        })
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn session_dir(&self, session_id: &str, device_id: &str) -> PathBuf {
        self.config
            .output_dir
            .join(format!("compression_{}_{}", session_id, device_id))
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Frames accumulated by the live session for this pair, if any.
    pub async fn frame_count(&self, session_id: &str, device_id: &str) -> Option<u64> {
        let key = (session_id.to_string(), device_id.to_string());
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()?;
        Some(session.frame_count().await)
    }

    fn session(&self, session_id: &str, device_id: &str) -> anyhow::Result<Arc<CompressionSession>> {
        let key = (session_id.to_string(), device_id.to_string());
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = sessions.get(&key) {
            return Ok(Arc::clone(session));
        }
        let dir = self.session_dir(session_id, device_id);
        let session = Arc::new(CompressionSession::create(session_id, device_id, dir)?);
        sessions.insert(key, Arc::clone(&session));
        Ok(session)
    }

    /// Compresses one batch of same-sized frames into an H.264 stream.
    pub async fn try_submit(
        &self,
        session_id: &str,
        device_id: &str,
        frames: Vec<RgbFrame>,
    ) -> Result<Bytes, EncodeError> {
        if frames.is_empty() {
            return Err(anyhow::anyhow!("no frames provided for compression").into());
        }
        let frame_count = frames.len();
        let raw_size: usize = frames.iter().map(|f| f.data.len()).sum();

        let mut frames = frames;
        let data = loop {
            let session = self.session(session_id, device_id)?;
            match session
                .compress(frames, &self.encoder, &self.config, &self.permits)
                .await
            {
                Ok(result) => break result?,
                // cleaned up while this batch waited; the next lookup creates a fresh session
                Err(returned) => frames = returned,
            }
        };

        log::info!(
            "compression successful: {} frames, {} bytes (ratio: {:.2}:1)",
            frame_count,
            data.len(),
            raw_size as f64 / data.len().max(1) as f64
        );
        Ok(data)
    }

    /// Like [`try_submit`](Self::try_submit), but failures only degrade to
    /// "no compressed output".
    pub async fn submit(
        &self,
        session_id: &str,
        device_id: &str,
        frames: Vec<RgbFrame>,
    ) -> Option<Bytes> {
        match self.try_submit(session_id, device_id, frames).await {
            Ok(data) => Some(data),
            Err(e) => {
                log::error!(
                    "frame compression failed for {}_{}: {:#}",
                    session_id,
                    device_id,
                    e
                );
                None
            }
        }
    }

    /// Removes the session of this pair once its in-flight encode is done. A
    /// batch submitted meanwhile runs after it, in a new session.
    pub async fn cleanup(&self, session_id: &str, device_id: &str) {
        let key = (session_id.to_string(), device_id.to_string());
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(session) = session {
            self.close_session(key, session).await;
            log::info!("cleaned up compression session: {}_{}", session_id, device_id);
        }
    }

    pub async fn cleanup_all(&self) {
        let sessions: Vec<(SessionKey, Arc<CompressionSession>)> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, session)| (key.clone(), Arc::clone(session)))
            .collect();
        let count = sessions.len();
        futures::future::join_all(
            sessions
                .into_iter()
                .map(|(key, session)| self.close_session(key, session)),
        )
        .await;
        log::info!("cleaned up all compression sessions ({})", count);
    }

    async fn close_session(&self, key: SessionKey, session: Arc<CompressionSession>) {
        session
            .cleanup(|| {
                let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
                if sessions.get(&key).is_some_and(|s| Arc::ptr_eq(s, &session)) {
                    sessions.remove(&key);
                }
            })
            .await;
    }
}

#[cfg(all(test, unix))]
#[path = "manager_test.rs"]
mod manager_test;
