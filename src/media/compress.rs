use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use ffmpeg_compress::{CompressionSessionManager, RgbFrame, RgbLayout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::media::convert::{ConvertedImage, PixelLayout};
use crate::media::path::EntityPath;
use crate::media::sink::{
    Archetype, ComponentColumn, RecordSink, StaticComponent, StaticRegistry, TimeColumn,
};

/// Batches waiting per device before new ones are dropped from compression.
pub const COMPRESSION_QUEUE_BOUND: usize = 4;

/// One color batch queued for encoding.
#[derive(Debug)]
pub struct CompressionJob {
    /// Image path of the batch; the segment goes to `{image_path}/video`.
    pub image_path: EntityPath,
    pub first_time: f64,
    pub frames: Vec<RgbFrame>,
}

/// Packed RGB/RGBA buffer as a compressor input frame.
pub fn rgb_frame(image: &ConvertedImage, width: u32, height: u32) -> Option<RgbFrame> {
    let layout = match image.layout {
        PixelLayout::Rgb => RgbLayout::Rgb,
        PixelLayout::Rgba => RgbLayout::Rgba,
        PixelLayout::I420 | PixelLayout::Nv12 => return None,
    };
    Some(RgbFrame::new(width, height, layout, image.data.clone()))
}

struct Worker {
    tx: mpsc::Sender<CompressionJob>,
    handle: JoinHandle<()>,
    dropped: u64,
}

/// Per-device compression workers of one session stream.
///
/// Each device gets a task draining a bounded queue, so ingestion never waits
/// on the encoder and batches of one device are encoded in arrival order.
pub struct CompressionWorkers {
    manager: Arc<CompressionSessionManager>,
    session_id: String,
    sink: Arc<dyn RecordSink>,
    statics: Arc<StaticRegistry>,
    workers: Mutex<HashMap<String, Worker>>,
}

impl CompressionWorkers {
    pub fn new(
        manager: Arc<CompressionSessionManager>,
        session_id: impl Into<String>,
        sink: Arc<dyn RecordSink>,
        statics: Arc<StaticRegistry>,
    ) -> Self {
        Self {
            manager,
            session_id: session_id.into(),
            sink,
            statics,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Queues `job` on the worker of `device_id`. Returns false when the job
    /// was dropped.
    pub fn enqueue(&self, device_id: &str, job: CompressionJob) -> bool {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if !workers.contains_key(device_id) {
            match self.spawn_worker(device_id) {
                Some(worker) => {
                    workers.insert(device_id.to_string(), worker);
                }
                None => return false,
            }
        }
        let Some(worker) = workers.get_mut(device_id) else {
            return false;
        };
        match worker.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                worker.dropped += 1;
                log::debug!(
                    "compression queue full for {}, dropped {} frames ({} batches so far)",
                    device_id,
                    job.frames.len(),
                    worker.dropped
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::warn!("compression worker for {} has stopped", device_id);
                workers.remove(device_id);
                false
            }
        }
    }

    fn spawn_worker(&self, device_id: &str) -> Option<Worker> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!("no async runtime, compression disabled for {}: {}", device_id, e);
                return None;
            }
        };
        let (tx, rx) = mpsc::channel(COMPRESSION_QUEUE_BOUND);
        let handle = runtime.spawn(worker_loop(
            self.manager.clone(),
            self.session_id.clone(),
            device_id.to_string(),
            self.sink.clone(),
            self.statics.clone(),
            rx,
        ));
        log::info!("compression worker started: {}_{}", self.session_id, device_id);
        Some(Worker {
            tx,
            handle,
            dropped: 0,
        })
    }

    /// Drains the device's queue, then removes its compression session.
    pub async fn close(&self, device_id: &str) {
        let worker = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(device_id);
        if let Some(worker) = worker {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                log::error!("compression worker for {} failed: {}", device_id, e);
            }
        }
        self.manager.cleanup(&self.session_id, device_id).await;
    }

    pub async fn close_all(&self) {
        let workers: Vec<(String, Worker)> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        let closing = workers.into_iter().map(|(device_id, worker)| async move {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                log::error!("compression worker for {} failed: {}", device_id, e);
            }
            self.manager.cleanup(&self.session_id, &device_id).await;
        });
        futures::future::join_all(closing).await;
    }
}

async fn worker_loop(
    manager: Arc<CompressionSessionManager>,
    session_id: String,
    device_id: String,
    sink: Arc<dyn RecordSink>,
    statics: Arc<StaticRegistry>,
    mut rx: mpsc::Receiver<CompressionJob>,
) {
    while let Some(job) = rx.recv().await {
        let Some(data) = manager.submit(&session_id, &device_id, job.frames).await else {
            continue;
        };
        if let Err(e) = write_segment(sink.as_ref(), &statics, &job.image_path, job.first_time, data) {
            log::error!("failed to write video segment for {}: {:#}", job.image_path, e);
        }
    }
    log::info!("compression worker finished: {}_{}", session_id, device_id);
}

fn write_segment(
    sink: &dyn RecordSink,
    statics: &StaticRegistry,
    image_path: &EntityPath,
    first_time: f64,
    data: Bytes,
) -> anyhow::Result<()> {
    let path = image_path.child("video");
    statics.declare_once(
        sink,
        &path,
        Archetype::VideoStream,
        vec![
            StaticComponent::Indicator(Archetype::VideoStream),
            StaticComponent::MediaType("video/mp4".to_string()),
        ],
    )?;
    sink.send_columns(
        &path,
        vec![TimeColumn::device(vec![first_time])],
        vec![ComponentColumn::VideoSample(vec![data])],
    )
}
