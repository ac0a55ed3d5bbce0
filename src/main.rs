use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ffmpeg_compress::CompressionSessionManager;
use sensor_stream::config::StreamConfig;
use sensor_stream::demo;
use sensor_stream::media::group::split_by_kind;
use sensor_stream::media::sink::JournalSink;
use sensor_stream::media::stream::SessionStream;
use tokio_util::sync::CancellationToken;

const TICKS: u64 = 90;
const TICKS_PER_BATCH: usize = 15;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("sensor_stream", log::LevelFilter::Debug)
        .filter_module("ffmpeg_compress", log::LevelFilter::Debug)
        .init();
}

async fn build_stream(config: &StreamConfig, sink: Arc<JournalSink>) -> SessionStream {
    let stream = SessionStream::new(demo::session(), sink);
    if !config.enable_compression {
        return stream;
    }
    match CompressionSessionManager::new(config.compression_config()).await {
        Ok(manager) => stream.with_compression(Arc::new(manager)),
        Err(e) => {
            log::error!("compression disabled: {:#}", e);
            stream
        }
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => StreamConfig::load(&path).unwrap_or_else(|e| {
            eprintln!("Error loading config: {:#}", e);
            std::process::exit(1);
        }),
        None => StreamConfig::default(),
    };
    let sink = Arc::new(JournalSink::create(&config.journal_path).unwrap_or_else(|e| {
        eprintln!("Error creating journal: {:#}", e);
        std::process::exit(1);
    }));
    let stream = build_stream(&config, sink.clone()).await;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let session = stream.session().clone();
    let frames = demo::frames(TICKS);
    for chunk in frames.chunks(TICKS_PER_BATCH * demo::FRAMES_PER_TICK) {
        for device in &session.devices {
            for batch in split_by_kind(chunk.to_vec()) {
                stream.save_frames(batch, device);
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("interrupted, stopping early");
                break;
            },
            _ = tokio::time::sleep(Duration::from_millis(500)) => {},
        }
    }

    stream.shutdown().await;
    if let Err(e) = sink.flush() {
        log::error!("failed to flush journal: {:#}", e);
    }
    log::info!("recording written to {}", config.journal_path.display());
}
