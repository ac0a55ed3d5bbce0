//! Batch H.264 compression through an external FFmpeg process.
//!
//! Frames are written as numbered JPEGs into a per-(session, device) scratch
//! directory, the encoder binary turns them into one stream under a hard
//! timeout, and every intermediate file is removed afterwards.

pub mod config;
pub mod encoder;
pub mod frame;
pub mod manager;
pub mod scratch;
pub mod session;

#[cfg(all(test, unix))]
mod test_util;

pub use config::{CompressionConfig, Quality};
pub use encoder::{EncodeError, EncodeJob, ExternalEncoder};
pub use frame::{RgbFrame, RgbLayout};
pub use manager::CompressionSessionManager;
