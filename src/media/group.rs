use crate::media::types::{
    ColorFrame, DepthFrame, Frame, FrameBatch, FrameType, PixelFormat, TimestampedFrame,
};

/// Frames sharing one grouping key, in input order.
#[derive(Clone, Debug)]
pub struct HomogeneousBatch<K, F> {
    pub key: K,
    pub frames: Vec<F>,
}

/// Key of a color batch: (format, width, height).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColorKey {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// Key of a depth batch: (format, width, height, smoothing).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthKey {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub smoothed: bool,
}

/// Stable partition of `frames` by `key_fn`. Batches come out in order of
/// first key appearance.
pub fn group_frames<K, F>(frames: Vec<F>, key_fn: impl Fn(&F) -> K) -> Vec<HomogeneousBatch<K, F>>
where
    K: PartialEq,
{
    if frames.is_empty() {
        log::warn!("no frames to group");
        return Vec::new();
    }
    let mut batches: Vec<HomogeneousBatch<K, F>> = Vec::new();
    for frame in frames {
        let key = key_fn(&frame);
        match batches.iter_mut().find(|b| b.key == key) {
            Some(batch) => batch.frames.push(frame),
            None => batches.push(HomogeneousBatch {
                key,
                frames: vec![frame],
            }),
        }
    }
    batches
}

pub fn group_color_frames(frames: Vec<ColorFrame>) -> Vec<HomogeneousBatch<ColorKey, ColorFrame>> {
    group_frames(frames, |f| ColorKey {
        format: f.image.format,
        width: f.image.width,
        height: f.image.height,
    })
}

pub fn group_depth_frames(frames: Vec<DepthFrame>) -> Vec<HomogeneousBatch<DepthKey, DepthFrame>> {
    group_frames(frames, |f| DepthKey {
        format: f.image.format,
        width: f.image.width,
        height: f.image.height,
        smoothed: f.environment_depth_temporal_smoothing_enabled,
    })
}

/// Stable sort by device timestamp; equal timestamps keep input order.
pub fn sort_by_device_time<F: TimestampedFrame>(frames: &mut [F]) {
    frames.sort_by_key(|f| f.device_timestamp());
}

/// Splits a mixed frame stream into one batch per kind, in order of first
/// appearance.
pub fn split_by_kind(frames: Vec<Frame>) -> Vec<FrameBatch> {
    group_frames(frames, Frame::frame_type)
        .into_iter()
        .map(|group| {
            let mut batch = empty_batch(group.key);
            for frame in group.frames {
                push_frame(&mut batch, frame);
            }
            batch
        })
        .collect()
}

fn empty_batch(kind: FrameType) -> FrameBatch {
    match kind {
        FrameType::Color => FrameBatch::Color(Vec::new()),
        FrameType::Depth => FrameBatch::Depth(Vec::new()),
        FrameType::Transform => FrameBatch::Transform(Vec::new()),
        FrameType::Gyroscope => FrameBatch::Gyroscope(Vec::new()),
        FrameType::Audio => FrameBatch::Audio(Vec::new()),
        FrameType::PlaneDetection => FrameBatch::PlaneDetection(Vec::new()),
        FrameType::PointCloudDetection => FrameBatch::PointCloudDetection(Vec::new()),
        FrameType::MeshDetection => FrameBatch::MeshDetection(Vec::new()),
    }
}

fn push_frame(batch: &mut FrameBatch, frame: Frame) {
    match (batch, frame) {
        (FrameBatch::Color(v), Frame::Color(f)) => v.push(f),
        (FrameBatch::Depth(v), Frame::Depth(f)) => v.push(f),
        (FrameBatch::Transform(v), Frame::Transform(f)) => v.push(f),
        (FrameBatch::Gyroscope(v), Frame::Gyroscope(f)) => v.push(f),
        (FrameBatch::Audio(v), Frame::Audio(f)) => v.push(f),
        (FrameBatch::PlaneDetection(v), Frame::PlaneDetection(f)) => v.push(f),
        (FrameBatch::PointCloudDetection(v), Frame::PointCloudDetection(f)) => v.push(f),
        (FrameBatch::MeshDetection(v), Frame::MeshDetection(f)) => v.push(f),
        (batch, frame) => log::warn!(
            "dropping {} frame grouped into a {} batch",
            frame.frame_type(),
            batch.frame_type()
        ),
    }
}

#[cfg(test)]
#[path = "group_test.rs"]
mod group_test;
