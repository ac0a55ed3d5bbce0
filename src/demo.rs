//! Synthetic recording used by the binary to exercise every frame kind.

use bytes::Bytes;

use crate::media::types::{
    AudioFrame, ColorFrame, CpuImage, DepthFrame, DetectionState, Device, Dimensions, Frame,
    GyroscopeFrame, ImagePlane, Intrinsics, MeshDetectionFrame, MeshFilter, PixelFormat, Plane,
    PlaneDetectionFrame, PointCloud, PointCloudDetectionFrame, Quaternion, Session, Timestamp,
    Trackable, TrackableId, TrackingState, TransformFrame, Vector2, Vector3,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;
const FRAME_NANOS: i64 = 33_333_333;
const SAMPLES_PER_FRAME: usize = 160;
/// Frames [`frames`] emits per tick, one per kind.
pub const FRAMES_PER_TICK: usize = 8;

pub fn session() -> Session {
    let device = Device {
        model: "synthetic".to_string(),
        name: "demo".to_string(),
        uid: "0001".to_string(),
    };
    Session {
        id: "0".to_string(),
        name: "demo".to_string(),
        devices: vec![device],
    }
}

fn timestamp(index: u64) -> Timestamp {
    let nanos = index as i64 * FRAME_NANOS;
    Timestamp::new(nanos / 1_000_000_000, (nanos % 1_000_000_000) as i32)
}

fn gradient(index: u64) -> Bytes {
    let mut data = Vec::with_capacity((WIDTH * HEIGHT * 3) as usize);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            data.push((x * 4) as u8);
            data.push((y * 5) as u8);
            data.push((index * 8) as u8);
        }
    }
    Bytes::from(data)
}

fn pose(index: u64) -> Bytes {
    let (sin, cos) = (index as f32 * 0.05).sin_cos();
    let rows = [
        [cos, 0.0, sin, index as f32 * 0.01],
        [0.0, 1.0, 0.0, 0.0],
        [-sin, 0.0, cos, 0.0],
    ];
    Bytes::from(
        rows.iter()
            .flatten()
            .flat_map(|v| v.to_le_bytes())
            .collect::<Vec<u8>>(),
    )
}

fn trackable(id: u64) -> Trackable {
    Trackable {
        trackable_id: TrackableId {
            sub_id_1: 1,
            sub_id_2: id,
        },
        tracking_state: TrackingState::Tracking,
    }
}

fn detection_state(index: u64, count: u64) -> DetectionState {
    match index {
        0 => DetectionState::Added,
        i if i + 1 == count => DetectionState::Removed,
        _ => DetectionState::Updated,
    }
}

/// Every frame kind for `count` ticks of one device, interleaved the way a
/// device would deliver them.
pub fn frames(count: u64) -> Vec<Frame> {
    let intrinsics = Intrinsics {
        focal_length: Vector2 { x: 60.0, y: 60.0 },
        principal_point: Vector2 {
            x: WIDTH as f32 / 2.0,
            y: HEIGHT as f32 / 2.0,
        },
        resolution: Dimensions {
            x: WIDTH,
            y: HEIGHT,
        },
    };
    let mut out = Vec::new();
    for i in 0..count {
        let device_timestamp = timestamp(i);
        let state = detection_state(i, count);
        out.push(Frame::Color(ColorFrame {
            device_timestamp,
            image: CpuImage {
                format: PixelFormat::Rgb24,
                width: WIDTH,
                height: HEIGHT,
                timestamp: device_timestamp.as_secs_f64(),
                planes: vec![ImagePlane::new(gradient(i), WIDTH * 3, 3)],
            },
            intrinsics,
        }));
        out.push(Frame::Depth(DepthFrame {
            device_timestamp,
            image: CpuImage {
                format: PixelFormat::DepthFloat32,
                width: WIDTH / 4,
                height: HEIGHT / 4,
                timestamp: device_timestamp.as_secs_f64(),
                planes: vec![ImagePlane::new(
                    vec![0u8; (WIDTH / 4 * HEIGHT / 4 * 4) as usize],
                    WIDTH / 4 * 4,
                    4,
                )],
            },
            environment_depth_temporal_smoothing_enabled: i % 2 == 0,
        }));
        out.push(Frame::Transform(TransformFrame {
            device_timestamp,
            data: pose(i),
        }));
        out.push(Frame::Gyroscope(GyroscopeFrame {
            device_timestamp,
            attitude: Quaternion::default(),
            rotation_rate: Vector3::new(0.0, 0.05, 0.0),
            gravity: Vector3::new(0.0, -9.81, 0.0),
            acceleration: Vector3::new(0.0, 0.0, 0.1),
        }));
        out.push(Frame::Audio(AudioFrame {
            device_timestamp,
            data: (0..SAMPLES_PER_FRAME)
                .map(|s| (s as f32 * 0.1 + i as f32).sin() * 0.2)
                .collect(),
        }));
        out.push(Frame::PlaneDetection(PlaneDetectionFrame {
            device_timestamp,
            state,
            plane: Plane {
                trackable: trackable(1),
                center: Vector3::new(0.0, -1.5, 0.0),
                normal: Vector3::new(0.0, 1.0, 0.0),
                size: Vector2 { x: 2.0, y: 2.0 },
                boundary: vec![
                    Vector2 { x: -1.0, y: -1.0 },
                    Vector2 { x: 1.0, y: -1.0 },
                    Vector2 { x: 1.0, y: 1.0 },
                    Vector2 { x: -1.0, y: 1.0 },
                ],
            },
        }));
        out.push(Frame::PointCloudDetection(PointCloudDetectionFrame {
            device_timestamp,
            state,
            point_cloud: PointCloud {
                trackable: trackable(2),
                identifiers: (0..4).collect(),
                positions: (0..4)
                    .map(|p| Vector3::new(p as f32 * 0.1, 0.0, -1.0))
                    .collect(),
                confidence_values: vec![1.0; 4],
            },
        }));
        out.push(Frame::MeshDetection(MeshDetectionFrame {
            device_timestamp,
            state,
            mesh_filter: MeshFilter {
                instance_id: 7,
                sub_meshes: vec![Bytes::from_static(b"DRACO")],
            },
        }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::group::split_by_kind;

    #[test]
    fn test_frames_cover_every_kind() {
        let batches = split_by_kind(frames(3));
        assert_eq!(batches.len(), 8);
        assert!(batches.iter().all(|b| b.len() == 3));
        assert_eq!(frames(2).len(), 2 * FRAMES_PER_TICK);
    }

    #[test]
    fn test_timestamps_carry_nanos() {
        assert_eq!(timestamp(31), Timestamp::new(1, 33_333_323));
    }
}
