use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use bytes::Bytes;

// ============================================================================
// Session Handles
// ============================================================================

/// Recording session handle. Only used to derive entity path prefixes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub devices: Vec<Device>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Device {
    pub model: String,
    pub name: String,
    pub uid: String,
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{} {} ({})", self.model, self.name, self.uid)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.nanos as f64 / 1e9
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.seconds, self.nanos).cmp(&(other.seconds, other.nanos))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// Geometry
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quaternion {
    pub fn to_xyzw(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

// ============================================================================
// Images
// ============================================================================

/// Pixel encoding of a captured image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb24,
    Rgba32,
    Bgra32,
    Argb32,
    /// Android YUV_420_888: three planes with independent strides.
    AndroidYuv420,
    /// iOS kCVPixelFormatType_420YpCbCr8BiPlanarFullRange (NV12).
    IosYpCbCr420BiPlanarFullRange,
    DepthFloat32,
    DepthUint16,
    Unknown,
}

impl PixelFormat {
    /// Packed RGB-family formats the compressor accepts.
    pub fn is_rgb_family(self) -> bool {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Rgba32 | PixelFormat::Bgra32 | PixelFormat::Argb32 => {
                true
            }
            PixelFormat::AndroidYuv420
            | PixelFormat::IosYpCbCr420BiPlanarFullRange
            | PixelFormat::DepthFloat32
            | PixelFormat::DepthUint16
            | PixelFormat::Unknown => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Rgba32 => "rgba32",
            PixelFormat::Bgra32 => "bgra32",
            PixelFormat::Argb32 => "argb32",
            PixelFormat::AndroidYuv420 => "android_yuv_420_888",
            PixelFormat::IosYpCbCr420BiPlanarFullRange => "ios_ycbcr420_biplanar_full_range",
            PixelFormat::DepthFloat32 => "depth_float32",
            PixelFormat::DepthUint16 => "depth_uint16",
            PixelFormat::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImagePlane {
    pub data: Bytes,
    pub row_stride: u32,
    pub pixel_stride: u32,
}

impl ImagePlane {
    pub fn new(data: impl Into<Bytes>, row_stride: u32, pixel_stride: u32) -> Self {
        Self {
            data: data.into(),
            row_stride,
            pixel_stride,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CpuImage {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    // sensor capture time, seconds
    pub timestamp: f64,
    pub planes: Vec<ImagePlane>,
}

impl Display for CpuImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "CpuImage {{ {} {}x{}, planes: {} }}",
            self.format.name(),
            self.width,
            self.height,
            self.planes.len()
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub x: u32,
    pub y: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Intrinsics {
    pub focal_length: Vector2,
    pub principal_point: Vector2,
    pub resolution: Dimensions,
}

impl Intrinsics {
    /// Row-major pinhole projection `[[fx,0,cx],[0,fy,cy],[0,0,1]]`.
    pub fn projection(&self) -> [[f32; 3]; 3] {
        [
            [self.focal_length.x, 0.0, self.principal_point.x],
            [0.0, self.focal_length.y, self.principal_point.y],
            [0.0, 0.0, 1.0],
        ]
    }
}

// ============================================================================
// Frames
// ============================================================================

#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub device_timestamp: Timestamp,
    pub image: CpuImage,
    pub intrinsics: Intrinsics,
}

#[derive(Clone, Debug)]
pub struct DepthFrame {
    pub device_timestamp: Timestamp,
    pub image: CpuImage,
    pub environment_depth_temporal_smoothing_enabled: bool,
}

/// Packed row-major 3x4 f32 pose, 48 little-endian bytes.
#[derive(Clone, Debug)]
pub struct TransformFrame {
    pub device_timestamp: Timestamp,
    pub data: Bytes,
}

#[derive(Clone, Debug)]
pub struct GyroscopeFrame {
    pub device_timestamp: Timestamp,
    pub attitude: Quaternion,
    pub rotation_rate: Vector3,
    pub gravity: Vector3,
    pub acceleration: Vector3,
}

#[derive(Clone, Debug)]
pub struct AudioFrame {
    pub device_timestamp: Timestamp,
    pub data: Vec<f32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TrackableId {
    pub sub_id_1: u64,
    pub sub_id_2: u64,
}

impl Display for TrackableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}_{}", self.sub_id_1, self.sub_id_2)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TrackingState {
    #[default]
    Unspecified,
    None,
    Limited,
    Tracking,
}

impl TrackingState {
    pub fn name(self) -> &'static str {
        match self {
            TrackingState::Unspecified => "TRACKING_STATE_UNSPECIFIED",
            TrackingState::None => "TRACKING_STATE_NONE",
            TrackingState::Limited => "TRACKING_STATE_LIMITED",
            TrackingState::Tracking => "TRACKING_STATE_TRACKING",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Trackable {
    pub trackable_id: TrackableId,
    pub tracking_state: TrackingState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DetectionState {
    #[default]
    Unspecified,
    Added,
    Updated,
    Removed,
}

#[derive(Clone, Debug, Default)]
pub struct Plane {
    pub trackable: Trackable,
    pub center: Vector3,
    pub normal: Vector3,
    pub size: Vector2,
    pub boundary: Vec<Vector2>,
}

#[derive(Clone, Debug)]
pub struct PlaneDetectionFrame {
    pub device_timestamp: Timestamp,
    pub state: DetectionState,
    pub plane: Plane,
}

#[derive(Clone, Debug, Default)]
pub struct PointCloud {
    pub trackable: Trackable,
    pub identifiers: Vec<u64>,
    pub positions: Vec<Vector3>,
    pub confidence_values: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct PointCloudDetectionFrame {
    pub device_timestamp: Timestamp,
    pub state: DetectionState,
    pub point_cloud: PointCloud,
}

/// One tracked mesh; every sub-mesh is a Draco-compressed buffer.
#[derive(Clone, Debug, Default)]
pub struct MeshFilter {
    pub instance_id: i32,
    pub sub_meshes: Vec<Bytes>,
}

#[derive(Clone, Debug)]
pub struct MeshDetectionFrame {
    pub device_timestamp: Timestamp,
    pub state: DetectionState,
    pub mesh_filter: MeshFilter,
}

// ============================================================================
// Batches
// ============================================================================

#[derive(Clone, Debug)]
pub enum Frame {
    Color(ColorFrame),
    Depth(DepthFrame),
    Transform(TransformFrame),
    Gyroscope(GyroscopeFrame),
    Audio(AudioFrame),
    PlaneDetection(PlaneDetectionFrame),
    PointCloudDetection(PointCloudDetectionFrame),
    MeshDetection(MeshDetectionFrame),
}

impl Frame {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Color(_) => FrameType::Color,
            Frame::Depth(_) => FrameType::Depth,
            Frame::Transform(_) => FrameType::Transform,
            Frame::Gyroscope(_) => FrameType::Gyroscope,
            Frame::Audio(_) => FrameType::Audio,
            Frame::PlaneDetection(_) => FrameType::PlaneDetection,
            Frame::PointCloudDetection(_) => FrameType::PointCloudDetection,
            Frame::MeshDetection(_) => FrameType::MeshDetection,
        }
    }
}

/// Frames of one kind delivered for one device.
#[derive(Clone, Debug)]
pub enum FrameBatch {
    Color(Vec<ColorFrame>),
    Depth(Vec<DepthFrame>),
    Transform(Vec<TransformFrame>),
    Gyroscope(Vec<GyroscopeFrame>),
    Audio(Vec<AudioFrame>),
    PlaneDetection(Vec<PlaneDetectionFrame>),
    PointCloudDetection(Vec<PointCloudDetectionFrame>),
    MeshDetection(Vec<MeshDetectionFrame>),
}

impl FrameBatch {
    pub fn frame_type(&self) -> FrameType {
        match self {
            FrameBatch::Color(_) => FrameType::Color,
            FrameBatch::Depth(_) => FrameType::Depth,
            FrameBatch::Transform(_) => FrameType::Transform,
            FrameBatch::Gyroscope(_) => FrameType::Gyroscope,
            FrameBatch::Audio(_) => FrameType::Audio,
            FrameBatch::PlaneDetection(_) => FrameType::PlaneDetection,
            FrameBatch::PointCloudDetection(_) => FrameType::PointCloudDetection,
            FrameBatch::MeshDetection(_) => FrameType::MeshDetection,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FrameBatch::Color(v) => v.len(),
            FrameBatch::Depth(v) => v.len(),
            FrameBatch::Transform(v) => v.len(),
            FrameBatch::Gyroscope(v) => v.len(),
            FrameBatch::Audio(v) => v.len(),
            FrameBatch::PlaneDetection(v) => v.len(),
            FrameBatch::PointCloudDetection(v) => v.len(),
            FrameBatch::MeshDetection(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    Color,
    Depth,
    Transform,
    Gyroscope,
    Audio,
    PlaneDetection,
    PointCloudDetection,
    MeshDetection,
}

impl FrameType {
    /// Entity path segment for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            FrameType::Color => "color_frame",
            FrameType::Depth => "depth_frame",
            FrameType::Transform => "transform_frame",
            FrameType::Gyroscope => "gyroscope_frame",
            FrameType::Audio => "audio_frame",
            FrameType::PlaneDetection => "plane_detection_frame",
            FrameType::PointCloudDetection => "point_cloud_detection_frame",
            FrameType::MeshDetection => "mesh_detection_frame",
        }
    }
}

impl Display for FrameType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.write_str(self.as_str())
    }
}

pub trait TimestampedFrame {
    fn device_timestamp(&self) -> Timestamp;
}

macro_rules! timestamped {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TimestampedFrame for $ty {
                fn device_timestamp(&self) -> Timestamp {
                    self.device_timestamp
                }
            }
        )+
    };
}

timestamped!(
    ColorFrame,
    DepthFrame,
    TransformFrame,
    GyroscopeFrame,
    AudioFrame,
    PlaneDetectionFrame,
    PointCloudDetectionFrame,
    MeshDetectionFrame,
);

impl TimestampedFrame for Frame {
    fn device_timestamp(&self) -> Timestamp {
        match self {
            Frame::Color(f) => f.device_timestamp,
            Frame::Depth(f) => f.device_timestamp,
            Frame::Transform(f) => f.device_timestamp,
            Frame::Gyroscope(f) => f.device_timestamp,
            Frame::Audio(f) => f.device_timestamp,
            Frame::PlaneDetection(f) => f.device_timestamp,
            Frame::PointCloudDetection(f) => f.device_timestamp,
            Frame::MeshDetection(f) => f.device_timestamp,
        }
    }
}
