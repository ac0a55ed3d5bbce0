use std::sync::Arc;

use ffmpeg_compress::CompressionSessionManager;

use crate::media::compress::{rgb_frame, CompressionJob, CompressionWorkers};
use crate::media::convert::{
    color_layout, convert_color, convert_depth, depth_datatype, ChannelDatatype,
};
use crate::media::geometry::project_boundary;
use crate::media::group::{group_color_frames, group_depth_frames, sort_by_device_time};
use crate::media::mesh::MeshDecoder;
use crate::media::path::EntityPath;
use crate::media::pose::Pose;
use crate::media::sink::{
    Archetype, ComponentColumn, ImageFormat, RecordSink, StaticComponent, StaticRegistry,
    TimeColumn,
};
use crate::media::types::{
    AudioFrame, ColorFrame, DepthFrame, DetectionState, Device, FrameBatch, FrameType,
    GyroscopeFrame, MeshDetectionFrame, PlaneDetectionFrame, PointCloudDetectionFrame, Session,
    TimestampedFrame, Trackable, TrackingState, TransformFrame,
};

const GREEN: [u8; 4] = [0, 255, 0, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const YELLOW: [u8; 4] = [255, 255, 0, 255];

/// Writes the frames of every device in one session to a shared sink.
///
/// Static metadata is written once per (path, archetype) and again only when
/// it changes. Sink failures are logged and only affect the batch at hand.
pub struct SessionStream {
    session: Session,
    sink: Arc<dyn RecordSink>,
    statics: Arc<StaticRegistry>,
    compression: Option<CompressionWorkers>,
    mesh_decoder: Option<Arc<dyn MeshDecoder>>,
}

impl SessionStream {
    pub fn new(session: Session, sink: Arc<dyn RecordSink>) -> Self {
        log::info!("session stream created: {}_{}", session.name, session.id);
        Self {
            session,
            sink,
            statics: Arc::new(StaticRegistry::new()),
            compression: None,
            mesh_decoder: None,
        }
    }

    /// Routes eligible color batches through `manager` in addition to the raw
    /// image columns.
    pub fn with_compression(mut self, manager: Arc<CompressionSessionManager>) -> Self {
        log::info!(
            "RGB compression enabled: bitrate={}, preset={}",
            manager.config().bitrate,
            manager.config().preset
        );
        self.compression = Some(CompressionWorkers::new(
            manager,
            self.session.id.clone(),
            self.sink.clone(),
            self.statics.clone(),
        ));
        self
    }

    pub fn with_mesh_decoder(mut self, decoder: Arc<dyn MeshDecoder>) -> Self {
        self.mesh_decoder = Some(decoder);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn compression_enabled(&self) -> bool {
        self.compression.is_some()
    }

    pub fn save_frames(&self, batch: FrameBatch, device: &Device) {
        match batch {
            FrameBatch::Color(frames) => self.save_color_frames(frames, device),
            FrameBatch::Depth(frames) => self.save_depth_frames(frames, device),
            FrameBatch::Transform(frames) => self.save_transform_frames(frames, device),
            FrameBatch::Gyroscope(frames) => self.save_gyroscope_frames(frames, device),
            FrameBatch::Audio(frames) => self.save_audio_frames(frames, device),
            FrameBatch::PlaneDetection(frames) => self.save_plane_detection_frames(frames, device),
            FrameBatch::PointCloudDetection(frames) => {
                self.save_point_cloud_detection_frames(frames, device)
            }
            FrameBatch::MeshDetection(frames) => self.save_mesh_detection_frames(frames, device),
        }
    }

    /// Flushes the device's pending compression work and removes its
    /// compression session.
    pub async fn close_device(&self, device: &Device) {
        if let Some(compression) = &self.compression {
            compression.close(&device.uid).await;
        }
        log::info!("device closed: {}", device);
    }

    pub async fn shutdown(&self) {
        if let Some(compression) = &self.compression {
            compression.close_all().await;
        }
        log::info!("session stream shut down: {}_{}", self.session.name, self.session.id);
    }

    // ========================================================================
    // Images
    // ========================================================================

    pub fn save_color_frames(&self, frames: Vec<ColorFrame>, device: &Device) {
        if frames.is_empty() {
            log::warn!("no color frames to save");
            return;
        }
        let root = self.root(device, FrameType::Color);
        for mut batch in group_color_frames(frames) {
            sort_by_device_time(&mut batch.frames);
            let key = batch.key;
            let Some(layout) = color_layout(key.format) else {
                log::warn!("unsupported color frame format: {}", key.format.name());
                continue;
            };
            let converted: Vec<_> = batch
                .frames
                .iter()
                .filter_map(|f| convert_color(&f.image).map(|image| (f, image)))
                .collect();
            let Some((first, _)) = converted.first() else {
                log::warn!("no convertible color frames for {}x{}", key.width, key.height);
                continue;
            };

            let resolution = first.intrinsics.resolution;
            let intrinsics_path = root.resolution(resolution.x, resolution.y);
            let image_path = root.resolution(key.width, key.height);
            let device_times: Vec<f64> = converted
                .iter()
                .map(|(f, _)| f.device_timestamp.as_secs_f64())
                .collect();

            if self.declare(
                &intrinsics_path,
                Archetype::Pinhole,
                vec![StaticComponent::Indicator(Archetype::Pinhole)],
            ) {
                self.send(
                    &intrinsics_path,
                    vec![TimeColumn::device(device_times.clone())],
                    vec![ComponentColumn::PinholeProjection(
                        converted.iter().map(|(f, _)| f.intrinsics.projection()).collect(),
                    )],
                );
            }

            if self.declare(
                &image_path,
                Archetype::Image,
                vec![
                    StaticComponent::ImageFormat(ImageFormat {
                        width: key.width,
                        height: key.height,
                        layout: Some(layout),
                        datatype: ChannelDatatype::U8,
                    }),
                    StaticComponent::Indicator(Archetype::Image),
                ],
            ) {
                self.send(
                    &image_path,
                    vec![
                        TimeColumn::device(device_times.clone()),
                        TimeColumn::image(converted.iter().map(|(f, _)| f.image.timestamp).collect()),
                    ],
                    vec![ComponentColumn::ImageBuffer(
                        converted.iter().map(|(_, image)| image.data.clone()).collect(),
                    )],
                );
            }

            let Some(compression) = &self.compression else {
                continue;
            };
            if key.format.is_rgb_family() && converted.len() > 1 {
                let frames = converted
                    .iter()
                    .filter_map(|(_, image)| rgb_frame(image, key.width, key.height))
                    .collect();
                compression.enqueue(
                    &device.uid,
                    CompressionJob {
                        image_path,
                        first_time: device_times[0],
                        frames,
                    },
                );
            }
        }
    }

    pub fn save_depth_frames(&self, frames: Vec<DepthFrame>, device: &Device) {
        if frames.is_empty() {
            log::warn!("no depth frames to save");
            return;
        }
        let root = self.root(device, FrameType::Depth);
        for mut batch in group_depth_frames(frames) {
            sort_by_device_time(&mut batch.frames);
            let key = batch.key;
            let Some(datatype) = depth_datatype(key.format) else {
                log::warn!("unsupported depth frame format: {}", key.format.name());
                continue;
            };
            let path = root
                .resolution(key.width, key.height)
                .child(if key.smoothed { "smoothed" } else { "raw" });
            let converted: Vec<_> = batch
                .frames
                .iter()
                .filter_map(|f| convert_depth(&f.image).map(|(_, data)| (f, data)))
                .collect();
            if converted.is_empty() {
                continue;
            }

            if !self.declare(
                &path,
                Archetype::DepthImage,
                vec![
                    StaticComponent::ImageFormat(ImageFormat {
                        width: key.width,
                        height: key.height,
                        layout: None,
                        datatype,
                    }),
                    StaticComponent::Indicator(Archetype::DepthImage),
                    StaticComponent::DepthMeter(1.0),
                ],
            ) {
                continue;
            }
            self.send(
                &path,
                vec![
                    TimeColumn::device(
                        converted
                            .iter()
                            .map(|(f, _)| f.device_timestamp.as_secs_f64())
                            .collect(),
                    ),
                    TimeColumn::image(converted.iter().map(|(f, _)| f.image.timestamp).collect()),
                ],
                vec![ComponentColumn::ImageBuffer(
                    converted.into_iter().map(|(_, data)| data).collect(),
                )],
            );
        }
    }

    // ========================================================================
    // Motion & Audio
    // ========================================================================

    pub fn save_transform_frames(&self, mut frames: Vec<TransformFrame>, device: &Device) {
        if frames.is_empty() {
            log::warn!("no transform frames to save");
            return;
        }
        sort_by_device_time(&mut frames);
        let poses: Vec<(f64, Pose)> = frames
            .iter()
            .filter_map(|f| Pose::from_le_bytes(&f.data).map(|p| (f.device_timestamp.as_secs_f64(), p)))
            .collect();
        if poses.is_empty() {
            return;
        }

        let path = self.root(device, FrameType::Transform);
        if !self.declare(
            &path,
            Archetype::Transform3D,
            vec![StaticComponent::Indicator(Archetype::Transform3D)],
        ) {
            return;
        }
        self.send(
            &path,
            vec![TimeColumn::device(poses.iter().map(|(t, _)| *t).collect())],
            vec![
                ComponentColumn::TransformMat3x3(poses.iter().map(|(_, p)| p.rotation).collect()),
                ComponentColumn::Translation3D(poses.iter().map(|(_, p)| p.translation).collect()),
            ],
        );
    }

    pub fn save_gyroscope_frames(&self, mut frames: Vec<GyroscopeFrame>, device: &Device) {
        if frames.is_empty() {
            log::warn!("no gyroscope frames to save");
            return;
        }
        sort_by_device_time(&mut frames);
        let root = self.root(device, FrameType::Gyroscope);
        let times = device_times(&frames);

        let attitude = root.child("attitude");
        if self.declare(
            &attitude,
            Archetype::Boxes3D,
            vec![
                StaticComponent::Indicator(Archetype::Boxes3D),
                StaticComponent::HalfSize3D([0.5, 0.5, 0.5]),
            ],
        ) {
            self.send(
                &attitude,
                vec![TimeColumn::device(times.clone())],
                vec![ComponentColumn::RotationQuat(
                    frames.iter().map(|f| f.attitude.to_xyzw()).collect(),
                )],
            );
        }

        let arrows = [
            ("rotation_rate", GREEN, frames.iter().map(|f| f.rotation_rate.to_array()).collect::<Vec<_>>()),
            ("gravity", BLUE, frames.iter().map(|f| f.gravity.to_array()).collect()),
            ("acceleration", YELLOW, frames.iter().map(|f| f.acceleration.to_array()).collect()),
        ];
        for (name, color, vectors) in arrows {
            let path = root.child(name);
            if self.declare(
                &path,
                Archetype::Arrows3D,
                vec![
                    StaticComponent::Indicator(Archetype::Arrows3D),
                    StaticComponent::Color(color),
                ],
            ) {
                self.send(
                    &path,
                    vec![TimeColumn::device(times.clone())],
                    vec![ComponentColumn::Vector3D(vectors)],
                );
            }
        }
    }

    pub fn save_audio_frames(&self, mut frames: Vec<AudioFrame>, device: &Device) {
        if frames.is_empty() {
            log::warn!("no audio frames to save");
            return;
        }
        sort_by_device_time(&mut frames);
        let path = self.root(device, FrameType::Audio);
        if !self.declare(
            &path,
            Archetype::Scalar,
            vec![StaticComponent::Indicator(Archetype::Scalar)],
        ) {
            return;
        }
        self.send(
            &path,
            vec![TimeColumn::device(device_times(&frames))],
            vec![ComponentColumn::Scalars {
                values: frames
                    .iter()
                    .flat_map(|f| f.data.iter().map(|&s| s as f64))
                    .collect(),
                lengths: frames.iter().map(|f| f.data.len()).collect(),
            }],
        );
    }

    // ========================================================================
    // Detections
    // ========================================================================

    pub fn save_plane_detection_frames(&self, mut frames: Vec<PlaneDetectionFrame>, device: &Device) {
        if frames.is_empty() {
            log::warn!("no plane detection frames to save");
            return;
        }
        sort_by_device_time(&mut frames);
        let path = self.root(device, FrameType::PlaneDetection);
        if !self.declare(
            &path,
            Archetype::LineStrips3D,
            vec![StaticComponent::Indicator(Archetype::LineStrips3D)],
        ) {
            return;
        }
        frames.retain(|f| known_state(f.state, FrameType::PlaneDetection));

        // updates sometimes arrive with an empty boundary; only adds pass through regardless
        let strips: Vec<(&PlaneDetectionFrame, Vec<[f32; 3]>)> = frames
            .iter()
            .filter(|f| {
                f.state == DetectionState::Added
                    || (f.state == DetectionState::Updated && !f.plane.boundary.is_empty())
            })
            .map(|f| (f, project_boundary(&f.plane.boundary, f.plane.normal, f.plane.center)))
            .filter(|(_, strip)| !strip.is_empty())
            .collect();
        if !strips.is_empty() {
            let trackables: Vec<Trackable> = strips.iter().map(|(f, _)| f.plane.trackable).collect();
            let mut components = vec![ComponentColumn::LineStrip3D(
                strips.iter().map(|(_, strip)| strip.clone()).collect(),
            )];
            components.extend(trackable_columns(&trackables));
            self.send(&path, vec![TimeColumn::device(device_times_of(&strips))], components);
        }

        let removed: Vec<(f64, String)> = frames
            .iter()
            .filter(|f| f.state == DetectionState::Removed)
            .map(|f| (f.device_timestamp.as_secs_f64(), f.plane.trackable.trackable_id.to_string()))
            .collect();
        self.send_removed(&path, removed);
    }

    pub fn save_point_cloud_detection_frames(
        &self,
        mut frames: Vec<PointCloudDetectionFrame>,
        device: &Device,
    ) {
        if frames.is_empty() {
            log::warn!("no point cloud detection frames to save");
            return;
        }
        sort_by_device_time(&mut frames);
        let path = self.root(device, FrameType::PointCloudDetection);
        if !self.declare(
            &path,
            Archetype::Points3D,
            vec![StaticComponent::Indicator(Archetype::Points3D)],
        ) {
            return;
        }
        frames.retain(|f| known_state(f.state, FrameType::PointCloudDetection));

        let active: Vec<&PointCloudDetectionFrame> = frames
            .iter()
            .filter(|f| matches!(f.state, DetectionState::Added | DetectionState::Updated))
            .collect();
        if !active.is_empty() {
            let trackables: Vec<Trackable> = active.iter().map(|f| f.point_cloud.trackable).collect();
            self.send(
                &path,
                vec![TimeColumn::device(active.iter().map(|f| f.device_timestamp.as_secs_f64()).collect())],
                trackable_columns(&trackables),
            );

            let mut times = Vec::new();
            let mut children = Vec::new();
            let mut positions = Vec::new();
            for f in &active {
                let cloud = &f.point_cloud;
                if cloud.identifiers.len() != cloud.positions.len() {
                    log::warn!(
                        "point cloud {} has {} identifiers and {} positions",
                        cloud.trackable.trackable_id,
                        cloud.identifiers.len(),
                        cloud.positions.len()
                    );
                }
                let t = f.device_timestamp.as_secs_f64();
                for (id, position) in cloud.identifiers.iter().zip(&cloud.positions) {
                    times.push(t);
                    children.push(format!("{}/{}", cloud.trackable.trackable_id, id));
                    positions.push(position.to_array());
                }
            }
            if !times.is_empty() {
                self.send(
                    &path,
                    vec![TimeColumn::device(times)],
                    vec![
                        ComponentColumn::ChildPath(children),
                        ComponentColumn::Position3D(positions),
                    ],
                );
            }
        }

        let removed: Vec<(f64, String)> = frames
            .iter()
            .filter(|f| f.state == DetectionState::Removed)
            .map(|f| {
                (
                    f.device_timestamp.as_secs_f64(),
                    f.point_cloud.trackable.trackable_id.to_string(),
                )
            })
            .collect();
        self.send_removed(&path, removed);
    }

    pub fn save_mesh_detection_frames(&self, mut frames: Vec<MeshDetectionFrame>, device: &Device) {
        if frames.is_empty() {
            log::warn!("no mesh detection frames to save");
            return;
        }
        sort_by_device_time(&mut frames);
        let path = self.root(device, FrameType::MeshDetection);
        if !self.declare(
            &path,
            Archetype::Mesh3D,
            vec![StaticComponent::Indicator(Archetype::Mesh3D)],
        ) {
            return;
        }
        frames.retain(|f| known_state(f.state, FrameType::MeshDetection));

        for f in frames
            .iter()
            .filter(|f| matches!(f.state, DetectionState::Added | DetectionState::Updated))
        {
            let mesh_path = path.child(f.mesh_filter.instance_id.to_string());
            let time = vec![TimeColumn::device(vec![f.device_timestamp.as_secs_f64()])];
            for sub_mesh in &f.mesh_filter.sub_meshes {
                let column = match &self.mesh_decoder {
                    Some(decoder) => match decoder.decode(sub_mesh) {
                        Ok(mesh) => ComponentColumn::Mesh3D(vec![mesh]),
                        Err(e) => {
                            log::warn!("failed to decode sub-mesh of {}: {:#}", mesh_path, e);
                            continue;
                        }
                    },
                    None => ComponentColumn::EncodedMesh(vec![sub_mesh.clone()]),
                };
                self.send(&mesh_path, time.clone(), vec![column]);
            }
        }

        let removed: Vec<(f64, String)> = frames
            .iter()
            .filter(|f| f.state == DetectionState::Removed)
            .map(|f| {
                (
                    f.device_timestamp.as_secs_f64(),
                    f.mesh_filter.instance_id.to_string(),
                )
            })
            .collect();
        self.send_removed(&path, removed);
    }

    // ========================================================================
    // Sink Helpers
    // ========================================================================

    fn root(&self, device: &Device, frame_type: FrameType) -> EntityPath {
        EntityPath::root(&self.session, device, frame_type)
    }

    /// Returns false when the declaration failed; the caller skips the write.
    fn declare(
        &self,
        path: &EntityPath,
        archetype: Archetype,
        components: Vec<StaticComponent>,
    ) -> bool {
        match self
            .statics
            .declare_once(self.sink.as_ref(), path, archetype, components)
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to declare {:?} at {}: {:#}", archetype, path, e);
                false
            }
        }
    }

    fn send(&self, path: &EntityPath, times: Vec<TimeColumn>, components: Vec<ComponentColumn>) {
        if let Err(e) = self.sink.send_columns(path, times, components) {
            log::error!("failed to write columns at {}: {:#}", path, e);
        }
    }

    fn send_removed(&self, path: &EntityPath, removed: Vec<(f64, String)>) {
        if removed.is_empty() {
            return;
        }
        let (times, children): (Vec<f64>, Vec<String>) = removed.into_iter().unzip();
        let clears = vec![true; children.len()];
        self.send(
            path,
            vec![TimeColumn::device(times)],
            vec![
                ComponentColumn::ChildPath(children),
                ComponentColumn::ClearRecursive(clears),
            ],
        );
    }
}

fn device_times<F: TimestampedFrame>(frames: &[F]) -> Vec<f64> {
    frames
        .iter()
        .map(|f| f.device_timestamp().as_secs_f64())
        .collect()
}

fn device_times_of<F: TimestampedFrame, T>(pairs: &[(&F, T)]) -> Vec<f64> {
    pairs
        .iter()
        .map(|(f, _)| f.device_timestamp().as_secs_f64())
        .collect()
}

fn known_state(state: DetectionState, frame_type: FrameType) -> bool {
    if state == DetectionState::Unspecified {
        log::warn!("skipping {} with unspecified detection state", frame_type);
        return false;
    }
    true
}

/// Child path, color and tracking state label per trackable.
fn trackable_columns(trackables: &[Trackable]) -> Vec<ComponentColumn> {
    vec![
        ComponentColumn::ChildPath(trackables.iter().map(|t| t.trackable_id.to_string()).collect()),
        ComponentColumn::Color(
            trackables
                .iter()
                .map(|t| match t.tracking_state {
                    TrackingState::Tracking => GREEN,
                    TrackingState::Unspecified | TrackingState::None | TrackingState::Limited => RED,
                })
                .collect(),
        ),
        ComponentColumn::Text(
            trackables
                .iter()
                .map(|t| t.tracking_state.name().to_string())
                .collect(),
        ),
    ]
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
