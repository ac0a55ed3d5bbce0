//! Append-only columnar sink contract and two implementations.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use bytes::Bytes;
use serde::Serialize;

use crate::media::convert::{ChannelDatatype, PixelLayout};
use crate::media::mesh::DecodedMesh;
use crate::media::path::EntityPath;

// ============================================================================
// Columns
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    /// When the device produced the frame.
    Device,
    /// When the sensor captured the image.
    Image,
}

impl Timeline {
    pub fn name(self) -> &'static str {
        match self {
            Timeline::Device => "device_timestamp",
            Timeline::Image => "image_timestamp",
        }
    }
}

/// One time value per row, in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeColumn {
    pub timeline: Timeline,
    pub seconds: Vec<f64>,
}

impl TimeColumn {
    pub fn device(seconds: Vec<f64>) -> Self {
        Self {
            timeline: Timeline::Device,
            seconds,
        }
    }

    pub fn image(seconds: Vec<f64>) -> Self {
        Self {
            timeline: Timeline::Image,
            seconds,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Archetype {
    Transform3D,
    Pinhole,
    Image,
    DepthImage,
    Boxes3D,
    Arrows3D,
    Scalar,
    LineStrips3D,
    Points3D,
    Mesh3D,
    VideoStream,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ImageFormat {
    pub width: u32,
    pub height: u32,
    /// None for single-channel (depth) images.
    pub layout: Option<PixelLayout>,
    pub datatype: ChannelDatatype,
}

/// Per-path metadata written once, before any time-indexed data.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "component", content = "value", rename_all = "snake_case")]
pub enum StaticComponent {
    Indicator(Archetype),
    ImageFormat(ImageFormat),
    DepthMeter(f32),
    HalfSize3D([f32; 3]),
    Color([u8; 4]),
    MediaType(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ComponentColumn {
    TransformMat3x3(Vec<[[f32; 3]; 3]>),
    Translation3D(Vec<[f32; 3]>),
    PinholeProjection(Vec<[[f32; 3]; 3]>),
    ImageBuffer(Vec<Bytes>),
    RotationQuat(Vec<[f32; 4]>),
    Vector3D(Vec<[f32; 3]>),
    /// `values` split into one partition per row; `lengths` sums to `values.len()`.
    Scalars { values: Vec<f64>, lengths: Vec<usize> },
    LineStrip3D(Vec<Vec<[f32; 3]>>),
    Position3D(Vec<[f32; 3]>),
    ChildPath(Vec<String>),
    Color(Vec<[u8; 4]>),
    Text(Vec<String>),
    ClearRecursive(Vec<bool>),
    Mesh3D(Vec<DecodedMesh>),
    EncodedMesh(Vec<Bytes>),
    VideoSample(Vec<Bytes>),
}

impl ComponentColumn {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentColumn::TransformMat3x3(_) => "TransformMat3x3",
            ComponentColumn::Translation3D(_) => "Translation3D",
            ComponentColumn::PinholeProjection(_) => "PinholeProjection",
            ComponentColumn::ImageBuffer(_) => "ImageBuffer",
            ComponentColumn::RotationQuat(_) => "RotationQuat",
            ComponentColumn::Vector3D(_) => "Vector3D",
            ComponentColumn::Scalars { .. } => "Scalar",
            ComponentColumn::LineStrip3D(_) => "LineStrip3D",
            ComponentColumn::Position3D(_) => "Position3D",
            ComponentColumn::ChildPath(_) => "ChildPath",
            ComponentColumn::Color(_) => "Color",
            ComponentColumn::Text(_) => "Text",
            ComponentColumn::ClearRecursive(_) => "ClearIsRecursive",
            ComponentColumn::Mesh3D(_) => "Mesh3D",
            ComponentColumn::EncodedMesh(_) => "EncodedMesh",
            ComponentColumn::VideoSample(_) => "VideoSample",
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            ComponentColumn::TransformMat3x3(v) => v.len(),
            ComponentColumn::Translation3D(v) => v.len(),
            ComponentColumn::PinholeProjection(v) => v.len(),
            ComponentColumn::ImageBuffer(v) => v.len(),
            ComponentColumn::RotationQuat(v) => v.len(),
            ComponentColumn::Vector3D(v) => v.len(),
            ComponentColumn::Scalars { lengths, .. } => lengths.len(),
            ComponentColumn::LineStrip3D(v) => v.len(),
            ComponentColumn::Position3D(v) => v.len(),
            ComponentColumn::ChildPath(v) => v.len(),
            ComponentColumn::Color(v) => v.len(),
            ComponentColumn::Text(v) => v.len(),
            ComponentColumn::ClearRecursive(v) => v.len(),
            ComponentColumn::Mesh3D(v) => v.len(),
            ComponentColumn::EncodedMesh(v) => v.len(),
            ComponentColumn::VideoSample(v) => v.len(),
        }
    }
}

/// Returns the shared row count, or an error when the columns disagree.
pub fn check_columns(times: &[TimeColumn], components: &[ComponentColumn]) -> anyhow::Result<usize> {
    let rows = times
        .first()
        .map(|t| t.seconds.len())
        .or_else(|| components.first().map(ComponentColumn::rows))
        .unwrap_or(0);
    for time in times {
        anyhow::ensure!(
            time.seconds.len() == rows,
            "{} has {} rows, expected {}",
            time.timeline.name(),
            time.seconds.len(),
            rows
        );
    }
    for component in components {
        anyhow::ensure!(
            component.rows() == rows,
            "{} has {} rows, expected {}",
            component.name(),
            component.rows(),
            rows
        );
        if let ComponentColumn::Scalars { values, lengths } = component {
            let total: usize = lengths.iter().sum();
            anyhow::ensure!(
                total == values.len(),
                "scalar partitions cover {} values, column holds {}",
                total,
                values.len()
            );
        }
    }
    Ok(rows)
}

// ============================================================================
// Sinks
// ============================================================================

/// Append-only columnar recording sink.
pub trait RecordSink: Send + Sync {
    fn log_static(&self, path: &EntityPath, components: Vec<StaticComponent>) -> anyhow::Result<()>;

    fn send_columns(
        &self,
        path: &EntityPath,
        times: Vec<TimeColumn>,
        components: Vec<ComponentColumn>,
    ) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum SinkRecord {
    Static {
        path: EntityPath,
        components: Vec<StaticComponent>,
    },
    Columns {
        path: EntityPath,
        times: Vec<TimeColumn>,
        components: Vec<ComponentColumn>,
    },
}

impl SinkRecord {
    pub fn path(&self) -> &EntityPath {
        match self {
            SinkRecord::Static { path, .. } | SinkRecord::Columns { path, .. } => path,
        }
    }
}

/// Keeps every record in memory, in write order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<SinkRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Static writes at `path`, in order.
    pub fn statics_at(&self, path: &EntityPath) -> Vec<Vec<StaticComponent>> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                SinkRecord::Static { path: p, components } if &p == path => Some(components),
                _ => None,
            })
            .collect()
    }

    /// Column writes at `path`, in order.
    pub fn columns_at(&self, path: &EntityPath) -> Vec<(Vec<TimeColumn>, Vec<ComponentColumn>)> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                SinkRecord::Columns {
                    path: p,
                    times,
                    components,
                } if &p == path => Some((times, components)),
                _ => None,
            })
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn log_static(&self, path: &EntityPath, components: Vec<StaticComponent>) -> anyhow::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SinkRecord::Static {
                path: path.clone(),
                components,
            });
        Ok(())
    }

    fn send_columns(
        &self,
        path: &EntityPath,
        times: Vec<TimeColumn>,
        components: Vec<ComponentColumn>,
    ) -> anyhow::Result<()> {
        check_columns(&times, &components).with_context(|| format!("bad columns for {}", path))?;
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SinkRecord::Columns {
                path: path.clone(),
                times,
                components,
            });
        Ok(())
    }
}

/// Writes a one-line JSON summary of every record to a file.
pub struct JournalSink {
    out: Mutex<BufWriter<File>>,
}

impl JournalSink {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create journal {}", path.display()))?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        self.out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }

    fn write_line(&self, line: serde_json::Value) -> anyhow::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *out, &line)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}

impl RecordSink for JournalSink {
    fn log_static(&self, path: &EntityPath, components: Vec<StaticComponent>) -> anyhow::Result<()> {
        self.write_line(serde_json::json!({
            "kind": "static",
            "path": path.as_str(),
            "components": components,
        }))
    }

    fn send_columns(
        &self,
        path: &EntityPath,
        times: Vec<TimeColumn>,
        components: Vec<ComponentColumn>,
    ) -> anyhow::Result<()> {
        let rows = check_columns(&times, &components)
            .with_context(|| format!("bad columns for {}", path))?;
        let timelines: Vec<&str> = times.iter().map(|t| t.timeline.name()).collect();
        let names: Vec<&str> = components.iter().map(ComponentColumn::name).collect();
        self.write_line(serde_json::json!({
            "kind": "columns",
            "path": path.as_str(),
            "rows": rows,
            "timelines": timelines,
            "first_time": times.first().and_then(|t| t.seconds.first()),
            "components": names,
        }))
    }
}

// ============================================================================
// Static Declarations
// ============================================================================

/// Remembers the static metadata last written for each (path, archetype).
#[derive(Debug, Default)]
pub struct StaticRegistry {
    declared: Mutex<HashMap<(EntityPath, Archetype), Vec<StaticComponent>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `components` to `path` unless the identical set is already
    /// declared for `archetype`. A failed write leaves the previous
    /// declaration in place so the next batch retries.
    pub fn declare_once(
        &self,
        sink: &dyn RecordSink,
        path: &EntityPath,
        archetype: Archetype,
        components: Vec<StaticComponent>,
    ) -> anyhow::Result<()> {
        let key = (path.clone(), archetype);
        let previous = {
            let mut declared = self.declared.lock().unwrap_or_else(PoisonError::into_inner);
            if declared.get(&key) == Some(&components) {
                return Ok(());
            }
            declared.insert(key.clone(), components.clone())
        };
        if let Err(e) = sink.log_static(path, components) {
            let mut declared = self.declared.lock().unwrap_or_else(PoisonError::into_inner);
            match previous {
                Some(previous) => declared.insert(key, previous),
                None => declared.remove(&key),
            };
            return Err(e);
        }
        Ok(())
    }

    pub fn is_declared(&self, path: &EntityPath, archetype: Archetype) -> bool {
        self.declared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(path.clone(), archetype))
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_test;
