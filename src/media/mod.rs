//! Sensor frame pipeline: per-device frame batches into a columnar record sink
//!
//! Data Flow:
//! ```text
//!                                        ┌─► Color ─► group ─► convert ─► Pinhole + Image columns
//!                                        │                        │
//!                                        │                        └─► RGB batch ─► CompressionWorkers
//!                                        │                                              │
//! FrameBatch (one kind, one device) ─────┤                              ffmpeg (scratch dir, timeout)
//!                                        │                                              │
//!                                        │                                       {image}/video column
//!                                        ├─► Depth ─► group ─► DepthImage columns
//!                                        ├─► Transform / Gyroscope / Audio ─► time-indexed columns
//!                                        └─► Plane / PointCloud / Mesh ─► per-trackable columns + clears
//! ```
//!
//! Every entity path is derived from session, device and frame kind, see
//! [`path::EntityPath`]. Static metadata goes through [`sink::StaticRegistry`]
//! so each path is declared before its first column write.

pub mod compress;
pub mod convert;
pub mod geometry;
pub mod group;
pub mod mesh;
pub mod path;
pub mod pose;
pub mod sink;
pub mod stream;
pub mod types;
