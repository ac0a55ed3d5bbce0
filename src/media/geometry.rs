use glam::Vec3;

use crate::media::types::{Vector2, Vector3};

const MIN_NORMAL_LENGTH: f32 = 1e-9;
// |n . x| above this counts as parallel to the X axis
const PARALLEL_COS: f32 = 0.999;

/// Projects a plane boundary, given in the plane's own 2D frame, into world
/// space. The returned strip repeats the first point at the end.
///
/// The in-plane basis is `u = normalize(n x ref)`, `v = n x u`, with `ref` the
/// world X axis unless the normal is (anti-)parallel to it, then world Y.
pub fn project_boundary(boundary: &[Vector2], normal: Vector3, center: Vector3) -> Vec<[f32; 3]> {
    if boundary.is_empty() {
        log::warn!("empty plane boundary, nothing to project");
        return Vec::new();
    }
    let normal = Vec3::from_array(normal.to_array());
    if !normal.is_finite() || normal.length() < MIN_NORMAL_LENGTH {
        log::warn!("degenerate plane normal {:?}", normal);
        return Vec::new();
    }
    let n = normal.normalize();
    let reference = if n.dot(Vec3::X).abs() > PARALLEL_COS {
        Vec3::Y
    } else {
        Vec3::X
    };
    let u = n.cross(reference).normalize();
    let v = n.cross(u);
    let center = Vec3::from_array(center.to_array());

    let mut points: Vec<[f32; 3]> = boundary
        .iter()
        .map(|p| (center + p.x * u + p.y * v).to_array())
        .collect();
    points.push(points[0]);
    points
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;
