use glam::{Mat4, Vec4};

/// Flips the Y axis: device poses are Y-down, the sink is Y-up.
pub const Y_DOWN_TO_Y_UP: Mat4 = Mat4::from_cols(Vec4::X, Vec4::NEG_Y, Vec4::Z, Vec4::W);

/// Size of one packed 3x4 f32 pose.
pub const POSE_BYTES: usize = 12 * 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Row-major 3x3 rotation block.
    pub rotation: [[f32; 3]; 3],
    pub translation: [f32; 3],
}

impl Pose {
    /// Parses a packed row-major 3x4 matrix and applies [`Y_DOWN_TO_Y_UP`].
    pub fn from_le_bytes(data: &[u8]) -> Option<Self> {
        if data.len() != POSE_BYTES {
            log::warn!(
                "transform payload is {} bytes, expected {}",
                data.len(),
                POSE_BYTES
            );
            return None;
        }
        let mut rows = [[0.0f32; 4]; 4];
        for (i, chunk) in data.chunks_exact(4).enumerate() {
            rows[i / 4][i % 4] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        rows[3] = [0.0, 0.0, 0.0, 1.0];
        Some(Self::from_matrix(Y_DOWN_TO_Y_UP * Mat4::from_cols_array_2d(&rows).transpose()))
    }

    fn from_matrix(m: Mat4) -> Self {
        let mut rotation = [[0.0f32; 3]; 3];
        let mut translation = [0.0f32; 3];
        for (i, row) in rotation.iter_mut().enumerate() {
            let r = m.row(i);
            *row = [r.x, r.y, r.z];
            translation[i] = r.w;
        }
        Self {
            rotation,
            translation,
        }
    }
}

#[cfg(test)]
#[path = "pose_test.rs"]
mod pose_test;
