use super::*;

fn pack(rows: [[f32; 4]; 3]) -> Vec<u8> {
    rows.iter()
        .flat_map(|r| r.iter())
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

#[test]
fn test_identity_pose_flips_y() {
    let data = pack([
        [1.0, 0.0, 0.0, 0.5],
        [0.0, 1.0, 0.0, 2.0],
        [0.0, 0.0, 1.0, -3.0],
    ]);
    let pose = Pose::from_le_bytes(&data).unwrap();
    assert_eq!(pose.rotation, [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]]);
    assert_eq!(pose.translation, [0.5, -2.0, -3.0]);
}

#[test]
fn test_rotation_is_left_multiplied() {
    // 90 degrees about Z, row-major
    let data = pack([
        [0.0, -1.0, 0.0, 0.0],
        [1.0, 0.0, 0.0, 1.0],
        [0.0, 0.0, 1.0, 0.0],
    ]);
    let pose = Pose::from_le_bytes(&data).unwrap();
    // only the second row changes sign
    assert_eq!(pose.rotation[0], [0.0, -1.0, 0.0]);
    assert_eq!(pose.rotation[1], [-1.0, 0.0, 0.0]);
    assert_eq!(pose.rotation[2], [0.0, 0.0, 1.0]);
    assert_eq!(pose.translation, [0.0, -1.0, 0.0]);
}

#[test]
fn test_rejects_wrong_payload_size() {
    assert!(Pose::from_le_bytes(&[0u8; 47]).is_none());
    assert!(Pose::from_le_bytes(&[0u8; 52]).is_none());
    assert!(Pose::from_le_bytes(&[]).is_none());
}

#[test]
fn test_basis_change_is_involution() {
    assert_eq!(Y_DOWN_TO_Y_UP * Y_DOWN_TO_Y_UP, Mat4::IDENTITY);
}
