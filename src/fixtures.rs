//! Shared test avatar: a small humanoid rig with deliberately mixed bone
//! naming conventions and a body mesh with foot-weighted soles at z = 0.

use nalgebra::Vector3;

use crate::scene::{Mesh, MeshData, Scene, Skeleton, VertexGroup};

/// T-posed humanoid, 1.70 m crown, eyes at 1.55, leg roots at 1.0, knees at
/// 0.5, ankles at 0.1, soles at 0.0. Right arm runs along −X (shoulder at
/// x = −0.2, wrist head at x = −0.7), straightened arm length 0.5.
pub(crate) fn basic_avatar() -> Scene {
    let mut skeleton = Skeleton::new("Armature");

    let hips = skeleton.add_bone("Hips", [0.0, 0.0, 1.0], [0.0, 0.0, 1.1], None);
    let spine = skeleton.add_bone("Spine", [0.0, 0.0, 1.1], [0.0, 0.0, 1.25], Some(hips));
    let chest = skeleton.add_bone("Chest", [0.0, 0.0, 1.25], [0.0, 0.0, 1.4], Some(spine));
    let neck = skeleton.add_bone("Neck", [0.0, 0.0, 1.4], [0.0, 0.0, 1.5], Some(chest));
    let head = skeleton.add_bone("Head", [0.0, 0.0, 1.5], [0.0, 0.0, 1.7], Some(neck));
    skeleton.add_bone("Eye_L", [0.03, -0.05, 1.55], [0.03, -0.05, 1.58], Some(head));
    skeleton.add_bone("Eye_R", [-0.03, -0.05, 1.55], [-0.03, -0.05, 1.58], Some(head));

    let left_leg = skeleton.add_bone("Left leg", [0.1, 0.0, 1.0], [0.1, 0.0, 0.5], Some(hips));
    let left_knee = skeleton.add_bone("Knee.L", [0.1, 0.0, 0.5], [0.1, 0.0, 0.1], Some(left_leg));
    skeleton.add_bone("Ankle_L", [0.1, 0.0, 0.1], [0.1, 0.12, 0.02], Some(left_knee));

    let right_leg = skeleton.add_bone("Right leg", [-0.1, 0.0, 1.0], [-0.1, 0.0, 0.5], Some(hips));
    let right_knee =
        skeleton.add_bone("Knee.R", [-0.1, 0.0, 0.5], [-0.1, 0.0, 0.1], Some(right_leg));
    skeleton.add_bone("R_Ankle", [-0.1, 0.0, 0.1], [-0.1, 0.12, 0.02], Some(right_knee));

    let shoulder_l =
        skeleton.add_bone("Shoulder_L", [0.05, 0.0, 1.4], [0.2, 0.0, 1.4], Some(chest));
    let left_arm = skeleton.add_bone("Left arm", [0.2, 0.0, 1.4], [0.45, 0.0, 1.4], Some(shoulder_l));
    let left_elbow =
        skeleton.add_bone("Elbow.L", [0.45, 0.0, 1.4], [0.7, 0.0, 1.4], Some(left_arm));
    skeleton.add_bone("Left wrist", [0.7, 0.0, 1.4], [0.8, 0.0, 1.4], Some(left_elbow));

    let shoulder_r =
        skeleton.add_bone("Shoulder_R", [-0.05, 0.0, 1.4], [-0.2, 0.0, 1.4], Some(chest));
    let right_arm =
        skeleton.add_bone("Right arm", [-0.2, 0.0, 1.4], [-0.45, 0.0, 1.4], Some(shoulder_r));
    let right_elbow =
        skeleton.add_bone("Elbow.R", [-0.45, 0.0, 1.4], [-0.7, 0.0, 1.4], Some(right_arm));
    skeleton.add_bone("Right wrist", [-0.7, 0.0, 1.4], [-0.8, 0.0, 1.4], Some(right_elbow));

    let mut scene = Scene::new(skeleton);
    scene.meshes.push(Mesh::new("Body", body_mesh()));
    scene
}

fn body_mesh() -> MeshData {
    let vertices = vec![
        Vector3::new(0.0, 0.0, 1.70),   // 0 crown
        Vector3::new(0.02, -0.08, 1.65), // 1 face
        Vector3::new(0.0, 0.0, 1.20),   // 2 torso
        Vector3::new(0.1, 0.0, 0.75),   // 3 left thigh
        Vector3::new(-0.1, 0.0, 0.75),  // 4 right thigh
        Vector3::new(0.1, 0.0, 0.3),    // 5 left calf
        Vector3::new(-0.1, 0.0, 0.3),   // 6 right calf
        Vector3::new(0.1, 0.14, 0.0),   // 7 left sole
        Vector3::new(-0.1, 0.14, 0.0),  // 8 right sole
        Vector3::new(0.55, 0.0, 1.38),  // 9 left forearm
        Vector3::new(0.8, 0.0, 1.4),    // 10 left hand tip
        Vector3::new(-0.8, 0.0, 1.4),   // 11 right hand tip
    ];
    let groups = vec![
        group("Head", &[(0, 1.0), (1, 1.0)]),
        group("Spine", &[(2, 1.0)]),
        group("Left leg", &[(3, 1.0)]),
        group("Right leg", &[(4, 1.0)]),
        group("Knee.L", &[(5, 1.0)]),
        group("Knee.R", &[(6, 1.0)]),
        group("Ankle_L", &[(7, 1.0)]),
        group("R_Ankle", &[(8, 1.0)]),
        group("Elbow.L", &[(9, 1.0)]),
        group("Left wrist", &[(10, 1.0)]),
        group("Right wrist", &[(11, 1.0)]),
    ];
    MeshData {
        vertices,
        groups,
        shape_keys: Vec::new(),
    }
}

fn group(name: &str, weights: &[(usize, f64)]) -> VertexGroup {
    VertexGroup {
        name: name.to_string(),
        weights: weights.to_vec(),
    }
}
