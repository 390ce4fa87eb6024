//! Finger spreading: rotate each finger chain root so it points straight
//! away from the wrist, then bake.

use nalgebra::{UnitQuaternion, Vector3};

use crate::error::RescaleError;
use crate::rescale::apply;
use crate::roles::{self, Role, RoleOverrides};
use crate::scene::Scene;

/// Point every finger root of both hands away from its wrist head.
///
/// `spread_factor` damps the rotation: 1.0 points the finger exactly away
/// from the wrist, values above 1 extrapolate past it (the pointing
/// rotation is applied twice and slerped back from identity by
/// `spread_factor / 2`). With `spare_thumb` any finger whose name contains
/// "thumb" keeps its pose. The result is baked into the rest pose.
pub fn spread_fingers(
    scene: &mut Scene,
    overrides: &RoleOverrides,
    spare_thumb: bool,
    spread_factor: f64,
) -> Result<(), RescaleError> {
    scene.skeleton.reset_pose();

    for role in [Role::RightWrist, Role::LeftWrist] {
        let wrist = roles::resolve(role, &scene.skeleton, overrides)?;
        let fingers = scene.skeleton.bone(wrist).children.clone();
        for finger in fingers {
            if spare_thumb && scene.skeleton.bone(finger).name.to_lowercase().contains("thumb") {
                continue;
            }
            let eval = scene.skeleton.evaluate_pose();
            let away_from = eval.head(wrist);
            point_bone(scene, finger, away_from, spread_factor);
        }
    }

    apply::pose_to_rest(scene);
    Ok(())
}

/// Rotate `bone` in pose space so its direction points from `point` through
/// its own head, damped by `spread_factor`.
fn point_bone(scene: &mut Scene, bone: usize, point: Vector3<f64>, spread_factor: f64) {
    let eval = scene.skeleton.evaluate_pose();
    let head = eval.head(bone);
    let tail = eval.tail(bone);

    let current = tail - head;
    let desired = head - point;
    if current.norm() <= f64::EPSILON || desired.norm() <= f64::EPSILON {
        return;
    }

    let global = UnitQuaternion::rotation_between(&current, &desired)
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI));
    // Doubled, then slerped back by half: spread_factor 1.0 lands exactly
    // on the pointing rotation, larger factors extrapolate.
    let doubled = global * global;

    let frame = eval.rotation(bone);
    let local = frame.inverse() * doubled * frame;
    let damped = UnitQuaternion::identity().slerp(&local, spread_factor / 2.0);

    scene.skeleton.bone_mut(bone).pose.rotation = damped;
}
