//! Hip bone shortening for rigs whose hip bone spans most of the torso.

use crate::error::RescaleError;
use crate::roles::{self, Role, RoleOverrides};
use crate::scene::Scene;

/// Shorten the hip bone: its head moves 90% of the way up from the leg
/// roots to the spine head and onto the spine's X/Y. The tail and all
/// geometry stay put.
///
/// Leg start is the average height of the two leg root heads. This is a
/// rest-pose edit only; no pose or skinning is touched.
pub fn shrink_hips(scene: &mut Scene, overrides: &RoleOverrides) -> Result<(), RescaleError> {
    let left = roles::resolve(Role::LeftLeg, &scene.skeleton, overrides)?;
    let right = roles::resolve(Role::RightLeg, &scene.skeleton, overrides)?;
    let spine = roles::resolve(Role::Spine, &scene.skeleton, overrides)?;
    let hips = roles::resolve(Role::Hips, &scene.skeleton, overrides)?;

    let leg_start =
        (scene.skeleton.bone(left).head.z + scene.skeleton.bone(right).head.z) / 2.0;
    let spine_head = scene.skeleton.bone(spine).head;

    let hip = scene.skeleton.bone_mut(hips);
    hip.head.x = spine_head.x;
    hip.head.y = spine_head.y;
    hip.head.z = leg_start + (spine_head.z - leg_start) * 0.9;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::basic_avatar;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn given_fixture_when_shrinking_hips_then_head_lands_just_under_spine() {
        let mut scene = basic_avatar();
        let overrides = RoleOverrides::new();
        shrink_hips(&mut scene, &overrides).unwrap();

        let hips = roles::resolve(Role::Hips, &scene.skeleton, &overrides).unwrap();
        let bone = scene.skeleton.bone(hips);
        // Leg roots at z 1.0, spine head at z 1.1: head lands at 1.09.
        assert_relative_eq!(bone.head, Vector3::new(0.0, 0.0, 1.09), epsilon = 1e-12);
        assert_relative_eq!(bone.tail, Vector3::new(0.0, 0.0, 1.1), epsilon = 1e-12);
    }

    #[test]
    fn given_offset_spine_when_shrinking_hips_then_head_follows_spine_xy() {
        let mut scene = basic_avatar();
        let overrides = RoleOverrides::new();
        let spine = roles::resolve(Role::Spine, &scene.skeleton, &overrides).unwrap();
        scene.skeleton.bone_mut(spine).head.y = 0.04;

        shrink_hips(&mut scene, &overrides).unwrap();
        let hips = roles::resolve(Role::Hips, &scene.skeleton, &overrides).unwrap();
        assert_relative_eq!(
            scene.skeleton.bone(hips).head.y,
            0.04,
            epsilon = 1e-12
        );
    }

    #[test]
    fn given_missing_spine_when_shrinking_hips_then_resolution_fails() {
        let mut scene = basic_avatar();
        let mut overrides = RoleOverrides::new();
        overrides.set(Role::Spine, "Nope");
        assert!(shrink_hips(&mut scene, &overrides).is_err());
    }
}
