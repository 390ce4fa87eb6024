//! The rescale pipeline: measure → solve → apply/bake → floor → height.
//!
//! Stages run strictly in order, each reading geometry the previous stage
//! has already committed. The solve itself is pure; a failure there leaves
//! the scene untouched. A failure mid-bake can leave some meshes baked and
//! others not; the operation is deterministic, so re-running after fixing
//! the input is the recovery path.

pub mod apply;
pub mod floor;
pub mod metrology;
pub mod solver;
pub mod types;

use crate::error::RescaleError;
use crate::roles::RoleOverrides;
use crate::scene::Scene;
use types::{ProportionTargets, RescaleReport};

/// Run the full proportional rescale on one avatar.
///
/// After a successful run the avatar's eyes sit at the height the view
/// protocol derives from its arm length, its lowest point is on z = 0, its
/// height matches `target_height`, and all pose transforms are identity
/// (everything is baked into the rest pose).
pub fn rescale(
    scene: &mut Scene,
    overrides: &RoleOverrides,
    targets: &ProportionTargets,
) -> Result<RescaleReport, RescaleError> {
    let before = metrology::measure(scene, overrides)?;
    let view = solver::view_height(
        before.head_to_hand,
        targets.custom_scale_ratio,
        targets.extra_leg_length,
    );

    let mut report = RescaleReport {
        view_height: view,
        overall_ratio: 1.0,
        leg_ratio: 1.0,
        arm_ratio: 1.0,
        leg_scale: 1.0,
        arm_scale: 1.0,
        torso_scale: None,
        floor_offset: 0.0,
        height_scale: 1.0,
        eye_height_before: before.eye_height,
        eye_height_after: before.eye_height,
        height_before: before.highest_point - before.lowest_point,
        height_after: before.highest_point - before.lowest_point,
    };

    if !targets.skip_main_rescale {
        let plan = solver::solve(targets, &before)?;
        apply::apply_plan(scene, overrides, &plan)?;
        apply::pose_to_rest(scene);
        report.overall_ratio = plan.overall_ratio;
        report.leg_ratio = plan.leg_ratio;
        report.arm_ratio = plan.arm_ratio;
        report.leg_scale = plan.leg_scale;
        report.arm_scale = plan.arm_scale;
        report.torso_scale = plan.torso_scale;
    }

    if !targets.skip_move_to_floor {
        report.floor_offset = floor::move_to_floor(scene, overrides)?;
    }

    if !targets.skip_height_scaling {
        report.height_scale = floor::scale_to_height(scene, overrides, targets)?;
    }

    if targets.center_model {
        floor::center_model(scene);
    }

    report.eye_height_after = metrology::eye_height(scene, overrides)?;
    report.height_after = metrology::height(scene, overrides)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::basic_avatar;
    use approx::assert_relative_eq;

    #[test]
    fn given_default_targets_when_rescaling_then_floor_height_and_view_all_hold() {
        let mut scene = basic_avatar();
        let overrides = RoleOverrides::new();
        let targets = ProportionTargets::default();

        let report = rescale(&mut scene, &overrides, &targets).unwrap();

        // Feet on the floor, height on target.
        assert_relative_eq!(
            metrology::lowest_point(&scene, &overrides).unwrap(),
            0.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(report.height_after, 1.61, max_relative = 1e-9);

        // The view protocol holds up to the flat view offset, which does
        // not ride along with the final uniform height pass.
        let after = metrology::measure(&scene, &overrides).unwrap();
        let final_view = solver::view_height(
            after.head_to_hand,
            targets.custom_scale_ratio,
            targets.extra_leg_length,
        );
        assert_relative_eq!(
            after.eye_height - after.lowest_point,
            final_view,
            max_relative = 1e-3
        );
    }

    #[test]
    fn given_conforming_avatar_when_rescaling_then_proportions_are_untouched() {
        // Pick the protocol ratio that makes the fixture conform exactly
        // (eye height equals view height), and target its current height.
        let mut scene = basic_avatar();
        let overrides = RoleOverrides::new();
        let targets = ProportionTargets {
            target_height: 1.70,
            custom_scale_ratio: 0.5f64.sqrt() / (1.55 - solver::VIEW_OFFSET),
            ..ProportionTargets::default()
        };

        let first = metrology::measure(&scene, &overrides).unwrap();
        let report = rescale(&mut scene, &overrides, &targets).unwrap();
        let second = metrology::measure(&scene, &overrides).unwrap();

        assert_relative_eq!(report.overall_ratio, 1.0, max_relative = 1e-9);
        assert_relative_eq!(report.height_scale, 1.0, max_relative = 1e-9);
        assert_relative_eq!(second.eye_height, first.eye_height, max_relative = 1e-6);
        assert_relative_eq!(second.leg_length, first.leg_length, max_relative = 1e-6);
        assert_relative_eq!(second.arm_length, first.arm_length, max_relative = 1e-6);
        assert_relative_eq!(second.head_to_hand, first.head_to_hand, max_relative = 1e-6);
        for (a, b) in first.leg_fractions.iter().zip(second.leg_fractions) {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }

        // And a second run stays put as well.
        rescale(&mut scene, &overrides, &targets).unwrap();
        let third = metrology::measure(&scene, &overrides).unwrap();
        assert_relative_eq!(third.eye_height, second.eye_height, max_relative = 1e-6);
        assert_relative_eq!(third.leg_length, second.leg_length, max_relative = 1e-6);
    }

    #[test]
    fn given_all_stages_skipped_when_rescaling_then_scene_is_untouched() {
        let mut scene = basic_avatar();
        let overrides = RoleOverrides::new();
        let targets = ProportionTargets {
            skip_main_rescale: true,
            skip_move_to_floor: true,
            skip_height_scaling: true,
            ..ProportionTargets::default()
        };

        let before = metrology::measure(&scene, &overrides).unwrap();
        let report = rescale(&mut scene, &overrides, &targets).unwrap();
        let after = metrology::measure(&scene, &overrides).unwrap();

        assert_eq!(before, after);
        assert_relative_eq!(report.height_scale, 1.0, epsilon = 1e-12);
        assert_relative_eq!(report.floor_offset, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn given_center_model_when_rescaling_then_armature_lands_on_origin() {
        let mut scene = basic_avatar();
        scene.skeleton.transform.translation.x = 0.7;
        scene.skeleton.transform.translation.y = -0.4;
        let overrides = RoleOverrides::new();
        let targets = ProportionTargets {
            center_model: true,
            ..ProportionTargets::default()
        };

        rescale(&mut scene, &overrides, &targets).unwrap();
        assert_relative_eq!(scene.skeleton.transform.translation.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(scene.skeleton.transform.translation.y, 0.0, epsilon = 1e-12);
    }
}
