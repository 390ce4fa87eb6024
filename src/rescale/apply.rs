//! Writes a [`ScalePlan`] into pose space and bakes pose deformation into
//! the rest pose and mesh data.
//!
//! Application is two distinct steps. `apply_plan` only touches pose
//! transforms and inherit-scale flags; nothing is permanent until
//! `pose_to_rest` evaluates the pose once, pushes the deformation through
//! every mesh (including shape keys) and commits the result as the new
//! rest pose.

use nalgebra::Vector3;

use crate::error::RescaleError;
use crate::rescale::types::ScalePlan;
use crate::roles::{self, RoleOverrides};
use crate::scene::{InheritScale, Mesh, MeshData, PoseEval, Scene, Skeleton, Transform, transform_point};

/// Write the plan's inherit-scale flags and pose scales into the skeleton.
///
/// Flags are forced before any scale: a knee left on FULL inheritance would
/// compound its parent's thigh scale and land the foot in the wrong place,
/// so ordering here is a correctness requirement.
pub fn apply_plan(
    scene: &mut Scene,
    overrides: &RoleOverrides,
    plan: &ScalePlan,
) -> Result<(), RescaleError> {
    for &role in &plan.inherit_none {
        let index = roles::resolve(role, &scene.skeleton, overrides)?;
        scene.skeleton.bone_mut(index).inherit_scale = InheritScale::None;
    }
    for &role in &plan.inherit_full {
        let index = roles::resolve(role, &scene.skeleton, overrides)?;
        scene.skeleton.bone_mut(index).inherit_scale = InheritScale::Full;
    }
    for &(role, scale) in &plan.bone_scales {
        let index = roles::resolve(role, &scene.skeleton, overrides)?;
        scene.skeleton.bone_mut(index).pose.scale = scale;
    }
    Ok(())
}

/// Bake the current pose into the rest pose and every mesh.
///
/// One evaluation snapshot drives all meshes, then the skeleton commit;
/// nothing reads half-updated state.
pub fn pose_to_rest(scene: &mut Scene) {
    let eval = scene.skeleton.evaluate_pose();
    let skeleton = scene.skeleton.clone();
    for mesh in &mut scene.meshes {
        bake_mesh(mesh, &skeleton, &eval);
    }
    scene.skeleton.commit_pose(&eval);
}

/// Per-vertex `(bone index, weight)` influences, resolved from group names.
fn influences(data: &MeshData, skeleton: &Skeleton) -> Vec<Vec<(usize, f64)>> {
    let mut table = vec![Vec::new(); data.vertices.len()];
    for group in &data.groups {
        let Some(bone) = skeleton.bone_index(&group.name) else {
            continue;
        };
        for &(vertex, weight) in &group.weights {
            if weight > 0.0 && vertex < table.len() {
                table[vertex].push((bone, weight));
            }
        }
    }
    table
}

/// Deform one position buffer in place. Weight totals above one are
/// normalized; totals below one leave the un-weighted remainder at the rest
/// position, matching the armature-modifier convention rigs are authored
/// against. Unweighted vertices stay put.
fn deform(
    positions: &mut [Vector3<f64>],
    influences: &[Vec<(usize, f64)>],
    eval: &PoseEval,
    object: &Transform,
) {
    for (index, position) in positions.iter_mut().enumerate() {
        let weights = &influences[index];
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            continue;
        }
        let denom = total.max(1.0);
        let armature_space = object.apply_point(*position);
        let mut blended = ((denom - total) / denom) * armature_space;
        for &(bone, weight) in weights {
            blended += (weight / denom) * transform_point(eval.skin_matrix(bone), armature_space);
        }
        *position = object.invert_point(blended);
    }
}

fn bake_mesh(mesh: &mut Mesh, skeleton: &Skeleton, eval: &PoseEval) {
    let object = mesh.transform;
    let data = mesh.data_mut();
    let table = influences(data, skeleton);

    match data.shape_keys.len() {
        0 => deform(&mut data.vertices, &table, eval, &object),
        1 => {
            // Basis-only key: bake the base buffer as if keyless, then
            // recreate the key empty (in sync) under its original name.
            deform(&mut data.vertices, &table, eval, &object);
            data.shape_keys[0].positions = data.vertices.clone();
        }
        _ => {
            // Each key is deformed in isolation; blending first and
            // deforming after would mix the keys' contributions.
            for key in &mut data.shape_keys {
                deform(&mut key.positions, &table, eval, &object);
            }
            data.vertices = data.shape_keys[0].positions.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::basic_avatar;
    use crate::rescale::{metrology, solver};
    use crate::rescale::types::ProportionTargets;
    use crate::roles::Role;
    use crate::scene::ShapeKey;
    use approx::assert_relative_eq;

    #[test]
    fn given_plan_when_applied_then_flags_and_scales_land_on_bones() {
        let mut scene = basic_avatar();
        let overrides = RoleOverrides::new();
        let m = metrology::measure(&scene, &overrides).unwrap();
        let plan = solver::solve(&ProportionTargets::default(), &m).unwrap();

        apply_plan(&mut scene, &overrides, &plan).unwrap();

        let knee = roles::resolve(Role::LeftKnee, &scene.skeleton, &overrides).unwrap();
        assert_eq!(scene.skeleton.bone(knee).inherit_scale, InheritScale::None);
        let elbow = roles::resolve(Role::LeftElbow, &scene.skeleton, &overrides).unwrap();
        assert_eq!(scene.skeleton.bone(elbow).inherit_scale, InheritScale::Full);

        let leg = roles::resolve(Role::LeftLeg, &scene.skeleton, &overrides).unwrap();
        assert_relative_eq!(
            scene.skeleton.bone(leg).pose.scale.y,
            plan.leg_scale,
            epsilon = 1e-12
        );
    }

    #[test]
    fn given_leg_scale_when_baked_then_soles_and_eyes_move_consistently() {
        let mut scene = basic_avatar();
        let overrides = RoleOverrides::new();
        let m = metrology::measure(&scene, &overrides).unwrap();
        let plan = solver::solve(&ProportionTargets::default(), &m).unwrap();

        apply_plan(&mut scene, &overrides, &plan).unwrap();
        pose_to_rest(&mut scene);

        // Rest pose was rewritten, poses cleared.
        let leg = roles::resolve(Role::LeftLeg, &scene.skeleton, &overrides).unwrap();
        assert_relative_eq!(scene.skeleton.bone(leg).pose.scale.y, 1.0, epsilon = 1e-12);

        // Leg chain length scaled by plan.leg_scale: ankle head dropped from
        // its root by 0.9 * leg_scale.
        let ankle = roles::resolve(Role::LeftAnkle, &scene.skeleton, &overrides).unwrap();
        let root_z = scene.skeleton.bone(leg).head.z;
        assert_relative_eq!(
            root_z - scene.skeleton.bone(ankle).head.z,
            0.9 * plan.leg_scale,
            max_relative = 1e-9
        );

        // Sole vertices (skinned to the ankles) follow the bones: the new
        // lowest point sits one scaled leg below the leg root.
        let lowest = metrology::lowest_point(&scene, &overrides).unwrap();
        assert_relative_eq!(lowest, root_z - plan.leg_scale, epsilon = 1e-9);

        // Eyes themselves do not move yet (the floor pass comes later),
        // but eye height above the new lowest point already honors the leg
        // share of the correction.
        let eye = metrology::eye_height(&scene, &overrides).unwrap();
        assert_relative_eq!(
            eye - lowest,
            m.eye_height / plan.leg_ratio,
            max_relative = 1e-9
        );
    }

    #[test]
    fn given_single_basis_key_when_baked_then_key_is_recreated_in_sync() {
        let mut scene = basic_avatar();
        {
            let data = scene.meshes[0].data_mut();
            data.shape_keys.push(ShapeKey {
                name: "Basis".to_string(),
                positions: data.vertices.clone(),
            });
        }
        let overrides = RoleOverrides::new();
        let m = metrology::measure(&scene, &overrides).unwrap();
        let plan = solver::solve(&ProportionTargets::default(), &m).unwrap();
        apply_plan(&mut scene, &overrides, &plan).unwrap();
        pose_to_rest(&mut scene);

        let data = &scene.meshes[0].data;
        assert_eq!(data.shape_keys.len(), 1);
        assert_eq!(data.shape_keys[0].name, "Basis");
        for (base, key) in data.vertices.iter().zip(&data.shape_keys[0].positions) {
            assert_relative_eq!(base, key, epsilon = 1e-12);
        }
    }

    #[test]
    fn given_multiple_keys_when_baked_then_each_deforms_in_isolation() {
        let mut scene = basic_avatar();
        {
            let data = scene.meshes[0].data_mut();
            let basis = data.vertices.clone();
            let mut smile = basis.clone();
            // Offset a face vertex; it is skinned to the head, which the
            // default plan does not scale, so the offset must survive.
            smile[1].y -= 0.03;
            data.shape_keys.push(ShapeKey {
                name: "Basis".to_string(),
                positions: basis,
            });
            data.shape_keys.push(ShapeKey {
                name: "Smile".to_string(),
                positions: smile,
            });
        }
        let overrides = RoleOverrides::new();
        let m = metrology::measure(&scene, &overrides).unwrap();
        let plan = solver::solve(&ProportionTargets::default(), &m).unwrap();
        apply_plan(&mut scene, &overrides, &plan).unwrap();
        pose_to_rest(&mut scene);

        let data = &scene.meshes[0].data;
        // Base buffer synced to the reference key.
        for (base, key) in data.vertices.iter().zip(&data.shape_keys[0].positions) {
            assert_relative_eq!(base, key, epsilon = 1e-12);
        }
        // The smile offset is preserved relative to the basis.
        let delta = data.shape_keys[1].positions[1] - data.shape_keys[0].positions[1];
        assert_relative_eq!(delta.y, -0.03, max_relative = 1e-9);
        assert_relative_eq!(delta.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn given_partial_weight_when_baked_then_remainder_stays_at_rest() {
        let mut scene = basic_avatar();
        let rest = Vector3::new(0.1, 0.14, 0.0);
        let base = scene.meshes[0].data.vertices.len();
        {
            let data = scene.meshes[0].data_mut();
            data.vertices.push(rest);
            data.vertices.push(rest);
            let group = data
                .groups
                .iter_mut()
                .find(|g| g.name == "Ankle_L")
                .unwrap();
            group.weights.push((base, 1.0));
            group.weights.push((base + 1, 0.5));
        }
        let overrides = RoleOverrides::new();
        let m = metrology::measure(&scene, &overrides).unwrap();
        let plan = solver::solve(&ProportionTargets::default(), &m).unwrap();
        apply_plan(&mut scene, &overrides, &plan).unwrap();
        pose_to_rest(&mut scene);

        // The half-weighted twin lands midway between the fully deformed
        // vertex and its rest position.
        let data = &scene.meshes[0].data;
        let full = data.vertices[base];
        let half = data.vertices[base + 1];
        assert_relative_eq!(half, (full + rest) / 2.0, epsilon = 1e-12);
        // And the deformation was not a no-op.
        assert!((full - rest).norm() > 1e-6);
    }

    #[test]
    fn given_unweighted_vertices_when_baked_then_they_do_not_move() {
        let mut scene = basic_avatar();
        {
            let data = scene.meshes[0].data_mut();
            data.vertices.push(nalgebra::Vector3::new(0.3, 0.3, 0.6));
        }
        let overrides = RoleOverrides::new();
        let m = metrology::measure(&scene, &overrides).unwrap();
        let plan = solver::solve(&ProportionTargets::default(), &m).unwrap();
        apply_plan(&mut scene, &overrides, &plan).unwrap();
        pose_to_rest(&mut scene);

        let stray = scene.meshes[0].data.vertices.last().unwrap();
        assert_relative_eq!(*stray, nalgebra::Vector3::new(0.3, 0.3, 0.6), epsilon = 1e-12);
    }
}
