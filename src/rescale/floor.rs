//! Floor and origin normalization plus the final uniform height pass.

use crate::error::RescaleError;
use crate::rescale::metrology;
use crate::rescale::types::ProportionTargets;
use crate::roles::RoleOverrides;
use crate::scene::Scene;

/// Drop the rig so its lowest point sits on z = 0 and rebase every object's
/// origin to the floor plane. Returns the applied drop.
///
/// The drop moves only the armature transform; meshes follow through
/// parenting. The origin rebase then shifts local geometry the opposite
/// way, so nothing moves in world space but every origin ends at z = 0.
/// Shared mesh data is copied per object before the shift.
pub fn move_to_floor(scene: &mut Scene, overrides: &RoleOverrides) -> Result<f64, RescaleError> {
    let dz = metrology::lowest_point(scene, overrides)?;
    scene.skeleton.transform.translation.z -= dz;

    for mesh_index in 0..scene.meshes.len() {
        let world = scene.mesh_world(mesh_index);
        let offset = world.translation.z / world.scale.z;
        let mesh = &mut scene.meshes[mesh_index];
        let data = mesh.data_mut();
        for vertex in &mut data.vertices {
            vertex.z += offset;
        }
        for key in &mut data.shape_keys {
            for position in &mut key.positions {
                position.z += offset;
            }
        }
        mesh.transform.translation.z = 0.0;
    }

    let armature = scene.skeleton.transform;
    let bone_offset = armature.translation.z / armature.scale.z;
    for index in 0..scene.skeleton.bones().len() {
        let bone = scene.skeleton.bone_mut(index);
        bone.head.z += bone_offset;
        bone.tail.z += bone_offset;
    }
    scene.skeleton.transform.translation.z = 0.0;

    Ok(dz)
}

/// Uniformly scale the rig to the target height and fold the object scales
/// back into geometry, leaving every transform scale at 1. Returns the
/// applied factor.
///
/// With `scale_to_eyes` the measured "height" is eye level above the
/// lowest point rather than the highest vertex.
pub fn scale_to_height(
    scene: &mut Scene,
    overrides: &RoleOverrides,
    targets: &ProportionTargets,
) -> Result<f64, RescaleError> {
    let lowest = metrology::lowest_point(scene, overrides)?;
    let measured = if targets.scale_to_eyes {
        metrology::eye_height(scene, overrides)? - lowest
    } else {
        metrology::highest_point(scene)? - lowest
    };
    if !(measured > f64::EPSILON) {
        return Err(RescaleError::DegenerateProportions {
            context: "measured height is zero",
        });
    }
    let ratio = targets.target_height / measured;
    scene.skeleton.transform.scale *= ratio;
    apply_rig_scale(scene);
    Ok(ratio)
}

/// Fold object-level scales into local geometry ("apply scale"): bones and
/// vertices absorb the accumulated scale, transforms return to 1, world
/// positions are unchanged.
pub fn apply_rig_scale(scene: &mut Scene) {
    let armature_scale = scene.skeleton.transform.scale;
    for index in 0..scene.skeleton.bones().len() {
        let bone = scene.skeleton.bone_mut(index);
        bone.head = armature_scale.component_mul(&bone.head);
        bone.tail = armature_scale.component_mul(&bone.tail);
    }
    scene.skeleton.transform.scale.fill(1.0);

    for mesh in &mut scene.meshes {
        let total = armature_scale.component_mul(&mesh.transform.scale);
        let data = mesh.data_mut();
        for vertex in &mut data.vertices {
            *vertex = total.component_mul(vertex);
        }
        for key in &mut data.shape_keys {
            for position in &mut key.positions {
                *position = total.component_mul(position);
            }
        }
        // Child locations live in parent space, so they rescale too.
        mesh.transform.translation = armature_scale.component_mul(&mesh.transform.translation);
        mesh.transform.scale.fill(1.0);
    }
}

/// Zero the armature's world X/Y, leaving height alone.
pub fn center_model(scene: &mut Scene) {
    scene.skeleton.transform.translation.x = 0.0;
    scene.skeleton.transform.translation.y = 0.0;
}
