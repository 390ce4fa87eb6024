//! Armature alignment: move one skeleton's bones onto a reference skeleton
//! by pairing bones through semantic roles, not literal names.

use std::collections::HashMap;

use nalgebra::Vector3;

use crate::roles::{self, Role, RoleOverrides};
use crate::scene::{Skeleton, transform_point};

/// Write pose translations that put every role-paired bone head of
/// `skeleton` onto its counterpart in `reference`, recursing from the
/// roots. A subtree whose starting head already deviates from its target
/// by more than `tolerance` is left alone entirely, as a guard against
/// dragging a structurally different rig into a pose that only gets worse
/// further down the chain.
///
/// The pose is left unbaked so the caller can inspect or discard it.
pub fn align_skeleton(
    skeleton: &mut Skeleton,
    overrides: &RoleOverrides,
    reference: &Skeleton,
    reference_overrides: &RoleOverrides,
    tolerance: f64,
) {
    let targets = reference_heads(reference, reference_overrides);
    let own_roles = roles::role_map(skeleton, overrides);

    for root in skeleton.roots() {
        align_subtree(skeleton, root, &own_roles, &targets, tolerance);
    }
}

/// World head position per role of the reference skeleton.
fn reference_heads(
    reference: &Skeleton,
    overrides: &RoleOverrides,
) -> HashMap<Role, Vector3<f64>> {
    let mut heads = HashMap::new();
    for (index, role) in roles::role_map(reference, overrides) {
        let head = reference.transform.apply_point(reference.bone(index).head);
        heads.insert(role, head);
    }
    heads
}

fn align_subtree(
    skeleton: &mut Skeleton,
    index: usize,
    own_roles: &HashMap<usize, Role>,
    targets: &HashMap<Role, Vector3<f64>>,
    tolerance: f64,
) {
    if let Some(target) = own_roles.get(&index).and_then(|role| targets.get(role)) {
        // Parents already moved, so evaluate fresh for every bone.
        let eval = skeleton.evaluate_pose();
        let current = skeleton.transform.apply_point(eval.head(index));
        if (current - target).norm() > tolerance {
            return;
        }

        // Pose translation lives in the pre-basis bone frame: strip the
        // bone's own basis off the accumulated matrix, then pull the
        // target back through what remains.
        let local_target = skeleton.transform.invert_point(*target);
        let basis = skeleton.bone(index).pose.basis_matrix();
        let pre_basis = match basis.try_inverse() {
            Some(basis_inverse) => eval.matrix(index) * basis_inverse,
            None => return,
        };
        if let Some(inverse) = pre_basis.try_inverse() {
            let translation = transform_point(&inverse, local_target);
            skeleton.bone_mut(index).pose.translation = translation;
        }
    }

    let children = skeleton.bone(index).children.clone();
    for child in children {
        align_subtree(skeleton, child, own_roles, targets, tolerance);
    }
}
