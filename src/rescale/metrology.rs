//! World-space measurements over the rest pose: vertex extremes, eye
//! height, arm/leg lengths and leg segment proportions.
//!
//! All vertex scans run over the synchronized reference shape key when one
//! exists, and prune whole meshes by their axis-aligned bounding box before
//! transforming individual vertices. The pruning is exactness-preserving: a
//! bounding box always bounds its vertices, so skipping a mesh whose box
//! cannot beat the current best never changes the result. Object transforms
//! carry no rotation, so the box bound here is in fact exact and at most
//! the best-bounded meshes get a world-space rescan.

use std::collections::HashSet;

use nalgebra::Vector3;

use crate::error::RescaleError;
use crate::roles::{self, Role, RoleOverrides};
use crate::scene::Scene;

/// Everything the solver needs, measured once up front.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyMeasurements {
    pub lowest_point: f64,
    pub highest_point: f64,
    /// Average world z of the two eye bone heads.
    pub eye_height: f64,
    /// Head-bone head to synthetic T-pose hand position.
    pub head_to_hand: f64,
    /// Straightened arm length (upper arm + forearm).
    pub arm_length: f64,
    /// Vertical drop from the head bone to the shoulder joint.
    pub neck_length: f64,
    /// Leg root to lowest point.
    pub leg_length: f64,
    /// `[0, f_knee, f_ankle, 1]` fractions of `leg_length`.
    pub leg_fractions: [f64; 4],
    /// Spine head to neck head span, when both roles resolve. Drives the
    /// torso-absorbing strategy.
    pub torso_length: Option<f64>,
}

/// Measure the whole body in one pass.
pub fn measure(scene: &Scene, overrides: &RoleOverrides) -> Result<BodyMeasurements, RescaleError> {
    let lowest = lowest_point(scene, overrides)?;
    let highest = highest_point(scene)?;
    let eye = eye_height(scene, overrides)?;
    let arm = arm_length(scene, overrides)?;
    let head_hand = head_to_hand(scene, overrides)?;
    let (leg_fractions, leg_length) = leg_proportions(scene, overrides)?;

    let head = bone_head(scene, Role::Head, overrides)?;
    let shoulder = bone_head(scene, Role::RightArm, overrides)?;
    let neck_length = (head.z - shoulder.z).abs();

    let torso_length = match (
        roles::resolve(Role::Spine, &scene.skeleton, overrides),
        roles::resolve(Role::Neck, &scene.skeleton, overrides),
    ) {
        (Ok(spine), Ok(neck)) => {
            let spine_z = world_point(scene, scene.skeleton.bone(spine).head).z;
            let neck_z = world_point(scene, scene.skeleton.bone(neck).head).z;
            Some(neck_z - spine_z)
        }
        _ => None,
    };

    Ok(BodyMeasurements {
        lowest_point: lowest,
        highest_point: highest,
        eye_height: eye,
        head_to_hand: head_hand,
        arm_length: arm,
        neck_length,
        leg_length,
        leg_fractions,
        torso_length,
    })
}

// ─── Vertex extremes ──────────────────────────────────────────────────────────

/// World-space maximum z over every vertex of every mesh.
pub fn highest_point(scene: &Scene) -> Result<f64, RescaleError> {
    extreme_z(scene, Direction::Highest)
}

/// World-space minimum z, preferring vertices skinned to the foot subtree.
///
/// Whenever any vertex anywhere carries positive weight in a group named
/// after an ankle bone or one of its descendants, only such vertices
/// compete; skirts and capes hanging below the soles are ignored. Without
/// any foot weighting the global minimum wins.
pub fn lowest_point(scene: &Scene, overrides: &RoleOverrides) -> Result<f64, RescaleError> {
    let foot_names = foot_bone_names(scene, overrides);
    if !foot_names.is_empty() {
        if let Some(z) = foot_weighted_minimum(scene, &foot_names) {
            return Ok(z);
        }
    }
    extreme_z(scene, Direction::Lowest)
}

/// Highest minus lowest.
pub fn height(scene: &Scene, overrides: &RoleOverrides) -> Result<f64, RescaleError> {
    Ok(highest_point(scene)? - lowest_point(scene, overrides)?)
}

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Highest,
    Lowest,
}

/// Bounding-box-pruned extreme scan over every mesh.
fn extreme_z(scene: &Scene, direction: Direction) -> Result<f64, RescaleError> {
    struct Candidate {
        mesh: usize,
        bound: f64,
    }

    let mut candidates = Vec::new();
    for (mesh_index, mesh) in scene.meshes.iter().enumerate() {
        let positions = mesh.data.measure_positions();
        if positions.is_empty() {
            continue;
        }
        // Local z range, no transforms. World z is affine in local z
        // (translation plus axis-aligned scale, possibly negative), so the
        // transformed range ends bound the whole mesh.
        let mut low = f64::INFINITY;
        let mut high = f64::NEG_INFINITY;
        for position in positions {
            low = low.min(position.z);
            high = high.max(position.z);
        }
        let world = scene.mesh_world(mesh_index);
        let a = world.translation.z + world.scale.z * low;
        let b = world.translation.z + world.scale.z * high;
        candidates.push(Candidate {
            mesh: mesh_index,
            bound: pick(direction, a, b),
        });
    }
    if candidates.is_empty() {
        return Err(RescaleError::NoMeshData);
    }

    // Best-bound first, so later meshes can be skipped wholesale.
    candidates.sort_by(|a, b| match direction {
        Direction::Highest => b.bound.total_cmp(&a.bound),
        Direction::Lowest => a.bound.total_cmp(&b.bound),
    });

    let mut best = seed(direction);
    for candidate in &candidates {
        if best != seed(direction) && !beats(direction, candidate.bound, best) {
            break;
        }
        let mesh = &scene.meshes[candidate.mesh];
        let world = scene.mesh_world(candidate.mesh);
        for position in mesh.data.measure_positions() {
            best = pick(direction, best, world.apply_point(*position).z);
        }
    }
    Ok(best)
}

fn seed(direction: Direction) -> f64 {
    match direction {
        Direction::Highest => f64::NEG_INFINITY,
        Direction::Lowest => f64::INFINITY,
    }
}

fn pick(direction: Direction, a: f64, b: f64) -> f64 {
    match direction {
        Direction::Highest => a.max(b),
        Direction::Lowest => a.min(b),
    }
}

fn beats(direction: Direction, bound: f64, best: f64) -> bool {
    match direction {
        Direction::Highest => bound > best,
        Direction::Lowest => bound < best,
    }
}

/// Names of both ankle bones and everything below them. Empty when neither
/// ankle role resolves.
fn foot_bone_names(scene: &Scene, overrides: &RoleOverrides) -> HashSet<String> {
    let mut names = HashSet::new();
    for role in [Role::LeftAnkle, Role::RightAnkle] {
        if let Ok(index) = roles::resolve(role, &scene.skeleton, overrides) {
            for bone in scene.skeleton.subtree(index) {
                names.insert(scene.skeleton.bone(bone).name.clone());
            }
        }
    }
    names
}

fn foot_weighted_minimum(scene: &Scene, foot_names: &HashSet<String>) -> Option<f64> {
    let mut subsets: Vec<Vec<usize>> = Vec::with_capacity(scene.meshes.len());
    let mut any = false;
    for mesh in &scene.meshes {
        let mut indices: Vec<usize> = mesh
            .data
            .groups
            .iter()
            .filter(|group| foot_names.contains(&group.name))
            .flat_map(|group| group.weights.iter())
            .filter(|(_, weight)| *weight > 0.0)
            .map(|(vertex, _)| *vertex)
            .collect();
        indices.sort_unstable();
        indices.dedup();
        any |= !indices.is_empty();
        subsets.push(indices);
    }
    if !any {
        return None;
    }

    let mut best = f64::INFINITY;
    for (mesh_index, indices) in subsets.iter().enumerate() {
        let world = scene.mesh_world(mesh_index);
        let positions = scene.meshes[mesh_index].data.measure_positions();
        for &index in indices {
            // Group entries can outlive vertex deletions; stale indices
            // don't count.
            if index < positions.len() {
                best = best.min(world.apply_point(positions[index]).z);
            }
        }
    }
    best.is_finite().then_some(best)
}

/// Naive unpruned scan, kept next to the optimized one so equivalence is
/// testable.
#[cfg(test)]
fn extreme_z_naive(scene: &Scene, direction: Direction) -> Result<f64, RescaleError> {
    let mut best = seed(direction);
    let mut any = false;
    for (mesh_index, mesh) in scene.meshes.iter().enumerate() {
        let world = scene.mesh_world(mesh_index);
        for position in mesh.data.measure_positions() {
            best = pick(direction, best, world.apply_point(*position).z);
            any = true;
        }
    }
    if any { Ok(best) } else { Err(RescaleError::NoMeshData) }
}

// ─── Bone-derived lengths ─────────────────────────────────────────────────────

fn world_point(scene: &Scene, point: Vector3<f64>) -> Vector3<f64> {
    scene.skeleton.transform.apply_point(point)
}

fn bone_head(
    scene: &Scene,
    role: Role,
    overrides: &RoleOverrides,
) -> Result<Vector3<f64>, RescaleError> {
    let index = roles::resolve(role, &scene.skeleton, overrides)?;
    Ok(world_point(scene, scene.skeleton.bone(index).head))
}

fn world_bone_length(scene: &Scene, index: usize) -> f64 {
    let bone = scene.skeleton.bone(index);
    let span = bone.tail - bone.head;
    scene.skeleton.transform.scale.component_mul(&span).norm()
}

/// Average world z of the eye bone heads.
pub fn eye_height(scene: &Scene, overrides: &RoleOverrides) -> Result<f64, RescaleError> {
    let mut sum = 0.0;
    for role in [Role::LeftEye, Role::RightEye] {
        let index = roles::resolve(role, &scene.skeleton, overrides)
            .map_err(|_| RescaleError::EyeBonesMissing { missing: role })?;
        sum += world_point(scene, scene.skeleton.bone(index).head).z;
    }
    Ok(sum / 2.0)
}

/// Straightened arm length: upper arm plus forearm, right side (assumed
/// symmetric with the left).
pub fn arm_length(scene: &Scene, overrides: &RoleOverrides) -> Result<f64, RescaleError> {
    let upper = roles::resolve(Role::RightArm, &scene.skeleton, overrides)?;
    let lower = roles::resolve(Role::RightElbow, &scene.skeleton, overrides)?;
    Ok(world_bone_length(scene, upper) + world_bone_length(scene, lower))
}

/// Head-to-hand length the view protocol is driven by. The arm may hang in
/// any pose, so the hand position is synthesized: the straightened arm laid
/// flat along −X from the right shoulder (T-pose convention).
pub fn head_to_hand(scene: &Scene, overrides: &RoleOverrides) -> Result<f64, RescaleError> {
    let head = bone_head(scene, Role::Head, overrides)?;
    let shoulder = bone_head(scene, Role::RightArm, overrides)?;
    let arm = arm_length(scene, overrides)?;
    let hand = Vector3::new(shoulder.x - arm, shoulder.y, shoulder.z);
    Ok((head - hand).norm())
}

/// Leg root height above the lowest point (legs assumed symmetric).
pub fn leg_length(scene: &Scene, overrides: &RoleOverrides) -> Result<f64, RescaleError> {
    let leg = bone_head(scene, Role::LeftLeg, overrides)?;
    Ok(leg.z - lowest_point(scene, overrides)?)
}

/// Normalized leg landmarks: fractions of the total (leg root → lowest
/// point) consumed down to the knee and ankle, plus the absolute total.
/// Always `[0, f_knee, f_ankle, 1]` for a sane rig.
pub fn leg_proportions(
    scene: &Scene,
    overrides: &RoleOverrides,
) -> Result<([f64; 4], f64), RescaleError> {
    let pair_z = |left: Role, right: Role| -> Result<f64, RescaleError> {
        Ok((bone_head(scene, left, overrides)?.z + bone_head(scene, right, overrides)?.z) / 2.0)
    };
    let root = pair_z(Role::LeftLeg, Role::RightLeg)?;
    let knee = pair_z(Role::LeftKnee, Role::RightKnee)?;
    let ankle = pair_z(Role::LeftAnkle, Role::RightAnkle)?;
    let floor = lowest_point(scene, overrides)?;

    let total = root - floor;
    if !(total > f64::EPSILON) {
        return Err(RescaleError::DegenerateProportions {
            context: "leg root is at or below the lowest point",
        });
    }
    let fraction = |z: f64| (root - z) / total;
    Ok(([0.0, fraction(knee), fraction(ankle), 1.0], total))
}
