use std::collections::VecDeque;
use std::sync::Arc;

use nalgebra::{Matrix4, Translation3, UnitQuaternion, Vector3};

// ─── Object-level transform ───────────────────────────────────────────────────

/// Object-level transform: translation plus per-axis scale. Avatars are
/// processed upright, so object rotation is not modeled (bone-level rotation
/// is, see [`PoseTransform`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f64>,
    pub scale: Vector3<f64>,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Map a local point into this transform's parent space.
    pub fn apply_point(&self, point: Vector3<f64>) -> Vector3<f64> {
        self.translation + self.scale.component_mul(&point)
    }

    /// Map a parent-space point back into local space. Scale axes must be
    /// non-zero.
    pub fn invert_point(&self, point: Vector3<f64>) -> Vector3<f64> {
        (point - self.translation).component_div(&self.scale)
    }

    /// Compose with a child transform: `self ∘ child`.
    pub fn compose(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.apply_point(child.translation),
            scale: self.scale.component_mul(&child.scale),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

// ─── Bones ────────────────────────────────────────────────────────────────────

/// Whether a bone's pose scale is multiplied by its parent's accumulated
/// scale when evaluating world-space position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InheritScale {
    Full,
    None,
}

/// Pose-space transform applied on top of a bone's rest pose.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseTransform {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
}

impl PoseTransform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Bone-local basis matrix: `T · R · S`.
    pub(crate) fn basis_matrix(&self) -> Matrix4<f64> {
        Translation3::from(self.translation).to_homogeneous()
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }
}

impl Default for PoseTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// One bone of an armature. Rest head/tail are stored in armature space
/// (edit-bone convention); the bone's local +Y axis runs head → tail.
#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    pub head: Vector3<f64>,
    pub tail: Vector3<f64>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub pose: PoseTransform,
    pub inherit_scale: InheritScale,
}

impl Bone {
    pub fn rest_length(&self) -> f64 {
        (self.tail - self.head).norm()
    }

    /// Unit direction head → tail; +Y for degenerate (zero-length) bones.
    pub fn rest_direction(&self) -> Vector3<f64> {
        let delta = self.tail - self.head;
        let len = delta.norm();
        if len <= f64::EPSILON {
            Vector3::y()
        } else {
            delta / len
        }
    }

    /// Rest-frame rotation taking the bone-local +Y axis onto the bone
    /// direction. Roll is chosen canonically; only direction matters for
    /// length/position math.
    fn rest_rotation(&self) -> UnitQuaternion<f64> {
        let dir = self.rest_direction();
        UnitQuaternion::rotation_between(&Vector3::y(), &dir).unwrap_or_else(|| {
            // Antiparallel: flip around X.
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI)
        })
    }

    /// Armature-space rest matrix (origin at the head, +Y along the bone).
    fn rest_matrix(&self) -> Matrix4<f64> {
        Translation3::from(self.head).to_homogeneous() * self.rest_rotation().to_homogeneous()
    }
}

// ─── Skeleton ─────────────────────────────────────────────────────────────────

/// A rooted bone tree plus the armature object's own transform.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub name: String,
    pub transform: Transform,
    bones: Vec<Bone>,
}

impl Skeleton {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            bones: Vec::new(),
        }
    }

    /// Append a bone; parent (when given) must already exist, which keeps
    /// the tree acyclic by construction.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        head: [f64; 3],
        tail: [f64; 3],
        parent: Option<usize>,
    ) -> usize {
        let index = self.bones.len();
        if let Some(parent_index) = parent {
            assert!(parent_index < index, "bone parent must be added first");
            self.bones[parent_index].children.push(index);
        }
        self.bones.push(Bone {
            name: name.into(),
            head: Vector3::from(head),
            tail: Vector3::from(tail),
            parent,
            children: Vec::new(),
            pose: PoseTransform::identity(),
            inherit_scale: InheritScale::Full,
        });
        index
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> &Bone {
        &self.bones[index]
    }

    pub fn bone_mut(&mut self, index: usize) -> &mut Bone {
        &mut self.bones[index]
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    pub fn roots(&self) -> Vec<usize> {
        (0..self.bones.len())
            .filter(|&index| self.bones[index].parent.is_none())
            .collect()
    }

    /// BFS order with parents before children.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.bones.len());
        let mut queue: VecDeque<usize> = self.roots().into();
        while let Some(index) = queue.pop_front() {
            order.push(index);
            queue.extend(self.bones[index].children.iter().copied());
        }
        order
    }

    /// `start` plus every bone below it.
    pub fn subtree(&self, start: usize) -> Vec<usize> {
        let mut collected = Vec::new();
        let mut stack = vec![start];
        while let Some(index) = stack.pop() {
            collected.push(index);
            stack.extend(self.bones[index].children.iter().copied());
        }
        collected
    }

    /// Reset every pose transform to identity.
    pub fn reset_pose(&mut self) {
        for bone in &mut self.bones {
            bone.pose = PoseTransform::identity();
        }
    }

    /// Evaluate the current pose into per-bone armature-space matrices.
    ///
    /// This is the synchronous "evaluate and read back" barrier: callers
    /// write pose transforms, evaluate once, and read positions or deform
    /// meshes from the snapshot. Inherit-scale `None` strips the parent
    /// chain's accumulated scale (column normalization) while keeping the
    /// inherited position, so connected chains still follow their parents.
    pub fn evaluate_pose(&self) -> PoseEval {
        let count = self.bones.len();
        let mut pose_matrices = vec![Matrix4::identity(); count];
        let mut skin_matrices = vec![Matrix4::identity(); count];

        for index in self.topological_order() {
            let bone = &self.bones[index];
            let rest = bone.rest_matrix();

            let mut accumulated = match bone.parent {
                Some(parent) => {
                    let parent_rest_inv = self.bones[parent]
                        .rest_matrix()
                        .try_inverse()
                        .unwrap_or_else(Matrix4::identity);
                    pose_matrices[parent] * parent_rest_inv * rest
                }
                None => rest,
            };

            if bone.inherit_scale == InheritScale::None && bone.parent.is_some() {
                accumulated = strip_scale(&accumulated);
            }

            pose_matrices[index] = accumulated * bone.pose.basis_matrix();
            skin_matrices[index] = pose_matrices[index]
                * rest.try_inverse().unwrap_or_else(Matrix4::identity);
        }

        let lengths = self.bones.iter().map(Bone::rest_length).collect();
        PoseEval {
            pose_matrices,
            skin_matrices,
            lengths,
        }
    }

    /// Commit the evaluated pose as the new rest pose and clear all pose
    /// transforms back to identity. Mesh data must be deformed from the
    /// same evaluation before calling this.
    pub fn commit_pose(&mut self, eval: &PoseEval) {
        for index in 0..self.bones.len() {
            let head = eval.head(index);
            let tail = eval.tail(index);
            let bone = &mut self.bones[index];
            bone.head = head;
            bone.tail = tail;
        }
        self.reset_pose();
    }
}

/// Remove scale from the rotation part of an affine matrix by normalizing
/// its basis columns; translation is untouched.
fn strip_scale(matrix: &Matrix4<f64>) -> Matrix4<f64> {
    let mut stripped = *matrix;
    for column in 0..3 {
        let axis = Vector3::new(matrix[(0, column)], matrix[(1, column)], matrix[(2, column)]);
        let len = axis.norm();
        if len > f64::EPSILON {
            stripped[(0, column)] = axis.x / len;
            stripped[(1, column)] = axis.y / len;
            stripped[(2, column)] = axis.z / len;
        }
    }
    stripped
}

// ─── Pose evaluation snapshot ─────────────────────────────────────────────────

/// Read-back snapshot of an evaluated pose.
#[derive(Debug, Clone)]
pub struct PoseEval {
    pose_matrices: Vec<Matrix4<f64>>,
    skin_matrices: Vec<Matrix4<f64>>,
    lengths: Vec<f64>,
}

impl PoseEval {
    pub fn matrix(&self, index: usize) -> &Matrix4<f64> {
        &self.pose_matrices[index]
    }

    /// Armature-space deformation matrix for vertices weighted to `index`.
    pub fn skin_matrix(&self, index: usize) -> &Matrix4<f64> {
        &self.skin_matrices[index]
    }

    /// Posed head position in armature space.
    pub fn head(&self, index: usize) -> Vector3<f64> {
        transform_point(&self.pose_matrices[index], Vector3::zeros())
    }

    /// Posed tail position in armature space.
    pub fn tail(&self, index: usize) -> Vector3<f64> {
        transform_point(
            &self.pose_matrices[index],
            Vector3::new(0.0, self.lengths[index], 0.0),
        )
    }

    /// Posed bone orientation with accumulated scale removed.
    pub fn rotation(&self, index: usize) -> UnitQuaternion<f64> {
        let stripped = strip_scale(&self.pose_matrices[index]);
        let rotation = nalgebra::Rotation3::from_matrix_unchecked(
            stripped.fixed_view::<3, 3>(0, 0).into_owned(),
        );
        UnitQuaternion::from_rotation_matrix(&rotation)
    }
}

/// Affine point transform for 4×4 matrices.
pub(crate) fn transform_point(matrix: &Matrix4<f64>, point: Vector3<f64>) -> Vector3<f64> {
    let homogeneous = matrix * point.push(1.0);
    homogeneous.xyz()
}

// ─── Meshes ───────────────────────────────────────────────────────────────────

/// Sparse per-vertex weights for one named group. Group names matching bone
/// names drive skinning.
#[derive(Debug, Clone)]
pub struct VertexGroup {
    pub name: String,
    /// `(vertex index, weight)` with weight in (0, 1].
    pub weights: Vec<(usize, f64)>,
}

/// Named alternate vertex-position set blended at evaluation time. The
/// first key of a mesh is the reference ("basis") key and must stay in sync
/// with the base vertex buffer.
#[derive(Debug, Clone)]
pub struct ShapeKey {
    pub name: String,
    pub positions: Vec<Vector3<f64>>,
}

/// Vertex-level mesh data, possibly shared between several mesh objects.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vector3<f64>>,
    pub groups: Vec<VertexGroup>,
    pub shape_keys: Vec<ShapeKey>,
}

impl MeshData {
    /// Positions used for measurement: the synchronized reference shape key
    /// when present, the base vertex buffer otherwise.
    pub fn measure_positions(&self) -> &[Vector3<f64>] {
        self.shape_keys
            .first()
            .map(|key| key.positions.as_slice())
            .unwrap_or(&self.vertices)
    }
}

/// A mesh object parented to the armature. `transform` is relative to the
/// armature object, so moving the armature moves every mesh with it.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub transform: Transform,
    pub data: Arc<MeshData>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, data: MeshData) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            data: Arc::new(data),
        }
    }

    /// Mutable access with copy-on-write: shared (multi-user) data gets a
    /// private copy before any mutation, so sibling objects are never
    /// corrupted.
    pub fn data_mut(&mut self) -> &mut MeshData {
        Arc::make_mut(&mut self.data)
    }
}

// ─── Scene ────────────────────────────────────────────────────────────────────

/// One avatar: a skeleton and the meshes parented to it.
#[derive(Debug, Clone)]
pub struct Scene {
    pub skeleton: Skeleton,
    pub meshes: Vec<Mesh>,
}

impl Scene {
    pub fn new(skeleton: Skeleton) -> Self {
        Self {
            skeleton,
            meshes: Vec::new(),
        }
    }

    /// World-space transform of a mesh (armature ∘ mesh).
    pub fn mesh_world(&self, mesh_index: usize) -> Transform {
        self.skeleton
            .transform
            .compose(&self.meshes[mesh_index].transform)
    }
}
