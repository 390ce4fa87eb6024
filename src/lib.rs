//! Proportional rescaler for humanoid VR avatars.
//!
//! Given an armature and its skinned meshes, the pipeline in [`rescale`]
//! computes per-limb scale factors so the avatar hits a target height, puts
//! its eyes at the height VRChat derives from arm length (the "arm-to-view"
//! ratio), and stands with its lowest point exactly on the floor plane,
//! all while keeping thigh/calf/foot proportions natural.
//!
//! The crate owns the scene state: build a [`scene::Scene`] from your
//! importer of choice, run [`rescale::rescale`], and read the mutated
//! skeleton/meshes back. Bone identification across naming conventions
//! (`"Left leg"`, `"Leg.L"`, `"thigh_l"`, …) is handled by [`roles`].

mod error;

pub mod align;
pub mod fingers;
pub mod hips;
pub mod rescale;
pub mod roles;
pub mod scene;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::RescaleError;
pub use rescale::types::{ProportionTargets, RescaleReport, ScalePlan, ScaleStrategy};
pub use roles::{Role, RoleOverrides};
pub use scene::{Bone, InheritScale, Mesh, MeshData, Scene, Skeleton};
