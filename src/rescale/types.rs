use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::roles::Role;

// ─── Configuration ────────────────────────────────────────────────────────────

/// How the overall rescale factor is allocated between legs and arms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScaleStrategy {
    /// Split the factor exponentially: legs take `R^arm_to_legs`, arms the
    /// remainder, so the two ratios always multiply back to `R`.
    RelativeSplit {
        /// Fraction of the correction pushed into the legs, in [0, 1].
        /// 1.0 scales only legs, 0.0 only arms.
        arm_to_legs: f64,
    },
    /// Solve the leg scale so the final eye-to-leg-root over
    /// leg-root-to-floor split matches `upper_body_fraction`, then size the
    /// arms (or, with `keep_head_size`, the torso) to restore the view
    /// match.
    UpperBodyTarget {
        /// Target fraction of eye height occupied by the upper body.
        upper_body_fraction: f64,
        /// Grow/shrink spine and chest instead of the arms, leaving head
        /// and arm proportions untouched.
        keep_head_size: bool,
    },
}

/// Target proportions and toggles for one rescale run.
///
/// Defaults mirror typical VRChat-friendly values; `custom_scale_ratio` is
/// the protocol constant relating head-to-hand length to perceived eye
/// height and should only change if the avatar is uploaded with a matching
/// custom ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProportionTargets {
    /// Final avatar height in meters (crown, or eyes with `scale_to_eyes`).
    pub target_height: f64,
    /// Measure the height pass against eye level instead of the highest
    /// vertex.
    pub scale_to_eyes: bool,
    pub strategy: ScaleStrategy,
    /// Arm thickness retention in [0, 1]: 1 keeps current thickness, 0
    /// follows the length change fully.
    pub arm_thickness: f64,
    /// Leg thickness retention in [0, 1].
    pub leg_thickness: f64,
    /// Thigh share of the redistributable leg length when the foot is held
    /// at its absolute size.
    pub thigh_percentage: f64,
    /// VRChat arm-to-view protocol constant (`--custom-arm-ratio`).
    pub custom_scale_ratio: f64,
    /// Raises the perceived viewpoint, effectively sinking the avatar's
    /// legs below the floor by this many meters.
    pub extra_leg_length: f64,
    /// Scale hands along with the arms; off keeps hand size by applying
    /// the inverse arm scale at the wrist.
    pub scale_hand: bool,
    /// Keep the foot's absolute length and redistribute the leg change
    /// across thigh and calf only.
    pub scale_foot: bool,
    /// Zero the armature's world X/Y at the end of the run.
    pub center_model: bool,
    /// Stage toggles, for debugging a single pass in isolation.
    pub skip_main_rescale: bool,
    pub skip_move_to_floor: bool,
    pub skip_height_scaling: bool,
}

impl Default for ProportionTargets {
    fn default() -> Self {
        Self {
            target_height: 1.61,
            scale_to_eyes: false,
            strategy: ScaleStrategy::RelativeSplit { arm_to_legs: 0.55 },
            arm_thickness: 0.5,
            leg_thickness: 0.5,
            thigh_percentage: 0.53,
            custom_scale_ratio: 0.4537,
            extra_leg_length: 0.0,
            scale_hand: false,
            scale_foot: false,
            center_model: false,
            skip_main_rescale: false,
            skip_move_to_floor: false,
            skip_height_scaling: false,
        }
    }
}

impl Default for ScaleStrategy {
    fn default() -> Self {
        ScaleStrategy::RelativeSplit { arm_to_legs: 0.55 }
    }
}

// ─── Solver output ────────────────────────────────────────────────────────────

/// Pure description of the pose changes one rescale needs: which bones get
/// which pose scale, and which inherit-scale flags must be forced first.
/// Nothing here touches a scene; application is a separate stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalePlan {
    /// Pose scale per role, in bone-local axes (Y along the bone).
    pub bone_scales: Vec<(Role, Vector3<f64>)>,
    /// Roles forced to `InheritScale::None` before any scale is written.
    pub inherit_none: Vec<Role>,
    /// Roles forced to `InheritScale::Full` before any scale is written.
    pub inherit_full: Vec<Role>,
    /// Overall eye-height over view-height factor `R`.
    pub overall_ratio: f64,
    /// Share of `R` corrected through the legs.
    pub leg_ratio: f64,
    /// Share of `R` corrected through the arms.
    pub arm_ratio: f64,
    /// Length factor applied to the leg chain.
    pub leg_scale: f64,
    /// Length factor applied to the upper arm and forearm.
    pub arm_scale: f64,
    /// Uniform spine scale when the torso absorbs the correction.
    pub torso_scale: Option<f64>,
}

// ─── Reporting ────────────────────────────────────────────────────────────────

/// Summary of one pipeline run: the numbers a caller would otherwise have
/// to re-measure, before/after.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RescaleReport {
    /// Perceived in-application eye height derived from arm length.
    pub view_height: f64,
    pub overall_ratio: f64,
    pub leg_ratio: f64,
    pub arm_ratio: f64,
    pub leg_scale: f64,
    pub arm_scale: f64,
    pub torso_scale: Option<f64>,
    /// How far the rig was dropped to put its lowest point on the floor.
    pub floor_offset: f64,
    /// Uniform factor of the final height pass.
    pub height_scale: f64,
    pub eye_height_before: f64,
    pub eye_height_after: f64,
    pub height_before: f64,
    pub height_after: f64,
}
