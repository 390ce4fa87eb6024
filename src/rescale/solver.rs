//! Closed-form scale solve: turns measurements plus targets into a
//! [`ScalePlan`] without touching any scene state.
//!
//! The driving relation is VRChat's arm-to-view protocol: the perceived
//! eye height is `head_to_hand / custom_ratio + 0.005`. Everything here
//! exists to make the avatar's real eye height land on that number while
//! keeping the limbs looking like they belong to the same body.

use nalgebra::Vector3;

use crate::error::RescaleError;
use crate::rescale::metrology::BodyMeasurements;
use crate::rescale::types::{ProportionTargets, ScalePlan, ScaleStrategy};
use crate::roles::Role;

/// Offset of the view position above the synthetic hand-derived height.
/// Protocol constant, exact.
pub const VIEW_OFFSET: f64 = 0.005;

const EPS: f64 = 1e-9;

/// Perceived in-application eye height for a given head-to-hand length.
pub fn view_height(head_to_hand: f64, custom_ratio: f64, extra_leg_length: f64) -> f64 {
    head_to_hand / custom_ratio + VIEW_OFFSET + extra_leg_length
}

/// Compute the full plan. Pure: same inputs, same plan.
pub fn solve(
    targets: &ProportionTargets,
    m: &BodyMeasurements,
) -> Result<ScalePlan, RescaleError> {
    guard(targets.custom_scale_ratio > EPS, "custom scale ratio is zero")?;
    let view_z = view_height(
        m.head_to_hand,
        targets.custom_scale_ratio,
        targets.extra_leg_length,
    );
    guard(view_z > EPS, "view height is zero")?;

    let eye_z = m.eye_height - m.lowest_point;
    guard(eye_z > EPS, "eye height above floor is zero")?;
    guard(m.leg_length > EPS, "leg length is zero")?;

    let overall_ratio = eye_z / view_z;

    let (leg_ratio, arm_ratio, leg_scale, arm_scale, torso_scale) = match targets.strategy {
        ScaleStrategy::RelativeSplit { arm_to_legs } => {
            let leg_ratio = overall_ratio.powf(arm_to_legs);
            let arm_ratio = overall_ratio.powf(1.0 - arm_to_legs);

            let leg_height_portion = m.leg_length / eye_z;
            let leg_scale = 1.0 - (1.0 - 1.0 / leg_ratio) / leg_height_portion;
            guard(leg_scale > EPS, "solved leg scale is not positive")?;

            let arm_scale = arm_rescaling(m, arm_ratio)?;
            (leg_ratio, arm_ratio, leg_scale, arm_scale, None)
        }
        ScaleStrategy::UpperBodyTarget {
            upper_body_fraction: u,
            keep_head_size,
        } => {
            guard(u > EPS && u < 1.0 - EPS, "upper body fraction out of range")?;
            let upper = eye_z - m.leg_length;
            guard(upper > EPS, "eyes are not above the leg root")?;

            if keep_head_size {
                // Eyes must land exactly on the view height with the arms
                // untouched, so legs and torso share the whole correction.
                let leg_scale = (1.0 - u) * view_z / m.leg_length;
                guard(leg_scale > EPS, "solved leg scale is not positive")?;

                let torso_length = m.torso_length.unwrap_or(0.0);
                guard(torso_length > EPS, "torso span is zero")?;
                // Spine and chest grow together; the required extra upper
                // length is spread over that span.
                let torso_scale = 1.0 + (u * view_z - upper) / torso_length;
                guard(torso_scale > EPS, "solved torso scale is not positive")?;

                let leg_ratio = eye_z / ((1.0 - u) * view_z + upper);
                (leg_ratio, 1.0, leg_scale, 1.0, Some(torso_scale))
            } else {
                // Legs hit the requested split; arms absorb whatever view
                // error remains.
                let final_eye = upper / u;
                let leg_scale = upper * (1.0 - u) / (u * m.leg_length);
                guard(leg_scale > EPS, "solved leg scale is not positive")?;

                let hand_target = (final_eye - VIEW_OFFSET - targets.extra_leg_length)
                    * targets.custom_scale_ratio;
                guard(m.head_to_hand > EPS, "head-to-hand length is zero")?;
                let arm_ratio = hand_target / m.head_to_hand;
                let arm_scale = arm_rescaling(m, arm_ratio)?;

                let leg_ratio = eye_z / final_eye;
                (leg_ratio, arm_ratio, leg_scale, arm_scale, None)
            }
        }
    };

    let mut plan = ScalePlan {
        bone_scales: Vec::new(),
        inherit_none: vec![
            Role::LeftKnee,
            Role::RightKnee,
            Role::LeftAnkle,
            Role::RightAnkle,
        ],
        inherit_full: vec![
            Role::LeftElbow,
            Role::RightElbow,
            Role::LeftWrist,
            Role::RightWrist,
        ],
        overall_ratio,
        leg_ratio,
        arm_ratio,
        leg_scale,
        arm_scale,
        torso_scale,
    };

    let leg_thickness = thickness(targets.leg_thickness, leg_scale);
    let arm_thickness = thickness(targets.arm_thickness, arm_scale);

    let (thigh_scale, calf_scale, foot_scale) = leg_segments(targets, m, leg_scale)?;
    for role in [Role::LeftLeg, Role::RightLeg] {
        plan.bone_scales
            .push((role, Vector3::new(leg_thickness, thigh_scale, leg_thickness)));
    }
    for role in [Role::LeftKnee, Role::RightKnee] {
        plan.bone_scales
            .push((role, Vector3::new(leg_thickness, calf_scale, leg_thickness)));
    }
    for role in [Role::LeftAnkle, Role::RightAnkle] {
        plan.bone_scales
            .push((role, Vector3::new(foot_scale, foot_scale, foot_scale)));
    }

    for role in [Role::LeftArm, Role::RightArm] {
        plan.bone_scales
            .push((role, Vector3::new(arm_thickness, arm_scale, arm_thickness)));
    }
    if !targets.scale_hand {
        for role in [Role::LeftWrist, Role::RightWrist] {
            plan.bone_scales.push((
                role,
                Vector3::new(1.0 / arm_thickness, 1.0 / arm_scale, 1.0 / arm_thickness),
            ));
        }
    }

    if let Some(torso) = torso_scale {
        plan.bone_scales
            .push((Role::Spine, Vector3::new(torso, torso, torso)));
        // Head and arms must not ride along with the torso growth.
        plan.inherit_none
            .extend([Role::Neck, Role::LeftShoulder, Role::RightShoulder]);
    }

    for (_, scale) in &plan.bone_scales {
        guard(
            scale.iter().all(|s| s.is_finite()),
            "scale solve produced a non-finite factor",
        )?;
    }

    Ok(plan)
}

/// Thickness retention: blend between following the length change fully
/// (`c = 0`) and keeping the current girth (`c = 1`).
fn thickness(c: f64, length_ratio: f64) -> f64 {
    c + length_ratio * (1.0 - c)
}

/// Change in raw arm segment length that produces a `k`-fold change in
/// head-to-hand length. Exact, from the right triangle formed by the neck
/// drop and the shoulder-plus-arm horizontal run:
///
/// `shoulder = sqrt((T − n)(T + n)) − a`
/// `change   = sqrt((kT − n)(kT + n)) / a − shoulder / a`
fn arm_rescaling(m: &BodyMeasurements, k: f64) -> Result<f64, RescaleError> {
    let total = m.head_to_hand;
    let neck = m.neck_length;
    let arm = m.arm_length;
    guard(arm > EPS, "arm length is zero")?;
    guard(total > neck, "head-to-hand length shorter than neck drop")?;
    guard(
        k * total > neck,
        "target head-to-hand length shorter than neck drop",
    )?;

    let shoulder = ((total - neck) * (total + neck)).sqrt() - arm;
    let change = ((k * total - neck) * (k * total + neck)).sqrt() / arm - shoulder / arm;
    guard(change.is_finite() && change > EPS, "solved arm scale is not positive")?;
    Ok(change)
}

/// Distribute the leg scale across thigh/calf/foot. Default keeps the
/// current segment proportions (uniform scale); `scale_foot` pins the foot
/// at its absolute length and splits the rest by `thigh_percentage`.
fn leg_segments(
    targets: &ProportionTargets,
    m: &BodyMeasurements,
    leg_scale: f64,
) -> Result<(f64, f64, f64), RescaleError> {
    let [_, knee, ankle, _] = m.leg_fractions;
    let thigh_span = knee;
    let calf_span = ankle - knee;
    let foot_span = 1.0 - ankle;
    guard(
        thigh_span > EPS && calf_span > EPS && foot_span > EPS,
        "leg segment span is zero",
    )?;

    if !targets.scale_foot {
        return Ok((leg_scale, leg_scale, leg_scale));
    }

    // Foot keeps its absolute length: as a fraction of the scaled total it
    // occupies span/s, and thigh+calf share what is left.
    let foot_portion = foot_span / leg_scale;
    let leg_portion = 1.0 - foot_portion;
    guard(leg_portion > EPS, "foot longer than the scaled leg")?;

    let thigh_portion = leg_portion * targets.thigh_percentage;
    let calf_portion = leg_portion - thigh_portion;
    guard(
        thigh_portion > EPS && calf_portion > EPS,
        "thigh percentage leaves an empty segment",
    )?;

    Ok((
        thigh_portion / thigh_span * leg_scale,
        calf_portion / calf_span * leg_scale,
        1.0,
    ))
}

fn guard(condition: bool, context: &'static str) -> Result<(), RescaleError> {
    if condition {
        Ok(())
    } else {
        Err(RescaleError::DegenerateProportions { context })
    }
}
