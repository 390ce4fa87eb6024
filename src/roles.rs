use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RescaleError;
use crate::scene::Skeleton;

// ─── Canonical roles ──────────────────────────────────────────────────────────

/// Canonical semantic bone identity, independent of the skeleton's actual
/// naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Head,
    Neck,
    Hips,
    Spine,
    Chest,
    UpperChest,
    LeftShoulder,
    LeftArm,
    LeftElbow,
    LeftWrist,
    LeftLeg,
    LeftKnee,
    LeftAnkle,
    LeftEye,
    RightShoulder,
    RightArm,
    RightElbow,
    RightWrist,
    RightLeg,
    RightKnee,
    RightAnkle,
    RightEye,
}

/// All roles, for building reverse maps.
pub const ALL_ROLES: [Role; 22] = [
    Role::Head,
    Role::Neck,
    Role::Hips,
    Role::Spine,
    Role::Chest,
    Role::UpperChest,
    Role::LeftShoulder,
    Role::LeftArm,
    Role::LeftElbow,
    Role::LeftWrist,
    Role::LeftLeg,
    Role::LeftKnee,
    Role::LeftAnkle,
    Role::LeftEye,
    Role::RightShoulder,
    Role::RightArm,
    Role::RightElbow,
    Role::RightWrist,
    Role::RightLeg,
    Role::RightKnee,
    Role::RightAnkle,
    Role::RightEye,
];

impl Role {
    /// Canonical snake_case name, also used as the literal-name fallback
    /// during resolution.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Head => "head",
            Role::Neck => "neck",
            Role::Hips => "hips",
            Role::Spine => "spine",
            Role::Chest => "chest",
            Role::UpperChest => "upper_chest",
            Role::LeftShoulder => "left_shoulder",
            Role::LeftArm => "left_arm",
            Role::LeftElbow => "left_elbow",
            Role::LeftWrist => "left_wrist",
            Role::LeftLeg => "left_leg",
            Role::LeftKnee => "left_knee",
            Role::LeftAnkle => "left_ankle",
            Role::LeftEye => "left_eye",
            Role::RightShoulder => "right_shoulder",
            Role::RightArm => "right_arm",
            Role::RightElbow => "right_elbow",
            Role::RightWrist => "right_wrist",
            Role::RightLeg => "right_leg",
            Role::RightKnee => "right_knee",
            Role::RightAnkle => "right_ankle",
            Role::RightEye => "right_eye",
        }
    }

    /// Known raw spellings for this role, pre-normalized (lower case, no
    /// separators), in match-priority order. Only the first alias that hits
    /// a bone is used, so broader spellings come later.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Role::Head => &["head"],
            Role::Neck => &["neck"],
            Role::Hips => &["hips", "hip", "pelvis"],
            Role::Spine => &["spine"],
            Role::Chest => &["chest"],
            Role::UpperChest => &["upperchest"],
            Role::LeftShoulder => &["leftshoulder", "shoulderl", "lshoulder"],
            Role::LeftArm => &["leftarm", "arml", "larm", "upperarml", "leftupperarm"],
            Role::LeftElbow => &[
                "leftelbow",
                "elbowl",
                "lelbow",
                "lowerarml",
                "leftlowerarm",
                "forearml",
            ],
            Role::LeftWrist => &["leftwrist", "wristl", "lwrist", "handl", "lefthand"],
            Role::LeftLeg => &[
                "leftleg",
                "legl",
                "lleg",
                "upperlegl",
                "thighl",
                "leftupperleg",
            ],
            Role::LeftKnee => &[
                "leftknee",
                "kneel",
                "lknee",
                "lowerlegl",
                "calfl",
                "shinl",
                "leftlowerleg",
            ],
            Role::LeftAnkle => &["leftankle", "anklel", "lankle", "leftfoot", "footl"],
            Role::LeftEye => &["eyel", "lefteye", "eyeleft", "lefteye001"],
            Role::RightShoulder => &["rightshoulder", "shoulderr", "rshoulder"],
            Role::RightArm => &["rightarm", "armr", "rarm", "upperarmr", "rightupperarm"],
            Role::RightElbow => &[
                "rightelbow",
                "elbowr",
                "relbow",
                "lowerarmr",
                "rightlowerarm",
                "forearmr",
            ],
            Role::RightWrist => &["rightwrist", "wristr", "rwrist", "handr", "righthand"],
            Role::RightLeg => &[
                "rightleg",
                "legr",
                "rleg",
                "upperlegr",
                "thighr",
                "rightupperleg",
            ],
            Role::RightKnee => &[
                "rightknee",
                "kneer",
                "rknee",
                "lowerlegr",
                "calfr",
                "rightlowerleg",
                "shinr",
            ],
            Role::RightAnkle => &["rightankle", "ankler", "rankle", "rightfoot", "footr"],
            Role::RightEye => &["eyer", "righteye", "eyeright", "righteye001"],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Name normalization ───────────────────────────────────────────────────────

/// Fold a raw bone name into the form used by the alias tables: lower case
/// with space, underscore, dot and hyphen stripped.
pub fn normalize_bone_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '.' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

// ─── Overrides ────────────────────────────────────────────────────────────────

/// Per-role user overrides pointing at literal bone names. An override
/// always wins over alias matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleOverrides {
    overrides: HashMap<Role, String>,
}

impl RoleOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `role` to the bone literally named `bone_name`.
    pub fn set(&mut self, role: Role, bone_name: impl Into<String>) {
        self.overrides.insert(role, bone_name.into());
    }

    pub fn clear(&mut self, role: Role) {
        self.overrides.remove(&role);
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.overrides.get(&role).map(String::as_str)
    }
}

// ─── Resolution ───────────────────────────────────────────────────────────────

/// Resolve a semantic role to a bone index in `skeleton`.
///
/// Order: user override (literal name, fails with `AmbiguousOverride` when
/// absent) → alias table in listed order against normalized bone names →
/// the role's own canonical name as a literal fallback.
pub fn resolve(
    role: Role,
    skeleton: &Skeleton,
    overrides: &RoleOverrides,
) -> Result<usize, RescaleError> {
    if let Some(bone_name) = overrides.get(role) {
        return skeleton
            .bone_index(bone_name)
            .ok_or_else(|| RescaleError::AmbiguousOverride {
                role,
                bone: bone_name.to_string(),
            });
    }

    let lookup: HashMap<String, usize> = skeleton
        .bones()
        .iter()
        .enumerate()
        .map(|(index, bone)| (normalize_bone_name(&bone.name), index))
        .collect();

    for alias in role.aliases() {
        if let Some(&index) = lookup.get(*alias) {
            return Ok(index);
        }
    }

    // Last resort: the canonical role name itself as a literal bone name.
    if let Some(&index) = lookup.get(normalize_bone_name(role.as_str()).as_str()) {
        return Ok(index);
    }

    Err(RescaleError::RoleNotFound {
        role,
        armature: skeleton.name.clone(),
    })
}

/// Non-fatal probe for optional roles (e.g. `upper_chest`).
pub fn exists(role: Role, skeleton: &Skeleton, overrides: &RoleOverrides) -> bool {
    resolve(role, skeleton, overrides).is_ok()
}

/// Invert the resolver over every role: bone index → role. Roles that fail
/// to resolve are simply absent. Used to pair bones across independently
/// named skeletons.
pub fn role_map(skeleton: &Skeleton, overrides: &RoleOverrides) -> HashMap<usize, Role> {
    let mut map = HashMap::new();
    for role in ALL_ROLES {
        if let Ok(index) = resolve(role, skeleton, overrides) {
            map.entry(index).or_insert(role);
        }
    }
    map
}
