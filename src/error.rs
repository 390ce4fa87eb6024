use thiserror::Error;

use crate::roles::Role;

/// Error values surfaced by measurement, solving and application stages.
///
/// None of these are recovered silently: a wrong scale factor applied to a
/// rig is strictly worse than an aborted run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RescaleError {
    /// A required semantic bone role could not be matched against the
    /// skeleton, neither through an override nor through the alias table.
    #[error("no bone found for role '{role}' in armature '{armature}'")]
    RoleNotFound {
        /// Role that failed to resolve.
        role: Role,
        /// Name of the armature that was searched.
        armature: String,
    },

    /// A user override names a bone that does not exist in the skeleton.
    #[error("override for role '{role}' points at missing bone '{bone}'")]
    AmbiguousOverride {
        /// Role whose override is broken.
        role: Role,
        /// Literal bone name the override pointed at.
        bone: String,
    },

    /// Eye-height measurement needs both eye bones.
    #[error("two eye bones required, missing '{missing}'")]
    EyeBonesMissing {
        /// The eye role that could not be resolved.
        missing: Role,
    },

    /// No mesh in the scene carries any vertices to measure.
    #[error("no mesh vertex data found for measurement")]
    NoMeshData,

    /// A measured length used as a divisor is (near) zero or a closed-form
    /// solve left the real domain, so a finite scale cannot be computed.
    #[error("degenerate proportions: {context}")]
    DegenerateProportions {
        /// Which quantity collapsed.
        context: &'static str,
    },
}
