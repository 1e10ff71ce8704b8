//! Error types for aliquot.
//!
//! All errors are strongly typed using thiserror, one enum per family
//! (selection, policy, decomposition, planning, catalogue, driver,
//! artifact), so callers can pattern-match on specific conditions. The
//! top-level [`AliquotError`] folds every family together for APIs that
//! cross subsystem boundaries.

use thiserror::Error;

use crate::units::Volume;

/// Channel selection failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectionError {
    /// No loaded channel/tip combination can move the requested volume.
    #[error(
        "no suitable channel: requested {requested} but the lowest achievable minimum is {best_minimum}"
    )]
    NoSuitableChannel {
        /// The volume that was requested.
        requested: Volume,
        /// The smallest effective minimum across all loaded combinations.
        best_minimum: Volume,
    },

    /// The robot configuration has no heads loaded at all.
    #[error("no heads loaded on the robot")]
    NoHeadsLoaded,
}

/// Policy resolution failures.
///
/// The first three variants are non-fatal by contract: the caller
/// decides whether to proceed with best-effort defaults or abort the
/// whole plan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// No matched rule references the liquid-class attribute.
    #[error("no liquid type set for instruction: {instruction}")]
    NoLiquidType {
        /// Summary of the offending instruction.
        instruction: String,
    },

    /// Liquid-class rules matched, but none name a known policy.
    #[error("invalid liquid type(s) {bad:?}; valid policies are {valid:?}")]
    InvalidLiquidType {
        /// The unknown policy names referenced by matched rules.
        bad: Vec<String>,
        /// The policy names the table actually knows.
        valid: Vec<String>,
    },

    /// No rule in the set fired for this instruction at all.
    #[error("no rules matched instruction: {instruction}")]
    NoMatchingRules {
        /// Summary of the offending instruction.
        instruction: String,
    },

    /// A rule condition could not be evaluated (e.g. a bad regex).
    #[error("invalid rule '{rule}': {reason}")]
    InvalidRule {
        /// Name of the broken rule.
        rule: String,
        /// Why it could not be evaluated.
        reason: String,
    },
}

/// Decomposition and volume-accounting failures.
///
/// These are detected eagerly, before any instruction is emitted, and
/// carry an instruction summary so the offending protocol step can be
/// located.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecomposeError {
    /// A requested volume sits below the achievable minimum.
    #[error("requested volume {requested} is below the channel minimum {minimum} ({instruction})")]
    VolumeBelowMinimum {
        /// The volume that was requested.
        requested: Volume,
        /// The effective channel minimum.
        minimum: Volume,
        /// Summary of the offending transfer.
        instruction: String,
    },

    /// A dispense would overfill the destination well.
    #[error("dispensing {volume} into well {well} exceeds its capacity {capacity}")]
    WellOverfill {
        /// Volume being dispensed.
        volume: Volume,
        /// Destination well address.
        well: String,
        /// Well capacity.
        capacity: Volume,
    },

    /// Mix inputs do not sum to the declared result volume.
    #[error(
        "volume mismatch in {instruction}: inputs sum to {input_sum} but declared result is {declared}"
    )]
    VolumeMismatch {
        /// Summary of the offending mix.
        instruction: String,
        /// Sum of the consumed sample volumes.
        input_sum: Volume,
        /// The declared result volume.
        declared: Volume,
    },

    /// A source well does not hold enough liquid for the transfer.
    #[error("source {well} holds {available} but transfer needs {requested}")]
    InsufficientSource {
        /// Source well address.
        well: String,
        /// Volume available in the well.
        available: Volume,
        /// Volume the transfer requires.
        requested: Volume,
    },

    /// A transfer carries a negative volume.
    #[error("negative volume {volume} in {instruction}")]
    NegativeVolume {
        /// The negative volume.
        volume: Volume,
        /// Summary of the offending transfer.
        instruction: String,
    },
}

/// Planning failures that abort the current plan.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanningError {
    /// A dependency layer mixes Split and non-Split instructions.
    ///
    /// Splits must be resolvable in isolation; a mixed layer means the
    /// upstream scheduler produced an inconsistent chain.
    #[error("generation {generation} mixes split and non-split instructions")]
    MixedSplitLayer {
        /// The generation counter of the bad layer.
        generation: u32,
    },

    /// A logical instruction has no destination assigned.
    #[error("instruction {instruction} has no destination plate/well assigned")]
    MissingDestination {
        /// Summary of the offending instruction.
        instruction: String,
    },

    /// A consumed liquid has no plate/well location yet.
    #[error("liquid {liquid} has no location and cannot be aspirated")]
    UnplacedLiquid {
        /// Summary of the liquid.
        liquid: String,
    },

    /// No tipbox on the deck can supply the requested tips.
    #[error("no tipbox holds {count} tips of type {tip_type}")]
    OutOfTips {
        /// The tip type that ran out.
        tip_type: String,
        /// How many tips were needed at once.
        count: usize,
    },

    /// Every tipwaste on the deck is full.
    #[error("no tipwaste has room for {count} more tips")]
    TipwasteFull {
        /// How many tips needed disposal.
        count: usize,
    },

    /// Channel selection failed.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Decomposition failed.
    #[error(transparent)]
    Decompose(#[from] DecomposeError),

    /// A resource id referenced by the plan does not exist.
    #[error("unknown {kind} id: {id}")]
    UnknownResource {
        /// Resource kind ("plate", "head", ...).
        kind: &'static str,
        /// The dangling id.
        id: String,
    },
}

/// Resource catalogue failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogueError {
    /// The catalogue has no template registered under this name.
    #[error("unknown {kind} type: {name}")]
    UnknownType {
        /// Template kind ("plate", "tipbox", "tipwaste", "component").
        kind: &'static str,
        /// The requested template name.
        name: String,
    },
}

/// Driver-boundary failures, passed through unchanged.
///
/// The core does not interpret or retry hardware failures; a non-OK
/// driver reply becomes this error verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("driver error (code {code}): {message}")]
pub struct DriverError {
    /// The driver's error code.
    pub code: i32,
    /// The driver's error message.
    pub message: String,
}

/// Plan-artifact (de)serialization failures.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The JSON could not be parsed into a plan artifact.
    ///
    /// An unknown instruction `type` tag lands here; the dispatch table
    /// is fixed, so unknown tags are fatal.
    #[error("failed to parse plan artifact: {0}")]
    Parse(#[from] serde_json::Error),

    /// The artifact's protocol version is not understood.
    #[error("unsupported plan version: {version}")]
    UnsupportedVersion {
        /// The version string found in the artifact.
        version: String,
    },
}

/// Top-level error type for aliquot.
#[derive(Debug, Error)]
pub enum AliquotError {
    /// Planning error.
    #[error("planning error: {0}")]
    Planning(#[from] PlanningError),

    /// Policy resolution error.
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Resource catalogue error.
    #[error("catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),

    /// Driver error.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Artifact serialization error.
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Internal invariant violation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl AliquotError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a planning error.
    #[must_use]
    pub const fn is_planning(&self) -> bool {
        matches!(self, Self::Planning(_))
    }

    /// Returns true if this is a policy error.
    #[must_use]
    pub const fn is_policy(&self) -> bool {
        matches!(self, Self::Policy(_))
    }

    /// Returns true if this error is non-fatal for the plan as a whole.
    ///
    /// Policy resolution errors are recoverable (the caller may fall
    /// back to the default policy); everything else aborts the plan.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Policy(
                PolicyError::NoLiquidType { .. }
                    | PolicyError::InvalidLiquidType { .. }
                    | PolicyError::NoMatchingRules { .. }
            )
        )
    }
}

impl From<SelectionError> for AliquotError {
    fn from(e: SelectionError) -> Self {
        Self::Planning(PlanningError::Selection(e))
    }
}

impl From<DecomposeError> for AliquotError {
    fn from(e: DecomposeError) -> Self {
        Self::Planning(PlanningError::Decompose(e))
    }
}

/// Result type alias for aliquot operations.
pub type PlanResult<T> = Result<T, AliquotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_suitable_channel_message() {
        let err = SelectionError::NoSuitableChannel {
            requested: Volume::ul(0.2),
            best_minimum: Volume::ul(10.0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("0.200ul"));
        assert!(msg.contains("10.000ul"));
    }

    #[test]
    fn invalid_liquid_type_reports_both_sets() {
        let err = PolicyError::InvalidLiquidType {
            bad: vec!["watr".to_string()],
            valid: vec!["water".to_string(), "glycerol".to_string()],
        };
        let msg = format!("{err}");
        assert!(msg.contains("watr"));
        assert!(msg.contains("glycerol"));
    }

    #[test]
    fn volume_mismatch_carries_instruction_context() {
        let err = DecomposeError::VolumeMismatch {
            instruction: "MIX out1".to_string(),
            input_sum: Volume::ul(90.0),
            declared: Volume::ul(100.0),
        };
        assert!(format!("{err}").contains("MIX out1"));
    }

    #[test]
    fn selection_error_folds_into_planning() {
        let err: AliquotError = SelectionError::NoHeadsLoaded.into();
        assert!(err.is_planning());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn policy_errors_are_recoverable() {
        let err: AliquotError = PolicyError::NoLiquidType {
            instruction: "MIX".to_string(),
        }
        .into();
        assert!(err.is_policy());
        assert!(err.is_recoverable());

        let err: AliquotError = PolicyError::InvalidRule {
            rule: "r".to_string(),
            reason: "bad regex".to_string(),
        }
        .into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn driver_error_passthrough_format() {
        let err = DriverError {
            code: 7,
            message: "tip eject jam".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("code 7"));
        assert!(msg.contains("tip eject jam"));
    }

    #[test]
    fn internal_error_constructor() {
        let err = AliquotError::internal("partial tree left behind");
        assert!(format!("{err}").contains("partial tree"));
    }
}
