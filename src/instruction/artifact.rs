//! Plan artifacts: the versioned JSON envelope around an instruction
//! list.
//!
//! The envelope carries a protocol version, a plan identity, and a
//! creation timestamp, so replayed plans can be attributed and version
//! skew is rejected before any instruction is touched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ArtifactError;
use crate::instruction::RobotInstruction;

/// The artifact version this build reads and writes.
pub const CURRENT_VERSION: &str = "1.0";

/// Stable identifier for a generated plan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PlanId(Uuid);

impl PlanId {
    /// Creates a new random plan ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A complete serialized plan: envelope plus flattened instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanArtifact {
    /// Artifact format version.
    pub version: String,
    /// Identity of this plan.
    pub plan_id: PlanId,
    /// When the plan was generated.
    pub created_at: DateTime<Utc>,
    /// The terminal instructions, in execution order.
    pub instructions: Vec<RobotInstruction>,
}

impl PlanArtifact {
    /// Wraps instructions in a fresh envelope at the current version.
    #[must_use]
    pub fn new(instructions: Vec<RobotInstruction>) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            plan_id: PlanId::new(),
            created_at: Utc::now(),
            instructions,
        }
    }
}

/// Serializes a plan artifact to pretty-printed JSON.
///
/// # Errors
/// Only if serde_json fails, which for this closed type model it does
/// not; the signature stays fallible to match the read side.
pub fn to_json_pretty(artifact: &PlanArtifact) -> Result<String, ArtifactError> {
    Ok(serde_json::to_string_pretty(artifact)?)
}

/// Parses a plan artifact from JSON, rejecting unknown versions.
///
/// # Errors
/// [`ArtifactError::Parse`] on malformed JSON or an unknown instruction
/// tag; [`ArtifactError::UnsupportedVersion`] if the envelope version
/// differs from [`CURRENT_VERSION`].
pub fn from_json(json: &str) -> Result<PlanArtifact, ArtifactError> {
    let artifact: PlanArtifact = serde_json::from_str(json)?;
    if artifact.version != CURRENT_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            version: artifact.version,
        });
    }
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Message;

    fn sample() -> PlanArtifact {
        PlanArtifact::new(vec![
            RobotInstruction::Initialize,
            RobotInstruction::Message(Message {
                text: "load plates".to_string(),
            }),
            RobotInstruction::Finalize,
        ])
    }

    #[test]
    fn roundtrip_preserves_instructions() {
        let artifact = sample();
        let json = to_json_pretty(&artifact).unwrap();
        let back = from_json(&json).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut artifact = sample();
        artifact.version = "9.7".to_string();
        let json = serde_json::to_string(&artifact).unwrap();
        let err = from_json(&json).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::UnsupportedVersion { version } if version == "9.7"
        ));
    }

    #[test]
    fn unknown_instruction_tag_is_a_parse_error() {
        let json = format!(
            "{{\"version\":\"{CURRENT_VERSION}\",\"plan_id\":\"{}\",\
             \"created_at\":\"2026-01-01T00:00:00Z\",\
             \"instructions\":[{{\"type\":\"teleport\",\"payload\":{{}}}}]}}",
            PlanId::new()
        );
        assert!(matches!(from_json(&json), Err(ArtifactError::Parse(_))));
    }

    #[test]
    fn envelope_carries_identity_and_timestamp() {
        let a = sample();
        let b = sample();
        assert_ne!(a.plan_id, b.plan_id);
        assert_eq!(a.version, CURRENT_VERSION);
    }
}
