//! Logical instructions: the upstream protocol's view of the plan.
//!
//! Upstream code expresses intent as MIX/SPLIT/PROMPT operations on
//! named liquids. A logical instruction is created during protocol
//! authoring, consumed exactly once by the instruction tree, and never
//! mutated after generation.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::liquid::Liquid;
use crate::resources::plate::{PlateId, WellAddress};

/// Stable identifier for a logical instruction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LogicalId(Uuid);

impl LogicalId {
    /// Creates a new random instruction ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LogicalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of a logical instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalKind {
    /// Combine input liquids into an output liquid at a destination.
    Mix,
    /// Partition a liquid's identity without moving anything.
    Split,
    /// Ask the operator to do something.
    Prompt,
}

/// The destination a mix has been assigned to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Destination plate.
    pub plate: PlateId,
    /// Destination well.
    pub well: WellAddress,
    /// The plate's catalogue type name.
    pub plate_type: String,
}

/// One logical MIX/SPLIT/PROMPT operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalInstruction {
    /// Identity of this instruction.
    pub id: LogicalId,
    /// What kind of operation this is.
    pub kind: LogicalKind,
    /// Liquids consumed.
    pub inputs: Vec<Liquid>,
    /// Liquids produced.
    pub outputs: Vec<Liquid>,
    /// Dependency generation; instructions with equal generation form
    /// one layer and may be planned together.
    pub generation: u32,
    /// Destination, once assigned by the upstream layout step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Destination>,
    /// Operator message, for Prompt instructions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LogicalInstruction {
    /// Creates a MIX of `inputs` producing `output`.
    #[must_use]
    pub fn mix(inputs: Vec<Liquid>, output: Liquid, generation: u32) -> Self {
        Self {
            id: LogicalId::new(),
            kind: LogicalKind::Mix,
            inputs,
            outputs: vec![output],
            generation,
            destination: None,
            message: None,
        }
    }

    /// Creates a SPLIT of `input` into `outputs`.
    #[must_use]
    pub fn split(input: Liquid, outputs: Vec<Liquid>, generation: u32) -> Self {
        Self {
            id: LogicalId::new(),
            kind: LogicalKind::Split,
            inputs: vec![input],
            outputs,
            generation,
            destination: None,
            message: None,
        }
    }

    /// Creates a PROMPT with an operator message.
    #[must_use]
    pub fn prompt(message: impl Into<String>, generation: u32) -> Self {
        Self {
            id: LogicalId::new(),
            kind: LogicalKind::Prompt,
            inputs: Vec::new(),
            outputs: Vec::new(),
            generation,
            destination: None,
            message: Some(message.into()),
        }
    }

    /// Assigns the destination plate/well.
    #[must_use]
    pub fn with_destination(mut self, plate: PlateId, well: WellAddress, plate_type: impl Into<String>) -> Self {
        self.destination = Some(Destination {
            plate,
            well,
            plate_type: plate_type.into(),
        });
        self
    }

    /// One-line summary for error messages.
    #[must_use]
    pub fn summary(&self) -> String {
        let kind = match self.kind {
            LogicalKind::Mix => "MIX",
            LogicalKind::Split => "SPLIT",
            LogicalKind::Prompt => "PROMPT",
        };
        let output = self
            .outputs
            .first()
            .map_or_else(|| "-".to_string(), |o| o.name.clone());
        format!("{kind} -> {output} (gen {})", self.generation)
    }
}

/// Groups a dependency-ordered chain into generation layers.
///
/// The chain is already topologically ordered by the upstream
/// scheduler; this only slices it at generation boundaries, preserving
/// order within each layer.
#[must_use]
pub fn layers(chain: &[LogicalInstruction]) -> Vec<&[LogicalInstruction]> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=chain.len() {
        if i == chain.len() || chain[i].generation != chain[start].generation {
            out.push(&chain[start..i]);
            start = i;
        }
    }
    out
}
