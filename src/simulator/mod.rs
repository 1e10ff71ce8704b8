//! The virtual robot: replaying terminal instructions for validation.
//!
//! The simulator executes a generated plan against a mutable model of
//! the deck, heads, and tips, checking the preconditions each
//! instruction assumes. It never halts on a violation; every problem is
//! recorded as a graded diagnostic, so one run surfaces everything
//! diagnosable and the caller gates on the worst severity observed.

mod replay;
mod state;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use replay::simulate;
pub use state::{ChannelTip, DeckState, Occupant};

/// How bad a diagnostic is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; no action needed.
    Info,
    /// Suspicious but survivable (e.g. removing from an empty position).
    Warn,
    /// A physical impossibility or state violation.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// One graded finding from a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationDiagnostic {
    /// How bad it is.
    pub severity: Severity,
    /// What happened.
    pub message: String,
    /// Index of the offending instruction in the replayed list.
    pub instruction_index: usize,
    /// Name of the offending instruction.
    pub instruction: String,
}

impl fmt::Display for SimulationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] #{} {}: {}",
            self.severity, self.instruction_index, self.instruction, self.message
        )
    }
}

/// Everything a simulation run found, plus the final deck state.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    /// All diagnostics, in replay order.
    pub diagnostics: Vec<SimulationDiagnostic>,
    /// The deck model after the last instruction.
    pub final_state: DeckState,
}

impl SimulationReport {
    /// The worst severity observed, if anything was recorded.
    #[must_use]
    pub fn worst(&self) -> Option<Severity> {
        self.diagnostics.iter().map(|d| d.severity).max()
    }

    /// True if no error-severity diagnostic was recorded.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.worst() != Some(Severity::Error)
    }

    /// Diagnostics at exactly the given severity.
    #[must_use]
    pub fn at(&self, severity: Severity) -> Vec<&SimulationDiagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .collect()
    }
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.worst() {
            None => writeln!(f, "simulation clean"),
            Some(worst) => {
                writeln!(
                    f,
                    "simulation finished with {} diagnostics (worst: {worst})",
                    self.diagnostics.len()
                )?;
                for d in &self.diagnostics {
                    writeln!(f, "  {d}")?;
                }
                Ok(())
            }
        }
    }
}
