//! # Aliquot - Liquid-Handling Robot Planning & Validation
//!
//! Aliquot plans and validates the low-level operations of a
//! liquid-handling robot. Upstream code expresses intent as logical
//! MIX/SPLIT/PROMPT operations on named liquids; downstream hardware
//! understands only discrete aspirate/dispense/move/load-tip primitives
//! constrained by channel geometry, tip volume ranges, and plate
//! layout. Aliquot translates the former into the latter, then replays
//! the result against a virtual model of the robot to catch physically
//! impossible sequences before they reach hardware.
//!
//! ## Core Concepts
//!
//! - **Liquid**: an immutable value-like record with identity, class,
//!   volume, and lineage
//! - **Channel selection**: scoring-based choice of the best head/tip
//!   combination for a volume
//! - **Policy**: liquid-class behaviour (mixing, z-offsets, speeds)
//!   resolved from a rule table
//! - **Instruction tree**: recursive refinement of coarse transfer
//!   blocks down to hardware primitives
//! - **Simulation**: a replay of the generated plan with graded,
//!   never-halting diagnostics
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aliquot::{
//!     InstructionTree, PlanContext, PolicyRuleSet, simulate,
//! };
//!
//! let context = PlanContext::default();
//! let mut tree = InstructionTree::build(&chain, &context)?;
//! let plan = tree.generate(&robot_config, &PolicyRuleSet::standard())?;
//! let report = simulate(&plan.instructions, &robot_config);
//! assert!(report.passed(), "{report}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]

// Core model
pub mod context;
pub mod error;
pub mod liquid;
pub mod logical;
pub mod resources;
pub mod units;

// Planning pipeline
pub mod decompose;
pub mod instruction;
pub mod policy;
pub mod selector;
pub mod tree;

// Validation and output
pub mod driver;
pub mod simulator;

// Re-export primary types at crate root for convenience
pub use context::PlanContext;
pub use error::{
    AliquotError, ArtifactError, CatalogueError, DecomposeError, DriverError, PlanResult,
    PlanningError, PolicyError, SelectionError,
};
pub use liquid::{Liquid, LiquidBuilder, LiquidId, LiquidLocation};
pub use logical::{LogicalId, LogicalInstruction, LogicalKind};
pub use resources::deck::{DeckItem, RobotConfig};
pub use resources::head::{Adaptor, ChannelParams, EffectiveParams, Head, Orientation};
pub use resources::inventory::{Inventory, TipboxType, TipwasteType};
pub use resources::plate::{Plate, PlateId, PlateType, WellAddress};
pub use resources::tip::{TipType, Tipbox, TipboxId, Tipwaste, TipwasteId};
pub use units::{FlowRate, Volume};

// Pipeline re-exports
pub use instruction::{
    from_json, to_json_pretty, PlanArtifact, PlanId, Refinement, RobotInstruction,
    TransferRequest, ValidationError,
};
pub use policy::{Policy, PolicyRuleSet, Rule};
pub use selector::{choose, choose_many, ChannelChoice};
pub use tree::{GeneratedPlan, InstructionTree, TreeNode};

// Validation/output re-exports
pub use driver::{dispatch, DriverReply, LiquidHandlingDriver, RecordingDriver};
pub use simulator::{simulate, DeckState, Severity, SimulationDiagnostic, SimulationReport};
