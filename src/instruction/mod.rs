//! Robot instructions: the closed union the planner refines and emits.
//!
//! Each variant owns its own typed parameters. Dispatch is exhaustive
//! matching everywhere, so adding a variant is a compile-time-checked,
//! total change. The terminal variants (those whose refinement returns
//! [`Refinement::Terminal`]) are exactly the ones a driver understands;
//! the block variants exist only during planning and are always
//! expanded away before output.

mod artifact;
mod generate;
mod validation;

pub use artifact::{from_json, to_json_pretty, PlanArtifact, PlanId, CURRENT_VERSION};
pub use generate::Refinement;
pub use validation::{ValidationError, MAX_TEXT_LEN};

use serde::{Deserialize, Serialize};

use crate::liquid::LiquidId;
use crate::resources::plate::{PlateId, WellAddress};
use crate::resources::tip::{TipboxId, TipwasteId};
use crate::units::{FlowRate, Volume};

/// One requested liquid movement: from a well, to a well, a volume.
///
/// The optional running volumes record the source/destination occupancy
/// *before* this transfer, threaded through by the decomposer so later
/// sub-transfers see the updated state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Liquid class being moved.
    pub what: String,
    /// Identity of the liquid record being moved.
    pub liquid: LiquidId,
    /// Source plate.
    pub from_plate: PlateId,
    /// Source well.
    pub from_well: WellAddress,
    /// Destination plate.
    pub to_plate: PlateId,
    /// Destination well.
    pub to_well: WellAddress,
    /// Volume to move.
    pub volume: Volume,
    /// Source occupancy before this transfer, once threaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_volume: Option<Volume>,
    /// Destination occupancy before this transfer, once threaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_volume: Option<Volume>,
}

impl TransferRequest {
    /// One-line summary for error messages.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} {} {} -> {}",
            self.what, self.volume, self.from_well, self.to_well
        )
    }
}

/// Where a move positions the tip relative to the well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellReference {
    /// Relative to the well bottom.
    WellBottom,
    /// Relative to the well top rim.
    WellTop,
    /// Relative to the current liquid surface.
    LiquidLevel,
}

/// A coarse block of transfers, not yet decomposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferBlock {
    /// The requested transfers, in protocol order.
    pub transfers: Vec<TransferRequest>,
}

/// A run of same-class transfers executed one channel at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleChannelBlock {
    /// Liquid class shared by the run.
    pub what: String,
    /// Head index executing the run.
    pub head: usize,
    /// Tip type used for the whole run.
    pub tip_type: String,
    /// The transfers, in original order, each within tip range.
    pub transfers: Vec<TransferRequest>,
}

/// Aligned transfers executed simultaneously by parallel channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiChannelBlock {
    /// Liquid class shared by the lanes.
    pub what: String,
    /// Head index executing the batch.
    pub head: usize,
    /// Tip type on every lane.
    pub tip_type: String,
    /// One transfer per lane, in channel order.
    pub lanes: Vec<TransferRequest>,
    /// Common per-lane volume (the minimum of the lane requirements).
    pub volume: Volume,
}

/// Draw liquid up into loaded tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aspirate {
    /// Head index.
    pub head: usize,
    /// Channels used, ascending.
    pub channels: Vec<u8>,
    /// Per-channel volumes.
    pub volumes: Vec<Volume>,
    /// Source plate.
    pub plate: PlateId,
    /// Per-channel source wells.
    pub wells: Vec<WellAddress>,
    /// Liquid class being aspirated.
    pub what: String,
    /// Override flow rate, if the policy set one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_rate: Option<FlowRate>,
}

/// Push liquid out of loaded tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispense {
    /// Head index.
    pub head: usize,
    /// Channels used, ascending.
    pub channels: Vec<u8>,
    /// Per-channel volumes.
    pub volumes: Vec<Volume>,
    /// Destination plate.
    pub plate: PlateId,
    /// Per-channel destination wells.
    pub wells: Vec<WellAddress>,
    /// Liquid class being dispensed.
    pub what: String,
    /// Override flow rate, if the policy set one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_rate: Option<FlowRate>,
}

/// Expel residual air/liquid after a dispense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blowout {
    /// Head index.
    pub head: usize,
    /// Channels used.
    pub channels: Vec<u8>,
    /// Plate the tips sit over.
    pub plate: PlateId,
    /// Wells the tips sit over.
    pub wells: Vec<WellAddress>,
}

/// Pipette up and down in place to mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixWells {
    /// Head index.
    pub head: usize,
    /// Channels used.
    pub channels: Vec<u8>,
    /// Volume of each mix cycle.
    pub volume: Volume,
    /// Number of cycles.
    pub cycles: u32,
    /// Plate being mixed in.
    pub plate: PlateId,
    /// Wells being mixed.
    pub wells: Vec<WellAddress>,
}

/// Position the head over wells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// Head index.
    pub head: usize,
    /// Target plate.
    pub plate: PlateId,
    /// Per-channel target wells.
    pub wells: Vec<WellAddress>,
    /// Vertical reference for the offset.
    pub reference: WellReference,
    /// Offset from the reference in millimetres.
    pub z_offset_mm: f64,
}

/// Pick up tips from a tipbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTips {
    /// Head index.
    pub head: usize,
    /// Channels to load, ascending.
    pub channels: Vec<u8>,
    /// Tip type being loaded.
    pub tip_type: String,
    /// The tipbox to take from.
    pub tipbox: TipboxId,
}

/// Eject tips into a tipwaste.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnloadTips {
    /// Head index.
    pub head: usize,
    /// Channels to unload, ascending.
    pub channels: Vec<u8>,
    /// The tipwaste to eject into.
    pub tipwaste: TipwasteId,
}

/// Set pipetting speeds for a head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetSpeed {
    /// Head index.
    pub head: usize,
    /// Aspiration flow rate.
    pub aspirate: FlowRate,
    /// Dispense flow rate.
    pub dispense: FlowRate,
}

/// Show a message to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The message text.
    pub text: String,
}

/// Place a plate at a deck position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPlateTo {
    /// Deck position name.
    pub position: String,
    /// The plate's id.
    pub plate: PlateId,
    /// The plate's human-readable name.
    pub name: String,
}

/// Remove whatever occupies a deck position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePlateAt {
    /// Deck position name.
    pub position: String,
}

/// The closed union of robot instructions.
///
/// Serialized with a discriminated `type` tag; the dispatch table is
/// fixed, so an unknown tag fails deserialization outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RobotInstruction {
    /// Coarse transfer set awaiting decomposition.
    TransferBlock(TransferBlock),
    /// Single-channel run awaiting expansion to primitives.
    SingleChannelBlock(SingleChannelBlock),
    /// Multi-channel batch awaiting expansion to primitives.
    MultiChannelBlock(MultiChannelBlock),
    /// Terminal: aspirate.
    Aspirate(Aspirate),
    /// Terminal: dispense.
    Dispense(Dispense),
    /// Terminal: blowout.
    Blowout(Blowout),
    /// Terminal: in-place mix.
    Mix(MixWells),
    /// Terminal: head move.
    Move(Move),
    /// Terminal: load tips.
    LoadTips(LoadTips),
    /// Terminal: unload tips.
    UnloadTips(UnloadTips),
    /// Terminal: set pipetting speed.
    SetSpeed(SetSpeed),
    /// Terminal: begin a run.
    Initialize,
    /// Terminal: end a run.
    Finalize,
    /// Terminal: operator message.
    Message(Message),
    /// Terminal: place a plate on the deck.
    AddPlateTo(AddPlateTo),
    /// Terminal: clear a deck position.
    RemovePlateAt(RemovePlateAt),
}

impl RobotInstruction {
    /// The instruction's stable name (matches the serialized tag).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TransferBlock(_) => "transfer_block",
            Self::SingleChannelBlock(_) => "single_channel_block",
            Self::MultiChannelBlock(_) => "multi_channel_block",
            Self::Aspirate(_) => "aspirate",
            Self::Dispense(_) => "dispense",
            Self::Blowout(_) => "blowout",
            Self::Mix(_) => "mix",
            Self::Move(_) => "move",
            Self::LoadTips(_) => "load_tips",
            Self::UnloadTips(_) => "unload_tips",
            Self::SetSpeed(_) => "set_speed",
            Self::Initialize => "initialize",
            Self::Finalize => "finalize",
            Self::Message(_) => "message",
            Self::AddPlateTo(_) => "add_plate_to",
            Self::RemovePlateAt(_) => "remove_plate_at",
        }
    }

    /// True if this variant is hardware-primitive (no further
    /// refinement; has a driver output).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::TransferBlock(_) | Self::SingleChannelBlock(_) | Self::MultiChannelBlock(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquid::LiquidId;

    fn transfer() -> TransferRequest {
        TransferRequest {
            what: "water".to_string(),
            liquid: LiquidId::new(),
            from_plate: PlateId::new(),
            from_well: WellAddress::new(0, 0),
            to_plate: PlateId::new(),
            to_well: WellAddress::new(0, 1),
            volume: Volume::ul(100.0),
            from_volume: None,
            to_volume: None,
        }
    }

    #[test]
    fn terminal_classification() {
        let block = RobotInstruction::TransferBlock(TransferBlock {
            transfers: vec![transfer()],
        });
        assert!(!block.is_terminal());
        assert!(RobotInstruction::Initialize.is_terminal());
        assert!(RobotInstruction::Message(Message {
            text: "hello".to_string()
        })
        .is_terminal());
    }

    #[test]
    fn tagged_serialization() {
        let instr = RobotInstruction::Message(Message {
            text: "replace tipbox".to_string(),
        });
        let json = serde_json::to_string(&instr).unwrap();
        assert!(json.contains("\"type\":\"message\""));
        assert!(json.contains("\"payload\""));

        let unit = serde_json::to_string(&RobotInstruction::Initialize).unwrap();
        assert!(unit.contains("\"type\":\"initialize\""));
    }

    #[test]
    fn unknown_tag_fails_to_parse() {
        let err = serde_json::from_str::<RobotInstruction>(
            "{\"type\":\"warp_drive\",\"payload\":{}}",
        );
        assert!(err.is_err());
    }

    #[test]
    fn name_matches_tag() {
        let instr = RobotInstruction::SetSpeed(SetSpeed {
            head: 0,
            aspirate: FlowRate::ul_per_s(50.0),
            dispense: FlowRate::ul_per_s(50.0),
        });
        let json = serde_json::to_string(&instr).unwrap();
        assert!(json.contains(&format!("\"type\":\"{}\"", instr.name())));
    }

    #[test]
    fn transfer_summary_reads_well() {
        let t = transfer();
        assert_eq!(t.summary(), "water 100.000ul A1 -> A2");
    }
}
