//! Replay transitions: one per terminal instruction type.

use crate::instruction::RobotInstruction;
use crate::resources::deck::RobotConfig;
use crate::resources::plate::{PlateId, WellAddress};
use crate::resources::tip::TipType;
use crate::simulator::state::{ChannelTip, DeckState, Occupant};
use crate::simulator::{Severity, SimulationDiagnostic, SimulationReport};
use crate::units::Volume;

/// Replays terminal instructions against a model built from `config`.
///
/// Violated preconditions are recorded, never thrown: the replay always
/// runs to the end so one pass surfaces every diagnosable problem.
#[must_use]
pub fn simulate(instructions: &[RobotInstruction], config: &RobotConfig) -> SimulationReport {
    let mut state = DeckState::from_config(config);
    let mut diagnostics = Vec::new();
    for (index, instruction) in instructions.iter().enumerate() {
        let mut rec = Recorder {
            diagnostics: &mut diagnostics,
            index,
            name: instruction.name(),
        };
        step(instruction, &mut state, &mut rec);
    }
    SimulationReport {
        diagnostics,
        final_state: state,
    }
}

struct Recorder<'a> {
    diagnostics: &'a mut Vec<SimulationDiagnostic>,
    index: usize,
    name: &'static str,
}

impl Recorder<'_> {
    fn record(&mut self, severity: Severity, message: String) {
        self.diagnostics.push(SimulationDiagnostic {
            severity,
            message,
            instruction_index: self.index,
            instruction: self.name.to_string(),
        });
    }

    fn info(&mut self, message: String) {
        self.record(Severity::Info, message);
    }

    fn warn(&mut self, message: String) {
        self.record(Severity::Warn, message);
    }

    fn error(&mut self, message: String) {
        self.record(Severity::Error, message);
    }
}

fn step(instruction: &RobotInstruction, state: &mut DeckState, rec: &mut Recorder<'_>) {
    match instruction {
        RobotInstruction::LoadTips(p) => {
            let tip_type = state.tip_types.get(&p.tip_type).cloned().unwrap_or_else(|| {
                rec.warn(format!("unknown tip type '{}'", p.tip_type));
                TipType {
                    name: p.tip_type.clone(),
                    min_volume: Volume::ZERO,
                    max_volume: Volume::ml(10.0),
                    filtered: false,
                }
            });
            match state.tipbox_remaining.get_mut(&p.tipbox) {
                None => rec.warn(format!("tipbox {} is not on the deck", p.tipbox)),
                Some(remaining) => {
                    if *remaining < p.channels.len() {
                        rec.error(format!(
                            "tipbox {} has {remaining} tips left, {} requested",
                            p.tipbox,
                            p.channels.len()
                        ));
                    } else {
                        *remaining -= p.channels.len();
                    }
                }
            }
            for &channel in &p.channels {
                if state.channel_tips.contains_key(&(p.head, channel)) {
                    rec.error(format!(
                        "head {} channel {channel} already carries a tip",
                        p.head
                    ));
                } else {
                    state.channel_tips.insert(
                        (p.head, channel),
                        ChannelTip {
                            tip_type: tip_type.clone(),
                            contents: Volume::ZERO,
                        },
                    );
                }
            }
        }

        RobotInstruction::UnloadTips(p) => {
            let mut ejected = 0;
            for &channel in &p.channels {
                if state.channel_tips.remove(&(p.head, channel)).is_none() {
                    rec.error(format!(
                        "head {} channel {channel} has no tip to unload",
                        p.head
                    ));
                } else {
                    ejected += 1;
                }
            }
            match state.tipwaste_fill.get_mut(&p.tipwaste) {
                None => rec.warn(format!("tipwaste {} is not on the deck", p.tipwaste)),
                Some((capacity, contents)) => {
                    if *contents + ejected > *capacity {
                        rec.error(format!(
                            "tipwaste {} is full ({contents}/{capacity})",
                            p.tipwaste
                        ));
                    } else {
                        *contents += ejected;
                    }
                }
            }
        }

        RobotInstruction::Aspirate(p) => {
            for ((&channel, &volume), &well) in
                p.channels.iter().zip(&p.volumes).zip(&p.wells)
            {
                aspirate_lane(state, rec, p.head, channel, volume, p.plate, well);
            }
        }

        RobotInstruction::Dispense(p) => {
            for ((&channel, &volume), &well) in
                p.channels.iter().zip(&p.volumes).zip(&p.wells)
            {
                dispense_lane(state, rec, p.head, channel, volume, p.plate, well, &p.what);
            }
        }

        RobotInstruction::Blowout(p) => {
            for (&channel, &well) in p.channels.iter().zip(&p.wells) {
                match state.channel_tips.get_mut(&(p.head, channel)) {
                    None => rec.error(format!(
                        "blowout on head {} channel {channel} with no tip",
                        p.head
                    )),
                    Some(tip) => {
                        let residual = tip.contents;
                        tip.contents = Volume::ZERO;
                        if residual.is_meaningful() {
                            if let Some(plate) = state.plates.get_mut(&p.plate) {
                                let after = plate.well_volume(well) + residual;
                                if after.definitely_greater(plate.plate_type.well_capacity) {
                                    rec.error(format!(
                                        "blowing out {residual} into well {well} exceeds \
                                         capacity {}",
                                        plate.plate_type.well_capacity
                                    ));
                                } else {
                                    plate.add_to_well(well, residual, None);
                                }
                            }
                        }
                    }
                }
            }
        }

        RobotInstruction::Mix(p) => {
            for &channel in &p.channels {
                if state.tip_on(p.head, channel).is_none() {
                    rec.error(format!(
                        "mix on head {} channel {channel} with no tip",
                        p.head
                    ));
                }
            }
        }

        RobotInstruction::Move(p) => {
            if !state.plates.contains_key(&p.plate)
                && !state
                    .positions
                    .values()
                    .any(|o| matches!(o, Occupant::Plate(id) if *id == p.plate))
            {
                rec.warn(format!("move references plate {} not on the deck", p.plate));
            }
        }

        RobotInstruction::AddPlateTo(p) => match state.positions.get(&p.position) {
            Some(occupant) => rec.error(format!(
                "position '{}' already holds {}; cannot place {}",
                p.position,
                occupant.id_string(),
                p.plate
            )),
            None => {
                state
                    .positions
                    .insert(p.position.clone(), Occupant::Plate(p.plate));
            }
        },

        RobotInstruction::RemovePlateAt(p) => {
            if state.positions.remove(&p.position).is_none() {
                rec.warn(format!("position '{}' was already empty", p.position));
            }
        }

        RobotInstruction::Message(p) => {
            rec.info(format!("operator message: {}", p.text));
        }

        RobotInstruction::SetSpeed(_)
        | RobotInstruction::Initialize
        | RobotInstruction::Finalize => {}

        RobotInstruction::TransferBlock(_)
        | RobotInstruction::SingleChannelBlock(_)
        | RobotInstruction::MultiChannelBlock(_) => {
            rec.error("block instruction reached the simulator unexpanded".to_string());
        }
    }
}

fn aspirate_lane(
    state: &mut DeckState,
    rec: &mut Recorder<'_>,
    head: usize,
    channel: u8,
    volume: Volume,
    plate_id: PlateId,
    well: WellAddress,
) {
    let Some(tip) = state.channel_tips.get_mut(&(head, channel)) else {
        rec.error(format!("aspirate on head {head} channel {channel} with no tip"));
        return;
    };
    let Some(plate) = state.plates.get_mut(&plate_id) else {
        rec.warn(format!("aspirate references plate {plate_id} not on the deck"));
        return;
    };
    let held = plate.well_volume(well);
    if volume.definitely_greater(held) {
        rec.error(format!(
            "aspirating {volume} from well {well} holding only {held}"
        ));
        return;
    }
    if (tip.contents + volume).definitely_greater(tip.tip_type.max_volume) {
        rec.error(format!(
            "aspirating {volume} would exceed tip capacity {} (tip holds {})",
            tip.tip_type.max_volume, tip.contents
        ));
        return;
    }
    plate.remove_from_well(well, volume);
    tip.contents += volume;
}

#[allow(clippy::too_many_arguments)]
fn dispense_lane(
    state: &mut DeckState,
    rec: &mut Recorder<'_>,
    head: usize,
    channel: u8,
    volume: Volume,
    plate_id: PlateId,
    well: WellAddress,
    what: &str,
) {
    let Some(tip) = state.channel_tips.get_mut(&(head, channel)) else {
        rec.error(format!("dispense on head {head} channel {channel} with no tip"));
        return;
    };
    if volume.definitely_greater(tip.contents) {
        rec.error(format!(
            "dispensing {volume} but the tip holds only {}",
            tip.contents
        ));
        return;
    }
    let Some(plate) = state.plates.get_mut(&plate_id) else {
        rec.warn(format!("dispense references plate {plate_id} not on the deck"));
        return;
    };
    let after = plate.well_volume(well) + volume;
    if after.definitely_greater(plate.plate_type.well_capacity) {
        rec.error(format!(
            "dispensing {volume} into well {well} exceeds capacity {}",
            plate.plate_type.well_capacity
        ));
        return;
    }
    tip.contents = (tip.contents - volume).clamp_zero();
    plate.add_to_well(well, volume, Some(what));
}
