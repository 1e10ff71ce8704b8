//! Refinement: expanding block instructions into hardware primitives.
//!
//! Refinement is driven from the outside by the instruction tree, one
//! level at a time: a block refines into children against a mutable
//! copy of the robot configuration (consuming tips, moving well
//! volumes), and terminals refine to [`Refinement::Terminal`] without
//! touching state. Running the same plan against a fresh configuration
//! copy therefore always yields the same primitives.

use crate::decompose;
use crate::error::{PlanResult, PlanningError};
use crate::instruction::{
    Aspirate, Blowout, Dispense, LoadTips, MixWells, Move, MultiChannelBlock, RobotInstruction,
    SetSpeed, SingleChannelBlock, UnloadTips, WellReference,
};
use crate::policy::{options, Policy, PolicyRuleSet};
use crate::resources::deck::RobotConfig;
use crate::resources::tip::{TipboxId, TipwasteId};
use crate::units::{FlowRate, Volume};

/// The outcome of refining one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Refinement {
    /// The instruction expanded into these children, in execution order.
    Children(Vec<RobotInstruction>),
    /// The instruction is a hardware primitive; nothing below it.
    Terminal,
}

impl RobotInstruction {
    /// Refines this instruction one level against the configuration.
    ///
    /// Block variants expand and mutate `config` to reflect the liquid
    /// and tip movements their children will perform; terminal variants
    /// leave it untouched.
    pub fn refine(
        &self,
        config: &mut RobotConfig,
        ruleset: &PolicyRuleSet,
    ) -> PlanResult<Refinement> {
        match self {
            Self::TransferBlock(block) => Ok(Refinement::Children(decompose::decompose(
                &block.transfers,
                config,
                ruleset,
            )?)),
            Self::SingleChannelBlock(block) => {
                expand_single(block, config, ruleset).map(Refinement::Children)
            }
            Self::MultiChannelBlock(block) => {
                expand_multi(block, config, ruleset).map(Refinement::Children)
            }
            _ => Ok(Refinement::Terminal),
        }
    }
}

/// Per-class pipetting parameters pulled out of a resolved policy.
struct ClassParams {
    asp_speed: Option<FlowRate>,
    dsp_speed: Option<FlowRate>,
    asp_z_mm: f64,
    dsp_z_mm: f64,
    post_mix: u32,
    post_mix_volume: Option<Volume>,
    blowout: bool,
    touch_off: bool,
}

impl ClassParams {
    fn from_policy(policy: &Policy) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let post_mix = policy.get_int(options::POST_MIX).max(0) as u32;
        Self {
            asp_speed: policy.get_f64(options::ASP_SPEED).map(FlowRate::ul_per_s),
            dsp_speed: policy.get_f64(options::DSP_SPEED).map(FlowRate::ul_per_s),
            asp_z_mm: policy.get_f64(options::ASP_Z_OFFSET).unwrap_or(0.5),
            dsp_z_mm: policy.get_f64(options::DSP_Z_OFFSET).unwrap_or(0.5),
            post_mix,
            post_mix_volume: policy.get_volume(options::POST_MIX_VOLUME),
            blowout: policy.get_bool(options::BLOWOUT, false),
            touch_off: policy.get_bool(options::TOUCH_OFF, false),
        }
    }

    /// A speed override instruction, when the policy set either rate.
    fn speed_override(&self, head: usize, config: &RobotConfig) -> Option<RobotInstruction> {
        if self.asp_speed.is_none() && self.dsp_speed.is_none() {
            return None;
        }
        let fallback = config
            .heads
            .get(head)
            .map_or(FlowRate::ul_per_s(100.0), |h| h.params.max_flow);
        Some(RobotInstruction::SetSpeed(SetSpeed {
            head,
            aspirate: self.asp_speed.unwrap_or(fallback),
            dispense: self.dsp_speed.unwrap_or(fallback),
        }))
    }
}

/// Takes `count` tips of a type from whichever tipbox has them.
fn take_tips(config: &mut RobotConfig, tip_type: &str, count: usize) -> PlanResult<TipboxId> {
    let id = config
        .tipbox_with(tip_type, count)
        .map(|b| b.id)
        .ok_or_else(|| PlanningError::OutOfTips {
            tip_type: tip_type.to_string(),
            count,
        })?;
    if let Some(tipbox) = config.tipboxes.get_mut(&id) {
        tipbox.take(count);
    }
    Ok(id)
}

/// Disposes `count` tips into whichever tipwaste has room.
fn drop_tips(config: &mut RobotConfig, count: usize) -> PlanResult<TipwasteId> {
    let id = config
        .tipwaste_with_room(count)
        .map(|w| w.id)
        .ok_or(PlanningError::TipwasteFull { count })?;
    if let Some(waste) = config.tipwastes.get_mut(&id) {
        waste.dispose(count);
    }
    Ok(id)
}

fn expand_single(
    block: &SingleChannelBlock,
    config: &mut RobotConfig,
    ruleset: &PolicyRuleSet,
) -> PlanResult<Vec<RobotInstruction>> {
    let policy = ruleset.resolve_for_class_or_default(&block.what)?;
    let params = ClassParams::from_policy(&policy);
    let head = block.head;

    let mut out = Vec::new();
    if let Some(speed) = params.speed_override(head, config) {
        out.push(speed);
    }

    for t in &block.transfers {
        let tipbox = take_tips(config, &block.tip_type, 1)?;
        out.push(RobotInstruction::LoadTips(LoadTips {
            head,
            channels: vec![0],
            tip_type: block.tip_type.clone(),
            tipbox,
        }));

        out.push(RobotInstruction::Move(Move {
            head,
            plate: t.from_plate,
            wells: vec![t.from_well],
            reference: WellReference::WellBottom,
            z_offset_mm: params.asp_z_mm,
        }));
        out.push(RobotInstruction::Aspirate(Aspirate {
            head,
            channels: vec![0],
            volumes: vec![t.volume],
            plate: t.from_plate,
            wells: vec![t.from_well],
            what: block.what.clone(),
            flow_rate: params.asp_speed,
        }));
        config.plate_mut(t.from_plate)?.remove_from_well(t.from_well, t.volume);

        out.push(RobotInstruction::Move(Move {
            head,
            plate: t.to_plate,
            wells: vec![t.to_well],
            reference: WellReference::WellBottom,
            z_offset_mm: params.dsp_z_mm,
        }));
        out.push(RobotInstruction::Dispense(Dispense {
            head,
            channels: vec![0],
            volumes: vec![t.volume],
            plate: t.to_plate,
            wells: vec![t.to_well],
            what: block.what.clone(),
            flow_rate: params.dsp_speed,
        }));
        config
            .plate_mut(t.to_plate)?
            .add_to_well(t.to_well, t.volume, Some(&block.what));

        if params.post_mix > 0 {
            out.push(RobotInstruction::Mix(MixWells {
                head,
                channels: vec![0],
                volume: params.post_mix_volume.unwrap_or(t.volume * 0.5),
                cycles: params.post_mix,
                plate: t.to_plate,
                wells: vec![t.to_well],
            }));
        }
        if params.blowout {
            out.push(RobotInstruction::Blowout(Blowout {
                head,
                channels: vec![0],
                plate: t.to_plate,
                wells: vec![t.to_well],
            }));
        }
        if params.touch_off {
            out.push(RobotInstruction::Move(Move {
                head,
                plate: t.to_plate,
                wells: vec![t.to_well],
                reference: WellReference::WellTop,
                z_offset_mm: 0.0,
            }));
        }

        let tipwaste = drop_tips(config, 1)?;
        out.push(RobotInstruction::UnloadTips(UnloadTips {
            head,
            channels: vec![0],
            tipwaste,
        }));
    }
    Ok(out)
}

fn expand_multi(
    block: &MultiChannelBlock,
    config: &mut RobotConfig,
    ruleset: &PolicyRuleSet,
) -> PlanResult<Vec<RobotInstruction>> {
    let policy = ruleset.resolve_for_class_or_default(&block.what)?;
    let params = ClassParams::from_policy(&policy);
    let head = block.head;
    let lanes = block.lanes.len();
    #[allow(clippy::cast_possible_truncation)]
    let channels: Vec<u8> = (0..lanes as u8).collect();
    // All lanes share one source plate and one destination plate.
    let from_plate = block
        .lanes
        .first()
        .map(|l| l.from_plate)
        .ok_or_else(|| PlanningError::UnknownResource {
            kind: "lane",
            id: "empty multichannel block".to_string(),
        })?;
    let to_plate = block.lanes[0].to_plate;
    let from_wells: Vec<_> = block.lanes.iter().map(|l| l.from_well).collect();
    let to_wells: Vec<_> = block.lanes.iter().map(|l| l.to_well).collect();
    let volumes = vec![block.volume; lanes];

    let mut out = Vec::new();
    if let Some(speed) = params.speed_override(head, config) {
        out.push(speed);
    }

    let tipbox = take_tips(config, &block.tip_type, lanes)?;
    out.push(RobotInstruction::LoadTips(LoadTips {
        head,
        channels: channels.clone(),
        tip_type: block.tip_type.clone(),
        tipbox,
    }));

    out.push(RobotInstruction::Move(Move {
        head,
        plate: from_plate,
        wells: from_wells.clone(),
        reference: WellReference::WellBottom,
        z_offset_mm: params.asp_z_mm,
    }));
    out.push(RobotInstruction::Aspirate(Aspirate {
        head,
        channels: channels.clone(),
        volumes: volumes.clone(),
        plate: from_plate,
        wells: from_wells.clone(),
        what: block.what.clone(),
        flow_rate: params.asp_speed,
    }));
    for well in &from_wells {
        config.plate_mut(from_plate)?.remove_from_well(*well, block.volume);
    }

    out.push(RobotInstruction::Move(Move {
        head,
        plate: to_plate,
        wells: to_wells.clone(),
        reference: WellReference::WellBottom,
        z_offset_mm: params.dsp_z_mm,
    }));
    out.push(RobotInstruction::Dispense(Dispense {
        head,
        channels: channels.clone(),
        volumes,
        plate: to_plate,
        wells: to_wells.clone(),
        what: block.what.clone(),
        flow_rate: params.dsp_speed,
    }));
    for well in &to_wells {
        config
            .plate_mut(to_plate)?
            .add_to_well(*well, block.volume, Some(&block.what));
    }

    if params.post_mix > 0 {
        out.push(RobotInstruction::Mix(MixWells {
            head,
            channels: channels.clone(),
            volume: params.post_mix_volume.unwrap_or(block.volume * 0.5),
            cycles: params.post_mix,
            plate: to_plate,
            wells: to_wells.clone(),
        }));
    }
    if params.blowout {
        out.push(RobotInstruction::Blowout(Blowout {
            head,
            channels: channels.clone(),
            plate: to_plate,
            wells: to_wells.clone(),
        }));
    }
    if params.touch_off {
        out.push(RobotInstruction::Move(Move {
            head,
            plate: to_plate,
            wells: to_wells,
            reference: WellReference::WellTop,
            z_offset_mm: 0.0,
        }));
    }

    let tipwaste = drop_tips(config, lanes)?;
    out.push(RobotInstruction::UnloadTips(UnloadTips {
        head,
        channels,
        tipwaste,
    }));
    Ok(out)
}
