//! Transfer decomposition: volumes into channel-sized, batched blocks.
//!
//! Each requested transfer is first split against the selected
//! channel's range, threading running source/destination volumes
//! through the pieces. In-range sub-transfers sharing a liquid class,
//! source plate, destination plate, and physical tip-to-well alignment
//! are grouped into multi-channel batches; everything else is emitted
//! as single-channel blocks in original order, coalesced by consecutive
//! same-class runs.

use std::collections::BTreeMap;

use crate::error::{DecomposeError, PlanResult};
use crate::instruction::{
    MultiChannelBlock, RobotInstruction, SingleChannelBlock, TransferRequest,
};
use crate::policy::{options, PolicyRuleSet};
use crate::resources::deck::RobotConfig;
use crate::resources::head::Orientation;
use crate::resources::plate::{Plate, PlateId, WellAddress};
use crate::selector;
use crate::units::Volume;

/// A sub-transfer annotated with its channel selection.
#[derive(Debug, Clone)]
struct Sub {
    req: TransferRequest,
    head: usize,
    tip_type: String,
    multiplicity: u8,
    orientation: Orientation,
    pitch_mm: f64,
}

enum Emission {
    Single(Sub),
    Multi(MultiChannelBlock),
}

/// Decomposes a transfer set into single- and multi-channel blocks.
///
/// Volume accounting is validated eagerly: insufficient sources,
/// destination overfills, and unsplittable volumes are reported before
/// any instruction is emitted.
pub fn decompose(
    transfers: &[TransferRequest],
    config: &RobotConfig,
    ruleset: &PolicyRuleSet,
) -> PlanResult<Vec<RobotInstruction>> {
    let mut subs = split_to_range(transfers, config)?;
    let mut used = vec![false; subs.len()];
    let mut can_multi_cache: BTreeMap<String, bool> = BTreeMap::new();
    let mut emissions: Vec<Emission> = Vec::new();

    let mut i = 0;
    while i < subs.len() {
        if used[i] {
            i += 1;
            continue;
        }

        let what = subs[i].req.what.clone();
        let can_multi = match can_multi_cache.get(&what) {
            Some(v) => *v,
            None => {
                let policy = ruleset.resolve_for_class_or_default(&what)?;
                let v = policy.get_bool(options::CAN_MULTI, true);
                can_multi_cache.insert(what.clone(), v);
                v
            }
        };

        if can_multi && subs[i].multiplicity > 1 {
            if let Some(block) = try_batch(i, &mut subs, &mut used, config)? {
                emissions.push(Emission::Multi(block));
                i += 1;
                continue;
            }
        }

        used[i] = true;
        emissions.push(Emission::Single(subs[i].clone()));
        i += 1;
    }

    Ok(coalesce(emissions))
}

/// Splits each transfer into sub-transfers within the selected
/// channel's range, threading running from/to volumes.
fn split_to_range(transfers: &[TransferRequest], config: &RobotConfig) -> PlanResult<Vec<Sub>> {
    let mut source_level: BTreeMap<(PlateId, WellAddress), Volume> = BTreeMap::new();
    let mut dest_level: BTreeMap<(PlateId, WellAddress), Volume> = BTreeMap::new();
    let mut out = Vec::new();

    for t in transfers {
        if t.volume.is_negative() {
            return Err(DecomposeError::NegativeVolume {
                volume: t.volume,
                instruction: t.summary(),
            }
            .into());
        }
        // Approximately-zero volumes are dropped, not emitted as no-ops.
        if !t.volume.is_meaningful() {
            continue;
        }

        let from_plate = config.plate(t.from_plate)?;
        let to_plate = config.plate(t.to_plate)?;

        let src_key = (t.from_plate, t.from_well);
        let src_before = *source_level
            .entry(src_key)
            .or_insert_with(|| from_plate.well_volume(t.from_well));
        let available = (src_before - from_plate.plate_type.well_residual).max(Volume::ZERO);
        if t.volume.definitely_greater(available) {
            return Err(DecomposeError::InsufficientSource {
                well: t.from_well.to_string(),
                available,
                requested: t.volume,
            }
            .into());
        }

        let dst_key = (t.to_plate, t.to_well);
        let dst_before = *dest_level
            .entry(dst_key)
            .or_insert_with(|| to_plate.well_volume(t.to_well));
        if (dst_before + t.volume).definitely_greater(to_plate.plate_type.well_capacity) {
            return Err(DecomposeError::WellOverfill {
                volume: t.volume,
                well: t.to_well.to_string(),
                capacity: to_plate.plate_type.well_capacity,
            }
            .into());
        }

        let choice = selector::choose(t.volume, config)?;
        let pieces = if t.volume.definitely_greater(choice.params.max_volume) {
            let n = choice.movements_for(t.volume);
            let per = t.volume / f64::from(n);
            if per.definitely_less(choice.params.min_volume) {
                return Err(DecomposeError::VolumeBelowMinimum {
                    requested: per,
                    minimum: choice.params.min_volume,
                    instruction: t.summary(),
                }
                .into());
            }
            vec![per; n as usize]
        } else {
            vec![t.volume]
        };

        let mut src_running = src_before;
        let mut dst_running = dst_before;
        for piece in pieces {
            // Each piece is within the chosen channel's range; re-selection
            // is unnecessary because min <= piece <= max by construction.
            out.push(Sub {
                req: TransferRequest {
                    volume: piece,
                    from_volume: Some(src_running),
                    to_volume: Some(dst_running),
                    ..t.clone()
                },
                head: choice.head_index,
                tip_type: choice.tip_type.clone(),
                multiplicity: choice.multiplicity,
                orientation: choice.orientation,
                pitch_mm: choice.pitch_mm,
            });
            src_running = (src_running - piece).clamp_zero();
            dst_running += piece;
        }
        source_level.insert(src_key, src_running);
        dest_level.insert(dst_key, dst_running);
    }

    Ok(out)
}

/// Attempts to form a multi-channel batch seeded at `seed`.
///
/// On success the grouped lanes are marked used, leftover lane volumes
/// are re-enqueued (or forced to zero under the leave-volume floor),
/// and the block is returned.
fn try_batch(
    seed: usize,
    subs: &mut Vec<Sub>,
    used: &mut Vec<bool>,
    config: &RobotConfig,
) -> PlanResult<Option<MultiChannelBlock>> {
    let key = (
        subs[seed].req.what.clone(),
        subs[seed].head,
        subs[seed].tip_type.clone(),
        subs[seed].req.from_plate,
        subs[seed].req.to_plate,
    );
    let multiplicity = subs[seed].multiplicity as usize;

    let mut group = vec![seed];
    for j in (seed + 1)..subs.len() {
        if used[j] || group.len() >= multiplicity {
            continue;
        }
        let s = &subs[j];
        if (s.req.what.clone(), s.head, s.tip_type.clone(), s.req.from_plate, s.req.to_plate) == key
        {
            group.push(j);
        }
    }
    if group.len() < 2 {
        return Ok(None);
    }

    // Order lanes along the head's axis: down a column for vertical
    // heads, along a row for horizontal ones.
    let orientation = subs[seed].orientation;
    match orientation {
        Orientation::Vertical => {
            group.sort_by_key(|&k| (subs[k].req.to_well.col, subs[k].req.to_well.row));
        }
        Orientation::Horizontal => {
            group.sort_by_key(|&k| (subs[k].req.to_well.row, subs[k].req.to_well.col));
        }
    }

    let from_plate = config.plate(key.3)?;
    let to_plate = config.plate(key.4)?;
    let pitch = subs[seed].pitch_mm;
    let from_wells: Vec<WellAddress> = group.iter().map(|&k| subs[k].req.from_well).collect();
    let to_wells: Vec<WellAddress> = group.iter().map(|&k| subs[k].req.to_well).collect();
    if !wells_aligned(&from_wells, from_plate, pitch, orientation)
        || !wells_aligned(&to_wells, to_plate, pitch, orientation)
    {
        return Ok(None);
    }

    let batch = group
        .iter()
        .map(|&k| subs[k].req.volume)
        .fold(None::<Volume>, |acc, v| {
            Some(acc.map_or(v, |a| a.min(v)))
        })
        .unwrap_or(Volume::ZERO);

    let mut lanes = Vec::with_capacity(group.len());
    let mut leftovers = Vec::new();
    for &k in &group {
        used[k] = true;
        let sub = subs[k].clone();
        let leftover = sub.req.volume - batch;
        if leftover.is_meaningful() {
            if leftover.definitely_less(config.min_leave_volume) {
                // Forced to zero: a micro-dispense this small is
                // physically unreliable.
            } else {
                // The original selection was made for the full lane
                // volume; the leftover may need a different channel.
                let choice = selector::choose(leftover, config)?;
                let mut rest = sub.clone();
                rest.req.volume = leftover;
                rest.req.from_volume = sub.req.from_volume.map(|v| (v - batch).clamp_zero());
                rest.req.to_volume = sub.req.to_volume.map(|v| v + batch);
                rest.head = choice.head_index;
                rest.tip_type = choice.tip_type;
                rest.multiplicity = choice.multiplicity;
                rest.orientation = choice.orientation;
                rest.pitch_mm = choice.pitch_mm;
                leftovers.push(rest);
            }
        }
        let mut lane = sub.req;
        lane.volume = batch;
        lanes.push(lane);
    }
    for rest in leftovers {
        subs.push(rest);
        used.push(false);
    }

    Ok(Some(MultiChannelBlock {
        what: key.0,
        head: key.1,
        tip_type: key.2,
        lanes,
        volume: batch,
    }))
}

/// True if parallel channels at `pitch_mm` can contact these wells in
/// one motion: either a single shared trough well, or distinct wells at
/// consecutive positions along the head's axis (rows for a vertical
/// head, columns for a horizontal one) with the plate pitch matching
/// the channel pitch.
fn wells_aligned(
    wells: &[WellAddress],
    plate: &Plate,
    pitch_mm: f64,
    orientation: Orientation,
) -> bool {
    if wells.is_empty() {
        return false;
    }
    if wells.iter().all(|w| *w == wells[0]) {
        return plate.plate_type.trough;
    }
    if (plate.plate_type.well_pitch_mm - pitch_mm).abs() > 0.01 {
        return false;
    }
    wells.windows(2).all(|pair| match orientation {
        Orientation::Vertical => pair[1] == pair[0].next_row(),
        Orientation::Horizontal => pair[1] == pair[0].next_col(),
    })
}

/// Coalesces consecutive single-channel emissions sharing a liquid
/// class (and channel selection) into one block.
fn coalesce(emissions: Vec<Emission>) -> Vec<RobotInstruction> {
    let mut out = Vec::new();
    let mut run: Option<SingleChannelBlock> = None;

    for e in emissions {
        match e {
            Emission::Multi(block) => {
                if let Some(r) = run.take() {
                    out.push(RobotInstruction::SingleChannelBlock(r));
                }
                out.push(RobotInstruction::MultiChannelBlock(block));
            }
            Emission::Single(sub) => {
                let extend = matches!(
                    &run,
                    Some(r) if r.what == sub.req.what
                        && r.head == sub.head
                        && r.tip_type == sub.tip_type
                );
                if extend {
                    if let Some(r) = run.as_mut() {
                        r.transfers.push(sub.req);
                    }
                } else {
                    if let Some(r) = run.take() {
                        out.push(RobotInstruction::SingleChannelBlock(r));
                    }
                    run = Some(SingleChannelBlock {
                        what: sub.req.what.clone(),
                        head: sub.head,
                        tip_type: sub.tip_type,
                        transfers: vec![sub.req],
                    });
                }
            }
        }
    }
    if let Some(r) = run.take() {
        out.push(RobotInstruction::SingleChannelBlock(r));
    }
    out
}
