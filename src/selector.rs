//! Channel selection: which head/tip combination moves a volume best.
//!
//! Selection is a pure function over the robot configuration. Every
//! (head, tip) pair is scored by an estimated transfer error and the
//! highest-scoring pair wins. Iteration order is fixed (heads in
//! configuration order, tip types sorted by name) and only a strictly
//! greater score replaces the incumbent, so ties resolve
//! deterministically to the earliest pair.

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;
use crate::resources::deck::RobotConfig;
use crate::resources::head::{EffectiveParams, Orientation};
use crate::units::Volume;

/// The selected head/tip combination for a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelChoice {
    /// Index of the head in the configuration.
    pub head_index: usize,
    /// Name of the chosen tip type.
    pub tip_type: String,
    /// Effective merged channel/tip envelope.
    pub params: EffectiveParams,
    /// Number of parallel channels the head offers.
    pub multiplicity: u8,
    /// How the head's channels run across the plate grid.
    pub orientation: Orientation,
    /// Channel pitch in millimetres.
    pub pitch_mm: f64,
    /// Whether the channels move independently.
    pub independent: bool,
    /// The score this pair achieved (diagnostic only).
    pub score: f64,
}

impl ChannelChoice {
    /// Number of discrete movements needed to move `volume`.
    #[must_use]
    pub fn movements_for(&self, volume: Volume) -> u32 {
        movements(volume, self.params.max_volume)
    }
}

fn movements(volume: Volume, max: Volume) -> u32 {
    if !volume.is_meaningful() || !max.is_meaningful() {
        return 1;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = (volume.as_ul() / max.as_ul()).ceil() as u32;
    n.max(1)
}

/// Estimated transfer error for moving `volume` with `params`.
///
/// One unit of error per required movement, plus how far the
/// per-movement volume sits from the top of the operable band. Lower
/// is better; score is its reciprocal.
fn estimated_error(volume: Volume, params: &EffectiveParams) -> f64 {
    let n = f64::from(movements(volume, params.max_volume));
    let per_shot = volume.as_ul() / n;
    let band = params.max_volume.as_ul() - params.min_volume.as_ul();
    let misfit = if band > 0.0 {
        ((params.max_volume.as_ul() - per_shot) / band).clamp(0.0, 1.0)
    } else {
        0.0
    };
    n + misfit
}

/// Picks the best channel/tip combination for a volume.
///
/// # Errors
/// [`SelectionError::NoHeadsLoaded`] if the configuration has no heads;
/// [`SelectionError::NoSuitableChannel`] if every usable pair's
/// effective minimum exceeds the requested volume.
pub fn choose(volume: Volume, config: &RobotConfig) -> Result<ChannelChoice, SelectionError> {
    if config.heads.is_empty() {
        return Err(SelectionError::NoHeadsLoaded);
    }

    let mut best: Option<ChannelChoice> = None;
    let mut best_minimum: Option<Volume> = None;

    for (head_index, head) in config.heads.iter().enumerate() {
        for tip in config.sorted_tip_types() {
            if !head.accepts(&tip.name) {
                continue;
            }
            let params = head.params.merge_with_tip(tip);
            if !params.is_usable() {
                continue;
            }

            best_minimum = Some(match best_minimum {
                Some(m) => m.min(params.min_volume),
                None => params.min_volume,
            });

            // Rounding tolerance: a volume a hair under the minimum is
            // still acceptable.
            if params.min_volume.definitely_greater(volume) {
                continue;
            }

            let score = 1.0 / estimated_error(volume, &params);
            let replace = match &best {
                Some(b) => score > b.score,
                None => true,
            };
            if replace {
                best = Some(ChannelChoice {
                    head_index,
                    tip_type: tip.name.clone(),
                    params: params.clone(),
                    multiplicity: head.params.multiplicity,
                    orientation: head.params.orientation,
                    pitch_mm: head.params.pitch_mm,
                    independent: head.params.independent,
                    score,
                });
            }
        }
    }

    best.ok_or(SelectionError::NoSuitableChannel {
        requested: volume,
        best_minimum: best_minimum.unwrap_or(Volume::ZERO),
    })
}

/// Applies [`choose`] independently to each volume.
///
/// Zero volumes are skipped (their slot is `None`); the first error
/// encountered is propagated.
pub fn choose_many(
    volumes: &[Volume],
    config: &RobotConfig,
) -> Result<Vec<Option<ChannelChoice>>, SelectionError> {
    let mut out = Vec::with_capacity(volumes.len());
    for &v in volumes {
        if v.is_meaningful() {
            out.push(Some(choose(v, config)?));
        } else {
            out.push(None);
        }
    }
    Ok(out)
}
