//! Heads, adaptors, and channel capability descriptors.
//!
//! These are physical capability descriptors loaded at
//! deck-configuration time and read-only during planning. The selector
//! merges a head's channel parameters with a tip type's range to obtain
//! the effective operating envelope of a (channel, tip) pair.

use serde::{Deserialize, Serialize};

use crate::resources::tip::TipType;
use crate::units::{FlowRate, Volume};

/// Orientation of a multi-channel head relative to the plate grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Channels run down a column (consecutive rows).
    Vertical,
    /// Channels run along a row (consecutive columns).
    Horizontal,
}

/// Capability envelope of one pipetting channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// Descriptor name, e.g. "LoVol" or "HiVol".
    pub name: String,
    /// Minimum volume the channel can move.
    pub min_volume: Volume,
    /// Maximum volume the channel can move in one stroke.
    pub max_volume: Volume,
    /// Minimum pipetting flow rate.
    pub min_flow: FlowRate,
    /// Maximum pipetting flow rate.
    pub max_flow: FlowRate,
    /// Number of parallel tips (1 for a single channel).
    pub multiplicity: u8,
    /// Channel orientation when `multiplicity > 1`.
    pub orientation: Orientation,
    /// Whether channels can move independently of each other.
    pub independent: bool,
    /// Centre-to-centre channel spacing in millimetres.
    pub pitch_mm: f64,
}

/// Effective operating envelope of a (channel, tip) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveParams {
    /// Intersected minimum volume.
    pub min_volume: Volume,
    /// Intersected maximum volume.
    pub max_volume: Volume,
    /// Intersected minimum flow rate.
    pub min_flow: FlowRate,
    /// Intersected maximum flow rate.
    pub max_flow: FlowRate,
}

impl ChannelParams {
    /// Intersects this channel's envelope with a tip's range.
    ///
    /// The effective minimum is the larger of the two minima and the
    /// effective maximum the smaller of the two maxima; a pair whose
    /// intersection is empty can move nothing.
    #[must_use]
    pub fn merge_with_tip(&self, tip: &TipType) -> EffectiveParams {
        EffectiveParams {
            min_volume: self.min_volume.max(tip.min_volume),
            max_volume: self.max_volume.min(tip.max_volume),
            min_flow: self.min_flow,
            max_flow: self.max_flow,
        }
    }
}

impl EffectiveParams {
    /// True if the envelope can move any volume at all.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.min_volume.definitely_greater(self.max_volume)
    }
}

/// An adaptor mounted between a head and its tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adaptor {
    /// Adaptor name.
    pub name: String,
    /// Tip type names this adaptor accepts.
    pub accepts_tips: Vec<String>,
}

/// A pipetting head: an adaptor plus a channel capability envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Head {
    /// Head name, e.g. "left_head".
    pub name: String,
    /// The mounted adaptor.
    pub adaptor: Adaptor,
    /// Channel capabilities (shared by all channels of the head).
    pub params: ChannelParams,
}

impl Head {
    /// True if this head can pick up the named tip type.
    #[must_use]
    pub fn accepts(&self, tip_type: &str) -> bool {
        self.adaptor.accepts_tips.iter().any(|t| t == tip_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(min: f64, max: f64) -> ChannelParams {
        ChannelParams {
            name: "test".to_string(),
            min_volume: Volume::ul(min),
            max_volume: Volume::ul(max),
            min_flow: FlowRate::ul_per_s(0.5),
            max_flow: FlowRate::ul_per_s(500.0),
            multiplicity: 8,
            orientation: Orientation::Vertical,
            independent: false,
            pitch_mm: 9.0,
        }
    }

    fn tip(min: f64, max: f64) -> TipType {
        TipType {
            name: "t".to_string(),
            min_volume: Volume::ul(min),
            max_volume: Volume::ul(max),
            filtered: false,
        }
    }

    #[test]
    fn merge_takes_intersection() {
        let eff = head(0.5, 1000.0).merge_with_tip(&tip(10.0, 200.0));
        assert!(eff.min_volume.approx_eq(Volume::ul(10.0)));
        assert!(eff.max_volume.approx_eq(Volume::ul(200.0)));
        assert!(eff.is_usable());
    }

    #[test]
    fn empty_intersection_is_unusable() {
        let eff = head(500.0, 1000.0).merge_with_tip(&tip(10.0, 200.0));
        assert!(!eff.is_usable());
    }

    #[test]
    fn adaptor_gates_tip_types() {
        let h = Head {
            name: "left".to_string(),
            adaptor: Adaptor {
                name: "std".to_string(),
                accepts_tips: vec!["tip_200".to_string()],
            },
            params: head(0.5, 200.0),
        };
        assert!(h.accepts("tip_200"));
        assert!(!h.accepts("tip_1000"));
    }
}
