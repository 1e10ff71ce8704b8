//! The mutable deck/head/tip model the simulator replays against.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resources::deck::{DeckItem, RobotConfig};
use crate::resources::plate::{Plate, PlateId};
use crate::resources::tip::{TipType, TipboxId, TipwasteId};
use crate::units::Volume;

/// What a deck position holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Occupant {
    /// A plate.
    Plate(PlateId),
    /// A tipbox.
    Tipbox(TipboxId),
    /// A tipwaste.
    Tipwaste(TipwasteId),
}

impl Occupant {
    /// The occupant's id, stringified for diagnostics.
    #[must_use]
    pub fn id_string(&self) -> String {
        match self {
            Self::Plate(id) => id.to_string(),
            Self::Tipbox(id) => id.to_string(),
            Self::Tipwaste(id) => id.to_string(),
        }
    }
}

/// A tip currently loaded on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTip {
    /// The loaded tip's type.
    pub tip_type: TipType,
    /// Liquid currently held in the tip.
    pub contents: Volume,
}

/// The simulator's world: positions, plates, tips, and channel state.
///
/// Each position holds at most one labware item; each (head, channel)
/// slot holds at most one tip. Both constraints are enforced by the
/// replay transitions, not by this container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckState {
    /// Deck position name -> occupant.
    pub positions: BTreeMap<String, Occupant>,
    /// Plate state by id.
    pub plates: BTreeMap<PlateId, Plate>,
    /// Remaining tips per tipbox.
    pub tipbox_remaining: BTreeMap<TipboxId, usize>,
    /// (capacity, contents) per tipwaste.
    pub tipwaste_fill: BTreeMap<TipwasteId, (usize, usize)>,
    /// Loaded tip per (head index, channel index).
    pub channel_tips: BTreeMap<(usize, u8), ChannelTip>,
    /// Known tip types by name.
    pub tip_types: BTreeMap<String, TipType>,
}

impl DeckState {
    /// Builds the initial world from a robot configuration.
    #[must_use]
    pub fn from_config(config: &RobotConfig) -> Self {
        let positions = config
            .layout
            .iter()
            .map(|(name, item)| {
                let occupant = match item {
                    DeckItem::Plate(id) => Occupant::Plate(*id),
                    DeckItem::Tipbox(id) => Occupant::Tipbox(*id),
                    DeckItem::Tipwaste(id) => Occupant::Tipwaste(*id),
                };
                (name.clone(), occupant)
            })
            .collect();
        Self {
            positions,
            plates: config.plates.clone(),
            tipbox_remaining: config
                .tipboxes
                .iter()
                .map(|(id, b)| (*id, b.remaining))
                .collect(),
            tipwaste_fill: config
                .tipwastes
                .iter()
                .map(|(id, w)| (*id, (w.capacity, w.contents)))
                .collect(),
            channel_tips: BTreeMap::new(),
            tip_types: config
                .tip_types
                .iter()
                .map(|t| (t.name.clone(), t.clone()))
                .collect(),
        }
    }

    /// The tip loaded on a channel, if any.
    #[must_use]
    pub fn tip_on(&self, head: usize, channel: u8) -> Option<&ChannelTip> {
        self.channel_tips.get(&(head, channel))
    }

    /// Number of channels currently carrying tips.
    #[must_use]
    pub fn loaded_channels(&self) -> usize {
        self.channel_tips.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::inventory::Inventory;
    use crate::resources::plate::WellAddress;

    #[test]
    fn from_config_mirrors_layout_and_volumes() {
        let inv = Inventory::with_standard_types();
        let mut config = RobotConfig::new(Vec::new(), Vec::new());
        let mut plate = inv.new_plate("pcrplate_96").unwrap();
        plate.fill_well(WellAddress::new(0, 0), Volume::ul(50.0), "water");
        let plate_id = config.add_plate("position_1", plate);
        config.add_tipbox("position_2", inv.new_tipbox("tipbox_200").unwrap());
        config.add_tipwaste("position_3", inv.new_tipwaste("tipwaste").unwrap());

        let state = DeckState::from_config(&config);
        assert_eq!(state.positions.len(), 3);
        assert!(state.plates[&plate_id]
            .well_volume(WellAddress::new(0, 0))
            .approx_eq(Volume::ul(50.0)));
        assert_eq!(state.tipbox_remaining.values().copied().sum::<usize>(), 96);
        assert_eq!(state.loaded_channels(), 0);
        assert!(state.tip_types.contains_key("tip_200"));
    }
}
