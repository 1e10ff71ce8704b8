//! The robot configuration: heads, loaded labware, and deck layout.
//!
//! All cross-references between resources are id lookups into the maps
//! held here, so duplicating the whole configuration for a dry-run
//! planning pass is a plain structural `clone()` rather than a deep
//! pointer-graph copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PlanningError;
use crate::resources::head::Head;
use crate::resources::plate::{Plate, PlateId, WellAddress};
use crate::resources::tip::{Tipbox, TipboxId, TipType, Tipwaste, TipwasteId};
use crate::units::Volume;

/// What occupies a deck position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DeckItem {
    /// A plate.
    Plate(PlateId),
    /// A tipbox.
    Tipbox(TipboxId),
    /// A tipwaste.
    Tipwaste(TipwasteId),
}

/// The robot's loaded resources and deck layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Loaded heads, in configuration order.
    pub heads: Vec<Head>,
    /// Tip types available on deck.
    pub tip_types: Vec<TipType>,
    /// Plates by id.
    pub plates: BTreeMap<PlateId, Plate>,
    /// Tipboxes by id.
    pub tipboxes: BTreeMap<TipboxId, Tipbox>,
    /// Tipwastes by id.
    pub tipwastes: BTreeMap<TipwasteId, Tipwaste>,
    /// Deck position name -> occupant.
    pub layout: BTreeMap<String, DeckItem>,
    /// Smallest leftover volume worth dispensing separately; lanes that
    /// would leave less than this behind are rounded to take nothing.
    pub min_leave_volume: Volume,
}

impl RobotConfig {
    /// Default minimum leave volume, in microlitres.
    pub const DEFAULT_MIN_LEAVE_UL: f64 = 5.0;

    /// Creates an empty configuration with the given heads.
    #[must_use]
    pub fn new(heads: Vec<Head>, tip_types: Vec<TipType>) -> Self {
        Self {
            heads,
            tip_types,
            plates: BTreeMap::new(),
            tipboxes: BTreeMap::new(),
            tipwastes: BTreeMap::new(),
            layout: BTreeMap::new(),
            min_leave_volume: Volume::ul(Self::DEFAULT_MIN_LEAVE_UL),
        }
    }

    /// Places a plate at a deck position and returns its id.
    pub fn add_plate(&mut self, position: impl Into<String>, plate: Plate) -> PlateId {
        let id = plate.id;
        self.layout.insert(position.into(), DeckItem::Plate(id));
        self.plates.insert(id, plate);
        id
    }

    /// Places a tipbox at a deck position and returns its id.
    pub fn add_tipbox(&mut self, position: impl Into<String>, tipbox: Tipbox) -> TipboxId {
        let id = tipbox.id;
        self.layout.insert(position.into(), DeckItem::Tipbox(id));
        if !self.tip_types.iter().any(|t| t.name == tipbox.tip_type.name) {
            self.tip_types.push(tipbox.tip_type.clone());
        }
        self.tipboxes.insert(id, tipbox);
        id
    }

    /// Places a tipwaste at a deck position and returns its id.
    pub fn add_tipwaste(&mut self, position: impl Into<String>, tipwaste: Tipwaste) -> TipwasteId {
        let id = tipwaste.id;
        self.layout.insert(position.into(), DeckItem::Tipwaste(id));
        self.tipwastes.insert(id, tipwaste);
        id
    }

    /// Looks up a plate by id.
    pub fn plate(&self, id: PlateId) -> Result<&Plate, PlanningError> {
        self.plates.get(&id).ok_or(PlanningError::UnknownResource {
            kind: "plate",
            id: id.to_string(),
        })
    }

    /// Looks up a plate mutably by id.
    pub fn plate_mut(&mut self, id: PlateId) -> Result<&mut Plate, PlanningError> {
        self.plates
            .get_mut(&id)
            .ok_or(PlanningError::UnknownResource {
                kind: "plate",
                id: id.to_string(),
            })
    }

    /// Finds a tipbox holding the named tip type with at least `count`
    /// tips remaining.
    #[must_use]
    pub fn tipbox_with(&self, tip_type: &str, count: usize) -> Option<&Tipbox> {
        self.tipboxes
            .values()
            .find(|b| b.tip_type.name == tip_type && b.remaining >= count)
    }

    /// The first tipwaste with room for `count` more tips.
    #[must_use]
    pub fn tipwaste_with_room(&self, count: usize) -> Option<&Tipwaste> {
        self.tipwastes
            .values()
            .find(|w| w.contents + count <= w.capacity)
    }

    /// Volume available for aspiration in a well.
    pub fn available_volume(
        &self,
        plate: PlateId,
        well: WellAddress,
    ) -> Result<Volume, PlanningError> {
        Ok(self.plate(plate)?.available_volume(well))
    }

    /// Tip types this configuration can actually use, name-sorted for
    /// deterministic iteration.
    #[must_use]
    pub fn sorted_tip_types(&self) -> Vec<&TipType> {
        let mut tips: Vec<&TipType> = self.tip_types.iter().collect();
        tips.sort_by(|a, b| a.name.cmp(&b.name));
        tips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::head::{Adaptor, ChannelParams, Orientation};
    use crate::resources::plate::PlateType;
    use crate::units::FlowRate;

    fn config() -> RobotConfig {
        let head = Head {
            name: "left".to_string(),
            adaptor: Adaptor {
                name: "std".to_string(),
                accepts_tips: vec!["tip_200".to_string()],
            },
            params: ChannelParams {
                name: "LoVol".to_string(),
                min_volume: Volume::ul(0.5),
                max_volume: Volume::ul(200.0),
                min_flow: FlowRate::ul_per_s(0.1),
                max_flow: FlowRate::ul_per_s(500.0),
                multiplicity: 8,
                orientation: Orientation::Vertical,
                independent: false,
                pitch_mm: 9.0,
            },
        };
        RobotConfig::new(vec![head], Vec::new())
    }

    fn tip_200() -> TipType {
        TipType {
            name: "tip_200".to_string(),
            min_volume: Volume::ul(10.0),
            max_volume: Volume::ul(200.0),
            filtered: false,
        }
    }

    #[test]
    fn add_tipbox_registers_tip_type() {
        let mut cfg = config();
        assert!(cfg.tip_types.is_empty());
        cfg.add_tipbox("position_2", Tipbox::new("box", tip_200(), 96));
        assert_eq!(cfg.tip_types.len(), 1);
        assert!(cfg.tipbox_with("tip_200", 8).is_some());
        assert!(cfg.tipbox_with("tip_200", 97).is_none());
        assert!(cfg.tipbox_with("tip_1000", 1).is_none());
    }

    #[test]
    fn plate_lookup_errors_on_unknown_id() {
        let cfg = config();
        let missing = PlateId::new();
        let err = cfg.plate(missing).unwrap_err();
        assert!(matches!(err, PlanningError::UnknownResource { kind: "plate", .. }));
    }

    #[test]
    fn clone_is_independent() {
        let mut cfg = config();
        let plate = Plate::new(
            "p1",
            PlateType {
                name: "pcrplate_96".to_string(),
                rows: 8,
                cols: 12,
                well_capacity: Volume::ul(200.0),
                well_residual: Volume::ul(5.0),
                well_pitch_mm: 9.0,
                trough: false,
            },
        );
        let id = cfg.add_plate("position_1", plate);
        let copy = cfg.clone();

        cfg.plate_mut(id)
            .unwrap()
            .fill_well(WellAddress::new(0, 0), Volume::ul(100.0), "water");

        assert_eq!(
            copy.plate(id).unwrap().well_volume(WellAddress::new(0, 0)),
            Volume::ZERO
        );
    }

    #[test]
    fn sorted_tip_types_are_deterministic() {
        let mut cfg = config();
        cfg.tip_types.push(TipType {
            name: "tip_50".to_string(),
            min_volume: Volume::ul(1.0),
            max_volume: Volume::ul(50.0),
            filtered: false,
        });
        cfg.tip_types.push(tip_200());
        let names: Vec<&str> = cfg.sorted_tip_types().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["tip_200", "tip_50"]);
    }
}
