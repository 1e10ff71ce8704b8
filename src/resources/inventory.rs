//! The inventory catalogue: labware and component templates by name.
//!
//! The catalogue is consumed, not owned, by the planning core: the core
//! asks it for fresh plates, tipboxes, tipwastes, and components, and
//! each constructor is fallible with a distinguished unknown-type
//! error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CatalogueError;
use crate::liquid::Liquid;
use crate::resources::plate::{Plate, PlateType};
use crate::resources::tip::{Tipbox, TipType, Tipwaste};
use crate::units::Volume;

/// Template for a tipbox type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipboxType {
    /// Catalogue name, e.g. "tipbox_200".
    pub name: String,
    /// The tips the box holds.
    pub tip_type: TipType,
    /// Tips per box.
    pub capacity: usize,
}

/// Template for a tipwaste type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipwasteType {
    /// Catalogue name.
    pub name: String,
    /// Tips the waste can hold before emptying.
    pub capacity: usize,
}

/// Component/plate/tip templates, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    plate_types: BTreeMap<String, PlateType>,
    tipbox_types: BTreeMap<String, TipboxType>,
    tipwaste_types: BTreeMap<String, TipwasteType>,
    components: BTreeMap<String, Liquid>,
}

impl Inventory {
    /// An empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalogue pre-loaded with the standard labware set used across
    /// the test suites.
    #[must_use]
    pub fn with_standard_types() -> Self {
        let mut inv = Self::new();
        inv.register_plate_type(PlateType {
            name: "pcrplate_96".to_string(),
            rows: 8,
            cols: 12,
            well_capacity: Volume::ul(200.0),
            well_residual: Volume::ul(5.0),
            well_pitch_mm: 9.0,
            trough: false,
        });
        inv.register_plate_type(PlateType {
            name: "deepwell_96".to_string(),
            rows: 8,
            cols: 12,
            well_capacity: Volume::ul(2000.0),
            well_residual: Volume::ul(20.0),
            well_pitch_mm: 9.0,
            trough: false,
        });
        inv.register_plate_type(PlateType {
            name: "trough_1".to_string(),
            rows: 8,
            cols: 1,
            well_capacity: Volume::ml(100.0),
            well_residual: Volume::ul(500.0),
            well_pitch_mm: 9.0,
            trough: true,
        });
        inv.register_tipbox_type(TipboxType {
            name: "tipbox_200".to_string(),
            tip_type: TipType {
                name: "tip_200".to_string(),
                min_volume: Volume::ul(10.0),
                max_volume: Volume::ul(200.0),
                filtered: false,
            },
            capacity: 96,
        });
        inv.register_tipbox_type(TipboxType {
            name: "tipbox_1000".to_string(),
            tip_type: TipType {
                name: "tip_1000".to_string(),
                min_volume: Volume::ul(50.0),
                max_volume: Volume::ul(1000.0),
                filtered: false,
            },
            capacity: 96,
        });
        inv.register_tipwaste_type(TipwasteType {
            name: "tipwaste".to_string(),
            capacity: 700,
        });
        inv
    }

    /// Registers (or replaces) a plate type.
    pub fn register_plate_type(&mut self, plate_type: PlateType) {
        self.plate_types.insert(plate_type.name.clone(), plate_type);
    }

    /// Registers (or replaces) a tipbox type.
    pub fn register_tipbox_type(&mut self, tipbox_type: TipboxType) {
        self.tipbox_types
            .insert(tipbox_type.name.clone(), tipbox_type);
    }

    /// Registers (or replaces) a tipwaste type.
    pub fn register_tipwaste_type(&mut self, tipwaste_type: TipwasteType) {
        self.tipwaste_types
            .insert(tipwaste_type.name.clone(), tipwaste_type);
    }

    /// Registers (or replaces) a component template.
    pub fn register_component(&mut self, component: Liquid) {
        self.components.insert(component.name.clone(), component);
    }

    /// Creates a fresh plate of the named type.
    pub fn new_plate(&self, type_name: &str) -> Result<Plate, CatalogueError> {
        let plate_type = self
            .plate_types
            .get(type_name)
            .ok_or_else(|| CatalogueError::UnknownType {
                kind: "plate",
                name: type_name.to_string(),
            })?;
        Ok(Plate::new(type_name, plate_type.clone()))
    }

    /// Creates a fresh, full tipbox of the named type.
    pub fn new_tipbox(&self, type_name: &str) -> Result<Tipbox, CatalogueError> {
        let template = self
            .tipbox_types
            .get(type_name)
            .ok_or_else(|| CatalogueError::UnknownType {
                kind: "tipbox",
                name: type_name.to_string(),
            })?;
        Ok(Tipbox::new(
            type_name,
            template.tip_type.clone(),
            template.capacity,
        ))
    }

    /// Creates a fresh, empty tipwaste of the named type.
    pub fn new_tipwaste(&self, type_name: &str) -> Result<Tipwaste, CatalogueError> {
        let template = self
            .tipwaste_types
            .get(type_name)
            .ok_or_else(|| CatalogueError::UnknownType {
                kind: "tipwaste",
                name: type_name.to_string(),
            })?;
        Ok(Tipwaste::new(type_name, template.capacity))
    }

    /// Creates a fresh component from the named template.
    ///
    /// The returned liquid carries a new identity; the template is a
    /// prototype, not a shared instance.
    pub fn new_component(&self, name: &str) -> Result<Liquid, CatalogueError> {
        let template = self
            .components
            .get(name)
            .ok_or_else(|| CatalogueError::UnknownType {
                kind: "component",
                name: name.to_string(),
            })?;
        let mut fresh = template.clone();
        fresh.id = crate::liquid::LiquidId::new();
        fresh.daughters.clear();
        Ok(fresh)
    }

    /// Names of the registered plate types.
    #[must_use]
    pub fn plate_type_names(&self) -> Vec<&str> {
        self.plate_types.keys().map(String::as_str).collect()
    }
}
