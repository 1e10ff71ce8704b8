//! Plates and wells.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::units::Volume;

/// Stable identifier for a plate instance on the deck.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PlateId(Uuid);

impl PlateId {
    /// Creates a new random plate ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A well address like `A1` (row letter, 1-based column).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct WellAddress {
    /// Zero-based row index (A = 0).
    pub row: u8,
    /// Zero-based column index.
    pub col: u8,
}

impl WellAddress {
    /// Creates a well address from zero-based row and column indices.
    #[must_use]
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// The well directly below this one (next row, same column).
    #[must_use]
    pub const fn next_row(self) -> Self {
        Self {
            row: self.row + 1,
            col: self.col,
        }
    }

    /// The well directly to the right of this one (next column, same row).
    #[must_use]
    pub const fn next_col(self) -> Self {
        Self {
            row: self.row,
            col: self.col + 1,
        }
    }
}

impl fmt::Display for WellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.row) as char, self.col + 1)
    }
}

impl FromStr for WellAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let row_char = chars.next().ok_or_else(|| "empty well address".to_string())?;
        if !row_char.is_ascii_uppercase() {
            return Err(format!("bad row letter in well address '{s}'"));
        }
        let col: u8 = chars
            .as_str()
            .parse::<u8>()
            .map_err(|_| format!("bad column in well address '{s}'"))?;
        if col == 0 {
            return Err(format!("column is 1-based in well address '{s}'"));
        }
        Ok(Self {
            row: row_char as u8 - b'A',
            col: col - 1,
        })
    }
}

impl TryFrom<String> for WellAddress {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WellAddress> for String {
    fn from(w: WellAddress) -> Self {
        w.to_string()
    }
}

/// Immutable geometry/capacity description of a plate type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateType {
    /// Catalogue name of this plate type.
    pub name: String,
    /// Number of rows.
    pub rows: u8,
    /// Number of columns.
    pub cols: u8,
    /// Maximum working volume of each well.
    pub well_capacity: Volume,
    /// Dead volume that cannot be aspirated from a well.
    pub well_residual: Volume,
    /// Centre-to-centre well spacing in millimetres.
    pub well_pitch_mm: f64,
    /// True if all wells share one reservoir (trough); aligned channels
    /// may then address the same well simultaneously.
    pub trough: bool,
}

/// Mutable per-well state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WellState {
    /// Current liquid volume in the well.
    pub volume: Volume,
    /// Liquid-class tag of the contents, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
}

/// A plate instance: a type plus per-well state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plate {
    /// Identity of this plate instance.
    pub id: PlateId,
    /// Human-readable name (e.g. "input_plate_1").
    pub name: String,
    /// The plate's type description.
    pub plate_type: PlateType,
    /// Wells holding liquid. Absent wells are empty.
    pub wells: BTreeMap<WellAddress, WellState>,
}

impl Plate {
    /// Creates an empty plate of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, plate_type: PlateType) -> Self {
        Self {
            id: PlateId::new(),
            name: name.into(),
            plate_type,
            wells: BTreeMap::new(),
        }
    }

    /// True if the address exists on this plate's grid.
    #[must_use]
    pub fn contains(&self, well: WellAddress) -> bool {
        well.row < self.plate_type.rows && well.col < self.plate_type.cols
    }

    /// Current volume in a well (zero if never filled).
    #[must_use]
    pub fn well_volume(&self, well: WellAddress) -> Volume {
        self.wells.get(&well).map_or(Volume::ZERO, |w| w.volume)
    }

    /// Volume that can actually be aspirated from a well, i.e. current
    /// volume minus the residual dead volume.
    #[must_use]
    pub fn available_volume(&self, well: WellAddress) -> Volume {
        (self.well_volume(well) - self.plate_type.well_residual).max(Volume::ZERO)
    }

    /// Fills a well, replacing its contents tag.
    pub fn fill_well(&mut self, well: WellAddress, volume: Volume, contents: impl Into<String>) {
        let state = self.wells.entry(well).or_default();
        state.volume = volume;
        state.contents = Some(contents.into());
    }

    /// Adds volume to a well without checking capacity.
    ///
    /// Capacity is enforced eagerly by the decomposer and again by the
    /// simulator; this is the raw state update.
    pub fn add_to_well(&mut self, well: WellAddress, volume: Volume, contents: Option<&str>) {
        let state = self.wells.entry(well).or_default();
        state.volume += volume;
        if state.contents.is_none() {
            state.contents = contents.map(str::to_string);
        }
    }

    /// Removes volume from a well, clamping float noise to zero.
    pub fn remove_from_well(&mut self, well: WellAddress, volume: Volume) {
        if let Some(state) = self.wells.get_mut(&well) {
            state.volume = (state.volume - volume).clamp_zero();
        }
    }
}
