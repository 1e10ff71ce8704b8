//! Liquids and their lineage.
//!
//! Liquids are immutable value-like records. Sampling from a stock
//! produces a *new* record with a fresh id and a parent link; the stock
//! itself is never mutated in place, so the same stock can be sampled
//! by many instructions without aliasing bugs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AliquotError, PlanResult};
use crate::resources::plate::{PlateId, WellAddress};
use crate::units::Volume;

/// Stable identifier for a liquid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LiquidId(Uuid);

impl LiquidId {
    /// Creates a new random liquid ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LiquidId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LiquidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a liquid currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidLocation {
    /// The plate holding the liquid.
    pub plate: PlateId,
    /// The well within that plate.
    pub well: WellAddress,
}

impl fmt::Display for LiquidLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plate, self.well)
    }
}

/// A named liquid with volume, class, and lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liquid {
    /// Identity of this liquid record.
    pub id: LiquidId,
    /// The stock this liquid was sampled from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<LiquidId>,
    /// Liquids sampled from this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub daughters: Vec<LiquidId>,
    /// Human-readable name, e.g. "water" or "mastermix_1".
    pub name: String,
    /// Liquid-class tag driving policy resolution.
    pub liquid_class: String,
    /// Volume of this record.
    pub volume: Volume,
    /// Concentration, if meaningful (arbitrary units).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concentration: Option<f64>,
    /// Current location, once assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LiquidLocation>,
    /// Hint for the total volume the final mix should reach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_volume: Option<Volume>,
}

impl Liquid {
    /// Starts building a liquid.
    #[must_use]
    pub fn builder() -> LiquidBuilder {
        LiquidBuilder::default()
    }

    /// Samples `volume` from this liquid.
    ///
    /// Returns a new record with a fresh id, the parent link set, and
    /// the sampled volume; this record is unchanged apart from the
    /// daughter registration the caller performs via
    /// [`Liquid::register_daughter`].
    #[must_use]
    pub fn sample(&self, volume: Volume) -> Self {
        Self {
            id: LiquidId::new(),
            parent: Some(self.id),
            daughters: Vec::new(),
            name: self.name.clone(),
            liquid_class: self.liquid_class.clone(),
            volume,
            concentration: self.concentration,
            location: self.location,
            total_volume: None,
        }
    }

    /// Records a daughter produced by sampling.
    pub fn register_daughter(&mut self, daughter: LiquidId) {
        self.daughters.push(daughter);
    }

    /// One-line summary for error messages.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.location {
            Some(loc) => format!("{} ({}, {}) at {}", self.name, self.liquid_class, self.volume, loc),
            None => format!("{} ({}, {})", self.name, self.liquid_class, self.volume),
        }
    }
}

/// Builder for [`Liquid`].
#[derive(Debug, Clone, Default)]
pub struct LiquidBuilder {
    name: Option<String>,
    liquid_class: Option<String>,
    volume: Option<Volume>,
    concentration: Option<f64>,
    location: Option<LiquidLocation>,
    total_volume: Option<Volume>,
}

impl LiquidBuilder {
    /// Sets the liquid name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the liquid class. Defaults to the name if unset.
    #[must_use]
    pub fn liquid_class(mut self, class: impl Into<String>) -> Self {
        self.liquid_class = Some(class.into());
        self
    }

    /// Sets the volume.
    #[must_use]
    pub fn volume(mut self, volume: Volume) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Sets the concentration.
    #[must_use]
    pub fn concentration(mut self, concentration: f64) -> Self {
        self.concentration = Some(concentration);
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn location(mut self, plate: PlateId, well: WellAddress) -> Self {
        self.location = Some(LiquidLocation { plate, well });
        self
    }

    /// Sets the total-volume hint.
    #[must_use]
    pub fn total_volume(mut self, total: Volume) -> Self {
        self.total_volume = Some(total);
        self
    }

    /// Builds the liquid.
    ///
    /// # Errors
    /// Fails if the name is missing/empty or the volume is negative.
    pub fn build(self) -> PlanResult<Liquid> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| AliquotError::internal("liquid name must not be empty"))?;
        let volume = self.volume.unwrap_or(Volume::ZERO);
        if volume.is_negative() {
            return Err(AliquotError::internal(format!(
                "liquid '{name}' has negative volume {volume}"
            )));
        }
        let liquid_class = self.liquid_class.unwrap_or_else(|| name.clone());
        Ok(Liquid {
            id: LiquidId::new(),
            parent: None,
            daughters: Vec::new(),
            name,
            liquid_class,
            volume,
            concentration: self.concentration,
            location: self.location,
            total_volume: self.total_volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Liquid {
        Liquid::builder()
            .name("water")
            .volume(Volume::ul(500.0))
            .build()
            .unwrap()
    }

    #[test]
    fn builder_defaults_class_to_name() {
        let l = water();
        assert_eq!(l.liquid_class, "water");
        assert!(l.parent.is_none());
    }

    #[test]
    fn builder_rejects_empty_name() {
        assert!(Liquid::builder().volume(Volume::ul(1.0)).build().is_err());
        assert!(Liquid::builder().name("  ").build().is_err());
    }

    #[test]
    fn builder_rejects_negative_volume() {
        assert!(Liquid::builder()
            .name("water")
            .volume(Volume::ul(-5.0))
            .build()
            .is_err());
    }

    #[test]
    fn sample_creates_fresh_identity_with_parent_link() {
        let mut stock = water();
        let sampled = stock.sample(Volume::ul(100.0));
        stock.register_daughter(sampled.id);

        assert_ne!(sampled.id, stock.id);
        assert_eq!(sampled.parent, Some(stock.id));
        assert!(sampled.volume.approx_eq(Volume::ul(100.0)));
        // The stock record's own volume is untouched.
        assert!(stock.volume.approx_eq(Volume::ul(500.0)));
        assert_eq!(stock.daughters, vec![sampled.id]);
    }

    #[test]
    fn summary_includes_location_when_assigned() {
        let mut l = water();
        assert!(!l.summary().contains(':'));
        l.location = Some(LiquidLocation {
            plate: PlateId::new(),
            well: WellAddress::new(0, 0),
        });
        assert!(l.summary().contains(":A1"));
    }
}
