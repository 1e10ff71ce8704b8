//! Tip types, tipboxes, and tip waste.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::units::Volume;

/// Stable identifier for a tipbox instance on the deck.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TipboxId(Uuid);

impl TipboxId {
    /// Creates a new random tipbox ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TipboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TipboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for a tipwaste instance on the deck.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TipwasteId(Uuid);

impl TipwasteId {
    /// Creates a new random tipwaste ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TipwasteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TipwasteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The volume range a tip type can reliably move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipType {
    /// Catalogue name, e.g. "tip_200".
    pub name: String,
    /// Minimum reliable volume.
    pub min_volume: Volume,
    /// Maximum capacity.
    pub max_volume: Volume,
    /// Whether the tip carries a filter.
    pub filtered: bool,
}

/// A box of identical tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tipbox {
    /// Identity of this tipbox instance.
    pub id: TipboxId,
    /// Human-readable name.
    pub name: String,
    /// The tips this box holds.
    pub tip_type: TipType,
    /// Total tip positions in the box.
    pub capacity: usize,
    /// Tips still available.
    pub remaining: usize,
}

impl Tipbox {
    /// Creates a full tipbox.
    #[must_use]
    pub fn new(name: impl Into<String>, tip_type: TipType, capacity: usize) -> Self {
        Self {
            id: TipboxId::new(),
            name: name.into(),
            tip_type,
            capacity,
            remaining: capacity,
        }
    }

    /// Takes `count` tips from the box. Returns false if not enough remain.
    pub fn take(&mut self, count: usize) -> bool {
        if self.remaining < count {
            return false;
        }
        self.remaining -= count;
        true
    }
}

/// A waste container for used tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tipwaste {
    /// Identity of this tipwaste instance.
    pub id: TipwasteId,
    /// Human-readable name.
    pub name: String,
    /// Maximum number of tips before it must be emptied.
    pub capacity: usize,
    /// Tips currently in the waste.
    pub contents: usize,
}

impl Tipwaste {
    /// Creates an empty tipwaste.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: TipwasteId::new(),
            name: name.into(),
            capacity,
            contents: 0,
        }
    }

    /// Drops `count` tips into the waste. Returns false once full.
    pub fn dispose(&mut self, count: usize) -> bool {
        if self.contents + count > self.capacity {
            return false;
        }
        self.contents += count;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tip_200() -> TipType {
        TipType {
            name: "tip_200".to_string(),
            min_volume: Volume::ul(10.0),
            max_volume: Volume::ul(200.0),
            filtered: false,
        }
    }

    #[test]
    fn tipbox_take_depletes() {
        let mut bx = Tipbox::new("box1", tip_200(), 96);
        assert!(bx.take(8));
        assert_eq!(bx.remaining, 88);
        assert!(!bx.take(89));
        assert_eq!(bx.remaining, 88);
    }

    #[test]
    fn tipwaste_fills_up() {
        let mut waste = Tipwaste::new("waste", 10);
        assert!(waste.dispose(8));
        assert!(!waste.dispose(3));
        assert_eq!(waste.contents, 8);
    }
}
