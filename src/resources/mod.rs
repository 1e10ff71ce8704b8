//! The resource model: plates, wells, tips, heads, and the deck.
//!
//! Everything the scheduler manipulates is keyed by a stable id and
//! held in plain maps, so duplicating the robot state for a dry-run
//! planning pass is a cheap structural clone.

pub mod deck;
pub mod head;
pub mod inventory;
pub mod plate;
pub mod tip;

pub use deck::{DeckItem, RobotConfig};
pub use head::{Adaptor, ChannelParams, EffectiveParams, Head, Orientation};
pub use inventory::{Inventory, TipboxType, TipwasteType};
pub use plate::{Plate, PlateId, PlateType, WellAddress, WellState};
pub use tip::{TipType, Tipbox, TipboxId, Tipwaste, TipwasteId};
