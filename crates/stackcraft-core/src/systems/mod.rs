//! Systems - logic that operates on components

pub mod crafting;
pub mod events;
pub mod stacking;
pub mod transfer;

pub use crafting::{can_produce, parts_revealed};
pub use events::{EventQueue, SimEvent};
pub use stacking::Split;
pub use transfer::DropOutcome;
