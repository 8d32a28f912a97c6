//! Stackcraft Core - Stackable Resource Simulation Engine
//!
//! Resource units (wood, rock, rail) stack vertically, get picked up in
//! capacity-bounded slices by holders, are dropped onto matching stacks, and
//! are consumed by production stations that turn one unit from each input
//! into a new output unit over a timed cycle.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Resource units, holders, production stations
//! - **Components**: Pure data ([`components::ResourceUnit`], [`components::TransferGrip`],
//!   [`components::ProductionStation`], ...)
//! - **Systems**: Stacking, transfer and crafting logic over the world
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`components`] | Units, grips, stations, placement data |
//! | [`systems`] | Split/merge, pickup/drop, production cycles, events |
//! | [`engine`] | Session: world, cell placements, ticking, queries |
//! | [`config`] | Session and station configuration |
//! | [`persistence`] | Bincode snapshots of a whole session |
//!
//! # Example
//!
//! ```rust,no_run
//! use stackcraft_core::prelude::*;
//!
//! let mut engine = SimulationEngine::new();
//! let holder = engine.spawn_holder(3);
//! let crafter = engine.spawn_station(&StationConfig::new(
//!     "Rail Crafter",
//!     &[ResourceType::Wood, ResourceType::Rock],
//!     ResourceType::Rail,
//! ));
//! engine.spawn_stack(GridCell::new(0, 0, 0), ResourceType::Wood, 3).unwrap();
//!
//! engine.try_pick_up(holder, PickupTarget::Cell(GridCell::new(0, 0, 0))).unwrap();
//! engine.try_interact_using(holder, crafter).unwrap();
//!
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//!     for event in engine.drain_events() {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{SimulationConfig, StationConfig};
    pub use crate::engine::{PickupTarget, SimulationEngine};
    pub use crate::error::{Rejection, TransferError};
    pub use crate::systems::{DropOutcome, SimEvent};
    pub use hecs::Entity;
}
