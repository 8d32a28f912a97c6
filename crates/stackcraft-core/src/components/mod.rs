//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod common;
mod grip;
mod resource;
mod station;

pub use common::*;
pub use grip::*;
pub use resource::*;
pub use station::*;
