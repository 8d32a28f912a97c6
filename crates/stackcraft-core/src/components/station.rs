//! Production station components: ProductionStation, InputSlot, CycleState

use hecs::Entity;
use serde::{Deserialize, Serialize};

use super::resource::ResourceType;
use crate::config::StationConfig;

/// What an input slot accepts and how much it needs before a cycle can start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequirement {
    pub resource_type: ResourceType,
    /// Sufficiency threshold: units the slot must hold to start a cycle
    #[serde(default = "default_min_units")]
    pub min_units: u32,
}

fn default_min_units() -> u32 {
    1
}

impl SlotRequirement {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            min_units: default_min_units(),
        }
    }

    pub fn with_min_units(mut self, min_units: u32) -> Self {
        self.min_units = min_units.max(1);
        self
    }
}

/// One typed input of a station
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSlot {
    pub requirement: SlotRequirement,
    /// Bottom unit of the stack currently fed into this slot
    pub stack: Option<Entity>,
}

/// Production cycle state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleState {
    Idle,
    Producing {
        /// 0.0 ..= 1.0
        progress: f32,
        /// Output unit created at cycle start, not yet on the output stack
        pending_output: Entity,
    },
}

/// ProductionStation component - consumes one top unit per slot, emits one unit
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionStation {
    pub name: String,
    pub slots: Vec<InputSlot>,
    pub output_type: ResourceType,
    pub output_height: f32,
    /// Bottom unit of the accumulated output stack
    pub output: Option<Entity>,
    /// Progress per second at tier 1
    pub base_rate: f32,
    /// Station speed multiplier
    pub tier: f32,
    pub state: CycleState,
}

impl ProductionStation {
    pub fn from_config(config: &StationConfig) -> Self {
        Self {
            name: config.name.clone(),
            slots: config
                .inputs
                .iter()
                .map(|requirement| InputSlot {
                    // Every cycle consumes a unit, so a slot can never need fewer than one
                    requirement: requirement.with_min_units(requirement.min_units),
                    stack: None,
                })
                .collect(),
            output_type: config.output,
            output_height: config
                .output_height
                .unwrap_or_else(|| config.output.default_height()),
            output: None,
            base_rate: config.base_rate,
            tier: config.tier,
            state: CycleState::Idle,
        }
    }

    pub fn is_producing(&self) -> bool {
        matches!(self.state, CycleState::Producing { .. })
    }

    /// Cycle progress, only meaningful while producing
    pub fn progress(&self) -> Option<f32> {
        match self.state {
            CycleState::Idle => None,
            CycleState::Producing { progress, .. } => Some(progress),
        }
    }

    /// Progress gained per second
    pub fn rate(&self) -> f32 {
        self.base_rate * self.tier
    }

    /// First slot accepting `resource`
    pub fn slot_for(&self, resource: ResourceType) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.requirement.resource_type == resource)
    }
}
