//! Simulation engine - main entry point for running the simulation

use std::collections::HashMap;

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::components::*;
use crate::config::{SimulationConfig, StationConfig};
use crate::error::{Rejection, TransferError};
use crate::systems::{crafting, stacking, transfer, DropOutcome, EventQueue, SimEvent};

/// What a holder is trying to pick up from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupTarget {
    /// A stack standing in the world
    Cell(GridCell),
    /// One of a station's input slots
    StationInput { station: Entity, slot: usize },
    /// A station's accumulated output
    StationOutput(Entity),
}

/// Main simulation engine
pub struct SimulationEngine {
    /// ECS world containing units, holders and stations
    pub world: World,
    /// Simulation time in seconds since start
    pub sim_time: f64,
    /// Stacks standing in the world, by bottom unit
    placements: HashMap<GridCell, Entity>,
    /// Notifications not yet drained by the presentation layer
    events: EventQueue,
    rng: StdRng,
    config: SimulationConfig,

    // Configuration
    time_scale: f32,
}

fn wobble(rng: &mut StdRng, max_degrees: f32) -> f32 {
    if max_degrees > 0.0 {
        rng.gen_range(-max_degrees..=max_degrees)
    } else {
        0.0
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl SimulationEngine {
    /// Create a new empty simulation
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Self {
        Self {
            world: World::new(),
            sim_time: 0.0,
            placements: HashMap::new(),
            events: EventQueue::new(),
            rng: seeded_rng(config.seed),
            time_scale: config.time_scale.max(0.0),
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Seed a stack of `count` units on an empty cell
    pub fn spawn_stack(
        &mut self,
        cell: GridCell,
        resource: ResourceType,
        count: u32,
    ) -> Result<Entity, TransferError> {
        if self.placements.contains_key(&cell) {
            return Err(Rejection::CellOccupied.into());
        }

        let rng = &mut self.rng;
        let max = self.config.stack_wobble_degrees;
        let bottom = stacking::spawn_stack(&mut self.world, resource, count, || wobble(rng, max))?;
        self.placements.insert(cell, bottom);
        Ok(bottom)
    }

    /// Add a holder able to carry `capacity` units
    pub fn spawn_holder(&mut self, capacity: u32) -> Entity {
        self.world.spawn((TransferGrip::new(capacity),))
    }

    /// Remove a holder and whatever it is carrying
    pub fn remove_holder(&mut self, holder: Entity) -> Result<u32, TransferError> {
        let carried = transfer::grip(&self.world, holder)?.carried;
        let removed = match carried {
            Some(bottom) => stacking::despawn_stack(&mut self.world, bottom)?,
            None => 0,
        };
        self.world
            .despawn(holder)
            .map_err(|_| TransferError::from(Rejection::UnknownTarget))?;
        Ok(removed)
    }

    pub fn spawn_station(&mut self, config: &StationConfig) -> Entity {
        let station = self
            .world
            .spawn((ProductionStation::from_config(config),));
        log::debug!("spawned station {:?} ({})", station, config.name);
        // A station without inputs can produce straight away
        if let Err(err) = crafting::try_start_cycle(&mut self.world, station, &mut self.events) {
            log::warn!("station {:?} could not start: {}", station, err);
        }
        station
    }

    /// Remove a station and every unit it owns; a running cycle is dropped
    pub fn destroy_station(&mut self, station: Entity) -> Result<u32, TransferError> {
        crafting::destroy_station(&mut self.world, station)
    }

    // ── Transfers ───────────────────────────────────────────────────────

    /// Pick up as much as the holder can carry from `target`.
    /// Returns the bottom of the carried stack.
    pub fn try_pick_up(
        &mut self,
        holder: Entity,
        target: PickupTarget,
    ) -> Result<Entity, TransferError> {
        let split = match target {
            PickupTarget::Cell(cell) => {
                let source = *self
                    .placements
                    .get(&cell)
                    .ok_or(TransferError::InsufficientSource)?;
                let split = transfer::try_pick_up(&mut self.world, holder, source)?;
                if split.remainder.is_none() {
                    self.placements.remove(&cell);
                }
                split
            }
            PickupTarget::StationInput { station, slot } => crafting::take_from_slot(
                &mut self.world,
                holder,
                station,
                slot,
                &mut self.events,
            )?,
            PickupTarget::StationOutput(station) => {
                crafting::take_output(&mut self.world, holder, station)?
            }
        };

        let resource = stacking::resource_type(&self.world, split.detached)?;
        self.events.push(SimEvent::PickedUp {
            holder,
            stack: split.detached,
            count: stacking::count(&self.world, split.detached)?,
            two_handed: resource.is_two_handed(),
        });
        Ok(split.detached)
    }

    /// Put the carried stack down at `cell`, onto a matching stack if one is
    /// already there. `guard` lets the holder refuse, e.g. mid swing.
    pub fn try_drop(
        &mut self,
        holder: Entity,
        cell: GridCell,
        guard: impl FnOnce() -> bool,
    ) -> Result<DropOutcome, TransferError> {
        let target = self.placements.get(&cell).copied();
        let yaw = wobble(&mut self.rng, self.config.stack_wobble_degrees);
        let outcome = transfer::try_drop(&mut self.world, holder, target, guard, yaw)?;

        if let DropOutcome::Placed(bottom) = outcome {
            self.placements.insert(cell, bottom);
        }
        self.events.push(SimEvent::Dropped {
            holder,
            cell,
            stack: outcome.bottom(),
            merged: matches!(outcome, DropOutcome::Merged(_)),
        });
        Ok(outcome)
    }

    /// Feed the carried stack into the station slot of the same type.
    /// Returns the slot index.
    pub fn try_interact_using(
        &mut self,
        holder: Entity,
        station: Entity,
    ) -> Result<usize, TransferError> {
        let yaw = wobble(&mut self.rng, self.config.stack_wobble_degrees);
        crafting::try_interact_using(&mut self.world, holder, station, &mut self.events, yaw)
    }

    // ── Ticking ─────────────────────────────────────────────────────────

    /// Update the simulation by delta_seconds
    pub fn update(&mut self, delta_seconds: f32) {
        let scaled_delta = delta_seconds * self.time_scale;
        self.sim_time += scaled_delta as f64;

        let rng = &mut self.rng;
        let max = self.config.stack_wobble_degrees;
        crafting::advance_stations(&mut self.world, scaled_delta, &mut self.events, || {
            wobble(rng, max)
        });
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Get current time scale
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Get current simulation time in seconds
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Take every event raised since the last drain
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Bottom of the stack standing at `cell`
    pub fn stack_at(&self, cell: GridCell) -> Option<Entity> {
        self.placements.get(&cell).copied()
    }

    /// Every occupied cell with its stack's bottom unit
    pub fn placements(&self) -> impl Iterator<Item = (GridCell, Entity)> + '_ {
        self.placements.iter().map(|(cell, bottom)| (*cell, *bottom))
    }

    /// Bottom of the stack the holder is carrying
    pub fn carried(&self, holder: Entity) -> Option<Entity> {
        transfer::grip(&self.world, holder).ok()?.carried
    }

    pub fn count(&self, stack: Entity) -> Option<u32> {
        stacking::count(&self.world, stack).ok()
    }

    pub fn height(&self, stack: Entity) -> Option<f32> {
        stacking::height(&self.world, stack).ok()
    }

    pub fn resource_type(&self, stack: Entity) -> Option<ResourceType> {
        stacking::resource_type(&self.world, stack).ok()
    }

    pub fn stack_indices(&self, stack: Entity) -> Option<Vec<u32>> {
        stacking::stack_indices(&self.world, stack).ok()
    }

    /// Bottom of the stack fed into a station's input slot
    pub fn slot_stack(&self, station: Entity, slot: usize) -> Option<Entity> {
        self.world
            .get::<&ProductionStation>(station)
            .ok()?
            .slots
            .get(slot)?
            .stack
    }

    /// Bottom of a station's output stack
    pub fn output_stack(&self, station: Entity) -> Option<Entity> {
        self.world.get::<&ProductionStation>(station).ok()?.output
    }

    pub fn cycle_state(&self, station: Entity) -> Option<CycleState> {
        self.world
            .get::<&ProductionStation>(station)
            .ok()
            .map(|s| s.state)
    }

    /// Progress of the running cycle, `None` when idle
    pub fn cycle_progress(&self, station: Entity) -> Option<f32> {
        self.world.get::<&ProductionStation>(station).ok()?.progress()
    }

    pub fn can_produce(&self, station: Entity) -> bool {
        crafting::can_produce(&self.world, station).unwrap_or(false)
    }

    /// Count resource units alive anywhere
    pub fn unit_count(&self) -> usize {
        self.world.query::<&ResourceUnit>().iter().count()
    }

    /// Count holders
    pub fn holder_count(&self) -> usize {
        self.world.query::<&TransferGrip>().iter().count()
    }

    /// Count stations
    pub fn station_count(&self) -> usize {
        self.world.query::<&ProductionStation>().iter().count()
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Save simulation state to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), crate::persistence::SaveError> {
        crate::persistence::save_simulation(
            writer,
            &self.world,
            self.sim_time,
            self.time_scale,
            &self.config,
            &self.placements,
        )
    }

    /// Load simulation state from a reader
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), crate::persistence::SaveError> {
        let loaded = crate::persistence::load_simulation(reader)?;

        self.world = loaded.world;
        self.sim_time = loaded.sim_time;
        self.time_scale = loaded.time_scale;
        self.placements = loaded.placements;
        self.rng = seeded_rng(loaded.config.seed);
        self.config = loaded.config;
        self.events = EventQueue::new();

        Ok(())
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new()
    }
}
