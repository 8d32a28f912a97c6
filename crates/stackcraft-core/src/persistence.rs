//! Save/Load functionality for persisting simulation state
//!
//! Uses bincode for efficient binary serialization of the entire simulation.
//! Entity handles are stored as their raw bits and the loaded world respawns
//! every entity under its original handle, so `next`/`prev` links, grips and
//! station slots stay valid without remapping.

use std::collections::HashMap;
use std::io::{Read, Write};

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::*;
use crate::config::SimulationConfig;

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the simulation state
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Simulation time in seconds
    pub sim_time: f64,
    /// Time scale
    pub time_scale: f32,
    pub config: SimulationConfig,
    /// Occupied cells and the bottom unit standing on each
    pub placements: Vec<(GridCell, u64)>,
    pub units: Vec<SavedUnit>,
    pub holders: Vec<SavedHolder>,
    pub stations: Vec<SavedStation>,
}

/// Serializable version of a ResourceUnit entity
#[derive(Serialize, Deserialize, Clone)]
pub struct SavedUnit {
    pub id: u64,
    pub resource_type: ResourceType,
    pub height: f32,
    pub stack_index: u32,
    pub next: Option<u64>,
    pub prev: Option<u64>,
    pub placement: Placement,
}

/// Serializable version of a holder entity
#[derive(Serialize, Deserialize, Clone)]
pub struct SavedHolder {
    pub id: u64,
    pub capacity: u32,
    pub carried: Option<u64>,
}

/// Serializable version of a ProductionStation entity
#[derive(Serialize, Deserialize, Clone)]
pub struct SavedStation {
    pub id: u64,
    pub name: String,
    pub slots: Vec<(SlotRequirement, Option<u64>)>,
    pub output_type: ResourceType,
    pub output_height: f32,
    pub output: Option<u64>,
    pub base_rate: f32,
    pub tier: f32,
    /// `(progress, pending_output)` while producing
    pub cycle: Option<(f32, u64)>,
}

fn bits(entity: Entity) -> u64 {
    entity.to_bits().get()
}

fn bits_opt(entity: Option<Entity>) -> Option<u64> {
    entity.map(bits)
}

/// Turns saved bits back into handles, checking every referenced entity
/// exists in the loaded world
struct HandleResolver<'a> {
    world: &'a World,
}

impl HandleResolver<'_> {
    fn resolve(&self, id: u64) -> Result<Entity, SaveError> {
        Entity::from_bits(id)
            .filter(|entity| self.world.contains(*entity))
            .ok_or(SaveError::DanglingHandle(id))
    }

    fn resolve_opt(&self, id: Option<u64>) -> Result<Option<Entity>, SaveError> {
        id.map(|id| self.resolve(id)).transpose()
    }
}

fn handle(id: u64) -> Result<Entity, SaveError> {
    Entity::from_bits(id).ok_or(SaveError::DanglingHandle(id))
}

/// Extract all entities from a world into serializable form
fn serialize_world(world: &World) -> (Vec<SavedUnit>, Vec<SavedHolder>, Vec<SavedStation>) {
    let units = world
        .query::<(&ResourceUnit, Option<&Placement>)>()
        .iter()
        .map(|(entity, (unit, placement))| SavedUnit {
            id: bits(entity),
            resource_type: unit.resource_type,
            height: unit.height,
            stack_index: unit.stack_index,
            next: bits_opt(unit.next),
            prev: bits_opt(unit.prev),
            placement: placement.copied().unwrap_or_default(),
        })
        .collect();

    let holders = world
        .query::<&TransferGrip>()
        .iter()
        .map(|(entity, grip)| SavedHolder {
            id: bits(entity),
            capacity: grip.capacity,
            carried: bits_opt(grip.carried),
        })
        .collect();

    let stations = world
        .query::<&ProductionStation>()
        .iter()
        .map(|(entity, station)| SavedStation {
            id: bits(entity),
            name: station.name.clone(),
            slots: station
                .slots
                .iter()
                .map(|slot| (slot.requirement, bits_opt(slot.stack)))
                .collect(),
            output_type: station.output_type,
            output_height: station.output_height,
            output: bits_opt(station.output),
            base_rate: station.base_rate,
            tier: station.tier,
            cycle: match station.state {
                CycleState::Idle => None,
                CycleState::Producing {
                    progress,
                    pending_output,
                } => Some((progress, bits(pending_output))),
            },
        })
        .collect();

    (units, holders, stations)
}

/// Rebuild a world from saved entities, respawning each under its old handle
fn deserialize_world(
    units: Vec<SavedUnit>,
    holders: Vec<SavedHolder>,
    stations: Vec<SavedStation>,
) -> Result<World, SaveError> {
    let mut world = World::new();

    // Reserve every handle first so links can be checked against the full set
    for id in units
        .iter()
        .map(|u| u.id)
        .chain(holders.iter().map(|h| h.id))
        .chain(stations.iter().map(|s| s.id))
    {
        world.spawn_at(handle(id)?, ());
    }

    let mut links = Vec::with_capacity(units.len());
    {
        let resolver = HandleResolver { world: &world };
        for unit in &units {
            links.push((
                resolver.resolve(unit.id)?,
                resolver.resolve_opt(unit.next)?,
                resolver.resolve_opt(unit.prev)?,
            ));
        }
    }
    for (unit, (entity, next, prev)) in units.into_iter().zip(links) {
        let component = ResourceUnit {
            resource_type: unit.resource_type,
            height: unit.height,
            stack_index: unit.stack_index,
            next,
            prev,
        };
        world
            .insert(entity, (component, unit.placement))
            .map_err(|_| SaveError::DanglingHandle(unit.id))?;
    }

    for holder in holders {
        let (entity, carried) = {
            let resolver = HandleResolver { world: &world };
            (resolver.resolve(holder.id)?, resolver.resolve_opt(holder.carried)?)
        };
        let grip = TransferGrip {
            carried,
            ..TransferGrip::new(holder.capacity)
        };
        world
            .insert_one(entity, grip)
            .map_err(|_| SaveError::DanglingHandle(holder.id))?;
    }

    for saved in stations {
        let station = {
            let resolver = HandleResolver { world: &world };
            let mut slots = Vec::with_capacity(saved.slots.len());
            for (requirement, stack) in &saved.slots {
                slots.push(InputSlot {
                    requirement: *requirement,
                    stack: resolver.resolve_opt(*stack)?,
                });
            }
            let state = match saved.cycle {
                None => CycleState::Idle,
                Some((progress, pending)) => CycleState::Producing {
                    progress,
                    pending_output: resolver.resolve(pending)?,
                },
            };
            ProductionStation {
                name: saved.name,
                slots,
                output_type: saved.output_type,
                output_height: saved.output_height,
                output: resolver.resolve_opt(saved.output)?,
                base_rate: saved.base_rate,
                tier: saved.tier,
                state,
            }
        };
        let entity = handle(saved.id)?;
        world
            .insert_one(entity, station)
            .map_err(|_| SaveError::DanglingHandle(saved.id))?;
    }

    Ok(world)
}

/// Save the complete simulation to a writer
pub fn save_simulation<W: Write>(
    writer: W,
    world: &World,
    sim_time: f64,
    time_scale: f32,
    config: &SimulationConfig,
    placements: &HashMap<GridCell, Entity>,
) -> Result<(), SaveError> {
    let (units, holders, stations) = serialize_world(world);

    let mut placements: Vec<(GridCell, u64)> = placements
        .iter()
        .map(|(cell, bottom)| (*cell, bits(*bottom)))
        .collect();
    placements.sort();

    let save_data = SaveData {
        version: SAVE_VERSION,
        sim_time,
        time_scale,
        config: config.clone(),
        placements,
        units,
        holders,
        stations,
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a simulation from a reader
pub fn load_simulation<R: Read>(reader: R) -> Result<LoadedSimulation, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let world = deserialize_world(save_data.units, save_data.holders, save_data.stations)?;

    let mut placements = HashMap::with_capacity(save_data.placements.len());
    {
        let resolver = HandleResolver { world: &world };
        for (cell, id) in save_data.placements {
            placements.insert(cell, resolver.resolve(id)?);
        }
    }

    Ok(LoadedSimulation {
        world,
        sim_time: save_data.sim_time,
        time_scale: save_data.time_scale,
        config: save_data.config,
        placements,
    })
}

/// Result of loading a simulation
pub struct LoadedSimulation {
    pub world: World,
    pub sim_time: f64,
    pub time_scale: f32,
    pub config: SimulationConfig,
    pub placements: HashMap<GridCell, Entity>,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Save references missing entity {0:#x}")]
    DanglingHandle(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use crate::engine::{PickupTarget, SimulationEngine};

    #[test]
    fn test_save_load_roundtrip() {
        let mut engine = SimulationEngine::new();
        let holder = engine.spawn_holder(2);
        let station = engine.spawn_station(&StationConfig::new(
            "Rail Crafter",
            &[ResourceType::Wood],
            ResourceType::Rail,
        ));
        let wood = engine
            .spawn_stack(GridCell::new(0, 0, 0), ResourceType::Wood, 4)
            .unwrap();
        engine
            .spawn_stack(GridCell::new(1, 0, 0), ResourceType::Rock, 2)
            .unwrap();

        engine
            .try_pick_up(holder, PickupTarget::Cell(GridCell::new(0, 0, 0)))
            .unwrap();
        engine.try_interact_using(holder, station).unwrap();
        engine
            .try_pick_up(holder, PickupTarget::Cell(GridCell::new(0, 0, 0)))
            .unwrap();
        engine.update(1.0);

        let original_time = engine.sim_time;
        let original_progress = engine.cycle_progress(station);

        // Save
        let mut save_buffer = Vec::new();
        engine.save(&mut save_buffer).expect("Save failed");

        // Load into new engine
        let mut loaded = SimulationEngine::new();
        loaded.load(&save_buffer[..]).expect("Load failed");

        // Verify
        assert!((loaded.sim_time - original_time).abs() < 0.001);
        assert_eq!(loaded.unit_count(), engine.unit_count());
        assert_eq!(loaded.cycle_progress(station), original_progress);
        assert_eq!(loaded.stack_at(GridCell::new(0, 0, 0)), None);
        assert_eq!(loaded.carried(holder), Some(wood));
        assert_eq!(loaded.stack_indices(wood), Some(vec![0, 1]));
        let slot = loaded.slot_stack(station, 0).unwrap();
        assert_eq!(loaded.count(slot), Some(2));

        // The loaded session keeps running
        loaded.update(3.0);
        let output = loaded.output_stack(station).unwrap();
        assert_eq!(loaded.count(output), Some(1));
        assert_eq!(loaded.count(slot), Some(1));
    }

    #[test]
    fn test_version_mismatch() {
        let save_data = SaveData {
            version: SAVE_VERSION + 1,
            sim_time: 0.0,
            time_scale: 1.0,
            config: SimulationConfig::default(),
            placements: Vec::new(),
            units: Vec::new(),
            holders: Vec::new(),
            stations: Vec::new(),
        };
        let buffer = bincode::serialize(&save_data).unwrap();

        match load_simulation(&buffer[..]) {
            Err(SaveError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, SAVE_VERSION);
                assert_eq!(found, SAVE_VERSION + 1);
            }
            _ => panic!("expected a version mismatch"),
        }
    }

    #[test]
    fn test_zero_capacity_holder_restored_usable() {
        let mut world = World::new();
        let holder = world.spawn(());

        let save_data = SaveData {
            version: SAVE_VERSION,
            sim_time: 0.0,
            time_scale: 1.0,
            config: SimulationConfig::default(),
            placements: Vec::new(),
            units: Vec::new(),
            holders: vec![SavedHolder {
                id: bits(holder),
                capacity: 0,
                carried: None,
            }],
            stations: Vec::new(),
        };
        let buffer = bincode::serialize(&save_data).unwrap();

        let loaded = load_simulation(&buffer[..]).unwrap();
        let grip = *loaded.world.get::<&TransferGrip>(holder).unwrap();
        assert_eq!(grip.capacity, 1);
        assert!(grip.is_empty());
    }

    #[test]
    fn test_dangling_link_rejected() {
        let mut world = World::new();
        let lone = world.spawn(());
        let missing = world.spawn(());
        world.despawn(missing).unwrap();

        let save_data = SaveData {
            version: SAVE_VERSION,
            sim_time: 0.0,
            time_scale: 1.0,
            config: SimulationConfig::default(),
            placements: Vec::new(),
            units: vec![SavedUnit {
                id: bits(lone),
                resource_type: ResourceType::Wood,
                height: 0.25,
                stack_index: 0,
                next: Some(bits(missing)),
                prev: None,
                placement: Placement::default(),
            }],
            holders: Vec::new(),
            stations: Vec::new(),
        };
        let buffer = bincode::serialize(&save_data).unwrap();

        assert!(matches!(
            load_simulation(&buffer[..]),
            Err(SaveError::DanglingHandle(_))
        ));
    }
}
