//! Crafting system - timed production cycles on stations
//!
//! A station starts a cycle as soon as every input slot meets its threshold.
//! The cycle accumulates progress each tick; on completion it destroys the
//! top unit of every slot, appends the output unit to the output stack and
//! immediately tries to chain the next cycle. Slots and the output stack are
//! locked for the whole cycle.

use hecs::{Entity, World};

use super::events::{EventQueue, SimEvent};
use super::stacking::{self, Split};
use super::transfer;
use crate::components::{CycleState, ProductionStation};
use crate::error::{Rejection, TransferError};

fn with_station<R>(
    world: &World,
    station: Entity,
    f: impl FnOnce(&ProductionStation) -> R,
) -> Result<R, TransferError> {
    let station = world
        .get::<&ProductionStation>(station)
        .map_err(|_| TransferError::from(Rejection::UnknownTarget))?;
    Ok(f(&station))
}

fn station_mut(world: &mut World, station: Entity) -> Result<&mut ProductionStation, TransferError> {
    world
        .query_one_mut::<&mut ProductionStation>(station)
        .map_err(|_| Rejection::UnknownTarget.into())
}

fn ensure_idle(world: &World, station: Entity) -> Result<(), TransferError> {
    if with_station(world, station, ProductionStation::is_producing)? {
        return Err(TransferError::StationBusy);
    }
    Ok(())
}

/// Number of visual parts shown at `progress` out of `parts`. Inputs hide
/// parts at the same pace the output reveals them.
pub fn parts_revealed(progress: f32, parts: usize) -> usize {
    ((progress.clamp(0.0, 1.0) * parts as f32) as usize).min(parts)
}

/// Idle and every slot holds at least its threshold
pub fn can_produce(world: &World, station: Entity) -> Result<bool, TransferError> {
    let station = world
        .get::<&ProductionStation>(station)
        .map_err(|_| TransferError::from(Rejection::UnknownTarget))?;
    if station.is_producing() {
        return Ok(false);
    }

    for slot in &station.slots {
        let held = match slot.stack {
            Some(bottom) => stacking::count(world, bottom)?,
            None => 0,
        };
        if held < slot.requirement.min_units {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Start a cycle if the station can produce. Returns whether one started.
pub fn try_start_cycle(
    world: &mut World,
    station: Entity,
    events: &mut EventQueue,
) -> Result<bool, TransferError> {
    if !can_produce(world, station)? {
        return Ok(false);
    }

    let (output_type, output_height) =
        with_station(world, station, |s| (s.output_type, s.output_height))?;
    let pending_output = stacking::spawn_unit(world, output_type, output_height);
    station_mut(world, station)?.state = CycleState::Producing {
        progress: 0.0,
        pending_output,
    };

    log::debug!("station {:?} started producing {:?}", station, output_type);
    events.push(SimEvent::CycleStarted { station });
    Ok(true)
}

/// Feed the holder's stack into the first slot accepting its type, then
/// re-evaluate the station. Returns the slot index.
pub fn try_interact_using(
    world: &mut World,
    holder: Entity,
    station: Entity,
    events: &mut EventQueue,
    yaw_degrees: f32,
) -> Result<usize, TransferError> {
    let carried = transfer::grip(world, holder)?
        .carried
        .ok_or(TransferError::InvalidTransfer(Rejection::NothingHeld))?;
    ensure_idle(world, station)?;

    let resource = stacking::resource_type(world, carried)?;
    let (slot, existing) = with_station(world, station, |s| {
        s.slot_for(resource).map(|index| (index, s.slots[index].stack))
    })?
    .ok_or(TransferError::InvalidTransfer(Rejection::NoMatchingSlot(resource)))?;

    match existing {
        Some(bottom) => {
            stacking::merge(world, bottom, carried, yaw_degrees)?;
            transfer::release(world, holder)?;
        }
        None => {
            let bottom = transfer::release(world, holder)?;
            station_mut(world, station)?.slots[slot].stack = Some(bottom);
        }
    }

    events.push(SimEvent::Delivered {
        holder,
        station,
        slot,
    });
    try_start_cycle(world, station, events)?;
    Ok(slot)
}

/// Pick up from one of the station's input slots. Refused while producing.
pub fn take_from_slot(
    world: &mut World,
    holder: Entity,
    station: Entity,
    slot: usize,
    events: &mut EventQueue,
) -> Result<Split, TransferError> {
    ensure_idle(world, station)?;
    let bottom = with_station(world, station, |s| s.slots.get(slot).map(|s| s.stack))?
        .ok_or(TransferError::InvalidTransfer(Rejection::UnknownTarget))?
        .ok_or(TransferError::InsufficientSource)?;

    let split = transfer::try_pick_up(world, holder, bottom)?;
    station_mut(world, station)?.slots[slot].stack = split.remainder;
    try_start_cycle(world, station, events)?;
    Ok(split)
}

/// Pick up from the station's output stack. Refused while producing.
pub fn take_output(world: &mut World, holder: Entity, station: Entity) -> Result<Split, TransferError> {
    ensure_idle(world, station)?;
    let bottom = with_station(world, station, |s| s.output)?
        .ok_or(TransferError::InsufficientSource)?;

    let split = transfer::try_pick_up(world, holder, bottom)?;
    station_mut(world, station)?.output = split.remainder;
    Ok(split)
}

/// Consume the top unit of every slot and deliver the pending output
fn complete_cycle(
    world: &mut World,
    station: Entity,
    events: &mut EventQueue,
    yaw_degrees: f32,
) -> Result<(), TransferError> {
    let (state, mut slots, output) =
        with_station(world, station, |s| (s.state, s.slots.clone(), s.output))?;
    let CycleState::Producing { pending_output, .. } = state else {
        return Ok(());
    };

    // Every slot gives up exactly one unit; an empty slot fails the whole cycle
    let bottoms = slots
        .iter()
        .map(|slot| slot.stack.ok_or(TransferError::InsufficientSource))
        .collect::<Result<Vec<_>, _>>()?;
    for (slot, bottom) in slots.iter_mut().zip(bottoms) {
        slot.stack = stacking::consume_top(world, bottom)?;
    }

    let output = match output {
        Some(bottom) => {
            stacking::merge(world, bottom, pending_output, yaw_degrees)?;
            bottom
        }
        None => pending_output,
    };
    let output_count = stacking::count(world, output)?;

    let entry = station_mut(world, station)?;
    entry.slots = slots;
    entry.output = Some(output);
    entry.state = CycleState::Idle;

    log::debug!(
        "station {:?} completed a cycle, output stack now {}",
        station,
        output_count
    );
    events.push(SimEvent::CycleCompleted {
        station,
        output,
        output_count,
    });
    Ok(())
}

/// Advance every producing station by `delta_seconds`.
///
/// A station completes at most one cycle per call; overshoot is dropped and a
/// chained cycle starts from zero.
pub fn advance_stations(
    world: &mut World,
    delta_seconds: f32,
    events: &mut EventQueue,
    mut yaw: impl FnMut() -> f32,
) {
    let mut finished = Vec::new();
    for (entity, station) in world.query_mut::<&mut ProductionStation>() {
        let rate = station.rate();
        if let CycleState::Producing { progress, .. } = &mut station.state {
            *progress = (*progress + rate * delta_seconds).min(1.0);
            if *progress >= 1.0 {
                finished.push(entity);
            }
        }
    }

    for station in finished {
        let result = complete_cycle(world, station, events, yaw())
            .and_then(|_| try_start_cycle(world, station, events));
        if let Err(err) = result {
            log::warn!("station {:?} failed to finish its cycle: {}", station, err);
            if let Err(err) = abort_cycle(world, station) {
                log::warn!("station {:?} could not drop its cycle: {}", station, err);
            }
        }
    }
}

/// Drop a running cycle without consuming anything
fn abort_cycle(world: &mut World, station: Entity) -> Result<(), TransferError> {
    if let CycleState::Producing { pending_output, .. } = with_station(world, station, |s| s.state)? {
        stacking::despawn_stack(world, pending_output)?;
        station_mut(world, station)?.state = CycleState::Idle;
    }
    Ok(())
}

/// Remove a station together with every unit it owns. A cycle in progress is
/// dropped without consuming or producing anything.
pub fn destroy_station(world: &mut World, station: Entity) -> Result<u32, TransferError> {
    let (state, slots, output) =
        with_station(world, station, |s| (s.state, s.slots.clone(), s.output))?;

    let mut removed = 0;
    if let CycleState::Producing { pending_output, .. } = state {
        log::warn!("station {:?} destroyed mid-cycle", station);
        removed += stacking::despawn_stack(world, pending_output)?;
    }
    for bottom in slots.iter().filter_map(|slot| slot.stack).chain(output) {
        removed += stacking::despawn_stack(world, bottom)?;
    }

    world
        .despawn(station)
        .map_err(|_| TransferError::from(Rejection::UnknownTarget))?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ResourceType, SlotRequirement, TransferGrip};
    use crate::config::StationConfig;

    fn setup(inputs: &[ResourceType]) -> (World, Entity, Entity, EventQueue) {
        let mut world = World::new();
        let config = StationConfig::new("Test Crafter", inputs, ResourceType::Rail)
            .with_base_rate(0.5);
        let station = world.spawn((ProductionStation::from_config(&config),));
        let holder = world.spawn((TransferGrip::new(3),));
        (world, station, holder, EventQueue::new())
    }

    fn deliver(
        world: &mut World,
        holder: Entity,
        station: Entity,
        events: &mut EventQueue,
        resource: ResourceType,
        n: u32,
    ) -> Result<usize, TransferError> {
        let stack = stacking::spawn_stack(world, resource, n, || 0.0).unwrap();
        transfer::try_pick_up(world, holder, stack).unwrap();
        try_interact_using(world, holder, station, events, 0.0)
    }

    fn slot_count(world: &World, station: Entity, slot: usize) -> u32 {
        let bottom = with_station(world, station, |s| s.slots[slot].stack).unwrap();
        bottom.map_or(0, |b| stacking::count(world, b).unwrap())
    }

    #[test]
    fn test_parts_revealed() {
        assert_eq!(parts_revealed(0.0, 4), 0);
        assert_eq!(parts_revealed(0.5, 4), 2);
        assert_eq!(parts_revealed(0.99, 4), 3);
        assert_eq!(parts_revealed(1.5, 4), 4);
    }

    #[test]
    fn test_cycle_starts_once_all_slots_filled() {
        let (mut world, station, holder, mut events) =
            setup(&[ResourceType::Wood, ResourceType::Rock]);

        deliver(&mut world, holder, station, &mut events, ResourceType::Wood, 3).unwrap();
        assert!(!can_produce(&world, station).unwrap());
        assert!(!with_station(&world, station, ProductionStation::is_producing).unwrap());

        deliver(&mut world, holder, station, &mut events, ResourceType::Rock, 3).unwrap();
        assert!(with_station(&world, station, ProductionStation::is_producing).unwrap());
        assert_eq!(
            events.drain().last().copied(),
            Some(SimEvent::CycleStarted { station })
        );
    }

    #[test]
    fn test_full_cycle_consumes_one_per_slot() {
        let (mut world, station, holder, mut events) =
            setup(&[ResourceType::Wood, ResourceType::Rock]);
        deliver(&mut world, holder, station, &mut events, ResourceType::Wood, 3).unwrap();
        deliver(&mut world, holder, station, &mut events, ResourceType::Rock, 3).unwrap();

        // rate 0.5/s: one second is half a cycle
        advance_stations(&mut world, 1.0, &mut events, || 0.0);
        assert_eq!(with_station(&world, station, |s| s.progress()).unwrap(), Some(0.5));
        assert_eq!(slot_count(&world, station, 0), 3);

        advance_stations(&mut world, 1.0, &mut events, || 0.0);
        assert_eq!(slot_count(&world, station, 0), 2);
        assert_eq!(slot_count(&world, station, 1), 2);
        let output = with_station(&world, station, |s| s.output).unwrap().unwrap();
        assert_eq!(stacking::count(&world, output).unwrap(), 1);
        assert_eq!(stacking::resource_type(&world, output).unwrap(), ResourceType::Rail);

        // Chained without outside help
        assert_eq!(with_station(&world, station, |s| s.progress()).unwrap(), Some(0.0));
    }

    #[test]
    fn test_overshoot_completes_single_cycle() {
        let (mut world, station, holder, mut events) = setup(&[ResourceType::Wood]);
        deliver(&mut world, holder, station, &mut events, ResourceType::Wood, 3).unwrap();

        advance_stations(&mut world, 100.0, &mut events, || 0.0);
        assert_eq!(slot_count(&world, station, 0), 2);
        let output = with_station(&world, station, |s| s.output).unwrap().unwrap();
        assert_eq!(stacking::count(&world, output).unwrap(), 1);
    }

    #[test]
    fn test_station_goes_idle_when_inputs_run_out() {
        let (mut world, station, holder, mut events) = setup(&[ResourceType::Wood]);
        deliver(&mut world, holder, station, &mut events, ResourceType::Wood, 2).unwrap();

        for _ in 0..3 {
            advance_stations(&mut world, 2.0, &mut events, || 0.0);
        }
        assert_eq!(slot_count(&world, station, 0), 0);
        assert!(!with_station(&world, station, ProductionStation::is_producing).unwrap());
        let output = with_station(&world, station, |s| s.output).unwrap().unwrap();
        assert_eq!(stacking::stack_indices(&world, output).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_threshold_respected() {
        let mut world = World::new();
        let mut events = EventQueue::new();
        let mut config = StationConfig::new("Picky", &[ResourceType::Rock], ResourceType::Rail);
        config.inputs[0] = SlotRequirement::new(ResourceType::Rock).with_min_units(2);
        let station = world.spawn((ProductionStation::from_config(&config),));
        let holder = world.spawn((TransferGrip::new(1),));

        deliver(&mut world, holder, station, &mut events, ResourceType::Rock, 1).unwrap();
        assert!(!can_produce(&world, station).unwrap());
        deliver(&mut world, holder, station, &mut events, ResourceType::Rock, 1).unwrap();
        assert!(with_station(&world, station, ProductionStation::is_producing).unwrap());
    }

    #[test]
    fn test_empty_slot_cannot_complete_a_cycle() {
        let (mut world, station, holder, mut events) =
            setup(&[ResourceType::Wood, ResourceType::Rock]);
        deliver(&mut world, holder, station, &mut events, ResourceType::Wood, 3).unwrap();

        // A threshold of zero lets the cycle start with the rock slot empty
        station_mut(&mut world, station).unwrap().slots[1]
            .requirement
            .min_units = 0;
        assert!(try_start_cycle(&mut world, station, &mut events).unwrap());

        advance_stations(&mut world, 2.0, &mut events, || 0.0);
        assert_eq!(slot_count(&world, station, 0), 3);
        assert_eq!(with_station(&world, station, |s| s.output).unwrap(), None);
        assert!(!with_station(&world, station, ProductionStation::is_producing).unwrap());
        assert_eq!(world.query::<&crate::components::ResourceUnit>().iter().count(), 3);
    }

    #[test]
    fn test_slots_locked_while_producing() {
        let (mut world, station, holder, mut events) = setup(&[ResourceType::Wood]);
        deliver(&mut world, holder, station, &mut events, ResourceType::Wood, 3).unwrap();
        assert!(with_station(&world, station, ProductionStation::is_producing).unwrap());

        assert_eq!(
            take_from_slot(&mut world, holder, station, 0, &mut events),
            Err(TransferError::StationBusy)
        );
        assert_eq!(
            deliver(&mut world, holder, station, &mut events, ResourceType::Wood, 1),
            Err(TransferError::StationBusy)
        );
        assert_eq!(
            take_output(&mut world, holder, station),
            Err(TransferError::StationBusy)
        );
        assert_eq!(slot_count(&world, station, 0), 3);
    }

    #[test]
    fn test_take_from_idle_slot_and_output() {
        let (mut world, station, holder, mut events) =
            setup(&[ResourceType::Wood, ResourceType::Rock]);
        deliver(&mut world, holder, station, &mut events, ResourceType::Wood, 3).unwrap();

        let split = take_from_slot(&mut world, holder, station, 0, &mut events).unwrap();
        assert_eq!(split.remainder, None);
        assert_eq!(slot_count(&world, station, 0), 0);
        assert_eq!(
            take_from_slot(&mut world, holder, station, 7, &mut events),
            Err(TransferError::InvalidTransfer(Rejection::UnknownTarget))
        );
        assert_eq!(
            take_output(&mut world, holder, station),
            Err(TransferError::InsufficientSource)
        );
    }

    #[test]
    fn test_unmatched_resource_rejected() {
        let (mut world, station, holder, mut events) = setup(&[ResourceType::Wood]);
        assert_eq!(
            deliver(&mut world, holder, station, &mut events, ResourceType::Rail, 1),
            Err(TransferError::InvalidTransfer(Rejection::NoMatchingSlot(
                ResourceType::Rail
            )))
        );
        assert!(!transfer::grip(&world, holder).unwrap().is_empty());
    }

    #[test]
    fn test_destroy_mid_cycle_drops_pending_output() {
        let (mut world, station, holder, mut events) = setup(&[ResourceType::Wood]);
        deliver(&mut world, holder, station, &mut events, ResourceType::Wood, 2).unwrap();
        advance_stations(&mut world, 1.0, &mut events, || 0.0);

        // 2 wood + 1 pending rail
        assert_eq!(destroy_station(&mut world, station).unwrap(), 3);
        assert!(!world.contains(station));
        assert_eq!(world.query::<&crate::components::ResourceUnit>().iter().count(), 0);
    }
}
