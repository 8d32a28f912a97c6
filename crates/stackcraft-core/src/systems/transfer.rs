//! Transfer system - pickup and drop through a holder's grip
//!
//! A holder carries at most one stack at a time. Picking up always detaches a
//! contiguous top slice of the source; dropping either merges onto a matching
//! stack or leaves the carried stack standing on its own.

use hecs::{Entity, World};

use super::stacking::{self, Split};
use crate::components::{Placement, TransferGrip};
use crate::error::{Rejection, TransferError};

/// Where a dropped stack ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Standing alone, anchored at this bottom unit
    Placed(Entity),
    /// Appended onto the stack anchored at this bottom unit
    Merged(Entity),
}

impl DropOutcome {
    pub fn bottom(&self) -> Entity {
        match self {
            DropOutcome::Placed(bottom) | DropOutcome::Merged(bottom) => *bottom,
        }
    }
}

/// Copy of the grip carried by `holder`
pub fn grip(world: &World, holder: Entity) -> Result<TransferGrip, TransferError> {
    world
        .get::<&TransferGrip>(holder)
        .map(|grip| *grip)
        .map_err(|_| Rejection::UnknownTarget.into())
}

fn grip_mut(world: &mut World, holder: Entity) -> Result<&mut TransferGrip, TransferError> {
    world
        .query_one_mut::<&mut TransferGrip>(holder)
        .map_err(|_| Rejection::UnknownTarget.into())
}

/// Pick up from the stack anchored at `source_bottom`. Two-handed types ask
/// for the holder's full capacity; the split clamps that to the source's size.
pub fn try_pick_up(
    world: &mut World,
    holder: Entity,
    source_bottom: Entity,
) -> Result<Split, TransferError> {
    let grip = grip(world, holder)?;
    if !grip.is_empty() {
        return Err(Rejection::HandsFull.into());
    }

    let resource = stacking::resource_type(world, source_bottom)?;
    let split = stacking::split(world, source_bottom, grip.requested_amount(resource))?;
    grip_mut(world, holder)?.carried = Some(split.detached);

    log::debug!(
        "holder {:?} picked up {:?} x{}",
        holder,
        resource,
        stacking::count(world, split.detached)?
    );
    Ok(split)
}

/// Put the carried stack onto `target` (bottom of a stack already sitting at
/// the drop location) or down on its own when there is none.
///
/// `guard` is the holder's own veto, e.g. mid tool swing. Nothing changes on
/// failure; a type mismatch leaves the stack in the holder's hands.
pub fn try_drop(
    world: &mut World,
    holder: Entity,
    target: Option<Entity>,
    guard: impl FnOnce() -> bool,
    yaw_degrees: f32,
) -> Result<DropOutcome, TransferError> {
    let carried = grip(world, holder)?
        .carried
        .ok_or(TransferError::InvalidTransfer(Rejection::NothingHeld))?;
    if !guard() {
        return Err(Rejection::DropBlocked.into());
    }

    let outcome = match target {
        Some(bottom) => {
            stacking::merge(world, bottom, carried, yaw_degrees)?;
            DropOutcome::Merged(bottom)
        }
        None => {
            world
                .insert_one(carried, Placement::default())
                .map_err(|_| TransferError::InsufficientSource)?;
            DropOutcome::Placed(carried)
        }
    };
    grip_mut(world, holder)?.carried = None;

    log::debug!("holder {:?} dropped stack: {:?}", holder, outcome);
    Ok(outcome)
}

/// Empty the grip, handing its stack to the caller
pub fn release(world: &mut World, holder: Entity) -> Result<Entity, TransferError> {
    grip_mut(world, holder)?
        .carried
        .take()
        .ok_or(TransferError::InvalidTransfer(Rejection::NothingHeld))
}
