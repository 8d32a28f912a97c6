//! Stacking system - split and merge chains of resource units
//!
//! A stack is a chain of [`ResourceUnit`] entities linked through `next`/`prev`
//! handles and identified by its bottom unit. Only the top of a stack is ever
//! split off, and only same-typed stacks are joined, so the chain never turns
//! into a tree.

use hecs::{Entity, World};

use crate::components::{Placement, ResourceType, ResourceUnit};
use crate::error::{Rejection, TransferError};

/// Result of splitting a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    /// Bottom of the detached top slice
    pub detached: Entity,
    /// Bottom of what stayed behind, `None` if the whole stack was taken
    pub remainder: Option<Entity>,
}

/// Copy of the unit stored on `entity`
pub fn unit(world: &World, entity: Entity) -> Result<ResourceUnit, TransferError> {
    world
        .get::<&ResourceUnit>(entity)
        .map(|unit| *unit)
        .map_err(|_| TransferError::InsufficientSource)
}

fn unit_mut(world: &mut World, entity: Entity) -> Result<&mut ResourceUnit, TransferError> {
    world
        .query_one_mut::<&mut ResourceUnit>(entity)
        .map_err(|_| TransferError::InsufficientSource)
}

fn set_placement(world: &mut World, entity: Entity, placement: Placement) -> Result<(), TransferError> {
    world
        .insert_one(entity, placement)
        .map_err(|_| TransferError::InsufficientSource)
}

/// Spawn a lone unit
pub fn spawn_unit(world: &mut World, resource_type: ResourceType, height: f32) -> Entity {
    world.spawn((
        ResourceUnit::with_height(resource_type, height),
        Placement::default(),
    ))
}

/// Spawn a pre-seeded stack of `count` units by repeatedly stacking a copy of
/// the bottom unit onto itself. `yaw` supplies the cosmetic rotation of each
/// stacked copy.
pub fn spawn_stack(
    world: &mut World,
    resource_type: ResourceType,
    count: u32,
    mut yaw: impl FnMut() -> f32,
) -> Result<Entity, TransferError> {
    if count == 0 {
        return Err(Rejection::ZeroAmount.into());
    }

    let bottom = spawn_unit(world, resource_type, resource_type.default_height());
    for _ in 1..count {
        let copy = spawn_unit(world, resource_type, resource_type.default_height());
        merge(world, bottom, copy, yaw())?;
    }
    Ok(bottom)
}

/// Walk down to the bottom anchor of the stack containing `entity`
pub fn bottom_of(world: &World, entity: Entity) -> Result<Entity, TransferError> {
    let mut current = entity;
    while let Some(prev) = unit(world, current)?.prev {
        current = prev;
    }
    Ok(current)
}

/// Walk up to the top unit of the stack containing `entity`
pub fn top_of(world: &World, entity: Entity) -> Result<Entity, TransferError> {
    let mut current = entity;
    while let Some(next) = unit(world, current)?.next {
        current = next;
    }
    Ok(current)
}

/// Every unit from `bottom` upward
pub fn units(world: &World, bottom: Entity) -> Result<Vec<Entity>, TransferError> {
    let mut chain = vec![bottom];
    let mut current = bottom;
    while let Some(next) = unit(world, current)?.next {
        chain.push(next);
        current = next;
    }
    Ok(chain)
}

/// Number of units from `bottom` upward
pub fn count(world: &World, bottom: Entity) -> Result<u32, TransferError> {
    Ok(units(world, bottom)?.len() as u32)
}

/// Sum of unit heights from `bottom` upward
pub fn height(world: &World, bottom: Entity) -> Result<f32, TransferError> {
    units(world, bottom)?
        .into_iter()
        .map(|entity| unit(world, entity).map(|u| u.height))
        .sum()
}

/// Resource type shared by every unit of the stack
pub fn resource_type(world: &World, entity: Entity) -> Result<ResourceType, TransferError> {
    Ok(unit(world, entity)?.resource_type)
}

/// `stack_index` of every unit from `bottom` upward
pub fn stack_indices(world: &World, bottom: Entity) -> Result<Vec<u32>, TransferError> {
    units(world, bottom)?
        .into_iter()
        .map(|entity| unit(world, entity).map(|u| u.stack_index))
        .collect()
}

/// Renumber `start` and everything above it, beginning at `first_index`
fn reindex_from(world: &mut World, start: Entity, first_index: u32) -> Result<(), TransferError> {
    let mut current = Some(start);
    let mut index = first_index;
    while let Some(entity) = current {
        let unit = unit_mut(world, entity)?;
        unit.stack_index = index;
        current = unit.next;
        index += 1;
    }
    Ok(())
}

/// Detach the top `take` units of the stack anchored at `bottom`.
///
/// When `take` covers the whole stack, the whole stack is detached and the
/// remainder is empty.
pub fn split(world: &mut World, bottom: Entity, take: u32) -> Result<Split, TransferError> {
    if take == 0 {
        return Err(Rejection::ZeroAmount.into());
    }
    debug_assert!(unit(world, bottom)?.is_bottom(), "split must start at a bottom unit");

    let total = count(world, bottom)?;
    if take >= total {
        set_placement(world, bottom, Placement::default())?;
        return Ok(Split {
            detached: bottom,
            remainder: None,
        });
    }

    // Keep `total - take` units in place
    let mut cut = bottom;
    for _ in 0..(total - take) {
        cut = unit(world, cut)?
            .next
            .ok_or(TransferError::InsufficientSource)?;
    }
    let below = unit(world, cut)?
        .prev
        .ok_or(TransferError::InsufficientSource)?;

    unit_mut(world, below)?.next = None;
    unit_mut(world, cut)?.prev = None;
    reindex_from(world, cut, 0)?;
    set_placement(world, cut, Placement::default())?;

    Ok(Split {
        detached: cut,
        remainder: Some(bottom),
    })
}

/// Put the stack anchored at `source_bottom` on top of the stack containing
/// `target`. Fails without touching either stack if the types differ.
pub fn merge(
    world: &mut World,
    target: Entity,
    source_bottom: Entity,
    yaw_degrees: f32,
) -> Result<(), TransferError> {
    let top = top_of(world, target)?;
    let top_unit = unit(world, top)?;
    let source = unit(world, source_bottom)?;

    if source.resource_type != top_unit.resource_type {
        return Err(TransferError::type_mismatch(
            top_unit.resource_type,
            source.resource_type,
        ));
    }
    if !source.is_bottom() {
        return Err(Rejection::UnknownTarget.into());
    }
    if bottom_of(world, top)? == source_bottom {
        return Err(Rejection::SameStack.into());
    }

    unit_mut(world, top)?.next = Some(source_bottom);
    unit_mut(world, source_bottom)?.prev = Some(top);
    reindex_from(world, source_bottom, top_unit.stack_index + 1)?;
    set_placement(
        world,
        source_bottom,
        Placement::on_top_of(top_unit.height, yaw_degrees),
    )?;

    Ok(())
}

/// Destroy the top unit of the stack anchored at `bottom`.
///
/// Returns the bottom of what is left, or `None` if that was the last unit.
pub fn consume_top(world: &mut World, bottom: Entity) -> Result<Option<Entity>, TransferError> {
    let top = top_of(world, bottom)?;
    let below = unit(world, top)?.prev;
    if let Some(below) = below {
        unit_mut(world, below)?.next = None;
    }
    world
        .despawn(top)
        .map_err(|_| TransferError::InsufficientSource)?;

    Ok(below.map(|_| bottom))
}

/// Destroy every unit of the stack anchored at `bottom`, returning how many
/// were removed.
pub fn despawn_stack(world: &mut World, bottom: Entity) -> Result<u32, TransferError> {
    let chain = units(world, bottom)?;
    for entity in &chain {
        world
            .despawn(*entity)
            .map_err(|_| TransferError::InsufficientSource)?;
    }
    Ok(chain.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(world: &mut World, resource: ResourceType, n: u32) -> Entity {
        spawn_stack(world, resource, n, || 0.0).unwrap()
    }

    #[test]
    fn test_spawn_stack_seeds_indices() {
        let mut world = World::new();
        let bottom = stack(&mut world, ResourceType::Wood, 4);

        assert_eq!(count(&world, bottom).unwrap(), 4);
        assert_eq!(stack_indices(&world, bottom).unwrap(), vec![0, 1, 2, 3]);
        assert!((height(&world, bottom).unwrap() - 1.0).abs() < 1e-5);
        assert!(spawn_stack(&mut world, ResourceType::Wood, 0, || 0.0).is_err());
    }

    #[test]
    fn test_split_partial() {
        let mut world = World::new();
        let bottom = stack(&mut world, ResourceType::Rock, 5);

        let split = split(&mut world, bottom, 2).unwrap();
        assert_eq!(split.remainder, Some(bottom));
        assert_eq!(count(&world, split.detached).unwrap(), 2);
        assert_eq!(count(&world, bottom).unwrap(), 3);
        assert_eq!(stack_indices(&world, split.detached).unwrap(), vec![0, 1]);
        assert_eq!(stack_indices(&world, bottom).unwrap(), vec![0, 1, 2]);
        assert!(unit(&world, split.detached).unwrap().is_bottom());
        assert!(unit(&world, top_of(&world, bottom).unwrap()).unwrap().is_top());
    }

    #[test]
    fn test_split_whole_stack() {
        let mut world = World::new();
        let bottom = stack(&mut world, ResourceType::Rock, 3);

        let split = split(&mut world, bottom, 3).unwrap();
        assert_eq!(split.detached, bottom);
        assert_eq!(split.remainder, None);

        let bottom = stack(&mut world, ResourceType::Rock, 3);
        let split = super::split(&mut world, bottom, 10).unwrap();
        assert_eq!(split.remainder, None);
        assert_eq!(count(&world, split.detached).unwrap(), 3);
    }

    #[test]
    fn test_split_zero_rejected() {
        let mut world = World::new();
        let bottom = stack(&mut world, ResourceType::Wood, 2);

        assert_eq!(
            split(&mut world, bottom, 0),
            Err(TransferError::InvalidTransfer(Rejection::ZeroAmount))
        );
        assert_eq!(count(&world, bottom).unwrap(), 2);
    }

    #[test]
    fn test_merge_matching_types() {
        let mut world = World::new();
        let a = stack(&mut world, ResourceType::Wood, 2);
        let b = stack(&mut world, ResourceType::Wood, 3);

        merge(&mut world, a, b, 5.0).unwrap();
        assert_eq!(count(&world, a).unwrap(), 5);
        assert_eq!(stack_indices(&world, a).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(bottom_of(&world, b).unwrap(), a);

        let placement = *world.get::<&Placement>(b).unwrap();
        assert_eq!(placement.offset.y, ResourceType::Wood.default_height());
        assert_eq!(placement.yaw_degrees, 5.0);
    }

    #[test]
    fn test_merge_type_mismatch_leaves_both() {
        let mut world = World::new();
        let wood = stack(&mut world, ResourceType::Wood, 2);
        let rock = stack(&mut world, ResourceType::Rock, 1);

        let err = merge(&mut world, wood, rock, 0.0).unwrap_err();
        assert_eq!(
            err,
            TransferError::type_mismatch(ResourceType::Wood, ResourceType::Rock)
        );
        assert_eq!(count(&world, wood).unwrap(), 2);
        assert_eq!(count(&world, rock).unwrap(), 1);
        assert!(unit(&world, rock).unwrap().is_bottom());
    }

    #[test]
    fn test_merge_onto_itself_rejected() {
        let mut world = World::new();
        let wood = stack(&mut world, ResourceType::Wood, 2);

        assert_eq!(
            merge(&mut world, wood, wood, 0.0),
            Err(TransferError::InvalidTransfer(Rejection::SameStack))
        );
        assert_eq!(count(&world, wood).unwrap(), 2);
    }

    #[test]
    fn test_consume_top() {
        let mut world = World::new();
        let bottom = stack(&mut world, ResourceType::Rail, 2);

        assert_eq!(consume_top(&mut world, bottom).unwrap(), Some(bottom));
        assert_eq!(count(&world, bottom).unwrap(), 1);
        assert_eq!(consume_top(&mut world, bottom).unwrap(), None);
        assert!(!world.contains(bottom));
    }

    #[test]
    fn test_despawn_stack() {
        let mut world = World::new();
        let bottom = stack(&mut world, ResourceType::Rail, 3);

        assert_eq!(despawn_stack(&mut world, bottom).unwrap(), 3);
        assert_eq!(world.len(), 0);
    }
}
