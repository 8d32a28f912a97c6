//! Events system - notifications for the presentation and interaction layers
//!
//! Systems push an event for every successful transfer and every cycle
//! transition. The owner of the engine drains them once per frame to drive
//! arm animation, crafting visuals and sounds.

use hecs::Entity;

use crate::components::GridCell;

/// Something that happened during the last operations or tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    /// A holder picked up a stack
    PickedUp {
        holder: Entity,
        stack: Entity,
        count: u32,
        /// Both arms are raised
        two_handed: bool,
    },
    /// A holder put its stack down in the world
    Dropped {
        holder: Entity,
        cell: GridCell,
        /// Bottom of the stack now sitting at `cell`
        stack: Entity,
        /// Whether it landed on an existing stack
        merged: bool,
    },
    /// A holder fed its stack into a station slot
    Delivered {
        holder: Entity,
        station: Entity,
        slot: usize,
    },
    CycleStarted {
        station: Entity,
    },
    CycleCompleted {
        station: Entity,
        /// Bottom of the output stack
        output: Entity,
        output_count: u32,
    },
}

/// FIFO of pending events
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<SimEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Take every pending event, oldest first
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecs::World;

    #[test]
    fn test_drain_empties_queue() {
        let mut world = World::new();
        let station = world.spawn(());
        let mut queue = EventQueue::new();

        queue.push(SimEvent::CycleStarted { station });
        assert_eq!(queue.len(), 1);

        let drained = queue.drain();
        assert_eq!(drained, vec![SimEvent::CycleStarted { station }]);
        assert!(queue.is_empty());
    }
}
