//! Resource components: ResourceType, ResourceUnit

use hecs::Entity;
use serde::{Deserialize, Serialize};

/// Kinds of stackable resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Wood,
    Rock,
    Rail,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [ResourceType::Wood, ResourceType::Rock, ResourceType::Rail];

    /// Vertical extent of a freshly created unit of this type
    pub fn default_height(&self) -> f32 {
        match self {
            ResourceType::Wood => 0.25,
            ResourceType::Rock => 0.3,
            ResourceType::Rail => 0.1,
        }
    }

    /// Two-handed resources are always carried at the holder's full capacity
    /// and occupy both arms.
    pub fn is_two_handed(&self) -> bool {
        match self {
            ResourceType::Wood | ResourceType::Rock | ResourceType::Rail => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::Wood => "Wood",
            ResourceType::Rock => "Rock",
            ResourceType::Rail => "Rail",
        }
    }
}

/// ResourceUnit component - one node of a stack.
///
/// `next` points toward the top, `prev` toward the bottom. Neither link owns
/// the other unit; a stack is owned by whoever holds its bottom handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUnit {
    pub resource_type: ResourceType,
    pub height: f32,
    /// Position from the bottom of the current stack (0 = bottom)
    pub stack_index: u32,
    pub next: Option<Entity>,
    pub prev: Option<Entity>,
}

impl ResourceUnit {
    pub fn new(resource_type: ResourceType) -> Self {
        Self::with_height(resource_type, resource_type.default_height())
    }

    pub fn with_height(resource_type: ResourceType, height: f32) -> Self {
        Self {
            resource_type,
            height,
            stack_index: 0,
            next: None,
            prev: None,
        }
    }

    pub fn is_bottom(&self) -> bool {
        self.prev.is_none()
    }

    pub fn is_top(&self) -> bool {
        self.next.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unit_is_lone_stack() {
        let unit = ResourceUnit::new(ResourceType::Rock);
        assert!(unit.is_bottom());
        assert!(unit.is_top());
        assert_eq!(unit.stack_index, 0);
        assert_eq!(unit.height, ResourceType::Rock.default_height());
    }

    #[test]
    fn test_default_heights_positive() {
        for resource in ResourceType::ALL {
            assert!(resource.default_height() > 0.0, "{}", resource.name());
        }
    }
}
