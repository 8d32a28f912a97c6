//! Holder components: TransferGrip

use hecs::Entity;

use super::resource::ResourceType;

/// TransferGrip component - a holder's single in-hand carry slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferGrip {
    /// Maximum number of units carried at once (always at least 1)
    pub capacity: u32,
    /// Bottom unit of the carried stack
    pub carried: Option<Entity>,
}

impl TransferGrip {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity: capacity.max(1),
            carried: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.carried.is_none()
    }

    /// How many units a pickup of `resource` asks for
    pub fn requested_amount(&self, resource: ResourceType) -> u32 {
        if resource.is_two_handed() {
            self.capacity
        } else {
            1
        }
    }
}
