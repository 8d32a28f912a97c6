//! Errors returned by transfer and crafting operations.
//!
//! Every failure here is expected and recoverable: the operation that
//! returned it left the world untouched.

use thiserror::Error;

use crate::components::ResourceType;

/// Why a transfer was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Stacks of different resource types cannot be joined
    #[error("cannot stack {} onto {}", .incoming.name(), .target.name())]
    TypeMismatch {
        target: ResourceType,
        incoming: ResourceType,
    },
    #[error("holder is already carrying a stack")]
    HandsFull,
    #[error("holder is not carrying anything")]
    NothingHeld,
    /// The holder's drop guard refused
    #[error("holder cannot drop right now")]
    DropBlocked,
    #[error("station has no slot for {}", .0.name())]
    NoMatchingSlot(ResourceType),
    #[error("transfer of zero units")]
    ZeroAmount,
    #[error("cell already holds a stack")]
    CellOccupied,
    #[error("cannot stack a stack onto itself")]
    SameStack,
    /// Handle does not refer to a live holder, station or slot
    #[error("no such holder, station or slot")]
    UnknownTarget,
}

/// Errors that can occur while moving units around
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("invalid transfer: {0}")]
    InvalidTransfer(Rejection),
    #[error("source stack is empty or missing")]
    InsufficientSource,
    #[error("station is producing")]
    StationBusy,
}

impl TransferError {
    pub fn type_mismatch(target: ResourceType, incoming: ResourceType) -> Self {
        TransferError::InvalidTransfer(Rejection::TypeMismatch { target, incoming })
    }
}

impl From<Rejection> for TransferError {
    fn from(rejection: Rejection) -> Self {
        TransferError::InvalidTransfer(rejection)
    }
}
