//! Association lifecycle state machine.
//!
//! This module provides a pure, side-effect-free state machine for the
//! associator's lifecycle:
//!
//! ```text
//! Unassociated -> Associating -> Associated -> Disassociating -> Unassociated
//! ```
//!
//! The actual store and browser work is performed by `tabsync-client`, which
//! feeds events in and refuses operations the machine rejects.

use thiserror::Error;

/// Lifecycle state of a session associator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssociationState {
    /// No association has run, or the last one was torn down.
    #[default]
    Unassociated,
    /// A full association pass is in progress.
    Associating,
    /// The session tree and the store are associated.
    Associated,
    /// Teardown is in progress.
    Disassociating,
}

/// Inputs to the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationEvent {
    /// A full association pass was requested.
    AssociateRequested,
    /// The association pass completed.
    AssociateSucceeded,
    /// The association pass failed.
    AssociateFailed,
    /// Teardown was requested.
    DisassociateRequested,
    /// Teardown finished.
    DisassociateCompleted,
}

/// An event that is not legal in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid association transition: {event:?} while {from:?}")]
pub struct InvalidTransition {
    /// State the machine was in.
    pub from: AssociationState,
    /// Event that was rejected.
    pub event: AssociationEvent,
}

impl AssociationState {
    /// Create a state machine in the Unassociated state.
    pub fn new() -> Self {
        Self::Unassociated
    }

    /// Process an event and return the new state.
    ///
    /// Teardown may be requested from any state. Association may only start
    /// from Unassociated.
    pub fn on_event(self, event: AssociationEvent) -> Result<Self, InvalidTransition> {
        use AssociationEvent as E;
        match (self, event) {
            (Self::Unassociated, E::AssociateRequested) => Ok(Self::Associating),
            (Self::Associating, E::AssociateSucceeded) => Ok(Self::Associated),
            (Self::Associating, E::AssociateFailed) => Ok(Self::Unassociated),
            (_, E::DisassociateRequested) => Ok(Self::Disassociating),
            (Self::Disassociating, E::DisassociateCompleted) => Ok(Self::Unassociated),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }

    /// Whether local changes may be written to the store.
    pub fn is_associated(&self) -> bool {
        matches!(self, Self::Associated)
    }
}
