//! Association errors.

use tabsync_core::InvalidTransition;
use tabsync_types::{NodeId, SpecificsError};
use thiserror::Error;

use crate::store::StoreError;
use crate::tab_pool::PoolError;

/// Errors raised while associating the session tree with the store.
#[derive(Debug, Error)]
pub enum AssociationError {
    /// The store has no sessions root node.
    #[error("server did not create the top-level sessions node")]
    MissingRoot,

    /// Operation needs a completed association.
    #[error("not associated")]
    NotAssociated,

    /// The tracker or tab pool still holds state from a previous association.
    #[error("previous association state not cleared")]
    NotDisassociated,

    /// The local header node was deleted, probably by another device.
    #[error("local session header missing, reassociation needed")]
    LocalHeaderMissing,

    /// Two header records carry the local machine tag.
    #[error("found two local session headers ({first} and {second})")]
    DuplicateLocalHeader {
        /// Header found first.
        first: NodeId,
        /// Header found second.
        second: NodeId,
    },

    /// Tab nodes from a previous run are still checked out after the scan.
    #[error("tab node pool not fully free after scan ({free} of {capacity})")]
    PoolNotFull {
        /// Free nodes.
        free: usize,
        /// Nodes the pool owns.
        capacity: usize,
    },

    /// A record could not be interpreted.
    #[error("invalid session record: {0}")]
    Specifics(#[from] SpecificsError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Tab node pool error.
    #[error("tab node pool error: {0}")]
    Pool(#[from] PoolError),

    /// Lifecycle transition rejected.
    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),
}

impl AssociationError {
    /// Whether the error is a protocol or accounting violation.
    ///
    /// Non-fatal errors (store unavailable, header deleted remotely) can be
    /// retried after a disassociation.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::DuplicateLocalHeader { .. }
            | Self::PoolNotFull { .. }
            | Self::NotDisassociated
            | Self::Specifics(_)
            | Self::Store(StoreError::Specifics(_))
            | Self::Pool(PoolError::Store(StoreError::Specifics(_))) => true,
            Self::MissingRoot
            | Self::NotAssociated
            | Self::LocalHeaderMissing
            | Self::Store(_)
            | Self::Pool(_)
            | Self::InvalidState(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_and_accounting_violations_are_fatal() {
        assert!(AssociationError::DuplicateLocalHeader {
            first: NodeId::new(1),
            second: NodeId::new(2),
        }
        .is_fatal());
        assert!(AssociationError::PoolNotFull {
            free: 0,
            capacity: 1
        }
        .is_fatal());
        assert!(AssociationError::Specifics(SpecificsError::MissingPayload {
            session_tag: "tag".into()
        })
        .is_fatal());
    }

    #[test]
    fn store_trouble_is_retryable() {
        assert!(!AssociationError::MissingRoot.is_fatal());
        assert!(!AssociationError::LocalHeaderMissing.is_fatal());
        assert!(!AssociationError::Store(StoreError::CreateFailed("quota".into())).is_fatal());
        assert!(!AssociationError::Pool(PoolError::MissingRoot).is_fatal());
    }
}
