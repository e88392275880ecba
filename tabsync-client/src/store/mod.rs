//! Sync store abstraction for tabsync.
//!
//! The engine treats the remote sync store as a transactional tree of
//! nodes. Every node under the sessions root holds one
//! [`SessionSpecifics`] record.
//!
//! # Design
//!
//! Transactions are closure-scoped:
//! - `read_transaction()` hands out a [`ReadTransaction`] for lookups
//! - `write_transaction()` hands out a [`WriteTransaction`] that can also
//!   create, update and remove nodes
//!
//! Transactions are never nested. The reference implementation is
//! [`MemoryStore`].
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryStore::new("cache-guid");
//! let root = store.create_root();
//! let id = store.write_transaction(|trans| trans.create_unique(root, "tag"))?;
//! ```

mod memory;

pub use memory::{MemoryStore, NodeSnapshot, StoreSnapshot};

use std::time::SystemTime;
use tabsync_types::{NodeId, SessionSpecifics, SpecificsError};
use thiserror::Error;

/// Server tag of the node every session record lives under.
pub const SESSIONS_ROOT_TAG: &str = "session_sync_root";

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No node with this id.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// A node with this client tag already exists.
    #[error("node with tag {0:?} already exists")]
    DuplicateTag(String),

    /// Node creation failed.
    #[error("node creation failed: {0}")]
    CreateFailed(String),

    /// Node lookup failed.
    #[error("node lookup failed: {0}")]
    LookupFailed(String),

    /// Stored payload could not be encoded or decoded.
    #[error("record error: {0}")]
    Specifics(#[from] SpecificsError),
}

/// Read access to the store, valid for one transaction.
pub trait ReadTransaction {
    /// Find a permanent node by server tag (e.g. the sessions root).
    fn root_by_tag(&self, server_tag: &str) -> Option<NodeId>;

    /// Find a node by the client tag it was created with.
    fn lookup_by_client_tag(&self, client_tag: &str) -> Option<NodeId>;

    /// First child of `parent`, if any.
    fn first_child(&self, parent: NodeId) -> Result<Option<NodeId>, StoreError>;

    /// Next sibling of `id`, if any.
    fn successor(&self, id: NodeId) -> Result<Option<NodeId>, StoreError>;

    /// Record stored in `id`. A node never written holds an empty record.
    fn specifics(&self, id: NodeId) -> Result<SessionSpecifics, StoreError>;

    /// Last time `id` was written.
    fn modification_time(&self, id: NodeId) -> Result<SystemTime, StoreError>;

    /// Title of `id`.
    fn title(&self, id: NodeId) -> Result<String, StoreError>;
}

/// Read and write access to the store, valid for one transaction.
pub trait WriteTransaction: ReadTransaction {
    /// Create a node under `parent` with a client tag no other node has.
    fn create_unique(&mut self, parent: NodeId, client_tag: &str) -> Result<NodeId, StoreError>;

    /// Set the title of `id`.
    fn set_title(&mut self, id: NodeId, title: &str) -> Result<(), StoreError>;

    /// Replace the record stored in `id`.
    fn set_specifics(&mut self, id: NodeId, specifics: &SessionSpecifics)
        -> Result<(), StoreError>;

    /// Remove `id` from the store.
    fn remove(&mut self, id: NodeId) -> Result<(), StoreError>;
}

/// A transactional sync store.
pub trait SyncStore {
    /// Stable identifier of this store installation.
    fn cache_guid(&self) -> String;

    /// Run `f` inside a read transaction.
    fn read_transaction<R>(&self, f: impl FnOnce(&dyn ReadTransaction) -> R) -> R;

    /// Run `f` inside a write transaction.
    fn write_transaction<R>(&self, f: impl FnOnce(&mut dyn WriteTransaction) -> R) -> R;
}

/// Ids of every child of `parent`, in sibling order.
pub fn children<T: ReadTransaction + ?Sized>(
    trans: &T,
    parent: NodeId,
) -> Result<Vec<NodeId>, StoreError> {
    let mut ids = Vec::new();
    let mut next = trans.first_child(parent)?;
    while let Some(id) = next {
        ids.push(id);
        next = trans.successor(id)?;
    }
    Ok(ids)
}
