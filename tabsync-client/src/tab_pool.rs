//! Pool of store nodes reserved for local tab records.
//!
//! Tab nodes are reused before new ones are created, so a device's node
//! count only grows with the largest number of tabs it ever had open at
//! once. The pool's capacity counts every tab node this device owns; the
//! free list holds the ones no live tab is using.

use tabsync_types::NodeId;
use thiserror::Error;

use crate::store::{StoreError, SyncStore, SESSIONS_ROOT_TAG};

/// Tab node pool errors.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No machine tag was set before a node had to be created.
    #[error("no machine tag set")]
    NoMachineTag,

    /// The sessions root node does not exist.
    #[error("sessions root node missing")]
    MissingRoot,

    /// The store refused to create the node.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Client tag of tab node number `n` of `machine_tag`.
pub fn tab_node_tag(machine_tag: &str, n: usize) -> String {
    format!("{} {}", machine_tag, n)
}

/// Free list of tab node ids.
#[derive(Debug, Default)]
pub struct TabNodePool {
    machine_tag: Option<String>,
    free: Vec<NodeId>,
    capacity: usize,
}

impl TabNodePool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the machine tag used to name new tab nodes.
    pub fn set_machine_tag(&mut self, machine_tag: impl Into<String>) {
        self.machine_tag = Some(machine_tag.into());
    }

    /// Machine tag used to name new tab nodes.
    pub fn machine_tag(&self) -> Option<&str> {
        self.machine_tag.as_deref()
    }

    /// Register an existing, unused tab node found while scanning the store.
    pub fn seed(&mut self, id: NodeId) {
        self.free.push(id);
        self.capacity += 1;
    }

    /// Take a node for a tab.
    ///
    /// Reuses the most recently freed node; otherwise creates a node tagged
    /// `"<machine tag> <capacity>"` under the sessions root.
    pub fn checkout<S: SyncStore>(&mut self, store: &S) -> Result<NodeId, PoolError> {
        if let Some(id) = self.free.pop() {
            return Ok(id);
        }

        let machine_tag = self.machine_tag.as_deref().ok_or(PoolError::NoMachineTag)?;
        let tag = tab_node_tag(machine_tag, self.capacity);
        let id = store.write_transaction(|trans| {
            let root = trans
                .root_by_tag(SESSIONS_ROOT_TAG)
                .ok_or(PoolError::MissingRoot)?;
            let id = trans.create_unique(root, &tag)?;
            trans.set_title(id, &tag)?;
            Ok::<_, PoolError>(id)
        })?;

        self.capacity += 1;
        tracing::debug!("Adding sync node {} to tab node pool", id);
        Ok(id)
    }

    /// Return a node no live tab references.
    ///
    /// A node that is already free, or a release that would exceed the
    /// pool's capacity, is ignored.
    pub fn release(&mut self, id: NodeId) {
        if self.free.contains(&id) {
            tracing::warn!("Tab node {} released twice, ignoring", id);
            return;
        }
        if self.free.len() >= self.capacity {
            tracing::warn!(
                "Tab node {} released into a full pool of {}, ignoring",
                id,
                self.capacity
            );
            return;
        }
        self.free.push(id);
    }

    /// Whether every node the pool owns is free.
    pub fn is_full(&self) -> bool {
        self.free.len() == self.capacity
    }

    /// Whether the pool owns no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.capacity == 0
    }

    /// Number of tab nodes this device owns.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free nodes.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Forget every node and the machine tag.
    pub fn clear(&mut self) {
        self.free.clear();
        self.capacity = 0;
        self.machine_tag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ReadTransaction};

    fn pool_with_tag() -> TabNodePool {
        let mut pool = TabNodePool::new();
        pool.set_machine_tag("session_synctest");
        pool
    }

    #[test]
    fn checkout_creates_tagged_nodes() {
        let store = MemoryStore::with_root();
        let mut pool = pool_with_tag();

        let a = pool.checkout(&store).unwrap();
        let b = pool.checkout(&store).unwrap();

        assert_ne!(a, b);
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.free_count(), 0);
        let (found, title) = store.read_transaction(|trans| {
            (
                trans.lookup_by_client_tag("session_synctest 1"),
                trans.title(b).unwrap(),
            )
        });
        assert_eq!(found, Some(b));
        assert_eq!(title, "session_synctest 1");
    }

    #[test]
    fn checkout_reuses_before_creating() {
        let store = MemoryStore::with_root();
        let mut pool = pool_with_tag();
        let a = pool.checkout(&store).unwrap();
        pool.release(a);

        let nodes_before = store.node_count();
        assert_eq!(pool.checkout(&store).unwrap(), a);
        assert_eq!(store.node_count(), nodes_before);
    }

    #[test]
    fn seeded_nodes_are_reused_and_numbering_continues() {
        let store = MemoryStore::with_root();
        let mut pool = pool_with_tag();
        pool.seed(NodeId::new(500));
        pool.seed(NodeId::new(501));
        assert!(pool.is_full());

        assert_eq!(pool.checkout(&store).unwrap(), NodeId::new(501));
        assert_eq!(pool.checkout(&store).unwrap(), NodeId::new(500));
        let created = pool.checkout(&store).unwrap();
        let found = store.read_transaction(|trans| trans.lookup_by_client_tag("session_synctest 2"));
        assert_eq!(found, Some(created));
    }

    #[test]
    fn checkout_without_tag_fails() {
        let store = MemoryStore::with_root();
        let mut pool = TabNodePool::new();
        assert!(matches!(
            pool.checkout(&store),
            Err(PoolError::NoMachineTag)
        ));
    }

    #[test]
    fn checkout_without_root_fails() {
        let store = MemoryStore::new("guid");
        let mut pool = pool_with_tag();
        assert!(matches!(pool.checkout(&store), Err(PoolError::MissingRoot)));
        assert_eq!(pool.capacity(), 0);
    }

    #[test]
    fn store_failure_does_not_grow_pool() {
        let store = MemoryStore::with_root();
        store.fail_next_create("quota");
        let mut pool = pool_with_tag();
        assert!(matches!(pool.checkout(&store), Err(PoolError::Store(_))));
        assert_eq!(pool.capacity(), 0);
    }

    #[test]
    fn double_release_ignored() {
        let store = MemoryStore::with_root();
        let mut pool = pool_with_tag();
        let a = pool.checkout(&store).unwrap();
        let _b = pool.checkout(&store).unwrap();
        pool.release(a);
        pool.release(a);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn release_beyond_capacity_ignored() {
        let mut pool = pool_with_tag();
        pool.release(NodeId::new(9));
        assert_eq!(pool.free_count(), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn conservation_over_operation_sequences() {
        // Every checkout/release sequence of length 8 keeps
        // free + checked out == capacity with no id outstanding twice.
        for seq in 0..256u32 {
            let store = MemoryStore::with_root();
            let mut pool = pool_with_tag();
            let mut live: Vec<NodeId> = Vec::new();
            for step in 0..8 {
                if seq & (1 << step) != 0 || live.is_empty() {
                    live.push(pool.checkout(&store).unwrap());
                } else if let Some(id) = live.pop() {
                    pool.release(id);
                }
                assert_eq!(pool.free_count() + live.len(), pool.capacity());
                let mut all = live.clone();
                all.sort();
                all.dedup();
                assert_eq!(all.len(), live.len());
            }
        }
    }

    #[test]
    fn clear_resets() {
        let mut pool = pool_with_tag();
        pool.seed(NodeId::new(1));
        pool.clear();
        assert!(pool.is_empty());
        assert!(pool.machine_tag().is_none());
    }
}
