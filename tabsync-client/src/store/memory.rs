//! In-memory sync store.
//!
//! Used by tests and by the CLI, which loads it from a JSON snapshot.
//! Payloads are kept MessagePack-encoded so every read goes through the
//! record codec, as it would against a real store.

use super::{ReadTransaction, StoreError, SyncStore, WriteTransaction, SESSIONS_ROOT_TAG};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tabsync_types::{NodeId, SessionSpecifics};

/// In-memory sync store.
///
/// Cloning yields another handle to the same store.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug)]
struct MemoryStoreInner {
    cache_guid: String,
    nodes: BTreeMap<NodeId, Node>,
    next_id: NodeId,
    fail_next_create: Option<String>,
    fail_next_lookup: Option<String>,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    server_tag: Option<String>,
    client_tag: Option<String>,
    title: String,
    payload: Option<Vec<u8>>,
    modified: SystemTime,
    children: Vec<NodeId>,
}

impl Node {
    fn new(parent: Option<NodeId>) -> Self {
        Self {
            parent,
            server_tag: None,
            client_tag: None,
            title: String::new(),
            payload: None,
            modified: SystemTime::now(),
            children: Vec::new(),
        }
    }
}

/// Serializable image of a [`MemoryStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Cache GUID of the store.
    pub cache_guid: String,
    /// Every node, parents before children, siblings in order.
    pub nodes: Vec<NodeSnapshot>,
}

/// Serializable image of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node id.
    pub id: NodeId,
    /// Parent node, `None` for roots.
    #[serde(default)]
    pub parent: Option<NodeId>,
    /// Server tag, set on permanent nodes.
    #[serde(default)]
    pub server_tag: Option<String>,
    /// Client tag the node was created with.
    #[serde(default)]
    pub client_tag: Option<String>,
    /// Node title.
    #[serde(default)]
    pub title: String,
    /// Last modification time.
    pub modified: SystemTime,
    /// Decoded record, if one was written.
    #[serde(default)]
    pub specifics: Option<SessionSpecifics>,
}

impl MemoryStore {
    /// Create an empty store (no sessions root).
    pub fn new(cache_guid: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                cache_guid: cache_guid.into(),
                nodes: BTreeMap::new(),
                next_id: NodeId::new(1),
                fail_next_create: None,
                fail_next_lookup: None,
            })),
        }
    }

    /// Create a store with a fresh random cache GUID and a sessions root.
    pub fn with_root() -> Self {
        let store = Self::new(uuid::Uuid::new_v4().simple().to_string());
        store.create_root();
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the sessions root node, or return it if it exists.
    pub fn create_root(&self) -> NodeId {
        let mut inner = self.lock();
        if let Some(id) = inner.find_server_tag(SESSIONS_ROOT_TAG) {
            return id;
        }
        let id = inner.allocate_id();
        let mut node = Node::new(None);
        node.server_tag = Some(SESSIONS_ROOT_TAG.to_string());
        node.title = SESSIONS_ROOT_TAG.to_string();
        inner.nodes.insert(id, node);
        id
    }

    /// Add a node under the sessions root holding `specifics`.
    ///
    /// Simulates a record written by another client.
    pub fn insert_node(
        &self,
        client_tag: &str,
        specifics: &SessionSpecifics,
        modified: SystemTime,
    ) -> Result<NodeId, StoreError> {
        let payload = specifics.to_bytes()?;
        let mut inner = self.lock();
        let root = inner
            .find_server_tag(SESSIONS_ROOT_TAG)
            .ok_or_else(|| StoreError::LookupFailed("no sessions root".into()))?;
        let id = inner.create_child(root, client_tag)?;
        if let Some(node) = inner.nodes.get_mut(&id) {
            node.title = client_tag.to_string();
            node.payload = Some(payload);
            node.modified = modified;
        }
        Ok(id)
    }

    /// Overwrite the modification time of `id`.
    pub fn set_modification_time(&self, id: NodeId, modified: SystemTime) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let node = inner.nodes.get_mut(&id).ok_or(StoreError::NodeNotFound(id))?;
        node.modified = modified;
        Ok(())
    }

    /// Cause the next node creation to fail with the given error.
    pub fn fail_next_create(&self, error: &str) {
        self.lock().fail_next_create = Some(error.to_string());
    }

    /// Cause the next record read to fail with the given error.
    pub fn fail_next_lookup(&self, error: &str) {
        self.lock().fail_next_lookup = Some(error.to_string());
    }

    /// Number of nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Ids of nodes whose record carries `session_tag`.
    pub fn nodes_for_session(&self, session_tag: &str) -> Vec<NodeId> {
        let inner = self.lock();
        inner
            .nodes
            .iter()
            .filter(|(_, node)| {
                node.payload
                    .as_deref()
                    .and_then(|bytes| SessionSpecifics::from_bytes(bytes).ok())
                    .is_some_and(|s| s.session_tag == session_tag)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Decoded record stored in `id`.
    pub fn specifics_of(&self, id: NodeId) -> Result<SessionSpecifics, StoreError> {
        self.read_transaction(|trans| trans.specifics(id))
    }

    /// Serializable image of the whole store.
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.lock();
        let mut nodes = Vec::with_capacity(inner.nodes.len());
        let mut pending: Vec<NodeId> = inner
            .nodes
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| *id)
            .rev()
            .collect();
        while let Some(id) = pending.pop() {
            let Some(node) = inner.nodes.get(&id) else {
                continue;
            };
            nodes.push(NodeSnapshot {
                id,
                parent: node.parent,
                server_tag: node.server_tag.clone(),
                client_tag: node.client_tag.clone(),
                title: node.title.clone(),
                modified: node.modified,
                specifics: node
                    .payload
                    .as_deref()
                    .and_then(|bytes| SessionSpecifics::from_bytes(bytes).ok()),
            });
            pending.extend(node.children.iter().rev().copied());
        }
        StoreSnapshot {
            cache_guid: inner.cache_guid.clone(),
            nodes,
        }
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> Result<Self, StoreError> {
        let store = Self::new(snapshot.cache_guid.clone());
        {
            let mut inner = store.lock();
            for entry in &snapshot.nodes {
                let mut node = Node::new(entry.parent);
                node.server_tag = entry.server_tag.clone();
                node.client_tag = entry.client_tag.clone();
                node.title = entry.title.clone();
                node.modified = entry.modified;
                node.payload = entry
                    .specifics
                    .as_ref()
                    .map(SessionSpecifics::to_bytes)
                    .transpose()?;
                if let Some(parent) = entry.parent {
                    inner
                        .nodes
                        .get_mut(&parent)
                        .ok_or(StoreError::NodeNotFound(parent))?
                        .children
                        .push(entry.id);
                }
                inner.nodes.insert(entry.id, node);
                if entry.id >= inner.next_id {
                    inner.next_id = entry.id.next();
                }
            }
        }
        Ok(store)
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl MemoryStoreInner {
    fn allocate_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    fn find_server_tag(&self, server_tag: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.server_tag.as_deref() == Some(server_tag))
            .map(|(id, _)| *id)
    }

    fn find_client_tag(&self, client_tag: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.client_tag.as_deref() == Some(client_tag))
            .map(|(id, _)| *id)
    }

    fn node(&self, id: NodeId) -> Result<&Node, StoreError> {
        self.nodes.get(&id).ok_or(StoreError::NodeNotFound(id))
    }

    fn create_child(&mut self, parent: NodeId, client_tag: &str) -> Result<NodeId, StoreError> {
        if let Some(error) = self.fail_next_create.take() {
            return Err(StoreError::CreateFailed(error));
        }
        if !self.nodes.contains_key(&parent) {
            return Err(StoreError::NodeNotFound(parent));
        }
        if self.find_client_tag(client_tag).is_some() {
            return Err(StoreError::DuplicateTag(client_tag.to_string()));
        }
        let id = self.allocate_id();
        let mut node = Node::new(Some(parent));
        node.client_tag = Some(client_tag.to_string());
        self.nodes.insert(id, node);
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.push(id);
        }
        Ok(id)
    }
}

/// Transaction over a locked [`MemoryStoreInner`].
struct MemoryTransaction<'a> {
    inner: MutexGuard<'a, MemoryStoreInner>,
    fail_lookup: Cell<Option<String>>,
}

impl<'a> MemoryTransaction<'a> {
    fn open(mut inner: MutexGuard<'a, MemoryStoreInner>) -> Self {
        let fail_lookup = Cell::new(inner.fail_next_lookup.take());
        Self { inner, fail_lookup }
    }
}

impl ReadTransaction for MemoryTransaction<'_> {
    fn root_by_tag(&self, server_tag: &str) -> Option<NodeId> {
        self.inner.find_server_tag(server_tag)
    }

    fn lookup_by_client_tag(&self, client_tag: &str) -> Option<NodeId> {
        self.inner.find_client_tag(client_tag)
    }

    fn first_child(&self, parent: NodeId) -> Result<Option<NodeId>, StoreError> {
        Ok(self.inner.node(parent)?.children.first().copied())
    }

    fn successor(&self, id: NodeId) -> Result<Option<NodeId>, StoreError> {
        let Some(parent) = self.inner.node(id)?.parent else {
            return Ok(None);
        };
        let siblings = &self.inner.node(parent)?.children;
        Ok(siblings
            .iter()
            .position(|sibling| *sibling == id)
            .and_then(|pos| siblings.get(pos + 1))
            .copied())
    }

    fn specifics(&self, id: NodeId) -> Result<SessionSpecifics, StoreError> {
        if let Some(error) = self.fail_lookup.take() {
            return Err(StoreError::LookupFailed(error));
        }
        match &self.inner.node(id)?.payload {
            Some(bytes) => Ok(SessionSpecifics::from_bytes(bytes)?),
            None => Ok(SessionSpecifics::empty("")),
        }
    }

    fn modification_time(&self, id: NodeId) -> Result<SystemTime, StoreError> {
        Ok(self.inner.node(id)?.modified)
    }

    fn title(&self, id: NodeId) -> Result<String, StoreError> {
        Ok(self.inner.node(id)?.title.clone())
    }
}

impl WriteTransaction for MemoryTransaction<'_> {
    fn create_unique(&mut self, parent: NodeId, client_tag: &str) -> Result<NodeId, StoreError> {
        self.inner.create_child(parent, client_tag)
    }

    fn set_title(&mut self, id: NodeId, title: &str) -> Result<(), StoreError> {
        let node = self
            .inner
            .nodes
            .get_mut(&id)
            .ok_or(StoreError::NodeNotFound(id))?;
        node.title = title.to_string();
        Ok(())
    }

    fn set_specifics(
        &mut self,
        id: NodeId,
        specifics: &SessionSpecifics,
    ) -> Result<(), StoreError> {
        let payload = specifics.to_bytes()?;
        let node = self
            .inner
            .nodes
            .get_mut(&id)
            .ok_or(StoreError::NodeNotFound(id))?;
        node.payload = Some(payload);
        node.modified = SystemTime::now();
        Ok(())
    }

    fn remove(&mut self, id: NodeId) -> Result<(), StoreError> {
        let node = self
            .inner
            .nodes
            .remove(&id)
            .ok_or(StoreError::NodeNotFound(id))?;
        if let Some(parent) = node.parent.and_then(|p| self.inner.nodes.get_mut(&p)) {
            parent.children.retain(|child| *child != id);
        }
        Ok(())
    }
}

impl SyncStore for MemoryStore {
    fn cache_guid(&self) -> String {
        self.lock().cache_guid.clone()
    }

    fn read_transaction<R>(&self, f: impl FnOnce(&dyn ReadTransaction) -> R) -> R {
        let trans = MemoryTransaction::open(self.lock());
        f(&trans)
    }

    fn write_transaction<R>(&self, f: impl FnOnce(&mut dyn WriteTransaction) -> R) -> R {
        let mut trans = MemoryTransaction::open(self.lock());
        f(&mut trans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::children;
    use std::time::Duration;
    use tabsync_types::{SessionHeader, TabId, TabSpecifics, WindowId};

    fn header(tag: &str) -> SessionSpecifics {
        SessionSpecifics::header(tag, SessionHeader::default())
    }

    // ===========================================
    // Tree structure
    // ===========================================

    #[test]
    fn empty_store_has_no_root() {
        let store = MemoryStore::new("guid");
        assert!(store
            .read_transaction(|trans| trans.root_by_tag(SESSIONS_ROOT_TAG))
            .is_none());
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn create_root_is_idempotent() {
        let store = MemoryStore::new("guid");
        let a = store.create_root();
        let b = store.create_root();
        assert_eq!(a, b);
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn children_keep_creation_order() {
        let store = MemoryStore::with_root();
        let root = store.create_root();
        let ids: Vec<NodeId> = ["a", "b", "c"]
            .iter()
            .map(|tag| {
                store
                    .write_transaction(|trans| trans.create_unique(root, tag))
                    .unwrap()
            })
            .collect();

        let listed = store.read_transaction(|trans| children(trans, root)).unwrap();
        assert_eq!(listed, ids);
    }

    #[test]
    fn duplicate_client_tag_rejected() {
        let store = MemoryStore::with_root();
        let root = store.create_root();
        store
            .write_transaction(|trans| trans.create_unique(root, "tag"))
            .unwrap();
        let err = store
            .write_transaction(|trans| trans.create_unique(root, "tag"))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTag(_)));
    }

    #[test]
    fn remove_unlinks_from_parent() {
        let store = MemoryStore::with_root();
        let root = store.create_root();
        let a = store.insert_node("a", &header("a"), SystemTime::now()).unwrap();
        let b = store.insert_node("b", &header("b"), SystemTime::now()).unwrap();

        store.write_transaction(|trans| trans.remove(a)).unwrap();

        let listed = store.read_transaction(|trans| children(trans, root)).unwrap();
        assert_eq!(listed, vec![b]);
        assert!(matches!(
            store.specifics_of(a),
            Err(StoreError::NodeNotFound(_))
        ));
    }

    // ===========================================
    // Records
    // ===========================================

    #[test]
    fn unwritten_node_reads_empty_record() {
        let store = MemoryStore::with_root();
        let root = store.create_root();
        let id = store
            .write_transaction(|trans| trans.create_unique(root, "fresh"))
            .unwrap();
        let specifics = store.specifics_of(id).unwrap();
        assert!(specifics.body.is_none());
        assert_eq!(specifics.session_tag, "");
    }

    #[test]
    fn set_specifics_updates_modification_time() {
        let store = MemoryStore::with_root();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let id = store.insert_node("a", &header("a"), old).unwrap();

        let tab = SessionSpecifics::tab("a", TabSpecifics::new(TabId::new(1), WindowId::new(1)));
        store
            .write_transaction(|trans| trans.set_specifics(id, &tab))
            .unwrap();

        let mtime = store
            .read_transaction(|trans| trans.modification_time(id))
            .unwrap();
        assert!(mtime > old);
        assert_eq!(store.specifics_of(id).unwrap(), tab);
    }

    #[test]
    fn nodes_for_session_filters_by_tag() {
        let store = MemoryStore::with_root();
        let a = store.insert_node("a", &header("one"), SystemTime::now()).unwrap();
        store.insert_node("b", &header("two"), SystemTime::now()).unwrap();
        assert_eq!(store.nodes_for_session("one"), vec![a]);
    }

    // ===========================================
    // Failure injection
    // ===========================================

    #[test]
    fn fail_next_create_fires_once() {
        let store = MemoryStore::with_root();
        let root = store.create_root();
        store.fail_next_create("disk full");

        let err = store
            .write_transaction(|trans| trans.create_unique(root, "a"))
            .unwrap_err();
        assert!(matches!(err, StoreError::CreateFailed(ref m) if m == "disk full"));
        assert!(store
            .write_transaction(|trans| trans.create_unique(root, "a"))
            .is_ok());
    }

    #[test]
    fn fail_next_lookup_fires_once() {
        let store = MemoryStore::with_root();
        let id = store.insert_node("a", &header("a"), SystemTime::now()).unwrap();
        store.fail_next_lookup("timeout");

        assert!(matches!(
            store.specifics_of(id),
            Err(StoreError::LookupFailed(_))
        ));
        assert!(store.specifics_of(id).is_ok());
    }

    // ===========================================
    // Snapshots
    // ===========================================

    #[test]
    fn snapshot_restores_tree_and_records() {
        let store = MemoryStore::with_root();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        store.insert_node("a", &header("one"), mtime).unwrap();
        store.insert_node("b", &header("two"), mtime).unwrap();

        let json = serde_json::to_string(&store.snapshot()).unwrap();
        let restored =
            MemoryStore::from_snapshot(&serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.cache_guid(), store.cache_guid());
        assert_eq!(restored.node_count(), 3);
        let root = restored.create_root();
        let ids = restored
            .read_transaction(|trans| children(trans, root))
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(restored.specifics_of(ids[1]).unwrap(), header("two"));

        let fresh = restored
            .write_transaction(|trans| trans.create_unique(root, "c"))
            .unwrap();
        assert!(!ids.contains(&fresh));
    }
}
