//! Identity types for tabsync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one node in the sync store.
///
/// Assigned by the store when a node is created. Ids are never reused
/// by a store for a different node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(i64);

impl NodeId {
    /// Create a NodeId from its raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value of this NodeId.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The id following this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Identifier of a tab, scoped to the session that owns it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TabId(i32);

impl TabId {
    /// Create a TabId from its raw value.
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Get the raw value of this TabId.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TabId({})", self.0)
    }
}

/// Identifier of a window, scoped to the session that owns it.
///
/// Window ids are not globally unique: two devices may both have a window 1.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(i32);

impl WindowId {
    /// Create a WindowId from its raw value.
    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Get the raw value of this WindowId.
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WindowId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_ordering() {
        let a = NodeId::new(100);
        let b = NodeId::new(200);
        assert!(a < b);
        assert_eq!(a.next().value(), 101);
    }

    #[test]
    fn node_id_saturates() {
        let id = NodeId::new(i64::MAX);
        assert_eq!(id.next().value(), i64::MAX);
    }

    #[test]
    fn debug_formats_are_labelled() {
        assert_eq!(format!("{:?}", NodeId::new(7)), "NodeId(7)");
        assert_eq!(format!("{:?}", TabId::new(3)), "TabId(3)");
        assert_eq!(format!("{:?}", WindowId::new(1)), "WindowId(1)");
    }

    #[test]
    fn display_is_raw_value() {
        assert_eq!(TabId::new(42).to_string(), "42");
        assert_eq!(WindowId::new(-1).to_string(), "-1");
    }
}
