//! # tabsync-core
//!
//! Pure session tree logic for tabsync (no I/O, instant tests).
//!
//! This crate holds the in-memory model of every known session and the
//! bookkeeping that keeps it consistent, without touching the sync store,
//! the browser or the network.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about what a reconciliation pass changes
//!
//! The store and browser I/O is performed by `tabsync-client`, which drives
//! the tracker and favicon cache defined here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod convert;
pub mod favicon;
pub mod model;
pub mod navigation;
pub mod state;
pub mod tracker;

pub use convert::{
    apply_header_info, apply_tab_specifics, navigation_from_specifics, navigation_to_specifics,
    populate_session_header, populate_session_window,
};
pub use favicon::{FaviconCache, FaviconInfo};
pub use model::{
    PageTransition, ReferrerPolicy, SessionTab, SessionWindow, SyncedSession, TabNavigation,
    WindowType,
};
pub use navigation::{
    canonical_url, is_syncable_url, is_valid_url, navigation_window, MAX_SYNC_NAVIGATION_COUNT,
};
pub use state::{AssociationEvent, AssociationState, InvalidTransition};
pub use tracker::SyncedSessionTracker;
