//! # tabsync-client
//!
//! Session associator for tabsync: keeps a device's open tabs and the
//! sessions of other devices consistent with a remote sync store.
//!
//! ## Features
//!
//! - **Association**: builds the session tree from the store and writes the
//!   local browser's windows and tabs back
//! - **Tab Node Pool**: tab records are recycled, never deleted
//! - **Foreign Sessions**: incremental updates, deletion and stale sweeps
//! - **Favicons**: async loads for local tabs, a refcounted cache for
//!   foreign ones
//!
//! ## Example
//!
//! ```ignore
//! use tabsync_client::{Config, MemoryStore, MockFaviconFetcher, SessionAssociator};
//!
//! let store = MemoryStore::with_root();
//! let fetcher = Arc::new(MockFaviconFetcher::new());
//! let mut associator = SessionAssociator::new(store, fetcher, Config::default());
//!
//! associator.associate_models(&browser)?;
//! associator.associate_tabs(&browser, &[changed_tab])?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod associator;
pub mod browser;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod events;
pub mod favicon;
pub mod store;
pub mod tab_pool;

pub use associator::{
    RemoteChange, SessionAssociator, DEFAULT_STALE_SESSION_THRESHOLD_DAYS, MACHINE_TAG_PREFIX,
    TEST_SESSION_NAME,
};
pub use browser::{LocalBrowser, MockBrowser, MockTab, MockWindow, NavigationEntry, SyncedTab, SyncedWindow};
pub use cleanup::StaleSessionSweeper;
pub use config::{CleanupConfig, Config, ConfigError, FaviconConfig, SessionConfig};
pub use error::AssociationError;
pub use events::{EventBus, SessionEvent};
pub use favicon::{FaviconError, FaviconFetcher, FaviconImage, FaviconLoad, MockFaviconFetcher};
pub use store::{
    MemoryStore, ReadTransaction, StoreError, StoreSnapshot, SyncStore, WriteTransaction,
    SESSIONS_ROOT_TAG,
};
pub use tab_pool::{PoolError, TabNodePool};
