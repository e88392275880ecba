//! Local browser collaborator.
//!
//! The engine reads open windows and tabs through these traits and never
//! mutates them. [`MockBrowser`] is the in-crate implementation used by
//! tests and the CLI.

mod mock;

pub use mock::{MockBrowser, MockTab, MockWindow};

use tabsync_core::{is_syncable_url, PageTransition, TabNavigation};
use tabsync_types::{TabId, WindowId};

/// One committed or pending navigation of a local tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    /// Displayed destination URL.
    pub virtual_url: String,
    /// Referrer URL.
    pub referrer: String,
    /// Page title.
    pub title: String,
    /// How the navigation started.
    pub transition: PageTransition,
    /// Opaque page state.
    pub state: Vec<u8>,
}

impl NavigationEntry {
    /// Create an entry for `virtual_url`.
    pub fn new(virtual_url: impl Into<String>) -> Self {
        Self {
            virtual_url: virtual_url.into(),
            referrer: String::new(),
            title: String::new(),
            transition: PageTransition::Link,
            state: Vec::new(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the transition type.
    pub fn with_transition(mut self, transition: PageTransition) -> Self {
        self.transition = transition;
        self
    }

    /// Tree navigation for this entry at history position `index`.
    pub fn to_tab_navigation(&self, index: i32) -> TabNavigation {
        TabNavigation::new(index, self.virtual_url.clone())
            .with_referrer(self.referrer.clone(), Default::default())
            .with_title(self.title.clone())
            .with_state(self.state.clone())
            .with_transition(self.transition)
    }
}

/// A tab open in the local browser.
pub trait SyncedTab {
    /// Session-scoped tab id.
    fn session_id(&self) -> TabId;
    /// Window holding the tab.
    fn window_id(&self) -> WindowId;
    /// Profile the tab belongs to.
    fn profile(&self) -> &str;
    /// Whether the tab is closing.
    fn is_being_destroyed(&self) -> bool;
    /// Extension app owning the tab, if any.
    fn extension_app_id(&self) -> Option<&str>;
    /// Index of the committed current entry (-1 if none).
    fn current_entry_index(&self) -> i32;
    /// Index of the pending entry (-1 if none).
    fn pending_entry_index(&self) -> i32;
    /// Number of committed entries.
    fn entry_count(&self) -> usize;
    /// Committed entry at `index`.
    fn entry_at(&self, index: usize) -> Option<&NavigationEntry>;
    /// The pending entry, if a navigation is in flight.
    fn pending_entry(&self) -> Option<&NavigationEntry>;
}

/// A window open in the local browser.
pub trait SyncedWindow {
    /// Session-scoped window id.
    fn session_id(&self) -> WindowId;
    /// Whether this is an app window.
    fn is_app(&self) -> bool;
    /// Whether this is a normal tabbed window.
    fn is_type_tabbed(&self) -> bool;
    /// Whether this is a popup.
    fn is_type_popup(&self) -> bool;
    /// Whether the native window still exists.
    fn has_window(&self) -> bool;
    /// Number of tabs.
    fn tab_count(&self) -> usize;
    /// Index of the selected tab.
    fn active_index(&self) -> i32;
    /// Id of the tab at `index`.
    fn tab_id_at(&self, index: usize) -> Option<TabId>;
    /// Tab at `index`, if loaded.
    fn tab_at(&self, index: usize) -> Option<&dyn SyncedTab>;
    /// Whether `tab_id` is pinned in this window.
    fn is_tab_pinned(&self, tab_id: TabId) -> bool;
}

/// The local browser: every open window.
pub trait LocalBrowser {
    /// All open windows.
    fn windows(&self) -> Vec<&dyn SyncedWindow>;
    /// Window with `id`, if open.
    fn find_window(&self, id: WindowId) -> Option<&dyn SyncedWindow>;
}

/// Whether `window` is a kind of window that is synced at all.
pub fn should_sync_window(window: &dyn SyncedWindow) -> bool {
    if window.is_app() {
        return false;
    }
    window.is_type_tabbed() || window.is_type_popup()
}

/// Find an open tab by id in any window.
pub fn find_tab(browser: &dyn LocalBrowser, tab_id: TabId) -> Option<&dyn SyncedTab> {
    browser.windows().into_iter().find_map(|window| {
        (0..window.tab_count())
            .find(|&index| window.tab_id_at(index) == Some(tab_id))
            .and_then(|index| window.tab_at(index))
    })
}

/// Position of `tab_id` within `window`.
pub fn tab_position(window: &dyn SyncedWindow, tab_id: TabId) -> Option<usize> {
    (0..window.tab_count()).find(|&index| window.tab_id_at(index) == Some(tab_id))
}

/// Entry at `index`, with the pending entry standing in at its own index.
pub fn entry_for_index(tab: &dyn SyncedTab, index: usize) -> Option<&NavigationEntry> {
    let pending = usize::try_from(tab.pending_entry_index()).ok();
    if pending == Some(index) {
        tab.pending_entry()
    } else {
        tab.entry_at(index)
    }
}

/// Whether `tab` has at least one entry worth syncing.
///
/// A tab with no committed entries is never valid, even with a pending
/// entry. A missing entry makes the whole tab invalid.
pub fn tab_has_valid_entry(tab: &dyn SyncedTab) -> bool {
    let mut found_valid_url = false;
    for index in 0..tab.entry_count() {
        let Some(entry) = entry_for_index(tab, index) else {
            return false;
        };
        if is_syncable_url(&entry.virtual_url) {
            found_valid_url = true;
        }
    }
    found_valid_url
}
