//! Mock browser for testing.
//!
//! Windows and tabs are plain values assembled with builder methods. Tests
//! mutate them between association passes to simulate user activity.

use super::{LocalBrowser, NavigationEntry, SyncedTab, SyncedWindow};
use std::collections::HashSet;
use tabsync_types::{TabId, WindowId};

/// Profile name used when a tab does not set one.
pub const DEFAULT_PROFILE: &str = "Default";

/// Mock browser holding a list of windows.
#[derive(Debug, Clone, Default)]
pub struct MockBrowser {
    windows: Vec<MockWindow>,
}

impl MockBrowser {
    /// Create a browser with no windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a window.
    pub fn with_window(mut self, window: MockWindow) -> Self {
        self.windows.push(window);
        self
    }

    /// Add a window in place.
    pub fn add_window(&mut self, window: MockWindow) {
        self.windows.push(window);
    }

    /// Remove a window.
    pub fn close_window(&mut self, id: WindowId) {
        self.windows.retain(|w| w.id != id);
    }

    /// Mutable access to a window.
    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut MockWindow> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    /// A tab from any window.
    pub fn tab(&self, id: TabId) -> Option<&MockTab> {
        self.windows
            .iter()
            .flat_map(|w| w.tabs.iter())
            .find(|t| t.id == id)
    }

    /// Mutable access to a tab in any window.
    pub fn tab_mut(&mut self, id: TabId) -> Option<&mut MockTab> {
        self.windows
            .iter_mut()
            .flat_map(|w| w.tabs.iter_mut())
            .find(|t| t.id == id)
    }
}

impl LocalBrowser for MockBrowser {
    fn windows(&self) -> Vec<&dyn SyncedWindow> {
        self.windows
            .iter()
            .map(|w| w as &dyn SyncedWindow)
            .collect()
    }

    fn find_window(&self, id: WindowId) -> Option<&dyn SyncedWindow> {
        self.windows
            .iter()
            .find(|w| w.id == id)
            .map(|w| w as &dyn SyncedWindow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowKind {
    Tabbed,
    Popup,
    App,
}

/// Mock browser window.
#[derive(Debug, Clone)]
pub struct MockWindow {
    id: WindowId,
    kind: WindowKind,
    has_window: bool,
    active: i32,
    tabs: Vec<MockTab>,
    pinned: HashSet<TabId>,
}

impl MockWindow {
    fn with_kind(id: WindowId, kind: WindowKind) -> Self {
        Self {
            id,
            kind,
            has_window: true,
            active: 0,
            tabs: Vec::new(),
            pinned: HashSet::new(),
        }
    }

    /// A normal tabbed window.
    pub fn tabbed(id: WindowId) -> Self {
        Self::with_kind(id, WindowKind::Tabbed)
    }

    /// A popup window.
    pub fn popup(id: WindowId) -> Self {
        Self::with_kind(id, WindowKind::Popup)
    }

    /// An app window.
    pub fn app(id: WindowId) -> Self {
        Self::with_kind(id, WindowKind::App)
    }

    /// Append a tab, moving it into this window.
    pub fn with_tab(mut self, tab: MockTab) -> Self {
        self.push_tab(tab);
        self
    }

    /// Append a tab in place.
    pub fn push_tab(&mut self, mut tab: MockTab) {
        tab.window_id = self.id;
        self.tabs.push(tab);
    }

    /// Remove a tab.
    pub fn remove_tab(&mut self, id: TabId) -> Option<MockTab> {
        let pos = self.tabs.iter().position(|t| t.id == id)?;
        Some(self.tabs.remove(pos))
    }

    /// Mark a tab pinned.
    pub fn pin(mut self, id: TabId) -> Self {
        self.pinned.insert(id);
        self
    }

    /// Select the tab at `index`.
    pub fn select(mut self, index: i32) -> Self {
        self.active = index;
        self
    }

    /// Mutable access to a tab in this window.
    pub fn tab_mut(&mut self, id: TabId) -> Option<&mut MockTab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    /// Simulate a window whose native handle is gone.
    pub fn without_handle(mut self) -> Self {
        self.has_window = false;
        self
    }
}

impl SyncedWindow for MockWindow {
    fn session_id(&self) -> WindowId {
        self.id
    }

    fn is_app(&self) -> bool {
        self.kind == WindowKind::App
    }

    fn is_type_tabbed(&self) -> bool {
        self.kind == WindowKind::Tabbed
    }

    fn is_type_popup(&self) -> bool {
        self.kind == WindowKind::Popup
    }

    fn has_window(&self) -> bool {
        self.has_window
    }

    fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    fn active_index(&self) -> i32 {
        self.active
    }

    fn tab_id_at(&self, index: usize) -> Option<TabId> {
        self.tabs.get(index).map(|t| t.id)
    }

    fn tab_at(&self, index: usize) -> Option<&dyn SyncedTab> {
        self.tabs.get(index).map(|t| t as &dyn SyncedTab)
    }

    fn is_tab_pinned(&self, tab_id: TabId) -> bool {
        self.pinned.contains(&tab_id)
    }
}

/// Mock browser tab.
#[derive(Debug, Clone)]
pub struct MockTab {
    id: TabId,
    window_id: WindowId,
    profile: String,
    destroyed: bool,
    extension_app_id: Option<String>,
    entries: Vec<NavigationEntry>,
    current: i32,
    pending: Option<(i32, NavigationEntry)>,
}

impl MockTab {
    /// A tab with no history, not yet in a window.
    pub fn new(id: TabId) -> Self {
        Self {
            id,
            window_id: WindowId::new(-1),
            profile: DEFAULT_PROFILE.to_string(),
            destroyed: false,
            extension_app_id: None,
            entries: Vec::new(),
            current: -1,
            pending: None,
        }
    }

    /// Commit a navigation to `url` and make it current.
    pub fn navigate(mut self, url: impl Into<String>) -> Self {
        self.push_entry(NavigationEntry::new(url));
        self
    }

    /// Commit `entry` in place, dropping forward history.
    pub fn push_entry(&mut self, entry: NavigationEntry) {
        let keep = usize::try_from(self.current + 1).unwrap_or(0);
        self.entries.truncate(keep);
        self.entries.push(entry);
        self.current = self.entries.len() as i32 - 1;
        self.pending = None;
    }

    /// Move the current entry to `index`.
    pub fn go_to(&mut self, index: i32) {
        self.current = index;
    }

    /// Set a pending entry at `index`.
    pub fn with_pending(mut self, index: i32, entry: NavigationEntry) -> Self {
        self.pending = Some((index, entry));
        self
    }

    /// Set the owning profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Set the owning extension app.
    pub fn with_extension_app(mut self, app_id: impl Into<String>) -> Self {
        self.extension_app_id = Some(app_id.into());
        self
    }

    /// Mark the tab as closing.
    pub fn close(&mut self) {
        self.destroyed = true;
    }
}

impl SyncedTab for MockTab {
    fn session_id(&self) -> TabId {
        self.id
    }

    fn window_id(&self) -> WindowId {
        self.window_id
    }

    fn profile(&self) -> &str {
        &self.profile
    }

    fn is_being_destroyed(&self) -> bool {
        self.destroyed
    }

    fn extension_app_id(&self) -> Option<&str> {
        self.extension_app_id.as_deref()
    }

    fn current_entry_index(&self) -> i32 {
        self.current
    }

    fn pending_entry_index(&self) -> i32 {
        self.pending.as_ref().map_or(-1, |(index, _)| *index)
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn entry_at(&self, index: usize) -> Option<&NavigationEntry> {
        self.entries.get(index)
    }

    fn pending_entry(&self) -> Option<&NavigationEntry> {
        self.pending.as_ref().map(|(_, entry)| entry)
    }
}
