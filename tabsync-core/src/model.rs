//! In-memory session tree.
//!
//! A [`SyncedSession`] owns its windows and its tabs. Windows reference tabs
//! by id only, so a tab can exist before any window lists it (tab records may
//! arrive ahead of the header that places them).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;
use tabsync_types::{DeviceType, TabId, WindowId};

/// One device's session: its windows and tabs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedSession {
    /// Unique tag identifying the device.
    pub session_tag: String,
    /// Human-readable device name.
    pub session_name: String,
    /// Kind of device.
    pub device_type: DeviceType,
    /// Last time anything in this session changed.
    pub modified_time: SystemTime,
    /// Windows keyed by id.
    pub windows: BTreeMap<WindowId, SessionWindow>,
    /// Tabs keyed by id, placed or not.
    pub tabs: BTreeMap<TabId, SessionTab>,
}

impl SyncedSession {
    /// Create an empty session for `session_tag`.
    pub fn new(session_tag: impl Into<String>) -> Self {
        Self {
            session_tag: session_tag.into(),
            session_name: String::new(),
            device_type: DeviceType::Other,
            modified_time: SystemTime::UNIX_EPOCH,
            windows: BTreeMap::new(),
            tabs: BTreeMap::new(),
        }
    }

    /// Advance `modified_time` to `time` if it is newer.
    pub fn touch(&mut self, time: SystemTime) {
        if self.modified_time < time {
            self.modified_time = time;
        }
    }

    /// Tabs of `window_id` in display order, skipping ids with no tab record.
    pub fn window_tabs(&self, window_id: WindowId) -> Vec<&SessionTab> {
        self.windows
            .get(&window_id)
            .map(|window| {
                window
                    .tabs
                    .iter()
                    .filter_map(|id| self.tabs.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Window kinds in the session tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowType {
    /// Normal tabbed window.
    #[default]
    Tabbed,
    /// Popup window.
    Popup,
}

/// A window inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWindow {
    /// Window id, scoped to the owning session.
    pub window_id: WindowId,
    /// Index of the selected tab.
    pub selected_tab_index: i32,
    /// Window kind.
    pub window_type: WindowType,
    /// Last time the window was written.
    pub timestamp: SystemTime,
    /// Tab ids in display order.
    pub tabs: Vec<TabId>,
}

impl SessionWindow {
    /// Create an empty window.
    pub fn new(window_id: WindowId) -> Self {
        Self {
            window_id,
            selected_tab_index: -1,
            window_type: WindowType::Tabbed,
            timestamp: SystemTime::UNIX_EPOCH,
            tabs: Vec::new(),
        }
    }
}

/// A tab inside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTab {
    /// Tab id, scoped to the owning session.
    pub tab_id: TabId,
    /// Window the tab belongs to.
    pub window_id: WindowId,
    /// Position within the window.
    pub tab_visual_index: i32,
    /// Index into `navigations` of the selected entry.
    pub current_navigation_index: i32,
    /// Whether the tab is pinned.
    pub pinned: bool,
    /// Extension app owning the tab.
    pub extension_app_id: Option<String>,
    /// Last time the tab was written.
    pub timestamp: SystemTime,
    /// Bounded navigation history, replaced wholesale on each update.
    pub navigations: Vec<TabNavigation>,
    /// Synced favicon this tab holds one use of.
    #[serde(default)]
    pub favicon_source: Option<String>,
}

impl SessionTab {
    /// Create an empty tab with no window.
    pub fn new(tab_id: TabId) -> Self {
        Self {
            tab_id,
            window_id: WindowId::new(-1),
            tab_visual_index: -1,
            current_navigation_index: -1,
            pinned: false,
            extension_app_id: None,
            timestamp: SystemTime::UNIX_EPOCH,
            navigations: Vec::new(),
            favicon_source: None,
        }
    }

    /// The selected navigation, with the index clamped into range.
    pub fn current_navigation(&self) -> Option<&TabNavigation> {
        let last = self.navigations.len().checked_sub(1)?;
        let index = usize::try_from(self.current_navigation_index.max(0)).unwrap_or(0);
        self.navigations.get(index.min(last))
    }
}

/// Page transition types, including the redirect qualifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageTransition {
    /// User followed a link.
    #[default]
    Link,
    /// User typed the URL.
    Typed,
    /// User picked a bookmark or suggestion.
    AutoBookmark,
    /// Subframe navigation the user did not initiate.
    AutoSubframe,
    /// Subframe navigation the user initiated.
    ManualSubframe,
    /// Generated from the omnibox.
    Generated,
    /// Start page.
    StartPage,
    /// Form submission.
    FormSubmit,
    /// Reload.
    Reload,
    /// Keyword search.
    Keyword,
    /// Visit generated by a keyword search.
    KeywordGenerated,
    /// Start of a redirect chain.
    ChainStart,
    /// End of a redirect chain.
    ChainEnd,
    /// Redirect issued by the page.
    ClientRedirect,
    /// Redirect issued by the server.
    ServerRedirect,
}

/// Referrer policy attached to a navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferrerPolicy {
    /// Browser default.
    #[default]
    Default,
    /// Always send the full referrer.
    Always,
    /// Never send a referrer.
    Never,
    /// Send only the origin.
    Origin,
}

/// One entry in a tab's navigation history.
///
/// Immutable once built: a tab's navigations are replaced, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabNavigation {
    index: i32,
    virtual_url: String,
    referrer: String,
    referrer_policy: ReferrerPolicy,
    title: String,
    state: Vec<u8>,
    transition: PageTransition,
}

impl TabNavigation {
    /// Create a navigation to `virtual_url` at history position `index`.
    pub fn new(index: i32, virtual_url: impl Into<String>) -> Self {
        Self {
            index,
            virtual_url: virtual_url.into(),
            referrer: String::new(),
            referrer_policy: ReferrerPolicy::Default,
            title: String::new(),
            state: Vec::new(),
            transition: PageTransition::Link,
        }
    }

    /// Set the referrer.
    pub fn with_referrer(mut self, referrer: impl Into<String>, policy: ReferrerPolicy) -> Self {
        self.referrer = referrer.into();
        self.referrer_policy = policy;
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the opaque page state.
    pub fn with_state(mut self, state: Vec<u8>) -> Self {
        self.state = state;
        self
    }

    /// Set the transition type.
    pub fn with_transition(mut self, transition: PageTransition) -> Self {
        self.transition = transition;
        self
    }

    /// History position.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Displayed destination URL.
    pub fn virtual_url(&self) -> &str {
        &self.virtual_url
    }

    /// Referrer URL.
    pub fn referrer(&self) -> &str {
        &self.referrer
    }

    /// Referrer policy.
    pub fn referrer_policy(&self) -> ReferrerPolicy {
        self.referrer_policy
    }

    /// Page title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Opaque page state.
    pub fn state(&self) -> &[u8] {
        &self.state
    }

    /// Transition type.
    pub fn transition(&self) -> PageTransition {
        self.transition
    }
}
