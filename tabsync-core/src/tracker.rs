//! Registry of every known session.
//!
//! The tracker owns all [`SyncedSession`] values, local and foreign, keyed by
//! session tag. Reconciliation uses a two-phase mark and sweep:
//!
//! 1. [`reset_tracking`](SyncedSessionTracker::reset_tracking) starts a pass
//!    for one session.
//! 2. [`put_window_in_session`](SyncedSessionTracker::put_window_in_session)
//!    and [`put_tab_in_window`](SyncedSessionTracker::put_tab_in_window) mark
//!    what is still open.
//! 3. [`cleanup`](SyncedSessionTracker::cleanup) drops every window and tab
//!    of that session that was not marked.

use std::collections::{BTreeMap, HashMap, HashSet};
use tabsync_types::{TabId, WindowId};

use crate::model::{SessionTab, SessionWindow, SyncedSession};

/// Entities marked as seen during the current pass.
#[derive(Debug, Default)]
struct Marks {
    windows: HashSet<WindowId>,
    tabs: HashSet<TabId>,
}

/// Owning registry of sessions keyed by tag.
#[derive(Debug, Default)]
pub struct SyncedSessionTracker {
    local_session_tag: String,
    sessions: BTreeMap<String, SyncedSession>,
    marks: HashMap<String, Marks>,
}

impl SyncedSessionTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tag of the local device's session.
    pub fn set_local_session_tag(&mut self, tag: impl Into<String>) {
        self.local_session_tag = tag.into();
    }

    /// Tag of the local device's session (empty until set).
    pub fn local_session_tag(&self) -> &str {
        &self.local_session_tag
    }

    /// Get the session for `tag`, creating an empty one if needed.
    pub fn get_or_create_session(&mut self, tag: &str) -> &mut SyncedSession {
        self.sessions
            .entry(tag.to_string())
            .or_insert_with(|| SyncedSession::new(tag))
    }

    /// Get tab `tab_id` of session `tag`, creating session and tab if needed.
    ///
    /// A new tab is not placed in any window.
    pub fn get_or_create_tab(&mut self, tag: &str, tab_id: TabId) -> &mut SessionTab {
        self.get_or_create_session(tag)
            .tabs
            .entry(tab_id)
            .or_insert_with(|| SessionTab::new(tab_id))
    }

    /// Start a reconciliation pass for `tag`.
    ///
    /// Every window and tab of the session is considered unseen until it is
    /// put again.
    pub fn reset_tracking(&mut self, tag: &str) {
        self.get_or_create_session(tag);
        self.marks.insert(tag.to_string(), Marks::default());
    }

    /// Mark `window_id` as open in session `tag`, creating it if needed.
    ///
    /// The window's tab list is emptied; the pass re-adds its tabs.
    pub fn put_window_in_session(&mut self, tag: &str, window_id: WindowId) {
        let window = self
            .get_or_create_session(tag)
            .windows
            .entry(window_id)
            .or_insert_with(|| SessionWindow::new(window_id));
        window.tabs.clear();
        self.marks
            .entry(tag.to_string())
            .or_default()
            .windows
            .insert(window_id);
    }

    /// Place `tab_id` at `position` in `window_id` of session `tag`.
    ///
    /// Creates the tab if it is not known yet and removes it from any other
    /// window of the session, so a tab is listed by at most one window.
    pub fn put_tab_in_window(
        &mut self,
        tag: &str,
        window_id: WindowId,
        tab_id: TabId,
        position: usize,
    ) {
        let session = self.get_or_create_session(tag);
        session
            .tabs
            .entry(tab_id)
            .or_insert_with(|| SessionTab::new(tab_id))
            .window_id = window_id;

        for window in session.windows.values_mut() {
            window.tabs.retain(|id| *id != tab_id);
        }
        let window = session
            .windows
            .entry(window_id)
            .or_insert_with(|| SessionWindow::new(window_id));
        let position = position.min(window.tabs.len());
        window.tabs.insert(position, tab_id);

        self.marks
            .entry(tag.to_string())
            .or_default()
            .tabs
            .insert(tab_id);
    }

    /// Drop every window and tab of `tag` not marked since the last reset.
    ///
    /// Ends the pass; a second call without a new reset does nothing.
    pub fn cleanup(&mut self, tag: &str) {
        let Some(marks) = self.marks.remove(tag) else {
            tracing::debug!("No tracking pass open for session {}, skipping cleanup", tag);
            return;
        };
        let Some(session) = self.sessions.get_mut(tag) else {
            return;
        };

        let before_windows = session.windows.len();
        let before_tabs = session.tabs.len();
        session.windows.retain(|id, _| marks.windows.contains(id));
        session.tabs.retain(|id, _| marks.tabs.contains(id));
        for window in session.windows.values_mut() {
            window.tabs.retain(|id| marks.tabs.contains(id));
        }

        let dropped_windows = before_windows - session.windows.len();
        let dropped_tabs = before_tabs - session.tabs.len();
        if dropped_windows > 0 || dropped_tabs > 0 {
            tracing::debug!(
                "Cleaned up session {}: {} windows, {} tabs removed",
                tag,
                dropped_windows,
                dropped_tabs
            );
        }
    }

    /// Remove a foreign session wholesale.
    ///
    /// Returns false if `tag` is the local session or is unknown.
    pub fn delete_session(&mut self, tag: &str) -> bool {
        if tag == self.local_session_tag {
            return false;
        }
        self.marks.remove(tag);
        self.sessions.remove(tag).is_some()
    }

    /// Look up a session by tag.
    pub fn lookup_session(&self, tag: &str) -> Option<&SyncedSession> {
        self.sessions.get(tag)
    }

    /// Windows of session `tag`, or `None` if the session is unknown.
    pub fn lookup_session_windows(&self, tag: &str) -> Option<Vec<&SessionWindow>> {
        self.sessions
            .get(tag)
            .map(|session| session.windows.values().collect())
    }

    /// Tab `tab_id` of session `tag`.
    pub fn lookup_session_tab(&self, tag: &str, tab_id: TabId) -> Option<&SessionTab> {
        self.sessions.get(tag)?.tabs.get(&tab_id)
    }

    /// Every foreign session that has at least one window, ordered by tag.
    pub fn lookup_all_foreign_sessions(&self) -> Vec<&SyncedSession> {
        self.sessions
            .values()
            .filter(|s| s.session_tag != self.local_session_tag && !s.windows.is_empty())
            .collect()
    }

    /// Number of tabs tracked for `tag`.
    pub fn num_tabs(&self, tag: &str) -> usize {
        self.sessions.get(tag).map_or(0, |s| s.tabs.len())
    }

    /// Forget every session and the local tag.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.marks.clear();
        self.local_session_tag.clear();
    }

    /// Whether no sessions are tracked.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: &str = "session_synclocal";
    const FOREIGN: &str = "session_syncforeign";

    fn w(id: i32) -> WindowId {
        WindowId::new(id)
    }

    fn t(id: i32) -> TabId {
        TabId::new(id)
    }

    fn tracker_with_window(tabs: &[i32]) -> SyncedSessionTracker {
        let mut tracker = SyncedSessionTracker::new();
        tracker.set_local_session_tag(LOCAL);
        tracker.reset_tracking(FOREIGN);
        tracker.put_window_in_session(FOREIGN, w(1));
        for (pos, id) in tabs.iter().enumerate() {
            tracker.put_tab_in_window(FOREIGN, w(1), t(*id), pos);
        }
        tracker.cleanup(FOREIGN);
        tracker
    }

    // ===========================================
    // Creation and lookup
    // ===========================================

    #[test]
    fn get_or_create_is_stable() {
        let mut tracker = SyncedSessionTracker::new();
        tracker.get_or_create_session(FOREIGN).session_name = "Phone".into();
        assert_eq!(tracker.get_or_create_session(FOREIGN).session_name, "Phone");
        assert!(!tracker.is_empty());
    }

    #[test]
    fn lookups_do_not_create() {
        let tracker = SyncedSessionTracker::new();
        assert!(tracker.lookup_session(FOREIGN).is_none());
        assert!(tracker.lookup_session_windows(FOREIGN).is_none());
        assert!(tracker.lookup_session_tab(FOREIGN, t(1)).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn foreign_lookup_skips_local_and_windowless() {
        let mut tracker = tracker_with_window(&[1]);
        tracker.get_or_create_session("session_syncbare");
        tracker.reset_tracking(LOCAL);
        tracker.put_window_in_session(LOCAL, w(1));
        tracker.cleanup(LOCAL);

        let foreign = tracker.lookup_all_foreign_sessions();
        assert_eq!(foreign.len(), 1);
        assert_eq!(foreign[0].session_tag, FOREIGN);
    }

    // ===========================================
    // Mark and sweep
    // ===========================================

    #[test]
    fn put_tab_orders_window() {
        let tracker = tracker_with_window(&[5, 3, 9]);
        let windows = tracker.lookup_session_windows(FOREIGN).unwrap();
        assert_eq!(windows[0].tabs, vec![t(5), t(3), t(9)]);
        assert_eq!(
            tracker.lookup_session_tab(FOREIGN, t(3)).unwrap().window_id,
            w(1)
        );
    }

    #[test]
    fn shrinking_window_drops_tab() {
        let mut tracker = tracker_with_window(&[1, 2, 3]);

        tracker.reset_tracking(FOREIGN);
        tracker.put_window_in_session(FOREIGN, w(1));
        tracker.put_tab_in_window(FOREIGN, w(1), t(1), 0);
        tracker.put_tab_in_window(FOREIGN, w(1), t(3), 1);
        tracker.cleanup(FOREIGN);

        assert!(tracker.lookup_session_tab(FOREIGN, t(2)).is_none());
        let windows = tracker.lookup_session_windows(FOREIGN).unwrap();
        assert_eq!(windows[0].tabs, vec![t(1), t(3)]);
        assert_eq!(tracker.num_tabs(FOREIGN), 2);
    }

    #[test]
    fn closed_window_is_removed() {
        let mut tracker = SyncedSessionTracker::new();
        tracker.reset_tracking(FOREIGN);
        tracker.put_window_in_session(FOREIGN, w(1));
        tracker.put_window_in_session(FOREIGN, w(2));
        tracker.put_tab_in_window(FOREIGN, w(2), t(7), 0);
        tracker.cleanup(FOREIGN);

        tracker.reset_tracking(FOREIGN);
        tracker.put_window_in_session(FOREIGN, w(1));
        tracker.cleanup(FOREIGN);

        let windows = tracker.lookup_session_windows(FOREIGN).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].window_id, w(1));
        assert!(tracker.lookup_session_tab(FOREIGN, t(7)).is_none());
    }

    #[test]
    fn tab_moving_between_windows_is_listed_once() {
        let mut tracker = SyncedSessionTracker::new();
        tracker.reset_tracking(FOREIGN);
        tracker.put_window_in_session(FOREIGN, w(1));
        tracker.put_window_in_session(FOREIGN, w(2));
        tracker.put_tab_in_window(FOREIGN, w(1), t(4), 0);
        tracker.put_tab_in_window(FOREIGN, w(2), t(4), 0);
        tracker.cleanup(FOREIGN);

        let windows = tracker.lookup_session_windows(FOREIGN).unwrap();
        let listings: usize = windows
            .iter()
            .map(|win| win.tabs.iter().filter(|id| **id == t(4)).count())
            .sum();
        assert_eq!(listings, 1);
        assert_eq!(
            tracker.lookup_session_tab(FOREIGN, t(4)).unwrap().window_id,
            w(2)
        );
    }

    #[test]
    fn tab_created_before_header_survives_if_placed() {
        let mut tracker = SyncedSessionTracker::new();
        tracker.get_or_create_tab(FOREIGN, t(8)).pinned = true;

        tracker.reset_tracking(FOREIGN);
        tracker.put_window_in_session(FOREIGN, w(1));
        tracker.put_tab_in_window(FOREIGN, w(1), t(8), 0);
        tracker.cleanup(FOREIGN);

        assert!(tracker.lookup_session_tab(FOREIGN, t(8)).unwrap().pinned);
    }

    #[test]
    fn cleanup_is_idempotent() {
        for n in 0..6 {
            let ids: Vec<i32> = (0..n).collect();
            let mut tracker = tracker_with_window(&ids);
            let snapshot = tracker.lookup_session(FOREIGN).cloned();
            tracker.cleanup(FOREIGN);
            assert_eq!(tracker.lookup_session(FOREIGN).cloned(), snapshot);
        }
    }

    #[test]
    fn cleanup_after_bare_reset_empties_session() {
        for n in 0..6 {
            let ids: Vec<i32> = (0..n).collect();
            let mut tracker = tracker_with_window(&ids);
            tracker.reset_tracking(FOREIGN);
            tracker.cleanup(FOREIGN);

            let session = tracker.lookup_session(FOREIGN).unwrap();
            assert!(session.windows.is_empty());
            assert!(session.tabs.is_empty());
            assert_eq!(tracker.num_tabs(FOREIGN), 0);
        }
    }

    #[test]
    fn cleanup_keeps_everything_marked() {
        for n in 0..6 {
            let ids: Vec<i32> = (0..n).collect();
            let mut tracker = tracker_with_window(&ids);
            let before = tracker.lookup_session(FOREIGN).cloned();

            tracker.reset_tracking(FOREIGN);
            tracker.put_window_in_session(FOREIGN, w(1));
            for (pos, id) in ids.iter().enumerate() {
                tracker.put_tab_in_window(FOREIGN, w(1), t(*id), pos);
            }
            tracker.cleanup(FOREIGN);

            assert_eq!(tracker.lookup_session(FOREIGN).cloned(), before);
        }
    }

    #[test]
    fn cleanup_without_reset_is_noop() {
        let mut tracker = SyncedSessionTracker::new();
        tracker.get_or_create_tab(FOREIGN, t(1));
        tracker.cleanup(FOREIGN);
        assert_eq!(tracker.num_tabs(FOREIGN), 1);
    }

    // ===========================================
    // Deletion
    // ===========================================

    #[test]
    fn delete_foreign_session() {
        let mut tracker = tracker_with_window(&[1]);
        assert!(tracker.delete_session(FOREIGN));
        assert!(tracker.lookup_session(FOREIGN).is_none());
        assert!(!tracker.delete_session(FOREIGN));
    }

    #[test]
    fn delete_local_session_refused() {
        let mut tracker = SyncedSessionTracker::new();
        tracker.set_local_session_tag(LOCAL);
        tracker.get_or_create_session(LOCAL);
        assert!(!tracker.delete_session(LOCAL));
        assert!(tracker.lookup_session(LOCAL).is_some());
    }

    #[test]
    fn clear_forgets_everything() {
        let mut tracker = tracker_with_window(&[1, 2]);
        tracker.clear();
        assert!(tracker.is_empty());
        assert_eq!(tracker.local_session_tag(), "");
    }
}
