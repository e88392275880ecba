//! Conversion between session records and the session tree.
//!
//! Optional record fields are only applied when present, so a sparse record
//! never clobbers what the tree already knows.

use std::time::SystemTime;
use tabsync_types::{
    BrowserType, NavigationSpecifics, PageTransition as RecordTransition, SessionHeader,
    TabSpecifics, TransitionQualifier, WindowSpecifics,
};

use crate::model::{
    PageTransition, ReferrerPolicy, SessionTab, SyncedSession, TabNavigation, WindowType,
};
use crate::tracker::SyncedSessionTracker;

/// Copy header name and device type into `session` and stamp it with `mtime`.
pub fn apply_header_info(session: &mut SyncedSession, header: &SessionHeader, mtime: SystemTime) {
    if let Some(name) = &header.client_name {
        session.session_name = name.clone();
    }
    if let Some(device_type) = header.device_type {
        session.device_type = device_type;
    }
    session.modified_time = mtime;
}

/// Rebuild session `tag` from a header record.
///
/// Applies the header info, then runs one full tracking pass: every window
/// and tab the header lists is marked and everything else is dropped.
pub fn populate_session_header(
    tracker: &mut SyncedSessionTracker,
    tag: &str,
    header: &SessionHeader,
    mtime: SystemTime,
) {
    apply_header_info(tracker.get_or_create_session(tag), header, mtime);

    tracker.reset_tracking(tag);
    tracing::debug!(
        "Associating {} with {} windows",
        tag,
        header.windows.len()
    );
    for window in &header.windows {
        tracker.put_window_in_session(tag, window.window_id);
        populate_session_window(tracker, tag, window, mtime);
    }
    tracker.cleanup(tag);
}

/// Copy a window record into session `tag` and place its tabs in order.
///
/// The window must already have been put in the session for this pass.
pub fn populate_session_window(
    tracker: &mut SyncedSessionTracker,
    tag: &str,
    specifics: &WindowSpecifics,
    mtime: SystemTime,
) {
    let window_id = specifics.window_id;
    if let Some(window) = tracker
        .get_or_create_session(tag)
        .windows
        .get_mut(&window_id)
    {
        if let Some(index) = specifics.selected_tab_index {
            window.selected_tab_index = index;
        }
        if let Some(browser_type) = specifics.browser_type {
            window.window_type = match browser_type {
                BrowserType::Tabbed => WindowType::Tabbed,
                BrowserType::Popup => WindowType::Popup,
            };
        }
        window.timestamp = mtime;
    }

    for (position, tab_id) in specifics.tabs.iter().enumerate() {
        tracker.put_tab_in_window(tag, window_id, *tab_id, position);
    }
}

/// Overwrite `tab` from a tab record.
///
/// The navigation list is replaced wholesale.
pub fn apply_tab_specifics(tab: &mut SessionTab, specifics: &TabSpecifics, mtime: SystemTime) {
    tab.tab_id = specifics.tab_id;
    tab.window_id = specifics.window_id;
    if let Some(index) = specifics.tab_visual_index {
        tab.tab_visual_index = index;
    }
    tab.current_navigation_index = specifics.current_navigation_index;
    tab.pinned = specifics.pinned;
    if let Some(app_id) = &specifics.extension_app_id {
        tab.extension_app_id = Some(app_id.clone());
    }
    tab.timestamp = mtime;
    tab.navigations = specifics
        .navigations
        .iter()
        .map(navigation_from_specifics)
        .collect();
}

/// Build a tree navigation from a record.
///
/// A core transition wins over a qualifier; a record with neither decodes as
/// a link. The referrer policy is not transported and decodes as default.
pub fn navigation_from_specifics(specifics: &NavigationSpecifics) -> TabNavigation {
    let transition = match (specifics.page_transition, specifics.navigation_qualifier) {
        (Some(transition), _) => from_record_transition(transition),
        (None, Some(TransitionQualifier::ClientRedirect)) => PageTransition::ClientRedirect,
        (None, Some(TransitionQualifier::ServerRedirect)) => PageTransition::ServerRedirect,
        (None, None) => PageTransition::Link,
    };

    TabNavigation::new(specifics.index, specifics.virtual_url.clone())
        .with_referrer(specifics.referrer.clone(), ReferrerPolicy::Default)
        .with_title(specifics.title.clone())
        .with_state(specifics.state.clone().unwrap_or_default())
        .with_transition(transition)
}

/// Build a record from a tree navigation.
///
/// Redirects are written as a qualifier with no core transition.
pub fn navigation_to_specifics(navigation: &TabNavigation) -> NavigationSpecifics {
    let (page_transition, navigation_qualifier) = match navigation.transition() {
        PageTransition::ClientRedirect => (None, Some(TransitionQualifier::ClientRedirect)),
        PageTransition::ServerRedirect => (None, Some(TransitionQualifier::ServerRedirect)),
        other => (Some(to_record_transition(other)), None),
    };

    NavigationSpecifics {
        index: navigation.index(),
        virtual_url: navigation.virtual_url().to_string(),
        referrer: navigation.referrer().to_string(),
        title: navigation.title().to_string(),
        state: if navigation.state().is_empty() {
            None
        } else {
            Some(navigation.state().to_vec())
        },
        page_transition,
        navigation_qualifier,
    }
}

fn from_record_transition(transition: RecordTransition) -> PageTransition {
    match transition {
        RecordTransition::Link => PageTransition::Link,
        RecordTransition::Typed => PageTransition::Typed,
        RecordTransition::AutoBookmark => PageTransition::AutoBookmark,
        RecordTransition::AutoSubframe => PageTransition::AutoSubframe,
        RecordTransition::ManualSubframe => PageTransition::ManualSubframe,
        RecordTransition::Generated => PageTransition::Generated,
        RecordTransition::StartPage => PageTransition::StartPage,
        RecordTransition::FormSubmit => PageTransition::FormSubmit,
        RecordTransition::Reload => PageTransition::Reload,
        RecordTransition::Keyword => PageTransition::Keyword,
        RecordTransition::KeywordGenerated => PageTransition::KeywordGenerated,
        RecordTransition::ChainStart => PageTransition::ChainStart,
        RecordTransition::ChainEnd => PageTransition::ChainEnd,
    }
}

fn to_record_transition(transition: PageTransition) -> RecordTransition {
    match transition {
        PageTransition::Link => RecordTransition::Link,
        PageTransition::Typed => RecordTransition::Typed,
        PageTransition::AutoBookmark => RecordTransition::AutoBookmark,
        PageTransition::AutoSubframe => RecordTransition::AutoSubframe,
        PageTransition::ManualSubframe => RecordTransition::ManualSubframe,
        PageTransition::Generated => RecordTransition::Generated,
        PageTransition::StartPage => RecordTransition::StartPage,
        PageTransition::FormSubmit => RecordTransition::FormSubmit,
        PageTransition::Reload => RecordTransition::Reload,
        PageTransition::Keyword => RecordTransition::Keyword,
        PageTransition::KeywordGenerated => RecordTransition::KeywordGenerated,
        PageTransition::ChainStart => RecordTransition::ChainStart,
        PageTransition::ChainEnd => RecordTransition::ChainEnd,
        // Handled by the caller as qualifiers.
        PageTransition::ClientRedirect | PageTransition::ServerRedirect => RecordTransition::Typed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tabsync_types::{DeviceType, TabId, WindowId};

    const TAG: &str = "session_syncforeign";

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn window(id: i32, tabs: &[i32]) -> WindowSpecifics {
        WindowSpecifics {
            window_id: WindowId::new(id),
            selected_tab_index: Some(0),
            browser_type: Some(BrowserType::Popup),
            tabs: tabs.iter().map(|t| TabId::new(*t)).collect(),
        }
    }

    // ===========================================
    // Headers and windows
    // ===========================================

    #[test]
    fn header_populates_session() {
        let mut tracker = SyncedSessionTracker::new();
        let header = SessionHeader {
            client_name: Some("Desk".into()),
            device_type: Some(DeviceType::Linux),
            windows: vec![window(1, &[10, 11]), window(2, &[12])],
        };
        populate_session_header(&mut tracker, TAG, &header, at(50));

        let session = tracker.lookup_session(TAG).unwrap();
        assert_eq!(session.session_name, "Desk");
        assert_eq!(session.device_type, DeviceType::Linux);
        assert_eq!(session.modified_time, at(50));
        assert_eq!(session.windows.len(), 2);
        let first = &session.windows[&WindowId::new(1)];
        assert_eq!(first.tabs, vec![TabId::new(10), TabId::new(11)]);
        assert_eq!(first.window_type, WindowType::Popup);
        assert_eq!(first.timestamp, at(50));
        assert_eq!(session.tabs.len(), 3);
    }

    #[test]
    fn sparse_header_keeps_name() {
        let mut tracker = SyncedSessionTracker::new();
        tracker.get_or_create_session(TAG).session_name = "Kept".into();
        populate_session_header(&mut tracker, TAG, &SessionHeader::default(), at(1));
        assert_eq!(tracker.lookup_session(TAG).unwrap().session_name, "Kept");
    }

    #[test]
    fn shrinking_header_removes_tab() {
        let mut tracker = SyncedSessionTracker::new();
        let full = SessionHeader {
            windows: vec![window(1, &[1, 2, 3])],
            ..Default::default()
        };
        populate_session_header(&mut tracker, TAG, &full, at(1));

        let shrunk = SessionHeader {
            windows: vec![window(1, &[1, 3])],
            ..Default::default()
        };
        populate_session_header(&mut tracker, TAG, &shrunk, at(2));

        assert!(tracker.lookup_session_tab(TAG, TabId::new(2)).is_none());
        let windows = tracker.lookup_session_windows(TAG).unwrap();
        assert!(!windows[0].tabs.contains(&TabId::new(2)));
    }

    // ===========================================
    // Tabs and navigations
    // ===========================================

    #[test]
    fn tab_specifics_replace_navigations() {
        let mut tab = SessionTab::new(TabId::new(3));
        tab.navigations = vec![TabNavigation::new(0, "https://old.example/")];
        tab.tab_visual_index = 4;

        let mut specifics = TabSpecifics::new(TabId::new(3), WindowId::new(1));
        specifics.pinned = true;
        specifics.current_navigation_index = 0;
        specifics.navigations = vec![NavigationSpecifics {
            virtual_url: "https://new.example/".into(),
            ..Default::default()
        }];
        apply_tab_specifics(&mut tab, &specifics, at(9));

        assert!(tab.pinned);
        assert_eq!(tab.tab_visual_index, 4);
        assert_eq!(tab.window_id, WindowId::new(1));
        assert_eq!(tab.timestamp, at(9));
        assert_eq!(tab.navigations.len(), 1);
        assert_eq!(tab.navigations[0].virtual_url(), "https://new.example/");
    }

    #[test]
    fn redirects_use_qualifier() {
        for (transition, qualifier) in [
            (PageTransition::ClientRedirect, TransitionQualifier::ClientRedirect),
            (PageTransition::ServerRedirect, TransitionQualifier::ServerRedirect),
        ] {
            let nav = TabNavigation::new(0, "https://a.example/").with_transition(transition);
            let specifics = navigation_to_specifics(&nav);
            assert_eq!(specifics.page_transition, None);
            assert_eq!(specifics.navigation_qualifier, Some(qualifier));
            assert_eq!(
                navigation_from_specifics(&specifics).transition(),
                transition
            );
        }
    }

    #[test]
    fn core_transitions_map_one_to_one() {
        let all = [
            PageTransition::Link,
            PageTransition::Typed,
            PageTransition::AutoBookmark,
            PageTransition::AutoSubframe,
            PageTransition::ManualSubframe,
            PageTransition::Generated,
            PageTransition::StartPage,
            PageTransition::FormSubmit,
            PageTransition::Reload,
            PageTransition::Keyword,
            PageTransition::KeywordGenerated,
            PageTransition::ChainStart,
            PageTransition::ChainEnd,
        ];
        for transition in all {
            let nav = TabNavigation::new(0, "https://a.example/").with_transition(transition);
            let specifics = navigation_to_specifics(&nav);
            assert!(specifics.navigation_qualifier.is_none());
            assert_eq!(
                navigation_from_specifics(&specifics).transition(),
                transition
            );
        }
    }

    #[test]
    fn decoded_navigation_has_default_referrer_policy() {
        let specifics = NavigationSpecifics {
            referrer: "https://r.example/".into(),
            state: Some(vec![7]),
            ..Default::default()
        };
        let nav = navigation_from_specifics(&specifics);
        assert_eq!(nav.referrer_policy(), ReferrerPolicy::Default);
        assert_eq!(nav.transition(), PageTransition::Link);
        assert_eq!(nav.state(), &[7]);
    }
}
