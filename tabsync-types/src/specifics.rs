//! Session records ("specifics") stored in sync nodes.
//!
//! Every node under the sessions root holds exactly one [`SessionSpecifics`].
//! A device writes one header record listing its windows and the ordering of
//! their tabs, plus one tab record per open tab.

use serde::{Deserialize, Serialize};

use crate::{SpecificsError, TabId, WindowId};

/// The payload of one sync node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSpecifics {
    /// Tag of the session (device) that owns this record.
    pub session_tag: String,
    /// Header or tab data. `None` is a malformed record.
    pub body: Option<SpecificsBody>,
}

/// The two mutually exclusive record kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SpecificsBody {
    /// Per-device header listing windows and tab ordering.
    Header(SessionHeader),
    /// Per-tab navigation history and metadata.
    Tab(TabSpecifics),
}

impl SessionSpecifics {
    /// Create a header record.
    pub fn header(session_tag: impl Into<String>, header: SessionHeader) -> Self {
        Self {
            session_tag: session_tag.into(),
            body: Some(SpecificsBody::Header(header)),
        }
    }

    /// Create a tab record.
    pub fn tab(session_tag: impl Into<String>, tab: TabSpecifics) -> Self {
        Self {
            session_tag: session_tag.into(),
            body: Some(SpecificsBody::Tab(tab)),
        }
    }

    /// Create a record with no payload.
    pub fn empty(session_tag: impl Into<String>) -> Self {
        Self {
            session_tag: session_tag.into(),
            body: None,
        }
    }

    /// The header payload, if this is a header record.
    pub fn as_header(&self) -> Option<&SessionHeader> {
        match &self.body {
            Some(SpecificsBody::Header(header)) => Some(header),
            _ => None,
        }
    }

    /// The tab payload, if this is a tab record.
    pub fn as_tab(&self) -> Option<&TabSpecifics> {
        match &self.body {
            Some(SpecificsBody::Tab(tab)) => Some(tab),
            _ => None,
        }
    }

    /// Mutable tab payload, if this is a tab record.
    pub fn as_tab_mut(&mut self) -> Option<&mut TabSpecifics> {
        match &mut self.body {
            Some(SpecificsBody::Tab(tab)) => Some(tab),
            _ => None,
        }
    }

    /// The payload, or an error for a record with neither kind.
    pub fn require_body(&self) -> Result<&SpecificsBody, SpecificsError> {
        self.body
            .as_ref()
            .ok_or_else(|| SpecificsError::MissingPayload {
                session_tag: self.session_tag.clone(),
            })
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SpecificsError> {
        rmp_serde::to_vec_named(self).map_err(SpecificsError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SpecificsError> {
        rmp_serde::from_slice(bytes).map_err(SpecificsError::Deserialization)
    }
}

/// Header record: the device's windows and their tab ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHeader {
    /// Human-readable device name.
    pub client_name: Option<String>,
    /// Kind of device that wrote the header.
    pub device_type: Option<DeviceType>,
    /// Open windows, in no particular order.
    pub windows: Vec<WindowSpecifics>,
}

/// One window inside a header record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpecifics {
    /// Window id, scoped to the owning session.
    pub window_id: WindowId,
    /// Index of the selected tab, if recorded.
    pub selected_tab_index: Option<i32>,
    /// Window kind, if recorded.
    pub browser_type: Option<BrowserType>,
    /// Tab ids in display order.
    pub tabs: Vec<TabId>,
}

impl WindowSpecifics {
    /// Create a window record with no tabs.
    pub fn new(window_id: WindowId) -> Self {
        Self {
            window_id,
            selected_tab_index: None,
            browser_type: None,
            tabs: Vec::new(),
        }
    }
}

/// Tab record: navigation history and tab metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSpecifics {
    /// Tab id, scoped to the owning session.
    pub tab_id: TabId,
    /// Window the tab lives in.
    pub window_id: WindowId,
    /// Position of the tab within its window, if recorded.
    pub tab_visual_index: Option<i32>,
    /// Index into `navigations` of the selected entry.
    pub current_navigation_index: i32,
    /// Whether the tab is pinned.
    pub pinned: bool,
    /// Extension app owning the tab, if any.
    pub extension_app_id: Option<String>,
    /// Serialized navigation window around the current entry.
    pub navigations: Vec<NavigationSpecifics>,
    /// Raw favicon image bytes.
    pub favicon: Option<Vec<u8>>,
    /// URL the favicon was loaded from.
    pub favicon_source: Option<String>,
    /// Kind of favicon stored in `favicon`.
    pub favicon_type: Option<FaviconType>,
}

impl TabSpecifics {
    /// Create a tab record with no navigations.
    pub fn new(tab_id: TabId, window_id: WindowId) -> Self {
        Self {
            tab_id,
            window_id,
            tab_visual_index: None,
            current_navigation_index: 0,
            pinned: false,
            extension_app_id: None,
            navigations: Vec::new(),
            favicon: None,
            favicon_source: None,
            favicon_type: None,
        }
    }

    /// Index of the selected navigation clamped into range.
    ///
    /// Returns `None` when there are no navigations.
    pub fn selected_navigation(&self) -> Option<&NavigationSpecifics> {
        let last = self.navigations.len().checked_sub(1)?;
        let index = usize::try_from(self.current_navigation_index.max(0)).unwrap_or(0);
        self.navigations.get(index.min(last))
    }
}

/// One navigation entry inside a tab record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSpecifics {
    /// Index of the entry in the tab's full history.
    pub index: i32,
    /// Displayed destination URL.
    pub virtual_url: String,
    /// Referrer URL.
    pub referrer: String,
    /// Page title.
    pub title: String,
    /// Opaque page state.
    pub state: Option<Vec<u8>>,
    /// Core transition type.
    pub page_transition: Option<PageTransition>,
    /// Redirect qualifier, written instead of a core transition.
    pub navigation_qualifier: Option<TransitionQualifier>,
}

/// Core page transition types as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageTransition {
    /// User followed a link.
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
}

/// Redirect qualifiers recorded without a core transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionQualifier {
    /// Redirect issued by the page.
    ClientRedirect,
    /// Redirect issued by the server.
    ServerRedirect,
}

/// Window kinds as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserType {
    /// Normal tabbed window.
    Tabbed,
    /// Popup window.
    Popup,
}

/// Favicon kinds as recorded. Only web favicons are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaviconType {
    /// Regular page favicon.
    WebFavicon,
}

/// Kind of device that owns a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Windows desktop.
    Windows,
    /// macOS desktop.
    MacOs,
    /// Linux desktop.
    Linux,
    /// ChromeOS device.
    ChromeOs,
    /// Phone.
    Phone,
    /// Tablet.
    Tablet,
    /// Anything else.
    #[default]
    Other,
}

impl DeviceType {
    /// Whether this is a desktop-class device.
    pub fn is_desktop(&self) -> bool {
        matches!(self, Self::Windows | Self::MacOs | Self::Linux | Self::ChromeOs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tab() -> TabSpecifics {
        let mut tab = TabSpecifics::new(TabId::new(5), WindowId::new(1));
        tab.current_navigation_index = 1;
        tab.navigations = vec![
            NavigationSpecifics {
                index: 0,
                virtual_url: "https://a.example/".into(),
                page_transition: Some(PageTransition::Typed),
                ..Default::default()
            },
            NavigationSpecifics {
                index: 1,
                virtual_url: "https://b.example/".into(),
                navigation_qualifier: Some(TransitionQualifier::ServerRedirect),
                ..Default::default()
            },
        ];
        tab
    }

    #[test]
    fn tab_record_survives_msgpack() {
        let specifics = SessionSpecifics::tab("session_syncabc", sample_tab());
        let bytes = specifics.to_bytes().unwrap();
        let decoded = SessionSpecifics::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, specifics);
    }

    #[test]
    fn empty_record_has_no_body() {
        let specifics = SessionSpecifics::empty("tag");
        assert!(specifics.as_header().is_none());
        assert!(specifics.as_tab().is_none());
        assert!(matches!(
            specifics.require_body(),
            Err(SpecificsError::MissingPayload { .. })
        ));
    }

    #[test]
    fn header_accessors() {
        let specifics = SessionSpecifics::header(
            "tag",
            SessionHeader {
                client_name: Some("Laptop".into()),
                device_type: Some(DeviceType::Linux),
                windows: vec![WindowSpecifics::new(WindowId::new(1))],
            },
        );
        let header = specifics.as_header().unwrap();
        assert_eq!(header.windows.len(), 1);
        assert!(specifics.as_tab().is_none());
    }

    #[test]
    fn selected_navigation_clamps_index() {
        let mut tab = sample_tab();
        tab.current_navigation_index = 9;
        assert_eq!(
            tab.selected_navigation().unwrap().virtual_url,
            "https://b.example/"
        );

        tab.current_navigation_index = -3;
        assert_eq!(
            tab.selected_navigation().unwrap().virtual_url,
            "https://a.example/"
        );

        tab.navigations.clear();
        assert!(tab.selected_navigation().is_none());
    }

    #[test]
    fn device_type_desktop_class() {
        assert!(DeviceType::MacOs.is_desktop());
        assert!(DeviceType::ChromeOs.is_desktop());
        assert!(!DeviceType::Phone.is_desktop());
        assert!(!DeviceType::Other.is_desktop());
    }

    #[test]
    fn device_type_json_names() {
        let json = serde_json::to_string(&DeviceType::Tablet).unwrap();
        assert_eq!(json, "\"tablet\"");
        let parsed: DeviceType = serde_json::from_str("\"linux\"").unwrap();
        assert_eq!(parsed, DeviceType::Linux);
    }
}
