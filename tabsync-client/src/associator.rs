//! SessionAssociator - keeps the session tree and the sync store consistent.
//!
//! # Architecture
//!
//! ```text
//! LocalBrowser ──► SessionAssociator ──► SyncStore
//!                      │      ▲
//!                      ▼      │
//!      tabsync-core (tracker, favicon cache, conversion)
//!                      │
//!                      ▼
//!               FaviconLoader (tokio tasks, mpsc back)
//! ```
//!
//! All mutation of the tracker, the tab node pool and the favicon cache
//! happens on the caller's task. Favicon fetches and the host name lookup
//! run elsewhere and are applied when the caller drains them.
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryStore::with_root();
//! let fetcher = Arc::new(MockFaviconFetcher::new());
//! let mut associator = SessionAssociator::new(store, fetcher, Config::default());
//!
//! associator.associate_models(&browser)?;
//! for session in associator.get_all_foreign_sessions() {
//!     println!("{}", session.session_name);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tabsync_core::{
    apply_header_info, apply_tab_specifics, canonical_url, is_valid_url, navigation_to_specifics,
    navigation_window, populate_session_header, populate_session_window, AssociationEvent,
    AssociationState, FaviconCache, SessionTab, SessionWindow, SyncedSession, SyncedSessionTracker,
};
use tabsync_types::{
    BrowserType, FaviconType, NodeId, SessionHeader, SessionSpecifics, SpecificsBody, TabId,
    TabSpecifics, WindowSpecifics,
};
use tokio::sync::{broadcast, oneshot};

use crate::browser::{
    entry_for_index, find_tab, should_sync_window, tab_has_valid_entry, tab_position,
    LocalBrowser, SyncedTab,
};
use crate::config::Config;
use crate::error::AssociationError;
use crate::events::{EventBus, SessionEvent};
use crate::favicon::{FaviconFetcher, FaviconLoad, FaviconLoader};
use crate::store::{children, StoreError, SyncStore, SESSIONS_ROOT_TAG};
use crate::tab_pool::{tab_node_tag, TabNodePool};

/// Prefix of machine tags derived from the store's cache GUID.
pub const MACHINE_TAG_PREFIX: &str = "session_sync";

/// Session name used in test mode.
pub const TEST_SESSION_NAME: &str = "TestSessionName";

/// Session name used when the host name cannot be read.
const FALLBACK_SESSION_NAME: &str = "Unknown device";

/// Default age, in days, after which a foreign session is stale.
pub const DEFAULT_STALE_SESSION_THRESHOLD_DAYS: u32 = 14;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// An incremental change to foreign session data in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    /// A node was added or its record changed.
    Updated(NodeId),
    /// Every node of a session was removed.
    Deleted {
        /// Tag of the removed session.
        session_tag: String,
    },
}

/// Local tab bookkeeping: its node and what was last written.
#[derive(Debug, Clone)]
struct TabLink {
    node_id: NodeId,
    url: String,
    favicon_request: Option<u64>,
}

impl TabLink {
    fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            url: String::new(),
            favicon_request: None,
        }
    }
}

/// Reconciles local browser state and foreign sessions with a sync store.
pub struct SessionAssociator<S: SyncStore> {
    store: S,
    config: Config,
    state: AssociationState,
    tracker: SyncedSessionTracker,
    tab_pool: TabNodePool,
    tab_links: HashMap<TabId, TabLink>,
    favicons: FaviconCache,
    favicon_loader: FaviconLoader,
    local_header_node: Option<NodeId>,
    current_machine_tag: Option<String>,
    current_session_name: Option<String>,
    session_name_rx: Option<oneshot::Receiver<String>>,
    stale_session_threshold_days: u32,
    events: EventBus,
}

impl<S: SyncStore> SessionAssociator<S> {
    /// Create an associator over `store`.
    pub fn new(store: S, fetcher: Arc<dyn FaviconFetcher>, config: Config) -> Self {
        let stale_session_threshold_days = match config.cleanup.stale_session_threshold_days {
            0 => {
                tracing::warn!(
                    "Stale session threshold of 0 days ignored, using {}",
                    DEFAULT_STALE_SESSION_THRESHOLD_DAYS
                );
                DEFAULT_STALE_SESSION_THRESHOLD_DAYS
            }
            days => days,
        };

        Self {
            store,
            config,
            state: AssociationState::new(),
            tracker: SyncedSessionTracker::new(),
            tab_pool: TabNodePool::new(),
            tab_links: HashMap::new(),
            favicons: FaviconCache::new(),
            favicon_loader: FaviconLoader::new(fetcher),
            local_header_node: None,
            current_machine_tag: None,
            current_session_name: None,
            session_name_rx: None,
            stale_session_threshold_days,
            events: EventBus::new(),
        }
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    /// Build the session tree from the store and write local state back.
    ///
    /// Requires a cleared associator: after any failure, call
    /// [`disassociate_models`](Self::disassociate_models) before retrying.
    ///
    /// # Errors
    ///
    /// Fails if the store has no sessions root, if the store holds records
    /// that violate the protocol, or if writing local state fails.
    pub fn associate_models(&mut self, browser: &dyn LocalBrowser) -> Result<(), AssociationError> {
        self.transition(AssociationEvent::AssociateRequested)?;
        tracing::info!("Associating sessions");

        match self.associate_models_inner(browser) {
            Ok(()) => {
                self.transition(AssociationEvent::AssociateSucceeded)?;
                tracing::info!(
                    "Sessions associated: {} foreign sessions, {} local tab nodes",
                    self.tracker.lookup_all_foreign_sessions().len(),
                    self.tab_pool.capacity()
                );
                self.events.emit(SessionEvent::AssociationCycleComplete);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Session association failed: {}", e);
                self.transition(AssociationEvent::AssociateFailed)?;
                Err(e)
            }
        }
    }

    fn associate_models_inner(&mut self, browser: &dyn LocalBrowser) -> Result<(), AssociationError> {
        if !self.tracker.is_empty() || !self.tab_pool.is_empty() {
            return Err(AssociationError::NotDisassociated);
        }

        let root = self
            .store
            .read_transaction(|trans| trans.root_by_tag(SESSIONS_ROOT_TAG))
            .ok_or(AssociationError::MissingRoot)?;

        let machine_tag = match self.current_machine_tag.clone() {
            Some(tag) => tag,
            None => self.init_machine_tag(),
        };
        self.init_session_name();

        let records = self
            .store
            .read_transaction(|trans| -> Result<Vec<_>, StoreError> {
                children(trans, root)?
                    .into_iter()
                    .map(|id| -> Result<_, StoreError> {
                        Ok((id, trans.specifics(id)?, trans.modification_time(id)?))
                    })
                    .collect()
            })?;

        for (id, specifics, modified) in records {
            if specifics.session_tag != machine_tag {
                self.associate_foreign_specifics(&specifics, modified)?;
                continue;
            }
            match specifics.require_body()? {
                SpecificsBody::Header(header) => {
                    if let Some(first) = self.local_header_node {
                        return Err(AssociationError::DuplicateLocalHeader { first, second: id });
                    }
                    tracing::debug!("Found local session header {}", id);
                    self.local_header_node = Some(id);
                    if self.current_session_name.is_none() {
                        self.current_session_name = header.client_name.clone();
                    }
                }
                SpecificsBody::Tab(_) => {
                    tracing::debug!("Found local tab node {}", id);
                    self.tab_pool.seed(id);
                }
            }
        }

        if !self.tab_pool.is_full() {
            return Err(AssociationError::PoolNotFull {
                free: self.tab_pool.free_count(),
                capacity: self.tab_pool.capacity(),
            });
        }

        if self.local_header_node.is_none() {
            let header = SessionSpecifics::header(
                machine_tag.as_str(),
                SessionHeader {
                    client_name: self.current_session_name.clone(),
                    device_type: Some(self.config.session.device_type),
                    windows: Vec::new(),
                },
            );
            let id = self.store.write_transaction(|trans| {
                let id = trans.create_unique(root, &machine_tag)?;
                trans.set_title(id, &machine_tag)?;
                trans.set_specifics(id, &header)?;
                Ok::<_, StoreError>(id)
            })?;
            tracing::info!("Created local session header {} for {}", id, machine_tag);
            self.local_header_node = Some(id);
        }

        self.associate_windows(browser, true)
    }

    /// Tear down the association.
    ///
    /// Forgets every session, tab node, tab link and favicon, cancels
    /// pending favicon fetches and resets the local identity. Safe to call
    /// in any state.
    pub fn disassociate_models(&mut self) {
        if let Err(e) = self.transition(AssociationEvent::DisassociateRequested) {
            tracing::warn!("{}", e);
        }

        self.tracker.clear();
        self.tab_pool.clear();
        self.tab_links.clear();
        self.favicon_loader.cancel_all();
        self.favicons.clear();
        self.local_header_node = None;
        self.current_machine_tag = None;
        self.current_session_name = None;
        self.session_name_rx = None;

        if let Err(e) = self.transition(AssociationEvent::DisassociateCompleted) {
            tracing::warn!("{}", e);
        }
        tracing::info!("Sessions disassociated");
        self.events.emit(SessionEvent::ForeignSessionDisabled);
    }

    fn transition(&mut self, event: AssociationEvent) -> Result<(), AssociationError> {
        self.state = self.state.on_event(event)?;
        Ok(())
    }

    fn init_machine_tag(&mut self) -> String {
        let tag = match &self.config.session.machine_tag_override {
            Some(tag) => tag.clone(),
            None => format!("{}{}", MACHINE_TAG_PREFIX, self.store.cache_guid()),
        };
        tracing::info!("Using machine tag {}", tag);
        self.tab_pool.set_machine_tag(tag.as_str());
        self.tracker.set_local_session_tag(tag.as_str());
        self.current_machine_tag = Some(tag.clone());
        tag
    }

    fn init_session_name(&mut self) {
        if self.current_session_name.is_some() || self.session_name_rx.is_some() {
            return;
        }
        if let Some(name) = &self.config.session.session_name {
            self.current_session_name = Some(name.clone());
            return;
        }
        if self.config.session.setup_for_test {
            self.current_session_name = Some(TEST_SESSION_NAME.to_string());
            return;
        }

        let (tx, rx) = oneshot::channel();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    // Receiver gone means the associator was torn down.
                    let _ = tx.send(host_session_name());
                });
            }
            Err(_) => {
                tracing::debug!("No async runtime, reading host name inline");
                let _ = tx.send(host_session_name());
            }
        }
        self.session_name_rx = Some(rx);
    }

    /// Apply the host name if the lookup has finished.
    fn drain_session_name(&mut self) {
        let Some(rx) = self.session_name_rx.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(name) => {
                self.session_name_rx = None;
                self.set_session_name(name);
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                tracing::warn!("Host name lookup ended without a result");
                self.session_name_rx = None;
            }
        }
    }

    fn set_session_name(&mut self, name: String) {
        if self.current_session_name.is_none() {
            tracing::debug!("Session name initialized to {}", name);
            self.current_session_name = Some(name);
        }
    }

    /// Wait for the host name lookup, if one is running.
    ///
    /// The name reaches the store with the next header write.
    pub async fn wait_for_session_name(&mut self) -> Option<&str> {
        if let Some(rx) = self.session_name_rx.take() {
            match rx.await {
                Ok(name) => self.set_session_name(name),
                Err(_) => tracing::warn!("Host name lookup ended without a result"),
            }
        }
        self.current_session_name.as_deref()
    }

    fn require_machine_tag(&self) -> Result<String, AssociationError> {
        self.current_machine_tag
            .clone()
            .ok_or(AssociationError::NotAssociated)
    }

    // ===========================================
    // Local state
    // ===========================================

    /// Write the local header from the browser's windows.
    ///
    /// With `reload_tabs`, tab links for tabs no longer open are released
    /// and every open tab is rewritten; otherwise only already-associated
    /// tabs are listed.
    ///
    /// # Errors
    ///
    /// [`AssociationError::LocalHeaderMissing`] if the header node was
    /// deleted from the store.
    pub fn associate_windows(
        &mut self,
        browser: &dyn LocalBrowser,
        reload_tabs: bool,
    ) -> Result<(), AssociationError> {
        let header_node = self
            .local_header_node
            .ok_or(AssociationError::NotAssociated)?;
        let machine_tag = self.require_machine_tag()?;
        self.drain_session_name();

        let now = SystemTime::now();
        let mut header = SessionHeader {
            client_name: self.current_session_name.clone(),
            device_type: Some(self.config.session.device_type),
            windows: Vec::new(),
        };
        if reload_tabs {
            let open_tabs: HashSet<TabId> = browser
                .windows()
                .into_iter()
                .flat_map(|window| (0..window.tab_count()).filter_map(|i| window.tab_id_at(i)))
                .collect();
            let gone: Vec<TabId> = self
                .tab_links
                .keys()
                .filter(|id| !open_tabs.contains(*id))
                .copied()
                .collect();
            for tab_id in gone {
                self.release_tab_link(tab_id);
            }
        }

        self.tracker.reset_tracking(&machine_tag);
        for window in browser.windows() {
            if !should_sync_window(window) || window.tab_count() == 0 || !window.has_window() {
                continue;
            }

            let window_id = window.session_id();
            let mut window_specifics = WindowSpecifics::new(window_id);
            window_specifics.selected_tab_index = Some(window.active_index());
            window_specifics.browser_type = Some(if window.is_type_tabbed() {
                BrowserType::Tabbed
            } else {
                BrowserType::Popup
            });

            for index in 0..window.tab_count() {
                let Some(tab_id) = window.tab_id_at(index) else {
                    continue;
                };
                if reload_tabs {
                    if let Some(tab) = window.tab_at(index) {
                        self.associate_tab(browser, tab)?;
                    }
                }
                if self.tab_links.contains_key(&tab_id) {
                    window_specifics.tabs.push(tab_id);
                }
            }

            if !window_specifics.tabs.is_empty() {
                tracing::debug!(
                    "Associating window {} with {} tabs",
                    window_id,
                    window_specifics.tabs.len()
                );
                self.tracker.put_window_in_session(&machine_tag, window_id);
                populate_session_window(&mut self.tracker, &machine_tag, &window_specifics, now);
                header.windows.push(window_specifics);
            }
        }

        self.tracker.cleanup(&machine_tag);
        apply_header_info(
            self.tracker.get_or_create_session(&machine_tag),
            &header,
            now,
        );

        let specifics = SessionSpecifics::header(machine_tag.as_str(), header);
        match self
            .store
            .write_transaction(|trans| trans.set_specifics(header_node, &specifics))
        {
            Ok(()) => Ok(()),
            Err(StoreError::NodeNotFound(_)) => {
                tracing::error!(
                    "Local session header {} missing, reassociation needed",
                    header_node
                );
                Err(AssociationError::LocalHeaderMissing)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite a batch of changed local tabs, then the header.
    ///
    /// Ids no longer open in the browser are treated as closed.
    pub fn associate_tabs(
        &mut self,
        browser: &dyn LocalBrowser,
        tabs: &[TabId],
    ) -> Result<(), AssociationError> {
        if self.local_header_node.is_none() {
            return Err(AssociationError::NotAssociated);
        }

        for &tab_id in tabs {
            match find_tab(browser, tab_id) {
                Some(tab) => self.associate_tab(browser, tab)?,
                None => self.release_tab_link(tab_id),
            }
        }
        self.associate_windows(browser, false)
    }

    /// Write one local tab to its node, checking one out if needed.
    ///
    /// A closing tab gives its node back; an ineligible tab is skipped.
    pub fn associate_tab(
        &mut self,
        browser: &dyn LocalBrowser,
        tab: &dyn SyncedTab,
    ) -> Result<(), AssociationError> {
        let tab_id = tab.session_id();
        if tab.is_being_destroyed() {
            self.release_tab_link(tab_id);
            return Ok(());
        }

        if !self.is_valid_tab(browser, tab) {
            tracing::debug!("Tab {} is not valid", tab_id);
            return Ok(());
        }

        let node_id = match self.tab_links.get(&tab_id) {
            Some(link) => link.node_id,
            None => {
                let node_id = self.tab_pool.checkout(&self.store)?;
                self.tab_links.insert(tab_id, TabLink::new(node_id));
                node_id
            }
        };

        tracing::debug!("Reloading tab {} from window {}", tab_id, tab.window_id());
        self.write_tab_contents(browser, tab, node_id)
    }

    fn release_tab_link(&mut self, tab_id: TabId) {
        let Some(link) = self.tab_links.remove(&tab_id) else {
            return;
        };
        tracing::debug!("Releasing tab node {} of closed tab {}", link.node_id, tab_id);
        self.tab_pool.release(link.node_id);
        self.favicon_loader.cancel(tab_id);
    }

    /// Whether `tab` should be synced at all.
    pub fn is_valid_tab(&self, browser: &dyn LocalBrowser, tab: &dyn SyncedTab) -> bool {
        let setup_for_test = self.config.session.setup_for_test;
        if !setup_for_test && tab.profile() != self.config.session.profile {
            return false;
        }
        if !setup_for_test && browser.find_window(tab.window_id()).is_none() {
            return false;
        }
        tab_has_valid_entry(tab)
    }

    fn write_tab_contents(
        &mut self,
        browser: &dyn LocalBrowser,
        tab: &dyn SyncedTab,
        node_id: NodeId,
    ) -> Result<(), AssociationError> {
        let machine_tag = self.require_machine_tag()?;
        let tab_id = tab.session_id();
        let window = browser.find_window(tab.window_id());

        let current_index = match tab.pending_entry_index() {
            pending if pending >= 0 => pending,
            _ => tab.current_entry_index(),
        };
        let current = usize::try_from(current_index).ok();

        let mut specifics = TabSpecifics::new(tab_id, tab.window_id());
        specifics.tab_visual_index = window
            .and_then(|w| tab_position(w, tab_id))
            .and_then(|position| i32::try_from(position).ok());
        specifics.pinned = window.is_some_and(|w| w.is_tab_pinned(tab_id));
        specifics.extension_app_id = tab.extension_app_id().map(String::from);

        let mut current_url = None;
        for index in navigation_window(current_index, tab.entry_count()) {
            let Some(entry) = entry_for_index(tab, index) else {
                continue;
            };
            if !is_valid_url(&entry.virtual_url) {
                continue;
            }
            if current == Some(index) {
                specifics.current_navigation_index =
                    i32::try_from(specifics.navigations.len()).unwrap_or(i32::MAX);
                current_url = canonical_url(&entry.virtual_url);
            }
            let position = i32::try_from(index).unwrap_or(i32::MAX);
            specifics
                .navigations
                .push(navigation_to_specifics(&entry.to_tab_navigation(position)));
        }

        let now = SystemTime::now();
        apply_tab_specifics(
            self.tracker.get_or_create_tab(&machine_tag, tab_id),
            &specifics,
            now,
        );
        self.tracker.get_or_create_session(&machine_tag).touch(now);

        let mut url_changed = false;
        let mut preserve_favicon = false;
        if let Some(link) = self.tab_links.get_mut(&tab_id) {
            match current_url {
                Some(url) if link.url != url => {
                    tracing::debug!("Tab {} now at {}", tab_id, url);
                    link.url = url;
                    url_changed = true;
                }
                _ => preserve_favicon = !link.url.is_empty(),
            }
        }
        if url_changed {
            self.load_favicon_for_tab(tab_id);
        }

        let result = self.store.write_transaction(|trans| -> Result<(), StoreError> {
            if preserve_favicon {
                let existing = trans.specifics(node_id)?;
                if let Some(old) = existing.as_tab() {
                    specifics.favicon = old.favicon.clone();
                    specifics.favicon_source = old.favicon_source.clone();
                    specifics.favicon_type = old.favicon_type;
                }
            }
            trans.set_specifics(node_id, &SessionSpecifics::tab(machine_tag.as_str(), specifics))
        });
        if let Err(StoreError::NodeNotFound(_)) = &result {
            tracing::error!(
                "Local tab node {} missing, reassociation needed",
                node_id
            );
        }
        Ok(result?)
    }

    // ===========================================
    // Favicons
    // ===========================================

    fn load_favicon_for_tab(&mut self, tab_id: TabId) {
        if !self.config.favicons.enabled {
            return;
        }
        let Some(link) = self.tab_links.get_mut(&tab_id) else {
            return;
        };
        tracing::debug!("Triggering favicon load for {}", link.url);
        link.favicon_request = self.favicon_loader.request(tab_id, &link.url);
    }

    /// Wait for the next favicon fetch to finish.
    ///
    /// Pending forever when nothing is in flight; use it in a `select!`.
    pub async fn next_favicon_load(&mut self) -> Option<FaviconLoad> {
        self.favicon_loader.next().await
    }

    /// Apply every favicon fetch that has already finished.
    ///
    /// Returns the number of favicons written.
    pub fn pump_favicon_loads(&mut self) -> Result<usize, AssociationError> {
        let mut written = 0;
        while let Some(load) = self.favicon_loader.try_next() {
            if self.apply_favicon_load(load)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Write a finished favicon fetch into its tab's node.
    ///
    /// Returns false when the completion was dropped: the tab is gone, a
    /// newer request superseded it, the fetch failed or the image is empty.
    /// A failed fetch stays outstanding for [`favicons_updated`](Self::favicons_updated).
    pub fn apply_favicon_load(&mut self, load: FaviconLoad) -> Result<bool, AssociationError> {
        let Some(link) = self.tab_links.get_mut(&load.tab_id) else {
            tracing::debug!("Dropping favicon for untracked tab {}", load.tab_id);
            return Ok(false);
        };
        if link.favicon_request != Some(load.request_id) {
            tracing::debug!("Dropping stale favicon load for tab {}", load.tab_id);
            return Ok(false);
        }

        let image = match load.result {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!("Favicon for {} not loaded: {}", load.page_url, e);
                return Ok(false);
            }
        };
        link.favicon_request = None;
        if image.data.is_empty() {
            tracing::warn!("Favicon for {} is empty, not syncing it", load.page_url);
            return Ok(false);
        }

        let node_id = link.node_id;
        let written = self.store.write_transaction(|trans| {
            let mut specifics = trans.specifics(node_id)?;
            let Some(tab) = specifics.as_tab_mut() else {
                return Ok::<_, StoreError>(false);
            };
            tab.favicon = Some(image.data);
            tab.favicon_source = Some(image.icon_url);
            tab.favicon_type = Some(FaviconType::WebFavicon);
            trans.set_specifics(node_id, &specifics)?;
            Ok(true)
        })?;

        if written {
            tracing::debug!("Wrote favicon for tab {} ({})", load.tab_id, load.page_url);
        } else {
            tracing::warn!("Tab node {} holds no tab record, favicon dropped", node_id);
        }
        Ok(written)
    }

    /// Retry favicon loads for tabs at `urls` that are still waiting for one.
    ///
    /// Returns the number of fetches started.
    pub fn favicons_updated(&mut self, urls: &[String]) -> usize {
        if !self.config.favicons.enabled {
            return 0;
        }
        let urls: HashSet<String> = urls
            .iter()
            .map(|url| canonical_url(url).unwrap_or_else(|| url.clone()))
            .collect();
        let waiting: Vec<TabId> = self
            .tab_links
            .iter()
            .filter(|(_, link)| link.favicon_request.is_some() && urls.contains(&link.url))
            .map(|(tab_id, _)| *tab_id)
            .collect();
        for tab_id in &waiting {
            self.load_favicon_for_tab(*tab_id);
        }
        waiting.len()
    }

    /// Record the favicon carried by a foreign tab record.
    ///
    /// Returns the source a use was recorded for.
    fn load_foreign_tab_favicon(&mut self, tab: &TabSpecifics) -> Option<String> {
        if !self.config.favicons.enabled {
            return None;
        }
        let data = tab.favicon.as_ref().filter(|data| !data.is_empty())?;
        if tab.favicon_type != Some(FaviconType::WebFavicon) {
            tracing::debug!("Ignoring favicon of unknown type for tab {}", tab.tab_id);
            return None;
        }
        let page_url = canonical_url(&tab.selected_navigation()?.virtual_url)?;
        let source = tab.favicon_source.as_deref().and_then(canonical_url)?;
        self.favicons.record_usage(&page_url, &source, data.clone());
        Some(source)
    }

    /// Favicon bytes synced from another device for `page_url`.
    pub fn synced_favicon_for_page_url(&self, page_url: &str) -> Option<&[u8]> {
        let page_url = canonical_url(page_url)?;
        self.favicons.favicon_for_page(&page_url)
    }

    /// Number of distinct synced favicons.
    pub fn num_favicons(&self) -> usize {
        self.favicons.len()
    }

    // ===========================================
    // Foreign sessions
    // ===========================================

    /// Merge one foreign record into the session tree.
    ///
    /// Returns false, without touching the tree, for a record carrying the
    /// local machine tag unless set up for test.
    ///
    /// # Errors
    ///
    /// A record with neither header nor tab is a protocol violation.
    pub fn associate_foreign_specifics(
        &mut self,
        specifics: &SessionSpecifics,
        modified: SystemTime,
    ) -> Result<bool, AssociationError> {
        let tag = specifics.session_tag.as_str();
        if self.current_machine_tag.as_deref() == Some(tag) && !self.config.session.setup_for_test {
            tracing::warn!("Ignoring local record {} passed as foreign", tag);
            return Ok(false);
        }
        match specifics.require_body()? {
            SpecificsBody::Header(header) => {
                tracing::debug!(
                    "Updating foreign session {} ({} windows)",
                    tag,
                    header.windows.len()
                );
                populate_session_header(&mut self.tracker, tag, header, modified);
            }
            SpecificsBody::Tab(tab) => {
                let previous_source = self
                    .tracker
                    .lookup_session_tab(tag, tab.tab_id)
                    .and_then(|tab| tab.favicon_source.clone());

                apply_tab_specifics(self.tracker.get_or_create_tab(tag, tab.tab_id), tab, modified);
                let recorded = self.load_foreign_tab_favicon(tab);
                self.tracker.get_or_create_tab(tag, tab.tab_id).favicon_source = recorded;
                if let Some(source) = previous_source {
                    self.favicons.release_source(&source);
                }
                self.tracker.get_or_create_session(tag).touch(modified);
            }
        }
        Ok(true)
    }

    /// Apply a batch of foreign changes from the store.
    ///
    /// Records carrying the local tag are skipped.
    pub fn process_remote_changes(&mut self, changes: &[RemoteChange]) -> Result<(), AssociationError> {
        if !self.state.is_associated() {
            return Err(AssociationError::NotAssociated);
        }
        let machine_tag = self.require_machine_tag()?;

        let mut changed = false;
        for change in changes {
            match change {
                RemoteChange::Updated(id) => {
                    let (specifics, modified) = self.store.read_transaction(|trans| {
                        Ok::<_, StoreError>((trans.specifics(*id)?, trans.modification_time(*id)?))
                    })?;
                    if specifics.session_tag == machine_tag {
                        tracing::debug!("Skipping change to local node {}", id);
                        continue;
                    }
                    changed |= self.associate_foreign_specifics(&specifics, modified)?;
                }
                RemoteChange::Deleted { session_tag } => {
                    if *session_tag == machine_tag {
                        tracing::warn!(
                            "Local session deleted remotely, rewritten on next local change"
                        );
                        continue;
                    }
                    changed |= self.disassociate_foreign_session(session_tag);
                }
            }
        }

        if changed {
            self.events.emit(SessionEvent::ForeignSessionUpdated);
        }
        Ok(())
    }

    /// Drop a foreign session from the tree without touching the store.
    ///
    /// Returns false for the local session or an unknown tag.
    pub fn disassociate_foreign_session(&mut self, tag: &str) -> bool {
        if self.current_machine_tag.as_deref() == Some(tag) {
            tracing::warn!("Refusing to disassociate the local session");
            return false;
        }
        let sources: Vec<String> = self
            .tracker
            .lookup_session(tag)
            .map(|session| {
                session
                    .tabs
                    .values()
                    .filter_map(|tab| tab.favicon_source.clone())
                    .collect()
            })
            .unwrap_or_default();
        for source in &sources {
            self.favicons.release_source(source);
        }
        self.tracker.delete_session(tag)
    }

    /// Delete a foreign session from the tree and every one of its nodes.
    ///
    /// Returns the number of nodes removed. The local session is never
    /// deleted.
    pub fn delete_foreign_session(&mut self, tag: &str) -> Result<usize, AssociationError> {
        if self.current_machine_tag.as_deref() == Some(tag) {
            tracing::warn!("Attempting to delete the local session, ignoring");
            return Ok(0);
        }

        self.disassociate_foreign_session(tag);
        let removed = self
            .store
            .write_transaction(|trans| -> Result<usize, AssociationError> {
                let Some(root) = trans.root_by_tag(SESSIONS_ROOT_TAG) else {
                    return Err(AssociationError::MissingRoot);
                };
                let mut removed = 0;
                for id in children(&*trans, root)? {
                    if trans.specifics(id)?.session_tag == tag {
                        trans.remove(id)?;
                        removed += 1;
                    }
                }
                Ok(removed)
            })?;

        tracing::info!("Deleted foreign session {} ({} nodes)", tag, removed);
        self.events.emit(SessionEvent::ForeignSessionDeleted {
            tag: tag.to_string(),
        });
        Ok(removed)
    }

    /// Delete foreign sessions older than the stale threshold.
    ///
    /// Returns the number of sessions deleted.
    pub fn delete_stale_sessions(&mut self) -> Result<usize, AssociationError> {
        self.delete_stale_sessions_at(SystemTime::now())
    }

    /// [`delete_stale_sessions`](Self::delete_stale_sessions) as of `now`.
    ///
    /// Sessions modified in the future are kept.
    pub fn delete_stale_sessions_at(&mut self, now: SystemTime) -> Result<usize, AssociationError> {
        let threshold = u64::from(self.stale_session_threshold_days);
        let stale: Vec<(String, u64)> = self
            .tracker
            .lookup_all_foreign_sessions()
            .into_iter()
            .filter_map(|session| {
                let age = now.duration_since(session.modified_time).ok()?;
                let days = age.as_secs() / SECONDS_PER_DAY;
                (days > 0 && days > threshold).then(|| (session.session_tag.clone(), days))
            })
            .collect();

        for (tag, days) in &stale {
            tracing::info!("Found stale session {} with age {} days, deleting", tag, days);
            self.delete_foreign_session(tag)?;
        }
        Ok(stale.len())
    }

    /// Set the age in days after which foreign sessions are stale.
    ///
    /// Zero is rejected.
    pub fn set_stale_session_threshold(&mut self, days: u32) {
        if days == 0 {
            tracing::warn!("Attempted to set an invalid stale session threshold of 0 days");
            return;
        }
        self.stale_session_threshold_days = days;
    }

    /// Age in days after which foreign sessions are stale.
    pub fn stale_session_threshold(&self) -> u32 {
        self.stale_session_threshold_days
    }

    /// Stale threshold as a duration.
    pub fn stale_session_threshold_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.stale_session_threshold_days) * SECONDS_PER_DAY)
    }

    /// Ask hosts to fetch fresh session data from the server.
    pub fn attempt_sessions_data_refresh(&self) {
        tracing::debug!("Requesting sessions data refresh");
        self.events.emit(SessionEvent::SyncRefreshRequested);
    }

    // ===========================================
    // Queries
    // ===========================================

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Lifecycle state.
    pub fn state(&self) -> AssociationState {
        self.state
    }

    /// Tag of the local session, once chosen.
    pub fn current_machine_tag(&self) -> Option<&str> {
        self.current_machine_tag.as_deref()
    }

    /// Display name of the local session, once known.
    pub fn current_session_name(&self) -> Option<&str> {
        self.current_session_name.as_deref()
    }

    /// The tab node pool.
    pub fn tab_pool(&self) -> &TabNodePool {
        &self.tab_pool
    }

    /// The store this associator writes to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Node holding the record of local tab `tab_id`.
    pub fn tab_node(&self, tab_id: TabId) -> Option<NodeId> {
        self.tab_links.get(&tab_id).map(|link| link.node_id)
    }

    /// The local session as last written.
    pub fn get_local_session(&self) -> Option<&SyncedSession> {
        self.tracker.lookup_session(self.current_machine_tag.as_deref()?)
    }

    /// Every foreign session with at least one window.
    pub fn get_all_foreign_sessions(&self) -> Vec<&SyncedSession> {
        self.tracker.lookup_all_foreign_sessions()
    }

    /// Windows of foreign session `tag`.
    pub fn get_foreign_session(&self, tag: &str) -> Option<Vec<&SessionWindow>> {
        if self.current_machine_tag.as_deref() == Some(tag) {
            return None;
        }
        self.tracker.lookup_session_windows(tag)
    }

    /// Tab `tab_id` of foreign session `tag`.
    pub fn get_foreign_tab(&self, tag: &str, tab_id: TabId) -> Option<&SessionTab> {
        if self.current_machine_tag.as_deref() == Some(tag) {
            return None;
        }
        self.tracker.lookup_session_tab(tag, tab_id)
    }

    /// Whether the sessions root has any children.
    pub fn sync_model_has_user_created_nodes(&self) -> Result<bool, AssociationError> {
        self.store.read_transaction(|trans| {
            let root = trans
                .root_by_tag(SESSIONS_ROOT_TAG)
                .ok_or(AssociationError::MissingRoot)?;
            Ok(trans.first_child(root)?.is_some())
        })
    }

    /// Node created with client tag `tag`.
    pub fn sync_id_from_session_tag(&self, tag: &str) -> Option<NodeId> {
        self.store
            .read_transaction(|trans| trans.lookup_by_client_tag(tag))
    }

    /// Node of local tab node number `index`.
    pub fn sync_id_from_tab_node_index(&self, index: usize) -> Option<NodeId> {
        let tag = tab_node_tag(self.current_machine_tag.as_deref()?, index);
        self.sync_id_from_session_tag(&tag)
    }
}

impl<S: SyncStore> std::fmt::Debug for SessionAssociator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAssociator")
            .field("state", &self.state)
            .field("machine_tag", &self.current_machine_tag)
            .field("tab_links", &self.tab_links.len())
            .field("tab_pool", &self.tab_pool)
            .finish_non_exhaustive()
    }
}

fn host_session_name() -> String {
    sysinfo::System::host_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_SESSION_NAME.to_string())
}
