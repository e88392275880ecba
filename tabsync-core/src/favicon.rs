//! Reference-counted cache of favicons seen in foreign tabs.
//!
//! Two maps are kept in step:
//! - favicon source URL → image bytes and usage count
//! - page URL → favicon source URL
//!
//! An entry exists only while its usage count is positive, and no page maps
//! to a source that has no entry.

use std::collections::HashMap;

/// Cached favicon bytes and the number of tabs using them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaviconInfo {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Number of foreign tabs currently showing this favicon.
    pub usage_count: u32,
}

/// Favicon reference cache.
#[derive(Debug, Default)]
pub struct FaviconCache {
    favicons: HashMap<String, FaviconInfo>,
    pages: HashMap<String, String>,
}

impl FaviconCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `page_url` shows the favicon at `favicon_url`.
    ///
    /// Overwrites the bytes and increments the count of an existing entry,
    /// or inserts one with count 1. When a tab moves between pages, record
    /// the new page before releasing the old one so a shared favicon never
    /// drops to zero in between.
    pub fn record_usage(&mut self, page_url: &str, favicon_url: &str, data: Vec<u8>) {
        match self.favicons.get_mut(favicon_url) {
            Some(info) => {
                info.data = data;
                info.usage_count = info.usage_count.saturating_add(1);
            }
            None => {
                self.favicons.insert(
                    favicon_url.to_string(),
                    FaviconInfo {
                        data,
                        usage_count: 1,
                    },
                );
            }
        }
        self.pages
            .insert(page_url.to_string(), favicon_url.to_string());
    }

    /// Release one use of the favicon currently mapped from `page_url`.
    pub fn release_usage(&mut self, page_url: &str) {
        if let Some(source) = self.pages.get(page_url).cloned() {
            self.release_source(&source);
        }
    }

    /// Release one use of the favicon at `favicon_url`.
    ///
    /// At zero the entry and every page mapping to it are erased.
    pub fn release_source(&mut self, favicon_url: &str) {
        let Some(info) = self.favicons.get_mut(favicon_url) else {
            return;
        };
        info.usage_count = info.usage_count.saturating_sub(1);
        if info.usage_count == 0 {
            self.favicons.remove(favicon_url);
            self.pages.retain(|_, source| source != favicon_url);
            tracing::debug!("Dropped synced favicon {}", favicon_url);
        }
    }

    /// Favicon bytes for `page_url`.
    pub fn favicon_for_page(&self, page_url: &str) -> Option<&[u8]> {
        let source = self.pages.get(page_url)?;
        self.favicons.get(source).map(|info| info.data.as_slice())
    }

    /// Favicon source URL mapped from `page_url`.
    pub fn source_for_page(&self, page_url: &str) -> Option<&str> {
        self.pages.get(page_url).map(String::as_str)
    }

    /// Usage count of `favicon_url` (0 if absent).
    pub fn usage_count(&self, favicon_url: &str) -> u32 {
        self.favicons.get(favicon_url).map_or(0, |info| info.usage_count)
    }

    /// Number of distinct favicons cached.
    pub fn len(&self) -> usize {
        self.favicons.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.favicons.is_empty()
    }

    /// Drop every favicon and page mapping.
    pub fn clear(&mut self) {
        self.favicons.clear();
        self.pages.clear();
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (page, source) in &self.pages {
            assert!(
                self.favicons.contains_key(source),
                "page {} maps to missing favicon {}",
                page,
                source
            );
        }
        for (source, info) in &self.favicons {
            assert!(info.usage_count > 0, "favicon {} has zero uses", source);
        }
    }
}
