use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::fetch::Fetcher;
use crate::model::{ChapterRef, ChapterUpdate, Manga};

pub mod mangahere;

/// A series page recognized by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRef {
    pub reference: String,
    /// Canonical series URL, scheme included, query and fragment dropped.
    pub url: String,
}

/// Per-site extraction logic. Every source exposes the same four operations
/// so callers can dispatch on the source key alone.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Stable key stored as `Manga::source`.
    fn key(&self) -> &'static str;

    /// Matches canonical series pages only.
    fn recognize(&self, url: &str) -> Option<SeriesRef>;

    /// Series reference of any page under a series, reader pages included.
    fn series_reference(&self, url: &str) -> Option<String> {
        self.recognize(url).map(|series| series.reference)
    }

    /// Chapter embedded in `url`, without any network access.
    fn chapter_reference(&self, url: &str) -> Option<ChapterRef>;

    fn chapter_reference_or(&self, url: &str, default: ChapterRef) -> ChapterRef {
        self.chapter_reference(url).unwrap_or(default)
    }

    async fn manga_info(&self, url: &str) -> Result<Manga, SourceError>;

    async fn update_chapters(&self, manga: &Manga) -> Result<ChapterUpdate, SourceError>;
}

/// Source key to extractor lookup.
#[derive(Clone, Default)]
pub struct Registry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(fetcher: Arc<dyn Fetcher>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(mangahere::MangaHere::new(fetcher)));
        registry
    }

    /// Replaces any extractor already registered under the same key.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors
            .retain(|existing| existing.key() != extractor.key());
        self.extractors.push(extractor);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors
            .iter()
            .find(|extractor| extractor.key() == key)
            .cloned()
    }

    pub fn find_for_url(&self, url: &str) -> Option<(Arc<dyn Extractor>, SeriesRef)> {
        self.extractors.iter().find_map(|extractor| {
            extractor
                .recognize(url)
                .map(|series| (Arc::clone(extractor), series))
        })
    }

    /// Like [`Registry::find_for_url`], but also matches chapter pages.
    pub fn find_series_reference(&self, url: &str) -> Option<(Arc<dyn Extractor>, String)> {
        self.extractors.iter().find_map(|extractor| {
            extractor
                .series_reference(url)
                .map(|reference| (Arc::clone(extractor), reference))
        })
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|extractor| extractor.key()).collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.keys())
            .finish()
    }
}
