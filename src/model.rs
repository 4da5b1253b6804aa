use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub name: String,
    pub url: Url,
}

/// A chapter identified only by its source-local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub id: String,
}

impl ChapterRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub sid: String,
    pub name: String,
    pub source: String,
    pub reference: String,
    pub url: Url,
    pub cover: String,
    pub last_update: DateTime<Utc>,
    /// Oldest first, in the order the source emits them.
    pub chapter_list: Vec<Chapter>,
}

impl Manga {
    pub fn key(&self) -> String {
        manga_key(&self.source, &self.reference)
    }

    pub fn latest_chapter(&self) -> Option<&Chapter> {
        self.chapter_list.last()
    }
}

/// Store key of a series: `<source>/<reference>`.
pub fn manga_key(source: &str, reference: &str) -> String {
    format!("{source}/{reference}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRead {
    pub chapter: ChapterRef,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub source: String,
    pub reference: String,
    pub last_read: LastRead,
}

impl Bookmark {
    pub fn key(&self) -> String {
        manga_key(&self.source, &self.reference)
    }

    pub fn is_for(&self, manga: &Manga) -> bool {
        self.source == manga.source && self.reference == manga.reference
    }
}

/// Result of re-reading a series' chapter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterUpdate {
    /// `chapter_list.len() - stale.chapter_list.len()`; negative when the source shrank.
    pub count: i64,
    pub chapter_list: Vec<Chapter>,
}

/// Update pushed to whatever renders the bookmark list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiMessage {
    UpdateCurrentChapter {
        bookmark: Bookmark,
    },
    #[serde(rename_all = "camelCase")]
    UpdateChapterList {
        bookmark: Bookmark,
        chapter_list: Vec<Chapter>,
    },
}
