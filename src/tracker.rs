use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::model::{Bookmark, ChapterRef, LastRead, Manga, UiMessage};
use crate::sources::Registry;
use crate::store::Store;
use crate::sync::{self, SyncOutcome};

/// Drives extractors and the store on behalf of the user: bookmarking,
/// read progress and the periodic refresh pass.
pub struct Tracker {
    registry: Registry,
    store: Arc<dyn Store>,
}

#[derive(Debug, Clone)]
pub struct BookmarkEntry {
    pub bookmark: Bookmark,
    pub manga: Option<Manga>,
    pub up_to_date: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshStatus {
    Synced { count: i64, outcome: SyncOutcome },
    /// The stored record was left untouched.
    Failed { kind: &'static str, message: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRefresh {
    pub key: String,
    pub status: RefreshStatus,
}

#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    /// Sorted by key.
    pub series: Vec<SeriesRefresh>,
    pub messages: Vec<UiMessage>,
    pub new_chapters: u32,
}

impl RefreshReport {
    pub fn failures(&self) -> usize {
        self.series
            .iter()
            .filter(|s| matches!(s.status, RefreshStatus::Failed { .. }))
            .count()
    }
}

impl Tracker {
    pub fn new(registry: Registry, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Starts tracking the series at `url`.
    ///
    /// `last_read` comes from `read_url` when it names a chapter, else the
    /// latest chapter. An existing bookmark for the same series is replaced.
    pub async fn bookmark(&self, url: &str, read_url: Option<&str>) -> anyhow::Result<Bookmark> {
        let (extractor, series) = self
            .registry
            .find_for_url(url)
            .ok_or_else(|| anyhow::anyhow!("no source recognizes url: {url}"))?;

        let manga = extractor
            .manga_info(url)
            .await
            .with_context(|| format!("retrieve manga info: {}", series.url))?;

        let read_from = read_url.unwrap_or(url);
        let chapter = match manga.latest_chapter() {
            Some(latest) => extractor.chapter_reference_or(read_from, ChapterRef::new(&latest.id)),
            None => extractor
                .chapter_reference(read_from)
                .ok_or_else(|| anyhow::anyhow!("{} has no chapters to mark as read", manga.key()))?,
        };

        let bookmark = Bookmark {
            source: manga.source.clone(),
            reference: manga.reference.clone(),
            last_read: LastRead {
                chapter,
                date: Utc::now(),
            },
        };

        self.store.put_manga(&manga).await.context("save manga")?;

        let mut bookmarks = self.store.get_bookmarks().await.context("load bookmarks")?;
        match bookmarks.iter_mut().find(|b| b.key() == bookmark.key()) {
            Some(existing) => *existing = bookmark.clone(),
            None => bookmarks.push(bookmark.clone()),
        }
        self.store
            .put_bookmarks(&bookmarks)
            .await
            .context("save bookmarks")?;

        tracing::info!(
            source = %bookmark.source,
            reference = %bookmark.reference,
            last_read = %bookmark.last_read.chapter.id,
            "bookmarked"
        );
        Ok(bookmark)
    }

    /// Stops tracking the series at `url` and drops its manga record.
    pub async fn unbookmark(&self, url: &str) -> anyhow::Result<bool> {
        let (extractor, series) = self
            .registry
            .find_for_url(url)
            .ok_or_else(|| anyhow::anyhow!("no source recognizes url: {url}"))?;
        let source = extractor.key();

        let mut bookmarks = self.store.get_bookmarks().await.context("load bookmarks")?;
        let before = bookmarks.len();
        bookmarks.retain(|b| !(b.source == source && b.reference == series.reference));
        let removed = bookmarks.len() != before;

        if removed {
            self.store
                .put_bookmarks(&bookmarks)
                .await
                .context("save bookmarks")?;
        }
        let removed_manga = self
            .store
            .remove_manga(source, &series.reference)
            .await
            .context("remove manga")?;

        tracing::info!(source, reference = %series.reference, removed, "unbookmarked");
        Ok(removed || removed_manga)
    }

    /// Records `chapter_url` as the last chapter read of the bookmarked series it belongs to.
    pub async fn mark_read(&self, chapter_url: &str) -> anyhow::Result<Option<UiMessage>> {
        let Some((extractor, reference)) = self.registry.find_series_reference(chapter_url) else {
            tracing::debug!(url = chapter_url, "no source recognizes chapter url");
            return Ok(None);
        };
        let Some(chapter) = extractor.chapter_reference(chapter_url) else {
            tracing::debug!(url = chapter_url, "no chapter in url");
            return Ok(None);
        };
        let source = extractor.key();

        let mut bookmarks = self.store.get_bookmarks().await.context("load bookmarks")?;
        let Some(index) = bookmarks
            .iter()
            .position(|b| b.source == source && b.reference == reference)
        else {
            tracing::debug!(source, %reference, "no bookmarked series for chapter url");
            return Ok(None);
        };

        let bookmark = &mut bookmarks[index];
        bookmark.last_read = LastRead {
            chapter,
            date: Utc::now(),
        };
        let bookmark = bookmark.clone();
        self.store
            .put_bookmarks(&bookmarks)
            .await
            .context("save bookmarks")?;

        tracing::info!(
            source = %bookmark.source,
            reference = %bookmark.reference,
            chapter = %bookmark.last_read.chapter.id,
            "marked chapter as read"
        );
        Ok(Some(UiMessage::UpdateCurrentChapter { bookmark }))
    }

    /// Bookmarks with their manga and derived up-to-date flag.
    /// Viewing the list clears the unread badge.
    pub async fn list(&self) -> anyhow::Result<Vec<BookmarkEntry>> {
        let bookmarks = self.store.get_bookmarks().await.context("load bookmarks")?;

        let mut entries = Vec::with_capacity(bookmarks.len());
        for bookmark in bookmarks {
            let manga = self
                .store
                .get_manga(&bookmark.source, &bookmark.reference)
                .await
                .with_context(|| format!("load manga: {}", bookmark.key()))?;
            let up_to_date = manga
                .as_ref()
                .is_some_and(|manga| sync::is_up_to_date(&bookmark, manga));
            entries.push(BookmarkEntry {
                bookmark,
                manga,
                up_to_date,
            });
        }

        if self.store.get_badge_count().await.context("load badge")? > 0 {
            self.store.put_badge_count(0).await.context("reset badge")?;
        }

        Ok(entries)
    }

    /// Refreshes every bookmarked series once.
    ///
    /// Each series runs in its own task, at most `concurrency` at a time. A
    /// failed refresh keeps the stored record; only successes are persisted.
    pub async fn refresh_all(&self, concurrency: usize) -> anyhow::Result<RefreshReport> {
        let bookmarks = self.store.get_bookmarks().await.context("load bookmarks")?;
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();
        for bookmark in bookmarks {
            if !seen.insert(bookmark.key()) {
                continue;
            }
            let semaphore = Arc::clone(&semaphore);
            let registry = self.registry.clone();
            let store = Arc::clone(&self.store);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("refresh semaphore is closed");
                refresh_one(&registry, store.as_ref(), bookmark).await
            });
        }

        let mut report = RefreshReport::default();
        while let Some(joined) = tasks.join_next().await {
            let (series, message) = joined.context("join refresh task")?;
            if let RefreshStatus::Synced { count, .. } = &series.status {
                report.new_chapters = report
                    .new_chapters
                    .saturating_add(u32::try_from((*count).max(0)).unwrap_or(u32::MAX));
            }
            report.series.push(series);
            report.messages.extend(message);
        }
        report.series.sort_by(|a, b| a.key.cmp(&b.key));

        if report.new_chapters > 0 {
            let badge = self.store.get_badge_count().await.context("load badge")?;
            self.store
                .put_badge_count(badge.saturating_add(report.new_chapters))
                .await
                .context("save badge")?;
        }

        tracing::info!(
            series = report.series.len(),
            new_chapters = report.new_chapters,
            failures = report.failures(),
            "refresh pass finished"
        );
        Ok(report)
    }
}

async fn refresh_one(
    registry: &Registry,
    store: &dyn Store,
    bookmark: Bookmark,
) -> (SeriesRefresh, Option<UiMessage>) {
    let key = bookmark.key();
    let done = |status| SeriesRefresh {
        key: key.clone(),
        status,
    };

    let manga = match store.get_manga(&bookmark.source, &bookmark.reference).await {
        Ok(Some(manga)) => manga,
        Ok(None) => {
            let reason = "no stored manga record".to_owned();
            return (done(RefreshStatus::Skipped { reason }), None);
        }
        Err(err) => {
            tracing::warn!(key, ?err, "could not load manga");
            let message = format!("{err:#}");
            return (done(RefreshStatus::Failed { kind: "store", message }), None);
        }
    };

    let Some(extractor) = registry.get(&manga.source) else {
        let reason = format!("no extractor registered for {}", manga.source);
        return (done(RefreshStatus::Skipped { reason }), None);
    };

    let update = match extractor.update_chapters(&manga).await {
        Ok(update) => update,
        Err(err) => {
            let kind = err.kind();
            let message = format!("{:#}", anyhow::Error::from(err));
            tracing::warn!(key, kind, error = %message, "refresh failed; keeping stored record");
            return (done(RefreshStatus::Failed { kind, message }), None);
        }
    };

    let report = sync::apply_update(&manga, update, Utc::now());
    if let Err(err) = store.put_manga(&report.manga).await {
        tracing::warn!(key, ?err, "could not save refreshed manga");
        let message = format!("{err:#}");
        return (done(RefreshStatus::Failed { kind: "store", message }), None);
    }

    match &report.outcome {
        SyncOutcome::Unchanged => tracing::debug!(key, "no new chapters"),
        SyncOutcome::Appended { new_chapters } => {
            tracing::info!(key, count = new_chapters.len(), "new chapters");
        }
        SyncOutcome::Shrunk { removed } => {
            tracing::warn!(key, removed, "source chapter list shrank; a full resync may be needed");
        }
    }

    let message = (report.count != 0).then(|| UiMessage::UpdateChapterList {
        bookmark,
        chapter_list: report.manga.chapter_list.clone(),
    });

    let status = RefreshStatus::Synced {
        count: report.count,
        outcome: report.outcome,
    };
    (done(status), message)
}
