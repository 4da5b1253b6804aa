use chrono::{DateTime, Utc};

use crate::model::{Bookmark, Chapter, ChapterUpdate, Manga};

/// Signed difference in chapter count, `fresh - stale`.
pub fn chapter_delta(stale: &Manga, fresh: &[Chapter]) -> i64 {
    len_i64(fresh.len()) - len_i64(stale.chapter_list.len())
}

fn len_i64(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

/// Whether the bookmark points at the latest chapter. Always derived, never stored.
pub fn is_up_to_date(bookmark: &Bookmark, manga: &Manga) -> bool {
    manga
        .latest_chapter()
        .is_some_and(|latest| latest.id == bookmark.last_read.chapter.id)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Unchanged,
    Appended { new_chapters: Vec<Chapter> },
    /// The source lists fewer chapters than before.
    Shrunk { removed: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub manga: Manga,
    pub count: i64,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    pub fn has_new_chapters(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Appended { .. })
    }

    pub fn badge_increment(&self) -> u32 {
        u32::try_from(self.count.max(0)).unwrap_or(u32::MAX)
    }
}

/// Applies a chapter update to a stored manga.
///
/// Identity fields are carried over from `stale`; only the chapter list and
/// `last_update` change.
pub fn apply_update(stale: &Manga, update: ChapterUpdate, now: DateTime<Utc>) -> SyncReport {
    let ChapterUpdate {
        count,
        chapter_list,
    } = update;

    let outcome = match count {
        0 => SyncOutcome::Unchanged,
        n if n > 0 => {
            let skip = chapter_list
                .len()
                .saturating_sub(usize::try_from(n).unwrap_or(usize::MAX));
            SyncOutcome::Appended {
                new_chapters: chapter_list[skip..].to_vec(),
            }
        }
        n => SyncOutcome::Shrunk {
            removed: n.unsigned_abs(),
        },
    };

    let manga = Manga {
        chapter_list,
        last_update: now,
        ..stale.clone()
    };

    SyncReport {
        manga,
        count,
        outcome,
    }
}
