use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::model::{Bookmark, Manga};

/// Persistence for manga records, bookmarks and the unread badge.
///
/// Writes are last-writer-wins; callers serialize refreshes per series.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_manga(&self, source: &str, reference: &str) -> anyhow::Result<Option<Manga>>;
    async fn put_manga(&self, manga: &Manga) -> anyhow::Result<()>;
    async fn remove_manga(&self, source: &str, reference: &str) -> anyhow::Result<bool>;

    async fn get_bookmarks(&self) -> anyhow::Result<Vec<Bookmark>>;
    async fn put_bookmarks(&self, bookmarks: &[Bookmark]) -> anyhow::Result<()>;

    async fn get_badge_count(&self) -> anyhow::Result<u32>;
    async fn put_badge_count(&self, count: u32) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct State {
    badge_count: u32,
}

#[derive(Debug, Clone)]
pub struct LocalFsStore {
    base_dir: PathBuf,
}

impl LocalFsStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn manga_path(&self, source: &str, reference: &str) -> anyhow::Result<PathBuf> {
        let source = path_segment(source).context("manga source")?;
        let reference = path_segment(reference).context("manga reference")?;
        Ok(self
            .base_dir
            .join("manga")
            .join(source)
            .join(format!("{reference}.json")))
    }

    fn bookmarks_path(&self) -> PathBuf {
        self.base_dir.join("bookmarks.json")
    }

    fn state_path(&self) -> PathBuf {
        self.base_dir.join("state.json")
    }

    async fn get_state(&self) -> anyhow::Result<State> {
        let path = self.state_path();
        let state = read_json(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))?;
        Ok(state.unwrap_or_default())
    }
}

fn path_segment(raw: &str) -> anyhow::Result<&str> {
    if raw.is_empty() || raw == "." || raw == ".." || raw.contains(['/', '\\']) {
        anyhow::bail!("not usable as a path segment: {raw:?}");
    }
    Ok(raw)
}

#[async_trait]
impl Store for LocalFsStore {
    async fn get_manga(&self, source: &str, reference: &str) -> anyhow::Result<Option<Manga>> {
        let path = self.manga_path(source, reference)?;
        read_json(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))
    }

    async fn put_manga(&self, manga: &Manga) -> anyhow::Result<()> {
        let path = self.manga_path(&manga.source, &manga.reference)?;
        write_json_atomic(&path, manga)
            .await
            .with_context(|| format!("write manga: {}", manga.key()))
    }

    async fn remove_manga(&self, source: &str, reference: &str) -> anyhow::Result<bool> {
        let path = self.manga_path(source, reference)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(anyhow::Error::new(err).context(format!("remove: {}", path.display())))
            }
        }
    }

    async fn get_bookmarks(&self) -> anyhow::Result<Vec<Bookmark>> {
        let path = self.bookmarks_path();
        let bookmarks = read_json(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))?;
        Ok(bookmarks.unwrap_or_default())
    }

    async fn put_bookmarks(&self, bookmarks: &[Bookmark]) -> anyhow::Result<()> {
        write_json_atomic(&self.bookmarks_path(), &bookmarks)
            .await
            .context("write bookmarks.json")
    }

    async fn get_badge_count(&self) -> anyhow::Result<u32> {
        Ok(self.get_state().await?.badge_count)
    }

    async fn put_badge_count(&self, count: u32) -> anyhow::Result<()> {
        let mut state = self.get_state().await?;
        state.badge_count = count;
        write_json_atomic(&self.state_path(), &state)
            .await
            .context("write state.json")
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use url::Url;

    use super::*;
    use crate::model::{Chapter, ChapterRef, LastRead};

    fn manga() -> Manga {
        Manga {
            sid: "106".to_owned(),
            name: "One Piece".to_owned(),
            source: "mangahere".to_owned(),
            reference: "one_piece".to_owned(),
            url: Url::parse("http://www.mangahere.cc/manga/one_piece/").expect("url"),
            cover: "http://h.mhcdn.net/store/manga/106/cover.jpg".to_owned(),
            last_update: DateTime::<Utc>::UNIX_EPOCH,
            chapter_list: vec![Chapter {
                id: "c001".to_owned(),
                name: "Romance Dawn".to_owned(),
                url: Url::parse("http://www.mangahere.cc/manga/one_piece/c001/").expect("url"),
            }],
        }
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = LocalFsStore::new(temp.path());

        assert!(store.get_manga("mangahere", "nope").await?.is_none());
        assert!(store.get_bookmarks().await?.is_empty());
        assert_eq!(store.get_badge_count().await?, 0);
        assert!(!store.remove_manga("mangahere", "nope").await?);
        Ok(())
    }

    #[tokio::test]
    async fn manga_round_trips_under_source_dir() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = LocalFsStore::new(temp.path());
        let manga = manga();

        store.put_manga(&manga).await?;
        assert!(
            temp.path()
                .join("manga/mangahere/one_piece.json")
                .is_file()
        );
        assert_eq!(
            store.get_manga("mangahere", "one_piece").await?,
            Some(manga)
        );

        assert!(store.remove_manga("mangahere", "one_piece").await?);
        assert!(store.get_manga("mangahere", "one_piece").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn bookmarks_and_badge_persist() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = LocalFsStore::new(temp.path());
        let bookmark = Bookmark {
            source: "mangahere".to_owned(),
            reference: "one_piece".to_owned(),
            last_read: LastRead {
                chapter: ChapterRef::new("c001"),
                date: Utc::now(),
            },
        };

        store.put_bookmarks(std::slice::from_ref(&bookmark)).await?;
        store.put_badge_count(3).await?;

        let reopened = LocalFsStore::new(temp.path());
        assert_eq!(reopened.get_bookmarks().await?, vec![bookmark]);
        assert_eq!(reopened.get_badge_count().await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_path_traversal_in_keys() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = LocalFsStore::new(temp.path());
        assert!(store.get_manga("..", "x").await.is_err());
        assert!(store.get_manga("mangahere", "a/b").await.is_err());
        Ok(())
    }
}
