use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::SourceError;
use crate::fetch::Fetcher;
use crate::model::{Chapter, ChapterRef, ChapterUpdate, Manga};
use crate::sources::{Extractor, SeriesRef};

pub const KEY: &str = "mangahere";

const DEFAULT_CHAPTERS_BASE: &str = "http://www.mangahere.cc/";

static SERIES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(https?)://)?((?:[\w-]+\.)*mangahere\.\w{2,3})/manga/(\w+)/(?:[?#].*)?$")
        .expect("valid series regex")
});

static SERIES_PAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:[\w-]+\.)*mangahere\.\w{2,3}/manga/(\w+)/")
        .expect("valid series page regex")
});

static CHAPTER_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w:/.]+/manga/\w+/([\dc.]+)/(?:\d+\.html)?").expect("valid chapter regex")
});

static SID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+/manga/(\d+)\S+").expect("valid sid regex"));

static CHAPTER_ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\["(.+?)","[\w./:"'+]+/([c\d.]+)/"\]"#).expect("valid chapter entry regex")
});

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"head meta[property="og:title"]"#).expect("valid title selector")
});

static COVER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"div[class*="manga_detail_top clearfix"] > img"#)
        .expect("valid cover selector")
});

pub struct MangaHere {
    fetcher: Arc<dyn Fetcher>,
    chapters_base: Url,
}

impl MangaHere {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            chapters_base: Url::parse(DEFAULT_CHAPTERS_BASE).expect("valid default base"),
        }
    }

    /// Points chapter list requests at another host.
    pub fn with_chapters_base(mut self, base: Url) -> Self {
        self.chapters_base = base;
        self
    }

    pub fn chapter_list_url(&self, sid: &str) -> Result<Url, url::ParseError> {
        self.chapters_base.join(&format!("get_chapters{sid}.js"))
    }

    /// Fetches and decodes the chapter table; `known` is kept when the
    /// response holds no chapters.
    async fn chapter_list(
        &self,
        sid: &str,
        manga_url: &Url,
        known: Vec<Chapter>,
    ) -> Result<Vec<Chapter>, SourceError> {
        let list_url = self.chapter_list_url(sid).map_err(SourceError::chapter_list)?;
        let fetched = self
            .fetcher
            .fetch(&list_url)
            .await
            .map_err(SourceError::chapter_list)?;

        let chapters = build_chapter_list(fetched.text(), manga_url, known);
        tracing::debug!(sid, count = chapters.len(), "parsed chapter list");
        Ok(chapters)
    }
}

#[async_trait]
impl Extractor for MangaHere {
    fn key(&self) -> &'static str {
        KEY
    }

    fn recognize(&self, url: &str) -> Option<SeriesRef> {
        let caps = SERIES_RE.captures(url.trim())?;
        let scheme = caps.get(1).map_or("http", |m| m.as_str());
        let host = &caps[2];
        let reference = caps[3].to_owned();
        Some(SeriesRef {
            url: format!("{scheme}://{host}/manga/{reference}/"),
            reference,
        })
    }

    fn series_reference(&self, url: &str) -> Option<String> {
        SERIES_PAGE_RE
            .captures(url.trim())
            .map(|caps| caps[1].to_owned())
    }

    fn chapter_reference(&self, url: &str) -> Option<ChapterRef> {
        CHAPTER_REF_RE
            .captures(url)
            .map(|caps| ChapterRef::new(&caps[1]))
    }

    async fn manga_info(&self, url: &str) -> Result<Manga, SourceError> {
        let invalid_url = || SourceError::InvalidUrl {
            site: KEY,
            url: url.to_owned(),
        };
        let series = self.recognize(url).ok_or_else(invalid_url)?;
        let manga_url = Url::parse(&series.url).map_err(|_| invalid_url())?;

        let fetched = self
            .fetcher
            .fetch(&manga_url)
            .await
            .map_err(|err| SourceError::fetch(manga_url.as_str(), err))?;

        let page = {
            let document = fetched.document().ok_or_else(|| SourceError::InvalidResponse {
                site: KEY,
                url: manga_url.to_string(),
            })?;
            parse_series_page(&document)?
        };

        let chapter_list = self.chapter_list(&page.sid, &manga_url, Vec::new()).await?;

        tracing::info!(
            source = KEY,
            reference = %series.reference,
            chapters = chapter_list.len(),
            "retrieved manga info"
        );

        Ok(Manga {
            sid: page.sid,
            name: page.name,
            source: KEY.to_owned(),
            reference: series.reference,
            url: manga_url,
            cover: page.cover,
            last_update: Utc::now(),
            chapter_list,
        })
    }

    async fn update_chapters(&self, manga: &Manga) -> Result<ChapterUpdate, SourceError> {
        let chapter_list = self
            .chapter_list(&manga.sid, &manga.url, manga.chapter_list.clone())
            .await?;
        let count = crate::sync::chapter_delta(manga, &chapter_list);
        Ok(ChapterUpdate {
            count,
            chapter_list,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPage {
    pub name: String,
    pub cover: String,
    pub sid: String,
}

pub fn parse_series_page(document: &Html) -> Result<SeriesPage, SourceError> {
    let name = document
        .select(&TITLE_SELECTOR)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_owned())
        .ok_or(SourceError::Extraction {
            site: KEY,
            field: "og:title",
        })?;

    let cover = document
        .select(&COVER_SELECTOR)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(|src| src.trim().to_owned())
        .ok_or(SourceError::Extraction {
            site: KEY,
            field: "manga_detail_top cover image",
        })?;

    let sid = SID_RE
        .captures(&cover)
        .map(|caps| caps[1].to_owned())
        .ok_or(SourceError::Extraction {
            site: KEY,
            field: "sid",
        })?;

    Ok(SeriesPage { name, cover, sid })
}

/// Decodes the chapters of a `get_chapters` script body, in body order.
///
/// A missing or blank body, or one without a single chapter entry, returns
/// `known` untouched so a transient bad response never erases chapters.
/// Chapter URLs are resolved against `manga_url`, never against the script's
/// own URL.
pub fn build_chapter_list(body: Option<&str>, manga_url: &Url, known: Vec<Chapter>) -> Vec<Chapter> {
    let Some(body) = body.filter(|body| !body.trim().is_empty()) else {
        return known;
    };

    let mut chapter_list = Vec::new();
    let mut seen = HashSet::new();

    for caps in CHAPTER_ENTRY_RE.captures_iter(body) {
        let id = &caps[2];
        if !seen.insert(id.to_owned()) {
            tracing::debug!(id, "skipping duplicate chapter id");
            continue;
        }

        let url = match manga_url.join(&format!("{id}/")) {
            Ok(url) => url,
            Err(err) => {
                tracing::debug!(id, ?err, "skipping chapter with unresolvable url");
                continue;
            }
        };

        chapter_list.push(Chapter {
            id: id.to_owned(),
            name: unescape_js(&caps[1]),
            url,
        });
    }

    if chapter_list.is_empty() {
        tracing::warn!(%manga_url, "chapter list response has no entries; keeping known chapters");
        return known;
    }
    chapter_list
}

fn unescape_js(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('"' | '\'' | '\\' | '/')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
