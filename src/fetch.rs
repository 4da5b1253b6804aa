use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use scraper::Html;
use url::Url;

use crate::config::FetchConfig;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fails on network errors and non-success statuses.
    async fn fetch(&self, url: &Url) -> anyhow::Result<Fetched>;
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

impl Fetched {
    pub fn new(url: Url, content_type: Option<String>, body: impl Into<String>) -> Self {
        Self {
            url,
            content_type,
            body: body.into(),
        }
    }

    pub fn is_document(&self) -> bool {
        match self.content_type.as_deref() {
            Some(content_type) => is_html_content_type(content_type),
            None => looks_like_html(&self.body),
        }
    }

    /// Parses the body as HTML, or `None` when it is not a document.
    pub fn document(&self) -> Option<Html> {
        self.is_document()
            .then(|| Html::parse_document(&self.body))
    }

    /// Raw text body, `None` when blank.
    pub fn text(&self) -> Option<&str> {
        let trimmed = self.body.trim();
        (!trimmed.is_empty()).then_some(self.body.as_str())
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    let content_type = content_type.trim().to_ascii_lowercase();
    content_type.starts_with("text/html") || content_type.starts_with("application/xhtml+xml")
}

fn looks_like_html(body: &str) -> bool {
    if body.trim().is_empty() {
        return false;
    }
    let trimmed = body.trim_start().to_ascii_lowercase();
    trimmed.starts_with("<!doctype html")
        || trimmed.starts_with("<html")
        || trimmed.contains("<html")
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> anyhow::Result<Fetched> {
        tracing::debug!(%url, "fetching");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url}: unexpected status {status}");
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .with_context(|| format!("read body of {url}"))?;

        Ok(Fetched {
            url: final_url,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(content_type: Option<&str>, body: &str) -> Fetched {
        Fetched::new(
            Url::parse("http://example.com/").expect("url"),
            content_type.map(str::to_owned),
            body,
        )
    }

    #[test]
    fn html_content_type_is_a_document() {
        assert!(fetched(Some("text/html; charset=utf-8"), "").is_document());
        assert!(fetched(Some("application/xhtml+xml"), "").is_document());
        assert!(!fetched(Some("application/javascript"), "<html>").is_document());
    }

    #[test]
    fn sniffs_html_without_content_type() {
        assert!(fetched(None, "  <!DOCTYPE html><html></html>").is_document());
        assert!(!fetched(None, "var chapter_list = [];").is_document());
        assert!(!fetched(None, "   ").is_document());
    }

    #[test]
    fn blank_body_has_no_text() {
        assert!(fetched(None, " \n ").text().is_none());
        assert_eq!(fetched(None, "x").text(), Some("x"));
    }
}
