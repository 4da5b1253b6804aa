#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mangawatch::fetch::{Fetched, Fetcher};
use url::Url;

pub const SERIES_URL: &str = "http://www.mangahere.cc/manga/one_piece/";
pub const CHAPTERS_URL: &str = "http://www.mangahere.cc/get_chapters106.js";
pub const COVER_URL: &str = "http://h.mhcdn.net/store/manga/106/cover.jpg?token=abc";

enum Route {
    Html(String),
    Script(String),
    Fail(String),
}

/// Serves canned responses keyed by URL and records every request.
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    /// A mangahere series with `chapters` chapters.
    pub fn with_series(chapters: usize) -> Self {
        let stub = Self::default();
        stub.set_html(SERIES_URL, &series_html("One Piece", COVER_URL));
        stub.set_script(CHAPTERS_URL, &chapters_js(chapters));
        stub
    }

    pub fn set_html(&self, url: &str, body: &str) {
        self.routes
            .lock()
            .expect("routes lock")
            .insert(url.to_owned(), Route::Html(body.to_owned()));
    }

    pub fn set_script(&self, url: &str, body: &str) {
        self.routes
            .lock()
            .expect("routes lock")
            .insert(url.to_owned(), Route::Script(body.to_owned()));
    }

    pub fn set_failure(&self, url: &str, message: &str) {
        self.routes
            .lock()
            .expect("routes lock")
            .insert(url.to_owned(), Route::Fail(message.to_owned()));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> anyhow::Result<Fetched> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(url.to_string());

        let routes = self.routes.lock().expect("routes lock");
        match routes.get(url.as_str()) {
            Some(Route::Html(body)) => Ok(Fetched::new(
                url.clone(),
                Some("text/html; charset=utf-8".to_owned()),
                body.clone(),
            )),
            Some(Route::Script(body)) => Ok(Fetched::new(
                url.clone(),
                Some("application/javascript".to_owned()),
                body.clone(),
            )),
            Some(Route::Fail(message)) => anyhow::bail!("{message}"),
            None => anyhow::bail!("GET {url}: unexpected status 404 Not Found"),
        }
    }
}

pub fn series_html(title: &str, cover: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>{title} - Read {title} Online</title>
  <meta property="og:title" content="{title}" />
  <meta property="og:type" content="website" />
</head>
<body>
  <div class="manga_detail">
    <div class="manga_detail_top clearfix">
      <img src="{cover}" onerror="this.src='/media/images/loading.gif'" class="img" />
      <h2>{title}</h2>
    </div>
  </div>
</body>
</html>
"#
    )
}

pub fn chapters_js(count: usize) -> String {
    let entries = (1..=count)
        .map(|n| {
            format!(
                r#"["One Piece {n}","http://www.mangahere.cc/manga/"+series_name+"/c{n:03}/"]"#
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!("var series_name = \"one_piece\";\nvar chapter_list = new Array(\n{entries}\n);\n")
}

pub fn chapter_url(n: usize) -> String {
    format!("{SERIES_URL}c{n:03}/")
}
