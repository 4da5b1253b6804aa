use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser as _;

use mangawatch::cli::{Cli, Command};
use mangawatch::model::{ChapterRef, UiMessage};
use mangawatch::tracker::{RefreshStatus, Tracker};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    mangawatch::logging::init(cli.verbose).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    let fetch_config = mangawatch::config::FetchConfig::from_env().context("fetch config")?;
    let fetcher = mangawatch::fetch::HttpFetcher::new(&fetch_config).context("http fetcher")?;
    let registry = mangawatch::sources::Registry::with_defaults(Arc::new(fetcher));

    let data_dir = mangawatch::config::resolve_data_dir(cli.data_dir.as_deref());
    tracing::debug!(data_dir = %data_dir.display(), "using data dir");
    let store = Arc::new(mangawatch::store::LocalFsStore::new(data_dir));
    let tracker = Tracker::new(registry, store);

    match cli.command {
        Command::Info(args) => {
            let (extractor, _) = tracker
                .registry()
                .find_for_url(&args.url)
                .ok_or_else(|| anyhow::anyhow!("no source recognizes url: {}", args.url))?;
            let manga = extractor.manga_info(&args.url).await.context("info")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&manga).context("serialize manga")?
            );
        }
        Command::ChapterRef(args) => {
            let extractor = tracker
                .registry()
                .get(&args.source)
                .ok_or_else(|| anyhow::anyhow!("unknown source: {}", args.source))?;
            let chapter = match args.default {
                Some(default) => extractor.chapter_reference_or(&args.url, ChapterRef::new(default)),
                None => extractor
                    .chapter_reference(&args.url)
                    .ok_or_else(|| anyhow::anyhow!("no chapter reference in url: {}", args.url))?,
            };
            println!("{}", chapter.id);
        }
        Command::Bookmark(args) => {
            let bookmark = tracker
                .bookmark(&args.url, args.read.as_deref())
                .await
                .context("bookmark")?;
            println!(
                "bookmarked {} (last read {})",
                bookmark.key(),
                bookmark.last_read.chapter.id
            );
        }
        Command::Unbookmark(args) => {
            if tracker.unbookmark(&args.url).await.context("unbookmark")? {
                println!("removed {}", args.url);
            } else {
                println!("not bookmarked: {}", args.url);
            }
        }
        Command::Read(args) => match tracker.mark_read(&args.url).await.context("read")? {
            Some(message) => print_message(&message)?,
            None => anyhow::bail!("no bookmarked series matches {}", args.url),
        },
        Command::Refresh(args) => {
            let report = tracker
                .refresh_all(args.concurrency)
                .await
                .context("refresh")?;
            for series in &report.series {
                if let RefreshStatus::Failed { message, .. } = &series.status {
                    eprintln!("{}: {message}", series.key);
                }
            }
            for message in &report.messages {
                print_message(message)?;
            }
        }
        Command::List => {
            for entry in tracker.list().await.context("list")? {
                let name = entry
                    .manga
                    .as_ref()
                    .map_or("?", |manga| manga.name.as_str());
                let latest = entry
                    .manga
                    .as_ref()
                    .and_then(|manga| manga.latest_chapter())
                    .map_or("-", |chapter| chapter.id.as_str());
                let marker = if entry.up_to_date { "up to date" } else { "unread" };
                println!(
                    "{}\t{name}\tlast read {} on {}\tlatest {latest}\t{marker}",
                    entry.bookmark.key(),
                    entry.bookmark.last_read.chapter.id,
                    entry.bookmark.last_read.date.format("%Y-%m-%d"),
                );
            }
        }
    }

    Ok(())
}

fn print_message(message: &UiMessage) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string(message).context("serialize message")?
    );
    Ok(())
}
