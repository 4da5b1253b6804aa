use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding manga records and bookmarks (default: $MANGAWATCH_DATA_DIR or ./mangawatch-data).
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a series page and print its manga record as JSON.
    Info(UrlArgs),
    /// Print the chapter id embedded in a reader URL.
    ChapterRef(ChapterRefArgs),
    /// Start tracking a series.
    Bookmark(BookmarkArgs),
    /// Stop tracking a series.
    Unbookmark(UrlArgs),
    /// Mark the chapter at a reader URL as read.
    Read(UrlArgs),
    /// Re-fetch chapter lists of all bookmarked series.
    Refresh(RefreshArgs),
    /// List bookmarks and whether they are up to date.
    List,
}

#[derive(Debug, Args)]
pub struct UrlArgs {
    #[arg(long)]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct ChapterRefArgs {
    #[arg(long)]
    pub url: String,

    /// Source key whose URL layout to use.
    #[arg(long, default_value = "mangahere")]
    pub source: String,

    /// Printed when the URL names no chapter.
    #[arg(long)]
    pub default: Option<String>,
}

#[derive(Debug, Args)]
pub struct BookmarkArgs {
    /// Series page URL.
    #[arg(long)]
    pub url: String,

    /// Reader URL of the chapter last read (default: latest chapter).
    #[arg(long)]
    pub read: Option<String>,
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Maximum series refreshed at the same time.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}
