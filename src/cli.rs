//! CLI parsing and orchestration. One subcommand per source operation, plus `download`
//! (novel → file) and `login` (import the site's auth blob). Maps errors to exit codes.

use crate::config::{self, Config};
use crate::filters::{self, Excludable, Filters, ListOptions, SortBy, SortType};
use crate::formats::{self, ChapterText, FormatError, NovelExport, OutputFormat};
use crate::scraper::ranobelib::RanobeLib;
use crate::scraper::{ApiClient, ChapterPath, NovelSource, ScraperError};
use crate::storage::{FileStore, StorageError};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("{0}")]
    Format(#[from] FormatError),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scraper(_) => 2,
            CliRunError::Format(_) | CliRunError::Output(_) => 3,
        }
    }
}

impl From<StorageError> for CliRunError {
    fn from(e: StorageError) -> Self {
        CliRunError::Scraper(ScraperError::Storage(e))
    }
}

#[derive(Parser, Debug)]
#[command(name = "ranobelib")]
#[command(about = "Browse RanobeLib: listings, search, novel details and chapter text")]
#[command(
    after_help = "Config file keys (api_base, site_base, user_agent, timeout_secs, storage_path, output_dir) are documented in the README. CLI flags override config."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Debug logging and full error chain.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// HTTP User-Agent (overrides config).
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Token store file (overrides config).
    #[arg(long, global = true)]
    pub storage: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List one catalog page as JSON.
    Popular(PopularArgs),
    /// Search titles; prints JSON.
    Search { query: String },
    /// Novel details and chapter list as JSON.
    Novel { path: String },
    /// Print a chapter's rendered markup. PATH is slug/volume/number[/branch].
    Chapter { path: String },
    /// Print the site URL for a novel slug or chapter path.
    Url {
        path: String,
        /// Treat PATH as a novel slug.
        #[arg(long)]
        novel: bool,
    },
    /// Store the site's local auth JSON blob and cache its token.
    Login {
        /// JSON with {auth: {id}, token: {access_token, timestamp, expires_in}}.
        blob: String,
    },
    /// Fetch a novel's chapters and write them to one file.
    Download(DownloadArgs),
}

#[derive(ClapArgs, Debug)]
pub struct PopularArgs {
    /// Page number (1-based).
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    /// Sort by latest chapter.
    #[arg(long)]
    pub latest: bool,

    /// Sort field: rate_avg, rating_score, views, chap_count, last_chapter_at, created_at, name, rus_name.
    #[arg(long, value_parser = parse_sort_by)]
    pub sort_by: Option<SortBy>,

    /// Sort direction: asc or desc.
    #[arg(long, value_parser = parse_sort_type)]
    pub sort_type: Option<SortType>,

    /// Include titles without chapters.
    #[arg(long)]
    pub all: bool,

    /// Type ids (repeatable).
    #[arg(long = "type", long_help = options_help("Type ids (repeatable).", filters::TYPE_OPTIONS))]
    pub types: Vec<String>,

    /// Translation status ids (repeatable).
    #[arg(long, long_help = options_help("Translation status ids (repeatable).", filters::SCANLATE_STATUS_OPTIONS))]
    pub scanlate_status: Vec<String>,

    /// Title status ids (repeatable).
    #[arg(long, long_help = options_help("Title status ids (repeatable).", filters::TITLE_STATUS_OPTIONS))]
    pub title_status: Vec<String>,

    /// Genre ids to require (repeatable).
    #[arg(long, long_help = options_help("Genre ids to require (repeatable).", filters::GENRE_OPTIONS))]
    pub genre: Vec<String>,

    /// Genre ids to exclude (repeatable).
    #[arg(long, long_help = options_help("Genre ids to exclude (repeatable).", filters::GENRE_OPTIONS))]
    pub exclude_genre: Vec<String>,

    /// Tag ids to require (repeatable).
    #[arg(long, long_help = options_help("Tag ids to require (repeatable).", filters::TAG_OPTIONS))]
    pub tag: Vec<String>,

    /// Tag ids to exclude (repeatable).
    #[arg(long, long_help = options_help("Tag ids to exclude (repeatable).", filters::TAG_OPTIONS))]
    pub exclude_tag: Vec<String>,
}

impl PopularArgs {
    fn list_options(&self) -> ListOptions {
        ListOptions {
            show_latest: self.latest,
            filters: Filters {
                sort_by: self.sort_by.unwrap_or_default(),
                sort_type: self.sort_type.unwrap_or_default(),
                require_chapters: !self.all,
                types: self.types.clone(),
                scanlate_status: self.scanlate_status.clone(),
                title_status: self.title_status.clone(),
                genres: Excludable {
                    include: self.genre.clone(),
                    exclude: self.exclude_genre.clone(),
                },
                tags: Excludable {
                    include: self.tag.clone(),
                    exclude: self.exclude_tag.clone(),
                },
            },
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct DownloadArgs {
    /// Novel slug, e.g. 123--some-title.
    pub path: String,

    /// Output path. Default: ./{sanitized-slug}.{ext}.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: json, html, markdown, or text.
    #[arg(long, default_value = "html", value_parser = parse_format)]
    pub format: OutputFormat,

    /// Only chapters in this range (1-based inclusive, after branch filtering), e.g. 1-10.
    #[arg(long, value_parser = parse_chapter_range)]
    pub chapters: Option<(u32, u32)>,

    /// Only chapters of this translation branch id.
    #[arg(long)]
    pub branch: Option<String>,
}

fn parse_chapter_range(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim();
    let (from_str, to_str) = s.split_once('-').ok_or_else(|| {
        format!(
            "Invalid --chapters: expected 'from-to' (e.g. 1-10), got '{}'",
            s
        )
    })?;
    let from_str = from_str.trim();
    let to_str = to_str.trim();
    let from: u32 = from_str.parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid start chapter number",
            from_str
        )
    })?;
    let to: u32 = to_str.parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid end chapter number",
            to_str
        )
    })?;
    if from > to {
        return Err(format!(
            "Invalid --chapters: start ({}) must be <= end ({})",
            from, to
        ));
    }
    Ok((from, to))
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_lowercase().as_str() {
        "json" => Ok(OutputFormat::Json),
        "html" => Ok(OutputFormat::Html),
        "markdown" | "md" => Ok(OutputFormat::Markdown),
        "text" | "txt" => Ok(OutputFormat::Text),
        _ => Err(format!(
            "Invalid --format value: '{}'. Use json, html, markdown, or text.",
            s
        )),
    }
}

/// `--help` text for a filter flag: the summary, then one `id  label` line per known value.
fn options_help(summary: &str, options: &[(&str, &str)]) -> String {
    let mut help = format!("{}\n\nKnown values:", summary);
    for (id, label) in options {
        help.push_str(&format!("\n  {:>4}  {}", id, label));
    }
    help
}

fn parse_sort_by(s: &str) -> Result<SortBy, String> {
    SortBy::from_param(&s.to_lowercase())
        .ok_or_else(|| format!("Invalid --sort-by value: '{}'.", s))
}

fn parse_sort_type(s: &str) -> Result<SortType, String> {
    match s.to_lowercase().as_str() {
        "asc" => Ok(SortType::Asc),
        "desc" => Ok(SortType::Desc),
        _ => Err(format!("Invalid --sort-type value: '{}'. Use asc or desc.", s)),
    }
}

/// Sanitize a slug to a safe filename: lowercase ASCII alphanumerics, everything else `-`.
fn sanitize_name(name: &str) -> String {
    let mut s = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    while s.contains("--") {
        s = s.replace("--", "-");
    }
    s = s.trim_matches('-').to_string();
    if s.is_empty() {
        s = "novel".to_string();
    }
    s
}

fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Keep chapters of one branch, then a 1-based inclusive range.
fn select_chapters<T: Clone>(
    chapters: &[(ChapterPath, T)],
    branch: Option<&str>,
    range: Option<(u32, u32)>,
) -> Vec<(ChapterPath, T)> {
    chapters
        .iter()
        .filter(|(path, _)| branch.is_none() || path.branch_id.as_deref() == branch)
        .enumerate()
        .filter(|(i, _)| match range {
            Some((from, to)) => {
                let n = *i as u32 + 1;
                n >= from && n <= to
            }
            None => true,
        })
        .map(|(_, c)| c.clone())
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliRunError> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)
        .map_err(|e| CliRunError::Output(std::io::Error::other(e)))?;
    writeln!(out)?;
    Ok(())
}

fn open_store(args: &Args, config: Option<&Config>) -> Result<FileStore, CliRunError> {
    let path = args
        .storage
        .clone()
        .or_else(|| config.and_then(|c| c.storage_path.clone()))
        .or_else(FileStore::default_path)
        .ok_or_else(|| {
            CliRunError::InvalidInput(
                "No data directory found for the token store; pass --storage.".to_string(),
            )
        })?;
    Ok(FileStore::open(path)?)
}

fn progress_bar(total: u64) -> indicatif::ProgressBar {
    let bar = indicatif::ProgressBar::new(total);
    if let Ok(style) = indicatif::ProgressStyle::default_bar()
        .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
    {
        bar.set_style(
            style
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
    }
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn download(
    source: &mut impl NovelSource,
    args: &DownloadArgs,
    output_dir: &Path,
    quiet: bool,
) -> Result<PathBuf, CliRunError> {
    let novel = source.get_detail(&args.path)?;
    let mut addressed = Vec::with_capacity(novel.chapters.len());
    for ch in &novel.chapters {
        addressed.push((ch.path.parse::<ChapterPath>()?, ch.name.clone()));
    }
    let selected = select_chapters(&addressed, args.branch.as_deref(), args.chapters);
    if selected.is_empty() {
        return Err(CliRunError::InvalidInput(format!(
            "No chapters of {} match the given branch/range.",
            args.path
        )));
    }

    let output_path = match &args.output {
        Some(p) => p.clone(),
        None => output_dir.join(format!(
            "{}.{}",
            sanitize_name(&novel.path),
            args.format.extension()
        )),
    };
    validate_output_path(&output_path)?;

    let bar = if quiet {
        None
    } else {
        Some(progress_bar(selected.len() as u64))
    };
    let mut chapters = Vec::with_capacity(selected.len());
    for (i, (path, title)) in selected.into_iter().enumerate() {
        if let Some(bar) = &bar {
            bar.set_position(i as u64);
            bar.set_message(format!("Fetching {}", title));
        }
        let path = path.to_string();
        let body = source.get_chapter_content(&path)?;
        if body.is_empty() {
            tracing::warn!("chapter {} has no content", path);
        }
        chapters.push(ChapterText { title, path, body });
    }
    if let Some(bar) = bar {
        bar.disable_steady_tick();
        bar.finish_and_clear();
    }

    let export = NovelExport { novel, chapters };
    formats::write(&export, args.format, &output_path)?;
    Ok(output_path)
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let config = config.as_ref();

    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    let timeout_secs = args
        .timeout
        .or_else(|| config.and_then(|c| c.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.and_then(|c| c.user_agent.clone()));

    let mut builder = ApiClient::builder().timeout_secs(timeout_secs);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let mut store = open_store(args, config)?;
    if let Command::Login { blob } = &args.command {
        store.set_local_item(crate::auth::LOCAL_AUTH_KEY, blob.as_str())?;
    }
    let mut source = RanobeLib::new(client, store);
    if let Some(api_base) = config.and_then(|c| c.api_base.clone()) {
        source = source.with_api_base(api_base);
    }
    if let Some(site) = config.and_then(|c| c.site_base.clone()) {
        source = source.with_site(site);
    }

    match &args.command {
        Command::Popular(popular) => {
            let items = source.list_popular(popular.page, &popular.list_options())?;
            print_json(&items)
        }
        Command::Search { query } => print_json(&source.search(query)?),
        Command::Novel { path } => print_json(&source.get_detail(path)?),
        Command::Chapter { path } => {
            let body = source.get_chapter_content(path)?;
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", body)?;
            Ok(())
        }
        Command::Url { path, novel } => {
            let url = source.resolve_url(path, *novel)?;
            println!("{}", url);
            Ok(())
        }
        Command::Login { .. } => match source.login()? {
            Some(c) => {
                tracing::info!("logged in as user {}", c.user_id);
                Ok(())
            }
            None => Err(CliRunError::InvalidInput(
                "Auth blob has no access token or user id.".to_string(),
            )),
        },
        Command::Download(download_args) => {
            let output_dir = config
                .and_then(|c| c.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            let path = download(&mut source, download_args, &output_dir, args.quiet)?;
            tracing::info!("wrote {}", path.display());
            Ok(())
        }
    }
}
