//! Single-file output for a downloaded novel: HTML, Markdown, plain text, or JSON.

use crate::model::SourceNovel;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Output format selector for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Html,
    Markdown,
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
            OutputFormat::Text => "txt",
        }
    }
}

/// One fetched chapter body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterText {
    pub title: String,
    pub path: String,
    /// Rendered markup.
    pub body: String,
}

/// A novel's metadata plus the chapter bodies that were fetched for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovelExport {
    pub novel: SourceNovel,
    pub chapters: Vec<ChapterText>,
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Cannot write: novel name is empty.")]
    EmptyName,

    #[error("Cannot write: no chapters were downloaded.")]
    NoChapters,

    #[error("Failed to write output: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn validate(export: &NovelExport) -> Result<(), FormatError> {
    if export.novel.name.trim().is_empty() {
        return Err(FormatError::EmptyName);
    }
    if export.chapters.is_empty() {
        return Err(FormatError::NoChapters);
    }
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>, FormatError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| FormatError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Strip markup from a chapter body. Line breaks become newlines first.
pub(crate) fn body_to_plain_text(body: &str) -> String {
    let with_breaks = body
        .replace("<br>", "\n")
        .replace("</p>", "</p>\n")
        .replace("</h2>", "</h2>\n");
    let fragment = Html::parse_fragment(&with_breaks);
    let text: String = fragment.root_element().text().collect();
    text.trim().to_string()
}

/// Write in the given format.
pub fn write(export: &NovelExport, format: OutputFormat, path: &Path) -> Result<(), FormatError> {
    match format {
        OutputFormat::Json => write_json(export, path),
        OutputFormat::Html => write_html(export, path),
        OutputFormat::Markdown => write_markdown(export, path),
        OutputFormat::Text => write_text(export, path),
    }
}

pub fn write_json(export: &NovelExport, path: &Path) -> Result<(), FormatError> {
    validate(export)?;
    let mut f = create(path)?;
    serde_json::to_writer_pretty(&mut f, export)?;
    f.flush()?;
    Ok(())
}

/// Single HTML page: header with name, author and summary, then one section per chapter.
pub fn write_html(export: &NovelExport, path: &Path) -> Result<(), FormatError> {
    validate(export)?;
    let novel = &export.novel;
    let mut f = create(path)?;

    let name_esc = html_escape(&novel.name);
    writeln!(f, r#"<!DOCTYPE html>"#)?;
    writeln!(f, r#"<html lang="ru">"#)?;
    writeln!(f, r#"<head>"#)?;
    writeln!(f, r#"  <meta charset="UTF-8"/>"#)?;
    writeln!(f, r#"  <title>{}</title>"#, name_esc)?;
    writeln!(f, r#"</head>"#)?;
    writeln!(f, r#"<body>"#)?;
    writeln!(f, r#"  <header>"#)?;
    writeln!(f, r#"    <h1>{}</h1>"#, name_esc)?;
    if let Some(author) = &novel.author {
        writeln!(f, r#"    <p class="author">{}</p>"#, html_escape(author))?;
    }
    if let Some(summary) = novel.summary.as_deref().filter(|s| !s.is_empty()) {
        writeln!(f, r#"    <p class="summary">{}</p>"#, html_escape(summary))?;
    }
    writeln!(f, r#"  </header>"#)?;

    for ch in &export.chapters {
        writeln!(f, r#"  <section class="chapter">"#)?;
        writeln!(f, r#"    <h2>{}</h2>"#, html_escape(&ch.title))?;
        writeln!(f, r#"    <div class="chapter-body">"#)?;
        f.write_all(ch.body.as_bytes())?;
        writeln!(f)?;
        writeln!(f, r#"    </div>"#)?;
        writeln!(f, r#"  </section>"#)?;
    }

    writeln!(f, r#"</body>"#)?;
    writeln!(f, r#"</html>"#)?;
    f.flush()?;
    Ok(())
}

/// Markdown: `# name`, metadata, then `## title` plus the body converted from markup.
pub fn write_markdown(export: &NovelExport, path: &Path) -> Result<(), FormatError> {
    validate(export)?;
    let novel = &export.novel;
    let mut f = create(path)?;

    writeln!(f, "# {}", novel.name)?;
    writeln!(f)?;
    if let Some(author) = &novel.author {
        writeln!(f, "{}", author)?;
        writeln!(f)?;
    }
    if let Some(summary) = &novel.summary {
        writeln!(f, "{}", summary)?;
        writeln!(f)?;
    }
    writeln!(f, "---")?;
    writeln!(f)?;

    for ch in &export.chapters {
        writeln!(f, "## {}", ch.title)?;
        writeln!(f)?;
        writeln!(f, "{}", html2md::parse_html(&ch.body))?;
        writeln!(f)?;
    }
    f.flush()?;
    Ok(())
}

/// Plain text with a separator line per chapter.
pub fn write_text(export: &NovelExport, path: &Path) -> Result<(), FormatError> {
    validate(export)?;
    let novel = &export.novel;
    let mut f = create(path)?;

    writeln!(f, "{}", novel.name)?;
    if let Some(author) = &novel.author {
        writeln!(f, "{}", author)?;
    }
    writeln!(f)?;
    if let Some(summary) = &novel.summary {
        writeln!(f, "{}", summary)?;
        writeln!(f)?;
    }

    for (i, ch) in export.chapters.iter().enumerate() {
        writeln!(f)?;
        writeln!(f, "--- {}. {} ---", i + 1, ch.title)?;
        writeln!(f)?;
        writeln!(f, "{}", body_to_plain_text(&ch.body))?;
    }
    f.flush()?;
    Ok(())
}
