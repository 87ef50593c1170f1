//! API access: the fetch seam, chapter addressing, and the RanobeLib adapter.

mod client;
mod error;

pub mod ranobelib;

pub use client::{ApiClient, ApiClientBuilder, Fetch};
pub use error::ScraperError;

use crate::filters::ListOptions;
use crate::model::{NovelItem, SourceNovel};
use std::fmt;
use std::str::FromStr;

/// Address of one chapter: `slug/volume/number[/branchId]`.
///
/// An empty branch segment parses as no branch and segments after the branch are dropped,
/// so only canonical paths round-trip through [Display](fmt::Display).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPath {
    pub slug: String,
    pub volume: String,
    pub number: String,
    pub branch_id: Option<String>,
}

impl ChapterPath {
    /// Query for the chapter endpoint: `[branch_id=B&]number=N&volume=V`.
    pub fn chapter_query(&self) -> String {
        let branch = self
            .branch_id
            .as_deref()
            .map(|b| format!("branch_id={}&", b))
            .unwrap_or_default();
        format!("{}number={}&volume={}", branch, self.number, self.volume)
    }
}

impl FromStr for ChapterPath {
    type Err = ScraperError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let invalid = || ScraperError::InvalidPath {
            path: path.to_string(),
        };
        let mut parts = path.split('/');
        let mut required = || parts.next().filter(|p| !p.is_empty()).ok_or_else(invalid);
        let slug = required()?.to_string();
        let volume = required()?.to_string();
        let number = required()?.to_string();
        // Empty branch means none; anything past the branch is ignored.
        let branch_id = parts.next().filter(|b| !b.is_empty()).map(str::to_string);
        Ok(ChapterPath {
            slug,
            volume,
            number,
            branch_id,
        })
    }
}

impl fmt::Display for ChapterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.slug, self.volume, self.number)?;
        if let Some(branch) = &self.branch_id {
            write!(f, "/{}", branch)?;
        }
        Ok(())
    }
}

/// Operations a novel source exposes to the reader.
pub trait NovelSource {
    /// One catalog page (1-based).
    fn list_popular(
        &mut self,
        page: u32,
        options: &ListOptions,
    ) -> Result<Vec<NovelItem>, ScraperError>;

    /// Novel metadata plus its chapter list.
    fn get_detail(&mut self, path: &str) -> Result<SourceNovel, ScraperError>;

    /// Chapter body as markup. Empty when the path lacks slug, volume or number.
    fn get_chapter_content(&mut self, path: &str) -> Result<String, ScraperError>;

    fn search(&mut self, query: &str) -> Result<Vec<NovelItem>, ScraperError>;
}
