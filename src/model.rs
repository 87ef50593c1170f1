//! Shared novel/chapter schema consumed by the reader application.
//!
//! Field names serialize in camelCase (`releaseTime`, `chapterNumber`).

use serde::{Deserialize, Serialize};

/// Cover used when the API gives none.
pub const DEFAULT_COVER: &str = "https://github.com/LNReader/lnreader-plugins/blob/main/icons/src/coverNotAvailable.jpg?raw=true";

/// Publication status shared across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NovelStatus {
    Ongoing,
    Completed,
    #[serde(rename = "On Hiatus")]
    OnHiatus,
    Cancelled,
    Unknown,
}

impl NovelStatus {
    /// Map the API's numeric status code. Unrecognized codes are `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => NovelStatus::Ongoing,
            2 => NovelStatus::Completed,
            3 => NovelStatus::OnHiatus,
            4 => NovelStatus::Cancelled,
            _ => NovelStatus::Unknown,
        }
    }
}

/// Catalog/search entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovelItem {
    pub name: String,
    pub cover: String,
    pub path: String,
}

/// One chapter in a novel's chapter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterItem {
    pub name: String,
    /// `slug/volume/number[/branchId]`, see [ChapterPath](crate::scraper::ChapterPath).
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<f64>,
    /// Translation team label. Dropped when every chapter has the same one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

/// Full novel record with its chapter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceNovel {
    pub path: String,
    pub name: String,
    pub cover: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NovelStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Genre and tag names, comma separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterItem>,
}
