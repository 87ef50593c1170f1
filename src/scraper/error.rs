//! Shared error type for API access. Nothing here is recovered locally; every variant is
//! surfaced to the caller as-is.

use crate::storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead { url: String, source: reqwest::Error },

    #[error("Invalid JSON from {url}: {source}")]
    Json {
        url: String,
        source: serde_json::Error,
    },

    #[error("Unexpected response shape from {url}: {source}")]
    Shape {
        url: String,
        source: serde_json::Error,
    },

    #[error("Invalid chapter path '{path}': expected slug/volume/number[/branch]")]
    InvalidPath { path: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}
