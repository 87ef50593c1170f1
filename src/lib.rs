//! ranobelib: RanobeLib API adapter. Catalog listings, novel details, chapter lists and
//! rendered chapter text in a shared reader schema.

pub mod auth;
pub mod cli;
pub mod config;
pub mod doc;
pub mod filters;
pub mod formats;
pub mod model;
pub mod scraper;
pub mod storage;

// Re-exports for CLI and consumers.
pub use doc::{render, Attachment, ContentNode, Document};
pub use filters::{Filters, ListOptions};
pub use formats::{FormatError, NovelExport, OutputFormat};
pub use model::{ChapterItem, NovelItem, NovelStatus, SourceNovel};
pub use scraper::ranobelib::RanobeLib;
pub use scraper::{ApiClient, ApiClientBuilder, ChapterPath, Fetch, NovelSource, ScraperError};
pub use storage::{FileStore, KeyValueStore, LocalStorage, MemoryStore, StorageError};
