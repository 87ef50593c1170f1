//! RanobeLib adapter. Builds API URLs, attaches the user's bearer token, and maps API JSON
//! onto the shared schema in [crate::model].
//!
//! A detail page costs two requests (novel, then its chapter list); everything else is one.

use crate::auth::{self, Credential};
use crate::doc::{self, Attachment, ContentNode};
use crate::filters::{self, ListOptions};
use crate::model::{ChapterItem, NovelItem, NovelStatus, SourceNovel, DEFAULT_COVER};
use crate::scraper::{ChapterPath, Fetch, NovelSource, ScraperError};
use crate::storage::{KeyValueStore, LocalStorage};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::cell::OnceCell;
use std::collections::{BTreeSet, HashMap};

pub const SITE: &str = "https://ranobelib.me";
pub const API_BASE: &str = "https://api.cdnlibs.org/api/manga/";

const DETAIL_FIELDS: &str = "fields[]=summary&fields[]=genres&fields[]=tags&fields[]=teams&fields[]=authors&fields[]=status_id&fields[]=artists";
const MAIN_BRANCH_ID: &str = "0";
const MAIN_BRANCH_LABEL: &str = "Главная страница";
const UNKNOWN_BRANCH_LABEL: &str = "Неизвестный";
const UNKNOWN_TITLE: &str = "Unknown Title";
const RELEASE_TIME_FORMAT: &str = "%B %-d, %Y %-I:%M %p";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct OptionalEnvelope<T> {
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCover {
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawListItem {
    #[serde(default)]
    rus_name: Option<String>,
    #[serde(default)]
    eng_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    cover: Option<RawCover>,
    #[serde(default)]
    slug_url: Option<String>,
    #[serde(default)]
    id: Value,
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNamed {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    #[serde(default)]
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawTeamDetails {
    #[serde(default)]
    branch_id: Value,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    details: Option<RawTeamDetails>,
}

#[derive(Debug, Deserialize)]
struct RawNovel {
    #[serde(default)]
    rus_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    cover: Option<RawCover>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<RawStatus>,
    #[serde(default)]
    authors: Option<Vec<RawNamed>>,
    #[serde(default)]
    artists: Option<Vec<RawNamed>>,
    #[serde(default)]
    genres: Option<Vec<RawNamed>>,
    #[serde(default)]
    tags: Option<Vec<RawNamed>>,
    #[serde(default)]
    teams: Option<Vec<RawTeam>>,
}

#[derive(Debug, Deserialize)]
struct RawBranch {
    #[serde(default)]
    branch_id: Value,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChapter {
    #[serde(default)]
    volume: Value,
    #[serde(default)]
    number: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    index: Option<f64>,
    #[serde(default)]
    branches: Option<Vec<RawBranch>>,
}

/// Text of a scalar JSON value (strings as-is, numbers in decimal); None for null/absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First candidate that is present and non-empty.
fn first_present<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|s| !s.is_empty())
}

fn cover_of(cover: Option<&RawCover>) -> String {
    first_present(&[cover.and_then(|c| c.default.as_deref())])
        .unwrap_or(DEFAULT_COVER)
        .to_string()
}

fn decode<T: DeserializeOwned>(value: Value, url: &str) -> Result<T, ScraperError> {
    serde_json::from_value(value).map_err(|e| ScraperError::Shape {
        url: url.to_string(),
        source: e,
    })
}

/// Map a listing item. `fallback_name` is used when no name field is present.
fn novel_item(raw: &RawListItem, fallback_name: Option<&str>) -> NovelItem {
    let name = first_present(&[
        raw.rus_name.as_deref(),
        raw.eng_name.as_deref(),
        raw.name.as_deref(),
        fallback_name,
    ])
    .unwrap_or_default()
    .to_string();
    let path = match first_present(&[raw.slug_url.as_deref()]) {
        Some(slug_url) => slug_url.to_string(),
        None => format!(
            "{}--{}",
            scalar_text(&raw.id).unwrap_or_default(),
            raw.slug.as_deref().unwrap_or_default()
        ),
    };
    NovelItem {
        name,
        cover: cover_of(raw.cover.as_ref()),
        path,
    }
}

/// Map a listing response body. Anything but an array under `data` is an empty page.
fn novel_items(
    body: Value,
    url: &str,
    fallback_name: Option<&str>,
) -> Result<Vec<NovelItem>, ScraperError> {
    let data = match body.get("data") {
        Some(Value::Array(_)) => body["data"].clone(),
        _ => {
            tracing::debug!(url, "listing has no data array");
            return Ok(Vec::new());
        }
    };
    let raw: Vec<RawListItem> = decode(data, url)?;
    Ok(raw.iter().map(|r| novel_item(r, fallback_name)).collect())
}

/// Branch id → team label, seeded with the main branch.
fn team_labels(teams: &[RawTeam]) -> HashMap<String, Option<String>> {
    let mut labels = HashMap::new();
    labels.insert(
        MAIN_BRANCH_ID.to_string(),
        Some(MAIN_BRANCH_LABEL.to_string()),
    );
    for team in teams {
        let branch_id = team
            .details
            .as_ref()
            .and_then(|d| scalar_text(&d.branch_id))
            .unwrap_or_else(|| MAIN_BRANCH_ID.to_string());
        labels.insert(branch_id, team.name.clone());
    }
    labels
}

fn format_release_time(created_at: &str) -> Option<String> {
    match chrono::DateTime::parse_from_rfc3339(created_at) {
        Ok(t) => Some(t.format(RELEASE_TIME_FORMAT).to_string()),
        Err(e) => {
            tracing::debug!("unparsed created_at {:?}: {}", created_at, e);
            None
        }
    }
}

/// One chapter item per (chapter, branch) pair, in API order.
fn chapter_items(
    slug: &str,
    chapters: &[RawChapter],
    labels: &HashMap<String, Option<String>>,
) -> Vec<ChapterItem> {
    let mut items = Vec::new();
    for chapter in chapters {
        let volume = scalar_text(&chapter.volume).unwrap_or_default();
        let number = scalar_text(&chapter.number).unwrap_or_default();
        let mut name = format!("Том {} Глава {}", volume, number);
        if let Some(title) = chapter
            .name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            name.push(' ');
            name.push_str(title);
        }
        for branch in chapter.branches.as_deref().unwrap_or_default() {
            let branch_id = scalar_text(&branch.branch_id);
            let path = ChapterPath {
                slug: slug.to_string(),
                volume: volume.clone(),
                number: number.clone(),
                branch_id: branch_id.clone(),
            };
            let label = labels
                .get(branch_id.as_deref().unwrap_or(MAIN_BRANCH_ID))
                .and_then(|l| first_present(&[l.as_deref()]))
                .unwrap_or(UNKNOWN_BRANCH_LABEL);
            items.push(ChapterItem {
                name: name.clone(),
                path: path.to_string(),
                release_time: branch.created_at.as_deref().and_then(format_release_time),
                chapter_number: chapter.index,
                page: Some(label.to_string()),
            });
        }
    }
    items
}

/// Collapse or order chapters by team label.
///
/// One distinct label: labels are dropped. Several labels with more than one registered
/// team: stable sort by label, then chapter index. Otherwise API order is kept.
pub fn group_by_branch(chapters: &mut [ChapterItem], team_count: usize) {
    let labels: BTreeSet<Option<&str>> = chapters.iter().map(|c| c.page.as_deref()).collect();
    if labels.len() == 1 {
        for chapter in chapters.iter_mut() {
            chapter.page = None;
        }
    } else if team_count > 1 {
        chapters.sort_by(|a, b| {
            a.page.cmp(&b.page).then_with(|| {
                a.chapter_number
                    .unwrap_or(0.0)
                    .total_cmp(&b.chapter_number.unwrap_or(0.0))
            })
        });
    }
}

/// Render the `data` object of a chapter response.
///
/// A `doc` tree is rendered with the response's attachments; a string body is returned
/// verbatim; anything else is empty.
pub fn chapter_body(data: &Value, url: &str) -> String {
    match data.get("content") {
        Some(content) if content.get("type").and_then(Value::as_str) == Some("doc") => {
            let nodes = content
                .get("content")
                .map(ContentNode::list_from_value)
                .unwrap_or_default();
            doc::render(&nodes, &attachments(data, url))
        }
        Some(Value::String(html)) => html.clone(),
        _ => String::new(),
    }
}

/// Attachments of a chapter response. Entries that do not decode are skipped.
fn attachments(data: &Value, url: &str) -> Vec<Attachment> {
    let Some(raw) = data.get("attachments").and_then(Value::as_array) else {
        return Vec::new();
    };
    raw.iter()
        .filter_map(|entry| match Attachment::deserialize(entry) {
            Ok(attachment) => Some(attachment),
            Err(e) => {
                tracing::debug!("{}: skipping attachment: {}", url, e);
                None
            }
        })
        .collect()
}

/// RanobeLib source over a [Fetch] client and a token store.
pub struct RanobeLib<F, S> {
    client: F,
    store: S,
    api_base: String,
    site: String,
    user: OnceCell<Option<Credential>>,
}

impl<F, S> RanobeLib<F, S>
where
    F: Fetch,
    S: KeyValueStore + LocalStorage,
{
    pub fn new(client: F, store: S) -> Self {
        Self {
            client,
            store,
            api_base: API_BASE.to_string(),
            site: SITE.to_string(),
            user: OnceCell::new(),
        }
    }

    /// Override the API base (must end with `/`).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The user's credential, resolved on first use and kept for the adapter's lifetime.
    pub fn credential(&mut self) -> Option<&Credential> {
        let store = &mut self.store;
        self.user
            .get_or_init(|| {
                let resolved = auth::resolve_credential(&*store, &*store, auth::now_ms())?;
                if let Err(e) = auth::promote(store, &resolved) {
                    tracing::warn!("could not cache credential: {}", e);
                }
                Some(resolved.credential)
            })
            .as_ref()
    }

    /// Take the credential from the local auth blob and cache it, replacing any cached
    /// credential. Returns None when the blob is missing or incomplete.
    pub fn login(&mut self) -> Result<Option<&Credential>, ScraperError> {
        let Some(resolved) = auth::from_local_auth(&self.store) else {
            return Ok(None);
        };
        auth::promote(&mut self.store, &resolved)?;
        self.user = OnceCell::from(Some(resolved.credential));
        Ok(self.user.get().and_then(Option::as_ref))
    }

    fn headers(&mut self) -> Vec<(String, String)> {
        self.credential().map(Credential::headers).unwrap_or_default()
    }

    fn fetch(&mut self, url: &str) -> Result<Value, ScraperError> {
        let headers = self.headers();
        self.client.fetch_json(url, &headers)
    }

    /// Site (reader) URL for a novel slug or a chapter path, carrying `ui` when logged in.
    pub fn resolve_url(&mut self, path: &str, is_novel: bool) -> Result<String, ScraperError> {
        let site = self.site.clone();
        let ui = self.credential().map(|c| format!("ui={}", c.user_id));
        if is_novel {
            let query = ui.map(|ui| format!("?{}", ui)).unwrap_or_default();
            return Ok(format!("{}/ru/book/{}{}", site, path, query));
        }
        let chapter: ChapterPath = path.parse()?;
        let mut url = format!(
            "{}/ru/{}/read/v{}/c{}",
            site, chapter.slug, chapter.volume, chapter.number
        );
        if let Some(branch) = &chapter.branch_id {
            url.push_str("?bid=");
            url.push_str(branch);
        }
        if let Some(ui) = ui {
            url.push(if chapter.branch_id.is_some() { '&' } else { '?' });
            url.push_str(&ui);
        }
        Ok(url)
    }
}

impl<F, S> NovelSource for RanobeLib<F, S>
where
    F: Fetch,
    S: KeyValueStore + LocalStorage,
{
    fn list_popular(
        &mut self,
        page: u32,
        options: &ListOptions,
    ) -> Result<Vec<NovelItem>, ScraperError> {
        let url = format!("{}?{}", self.api_base, filters::listing_query(page, options));
        let body = self.fetch(&url)?;
        novel_items(body, &url, None)
    }

    fn get_detail(&mut self, path: &str) -> Result<SourceNovel, ScraperError> {
        let url = format!("{}{}?{}", self.api_base, path, DETAIL_FIELDS);
        let body = self.fetch(&url)?;
        let raw: Envelope<RawNovel> = decode(body, &url)?;
        let raw = raw.data;

        let mut novel = SourceNovel {
            path: path.to_string(),
            name: first_present(&[
                raw.rus_name.as_deref(),
                raw.name.as_deref(),
                Some(UNKNOWN_TITLE),
            ])
            .unwrap_or(UNKNOWN_TITLE)
            .to_string(),
            cover: cover_of(raw.cover.as_ref()),
            summary: raw.summary.as_deref().map(|s| s.trim().to_string()),
            status: raw
                .status
                .as_ref()
                .and_then(|s| s.id)
                .map(NovelStatus::from_code),
            author: raw
                .authors
                .as_deref()
                .and_then(|a| a.first())
                .and_then(|a| a.name.clone()),
            artist: raw
                .artists
                .as_deref()
                .and_then(|a| a.first())
                .and_then(|a| a.name.clone()),
            genres: None,
            chapters: Vec::new(),
        };

        let genres: Vec<&str> = raw
            .genres
            .iter()
            .chain(raw.tags.iter())
            .flatten()
            .filter_map(|g| first_present(&[g.name.as_deref()]))
            .collect();
        if !genres.is_empty() {
            novel.genres = Some(genres.join(", "));
        }

        let teams = raw.teams.unwrap_or_default();
        let labels = team_labels(&teams);

        let chapters_url = format!("{}{}/chapters", self.api_base, path);
        let body = self.fetch(&chapters_url)?;
        let raw_chapters: OptionalEnvelope<Vec<RawChapter>> = decode(body, &chapters_url)?;
        let mut chapters = chapter_items(path, &raw_chapters.data.unwrap_or_default(), &labels);
        group_by_branch(&mut chapters, teams.len());
        tracing::debug!(path, chapters = chapters.len(), "parsed novel");
        novel.chapters = chapters;
        Ok(novel)
    }

    fn get_chapter_content(&mut self, path: &str) -> Result<String, ScraperError> {
        let chapter: ChapterPath = match path.parse() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("{}; returning empty chapter", e);
                return Ok(String::new());
            }
        };
        let url = format!(
            "{}{}/chapter?{}",
            self.api_base,
            chapter.slug,
            chapter.chapter_query()
        );
        let body = self.fetch(&url)?;
        match body.get("data") {
            Some(data) => Ok(chapter_body(data, &url)),
            None => Ok(String::new()),
        }
    }

    fn search(&mut self, query: &str) -> Result<Vec<NovelItem>, ScraperError> {
        let url = format!("{}?{}", self.api_base, filters::search_query(query));
        let body = self.fetch(&url)?;
        novel_items(body, &url, Some(UNKNOWN_TITLE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{LOCAL_AUTH_KEY, USER_KEY};
    use crate::scraper::testing::FakeFetch;
    use crate::storage::MemoryStore;
    use serde_json::json;

    const SLUG: &str = "123--book";

    fn detail_url() -> String {
        format!("{}{}?{}", API_BASE, SLUG, DETAIL_FIELDS)
    }

    fn chapters_url() -> String {
        format!("{}{}/chapters", API_BASE, SLUG)
    }

    fn source(fetch: FakeFetch) -> RanobeLib<FakeFetch, MemoryStore> {
        RanobeLib::new(fetch, MemoryStore::new())
    }

    #[test]
    fn listing_maps_names_covers_and_paths() -> Result<(), ScraperError> {
        let options = ListOptions::default();
        let url = format!("{}?{}", API_BASE, filters::listing_query(2, &options));
        let fetch = FakeFetch::default().with(
            url.clone(),
            json!({"data": [
                {"rus_name": "Р", "eng_name": "E", "name": "N", "cover": {"default": "c.jpg"}, "slug_url": "1--a", "id": 1, "slug": "a"},
                {"rus_name": null, "eng_name": "", "name": "N2", "id": 2, "slug": "b"},
                {"id": 3, "slug": "c", "cover": {"default": null}}
            ]}),
        );
        let mut src = source(fetch);
        let items = src.list_popular(2, &options)?;
        assert_eq!(
            items[0],
            NovelItem {
                name: "Р".into(),
                cover: "c.jpg".into(),
                path: "1--a".into()
            }
        );
        assert_eq!(items[1].name, "N2");
        assert_eq!(items[1].cover, DEFAULT_COVER);
        assert_eq!(items[1].path, "2--b");
        assert_eq!(items[2].name, "");
        assert_eq!(src.client.urls(), vec![url.as_str()]);
        Ok(())
    }

    #[test]
    fn listing_without_data_array_is_empty() -> Result<(), ScraperError> {
        let url = format!("{}?{}", API_BASE, filters::listing_query(1, &ListOptions::default()));
        let mut src = source(FakeFetch::default().with(url, json!({"data": null})));
        assert!(src.list_popular(1, &ListOptions::default())?.is_empty());
        Ok(())
    }

    #[test]
    fn search_falls_back_to_unknown_title() -> Result<(), ScraperError> {
        let url = format!("{}?{}", API_BASE, filters::search_query("x y"));
        let fetch = FakeFetch::default().with(
            url,
            json!({"data": [{"rus_name": null, "name": null, "slug_url": "9--z"}]}),
        );
        let mut src = source(fetch);
        let items = src.search("x y")?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Unknown Title");
        assert_eq!(items[0].path, "9--z");
        Ok(())
    }

    #[test]
    fn detail_maps_metadata_and_single_branch_drops_page() -> Result<(), ScraperError> {
        let fetch = FakeFetch::default()
            .with(
                detail_url(),
                json!({"data": {
                    "rus_name": null,
                    "name": "X",
                    "summary": "  Long story.  \n",
                    "status": {"id": 2},
                    "authors": [{"name": "Author A"}, {"name": "Author B"}],
                    "artists": [],
                    "genres": [{"name": "Фэнтези"}],
                    "tags": [{"name": "Магия"}, {"name": null}],
                    "teams": [{"name": "Team", "details": {"branch_id": 7}}]
                }}),
            )
            .with(
                chapters_url(),
                json!({"data": [
                    {"volume": "1", "number": "1", "name": " Start ", "index": 1,
                     "branches": [{"branch_id": 7, "created_at": "2024-05-01T15:04:05.000000Z"}]},
                    {"volume": "1", "number": "2", "name": null, "index": 2,
                     "branches": [{"branch_id": 7, "created_at": null}]}
                ]}),
            );
        let mut src = source(fetch);
        let novel = src.get_detail(SLUG)?;
        assert_eq!(novel.name, "X");
        assert_eq!(novel.cover, DEFAULT_COVER);
        assert_eq!(novel.summary.as_deref(), Some("Long story."));
        assert_eq!(novel.status, Some(NovelStatus::Completed));
        assert_eq!(novel.author.as_deref(), Some("Author A"));
        assert_eq!(novel.artist, None);
        assert_eq!(novel.genres.as_deref(), Some("Фэнтези, Магия"));
        assert_eq!(novel.chapters.len(), 2);
        assert_eq!(novel.chapters[0].name, "Том 1 Глава 1 Start");
        assert_eq!(novel.chapters[0].path, "123--book/1/1/7");
        assert_eq!(
            novel.chapters[0].release_time.as_deref(),
            Some("May 1, 2024 3:04 PM")
        );
        assert_eq!(novel.chapters[1].name, "Том 1 Глава 2");
        assert!(novel.chapters.iter().all(|c| c.page.is_none()));
        assert_eq!(src.client.urls(), vec![detail_url(), chapters_url()]);
        Ok(())
    }

    #[test]
    fn detail_name_falls_back_and_unknown_status() -> Result<(), ScraperError> {
        let fetch = FakeFetch::default()
            .with(
                detail_url(),
                json!({"data": {"rus_name": null, "name": null, "status": {"id": 9}}}),
            )
            .with(chapters_url(), json!({"data": []}));
        let mut src = source(fetch);
        let novel = src.get_detail(SLUG)?;
        assert_eq!(novel.name, "Unknown Title");
        assert_eq!(novel.status, Some(NovelStatus::Unknown));
        assert!(novel.chapters.is_empty());
        assert_eq!(novel.genres, None);
        Ok(())
    }

    #[test]
    fn multiple_teams_sort_by_label_then_index() -> Result<(), ScraperError> {
        let fetch = FakeFetch::default()
            .with(
                detail_url(),
                json!({"data": {"name": "N", "teams": [
                    {"name": "Бета", "details": {"branch_id": 2}},
                    {"name": "Альфа", "details": {"branch_id": 1}}
                ]}}),
            )
            .with(
                chapters_url(),
                json!({"data": [
                    {"volume": 1, "number": 2, "index": 2, "branches": [{"branch_id": 2}, {"branch_id": 1}]},
                    {"volume": 1, "number": 1, "index": 1, "branches": [{"branch_id": 2}, {"branch_id": 1}]}
                ]}),
            );
        let mut src = source(fetch);
        let novel = src.get_detail(SLUG)?;
        let order: Vec<(&str, &str)> = novel
            .chapters
            .iter()
            .map(|c| (c.page.as_deref().unwrap_or_default(), c.path.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Альфа", "123--book/1/1/1"),
                ("Альфа", "123--book/1/2/1"),
                ("Бета", "123--book/1/1/2"),
                ("Бета", "123--book/1/2/2"),
            ]
        );
        Ok(())
    }

    #[test]
    fn several_labels_with_one_team_keep_api_order() {
        let mut labels = HashMap::new();
        labels.insert("0".to_string(), Some(MAIN_BRANCH_LABEL.to_string()));
        labels.insert("5".to_string(), Some("Team".to_string()));
        let raw: Vec<RawChapter> = match serde_json::from_value(json!([
            {"volume": 1, "number": 2, "index": 2, "branches": [{"branch_id": 5}]},
            {"volume": 1, "number": 1, "index": 1, "branches": [{"branch_id": null}, {"branch_id": 99}]}
        ])) {
            Ok(r) => r,
            Err(e) => panic!("fixture: {}", e),
        };
        let mut chapters = chapter_items("s", &raw, &labels);
        group_by_branch(&mut chapters, 1);
        let paths: Vec<&str> = chapters.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["s/1/2/5", "s/1/1", "s/1/1/99"]);
        assert_eq!(chapters[1].page.as_deref(), Some(MAIN_BRANCH_LABEL));
        assert_eq!(chapters[2].page.as_deref(), Some(UNKNOWN_BRANCH_LABEL));
    }

    #[test]
    fn chapter_content_renders_doc_with_attachments() -> Result<(), ScraperError> {
        let url = format!("{}slug/chapter?branch_id=7&number=12&volume=3", API_BASE);
        let fetch = FakeFetch::default().with(
            url.clone(),
            json!({"data": {
                "content": {"type": "doc", "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "Hi"}]},
                    {"type": "image", "attrs": {"images": [{"image": "pic"}]}}
                ]},
                "attachments": [{"id": 1, "name": "pic", "url": "https://cdn/pic.png"}]
            }}),
        );
        let mut src = source(fetch);
        let body = src.get_chapter_content("slug/3/12/7")?;
        assert_eq!(body, "<p>Hi</p><img src='https://cdn/pic.png'>");
        assert_eq!(src.client.urls(), vec![url.as_str()]);
        Ok(())
    }

    #[test]
    fn chapter_body_survives_malformed_attachments() {
        let paragraph = json!({"type": "paragraph", "content": [{"type": "text", "text": "Hi"}]});
        let data = json!({
            "content": {"type": "doc", "content": [paragraph]},
            "attachments": [{"id": 1, "name": "pic", "url": null}]
        });
        assert_eq!(chapter_body(&data, "u"), "<p>Hi</p>");

        let data = json!({
            "content": {"type": "doc", "content": [
                paragraph,
                {"type": "image", "attrs": {"images": [{"image": "pic"}]}}
            ]},
            "attachments": ["junk", {"id": 2, "name": "pic", "url": "https://cdn/pic.png"}]
        });
        assert_eq!(chapter_body(&data, "u"), "<p>Hi</p><img src='https://cdn/pic.png'>");

        let data = json!({
            "content": {"type": "doc", "content": [paragraph]},
            "attachments": {"unexpected": true}
        });
        assert_eq!(chapter_body(&data, "u"), "<p>Hi</p>");
    }

    #[test]
    fn chapter_content_string_body_is_verbatim()-> Result<(), ScraperError> {
        let url = format!("{}slug/chapter?number=1&volume=1", API_BASE);
        let fetch =
            FakeFetch::default().with(url, json!({"data": {"content": "<p>raw</p>"}}));
        let mut src = source(fetch);
        assert_eq!(src.get_chapter_content("slug/1/1")?, "<p>raw</p>");
        Ok(())
    }

    #[test]
    fn chapter_content_bad_path_is_empty_without_request() -> Result<(), ScraperError> {
        let mut src = source(FakeFetch::default());
        assert_eq!(src.get_chapter_content("slug")?, "");
        assert!(src.client.requests.is_empty());
        Ok(())
    }

    #[test]
    fn transport_errors_propagate() {
        let mut src = source(FakeFetch::default());
        assert!(matches!(
            src.search("nothing"),
            Err(ScraperError::HttpStatus { status: 404, .. })
        ));
    }

    #[test]
    fn requests_carry_bearer_and_promote_local_auth() -> Result<(), ScraperError> {
        let url = format!("{}?{}", API_BASE, filters::search_query("q"));
        let store = MemoryStore::new().with_local_item(
            LOCAL_AUTH_KEY,
            r#"{"auth":{"id":42},"token":{"access_token":"tok","timestamp":4102444800000,"expires_in":3600}}"#,
        );
        let mut src = RanobeLib::new(FakeFetch::default().with(url, json!({"data": []})), store);
        src.search("q")?;
        src.search("q")?;
        for (_, headers) in &src.client.requests {
            assert_eq!(
                headers,
                &vec![("Authorization".to_string(), "Bearer tok".to_string())]
            );
        }
        assert_eq!(src.store().expiry_of(USER_KEY), Some(4102444800000 + 3600));
        Ok(())
    }

    #[test]
    fn login_replaces_valid_cached_credential() -> Result<(), ScraperError> {
        let far_future = 4102444800000;
        let mut store = MemoryStore::new().with_local_item(
            LOCAL_AUTH_KEY,
            r#"{"auth":{"id":2},"token":{"access_token":"NEW","timestamp":4102444800000,"expires_in":60}}"#,
        );
        store.set(USER_KEY, json!({"id": 1, "token": "OLD"}), Some(far_future))?;
        let mut src = RanobeLib::new(FakeFetch::default(), store);

        let logged_in = src.login()?.cloned();
        assert_eq!(
            logged_in,
            Some(Credential {
                user_id: "2".to_string(),
                token: "NEW".to_string()
            })
        );
        assert_eq!(src.credential().map(|c| c.token.as_str()), Some("NEW"));
        assert_eq!(src.store().expiry_of(USER_KEY), Some(far_future + 60));
        let cached = auth::from_cache(src.store(), 0);
        assert_eq!(cached.map(|c| c.token), Some("NEW".to_string()));
        Ok(())
    }

    #[test]
    fn login_without_blob_keeps_cache() -> Result<(), ScraperError> {
        let mut store = MemoryStore::new();
        store.set(USER_KEY, json!({"id": 1, "token": "OLD"}), None)?;
        let mut src = RanobeLib::new(FakeFetch::default(), store);
        assert!(src.login()?.is_none());
        assert_eq!(src.credential().map(|c| c.token.as_str()), Some("OLD"));
        Ok(())
    }

    #[test]
    fn resolve_url_for_novel_and_chapter() -> Result<(), ScraperError> {
        let mut anonymous = source(FakeFetch::default());
        assert_eq!(
            anonymous.resolve_url(SLUG, true)?,
            "https://ranobelib.me/ru/book/123--book"
        );
        assert_eq!(
            anonymous.resolve_url("s/1/2", false)?,
            "https://ranobelib.me/ru/s/read/v1/c2"
        );

        let mut store = MemoryStore::new();
        store.set(USER_KEY, json!({"id": 5, "token": "t"}), None)?;
        let mut user = RanobeLib::new(FakeFetch::default(), store);
        assert_eq!(
            user.resolve_url(SLUG, true)?,
            "https://ranobelib.me/ru/book/123--book?ui=5"
        );
        assert_eq!(
            user.resolve_url("s/1/2/9", false)?,
            "https://ranobelib.me/ru/s/read/v1/c2?bid=9&ui=5"
        );
        assert_eq!(
            user.resolve_url("s/1/2", false)?,
            "https://ranobelib.me/ru/s/read/v1/c2?ui=5"
        );
        Ok(())
    }
}
