//! Catalog filters and the listing query string.

/// Site id the catalog endpoint is scoped to (ranobe).
pub const SITE_ID: u32 = 3;

/// Sort field for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    RateAvg,
    #[default]
    RatingScore,
    Views,
    ChapterCount,
    LastChapterAt,
    CreatedAt,
    Name,
    RusName,
}

impl SortBy {
    pub const ALL: [SortBy; 8] = [
        SortBy::RateAvg,
        SortBy::RatingScore,
        SortBy::Views,
        SortBy::ChapterCount,
        SortBy::LastChapterAt,
        SortBy::CreatedAt,
        SortBy::Name,
        SortBy::RusName,
    ];

    /// Value sent as `sort_by`.
    pub fn as_param(self) -> &'static str {
        match self {
            SortBy::RateAvg => "rate_avg",
            SortBy::RatingScore => "rating_score",
            SortBy::Views => "views",
            SortBy::ChapterCount => "chap_count",
            SortBy::LastChapterAt => "last_chapter_at",
            SortBy::CreatedAt => "created_at",
            SortBy::Name => "name",
            SortBy::RusName => "rus_name",
        }
    }

    pub fn from_param(s: &str) -> Option<SortBy> {
        SortBy::ALL.into_iter().find(|sort| sort.as_param() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortType {
    Asc,
    #[default]
    Desc,
}

impl SortType {
    pub fn as_param(self) -> &'static str {
        match self {
            SortType::Asc => "asc",
            SortType::Desc => "desc",
        }
    }
}

/// Known values for the `types[]` group (origin of the work).
pub const TYPE_OPTIONS: &[(&str, &str)] = &[
    ("10", "Япония"),
    ("11", "Корея"),
    ("12", "Китай"),
    ("13", "Английский"),
    ("14", "Авторский"),
    ("15", "Фанфик"),
];

/// Known values for the `scanlateStatus[]` group (translation status).
pub const SCANLATE_STATUS_OPTIONS: &[(&str, &str)] = &[
    ("1", "Продолжается"),
    ("2", "Завершен"),
    ("3", "Заморожен"),
    ("4", "Заброшен"),
];

/// Known values for the `manga_status[]` group (title status).
pub const TITLE_STATUS_OPTIONS: &[(&str, &str)] = &[
    ("1", "Онгоинг"),
    ("2", "Завершён"),
    ("3", "Анонс"),
    ("4", "Приостановлен"),
    ("5", "Выпуск прекращён"),
];

/// Known values for the `genres[]` and `genres_exclude[]` groups. Not exhaustive; any id the
/// site accepts can be passed.
pub const GENRE_OPTIONS: &[(&str, &str)] = &[
    ("32", "Арт"),
    ("91", "Безумие"),
    ("34", "Боевик"),
    ("74", "Яой"),
];

/// Known values for the `tags[]` and `tags_exclude[]` groups. Not exhaustive.
pub const TAG_OPTIONS: &[(&str, &str)] = &[
    ("328", "Авантюристы"),
    ("175", "Антигерой"),
    ("165", "Якудза"),
];

/// A filter group where values can be required or excluded (genres, tags).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Excludable {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Listing filters. `Default` matches the site's own defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub sort_by: SortBy,
    pub sort_type: SortType,
    /// Only titles that have at least one chapter.
    pub require_chapters: bool,
    pub types: Vec<String>,
    pub scanlate_status: Vec<String>,
    pub title_status: Vec<String>,
    pub genres: Excludable,
    pub tags: Excludable,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            sort_by: SortBy::default(),
            sort_type: SortType::default(),
            require_chapters: true,
            types: Vec::new(),
            scanlate_status: Vec::new(),
            title_status: Vec::new(),
            genres: Excludable::default(),
            tags: Excludable::default(),
        }
    }
}

/// Options for a catalog listing.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Sort by latest chapter regardless of `filters.sort_by`.
    pub show_latest: bool,
    pub filters: Filters,
}

/// Build the query string (without a leading `?`) for one catalog page.
pub fn listing_query(page: u32, options: &ListOptions) -> String {
    let filters = &options.filters;
    let sort_by = if options.show_latest {
        SortBy::LastChapterAt
    } else {
        filters.sort_by
    };
    let mut query = format!(
        "site_id[0]={}&page={}&sort_by={}&sort_type={}",
        SITE_ID,
        page,
        sort_by.as_param(),
        filters.sort_type.as_param()
    );
    if filters.require_chapters {
        query.push_str("&chapters[min]=1");
    }
    push_group(&mut query, "types[]", &filters.types);
    push_group(&mut query, "scanlateStatus[]", &filters.scanlate_status);
    push_group(&mut query, "manga_status[]", &filters.title_status);
    push_group(&mut query, "genres[]", &filters.genres.include);
    push_group(&mut query, "genres_exclude[]", &filters.genres.exclude);
    push_group(&mut query, "tags[]", &filters.tags.include);
    push_group(&mut query, "tags_exclude[]", &filters.tags.exclude);
    query
}

/// Build the query string for a title search.
pub fn search_query(term: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
    format!("site_id[0]={}&q={}", SITE_ID, encoded)
}

/// Append `&key=value` for each non-empty value; nothing for an empty group. Values are
/// form-encoded, keys are written as-is.
fn push_group(query: &mut String, key: &str, values: &[String]) {
    for value in values.iter().filter(|v| !v.is_empty()) {
        query.push('&');
        query.push_str(key);
        query.push('=');
        query.extend(url::form_urlencoded::byte_serialize(value.as_bytes()));
    }
}
