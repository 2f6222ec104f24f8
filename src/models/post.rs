//! Forum post model, feed parameters and pagination

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Posts and comments per page
pub const FORUM_PAGE_SIZE: u32 = 10;

/// A forum post with its engagement counters.
///
/// Counters are never negative and `heat_score` is only ever written by the
/// repository after recomputing it from the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// UUID v4 string
    pub id: String,
    pub author_id: i64,
    /// Author display name, joined from `users`
    pub author_name: String,
    /// `None` for posts on the global board
    pub course_id: Option<i64>,
    pub category_id: Option<i64>,
    pub title: String,
    pub content: String,
    /// Comma separated free-text tags
    pub tags: String,
    pub is_anonymous: bool,
    pub like_count: i64,
    pub collect_count: i64,
    pub comment_count: i64,
    pub view_count: i64,
    pub heat_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Tags split on commas, trimmed, empties dropped
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn engagement(&self) -> Engagement {
        Engagement {
            likes: self.like_count,
            comments: self.comment_count,
            collects: self.collect_count,
        }
    }
}

/// The counters that feed the heat score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Engagement {
    pub likes: i64,
    pub comments: i64,
    pub collects: i64,
}

/// Input for creating a post
#[derive(Debug, Clone, Default)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub course_id: Option<i64>,
    pub category_id: Option<i64>,
    pub tags: String,
    pub is_anonymous: bool,
}

/// Partial update of a post. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
    pub tags: Option<String>,
    pub is_anonymous: Option<bool>,
}

impl UpdatePostInput {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.category_id.is_none()
            && self.tags.is_none()
            && self.is_anonymous.is_none()
    }
}

/// Which board a feed is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    Course(i64),
    /// Posts that belong to no course
    Global,
}

/// Feed ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSort {
    /// Heat score, newest first on ties
    #[default]
    Heat,
    Newest,
    /// Most viewed
    Popular,
}

impl FeedSort {
    /// Parse a query parameter; anything unrecognised ranks by heat.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("newest") => FeedSort::Newest,
            Some("popular") => FeedSort::Popular,
            _ => FeedSort::Heat,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedSort::Heat => "heat",
            FeedSort::Newest => "newest",
            FeedSort::Popular => "popular",
        }
    }
}

/// A feed request
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub scope: FeedScope,
    /// Case-insensitive substring of title or content
    pub keyword: Option<String>,
    pub category_id: Option<i64>,
    pub sort: FeedSort,
    pub params: ListParams,
}

impl FeedQuery {
    pub fn new(scope: FeedScope) -> Self {
        Self {
            scope,
            keyword: None,
            category_id: None,
            sort: FeedSort::default(),
            params: ListParams::default(),
        }
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        let trimmed = keyword.trim();
        self.keyword = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn sort(mut self, sort: FeedSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.params = ListParams::page(page);
        self
    }
}

/// Result of a like or collect toggle, read inside the same transaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToggleOutcome {
    /// Membership after the toggle
    pub active: bool,
    /// Counter after the toggle
    pub count: i64,
    pub heat_score: f64,
}

/// Pagination parameters (1-indexed, fixed page size)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: FORUM_PAGE_SIZE,
        }
    }
}

impl ListParams {
    /// Forum page `page`; zero is treated as the first page
    pub fn page(page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: FORUM_PAGE_SIZE,
        }
    }

    /// Parse a raw `page` query value; missing or malformed means page 1.
    pub fn from_param(value: Option<&str>) -> Self {
        let page = value
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p.min(u32::MAX as i64) as u32)
            .unwrap_or(1);
        Self::page(page)
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Matching rows across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        ((self.total as u64 + self.per_page as u64 - 1) / self.per_page as u64) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_from_param_falls_back_to_heat() {
        assert_eq!(FeedSort::from_param(Some("newest")), FeedSort::Newest);
        assert_eq!(FeedSort::from_param(Some(" POPULAR ")), FeedSort::Popular);
        assert_eq!(FeedSort::from_param(Some("heat")), FeedSort::Heat);
        assert_eq!(FeedSort::from_param(Some("random")), FeedSort::Heat);
        assert_eq!(FeedSort::from_param(None), FeedSort::Heat);
    }

    #[test]
    fn test_page_param_parsing() {
        assert_eq!(ListParams::from_param(Some("3")).page, 3);
        assert_eq!(ListParams::from_param(Some("0")).page, 1);
        assert_eq!(ListParams::from_param(Some("-4")).page, 1);
        assert_eq!(ListParams::from_param(Some("abc")).page, 1);
        assert_eq!(ListParams::from_param(None).page, 1);
        assert_eq!(ListParams::from_param(Some("99999999999")).page, u32::MAX);
    }

    #[test]
    fn test_offset_does_not_overflow() {
        let params = ListParams::page(u32::MAX);
        assert_eq!(params.offset(), (u32::MAX as i64 - 1) * 10);
        assert_eq!(ListParams::page(1).offset(), 0);
        assert_eq!(ListParams::page(3).offset(), 20);
    }

    #[test]
    fn test_total_pages() {
        let params = ListParams::page(1);
        assert_eq!(PagedResult::<i32>::new(vec![], 0, &params).total_pages(), 0);
        assert_eq!(PagedResult::<i32>::new(vec![], 10, &params).total_pages(), 1);
        assert_eq!(PagedResult::<i32>::new(vec![], 11, &params).total_pages(), 2);
    }

    #[test]
    fn test_blank_keyword_is_ignored() {
        let query = FeedQuery::new(FeedScope::Global).keyword("   ");
        assert!(query.keyword.is_none());
        let query = FeedQuery::new(FeedScope::Global).keyword(" rust ");
        assert_eq!(query.keyword.as_deref(), Some("rust"));
    }

    #[test]
    fn test_tag_list() {
        let post = Post {
            id: "p".into(),
            author_id: 1,
            author_name: "A".into(),
            course_id: None,
            category_id: None,
            title: "t".into(),
            content: "c".into(),
            tags: "rust, async,, sql ".into(),
            is_anonymous: false,
            like_count: 0,
            collect_count: 0,
            comment_count: 0,
            view_count: 0,
            heat_score: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(post.tag_list(), vec!["rust", "async", "sql"]);
    }
}
