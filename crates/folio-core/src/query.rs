//! Query/filter builder.
//!
//! Turns flat request parameters (`category=travel`, `createdAt[gte]=2024-01-01`,
//! `sort=-viewCount,title`, `page=2`, `limit=20`) into a typed [`PostQuery`].
//! Only allow-listed field/operator pairs are accepted; anything else is a
//! validation error. Store adapters evaluate the typed predicates, either in
//! memory via [`Predicate::matches`] or by translating them to SQL.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Category, Post};
use crate::error::{DomainError, DomainResult};

pub const DEFAULT_PAGE_LIMIT: u64 = 10;
pub const MAX_PAGE_LIMIT: u64 = 100;

const RESERVED_PARAMS: [&str; 4] = ["select", "sort", "page", "limit"];

/// Post fields addressable by filters, sorting and projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostField {
    Id,
    Title,
    Slug,
    Excerpt,
    Content,
    CoverImage,
    Category,
    Tags,
    Featured,
    Author,
    LikeCount,
    CommentCount,
    ViewCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Id,
    Text,
    LongText,
    Category,
    TagSet,
    Flag,
    Count,
    Timestamp,
}

impl PostField {
    const ALL: [PostField; 15] = [
        PostField::Id,
        PostField::Title,
        PostField::Slug,
        PostField::Excerpt,
        PostField::Content,
        PostField::CoverImage,
        PostField::Category,
        PostField::Tags,
        PostField::Featured,
        PostField::Author,
        PostField::LikeCount,
        PostField::CommentCount,
        PostField::ViewCount,
        PostField::CreatedAt,
        PostField::UpdatedAt,
    ];

    /// Accepts the request spelling (`createdAt`) and the stored one (`created_at`).
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == name || f.column() == name)
            .or(match name {
                "views" => Some(PostField::ViewCount),
                "likes" => Some(PostField::LikeCount),
                "author_id" | "authorId" => Some(PostField::Author),
                _ => None,
            })
    }

    /// Request-facing name.
    pub fn name(&self) -> &'static str {
        match self {
            PostField::Id => "id",
            PostField::Title => "title",
            PostField::Slug => "slug",
            PostField::Excerpt => "excerpt",
            PostField::Content => "content",
            PostField::CoverImage => "coverImage",
            PostField::Category => "category",
            PostField::Tags => "tags",
            PostField::Featured => "featured",
            PostField::Author => "author",
            PostField::LikeCount => "likeCount",
            PostField::CommentCount => "commentCount",
            PostField::ViewCount => "viewCount",
            PostField::CreatedAt => "createdAt",
            PostField::UpdatedAt => "updatedAt",
        }
    }

    /// Stored name, shared by the serialized [`Post`] and the database column.
    pub fn column(&self) -> &'static str {
        match self {
            PostField::Id => "id",
            PostField::Title => "title",
            PostField::Slug => "slug",
            PostField::Excerpt => "excerpt",
            PostField::Content => "content",
            PostField::CoverImage => "cover_image",
            PostField::Category => "category",
            PostField::Tags => "tags",
            PostField::Featured => "featured",
            PostField::Author => "author_id",
            PostField::LikeCount => "like_count",
            PostField::CommentCount => "comment_count",
            PostField::ViewCount => "view_count",
            PostField::CreatedAt => "created_at",
            PostField::UpdatedAt => "updated_at",
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            PostField::Id | PostField::Author => FieldKind::Id,
            PostField::Title | PostField::Slug => FieldKind::Text,
            PostField::Excerpt | PostField::Content | PostField::CoverImage => FieldKind::LongText,
            PostField::Category => FieldKind::Category,
            PostField::Tags => FieldKind::TagSet,
            PostField::Featured => FieldKind::Flag,
            PostField::LikeCount | PostField::CommentCount | PostField::ViewCount => {
                FieldKind::Count
            }
            PostField::CreatedAt | PostField::UpdatedAt => FieldKind::Timestamp,
        }
    }

    fn allows(&self, op: Op) -> bool {
        match self.kind() {
            FieldKind::LongText => false,
            FieldKind::Id | FieldKind::Text | FieldKind::Category | FieldKind::TagSet => {
                matches!(op, Op::Eq | Op::Ne | Op::In)
            }
            FieldKind::Flag => matches!(op, Op::Eq | Op::Ne),
            FieldKind::Count | FieldKind::Timestamp => true,
        }
    }

    fn sortable(&self) -> bool {
        !matches!(self.kind(), FieldKind::LongText | FieldKind::TagSet)
    }

    fn parse_value(&self, raw: &str) -> DomainResult<FilterValue> {
        let raw = raw.trim();
        let invalid = || {
            DomainError::validation(format!("invalid value '{}' for field '{}'", raw, self.name()))
        };
        Ok(match self.kind() {
            FieldKind::Id => FilterValue::Id(Uuid::parse_str(raw).map_err(|_| invalid())?),
            FieldKind::Text | FieldKind::LongText | FieldKind::TagSet => {
                FilterValue::Text(raw.to_string())
            }
            FieldKind::Category => FilterValue::Category(raw.parse()?),
            FieldKind::Flag => FilterValue::Flag(raw.parse().map_err(|_| invalid())?),
            FieldKind::Count => FilterValue::Count(raw.parse().map_err(|_| invalid())?),
            FieldKind::Timestamp => FilterValue::Timestamp(parse_timestamp(raw).ok_or_else(invalid)?),
        })
    }
}

/// Comparison operators. `Ne` is only reachable programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Op {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gt" => Some(Op::Gt),
            "gte" => Some(Op::Gte),
            "lt" => Some(Op::Lt),
            "lte" => Some(Op::Lte),
            "in" => Some(Op::In),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterValue {
    Id(Uuid),
    Text(String),
    Category(Category),
    Flag(bool),
    Count(u64),
    Timestamp(DateTime<Utc>),
}

/// One typed condition on a post field. `values` holds a single entry
/// except for `Op::In`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: PostField,
    pub op: Op,
    pub values: Vec<FilterValue>,
}

impl Predicate {
    pub fn new(field: PostField, op: Op, value: FilterValue) -> Self {
        Self {
            field,
            op,
            values: vec![value],
        }
    }

    pub fn eq(field: PostField, value: FilterValue) -> Self {
        Self::new(field, Op::Eq, value)
    }

    fn value_of(post: &Post, field: PostField) -> Vec<FilterValue> {
        match field {
            PostField::Id => vec![FilterValue::Id(post.id)],
            PostField::Author => vec![FilterValue::Id(post.author_id)],
            PostField::Title => vec![FilterValue::Text(post.title.clone())],
            PostField::Slug => vec![FilterValue::Text(post.slug.clone())],
            PostField::Excerpt => vec![FilterValue::Text(post.excerpt.clone())],
            PostField::Content => vec![FilterValue::Text(post.content.clone())],
            PostField::CoverImage => vec![FilterValue::Text(post.cover_image.clone())],
            PostField::Category => vec![FilterValue::Category(post.category)],
            PostField::Tags => post.tags.iter().cloned().map(FilterValue::Text).collect(),
            PostField::Featured => vec![FilterValue::Flag(post.featured)],
            PostField::LikeCount => vec![FilterValue::Count(post.like_count)],
            PostField::CommentCount => vec![FilterValue::Count(post.comment_count)],
            PostField::ViewCount => vec![FilterValue::Count(post.view_count)],
            PostField::CreatedAt => vec![FilterValue::Timestamp(post.created_at)],
            PostField::UpdatedAt => vec![FilterValue::Timestamp(post.updated_at)],
        }
    }

    /// Evaluate against a post. Tag predicates match when any tag matches.
    pub fn matches(&self, post: &Post) -> bool {
        let actual = Self::value_of(post, self.field);
        match self.op {
            Op::Ne => !actual.iter().any(|a| self.values.contains(a)),
            Op::Eq | Op::In => actual.iter().any(|a| self.values.contains(a)),
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => {
                let Some(bound) = self.values.first() else {
                    return false;
                };
                actual.iter().any(|a| match self.op {
                    Op::Gt => a > bound,
                    Op::Gte => a >= bound,
                    Op::Lt => a < bound,
                    _ => a <= bound,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: PostField,
    pub descending: bool,
}

impl SortKey {
    pub fn newest_first() -> Self {
        Self {
            field: PostField::CreatedAt,
            descending: true,
        }
    }
}

/// Offset-based page request. Always holds `page >= 1`, `1 <= limit` and
/// `page * limit <= i64::MAX`, so offsets fit a SQL `OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        let limit = limit.clamp(1, i64::MAX as u64);
        let last_page = i64::MAX as u64 / limit;
        Self {
            page: page.clamp(1, last_page),
            limit,
        }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_LIMIT)
    }
}

/// Typed, bounded query over posts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub predicates: Vec<Predicate>,
    pub select: Option<Vec<PostField>>,
    pub sort: Vec<SortKey>,
    pub page: PageRequest,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            select: None,
            sort: vec![SortKey::newest_first()],
            page: PageRequest::default(),
        }
    }
}

impl PostQuery {
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.page = PageRequest::new(1, limit);
        self
    }

    pub fn matches(&self, post: &Post) -> bool {
        self.predicates.iter().all(|p| p.matches(post))
    }

    /// Ordering for the configured sort keys, with id as the final tiebreak
    /// so that consecutive pages never overlap.
    pub fn compare(&self, a: &Post, b: &Post) -> Ordering {
        for key in &self.sort {
            let ord = compare_field(a, b, key.field);
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    }
}

fn compare_field(a: &Post, b: &Post, field: PostField) -> Ordering {
    match field {
        PostField::Id => a.id.cmp(&b.id),
        PostField::Author => a.author_id.cmp(&b.author_id),
        PostField::Title => a.title.cmp(&b.title),
        PostField::Slug => a.slug.cmp(&b.slug),
        PostField::Category => a.category.as_str().cmp(b.category.as_str()),
        PostField::Featured => a.featured.cmp(&b.featured),
        PostField::LikeCount => a.like_count.cmp(&b.like_count),
        PostField::CommentCount => a.comment_count.cmp(&b.comment_count),
        PostField::ViewCount => a.view_count.cmp(&b.view_count),
        PostField::CreatedAt => a.created_at.cmp(&b.created_at),
        PostField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        PostField::Excerpt | PostField::Content | PostField::CoverImage | PostField::Tags => {
            Ordering::Equal
        }
    }
}

/// Bounds applied to page sizes.
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_LIMIT,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

/// Builds [`PostQuery`] values from raw request parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder {
    limits: QueryLimits,
}

impl QueryBuilder {
    pub fn new(limits: QueryLimits) -> Self {
        Self { limits }
    }

    /// Clamp an externally built page request to the configured maximum.
    pub fn bound(&self, page: PageRequest) -> PageRequest {
        PageRequest::new(page.page, page.limit.min(self.limits.max_limit))
    }

    pub fn build<I, K, V>(&self, params: I) -> DomainResult<PostQuery>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = PostQuery::default();
        let mut page = None;
        let mut limit = None;

        for (key, value) in params {
            let (key, value) = (key.as_ref().trim(), value.as_ref());
            match key {
                "select" => query.select = Some(parse_select(value)?),
                "sort" => query.sort = parse_sort(value)?,
                "page" => page = value.trim().parse::<i64>().ok(),
                "limit" => limit = value.trim().parse::<i64>().ok(),
                _ => query.predicates.push(parse_filter(key, value)?),
            }
        }

        let page = page.unwrap_or(1).max(1) as u64;
        let limit = limit
            .map(|l| l.max(1) as u64)
            .unwrap_or(self.limits.default_limit)
            .min(self.limits.max_limit);
        query.page = PageRequest::new(page, limit);

        Ok(query)
    }
}

fn parse_filter(key: &str, value: &str) -> DomainResult<Predicate> {
    let (name, op) = match key.split_once('[') {
        Some((name, rest)) => {
            let suffix = rest.strip_suffix(']').ok_or_else(|| {
                DomainError::validation(format!("malformed filter parameter '{}'", key))
            })?;
            let op = Op::from_suffix(suffix).ok_or_else(|| {
                DomainError::validation(format!("unsupported operator '{}'", suffix))
            })?;
            (name, op)
        }
        None => (key, Op::Eq),
    };

    if RESERVED_PARAMS.contains(&name) {
        return Err(DomainError::validation(format!(
            "'{}' cannot be used as a filter",
            name
        )));
    }

    let field = PostField::parse(name)
        .ok_or_else(|| DomainError::validation(format!("unknown filter field '{}'", name)))?;
    if !field.allows(op) {
        return Err(DomainError::validation(format!(
            "operator {:?} is not allowed on field '{}'",
            op,
            field.name()
        )));
    }

    let values = if op == Op::In {
        value
            .split(',')
            .filter(|v| !v.trim().is_empty())
            .map(|v| field.parse_value(v))
            .collect::<DomainResult<Vec<_>>>()?
    } else {
        vec![field.parse_value(value)?]
    };
    if values.is_empty() {
        return Err(DomainError::validation(format!(
            "filter on '{}' needs at least one value",
            field.name()
        )));
    }

    Ok(Predicate { field, op, values })
}

fn parse_select(value: &str) -> DomainResult<Vec<PostField>> {
    value
        .split(',')
        .filter(|f| !f.trim().is_empty())
        .map(|f| {
            PostField::parse(f)
                .ok_or_else(|| DomainError::validation(format!("unknown select field '{}'", f)))
        })
        .collect()
}

fn parse_sort(value: &str) -> DomainResult<Vec<SortKey>> {
    let keys = value
        .split(',')
        .filter(|f| !f.trim().is_empty())
        .map(|f| {
            let f = f.trim();
            let (name, descending) = match f.strip_prefix('-') {
                Some(name) => (name, true),
                None => (f, false),
            };
            let field = PostField::parse(name)
                .filter(PostField::sortable)
                .ok_or_else(|| DomainError::validation(format!("cannot sort by '{}'", name)))?;
            Ok(SortKey { field, descending })
        })
        .collect::<DomainResult<Vec<_>>>()?;

    if keys.is_empty() {
        Ok(vec![SortKey::newest_first()])
    } else {
        Ok(keys)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Page descriptor pointing at an adjacent page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

impl Pagination {
    pub fn for_page(page: PageRequest, total: u64) -> Self {
        let next = (page.page.saturating_mul(page.limit) < total).then(|| PageRef {
            page: page.page.saturating_add(1),
            limit: page.limit,
        });
        let prev = (page.page > 1).then(|| PageRef {
            page: page.page - 1,
            limit: page.limit,
        });
        Self { next, prev }
    }
}

/// One page of rows plus the size of the full filtered set.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Result of `list_posts`.
#[derive(Debug, Clone)]
pub struct PostListing {
    pub items: Vec<Post>,
    pub total: u64,
    pub pagination: Pagination,
    pub select: Option<Vec<PostField>>,
}

impl PostListing {
    /// Items restricted to the selected fields; `id` is always kept.
    pub fn projected(&self) -> Vec<serde_json::Value> {
        self.items
            .iter()
            .map(|post| project(post, self.select.as_deref()))
            .collect()
    }
}

pub fn project(post: &Post, select: Option<&[PostField]>) -> serde_json::Value {
    let value = serde_json::to_value(post).unwrap_or(serde_json::Value::Null);
    let (Some(fields), serde_json::Value::Object(map)) = (select, value.clone()) else {
        return value;
    };

    let projected = map
        .into_iter()
        .filter(|(key, _)| key == "id" || fields.iter().any(|f| f.column() == key))
        .collect();
    serde_json::Value::Object(projected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewPost;

    fn post(title: &str, category: &str, views: u64) -> Post {
        let mut post = NewPost {
            title: title.to_string(),
            excerpt: "e".to_string(),
            content: "c".to_string(),
            category: category.to_string(),
            tags: vec!["rust".to_string(), "async".to_string()],
            ..Default::default()
        }
        .into_post(Uuid::new_v4())
        .unwrap();
        post.view_count = views;
        post
    }

    #[test]
    fn test_defaults() {
        let query = QueryBuilder::default().build(Vec::<(&str, &str)>::new()).unwrap();
        assert!(query.predicates.is_empty());
        assert_eq!(query.sort, vec![SortKey::newest_first()]);
        assert_eq!(query.page, PageRequest::new(1, DEFAULT_PAGE_LIMIT));
        assert_eq!(query.page.offset(), 0);
    }

    #[test]
    fn test_page_and_limit_are_clamped() {
        let builder = QueryBuilder::default();
        let query = builder.build([("page", "-3"), ("limit", "5000")]).unwrap();
        assert_eq!(query.page, PageRequest::new(1, MAX_PAGE_LIMIT));

        let query = builder.build([("page", "3"), ("limit", "0")]).unwrap();
        assert_eq!(query.page, PageRequest::new(3, 1));
        assert_eq!(query.page.offset(), 2);

        let query = builder.build([("page", "abc"), ("limit", "xyz")]).unwrap();
        assert_eq!(query.page, PageRequest::new(1, DEFAULT_PAGE_LIMIT));
    }

    #[test]
    fn test_operator_suffixes() {
        let query = QueryBuilder::default()
            .build([
                ("viewCount[gte]", "10"),
                ("createdAt[lt]", "2030-01-01"),
                ("category[in]", "travel,food"),
            ])
            .unwrap();

        assert_eq!(query.predicates.len(), 3);
        assert_eq!(query.predicates[0].op, Op::Gte);
        assert_eq!(query.predicates[1].field, PostField::CreatedAt);
        assert_eq!(query.predicates[2].values.len(), 2);

        assert!(query.matches(&post("A", "travel", 10)));
        assert!(!query.matches(&post("B", "travel", 9)));
        assert!(!query.matches(&post("C", "news", 50)));
    }

    #[test]
    fn test_rejects_fields_and_operators_outside_allow_list() {
        let builder = QueryBuilder::default();
        for params in [
            [("password", "x")],
            [("title[gt]", "a")],
            [("content", "body")],
            [("viewCount[regex]", "1")],
            [("viewCount[gt", "1")],
            [("viewCount", "many")],
            [("category", "gardening")],
        ] {
            assert!(
                matches!(builder.build(params), Err(DomainError::Validation(_))),
                "{:?} should be rejected",
                params
            );
        }
    }

    #[test]
    fn test_tag_filter_matches_any_tag() {
        let query = QueryBuilder::default().build([("tags", "async")]).unwrap();
        assert!(query.matches(&post("A", "food", 0)));

        let query = QueryBuilder::default().build([("tags[in]", "go,zig")]).unwrap();
        assert!(!query.matches(&post("A", "food", 0)));
    }

    #[test]
    fn test_sort_parsing_and_comparison() {
        let query = QueryBuilder::default()
            .build([("sort", "-viewCount,title")])
            .unwrap();
        assert_eq!(query.sort.len(), 2);

        let mut posts = vec![post("b", "food", 5), post("a", "food", 5), post("c", "food", 9)];
        posts.sort_by(|a, b| query.compare(a, b));
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["c", "a", "b"]);

        assert!(QueryBuilder::default().build([("sort", "content")]).is_err());
    }

    #[test]
    fn test_pagination_descriptors() {
        let first = Pagination::for_page(PageRequest::new(1, 10), 25);
        assert_eq!(first.next, Some(PageRef { page: 2, limit: 10 }));
        assert_eq!(first.prev, None);

        let last = Pagination::for_page(PageRequest::new(3, 10), 25);
        assert_eq!(last.next, None);
        assert_eq!(last.prev, Some(PageRef { page: 2, limit: 10 }));

        let exact = Pagination::for_page(PageRequest::new(2, 10), 20);
        assert_eq!(exact.next, None);
    }

    #[test]
    fn test_projection_keeps_id() {
        let p = post("Projected", "news", 3);
        let value = project(&p, Some(&[PostField::Title, PostField::ViewCount]));
        let map = value.as_object().unwrap();

        assert_eq!(map.len(), 3);
        assert!(map.contains_key("id"));
        assert_eq!(map["title"], "Projected");
        assert_eq!(map["view_count"], 3);
    }

    #[test]
    fn test_bound_clamps_external_page_requests() {
        let builder = QueryBuilder::new(QueryLimits {
            default_limit: 10,
            max_limit: 20,
        });

        assert_eq!(builder.bound(PageRequest::new(2, 500)), PageRequest::new(2, 20));
        assert_eq!(builder.bound(PageRequest::new(0, 5)), PageRequest::new(1, 5));
    }

    #[test]
    fn test_huge_page_numbers_do_not_overflow() {
        let query = QueryBuilder::default()
            .build([("page", "9223372036854775807"), ("limit", "100")])
            .unwrap();

        assert_eq!(query.page.limit, 100);
        assert!(query.page.page <= i64::MAX as u64 / 100);
        assert!(query.page.offset() <= i64::MAX as u64);

        let pagination = Pagination::for_page(query.page, 5);
        assert_eq!(pagination.next, None);
        assert!(pagination.prev.is_some());

        let raw = PageRequest {
            page: u64::MAX,
            limit: u64::MAX,
        };
        assert_eq!(raw.offset(), u64::MAX);
        assert_eq!(Pagination::for_page(raw, 10).next, None);
    }
}
