//! Request validators.
//!
//! Inputs arrive as a flat JSON object (`FieldMap`), whether the request body was
//! JSON, multipart text parts, or a query string. Every validator collects all
//! field failures before returning, so a single 422 lists every problem.

pub mod messages;

use crate::config::Locale;
use crate::error::ApiError;
use crate::helper::storage_helpers::{ImageKind, UploadedImage};
use crate::models::db_operations::{catalog_db_operations, comments_db_operations};
use crate::models::{
    AdminArticleFilters, ArticleChanges, CommentFilters, Credentials, NewArticle, NewComment, Pagination,
    PublicArticleFilters, PublishStatus,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use messages::{message, Field, Rule};
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub type FieldMap = serde_json::Map<String, Value>;

pub const TITLE_MAX: usize = 255;
pub const COMMENT_MAX: usize = 1000;
pub const PER_PAGE_MAX: u32 = 100;
pub const PUBLIC_PER_PAGE: u32 = 10;
pub const ADMIN_ARTICLES_PER_PAGE: u32 = 15;
pub const ADMIN_COMMENTS_PER_PAGE: u32 = 20;

/// Field-level failures, serialized as `{field: [messages]}`.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn record(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// First message overall, used as the envelope's headline.
    pub fn first_message(&self) -> Option<&str> {
        self.0.values().flatten().next().map(String::as_str)
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| unreachable!("static pattern: {}", e))
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "1" | "true" | "on" => Some(true),
            "0" | "false" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts RFC 3339 plus the common form-input layouts; naive values are UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Rule runner over one input map.
pub struct Validator<'a> {
    fields: &'a FieldMap,
    locale: Locale,
    errors: ValidationErrors,
}

impl<'a> Validator<'a> {
    pub fn new(fields: &'a FieldMap, locale: Locale) -> Self {
        Validator { fields, locale, errors: ValidationErrors::default() }
    }

    pub fn fail(&mut self, field: Field, rule: Rule) {
        let text = message(self.locale, field, rule);
        self.errors.record(field.key(), text);
    }

    fn present(&self, field: Field) -> Option<&'a Value> {
        self.fields.get(field.key())
    }

    /// `None` when the field is absent, blank, or failed.
    pub fn string(&mut self, field: Field, required: bool, max: Option<usize>) -> Option<String> {
        let value = match self.present(field) {
            Some(v) if !is_blank(v) => v,
            _ => {
                if required {
                    self.fail(field, Rule::Required);
                }
                return None;
            }
        };
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => {
                self.fail(field, Rule::Required);
                return None;
            }
        };
        if let Some(max) = max {
            if text.chars().count() > max {
                self.fail(field, Rule::MaxLength(max));
                return None;
            }
        }
        Some(text)
    }

    /// Presence check for update payloads: the key was sent at all.
    pub fn sent(&self, field: Field) -> bool {
        self.present(field).is_some()
    }

    pub fn integer(&mut self, field: Field, required: bool) -> Option<i64> {
        match self.present(field) {
            Some(v) if !is_blank(v) => {
                let parsed = parse_int(v);
                if parsed.is_none() {
                    self.fail(field, Rule::Integer);
                }
                parsed
            }
            _ => {
                if required {
                    self.fail(field, Rule::Required);
                }
                None
            }
        }
    }

    pub fn boolean(&mut self, field: Field, required: bool) -> Option<bool> {
        match self.present(field) {
            Some(v) if !matches!(v, Value::Null) => {
                let parsed = parse_bool(v);
                if parsed.is_none() {
                    self.fail(field, Rule::Boolean);
                }
                parsed
            }
            _ => {
                if required {
                    self.fail(field, Rule::Required);
                }
                None
            }
        }
    }

    /// Nullable date: outer `None` when absent, `Some(None)` when sent blank.
    pub fn nullable_date(&mut self, field: Field) -> Option<Option<DateTime<Utc>>> {
        let value = self.present(field)?;
        if is_blank(value) {
            return Some(None);
        }
        match value.as_str().and_then(parse_datetime) {
            Some(dt) => Some(Some(dt)),
            None => {
                self.fail(field, Rule::Date);
                None
            }
        }
    }

    /// Integer in `[min, max]`, defaulting when absent.
    pub fn bounded(&mut self, field: Field, min: u32, max: u32, default: u32) -> u32 {
        match self.integer(field, false) {
            Some(n) if n >= min as i64 && n <= max as i64 => n as u32,
            Some(_) => {
                self.fail(field, Rule::Between(min, max));
                default
            }
            None => default,
        }
    }

    pub fn pagination(&mut self, default_per_page: u32) -> Pagination {
        let per_page = self.bounded(Field::PerPage, 1, PER_PAGE_MAX, default_per_page);
        let page = match self.integer(Field::Page, false) {
            Some(n) if n >= 1 && n <= u32::MAX as i64 => n as u32,
            Some(_) => {
                self.fail(Field::Page, Rule::Min(1));
                1
            }
            None => 1,
        };
        Pagination { page, per_page }
    }

    pub fn image(&mut self, image: Option<&UploadedImage>, max_kb: u64) -> Option<ImageKind> {
        let image = image?;
        let kind = match ImageKind::detect(image) {
            Some(kind) => kind,
            None => {
                self.fail(Field::Image, Rule::Image);
                return None;
            }
        };
        if image.size_kb() > max_kb {
            self.fail(Field::Image, Rule::ImageMax(max_kb));
            return None;
        }
        Some(kind)
    }

    pub fn finish<T>(self, value: T) -> Result<T, ApiError> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// Rules for creating an article.
pub fn article_store(
    conn: &Connection,
    fields: &FieldMap,
    image: Option<&UploadedImage>,
    locale: Locale,
    max_image_kb: u64,
) -> Result<(NewArticle, Option<ImageKind>), ApiError> {
    let mut v = Validator::new(fields, locale);
    let title = v.string(Field::Title, true, Some(TITLE_MAX));
    let category_id = v.integer(Field::CategoryId, true);
    if let Some(id) = category_id {
        if !catalog_db_operations::category_exists(conn, id)? {
            v.fail(Field::CategoryId, Rule::Exists);
        }
    }
    let author_id = v.integer(Field::AuthorId, true);
    if let Some(id) = author_id {
        if !catalog_db_operations::author_exists(conn, id)? {
            v.fail(Field::AuthorId, Rule::Exists);
        }
    }
    let excerpt = v.string(Field::Excerpt, true, None);
    let content = v.string(Field::ArticleContent, true, None);
    let kind = v.image(image, max_image_kb);
    let is_published = v.boolean(Field::IsPublished, false).unwrap_or(false);
    let published_at = v.nullable_date(Field::PublishedAt).flatten();

    match (title, category_id, author_id, excerpt, content) {
        (Some(title), Some(category_id), Some(author_id), Some(excerpt), Some(content)) if v.errors.is_empty() => v
            .finish((
                NewArticle { category_id, author_id, title, excerpt, content, is_published, published_at },
                kind,
            )),
        _ => Err(ApiError::Validation(v.errors)),
    }
}

/// Rules for a partial article update; absent fields stay `None`.
pub fn article_update(
    conn: &Connection,
    fields: &FieldMap,
    image: Option<&UploadedImage>,
    locale: Locale,
    max_image_kb: u64,
) -> Result<(ArticleChanges, Option<ImageKind>), ApiError> {
    let mut v = Validator::new(fields, locale);
    let mut changes = ArticleChanges::default();

    if v.sent(Field::Title) {
        changes.title = v.string(Field::Title, true, Some(TITLE_MAX));
    }
    if v.sent(Field::CategoryId) {
        changes.category_id = v.integer(Field::CategoryId, true);
        if let Some(id) = changes.category_id {
            if !catalog_db_operations::category_exists(conn, id)? {
                v.fail(Field::CategoryId, Rule::Exists);
            }
        }
    }
    if v.sent(Field::AuthorId) {
        changes.author_id = v.integer(Field::AuthorId, true);
        if let Some(id) = changes.author_id {
            if !catalog_db_operations::author_exists(conn, id)? {
                v.fail(Field::AuthorId, Rule::Exists);
            }
        }
    }
    if v.sent(Field::Excerpt) {
        changes.excerpt = v.string(Field::Excerpt, true, None);
    }
    if v.sent(Field::ArticleContent) {
        changes.content = v.string(Field::ArticleContent, true, None);
    }
    if v.sent(Field::IsPublished) {
        changes.is_published = v.boolean(Field::IsPublished, true);
    }
    changes.published_at = v.nullable_date(Field::PublishedAt);
    let kind = v.image(image, max_image_kb);

    v.finish((changes, kind))
}

pub fn comment_store(conn: &Connection, fields: &FieldMap, locale: Locale) -> Result<NewComment, ApiError> {
    let mut v = Validator::new(fields, locale);
    let content = v.string(Field::CommentContent, true, Some(COMMENT_MAX));
    let parent_id = match v.present(Field::ParentId) {
        Some(value) if !is_blank(value) => match parse_int(value) {
            Some(id) if comments_db_operations::comment_exists(conn, id)? => Some(id),
            _ => {
                v.fail(Field::ParentId, Rule::Exists);
                None
            }
        },
        _ => None,
    };

    match content {
        Some(content) => v.finish(NewComment { content, parent_id }),
        None => Err(ApiError::Validation(v.errors)),
    }
}

pub fn login(fields: &FieldMap, locale: Locale) -> Result<Credentials, ApiError> {
    let mut v = Validator::new(fields, locale);
    let email = v.string(Field::Email, true, None);
    if let Some(email) = email.as_deref() {
        if !email_regex().is_match(email.trim()) {
            v.fail(Field::Email, Rule::Email);
        }
    }
    let password = v.string(Field::Password, true, None);

    match (email, password) {
        (Some(email), Some(password)) => v.finish(Credentials { email: email.trim().to_string(), password }),
        _ => Err(ApiError::Validation(v.errors)),
    }
}

pub fn approval(fields: &FieldMap, locale: Locale) -> Result<bool, ApiError> {
    let mut v = Validator::new(fields, locale);
    let approved = v.boolean(Field::Approved, true);
    match approved {
        Some(approved) => v.finish(approved),
        None => Err(ApiError::Validation(v.errors)),
    }
}

/// `isLiked` (or its `increment` alias) as a required boolean.
pub fn like_toggle(fields: &FieldMap, locale: Locale) -> Result<bool, ApiError> {
    let mut v = Validator::new(fields, locale);
    let liked = if v.sent(Field::IsLiked) {
        v.boolean(Field::IsLiked, true)
    } else {
        fields.get("increment").and_then(parse_bool).or_else(|| {
            v.fail(Field::IsLiked, Rule::Required);
            None
        })
    };
    match liked {
        Some(liked) => v.finish(liked),
        None => Err(ApiError::Validation(v.errors)),
    }
}

pub fn public_article_filters(fields: &FieldMap, locale: Locale) -> Result<PublicArticleFilters, ApiError> {
    let mut v = Validator::new(fields, locale);
    let category_slug = v.string(Field::Category, false, None);
    let search = v.string(Field::Search, false, None);
    let pagination = v.pagination(PUBLIC_PER_PAGE);
    v.finish(PublicArticleFilters { category_slug, search, pagination })
}

pub fn admin_article_filters(fields: &FieldMap, locale: Locale) -> Result<AdminArticleFilters, ApiError> {
    let mut v = Validator::new(fields, locale);
    let status = match v.string(Field::Status, false, None).as_deref() {
        Some("published") => Some(PublishStatus::Published),
        Some("draft") => Some(PublishStatus::Draft),
        Some(_) => {
            v.fail(Field::Status, Rule::OneOf);
            None
        }
        None => None,
    };
    let category_id = v.integer(Field::Category, false);
    let author_id = v.integer(Field::Author, false);
    let search = v.string(Field::Search, false, None);
    let pagination = v.pagination(ADMIN_ARTICLES_PER_PAGE);
    v.finish(AdminArticleFilters { status, category_id, author_id, search, pagination })
}

pub fn comment_filters(fields: &FieldMap, locale: Locale) -> Result<CommentFilters, ApiError> {
    let mut v = Validator::new(fields, locale);
    let approved = v.boolean(Field::Approved, false);
    let article_id = v.integer(Field::ArticleId, false);
    let pagination = v.pagination(ADMIN_COMMENTS_PER_PAGE);
    v.finish(CommentFilters { approved, article_id, pagination })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::catalog_db_operations::{create_author, create_category};
    use crate::models::db_operations::test_support::memory_db;
    use rstest::rstest;
    use serde_json::json;

    fn map(value: Value) -> FieldMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    fn field_errors(err: ApiError) -> ValidationErrors {
        match err {
            ApiError::Validation(errors) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[rstest]
    fn store_requires_core_fields_and_reports_all() {
        let conn = memory_db();
        let err = article_store(&conn, &map(json!({})), None, Locale::Ja, 2048).unwrap_err();
        let errors = field_errors(err);
        assert_eq!(errors.get("title"), Some(&["タイトルは必須です。".to_string()][..]));
        assert_eq!(errors.get("category_id"), Some(&["カテゴリーの選択は必須です。".to_string()][..]));
        assert!(errors.get("author_id").is_some());
        assert!(errors.get("excerpt").is_some());
        assert!(errors.get("content").is_some());
    }

    #[rstest]
    fn store_checks_references_exist() {
        let conn = memory_db();
        let category_id = create_category(&conn, "AI", "ai", None).unwrap();
        let author_id = create_author(&conn, None, "A", None, None).unwrap();
        let fields = map(json!({
            "title": "T", "category_id": category_id.to_string(), "author_id": author_id + 10,
            "excerpt": "e", "content": "c", "is_published": "1", "published_at": "2024-05-01 09:30:00"
        }));
        let errors = field_errors(article_store(&conn, &fields, None, Locale::En, 2048).unwrap_err());
        assert_eq!(errors.get("author_id"), Some(&["The selected author id is invalid.".to_string()][..]));

        let mut fixed = fields.clone();
        fixed.insert("author_id".into(), json!(author_id));
        let (article, image) = article_store(&conn, &fixed, None, Locale::En, 2048).unwrap();
        assert!(article.is_published);
        assert_eq!(article.published_at, parse_datetime("2024-05-01T09:30:00Z"));
        assert!(image.is_none());
    }

    #[rstest]
    fn title_longer_than_limit_is_rejected() {
        let conn = memory_db();
        let fields = map(json!({ "title": "x".repeat(TITLE_MAX + 1) }));
        let errors = field_errors(article_update(&conn, &fields, None, Locale::Ja, 2048).unwrap_err());
        assert_eq!(
            errors.get("title"),
            Some(&["タイトルは255文字以内で入力してください。".to_string()][..])
        );
    }

    #[rstest]
    fn update_leaves_absent_fields_untouched() {
        let conn = memory_db();
        let (changes, _) = article_update(&conn, &map(json!({ "excerpt": "new" })), None, Locale::En, 2048).unwrap();
        assert_eq!(changes.excerpt.as_deref(), Some("new"));
        assert!(changes.title.is_none());
        assert!(changes.is_published.is_none());
        assert!(changes.published_at.is_none());
    }

    #[rstest]
    #[case(json!({ "published_at": "" }), Some(None))]
    #[case(json!({ "published_at": null }), Some(None))]
    #[case(json!({ "published_at": "2024-05-01 09:30:00" }), Some(parse_datetime("2024-05-01T09:30:00Z")))]
    fn update_distinguishes_cleared_publish_date(
        #[case] body: serde_json::Value,
        #[case] expected: Option<Option<DateTime<Utc>>>,
    ) {
        let conn = memory_db();
        let (changes, _) = article_update(&conn, &map(body), None, Locale::En, 2048).unwrap();
        assert_eq!(changes.published_at, expected);
    }

    #[rstest]
    fn oversized_image_is_rejected() {
        let conn = memory_db();
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.resize(3 * 1024, 0);
        let image = UploadedImage { file_name: Some("a.png".into()), content_type: Some("image/png".into()), bytes };
        let errors = field_errors(article_update(&conn, &FieldMap::new(), Some(&image), Locale::Ja, 2).unwrap_err());
        assert_eq!(errors.get("image"), Some(&["画像サイズは2KB以下にしてください。".to_string()][..]));
    }

    #[rstest]
    fn comment_length_counts_characters() {
        let conn = memory_db();
        let ok = map(json!({ "content": "あ".repeat(COMMENT_MAX) }));
        assert!(comment_store(&conn, &ok, Locale::Ja).is_ok());

        let long = map(json!({ "content": "あ".repeat(COMMENT_MAX + 1) }));
        let errors = field_errors(comment_store(&conn, &long, Locale::Ja).unwrap_err());
        assert_eq!(errors.get("content"), Some(&["コメントは1000文字以内で入力してください。".to_string()][..]));
    }

    #[rstest]
    fn unknown_parent_comment_is_rejected() {
        let conn = memory_db();
        let fields = map(json!({ "content": "hi", "parent_id": 99 }));
        let errors = field_errors(comment_store(&conn, &fields, Locale::Ja).unwrap_err());
        assert_eq!(errors.get("parent_id"), Some(&["指定された親コメントが見つかりません。".to_string()][..]));
    }

    #[rstest]
    #[case(json!({}), "email")]
    #[case(json!({ "email": "not-an-email", "password": "x" }), "email")]
    #[case(json!({ "email": "a@example.com" }), "password")]
    fn login_format_errors(#[case] input: Value, #[case] failing: &str) {
        let errors = field_errors(login(&map(input), Locale::En).unwrap_err());
        assert!(errors.get(failing).is_some());
    }

    #[rstest]
    #[case(json!({ "isLiked": true }), Some(true))]
    #[case(json!({ "isLiked": "false" }), Some(false))]
    #[case(json!({ "increment": 1 }), Some(true))]
    #[case(json!({}), None)]
    #[case(json!({ "isLiked": "maybe" }), None)]
    fn like_flag_parsing(#[case] input: Value, #[case] expected: Option<bool>) {
        assert_eq!(like_toggle(&map(input), Locale::En).ok(), expected);
    }

    #[rstest]
    #[case(json!({}), 10, 1)]
    #[case(json!({ "per_page": "25", "page": "3" }), 25, 3)]
    fn public_pagination_defaults(#[case] input: Value, #[case] per_page: u32, #[case] page: u32) {
        let filters = public_article_filters(&map(input), Locale::En).unwrap();
        assert_eq!(filters.pagination, Pagination { page, per_page });
    }

    #[rstest]
    #[case(json!({ "per_page": "0" }))]
    #[case(json!({ "per_page": "101" }))]
    #[case(json!({ "per_page": "ten" }))]
    #[case(json!({ "page": "0" }))]
    fn pagination_out_of_range(#[case] input: Value) {
        assert!(public_article_filters(&map(input), Locale::En).is_err());
    }

    #[rstest]
    fn admin_filters_parse_status() {
        let filters = admin_article_filters(&map(json!({ "status": "draft", "category": "2" })), Locale::En).unwrap();
        assert_eq!(filters.status, Some(PublishStatus::Draft));
        assert_eq!(filters.category_id, Some(2));
        assert_eq!(filters.pagination.per_page, ADMIN_ARTICLES_PER_PAGE);
        assert!(admin_article_filters(&map(json!({ "status": "archived" })), Locale::En).is_err());
    }

    #[rstest]
    fn approval_requires_boolean() {
        assert_eq!(approval(&map(json!({ "approved": true })), Locale::En).ok(), Some(true));
        assert!(approval(&map(json!({})), Locale::En).is_err());
    }
}
