use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Author {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Article {
    pub id: i64,
    pub category_id: i64,
    pub author_id: i64,
    pub title: String,
    pub slug: String,
    pub image: Option<String>,
    pub excerpt: String,
    pub content: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the `article_likes` join table.
#[derive(Debug, Serialize, Clone)]
pub struct ArticleLike {
    pub id: i64,
    pub user_id: i64,
    pub article_id: i64,
    pub created_at: DateTime<Utc>,
}

// --- Response shapes ---

#[derive(Debug, Serialize)]
pub struct UserResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AuthorResource {
    #[serde(flatten)]
    pub author: Author,
    pub profile_image_url: String,
}

/// A root comment with its replies nested one level deep.
#[derive(Debug, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

#[derive(Debug, Serialize)]
pub struct ArticleResource {
    #[serde(flatten)]
    pub article: Article,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentThread>>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ArticleRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

/// Admin comment listing row: the comment plus its article and parent.
#[derive(Debug, Serialize)]
pub struct CommentListing {
    #[serde(flatten)]
    pub comment: Comment,
    pub article: ArticleRef,
    pub parent: Option<Comment>,
}

#[derive(Debug, Serialize)]
pub struct FormData {
    pub categories: Vec<Category>,
    pub authors: Vec<AuthorResource>,
}

#[derive(Debug, Serialize)]
pub struct LikesSummary {
    pub likes_count: i64,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: u64) -> Self {
        let per_page = pagination.per_page.max(1);
        let last_page = (((total + per_page as u64 - 1) / per_page as u64) as u32).max(1);
        Page { items, current_page: pagination.page, per_page, total, last_page }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

// --- Validated inputs ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.per_page as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PublishStatus {
    Published,
    Draft,
}

#[derive(Debug, Clone)]
pub struct PublicArticleFilters {
    pub category_slug: Option<String>,
    pub search: Option<String>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone)]
pub struct AdminArticleFilters {
    pub status: Option<PublishStatus>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub search: Option<String>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone)]
pub struct CommentFilters {
    pub approved: Option<bool>,
    pub article_id: Option<i64>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub category_id: i64,
    pub author_id: i64,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub is_published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub is_published: Option<bool>,
    /// `Some(None)` clears the timestamp.
    pub published_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub mod db_operations;
