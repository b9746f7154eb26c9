use crate::error::ApiError;
use crate::helper::sanitization_helpers;
use crate::helper::storage_helpers::{public_url, DEFAULT_ARTICLE_IMAGE, DEFAULT_PROFILE_IMAGE};
use crate::models::db_operations::articles_db_operations::{self, ArticleRecord};
use crate::models::db_operations::{catalog_db_operations, comments_db_operations};
use crate::models::{
    ArticleResource, Author, AuthorResource, Category, Comment, CommentThread, LikesSummary, NewComment, Page,
    PublicArticleFilters,
};
use chrono::Utc;
use rusqlite::Connection;

pub fn author_resource(author: Author, app_url: &str) -> AuthorResource {
    let profile_image_url = public_url(app_url, author.profile_image.as_deref(), DEFAULT_PROFILE_IMAGE);
    AuthorResource { author, profile_image_url }
}

/// Article plus its computed image URL and related records.
pub fn article_resource(record: ArticleRecord, app_url: &str, comments: Option<Vec<CommentThread>>) -> ArticleResource {
    let image_url = public_url(app_url, record.article.image.as_deref(), DEFAULT_ARTICLE_IMAGE);
    ArticleResource {
        article: record.article,
        image_url,
        category: Some(record.category),
        author: Some(author_resource(record.author, app_url)),
        comments,
    }
}

/// An unknown category slug leaves the listing unfiltered.
pub fn list_published(
    conn: &Connection,
    filters: &PublicArticleFilters,
    app_url: &str,
) -> Result<Page<ArticleResource>, ApiError> {
    let category_id = match filters.category_slug.as_deref() {
        Some(slug) => catalog_db_operations::read_category_by_slug(conn, slug)?.map(|c| c.id),
        None => None,
    };
    let (records, total) = articles_db_operations::read_published_page(
        conn,
        category_id,
        filters.search.as_deref(),
        filters.pagination,
        Utc::now(),
    )?;
    Ok(Page::new(records, filters.pagination, total).map(|record| article_resource(record, app_url, None)))
}

fn find_published(conn: &Connection, slug: &str) -> Result<ArticleRecord, ApiError> {
    articles_db_operations::read_published_by_slug(conn, slug, Utc::now())?.ok_or_else(|| ApiError::not_found("Article"))
}

/// A published article with its approved comment threads.
pub fn show_published(conn: &Connection, slug: &str, app_url: &str) -> Result<ArticleResource, ApiError> {
    let record = find_published(conn, slug)?;
    let threads = comments_db_operations::read_threads(conn, record.article.id, true)?;
    Ok(article_resource(record, app_url, Some(threads)))
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>, ApiError> {
    Ok(catalog_db_operations::read_all_categories(conn)?)
}

/// Resolves the published article a comment or like is aimed at.
pub fn published_article_id(conn: &Connection, slug: &str) -> Result<i64, ApiError> {
    Ok(find_published(conn, slug)?.article.id)
}

/// Stores a visitor comment as unapproved. Counters are untouched until approval.
pub fn submit_comment(conn: &Connection, article_id: i64, input: NewComment) -> Result<Comment, ApiError> {
    let input = NewComment { content: sanitization_helpers::strip_all_html(&input.content), ..input };
    let comment_id = comments_db_operations::insert_comment(conn, article_id, &input, Utc::now())?;
    log::info!("Comment {} submitted on article {} and awaits approval.", comment_id, article_id);
    comments_db_operations::read_comment(conn, comment_id)?.ok_or_else(|| ApiError::not_found("Comment"))
}

/// Blind counter: nothing records who liked what, so repeated calls keep counting.
pub fn update_likes(conn: &Connection, slug: &str, liked: bool) -> Result<LikesSummary, ApiError> {
    let article_id = published_article_id(conn, slug)?;
    let likes_count = articles_db_operations::adjust_likes(conn, article_id, liked, Utc::now())?;
    Ok(LikesSummary { likes_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::catalog_db_operations::{create_author, create_category};
    use crate::models::db_operations::test_support::memory_db;
    use crate::models::{NewArticle, Pagination};
    use chrono::{DateTime, Duration};
    use rstest::{fixture, rstest};

    const APP_URL: &str = "http://localhost:8000";

    struct Seeded {
        conn: Connection,
        aws: i64,
        backend: i64,
        author_id: i64,
    }

    #[fixture]
    fn seeded() -> Seeded {
        let conn = memory_db();
        let aws = create_category(&conn, "AWS", "aws", None).unwrap();
        let backend = create_category(&conn, "Backend", "backend", None).unwrap();
        let author_id = create_author(&conn, None, "Writer", None, None).unwrap();
        Seeded { conn, aws, backend, author_id }
    }

    fn insert(s: &Seeded, slug: &str, category_id: i64, published_at: Option<DateTime<Utc>>) -> i64 {
        let input = NewArticle {
            category_id,
            author_id: s.author_id,
            title: slug.to_string(),
            excerpt: "excerpt".into(),
            content: "<p>body</p>".into(),
            is_published: published_at.is_some(),
            published_at,
        };
        articles_db_operations::insert_article(&s.conn, &input, slug, None, Utc::now()).unwrap()
    }

    fn filters(category_slug: Option<&str>, search: Option<&str>) -> PublicArticleFilters {
        PublicArticleFilters {
            category_slug: category_slug.map(str::to_string),
            search: search.map(str::to_string),
            pagination: Pagination { page: 1, per_page: 10 },
        }
    }

    #[rstest]
    #[case(None, None, &["lambda-tips", "rust-tips"])]
    #[case(Some("aws"), None, &["lambda-tips"])]
    #[case(Some("nope"), None, &["lambda-tips", "rust-tips"])]
    #[case(None, Some("rust"), &["rust-tips"])]
    fn listing_shows_only_live_articles(
        seeded: Seeded,
        #[case] category: Option<&str>,
        #[case] search: Option<&str>,
        #[case] expected: &[&str],
    ) {
        let hour_ago = Utc::now() - Duration::hours(1);
        insert(&seeded, "rust-tips", seeded.backend, Some(hour_ago - Duration::hours(1)));
        insert(&seeded, "lambda-tips", seeded.aws, Some(hour_ago));
        insert(&seeded, "draft", seeded.aws, None);
        insert(&seeded, "scheduled", seeded.aws, Some(Utc::now() + Duration::days(1)));

        let page = list_published(&seeded.conn, &filters(category, search), APP_URL).unwrap();
        let slugs: Vec<&str> = page.items.iter().map(|item| item.article.slug.as_str()).collect();
        assert_eq!(slugs, expected);
        assert_eq!(page.total, expected.len() as u64);
        assert!(page.items.iter().all(|item| item.comments.is_none()));
        assert_eq!(page.items[0].image_url, "http://localhost:8000/images/default-article.jpg");
    }

    #[rstest]
    fn submitted_comment_keeps_plain_text(seeded: Seeded) {
        let article_id = insert(&seeded, "open", seeded.aws, Some(Utc::now() - Duration::hours(1)));
        let input = NewComment { content: "<b>Tom</b> & Jerry say 1 < 2".into(), parent_id: None };

        let comment = submit_comment(&seeded.conn, article_id, input).unwrap();
        assert_eq!(comment.content, "Tom & Jerry say 1 < 2");
        assert!(!comment.is_approved);
        let article = articles_db_operations::read_article(&seeded.conn, article_id).unwrap().unwrap();
        assert_eq!(article.comments_count, 0);
    }
}
