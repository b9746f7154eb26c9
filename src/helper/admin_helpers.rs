use crate::error::ApiError;
use crate::helper::public_helpers::{article_resource, author_resource};
use crate::helper::storage_helpers::{self, ImageKind, UploadedImage};
use crate::helper::{sanitization_helpers, slug_helpers};
use crate::models::db_operations::{articles_db_operations, catalog_db_operations, comments_db_operations};
use crate::models::{
    AdminArticleFilters, Article, ArticleChanges, ArticleResource, Comment, CommentFilters, CommentListing, FormData,
    NewArticle, Page,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;

/// A validated upload ready to be written.
pub struct PendingImage {
    pub image: UploadedImage,
    pub kind: ImageKind,
}

pub fn list_articles(
    conn: &Connection,
    filters: &AdminArticleFilters,
    app_url: &str,
) -> Result<Page<ArticleResource>, ApiError> {
    let (records, total) = articles_db_operations::read_admin_page(conn, filters)?;
    Ok(Page::new(records, filters.pagination, total).map(|record| article_resource(record, app_url, None)))
}

/// Any article by id, with every root comment and reply regardless of approval.
pub fn show_article(conn: &Connection, article_id: i64, app_url: &str) -> Result<ArticleResource, ApiError> {
    let record = articles_db_operations::read_record(conn, article_id)?.ok_or_else(|| ApiError::not_found("Article"))?;
    let threads = comments_db_operations::read_threads(conn, article_id, false)?;
    Ok(article_resource(record, app_url, Some(threads)))
}

pub fn form_data(conn: &Connection, app_url: &str) -> Result<FormData, ApiError> {
    let categories = catalog_db_operations::read_all_categories(conn)?;
    let authors = catalog_db_operations::read_all_authors(conn)?
        .into_iter()
        .map(|author| author_resource(author, app_url))
        .collect();
    Ok(FormData { categories, authors })
}

/// Publishing stamps `published_at` with the supplied time, or now.
fn creation_published_at(input: &NewArticle, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if input.is_published {
        Some(input.published_at.unwrap_or(now))
    } else {
        input.published_at
    }
}

pub async fn create_article(
    conn: &Connection,
    storage_root: &Path,
    input: NewArticle,
    image: Option<PendingImage>,
    app_url: &str,
) -> Result<ArticleResource, ApiError> {
    let now = Utc::now();
    let slug = slug_helpers::unique_slug(conn, &input.title, None)?;
    let input = NewArticle {
        content: sanitization_helpers::sanitize_article_html(&input.content),
        published_at: creation_published_at(&input, now),
        ..input
    };

    let stored = match image {
        Some(pending) => Some(storage_helpers::store_article_image(storage_root, pending.image, pending.kind).await?),
        None => None,
    };

    let article_id = articles_db_operations::insert_article(conn, &input, &slug, stored.as_deref(), now)?;
    log::info!("Article {} created with slug '{}'.", article_id, slug);
    show_without_comments(conn, article_id, app_url)
}

/// Applies `changes` to `article` in place, following the publish rules:
/// draft to published stamps the supplied time or now, published to draft
/// clears it, otherwise a supplied `published_at` is taken as-is.
fn apply_changes(article: &mut Article, changes: ArticleChanges, now: DateTime<Utc>) {
    match changes.is_published {
        Some(true) if !article.is_published => {
            article.published_at = Some(changes.published_at.flatten().unwrap_or(now));
        }
        Some(false) if article.is_published => {
            article.published_at = None;
        }
        _ => {
            if let Some(published_at) = changes.published_at {
                article.published_at = published_at;
            }
        }
    }
    if let Some(is_published) = changes.is_published {
        article.is_published = is_published;
    }
    if let Some(category_id) = changes.category_id {
        article.category_id = category_id;
    }
    if let Some(author_id) = changes.author_id {
        article.author_id = author_id;
    }
    if let Some(title) = changes.title {
        article.title = title;
    }
    if let Some(excerpt) = changes.excerpt {
        article.excerpt = excerpt;
    }
    if let Some(content) = changes.content {
        article.content = sanitization_helpers::sanitize_article_html(&content);
    }
    article.updated_at = now;
}

pub async fn update_article(
    conn: &Connection,
    storage_root: &Path,
    article_id: i64,
    changes: ArticleChanges,
    image: Option<PendingImage>,
    app_url: &str,
) -> Result<ArticleResource, ApiError> {
    let mut article =
        articles_db_operations::read_article(conn, article_id)?.ok_or_else(|| ApiError::not_found("Article"))?;
    let now = Utc::now();

    if let Some(title) = changes.title.as_deref() {
        if title != article.title {
            article.slug = slug_helpers::unique_slug(conn, title, Some(article.id))?;
        }
    }

    if let Some(pending) = image {
        if let Some(old) = article.image.take() {
            if let Err(e) = storage_helpers::delete_stored_file(storage_root, &old).await {
                log::error!("Failed to delete previous image '{}' of article {}: {}", old, article.id, e);
            }
        }
        article.image =
            Some(storage_helpers::store_article_image(storage_root, pending.image, pending.kind).await?);
    }

    apply_changes(&mut article, changes, now);
    articles_db_operations::update_article(conn, &article)?;
    log::info!("Article {} updated.", article.id);
    show_without_comments(conn, article.id, app_url)
}

/// Deletes the row first; a stored image that fails to delete is only logged.
pub async fn delete_article(conn: &Connection, storage_root: &Path, article_id: i64) -> Result<(), ApiError> {
    let article =
        articles_db_operations::read_article(conn, article_id)?.ok_or_else(|| ApiError::not_found("Article"))?;
    articles_db_operations::delete_article(conn, article.id)?;

    if let Some(image) = article.image.as_deref() {
        if let Err(e) = storage_helpers::delete_stored_file(storage_root, image).await {
            log::error!("Failed to delete image '{}' of deleted article {}: {}", image, article.id, e);
        }
    }
    log::info!("Article {} deleted.", article.id);
    Ok(())
}

fn show_without_comments(conn: &Connection, article_id: i64, app_url: &str) -> Result<ArticleResource, ApiError> {
    let record = articles_db_operations::read_record(conn, article_id)?.ok_or_else(|| ApiError::not_found("Article"))?;
    Ok(article_resource(record, app_url, None))
}

// --- Comments ---

pub fn list_comments(conn: &Connection, filters: &CommentFilters) -> Result<Page<CommentListing>, ApiError> {
    let (rows, total) = comments_db_operations::read_page(conn, filters)?;
    Ok(Page::new(rows, filters.pagination, total))
}

/// Flips approval and recounts the article's approved comments.
pub fn set_comment_approval(conn: &Connection, comment_id: i64, approved: bool) -> Result<Comment, ApiError> {
    let comment =
        comments_db_operations::read_comment(conn, comment_id)?.ok_or_else(|| ApiError::not_found("Comment"))?;
    let now = Utc::now();
    comments_db_operations::set_approval(conn, comment.id, approved, now)?;
    let count = articles_db_operations::refresh_comments_count(conn, comment.article_id, now)?;
    log::info!(
        "Comment {} {} (article {} now has {} approved).",
        comment.id,
        if approved { "approved" } else { "unapproved" },
        comment.article_id,
        count
    );
    comments_db_operations::read_comment(conn, comment.id)?.ok_or_else(|| ApiError::not_found("Comment"))
}

/// Deletes the comment (replies cascade) and recounts the article's approved comments.
pub fn delete_comment(conn: &Connection, comment_id: i64) -> Result<(), ApiError> {
    let comment =
        comments_db_operations::read_comment(conn, comment_id)?.ok_or_else(|| ApiError::not_found("Comment"))?;
    comments_db_operations::delete_comment(conn, comment.id)?;
    articles_db_operations::refresh_comments_count(conn, comment.article_id, Utc::now())?;
    log::info!("Comment {} deleted from article {}.", comment.id, comment.article_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::catalog_db_operations::{create_author, create_category};
    use crate::models::db_operations::test_support::memory_db;
    use crate::models::{NewComment, Pagination, PublishStatus};
    use chrono::Duration;

    const APP_URL: &str = "http://localhost:8000";

    struct Seeded {
        conn: Connection,
        category_id: i64,
        author_id: i64,
        storage: tempfile::TempDir,
    }

    fn seeded() -> Seeded {
        let conn = memory_db();
        let category_id = create_category(&conn, "AWS", "aws", None).unwrap();
        let author_id = create_author(&conn, None, "Writer", None, None).unwrap();
        Seeded { conn, category_id, author_id, storage: tempfile::tempdir().unwrap() }
    }

    fn new_article(s: &Seeded, title: &str, is_published: bool) -> NewArticle {
        NewArticle {
            category_id: s.category_id,
            author_id: s.author_id,
            title: title.into(),
            excerpt: "e".into(),
            content: "<p>ok</p><script>bad()</script>".into(),
            is_published,
            published_at: None,
        }
    }

    #[actix_web::test]
    async fn create_stamps_publication_and_sanitizes() {
        let seeded = seeded();
        let created = create_article(&seeded.conn, seeded.storage.path(), new_article(&seeded, "Hello", true), None, APP_URL)
            .await
            .unwrap();
        assert!(created.article.published_at.is_some());
        assert_eq!(created.article.content, "<p>ok</p>");
        assert_eq!(created.image_url, "http://localhost:8000/images/default-article.jpg");

        let draft = create_article(&seeded.conn, seeded.storage.path(), new_article(&seeded, "Hello", false), None, APP_URL)
            .await
            .unwrap();
        assert_eq!(draft.article.slug, "hello-1");
        assert!(draft.article.published_at.is_none());
    }

    #[actix_web::test]
    async fn publish_toggle_sets_and_clears_timestamp() {
        let seeded = seeded();
        let created = create_article(&seeded.conn, seeded.storage.path(), new_article(&seeded, "Toggle", false), None, APP_URL)
            .await
            .unwrap();
        let id = created.article.id;

        let publish = ArticleChanges { is_published: Some(true), ..Default::default() };
        let published = update_article(&seeded.conn, seeded.storage.path(), id, publish, None, APP_URL).await.unwrap();
        assert!(published.article.is_published);
        assert!(published.article.published_at.is_some());

        let unpublish = ArticleChanges { is_published: Some(false), ..Default::default() };
        let draft = update_article(&seeded.conn, seeded.storage.path(), id, unpublish, None, APP_URL).await.unwrap();
        assert!(!draft.article.is_published);
        assert!(draft.article.published_at.is_none());
    }

    #[actix_web::test]
    async fn blank_publish_date_clears_schedule() {
        let seeded = seeded();
        let mut input = new_article(&seeded, "Scheduled", false);
        input.published_at = Some(Utc::now() + Duration::days(3));
        let created = create_article(&seeded.conn, seeded.storage.path(), input, None, APP_URL).await.unwrap();
        assert!(created.article.published_at.is_some());

        let untouched = ArticleChanges { excerpt: Some("new".into()), ..Default::default() };
        let kept = update_article(&seeded.conn, seeded.storage.path(), created.article.id, untouched, None, APP_URL)
            .await
            .unwrap();
        assert_eq!(kept.article.published_at, created.article.published_at);

        let clear = ArticleChanges { published_at: Some(None), ..Default::default() };
        let cleared = update_article(&seeded.conn, seeded.storage.path(), created.article.id, clear, None, APP_URL)
            .await
            .unwrap();
        assert!(!cleared.article.is_published);
        assert!(cleared.article.published_at.is_none());
    }

    #[actix_web::test]
    async fn admin_listing_filters_by_status() {
        let seeded = seeded();
        for (title, is_published) in [("One", true), ("Two", false), ("Three", true)] {
            create_article(&seeded.conn, seeded.storage.path(), new_article(&seeded, title, is_published), None, APP_URL)
                .await
                .unwrap();
        }
        let filters = |status| AdminArticleFilters {
            status,
            category_id: None,
            author_id: None,
            search: None,
            pagination: Pagination { page: 1, per_page: 2 },
        };

        let all = list_articles(&seeded.conn, &filters(None), APP_URL).unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.last_page, 2);
        assert_eq!(all.items.len(), 2);
        assert_eq!(all.items[0].article.title, "Three");
        assert!(all.items[0].category.is_some());

        let drafts = list_articles(&seeded.conn, &filters(Some(PublishStatus::Draft)), APP_URL).unwrap();
        assert_eq!(drafts.total, 1);
        assert_eq!(drafts.items[0].article.title, "Two");
    }

    #[actix_web::test]
    async fn retitling_regenerates_slug_only_when_title_changes() {
        let seeded = seeded();
        let a = create_article(&seeded.conn, seeded.storage.path(), new_article(&seeded, "First", false), None, APP_URL)
            .await
            .unwrap();
        create_article(&seeded.conn, seeded.storage.path(), new_article(&seeded, "Second", false), None, APP_URL)
            .await
            .unwrap();

        let same = ArticleChanges { title: Some("First".into()), ..Default::default() };
        let unchanged = update_article(&seeded.conn, seeded.storage.path(), a.article.id, same, None, APP_URL)
            .await
            .unwrap();
        assert_eq!(unchanged.article.slug, "first");

        let clash = ArticleChanges { title: Some("Second".into()), ..Default::default() };
        let renamed = update_article(&seeded.conn, seeded.storage.path(), a.article.id, clash, None, APP_URL)
            .await
            .unwrap();
        assert_eq!(renamed.article.slug, "second-1");
    }

    #[actix_web::test]
    async fn missing_article_is_not_found() {
        let seeded = seeded();
        let err = update_article(&seeded.conn, seeded.storage.path(), 404, ArticleChanges::default(), None, APP_URL)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(matches!(
            delete_article(&seeded.conn, seeded.storage.path(), 404).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[actix_web::test]
    async fn approval_and_deletion_recount_comments() {
        let seeded = seeded();
        let article = create_article(&seeded.conn, seeded.storage.path(), new_article(&seeded, "Counted", true), None, APP_URL)
            .await
            .unwrap();
        let article_id = article.article.id;
        let ids: Vec<i64> = (0..5)
            .map(|i| {
                let input = NewComment { content: format!("comment {}", i), parent_id: None };
                comments_db_operations::insert_comment(&seeded.conn, article_id, &input, Utc::now()).unwrap()
            })
            .collect();

        for id in &ids[..3] {
            set_comment_approval(&seeded.conn, *id, true).unwrap();
        }
        let count = |conn: &Connection| articles_db_operations::read_article(conn, article_id).unwrap().unwrap().comments_count;
        assert_eq!(count(&seeded.conn), 3);

        delete_comment(&seeded.conn, ids[0]).unwrap();
        assert_eq!(count(&seeded.conn), 2);

        set_comment_approval(&seeded.conn, ids[1], false).unwrap();
        assert_eq!(count(&seeded.conn), 1);
    }

    #[actix_web::test]
    async fn admin_show_includes_unapproved_threads() {
        let seeded = seeded();
        let mut input = new_article(&seeded, "Future", true);
        input.published_at = Some(Utc::now() + Duration::days(3));
        let article = create_article(&seeded.conn, seeded.storage.path(), input, None, APP_URL).await.unwrap();
        let root = comments_db_operations::insert_comment(
            &seeded.conn,
            article.article.id,
            &NewComment { content: "root".into(), parent_id: None },
            Utc::now(),
        )
        .unwrap();
        comments_db_operations::insert_comment(
            &seeded.conn,
            article.article.id,
            &NewComment { content: "reply".into(), parent_id: Some(root) },
            Utc::now(),
        )
        .unwrap();

        let shown = show_article(&seeded.conn, article.article.id, APP_URL).unwrap();
        let threads = shown.comments.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies.len(), 1);

        let filters = CommentFilters { approved: Some(false), article_id: None, pagination: Pagination { page: 1, per_page: 20 } };
        assert_eq!(list_comments(&seeded.conn, &filters).unwrap().total, 2);
    }
}
