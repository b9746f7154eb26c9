use super::catalog_db_operations::{map_author, map_category, AUTHOR_COLUMNS, CATEGORY_COLUMNS};
use super::{like_pattern, DbError, QueryFilter};
use crate::models::{AdminArticleFilters, Article, ArticleLike, Author, Category, NewArticle, Pagination, PublishStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const ARTICLE_COLUMNS: &str = "a.id, a.category_id, a.author_id, a.title, a.slug, a.image, a.excerpt, a.content, \
     a.likes_count, a.comments_count, a.is_published, a.published_at, a.created_at, a.updated_at";
const ARTICLE_COLUMN_COUNT: usize = 14;
const CATEGORY_COLUMN_COUNT: usize = 6;

const PUBLISHED_CLAUSE: &str = "a.is_published = 1 AND a.published_at IS NOT NULL AND a.published_at <= ?";
const SEARCH_CLAUSE: &str = "(a.title LIKE ? OR a.excerpt LIKE ? OR a.content LIKE ?)";

/// An article joined with its category and author.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub article: Article,
    pub category: Category,
    pub author: Author,
}

fn map_article(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        category_id: row.get(1)?,
        author_id: row.get(2)?,
        title: row.get(3)?,
        slug: row.get(4)?,
        image: row.get(5)?,
        excerpt: row.get(6)?,
        content: row.get(7)?,
        likes_count: row.get(8)?,
        comments_count: row.get(9)?,
        is_published: row.get(10)?,
        published_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn map_record(row: &Row) -> rusqlite::Result<ArticleRecord> {
    Ok(ArticleRecord {
        article: map_article(row)?,
        category: map_category(row, ARTICLE_COLUMN_COUNT)?,
        author: map_author(row, ARTICLE_COLUMN_COUNT + CATEGORY_COLUMN_COUNT)?,
    })
}

fn record_select() -> String {
    format!(
        "SELECT {}, {}, {} FROM articles a \
         JOIN categories c ON c.id = a.category_id \
         JOIN authors au ON au.id = a.author_id",
        ARTICLE_COLUMNS, CATEGORY_COLUMNS, AUTHOR_COLUMNS
    )
}

fn push_search(filter: &mut QueryFilter, search: Option<&str>) {
    if let Some(term) = search {
        let pattern = like_pattern(term);
        filter.push(
            SEARCH_CLAUSE,
            vec![Box::new(pattern.clone()), Box::new(pattern.clone()), Box::new(pattern)],
        );
    }
}

fn read_record_page(
    conn: &Connection,
    filter: &QueryFilter,
    order_by: &str,
    pagination: Pagination,
) -> Result<(Vec<ArticleRecord>, u64), DbError> {
    let where_sql = filter.where_sql();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM articles a{}", where_sql),
        params_from_iter(filter.params()),
        |row| row.get(0),
    )?;

    let limit = pagination.per_page as i64;
    let offset = pagination.offset() as i64;
    let sql = format!("{}{} ORDER BY {} LIMIT ? OFFSET ?", record_select(), where_sql, order_by);
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(
            params_from_iter(
                filter
                    .params()
                    .chain([&limit as &dyn ToSql, &offset as &dyn ToSql]),
            ),
            map_record,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok((records, total as u64))
}

/// Published articles (`published_at <= now`), newest publication first.
pub fn read_published_page(
    conn: &Connection,
    category_id: Option<i64>,
    search: Option<&str>,
    pagination: Pagination,
    now: DateTime<Utc>,
) -> Result<(Vec<ArticleRecord>, u64), DbError> {
    let mut filter = QueryFilter::default();
    filter.push(PUBLISHED_CLAUSE, vec![Box::new(now)]);
    if let Some(id) = category_id {
        filter.push("a.category_id = ?", vec![Box::new(id)]);
    }
    push_search(&mut filter, search);
    read_record_page(conn, &filter, "a.published_at DESC, a.id DESC", pagination)
}

/// Every article regardless of publish state, newest created first.
pub fn read_admin_page(conn: &Connection, filters: &AdminArticleFilters) -> Result<(Vec<ArticleRecord>, u64), DbError> {
    let mut filter = QueryFilter::default();
    match filters.status {
        Some(PublishStatus::Published) => filter.push("a.is_published = 1", vec![]),
        Some(PublishStatus::Draft) => filter.push("a.is_published = 0", vec![]),
        None => {}
    }
    if let Some(id) = filters.category_id {
        filter.push("a.category_id = ?", vec![Box::new(id)]);
    }
    if let Some(id) = filters.author_id {
        filter.push("a.author_id = ?", vec![Box::new(id)]);
    }
    push_search(&mut filter, filters.search.as_deref());
    read_record_page(conn, &filter, "a.created_at DESC, a.id DESC", filters.pagination)
}

pub fn read_published_by_slug(
    conn: &Connection,
    slug: &str,
    now: DateTime<Utc>,
) -> Result<Option<ArticleRecord>, DbError> {
    Ok(conn
        .query_row(
            &format!("{} WHERE a.slug = ? AND {}", record_select(), PUBLISHED_CLAUSE),
            params![slug, now],
            map_record,
        )
        .optional()?)
}

pub fn read_record(conn: &Connection, article_id: i64) -> Result<Option<ArticleRecord>, DbError> {
    Ok(conn
        .query_row(&format!("{} WHERE a.id = ?", record_select()), [article_id], map_record)
        .optional()?)
}

pub fn read_article(conn: &Connection, article_id: i64) -> Result<Option<Article>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM articles a WHERE a.id = ?1", ARTICLE_COLUMNS),
            [article_id],
            map_article,
        )
        .optional()?)
}

/// Whether `slug` is taken by any article other than `exclude_id`.
pub fn slug_exists(conn: &Connection, slug: &str, exclude_id: Option<i64>) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM articles WHERE slug = ?1 AND (?2 IS NULL OR id != ?2))",
        params![slug, exclude_id],
        |row| row.get(0),
    )?)
}

pub fn insert_article(
    conn: &Connection,
    input: &NewArticle,
    slug: &str,
    image: Option<&str>,
    now: DateTime<Utc>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO articles (category_id, author_id, title, slug, image, excerpt, content, \
         likes_count, comments_count, is_published, published_at, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, ?8, ?9, ?10, ?10)",
        params![
            input.category_id,
            input.author_id,
            input.title,
            slug,
            image,
            input.excerpt,
            input.content,
            input.is_published,
            input.published_at,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Writes back every editable column of `article`. Counters are left alone.
pub fn update_article(conn: &Connection, article: &Article) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE articles SET category_id = ?1, author_id = ?2, title = ?3, slug = ?4, image = ?5, \
         excerpt = ?6, content = ?7, is_published = ?8, published_at = ?9, updated_at = ?10 WHERE id = ?11",
        params![
            article.category_id,
            article.author_id,
            article.title,
            article.slug,
            article.image,
            article.excerpt,
            article.content,
            article.is_published,
            article.published_at,
            article.updated_at,
            article.id
        ],
    )?)
}

/// Comments and likes go with the article through `ON DELETE CASCADE`.
pub fn delete_article(conn: &Connection, article_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM articles WHERE id = ?1", [article_id])?)
}

/// Adds or removes one like, never dropping below zero, and returns the new count.
pub fn adjust_likes(conn: &Connection, article_id: i64, liked: bool, now: DateTime<Utc>) -> Result<i64, DbError> {
    let sql = if liked {
        "UPDATE articles SET likes_count = likes_count + 1, updated_at = ?1 WHERE id = ?2"
    } else {
        "UPDATE articles SET likes_count = MAX(likes_count - 1, 0), updated_at = ?1 WHERE id = ?2"
    };
    conn.execute(sql, params![now, article_id])?;
    Ok(conn.query_row("SELECT likes_count FROM articles WHERE id = ?1", [article_id], |row| row.get(0))?)
}

/// Recomputes `comments_count` from the approved comments and returns it.
pub fn refresh_comments_count(conn: &Connection, article_id: i64, now: DateTime<Utc>) -> Result<i64, DbError> {
    conn.execute(
        "UPDATE articles SET comments_count = \
         (SELECT COUNT(*) FROM comments WHERE article_id = ?1 AND is_approved = 1), updated_at = ?2 \
         WHERE id = ?1",
        params![article_id, now],
    )?;
    Ok(conn.query_row("SELECT comments_count FROM articles WHERE id = ?1", [article_id], |row| row.get(0))?)
}

// --- article_likes join table ---

pub fn record_like(conn: &Connection, user_id: i64, article_id: i64) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO article_likes (user_id, article_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![user_id, article_id, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_likes(conn: &Connection, article_id: i64) -> Result<i64, DbError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM article_likes WHERE article_id = ?1",
        [article_id],
        |row| row.get(0),
    )?)
}

/// Like rows for one article, oldest first.
pub fn read_likes(conn: &Connection, article_id: i64) -> Result<Vec<ArticleLike>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, article_id, created_at FROM article_likes WHERE article_id = ?1 ORDER BY created_at, id",
    )?;
    let likes = stmt
        .query_map([article_id], |row| {
            Ok(ArticleLike {
                id: row.get(0)?,
                user_id: row.get(1)?,
                article_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(likes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::catalog_db_operations::{create_author, create_category};
    use crate::models::db_operations::test_support::memory_db;
    use crate::models::db_operations::users_db_operations;
    use chrono::Duration;
    use rstest::{fixture, rstest};

    struct Seeded {
        conn: Connection,
        category_id: i64,
        author_id: i64,
    }

    #[fixture]
    fn seeded() -> Seeded {
        let conn = memory_db();
        let category_id = create_category(&conn, "Backend", "backend", None).unwrap();
        let author_id = create_author(&conn, None, "Writer", None, None).unwrap();
        Seeded { conn, category_id, author_id }
    }

    fn insert(s: &Seeded, slug: &str, published_at: Option<DateTime<Utc>>) -> i64 {
        let input = NewArticle {
            category_id: s.category_id,
            author_id: s.author_id,
            title: slug.to_string(),
            excerpt: "excerpt".into(),
            content: "<p>body</p>".into(),
            is_published: published_at.is_some(),
            published_at,
        };
        insert_article(&s.conn, &input, slug, None, Utc::now()).unwrap()
    }

    const FIRST_PAGE: Pagination = Pagination { page: 1, per_page: 10 };

    #[rstest]
    fn published_scope_hides_drafts_and_future_posts(seeded: Seeded) {
        let now = Utc::now();
        insert(&seeded, "live", Some(now - Duration::hours(1)));
        insert(&seeded, "draft", None);
        insert(&seeded, "scheduled", Some(now + Duration::days(1)));

        let (records, total) = read_published_page(&seeded.conn, None, None, FIRST_PAGE, now).unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].article.slug, "live");
        assert!(read_published_by_slug(&seeded.conn, "scheduled", now).unwrap().is_none());
        assert!(read_published_by_slug(&seeded.conn, "draft", now).unwrap().is_none());
    }

    #[rstest]
    fn published_page_orders_by_publication_desc(seeded: Seeded) {
        let now = Utc::now();
        insert(&seeded, "older", Some(now - Duration::days(2)));
        insert(&seeded, "newer", Some(now - Duration::days(1)));

        let (records, _) = read_published_page(&seeded.conn, None, None, FIRST_PAGE, now).unwrap();
        let slugs: Vec<_> = records.iter().map(|r| r.article.slug.as_str()).collect();
        assert_eq!(slugs, vec!["newer", "older"]);
    }

    #[rstest]
    fn search_matches_title_excerpt_and_content(seeded: Seeded) {
        let now = Utc::now();
        insert(&seeded, "rust-tips", Some(now - Duration::hours(1)));
        insert(&seeded, "go-tips", Some(now - Duration::hours(1)));

        let (records, total) = read_published_page(&seeded.conn, None, Some("rust"), FIRST_PAGE, now).unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].article.slug, "rust-tips");

        let (_, total) = read_published_page(&seeded.conn, None, Some("body"), FIRST_PAGE, now).unwrap();
        assert_eq!(total, 2);
    }

    #[rstest]
    fn slug_exists_can_exclude_current_row(seeded: Seeded) {
        let id = insert(&seeded, "taken", None);
        assert!(slug_exists(&seeded.conn, "taken", None).unwrap());
        assert!(!slug_exists(&seeded.conn, "taken", Some(id)).unwrap());
        assert!(!slug_exists(&seeded.conn, "free", None).unwrap());
    }

    #[rstest]
    fn likes_never_drop_below_zero(seeded: Seeded) {
        let id = insert(&seeded, "liked", Some(Utc::now()));
        assert_eq!(adjust_likes(&seeded.conn, id, false, Utc::now()).unwrap(), 0);
        assert_eq!(adjust_likes(&seeded.conn, id, true, Utc::now()).unwrap(), 1);
        assert_eq!(adjust_likes(&seeded.conn, id, true, Utc::now()).unwrap(), 2);
        assert_eq!(adjust_likes(&seeded.conn, id, false, Utc::now()).unwrap(), 1);
    }

    #[rstest]
    fn deleting_article_removes_like_rows(seeded: Seeded) {
        let id = insert(&seeded, "gone", Some(Utc::now()));
        let user_id = users_db_operations::create_user_with_cost(&seeded.conn, "U", "u@example.com", "x", 4).unwrap();
        record_like(&seeded.conn, user_id, id).unwrap();
        assert!(record_like(&seeded.conn, user_id, id).is_err(), "one like per user and article");
        assert_eq!(count_likes(&seeded.conn, id).unwrap(), 1);

        delete_article(&seeded.conn, id).unwrap();
        assert_eq!(count_likes(&seeded.conn, id).unwrap(), 0);
    }

    #[rstest]
    fn like_rows_are_read_per_article(seeded: Seeded) {
        let first = insert(&seeded, "first", Some(Utc::now()));
        let second = insert(&seeded, "second", Some(Utc::now()));
        let alice = users_db_operations::create_user_with_cost(&seeded.conn, "A", "a@example.com", "x", 4).unwrap();
        let bob = users_db_operations::create_user_with_cost(&seeded.conn, "B", "b@example.com", "x", 4).unwrap();
        record_like(&seeded.conn, alice, first).unwrap();
        record_like(&seeded.conn, bob, first).unwrap();
        record_like(&seeded.conn, bob, second).unwrap();

        let likes = read_likes(&seeded.conn, first).unwrap();
        assert_eq!(likes.iter().map(|l| l.user_id).collect::<Vec<_>>(), vec![alice, bob]);
        assert!(likes.iter().all(|l| l.article_id == first));
        assert_eq!(likes.len() as i64, count_likes(&seeded.conn, first).unwrap());
        assert!(read_likes(&seeded.conn, second + 1).unwrap().is_empty());
    }

    #[rstest]
    fn admin_page_filters_by_status(seeded: Seeded) {
        insert(&seeded, "pub", Some(Utc::now()));
        insert(&seeded, "draft", None);
        let mut filters = AdminArticleFilters {
            status: Some(PublishStatus::Draft),
            category_id: None,
            author_id: None,
            search: None,
            pagination: Pagination { page: 1, per_page: 15 },
        };
        let (records, total) = read_admin_page(&seeded.conn, &filters).unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].article.slug, "draft");

        filters.status = None;
        assert_eq!(read_admin_page(&seeded.conn, &filters).unwrap().1, 2);
    }
}
