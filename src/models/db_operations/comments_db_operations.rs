use super::{DbError, QueryFilter};
use crate::models::{ArticleRef, Comment, CommentFilters, CommentListing, CommentThread, NewComment};
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;

const COMMENT_COLUMNS: &str = "cm.id, cm.article_id, cm.parent_id, cm.content, cm.is_approved, cm.created_at, cm.updated_at";
const PARENT_COLUMNS: &str = "p.id, p.article_id, p.parent_id, p.content, p.is_approved, p.created_at, p.updated_at";

fn map_comment(row: &Row, offset: usize) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(offset)?,
        article_id: row.get(offset + 1)?,
        parent_id: row.get(offset + 2)?,
        content: row.get(offset + 3)?,
        is_approved: row.get(offset + 4)?,
        created_at: row.get(offset + 5)?,
        updated_at: row.get(offset + 6)?,
    })
}

/// New comments always start unapproved.
pub fn insert_comment(
    conn: &Connection,
    article_id: i64,
    input: &NewComment,
    now: DateTime<Utc>,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO comments (article_id, parent_id, content, is_approved, created_at, updated_at) \
         VALUES (?1, ?2, ?3, 0, ?4, ?4)",
        params![article_id, input.parent_id, input.content, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_comment(conn: &Connection, comment_id: i64) -> Result<Option<Comment>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM comments cm WHERE cm.id = ?1", COMMENT_COLUMNS),
            [comment_id],
            |row| map_comment(row, 0),
        )
        .optional()?)
}

pub fn comment_exists(conn: &Connection, comment_id: i64) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?1)",
        [comment_id],
        |row| row.get(0),
    )?)
}

/// Root comments of an article with their direct replies, both oldest first.
/// With `approved_only`, unapproved roots and replies are both left out.
pub fn read_threads(conn: &Connection, article_id: i64, approved_only: bool) -> Result<Vec<CommentThread>, DbError> {
    let approval = if approved_only { " AND cm.is_approved = 1" } else { "" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM comments cm WHERE cm.article_id = ?1{} ORDER BY cm.id ASC",
        COMMENT_COLUMNS, approval
    ))?;
    let comments = stmt
        .query_map([article_id], |row| map_comment(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut replies: HashMap<i64, Vec<Comment>> = HashMap::new();
    let mut roots = Vec::new();
    for comment in comments {
        match comment.parent_id {
            Some(parent_id) => replies.entry(parent_id).or_default().push(comment),
            None => roots.push(comment),
        }
    }

    Ok(roots
        .into_iter()
        .map(|comment| CommentThread {
            replies: replies.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect())
}

/// Moderation listing, newest first, with the owning article and parent comment.
pub fn read_page(conn: &Connection, filters: &CommentFilters) -> Result<(Vec<CommentListing>, u64), DbError> {
    let mut filter = QueryFilter::default();
    if let Some(approved) = filters.approved {
        filter.push("cm.is_approved = ?", vec![Box::new(approved)]);
    }
    if let Some(article_id) = filters.article_id {
        filter.push("cm.article_id = ?", vec![Box::new(article_id)]);
    }
    let where_sql = filter.where_sql();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM comments cm{}", where_sql),
        params_from_iter(filter.params()),
        |row| row.get(0),
    )?;

    let limit = filters.pagination.per_page as i64;
    let offset = filters.pagination.offset() as i64;
    let sql = format!(
        "SELECT {}, a.id, a.title, a.slug, {} FROM comments cm \
         JOIN articles a ON a.id = cm.article_id \
         LEFT JOIN comments p ON p.id = cm.parent_id{} \
         ORDER BY cm.created_at DESC, cm.id DESC LIMIT ? OFFSET ?",
        COMMENT_COLUMNS, PARENT_COLUMNS, where_sql
    );
    let mut stmt = conn.prepare(&sql)?;
    let listings = stmt
        .query_map(
            params_from_iter(
                filter
                    .params()
                    .chain([&limit as &dyn ToSql, &offset as &dyn ToSql]),
            ),
            |row| {
                let parent_id: Option<i64> = row.get(10)?;
                Ok(CommentListing {
                    comment: map_comment(row, 0)?,
                    article: ArticleRef { id: row.get(7)?, title: row.get(8)?, slug: row.get(9)? },
                    parent: match parent_id {
                        Some(_) => Some(map_comment(row, 10)?),
                        None => None,
                    },
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok((listings, total as u64))
}

pub fn set_approval(conn: &Connection, comment_id: i64, approved: bool, now: DateTime<Utc>) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE comments SET is_approved = ?1, updated_at = ?2 WHERE id = ?3",
        params![approved, now, comment_id],
    )?)
}

/// Replies are removed with their parent through `ON DELETE CASCADE`.
pub fn delete_comment(conn: &Connection, comment_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?)
}

pub fn count_for_article(conn: &Connection, article_id: i64) -> Result<i64, DbError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE article_id = ?1",
        [article_id],
        |row| row.get(0),
    )?)
}
