use super::DbError;
use crate::models::{Author, Category};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(crate) const CATEGORY_COLUMNS: &str = "c.id, c.name, c.slug, c.description, c.created_at, c.updated_at";
pub(crate) const AUTHOR_COLUMNS: &str =
    "au.id, au.user_id, au.name, au.bio, au.profile_image, au.created_at, au.updated_at";

/// Maps the six category columns starting at `offset`.
pub(crate) fn map_category(row: &Row, offset: usize) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        slug: row.get(offset + 2)?,
        description: row.get(offset + 3)?,
        created_at: row.get(offset + 4)?,
        updated_at: row.get(offset + 5)?,
    })
}

/// Maps the seven author columns starting at `offset`.
pub(crate) fn map_author(row: &Row, offset: usize) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(offset)?,
        user_id: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        bio: row.get(offset + 3)?,
        profile_image: row.get(offset + 4)?,
        created_at: row.get(offset + 5)?,
        updated_at: row.get(offset + 6)?,
    })
}

// --- Categories ---

pub fn create_category(
    conn: &Connection,
    name: &str,
    slug: &str,
    description: Option<&str>,
) -> Result<i64, DbError> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO categories (name, slug, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        params![name, slug, description, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_categories(conn: &Connection) -> Result<Vec<Category>, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM categories c ORDER BY c.id", CATEGORY_COLUMNS))?;
    let categories = stmt
        .query_map([], |row| map_category(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(categories)
}

pub fn read_category_by_slug(conn: &Connection, slug: &str) -> Result<Option<Category>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM categories c WHERE c.slug = ?1", CATEGORY_COLUMNS),
            [slug],
            |row| map_category(row, 0),
        )
        .optional()?)
}

pub fn category_exists(conn: &Connection, category_id: i64) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
        [category_id],
        |row| row.get(0),
    )?)
}

// --- Authors ---

pub fn create_author(
    conn: &Connection,
    user_id: Option<i64>,
    name: &str,
    bio: Option<&str>,
    profile_image: Option<&str>,
) -> Result<i64, DbError> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO authors (user_id, name, bio, profile_image, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![user_id, name, bio, profile_image, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_authors(conn: &Connection) -> Result<Vec<Author>, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM authors au ORDER BY au.id", AUTHOR_COLUMNS))?;
    let authors = stmt
        .query_map([], |row| map_author(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(authors)
}

pub fn read_author(conn: &Connection, author_id: i64) -> Result<Option<Author>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM authors au WHERE au.id = ?1", AUTHOR_COLUMNS),
            [author_id],
            |row| map_author(row, 0),
        )
        .optional()?)
}

pub fn author_exists(conn: &Connection, author_id: i64) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM authors WHERE id = ?1)",
        [author_id],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::test_support::memory_db;
    use crate::models::db_operations::users_db_operations;
    use rstest::rstest;

    #[rstest]
    fn category_lookup_by_slug() {
        let conn = memory_db();
        let id = create_category(&conn, "AWS", "aws", Some("Cloud")).unwrap();
        assert!(category_exists(&conn, id).unwrap());
        assert!(!category_exists(&conn, id + 1).unwrap());
        assert_eq!(read_category_by_slug(&conn, "aws").unwrap().map(|c| c.id), Some(id));
        assert!(read_category_by_slug(&conn, "missing").unwrap().is_none());
    }

    #[rstest]
    #[case("AWS", "aws-2")]
    #[case("Amazon", "aws")]
    fn category_name_and_slug_are_unique(#[case] name: &str, #[case] slug: &str) {
        let conn = memory_db();
        create_category(&conn, "AWS", "aws", None).unwrap();
        assert!(create_category(&conn, name, slug, None).is_err());
        assert_eq!(read_all_categories(&conn).unwrap().len(), 1);
    }

    #[rstest]
    fn deleting_user_detaches_author() {
        let conn = memory_db();
        let user_id = users_db_operations::create_user_with_cost(&conn, "W", "w@example.com", "x", 4).unwrap();
        let author_id = create_author(&conn, Some(user_id), "Writer", None, None).unwrap();

        users_db_operations::delete_user(&conn, user_id).unwrap();

        let author = read_author(&conn, author_id).unwrap().unwrap();
        assert_eq!(author.user_id, None);
    }
}
