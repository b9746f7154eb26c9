use crate::models::db_operations::{articles_db_operations, DbError};
use rusqlite::Connection;

const FALLBACK_SLUG: &str = "article";

/// Lowercase ASCII words joined by `-`. Titles with no ASCII letters or digits
/// (e.g. all-Japanese titles) fall back to `article`.
pub fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        .map(|ch| match ch {
            'a'..='z' | '0'..='9' => ch,
            _ => '-',
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Slug for `title` that no other article uses: `base`, then `base-1`, `base-2`, ...
/// `exclude_id` is the article being updated, whose own slug does not count.
pub fn unique_slug(conn: &Connection, title: &str, exclude_id: Option<i64>) -> Result<String, DbError> {
    let base = slugify(title);
    let mut candidate = base.clone();
    let mut suffix = 1;
    while articles_db_operations::slug_exists(conn, &candidate, exclude_id)? {
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    Ok(candidate)
}
