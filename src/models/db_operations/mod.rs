use rusqlite::types::ToSql;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Password hashing error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Accumulates `WHERE` clauses together with their positional parameters.
#[derive(Default)]
pub(crate) struct QueryFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl QueryFilter {
    pub(crate) fn push(&mut self, clause: &str, values: Vec<Box<dyn ToSql>>) {
        self.clauses.push(clause.to_string());
        self.params.extend(values);
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn params(&self) -> impl Iterator<Item = &dyn ToSql> {
        self.params.iter().map(|p| p.as_ref())
    }
}

/// `%term%` pattern for LIKE searches.
pub(crate) fn like_pattern(term: &str) -> String {
    format!("%{}%", term)
}

pub mod articles_db_operations;
pub mod catalog_db_operations;
pub mod comments_db_operations;
pub mod users_db_operations;
