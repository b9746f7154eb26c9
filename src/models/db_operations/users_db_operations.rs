use super::DbError;
use crate::models::User;
use bcrypt::{hash, verify};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn create_user(conn: &Connection, name: &str, email: &str, password: &str) -> Result<i64, DbError> {
    create_user_with_cost(conn, name, email, password, bcrypt::DEFAULT_COST)
}

/// Same as [`create_user`] with an explicit bcrypt cost (lower costs keep tests fast).
pub fn create_user_with_cost(
    conn: &Connection,
    name: &str,
    email: &str,
    password: &str,
    cost: u32,
) -> Result<i64, DbError> {
    let hashed_password = hash(password, cost)?;
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (name, email, password_hash, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        params![name, normalize_email(email), hashed_password, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_users(conn: &Connection) -> Result<Vec<User>, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let users = stmt
        .query_map([], map_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn read_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [user_id],
            map_user,
        )
        .optional()?)
}

pub fn read_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            [normalize_email(email)],
            map_user,
        )
        .optional()?)
}

/// Returns the user only when the email exists and the password matches.
/// Callers cannot tell an unknown email from a wrong password.
pub fn verify_credentials(conn: &Connection, email: &str, password: &str) -> Result<Option<User>, DbError> {
    let user = match read_user_by_email(conn, email)? {
        Some(user) => user,
        None => return Ok(None),
    };
    if verify(password, &user.password_hash).unwrap_or(false) {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

pub fn update_password(conn: &Connection, email: &str, new_password: &str) -> Result<usize, DbError> {
    let hashed_password = hash(new_password, bcrypt::DEFAULT_COST)?;
    Ok(conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE email = ?3",
        params![hashed_password, Utc::now(), normalize_email(email)],
    )?)
}

pub fn delete_user(conn: &Connection, user_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM users WHERE id = ?1", [user_id])?)
}
