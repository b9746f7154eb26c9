use crate::DbPool;
use chrono::Utc;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Result as RusqliteResult, Transaction};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default categories created by `db seed`: (name, slug, description).
pub const DEFAULT_CATEGORIES: [(&str, &str, &str); 4] = [
    ("AI", "ai", "人工知能、機械学習、ディープラーニングに関する記事"),
    ("バックエンド", "backend", "サーバーサイド開発、API設計、データベースに関する記事"),
    ("AWS", "aws", "Amazon Web Services の各種サービスに関する記事"),
    ("フロントエンド", "frontend", "UI開発、JavaScriptフレームワーク、CSSに関する記事"),
];

/// Must run on every new connection; SQLite leaves foreign keys off by default.
pub fn apply_connection_pragmas(conn: &Connection) -> RusqliteResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

pub fn build_pool(db_path: &Path) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| apply_connection_pragmas(conn));
    r2d2::Pool::new(manager)
}

pub fn setup_blog_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;

    log::info!("Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    log::info!("Creating 'categories' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    log::info!("Creating 'authors' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS authors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER,
            name TEXT NOT NULL,
            bio TEXT,
            profile_image TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
        )",
        [],
    )?;

    log::info!("Creating 'articles' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            image TEXT,
            excerpt TEXT NOT NULL,
            content TEXT NOT NULL,
            likes_count INTEGER NOT NULL DEFAULT 0 CHECK(likes_count >= 0),
            comments_count INTEGER NOT NULL DEFAULT 0 CHECK(comments_count >= 0),
            is_published INTEGER NOT NULL DEFAULT 0,
            published_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE,
            FOREIGN KEY (author_id) REFERENCES authors(id) ON DELETE CASCADE
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles (is_published, published_at)",
        [],
    )?;

    log::info!("Creating 'article_likes' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS article_likes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            article_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (user_id, article_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
        )",
        [],
    )?;

    log::info!("Creating 'comments' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id INTEGER NOT NULL,
            parent_id INTEGER,
            content TEXT NOT NULL,
            is_approved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_comments_article ON comments (article_id, is_approved)",
        [],
    )?;

    tx.commit()?;
    Ok(())
}

/// Inserts the default categories, skipping slugs that already exist.
/// Returns how many rows were added.
pub fn seed_default_categories(conn: &mut Connection) -> Result<usize, SetupError> {
    let tx = conn.transaction()?;
    let inserted = insert_default_categories(&tx)?;
    tx.commit()?;
    Ok(inserted)
}

fn insert_default_categories(tx: &Transaction) -> RusqliteResult<usize> {
    let now = Utc::now();
    let mut inserted = 0;
    for (name, slug, description) in DEFAULT_CATEGORIES {
        inserted += tx.execute(
            "INSERT OR IGNORE INTO categories (name, slug, description, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![name, slug, description, now],
        )?;
        log::info!("  > Category '{}' ({})", name, slug);
    }
    Ok(inserted)
}
