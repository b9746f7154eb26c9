use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

/// Language used for validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Ja,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // These fields will be populated from the .env file
    pub database_path: String,
    pub storage_path: String,
    pub app_url: String,
    pub allowed_origins: String,
    pub admin_emails: String,
    pub app_locale: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
    pub max_image_size_kb: u64,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

fn require_absolute(name: &str, value: &str) -> Result<(), config::ConfigError> {
    if Path::new(value).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, value
        )));
    }
    Ok(())
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let database_path = required_var("DATABASE_PATH")?;
        let storage_path = required_var("STORAGE_PATH")?;
        let session_secret_key = required_var("SESSION_SECRET_KEY")?;

        // 128 hex characters (64 bytes), the minimum cookie key length.
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config::ConfigError::Message(
                "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string(),
            ));
        }

        require_absolute("DATABASE_PATH", &database_path)?;
        require_absolute("STORAGE_PATH", &storage_path)?;

        let app_url = env::var("APP_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
        if url::Url::parse(&app_url).is_err() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: 'APP_URL' is not a valid absolute URL ('{}').",
                app_url
            )));
        }

        let app_locale = env::var("APP_LOCALE").unwrap_or_else(|_| "en".to_string());
        if app_locale != "en" && app_locale != "ja" {
            return Err(config::ConfigError::Message(format!(
                "FATAL: 'APP_LOCALE' must be 'en' or 'ja' (got '{}').",
                app_locale
            )));
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let admin_emails = env::var("ADMIN_EMAILS").unwrap_or_default();
        if admin_emails.trim().is_empty() {
            log::warn!("ADMIN_EMAILS is not set. No user will be able to reach the admin API.");
        }

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let max_image_size_kb = env::var("MAX_IMAGE_SIZE_KB")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2048);

        let builder = config::Config::builder()
            // Base settings (web host/port) come from the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("storage_path", storage_path)?
            .set_override("app_url", app_url.trim_end_matches('/').to_string())?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("admin_emails", admin_emails)?
            .set_override("app_locale", app_locale)?
            .set_override("log_level", log_level)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("max_image_size_kb", max_image_size_kb as i64)?
            .build()?;

        builder.try_deserialize()
    }

    /// Returns the full path to the blog database file inside its own folder.
    pub fn blog_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("blog").join("blog.db")
    }

    pub fn locale(&self) -> Locale {
        match self.app_locale.as_str() {
            "ja" => Locale::Ja,
            _ => Locale::En,
        }
    }

    /// Lowercased admin allowlist entries.
    pub fn admin_email_list(&self) -> Vec<String> {
        split_list(&self.admin_emails)
            .into_iter()
            .map(|e| e.to_lowercase())
            .collect()
    }

    pub fn allowed_origin_list(&self) -> Vec<String> {
        split_list(&self.allowed_origins)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
