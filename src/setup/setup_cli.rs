use blogbase_backend::config::Config;
use blogbase_backend::helper::slug_helpers::slugify;
use blogbase_backend::models::db_operations::{articles_db_operations, catalog_db_operations, users_db_operations};
use blogbase_backend::setup::db_setup;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial blog setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    Author {
        #[command(subcommand)]
        action: AuthorAction,
    },
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    Like {
        #[command(subcommand)]
        action: LikeAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the schema (safe to re-run).
    Setup,
    /// Inserts the default categories that are not present yet.
    Seed,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    List,
    ChangePassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        new_password: String,
    },
}

#[derive(Subcommand, Debug)]
enum AuthorAction {
    Create {
        #[arg(long)]
        name: String,
        /// Links the author to an existing user account.
        #[arg(long)]
        user_email: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        /// Path relative to STORAGE_PATH.
        #[arg(long)]
        profile_image: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    Create {
        #[arg(long)]
        name: String,
        /// Defaults to a slug derived from the name.
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
}

/// Per-user like rows. The public like endpoint only moves the article counter.
#[derive(Subcommand, Debug)]
enum LikeAction {
    Record {
        #[arg(long)]
        user_email: String,
        #[arg(long)]
        article_id: i64,
    },
    List {
        #[arg(long)]
        article_id: i64,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_database(&config),
            DbAction::Seed => seed_database(&config),
        },
        Commands::User { action } => match action {
            UserAction::Create { name, email, password } => create_user(&config, name, email, password),
            UserAction::List => list_users(&config),
            UserAction::ChangePassword { email, new_password } => change_password(&config, email, new_password),
        },
        Commands::Author { action } => match action {
            AuthorAction::Create { name, user_email, bio, profile_image } => create_author(
                &config,
                name,
                user_email.as_deref(),
                bio.as_deref(),
                profile_image.as_deref(),
            ),
        },
        Commands::Category { action } => match action {
            CategoryAction::Create { name, slug, description } => {
                create_category(&config, name, slug.as_deref(), description.as_deref())
            }
        },
        Commands::Like { action } => match action {
            LikeAction::Record { user_email, article_id } => record_like(&config, user_email, *article_id),
            LikeAction::List { article_id } => list_likes(&config, *article_id),
        },
    }
}

fn open_existing(config: &Config) -> Option<Connection> {
    let db_path = config.blog_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Blog database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    match Connection::open(&db_path).and_then(|conn| db_setup::apply_connection_pragmas(&conn).map(|_| conn)) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening blog database: {}", e);
            None
        }
    }
}

fn setup_database(config: &Config) {
    let db_path = config.blog_db_path();
    println!("\nSetting up blog database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Error: Could not create database directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::create_dir_all(PathBuf::from(&config.storage_path).join("articles")) {
        eprintln!("❌ Error: Could not create storage directory: {}", e);
        return;
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Error creating blog database file: {}", e);
            return;
        }
    };
    match db_setup::setup_blog_db(&mut conn) {
        Ok(_) => println!("✅ Blog database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up blog database: {}", e),
    }
}

fn seed_database(config: &Config) {
    let Some(mut conn) = open_existing(config) else { return };
    match db_setup::seed_default_categories(&mut conn) {
        Ok(0) => println!("ℹ️ Default categories already present. Nothing to seed."),
        Ok(count) => println!("✅ Seeded {} default categories.", count),
        Err(e) => eprintln!("❌ Error seeding categories: {}", e),
    }
}

fn create_user(config: &Config, name: &str, email: &str, password: &str) {
    let Some(conn) = open_existing(config) else { return };
    match users_db_operations::create_user(&conn, name, email, password) {
        Ok(id) => {
            let admin = config.admin_email_list().contains(&email.trim().to_lowercase());
            println!("✅ User '{}' created with id {}.", email, id);
            if !admin {
                println!("ℹ️ '{}' is not listed in ADMIN_EMAILS and cannot use the admin API.", email);
            }
        }
        Err(e) => eprintln!("❌ Error creating user: {}. The email might already be registered.", e),
    }
}

fn list_users(config: &Config) {
    let Some(conn) = open_existing(config) else { return };
    let admins = config.admin_email_list();
    match users_db_operations::read_all_users(&conn) {
        Ok(users) => {
            println!("Listing Users:");
            for user in users {
                let marker = if admins.contains(&user.email) { " (admin)" } else { "" };
                println!("- [{}] {} <{}>{}", user.id, user.name, user.email, marker);
            }
        }
        Err(e) => eprintln!("❌ Error fetching users: {}", e),
    }
}

fn change_password(config: &Config, email: &str, new_password: &str) {
    let Some(conn) = open_existing(config) else { return };
    match users_db_operations::update_password(&conn, email, new_password) {
        Ok(0) => eprintln!("❌ Error: No user with email '{}' found.", email),
        Ok(_) => println!("✅ Password for '{}' changed successfully.", email),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}

fn create_author(
    config: &Config,
    name: &str,
    user_email: Option<&str>,
    bio: Option<&str>,
    profile_image: Option<&str>,
) {
    let Some(conn) = open_existing(config) else { return };
    let user_id = match user_email {
        Some(email) => match users_db_operations::read_user_by_email(&conn, email) {
            Ok(Some(user)) => Some(user.id),
            Ok(None) => {
                eprintln!("❌ Error: No user with email '{}' found.", email);
                return;
            }
            Err(e) => {
                eprintln!("❌ Error looking up user: {}", e);
                return;
            }
        },
        None => None,
    };
    match catalog_db_operations::create_author(&conn, user_id, name, bio, profile_image) {
        Ok(id) => println!("✅ Author '{}' created with id {}.", name, id),
        Err(e) => eprintln!("❌ Error creating author: {}", e),
    }
}

fn create_category(config: &Config, name: &str, slug: Option<&str>, description: Option<&str>) {
    let Some(conn) = open_existing(config) else { return };
    let slug = slug.map(str::to_string).unwrap_or_else(|| slugify(name));
    match catalog_db_operations::create_category(&conn, name, &slug, description) {
        Ok(id) => println!("✅ Category '{}' ({}) created with id {}.", name, slug, id),
        Err(e) => eprintln!("❌ Error creating category: {}. The name or slug might already exist.", e),
    }
}

fn record_like(config: &Config, user_email: &str, article_id: i64) {
    let Some(conn) = open_existing(config) else { return };
    let user = match users_db_operations::read_user_by_email(&conn, user_email) {
        Ok(Some(user)) => user,
        Ok(None) => {
            eprintln!("❌ Error: No user with email '{}' found.", user_email);
            return;
        }
        Err(e) => {
            eprintln!("❌ Error looking up user: {}", e);
            return;
        }
    };
    match articles_db_operations::read_article(&conn, article_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            eprintln!("❌ Error: No article with id {} found.", article_id);
            return;
        }
        Err(e) => {
            eprintln!("❌ Error looking up article: {}", e);
            return;
        }
    }
    match articles_db_operations::record_like(&conn, user.id, article_id) {
        Ok(id) => println!("✅ Like {} recorded for '{}' on article {}.", id, user_email, article_id),
        Err(e) => eprintln!("❌ Error recording like: {}. The user might have liked this article already.", e),
    }
}

fn list_likes(config: &Config, article_id: i64) {
    let Some(conn) = open_existing(config) else { return };
    let likes = match articles_db_operations::read_likes(&conn, article_id) {
        Ok(likes) => likes,
        Err(e) => {
            eprintln!("❌ Error fetching likes: {}", e);
            return;
        }
    };
    match articles_db_operations::count_likes(&conn, article_id) {
        Ok(total) => println!("Listing likes for article {} ({} total):", article_id, total),
        Err(e) => {
            eprintln!("❌ Error counting likes: {}", e);
            return;
        }
    }
    for like in likes {
        println!("- [{}] user {} at {}", like.id, like.user_id, like.created_at.to_rfc3339());
    }
}
