use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::http::header;
use actix_web::{
    cookie::{Key, SameSite},
    middleware::{DefaultHeaders, Logger},
    web, App, HttpResponse, HttpServer, Responder,
};
use blogbase_backend::{config::Config, middleware::AdminPolicy, routes, setup::db_setup};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

#[derive(Parser, Debug)]
#[command(name = "blogbase_server", author, version, about = "Starts the blog API server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

fn build_cors(config: &Config) -> Cors {
    let cors = if config.allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        config
            .allowed_origin_list()
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-xsrf-token"),
        ])
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let db_path = config.blog_db_path();
    if !db_path.exists() {
        panic!(
            "FATAL: blog.db not found at '{}'. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'",
            db_path.display()
        );
    }
    fs::create_dir_all(Path::new(&config.storage_path).join("articles"))
        .expect("Failed to create storage directory");

    let pool = db_setup::build_pool(&db_path).expect("FATAL: Failed to create Rusqlite connection pool.");
    let admin_policy = web::Data::new(AdminPolicy::new(config.admin_email_list()));

    let session_key_bytes = hex::decode(&config.session_secret_key)
        .expect("FATAL: SESSION_SECRET_KEY in .env is not a valid hex string.");
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .expect("FATAL: The decoded SESSION_SECRET_KEY is not long enough (minimum 64 bytes required).");

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(SameSite::Lax)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(build_cors(&config))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(pool.clone()))
            .app_data(admin_policy.clone())
            .configure(routes::config_api)
            .service(actix_files::Files::new("/storage", &config.storage_path))
            .route("/", web::get().to(root_handler))
    })
    .bind(server_address)?
    .run()
    .await
}
