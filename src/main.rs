#[macro_use]
extern crate lazy_static;

use std::{str::FromStr, time::Duration};

use actix_files::{Files, NamedFile};
use actix_identity::IdentityMiddleware;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    http::{Method, StatusCode},
    middleware,
    web::{self, Data},
    App, Either, HttpResponse, HttpServer, Responder,
};
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
    SqlitePool,
};
use tera::Tera;

mod auth;
mod config;
mod db;
mod errors;
mod flash;
mod lifecycle;
mod policy;
mod routes;
mod storage;
mod structs;
#[cfg(test)]
mod test_utils;
mod utils;

use config::AppConfig;
use errors::AppError;
use storage::ReceiptStore;
use structs::StatusPolicy;

#[derive(Debug, Clone)]
pub struct AppState {
    db_pool: SqlitePool,
    receipts: ReceiptStore,
    status_policy: StatusPolicy,
    max_upload_bytes: usize,
}

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = match Tera::new("templates/**/*") {
            Ok(t) => t,
            Err(e) => {
                log::error!("Parsing error(s): {}", e);
                ::std::process::exit(1);
            }
        };
        tera.autoescape_on(vec![".html"]);
        tera
    };
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()?;
    let session_key = config.session_key()?;

    let opts = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(AppError::from)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .read_only(false)
        .busy_timeout(Duration::from_secs(5));

    let db_pool = SqlitePool::connect_with(opts).await.map_err(|e| {
        log::error!("FATAL: cannot open database {}: {}", config.database_url, e);
        AppError::from(e)
    })?;

    sqlx::migrate!().run(&db_pool).await.map_err(AppError::from)?;
    info!("Database migrated successfully");

    let receipts = ReceiptStore::new(config.upload_dir.clone());
    receipts.ensure_dir().await?;

    let state = AppState {
        db_pool,
        receipts,
        status_policy: config.status_policy,
        max_upload_bytes: config.max_upload_bytes,
    };
    db::bootstrap_admin(&state).await?;
    info!(
        "{} registered user(s)",
        db::count_users(&state).await.map_err(AppError::from)?
    );
    lazy_static::initialize(&TEMPLATES);

    info!(
        "Starting HTTP server on http://{}:{}/ (status policy: {:?})",
        config.host, config.port, config.status_policy
    );

    let cookie_secure = config.cookie_secure;
    HttpServer::new(move || {
        App::new()
            // enable automatic response compression - usually register this first
            .wrap(middleware::Compress::default())
            .wrap(IdentityMiddleware::default())
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
                    .cookie_secure(cookie_secure)
                    .build(),
            )
            // enable logger - always register Actix Web Logger middleware last
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", "static"))
            .app_data(Data::new(state.clone()))
            .configure(routes::configure)
            .default_service(web::to(default_handler))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

async fn default_handler(req_method: Method) -> Result<impl Responder, std::io::Error> {
    match req_method {
        Method::GET => {
            let file = NamedFile::open("static/404.html")?
                .customize()
                .with_status(StatusCode::NOT_FOUND);
            Ok(Either::Left(file))
        }
        _ => Ok(Either::Right(HttpResponse::MethodNotAllowed().finish())),
    }
}
