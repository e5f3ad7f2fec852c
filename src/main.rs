mod clients;
mod config;
mod database;
mod handlers;
mod models;
mod store;
mod workflows;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use crate::clients::google_auth::ServiceAccountAuth;
use crate::clients::GoogleApiClient;
use crate::config::{AppConfig, StoreBackend};
use crate::database::Database;
use crate::store::{BusinessStore, InMemoryStore, ReviewStore};
use crate::workflows::ConnectorService;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{context}: {err}");
    std::io::Error::new(std::io::ErrorKind::Other, format!("{context}: {err}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|err| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
    })?;

    let (businesses, reviews): (Arc<dyn BusinessStore>, Arc<dyn ReviewStore>) = match &config.store
    {
        StoreBackend::Postgres { database_url } => {
            let db = Arc::new(
                Database::connect(database_url)
                    .await
                    .map_err(|err| startup_error("Failed to initialize database", err))?,
            );
            let businesses: Arc<dyn BusinessStore> = db.clone();
            let reviews: Arc<dyn ReviewStore> = db;
            (businesses, reviews)
        }
        StoreBackend::Memory => {
            log::warn!("Using in-memory store; data is lost on restart");
            let memory = Arc::new(InMemoryStore::new());
            let businesses: Arc<dyn BusinessStore> = memory.clone();
            let reviews: Arc<dyn ReviewStore> = memory;
            (businesses, reviews)
        }
    };

    let credentials_json = config
        .credentials
        .resolve()
        .await
        .map_err(|err| startup_error("Failed to load Google credentials", err))?;
    let auth = ServiceAccountAuth::from_json(&credentials_json)
        .map_err(|err| startup_error("Invalid Google credentials", err))?;
    log::info!("Using Google service account {}", auth.client_email());
    let google = Arc::new(GoogleApiClient::new(&config.google_api_base_url, auth));

    let service = web::Data::new(ConnectorService::new(businesses, reviews, google));

    match config.sync_interval {
        Some(every) => {
            log::info!("Scheduled review sync every {}s", every.as_secs());
            actix_rt::spawn(workflows::run_periodic_sync(service.clone().into_inner(), every));
        }
        None => log::info!("Scheduled review sync disabled"),
    }

    let bind_address = config.bind_address();
    log::info!("🚀 Starting Google Review Connector on {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(service.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(web::scope("/api/v1").configure(handlers::configure))
    })
    .bind(&bind_address)?
    .run()
    .await
}
