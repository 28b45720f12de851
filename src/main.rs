mod api;
mod config;
mod database;
mod middleware;
mod models;
mod seeds;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::{AppConfig, StoreBackend};
use database::{MemoryStore, MongoStore, RecordStore};

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:8081",
    "http://localhost:19006",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8081",
    "http://127.0.0.1:19006",
];

fn startup_error(message: impl Into<String>) -> std::io::Error {
    let message = message.into();
    log::error!("❌ {}", message);
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(startup_error)?;

    log::info!("🚀 Starting Course Market...");

    let store: Arc<dyn RecordStore> = match &config.store {
        StoreBackend::Mongo { uri } => {
            let mongo = MongoStore::new(uri)
                .await
                .map_err(|e| startup_error(format!("Failed to connect to MongoDB: {}", e)))?;
            log::info!("✅ MongoDB connected successfully");
            Arc::new(mongo)
        }
        StoreBackend::Memory => {
            log::warn!("⚠️  Using the in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(seed) = &config.super_admin {
        seeds::super_admin_seed::seed_super_admin(store.as_ref(), &config.auth, seed)
            .await
            .map_err(|e| startup_error(format!("Super admin seed failed: {}", e)))?;
    } else {
        log::info!("👑 No SUPER_ADMIN_EMAIL/SUPER_ADMIN_PASSWORD set, skipping super admin seed");
    }

    let store_data: web::Data<dyn RecordStore> = web::Data::from(store);
    let auth_data = web::Data::new(config.auth.clone());
    let cors_origins = config.cors_origins.clone();

    let (host, port) = (config.host.clone(), config.port);
    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);

    HttpServer::new(move || {
        let mut cors = Cors::default();
        if cors_origins.is_empty() {
            for origin in DEFAULT_CORS_ORIGINS {
                cors = cors.allowed_origin(origin);
            }
        } else {
            for origin in &cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }
        let cors = cors
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers(vec![header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(store_data.clone())
            .app_data(auth_data.clone())
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .configure(api::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
