use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;

mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;

use application::AppServices;
use data::{LocalStore, Repositories};
use infrastructure::{
    config::{Config, StorageBackend},
    database::{create_pool, run_migrations},
    jwt::JwtService,
    logging::init_logging,
    password::PasswordHasher,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    init_logging();

    let config = Config::from_env()?;

    tracing::info!("Starting ablog server...");
    tracing::info!("HTTP server will listen on {}", config.http_addr());
    tracing::info!("CORS allowed origins: {:?}", config.cors_allowed_origins);

    let repos = open_store(&config.storage).await?;

    // JWT service
    let jwt_service = Arc::new(JwtService::new(&config.jwt_secret));

    let services = AppServices::new(
        repos,
        jwt_service,
        PasswordHasher::new(config.bcrypt_cost),
    );
    tracing::info!("Services initialized successfully");

    run_http_server(&config, services).await?;

    tracing::info!("Shutting down...");
    Ok(())
}

async fn open_store(storage: &StorageBackend) -> anyhow::Result<Repositories> {
    match storage {
        StorageBackend::Postgres {
            database_url,
            max_connections,
        } => {
            tracing::info!("Connecting to database...");
            let pool = create_pool(database_url, *max_connections)
                .await
                .context("Failed to connect to the database")?;

            tracing::info!("Running database migrations...");
            run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            Ok(Repositories::postgres(pool))
        }
        StorageBackend::Local { path: Some(path) } => {
            tracing::info!("Using local store at {}", path.display());
            let store = LocalStore::open(path)
                .await
                .with_context(|| format!("Failed to open local store {}", path.display()))?;
            Ok(Repositories::local(Arc::new(store)))
        }
        StorageBackend::Local { path: None } => {
            tracing::warn!("Using in-memory local store; data is lost on shutdown");
            Ok(Repositories::local(Arc::new(LocalStore::in_memory())))
        }
    }
}

/// Configure CORS for the HTTP server with the allowed origins from config
fn configure_cors(allowed_origins: &[String]) -> actix_cors::Cors {
    use actix_cors::Cors;
    use actix_web::http::header;

    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
        ])
        .expose_headers(vec![header::AUTHORIZATION])
        .max_age(3600);

    // Добавляем каждый разрешенный домен
    for origin in allowed_origins {
        cors = cors.allowed_origin(origin);
        tracing::debug!("Added allowed CORS origin: {}", origin);
    }

    cors
}

async fn run_http_server(config: &Config, services: AppServices) -> anyhow::Result<()> {
    use actix_web::{middleware::Logger, App, HttpServer};

    let addr = config.http_addr();
    let origins = config.cors_allowed_origins.clone();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(configure_cors(&origins))
            .configure(|cfg| presentation::routes::configure(cfg, &services))
    })
    .bind(&addr)
    .with_context(|| format!("Failed to bind {}", addr))?
    .run();

    tracing::info!("HTTP server running on {}", addr);

    server.await?;

    Ok(())
}
