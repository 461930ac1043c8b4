use actix_web::{middleware, web, App, HttpServer};
use balance_engine::{
    config::Config, database::PostgresLedger, handlers, services::TransactionService,
    store::LedgerStore,
};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Starting balance engine on port {}", config.server.port);

    let ledger = PostgresLedger::connect(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to database");

    ledger.migrate().await.expect("Failed to run migrations");
    info!("Database migrations completed");

    let store: Arc<dyn LedgerStore> = Arc::new(ledger);
    let service = Arc::new(TransactionService::new(store));

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(service.clone()))
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
