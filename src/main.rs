use actix_cors::Cors;
use actix_web::{middleware, App, HttpServer};
use kindred::config::{Settings, StorageBackend};
use kindred::routes::{configure_app, AppState};
use kindred::services::{
    spawn_sweeper, Clock, InteractionStore, MatchEngine, MemoryStore, PostgresStore, ProfileStore, SystemClock,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(settings: &Settings) {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_tracing(&settings);
    info!("Starting Kindred matching service...");

    let (profiles, interactions): (Arc<dyn ProfileStore>, Arc<dyn InteractionStore>) =
        match settings.storage.backend {
            StorageBackend::Postgres => {
                let store = PostgresStore::connect(&settings.database).await.map_err(|e| {
                    error!(error = %e, "failed to connect to PostgreSQL");
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
                })?;
                let store = Arc::new(store);
                (store.clone() as Arc<dyn ProfileStore>, store as Arc<dyn InteractionStore>)
            }
            StorageBackend::Memory => {
                warn!("using in-memory storage; state is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn ProfileStore>, store as Arc<dyn InteractionStore>)
            }
        };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(MatchEngine::from_settings(&settings, profiles, interactions, clock));

    info!(
        discovery_ttl_secs = settings.cache.discovery_ttl_secs,
        max_entries = settings.cache.max_entries,
        "matching engine initialized"
    );

    let sweeper = spawn_sweeper(
        engine.clone(),
        Duration::from_secs(settings.cache.sweep_interval_secs.max(1)),
    );

    let app_state = AppState::new(engine);
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let result = HttpServer::new(move || {
        App::new()
            .configure(configure_app(app_state.clone()))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    sweeper.abort();
    result
}
