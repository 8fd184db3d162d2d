use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;

use dateideen_server::config::{DatabaseBackend, Settings};
use dateideen_server::db::{Datastore, MemoryStore, PgStore};
use dateideen_server::routes::create_routes;
use dateideen_server::utils::logging::init_logging;
use dateideen_server::{jobs, AppState};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let settings = Settings::load().expect("Failed to load configuration");
    init_logging(&settings.logging);

    let store: Arc<dyn Datastore> = match settings.database.backend {
        DatabaseBackend::Postgres => {
            let store = PgStore::connect(&settings.database)
                .await
                .expect("Failed to connect to database");
            if settings.database.run_migrations {
                store.migrate().await.expect("Failed to run migrations");
            }
            Arc::new(store)
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .expect("Invalid server.host / server.port");

    let state = AppState::from_settings(settings, store).expect("Failed to build clients");
    let _jobs = jobs::spawn_all(&state);
    let app = create_routes(state);

    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
