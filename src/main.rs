//! GameOn Back binary entrypoint wiring REST, SSE and the storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "couch-store")]
use gameon_back::dao::document_store::couchdb::{CouchConfig, CouchDocumentStore};
#[cfg(feature = "mongo-store")]
use gameon_back::dao::document_store::mongodb::{MongoConfig, MongoDocumentStore};
use gameon_back::{
    config::AppConfig,
    dao::{
        document_store::{DocumentStore, MemoryDocumentStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

const STORAGE_BACKEND_ENV: &str = "STORE_BACKEND";

/// Storage backend selected through [`STORAGE_BACKEND_ENV`].
#[derive(Debug, Clone, Copy)]
enum StorageBackend {
    Memory,
    #[cfg(feature = "couch-store")]
    Couch,
    #[cfg(feature = "mongo-store")]
    Mongo,
}

impl StorageBackend {
    fn from_env() -> anyhow::Result<Self> {
        let value = env::var(STORAGE_BACKEND_ENV).unwrap_or_else(|_| "memory".into());
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(Self::Couch),
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => Ok(Self::Mongo),
            other => bail!("unsupported storage backend `{other}`"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let backend = StorageBackend::from_env()?;
    let app_state = AppState::new(AppConfig::load());

    storage_supervisor::forward_status_changes(&app_state);
    spawn_storage_supervisor(app_state.clone(), backend);
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, ?backend, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.close_live_subscriptions().await;
    app_state.engine().close().await;
    Ok(())
}

/// Run the storage supervisor for `backend` in the background.
fn spawn_storage_supervisor(state: SharedState, backend: StorageBackend) {
    match backend {
        StorageBackend::Memory => {
            warn!("using the in-memory store; data is lost on restart");
            let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(store) }
            }));
        }
        #[cfg(feature = "couch-store")]
        StorageBackend::Couch => {
            tokio::spawn(storage_supervisor::run(state, connect_couch));
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            tokio::spawn(storage_supervisor::run(state, connect_mongo));
        }
    }
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> Result<Arc<dyn DocumentStore>, StorageError> {
    let config = CouchConfig::from_env()?;
    let store = CouchDocumentStore::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> Result<Arc<dyn DocumentStore>, StorageError> {
    let config = MongoConfig::from_env().await?;
    let store = MongoDocumentStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
