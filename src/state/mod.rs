mod sse;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    config::AppConfig,
    sync::{SharedEngine, Subscription, SyncEngine},
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const PUBLIC_SSE_CAPACITY: usize = 32;

/// Central application state: configuration, the sync engine and the public SSE hub.
pub struct AppState {
    config: Arc<AppConfig>,
    engine: SharedEngine,
    public_sse: SseHub,
    live: Mutex<Vec<Subscription>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The engine starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let engine = SyncEngine::open(config.sync_settings());
        Arc::new(Self {
            config: Arc::new(config),
            engine,
            public_sse: SseHub::new(PUBLIC_SSE_CAPACITY),
            live: Mutex::new(Vec::new()),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// The sync engine holding the tournament state.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        self.engine.is_degraded().await
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.public_sse
    }

    /// Keep `subscriptions` alive, closing any previously held ones.
    pub async fn replace_live_subscriptions(&self, subscriptions: Vec<Subscription>) {
        let previous = {
            let mut guard = self.live.lock().await;
            std::mem::replace(&mut *guard, subscriptions)
        };
        for subscription in previous {
            subscription.close().await;
        }
    }

    /// Close every live subscription.
    pub async fn close_live_subscriptions(&self) {
        self.replace_live_subscriptions(Vec::new()).await;
    }
}
