//! TiltPaint Relay Server
//!
//! Relays paint strokes between every connected client and keeps the
//! history, so a client that joins late sees the whole drawing.
//!
//! ## Protocol
//!
//! JSON text frames on `/ws`, tagged by `t`:
//! ```json
//! { "t": "init", "strokes": [ ... ] }
//! { "t": "stroke", "s": { "x1": 0, "y1": 0, "x2": 10, "y2": 10, "w": 8, "c": [0, 0, 0, 255] } }
//! { "t": "clear" }
//! { "t": "players", "n": 2 }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod hub;
pub mod persist;
pub mod registry;
pub mod session;

pub use config::ServerConfig;
pub use error::ServerError;
pub use hub::{EchoPolicy, Hub};

use app::AppState;
use axum::Router;
use persist::Persister;
use std::sync::Arc;
use tiltpaint_core::{FileStore, StrokeLog, StrokeStore};
use tracing::info;

/// A relay ready to serve: history replayed, writer running.
pub struct Relay {
    hub: Arc<Hub>,
    config: ServerConfig,
}

impl Relay {
    /// Open the configured history store and replay it.
    pub async fn start(config: ServerConfig) -> Result<Self, ServerError> {
        let store: Option<Arc<dyn StrokeStore>> = if config.no_persist {
            None
        } else {
            Some(Arc::new(FileStore::new(&config.history)?))
        };
        if store.is_some() {
            info!("Stroke history at {}", config.history.display());
        }
        Self::with_store(config, store).await
    }

    /// Start with an explicit store, or none for memory-only history.
    pub async fn with_store(
        config: ServerConfig,
        store: Option<Arc<dyn StrokeStore>>,
    ) -> Result<Self, ServerError> {
        let (log, persister) = match store {
            Some(store) => {
                let strokes = store.load().await?;
                info!("Replayed {} strokes", strokes.len());
                let (persister, _writer) = Persister::spawn(store);
                (StrokeLog::with_strokes(strokes), Some(persister))
            }
            None => (StrokeLog::new(), None),
        };

        let echo = if config.echo {
            EchoPolicy::Deliver
        } else {
            EchoPolicy::Suppress
        };
        let hub = Arc::new(Hub::new(log, persister, echo, config.queue_capacity));
        Ok(Self { hub, config })
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// HTTP routes for this relay.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            hub: Arc::clone(&self.hub),
            idle_timeout: self.config.idle_timeout(),
        });
        app::router(state, Some(&self.config.static_dir))
    }

    /// Serve on an already bound listener until `shutdown` resolves, then
    /// flush pending history writes.
    pub async fn serve<F>(self, listener: tokio::net::TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        self.hub.flush_persistence().await;
        Ok(())
    }
}
