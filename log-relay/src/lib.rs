//! Log Relay
//!
//! Fans out a remote, append-only message log that can only be fetched over
//! HTTP to any number of WebSocket subscribers.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture with clear separation of concerns:
//!
//! - **Domain**: Keys, connections, poller state and the deduplication cursor
//! - **Application**: The relay engine (registry + polling orchestrator), port
//!   interfaces and the subscribe admission pipeline
//! - **Infrastructure**: HTTP log source with retry/backoff, fixed-window rate
//!   limiter, clocks, configuration
//! - **Presentation**: WebSocket protocol and operational REST endpoints
//!
//! # Behavior
//!
//! - A key is polled only while at least one connection is subscribed to it
//! - Each remote entry is delivered at most once per subscriber
//! - Transient fetch failures are retried with exponential backoff; repeated
//!   failed ticks stop the poller and notify its subscribers
//! - Subscription keys are validated as sent and rate limited per origin;
//!   other free-form request fields are sanitized
//!
//! # Example
//!
//! ```ignore
//! use log_relay::{Relay, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), log_relay::Error> {
//!     let relay = Relay::new(RelayConfig::default())?;
//!     relay.run().await
//! }
//! ```

pub mod application;
pub mod domain;
mod error;
pub mod infrastructure;
pub mod presentation;

pub use error::Error;

// Re-export commonly used types
pub use domain::{
    Clock, ClientConfig, ConnectionEvent, ConnectionId, RemoteLog, RemoteLogEntry,
    SubscriptionKey, Timestamp, ValidationError,
};

pub use application::{
    EngineSnapshot, FetchError, FetchResult, LogFetcher, LogSource, PollerSnapshot,
    PollingSettings, RateLimitConfig, RelayEngine, RelayError, RelayHandle,
};

pub use infrastructure::{
    ConfigError, FixedWindowRateLimiter, HttpLogSource, ManualClock, RelayConfig, RetryPolicy,
    RetryingFetcher, SystemClock,
};

pub use presentation::rest::{AppState, create_router};
pub use presentation::websocket::{WsState, create_ws_router};

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// The relay server: engine, admission limiter and HTTP surface
pub struct Relay<C: Clock + 'static> {
    pub config: RelayConfig,
    pub clock: Arc<C>,
    pub rate_limiter: Arc<FixedWindowRateLimiter>,
    handle: RelayHandle,
    engine_task: JoinHandle<()>,
}

impl<C: Clock + 'static> Relay<C> {
    /// Assemble a relay around any fetcher and clock. Spawns the engine, so
    /// it must be called inside a tokio runtime.
    pub fn with_parts(config: RelayConfig, clock: Arc<C>, fetcher: Arc<dyn LogFetcher>) -> Self {
        let rate_limiter = Arc::new(FixedWindowRateLimiter::new(config.rate_limit_config()));
        let engine_clock: Arc<dyn Clock> = clock.clone();
        let (handle, engine_task) =
            RelayEngine::spawn(fetcher, engine_clock, config.polling_settings());

        Relay {
            config,
            clock,
            rate_limiter,
            handle,
            engine_task,
        }
    }

    pub fn handle(&self) -> &RelayHandle {
        &self.handle
    }

    /// REST and WebSocket routes with tracing and CORS
    pub fn router(&self) -> Router {
        let rest_state = Arc::new(AppState::new(Arc::clone(&self.clock), self.handle.clone()));
        let ws_state = Arc::new(WsState::new(
            Arc::clone(&self.clock),
            self.handle.clone(),
            Arc::clone(&self.rate_limiter),
        ));

        create_router(rest_state)
            .merge(create_ws_router(ws_state))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Serve on `listener` until `shutdown` resolves, then stop every poller
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), Error> {
        let router = self.router();

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        self.handle.shutdown().await;
        if let Err(e) = self.engine_task.await {
            tracing::error!(error = %e, "Relay engine task failed");
        }
        tracing::info!("Relay stopped");
        Ok(())
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn run(self) -> Result<(), Error> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Log relay listening on {}", listener.local_addr()?);

        self.serve(listener, shutdown_signal()).await
    }
}

impl Relay<SystemClock> {
    /// Create a relay fetching over HTTP per `config.remote`
    pub fn new(config: RelayConfig) -> Result<Self, Error> {
        config.validate()?;
        let source = HttpLogSource::new(&config.remote)?;
        let fetcher = Arc::new(RetryingFetcher::new(source, config.retry_policy()));
        Ok(Self::with_parts(config, Arc::new(SystemClock), fetcher))
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
