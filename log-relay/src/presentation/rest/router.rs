use axum::{Router, routing::get};
use std::sync::Arc;

use super::handlers;
use crate::application::RelayHandle;
use crate::domain::Clock;

/// Application state shared across handlers
pub struct AppState<C: Clock> {
    pub clock: Arc<C>,
    pub relay: RelayHandle,
}

impl<C: Clock> AppState<C> {
    pub fn new(clock: Arc<C>, relay: RelayHandle) -> Self {
        AppState { clock, relay }
    }
}

/// Create the operational REST router
pub fn create_router<C: Clock + 'static>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::<C>))
        .route("/status", get(handlers::status::<C>))
        .with_state(state)
}
