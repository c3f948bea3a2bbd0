//! HTTP surface for the case management backend.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use db::DBService;
use services::services::{events::CaseEvents, pending_cases::PendingCaseWatcher};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub events: CaseEvents,
    pub watcher: Arc<PendingCaseWatcher>,
}

/// Assemble the full application router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
