//! Wellness journal API: journal entries, journaling streaks and range
//! statistics.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod services;

use config::Config;
use db::JournalStore;
use services::AggregationOrchestrator;

/// Source of the current calendar day for request handling.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: AggregationOrchestrator,
    pub config: Arc<Config>,
    clock: Clock,
}

impl AppState {
    pub fn new(store: Arc<dyn JournalStore>, config: Arc<Config>) -> Self {
        Self {
            orchestrator: AggregationOrchestrator::new(store),
            config,
            clock: Arc::new(|| Utc::now().date_naive()),
        }
    }

    /// Replaces the UTC wall clock, e.g. to pin "today" in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz));

    let protected_routes = Router::new()
        // Entries
        .route("/api/entries", post(handlers::entries::create_entry))
        .route("/api/entries", get(handlers::entries::list_entries))
        .route("/api/entries/:id", delete(handlers::entries::delete_entry))
        // Streak
        .route("/api/streak", get(handlers::streak::get_streak))
        .route("/api/streak/rebuild", post(handlers::streak::rebuild_streak))
        // Stats
        .route("/api/stats", get(handlers::stats::get_stats))
        .route("/api/stats/daily", get(handlers::stats::get_daily_trend))
        .layer(middleware::from_fn(auth::middleware::require_user));

    let allowed_origins: Vec<HeaderValue> = std::iter::once(&state.config.frontend_url)
        .chain(&state.config.cors_extra_origins)
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            auth::middleware::USER_ID_HEADER.clone(),
        ])
        .allow_credentials(true);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
