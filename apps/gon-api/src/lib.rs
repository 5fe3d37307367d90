//! # Gon Back Office API
//!
//! HTTP front for the sale, return, payment and stock workflows.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          gon-api                                        │
//! │                                                                         │
//! │  HTTP ──► TraceLayer ──► routes ──► Caller (JWT) ──► services ──► gon-db │
//! │                             │                                           │
//! │                             └── ServiceError ──► { code, message }      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use gon_core::{Clock, SystemClock};
use gon_db::Database;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::auth::JwtManager;
use crate::config::ApiConfig;
use crate::services::{PaymentService, ReturnService, SaleService, StockService, TxPolicy};

/// Shared application state. Cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ApiConfig>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, config: ApiConfig, clock: Arc<dyn Clock>) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_lifetime_secs);
        AppState {
            db,
            clock,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
        }
    }

    pub fn policy(&self) -> TxPolicy {
        TxPolicy {
            timeout: self.config.request_timeout(),
            conflict_retries: self.config.conflict_retries,
        }
    }

    pub fn sales(&self) -> SaleService {
        SaleService::new(self.db.clone(), self.clock.clone(), self.policy())
    }

    pub fn returns(&self) -> ReturnService {
        ReturnService::new(self.db.clone(), self.clock.clone(), self.policy())
    }

    pub fn payments(&self) -> PaymentService {
        PaymentService::new(self.db.clone(), self.clock.clone(), self.policy())
    }

    pub fn stock(&self) -> StockService {
        StockService::new(self.db.clone(), self.clock.clone(), self.policy())
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gon=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Full router with middleware.
pub fn build_app(state: AppState) -> Router {
    routes::router()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
