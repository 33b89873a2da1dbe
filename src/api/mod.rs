//! HTTP surface: routing, shared state and handlers.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use stmtdb_core::{MarkingRule, StorageBackend};

use crate::{auth::auth_middleware, config::AuthConfig};

pub mod error;
pub mod import;
pub mod statements;
pub mod transactions;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub marking: Arc<MarkingRule>,
}

impl AppState {
    pub fn new(storage: Arc<dyn StorageBackend>, marking: MarkingRule) -> Self {
        Self {
            storage,
            marking: Arc::new(marking),
        }
    }
}

pub fn router(state: AppState, auth: AuthConfig) -> Router {
    let api = Router::new()
        .route("/api/import", post(import::import_statement))
        .route("/api/statements", get(statements::list_statements))
        .route(
            "/api/transactions",
            get(transactions::list_transactions).patch(transactions::set_marked),
        )
        .route_layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(Extension(Arc::new(auth)))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
