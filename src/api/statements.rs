use axum::{extract::State, Json};
use serde::Serialize;
use stmtdb_core::StatementSummary;

use super::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct StatementsResponse {
    pub statements: Vec<StatementSummary>,
}

/// `GET /api/statements`
pub async fn list_statements(State(state): State<AppState>) -> Result<Json<StatementsResponse>, ApiError> {
    let statements = state
        .storage
        .list_statements()
        .map_err(|e| ApiError::internal("Failed to fetch statements", e))?;
    Ok(Json(StatementsResponse { statements }))
}
