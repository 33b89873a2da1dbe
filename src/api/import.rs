use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Serialize;

use super::{ApiError, AppState};
use crate::{
    auth::CallerIdentity,
    importer::{self, ImportPayload},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub statement_id: String,
    pub transactions_imported: usize,
    pub accounts_created: usize,
}

/// `POST /api/import`
pub async fn import_statement(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    payload: Result<Json<ImportPayload>, JsonRejection>,
) -> Result<Json<ImportResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::Import(e.body_text()))?;

    let outcome = importer::run_import(
        state.storage.as_ref(),
        &state.marking,
        payload,
        time::OffsetDateTime::now_utc(),
        &caller.name,
    )
    .map_err(|e| ApiError::Import(e.to_string()))?;

    Ok(Json(ImportResponse {
        success: true,
        message: "Bank statement imported successfully".to_string(),
        statement_id: outcome.statement_id,
        transactions_imported: outcome.transactions_imported,
        accounts_created: outcome.accounts_created,
    }))
}
