use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Handler failures. Every variant is logged when rendered.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Import failures carry their message back to the client.
    #[error("{0}")]
    Import(String),
    /// Query and update failures show the client a fixed message only.
    #[error("{message}: {detail}")]
    Internal { message: &'static str, detail: String },
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
}

impl ApiError {
    pub fn internal(message: &'static str, detail: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            message,
            detail: detail.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Import(message) => {
                tracing::error!(error = %message, "Error importing bank statement");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": message })),
                )
                    .into_response()
            }
            ApiError::Internal { message, detail } => {
                tracing::error!(error = %detail, "{}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
            ApiError::TransactionNotFound(id) => {
                tracing::warn!(transaction_id = %id, "Transaction not found");
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "success": false, "error": format!("transaction not found: {id}") })),
                )
                    .into_response()
            }
        }
    }
}
