use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use stmtdb_core::{AccountInfo, Page, StorageError, Transaction};

use super::{ApiError, AppState};
use crate::auth::CallerIdentity;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub statement_id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl TransactionsQuery {
    fn statement_id(&self) -> Option<&str> {
        self.statement_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Unparseable values fall back to the defaults.
    fn page(&self) -> Page {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<u32>().ok());
        Page::new(parse(&self.page), parse(&self.limit))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub account_info: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMarkedRequest {
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default, deserialize_with = "truthy")]
    pub is_marked: bool,
}

/// Clients send `isMarked` as `true`, `1`, `"yes"` and so on. Zero, the empty
/// string, `false` and `null` are false; any other value is true.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

#[derive(Debug, Serialize)]
pub struct SetMarkedResponse {
    pub success: bool,
}

/// Account fields overlaid with statement fields; the statement wins on
/// shared keys such as `id` and `importDate`.
pub fn merge_account_info(info: &AccountInfo) -> Result<Value, serde_json::Error> {
    let mut merged = match &info.account {
        Some(account) => match serde_json::to_value(account)? {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        None => Map::new(),
    };
    if let Value::Object(statement) = serde_json::to_value(&info.statement)? {
        merged.extend(statement);
    }
    Ok(Value::Object(merged))
}

/// `GET /api/transactions?statementId=&page=&limit=`
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    const FAILED: &str = "Failed to fetch transactions";

    let Some(info) = state
        .storage
        .account_info(query.statement_id())
        .map_err(|e| ApiError::internal(FAILED, e))?
    else {
        return Ok(Json(TransactionsResponse {
            transactions: Vec::new(),
            account_info: None,
        }));
    };

    let transactions = state
        .storage
        .list_transactions(&info.statement.id, query.page())
        .map_err(|e| ApiError::internal(FAILED, e))?;
    let account_info = merge_account_info(&info).map_err(|e| ApiError::internal(FAILED, e))?;

    Ok(Json(TransactionsResponse {
        transactions,
        account_info: Some(account_info),
    }))
}

/// `PATCH /api/transactions`
pub async fn set_marked(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    body: Result<Json<SetMarkedRequest>, JsonRejection>,
) -> Result<Json<SetMarkedResponse>, ApiError> {
    const FAILED: &str = "Failed to update transaction";

    let Json(request) = body.map_err(|e| ApiError::internal(FAILED, e.body_text()))?;

    match state
        .storage
        .set_transaction_marked(&request.transaction_id, request.is_marked)
    {
        Ok(()) => {
            tracing::info!(
                transaction_id = %request.transaction_id,
                is_marked = request.is_marked,
                caller = %caller.name,
                "Transaction marking updated"
            );
            Ok(Json(SetMarkedResponse { success: true }))
        }
        Err(StorageError::TransactionNotFound(id)) => Err(ApiError::TransactionNotFound(id)),
        Err(e) => Err(ApiError::internal(FAILED, e)),
    }
}
