use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use stmtdb::{
    api::{self, AppState},
    config::{ApiKeyEntry, AuthConfig},
};
use stmtdb_core::{MarkingRule, StorageBackend};
use stmtdb_sqlite::SqliteStorage;
use tower::ServiceExt;

fn setup_with_auth(names: &str, auth: AuthConfig) -> (Router, Arc<SqliteStorage>) {
    let storage = Arc::new(SqliteStorage::open(":memory:").expect("Failed to open storage"));
    let state = AppState::new(storage.clone(), MarkingRule::from_csv(names));
    (api::router(state, auth), storage)
}

fn setup(names: &str) -> (Router, Arc<SqliteStorage>) {
    setup_with_auth(names, AuthConfig::default())
}

async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<String>,
    api_key: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    let request = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_raw(app, method, uri, body.map(|b| b.to_string()), None).await
}

fn txn(date: &str, text: &str, amount: &str) -> Value {
    json!({
        "transactionText": text,
        "transactionDate": date,
        "ledgerDate": date,
        "transactionAmount": amount,
        "systemName": "INLA",
        "serialNumber": "1",
        "bankgiroPlusgiroNumber": "",
        "eventTime": format!("{date}T12:00:00.000000")
    })
}

fn statement_payload(account_number: &str, transactions: Vec<Value>) -> Value {
    json!({
        "accounts": [{
            "chosenName": "Household",
            "accountHolder": "Jane Doe",
            "accountForm": "Privatkonto",
            "accountName": "Checking",
            "accountNumber": account_number,
            "system": "INLA",
            "status": "Active"
        }],
        "accountInformation": {
            "accountNumber": account_number,
            "bookBalance": "1523.75",
            "clearingNumber": "8327-9",
            "amountOfTransactions": transactions.len().to_string()
        },
        "dateFrom": "2024-01-01",
        "dateTo": "2024-01-31",
        "customerName": "Jane Doe",
        "inlaAccountTransactions": transactions
    })
}

async fn import(app: &Router, payload: Value) -> Value {
    let (status, body) = send(app, Method::POST, "/api/import", Some(payload)).await;
    assert_eq!(status, StatusCode::OK, "import failed: {body}");
    body
}

fn ids(body: &Value) -> Vec<String> {
    body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_import_creates_statement_with_all_transactions() {
    let (app, _) = setup("");
    let body = import(
        &app,
        statement_payload(
            "123-456",
            vec![
                txn("2024-01-03", "ICA", "-250.00"),
                txn("2024-01-05", "Salary", "30000"),
                txn("2024-01-09", "Coop", "-80.50"),
            ],
        ),
    )
    .await;

    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Bank statement imported successfully");
    assert_eq!(body["transactionsImported"], 3);
    assert_eq!(body["accountsCreated"], 1);
    let statement_id = body["statementId"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/api/transactions", None).await;
    assert_eq!(status, StatusCode::OK);
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 3);
    assert!(transactions
        .iter()
        .all(|t| t["accountStatementId"] == statement_id.as_str()));

    let info = &body["accountInfo"];
    assert_eq!(info["id"], statement_id.as_str());
    assert_eq!(info["accountHolder"], "Jane Doe");
    assert_eq!(info["accountNumber"], "123-456");
    assert_eq!(info["bookBalance"], 1523.75);
    assert_eq!(info["amountOfTransactions"], 3);
}

#[tokio::test]
async fn test_marking_rule_applies_on_import() {
    let (app, _) = setup("Alice,Bob");
    import(
        &app,
        statement_payload(
            "123-456",
            vec![
                txn("2024-01-05", "Alice", "-100"),
                txn("2024-01-04", "Alice", "100"),
                txn("2024-01-03", "ICA", "-100"),
                txn("2024-01-02", "ICA", "100"),
                txn("2024-01-01", "Bob", "-0.50"),
            ],
        ),
    )
    .await;

    let (_, body) = send(&app, Method::GET, "/api/transactions", None).await;
    let marked: Vec<(String, bool)> = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| {
            (
                t["transactionText"].as_str().unwrap().to_string(),
                t["isMarked"].as_bool().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        marked,
        vec![
            ("Alice".to_string(), true),
            ("Alice".to_string(), false),
            ("ICA".to_string(), false),
            ("ICA".to_string(), false),
            ("Bob".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_reimport_creates_second_statement_but_not_second_account() {
    let (app, storage) = setup("");
    let first = import(&app, statement_payload("123-456", vec![txn("2024-01-03", "First", "-1")])).await;
    let second = import(&app, statement_payload("123-456", vec![txn("2024-01-03", "Second", "-1")])).await;
    assert_eq!(second["accountsCreated"], 0);

    let first_id = first["statementId"].as_str().unwrap();
    let second_id = second["statementId"].as_str().unwrap();
    assert_ne!(first_id, second_id);

    let first_statement = storage.get_statement(first_id).unwrap().unwrap();
    let second_statement = storage.get_statement(second_id).unwrap().unwrap();
    assert!(first_statement.account_id.is_some());
    assert_eq!(first_statement.account_id, second_statement.account_id);

    let (status, body) = send(&app, Method::GET, "/api/statements", None).await;
    assert_eq!(status, StatusCode::OK);
    let statements = body["statements"].as_array().unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0]["id"], second_id);
    assert_eq!(statements[1]["id"], first_id);

    // Without statementId the latest import is returned.
    let (_, body) = send(&app, Method::GET, "/api/transactions", None).await;
    assert_eq!(body["transactions"][0]["transactionText"], "Second");
    assert_eq!(body["accountInfo"]["id"], second_id);

    let uri = format!("/api/transactions?statementId={first_id}");
    let (_, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(body["transactions"][0]["transactionText"], "First");
    assert_eq!(body["accountInfo"]["id"], first_id);
}

#[tokio::test]
async fn test_statements_list_fields() {
    let (app, _) = setup("");
    let mut payload = statement_payload("123-456", vec![]);
    payload["accountInformation"]["accountNumber"] = json!("999-999");
    import(&app, payload).await;

    let (status, body) = send(&app, Method::GET, "/api/statements", None).await;
    assert_eq!(status, StatusCode::OK);
    let statement = &body["statements"][0];
    assert_eq!(statement["dateFrom"], "2024-01-01");
    assert_eq!(statement["dateTo"], "2024-01-31");
    assert_eq!(statement["customerName"], "Jane Doe");
    assert_eq!(statement["clearingNumber"], "8327-9");
    assert_eq!(statement["bookBalance"], 1523.75);
    assert!(statement["importDate"].as_str().unwrap().ends_with('Z'));
    // No account carries the statement's number, so the join yields nulls.
    assert!(statement["accountHolder"].is_null());
    assert!(statement["accountNumber"].is_null());
}

#[tokio::test]
async fn test_transactions_on_empty_database() {
    let (app, _) = setup("");
    let (status, body) = send(&app, Method::GET, "/api/transactions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "transactions": [], "accountInfo": null }));

    let (status, body) = send(&app, Method::GET, "/api/statements", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "statements": [] }));
}

#[tokio::test]
async fn test_unknown_statement_id_returns_empty() {
    let (app, _) = setup("");
    import(&app, statement_payload("123-456", vec![txn("2024-01-03", "ICA", "-1")])).await;

    let (status, body) = send(&app, Method::GET, "/api/transactions?statementId=missing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "transactions": [], "accountInfo": null }));
}

#[tokio::test]
async fn test_transactions_pagination() {
    let (app, _) = setup("");
    let transactions = (1..=25)
        .map(|day| txn(&format!("2024-01-{day:02}"), &format!("Purchase {day}"), "-10"))
        .collect();
    import(&app, statement_payload("123-456", transactions)).await;

    let (status, body) = send(&app, Method::GET, "/api/transactions?page=2&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let dates: Vec<&str> = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["transactionDate"].as_str().unwrap())
        .collect();
    let expected: Vec<String> = (6..=15).rev().map(|d| format!("2024-01-{d:02}")).collect();
    assert_eq!(dates, expected);

    let (_, body) = send(&app, Method::GET, "/api/transactions", None).await;
    assert_eq!(body["transactions"].as_array().unwrap().len(), 25);

    let (_, body) = send(&app, Method::GET, "/api/transactions?page=abc&limit=0", None).await;
    assert_eq!(body["transactions"].as_array().unwrap().len(), 25);
}

#[tokio::test]
async fn test_patch_toggles_only_target_row() {
    let (app, _) = setup("");
    import(
        &app,
        statement_payload(
            "123-456",
            vec![txn("2024-01-03", "ICA", "-250"), txn("2024-01-02", "Coop", "-80")],
        ),
    )
    .await;
    let (_, before) = send(&app, Method::GET, "/api/transactions", None).await;
    let target = ids(&before)[0].clone();

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/transactions",
        Some(json!({ "transactionId": target, "isMarked": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (_, after) = send(&app, Method::GET, "/api/transactions", None).await;
    let mut expected = before["transactions"].clone();
    expected[0]["isMarked"] = json!(true);
    assert_eq!(after["transactions"], expected);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/transactions",
        Some(json!({ "transactionId": target, "isMarked": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, reverted) = send(&app, Method::GET, "/api/transactions", None).await;
    assert_eq!(reverted["transactions"], before["transactions"]);
}

#[tokio::test]
async fn test_patch_accepts_numeric_flag() {
    let (app, _) = setup("");
    import(&app, statement_payload("123-456", vec![txn("2024-01-03", "ICA", "-250")])).await;
    let (_, before) = send(&app, Method::GET, "/api/transactions", None).await;
    let target = ids(&before)[0].clone();

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/transactions",
        Some(json!({ "transactionId": target, "isMarked": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = send(&app, Method::GET, "/api/transactions", None).await;
    assert_eq!(after["transactions"][0]["isMarked"], json!(true));

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/transactions",
        Some(json!({ "transactionId": target, "isMarked": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = send(&app, Method::GET, "/api/transactions", None).await;
    assert_eq!(after["transactions"][0]["isMarked"], json!(false));
}

#[tokio::test]
async fn test_patch_unknown_id_reports_not_found() {
    let (app, _) = setup("");
    import(&app, statement_payload("123-456", vec![txn("2024-01-03", "ICA", "-250")])).await;
    let (_, before) = send(&app, Method::GET, "/api/transactions", None).await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/transactions",
        Some(json!({ "transactionId": "does-not-exist", "isMarked": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "transaction not found: does-not-exist");

    let (_, after) = send(&app, Method::GET, "/api/transactions", None).await;
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_malformed_import_body() {
    let (app, _) = setup("");
    let (status, body) = send_raw(
        &app,
        Method::POST,
        "/api/import",
        Some("{ not json".to_string()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(!body["message"].as_str().unwrap().is_empty());

    let (_, body) = send(&app, Method::GET, "/api/statements", None).await;
    assert_eq!(body, json!({ "statements": [] }));
}

#[tokio::test]
async fn test_minimal_import_uses_defaults() {
    let (app, _) = setup("");
    let body = import(&app, json!({})).await;
    assert_eq!(body["transactionsImported"], 0);
    assert_eq!(body["accountsCreated"], 0);

    let (_, body) = send(&app, Method::GET, "/api/transactions", None).await;
    assert_eq!(body["transactions"], json!([]));
    let info = &body["accountInfo"];
    assert_eq!(info["customerName"], "");
    assert_eq!(info["bookBalance"], 0.0);
    assert_eq!(info["amountOfTransactions"], 0);
    assert!(info["accountId"].is_null());
}

#[tokio::test]
async fn test_health() {
    let (app, _) = setup("");
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_api_keys_and_roles() {
    let auth = AuthConfig {
        enabled: true,
        api_keys: vec![
            ApiKeyEntry {
                name: "dashboard".to_string(),
                key: "read-key".to_string(),
                role: "reader".to_string(),
            },
            ApiKeyEntry {
                name: "importer".to_string(),
                key: "write-key".to_string(),
                role: "writer".to_string(),
            },
        ],
    };
    let (app, _) = setup_with_auth("", auth);
    let payload = statement_payload("123-456", vec![]).to_string();

    let (status, _) = send_raw(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_raw(&app, Method::GET, "/api/statements", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send_raw(&app, Method::GET, "/api/statements", None, Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_raw(&app, Method::GET, "/api/statements", None, Some("read-key")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_raw(
        &app,
        Method::POST,
        "/api/import",
        Some(payload.clone()),
        Some("read-key"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send_raw(&app, Method::POST, "/api/import", Some(payload), Some("write-key")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
