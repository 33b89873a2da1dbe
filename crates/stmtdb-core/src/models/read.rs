use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub chosen_name: Option<String>,
    pub account_holder: Option<String>,
    pub account_form: Option<String>,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub system: Option<String>,
    pub status: Option<String>,
    pub import_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatement {
    pub id: String,
    pub account_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub customer_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub book_balance: Option<Decimal>,
    pub clearing_number: Option<String>,
    pub amount_of_transactions: Option<i64>,
    pub import_date: Option<String>,
}

/// A statement header joined with the identity of its account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementSummary {
    pub id: String,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub customer_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub book_balance: Option<Decimal>,
    pub import_date: Option<String>,
    pub account_holder: Option<String>,
    pub account_number: Option<String>,
    pub clearing_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub account_statement_id: Option<String>,
    pub transaction_text: Option<String>,
    pub transaction_date: Option<String>,
    pub ledger_date: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub transaction_amount: Option<Decimal>,
    pub system_name: Option<String>,
    pub serial_number: Option<String>,
    pub bankgiro_plusgiro_number: Option<String>,
    pub event_time: Option<String>,
    pub is_marked: bool,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub import_date: Option<String>,
}

/// A statement together with the account it belongs to, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub account: Option<Account>,
    pub statement: AccountStatement,
}
