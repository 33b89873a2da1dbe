//! Normalization of statement import payloads.
//!
//! Parsed bank exports are loosely typed: any field may be missing, null, a
//! string or a number. Everything is folded into an `ImportBatch` here so the
//! storage layer only ever sees clean values.

use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde::{Deserialize, Deserializer};
use stmtdb_core::{
    ImportBatch, ImportOutcome, MarkingRule, NewAccount, NewStatement, NewTransaction,
    StorageBackend, StorageError,
};
use thiserror::Error;
use time::{macros::format_description, OffsetDateTime, UtcOffset};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to format import timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportPayload {
    pub accounts: Option<Vec<AccountPayload>>,
    pub account_information: Option<AccountInformationPayload>,
    #[serde(deserialize_with = "lenient_text")]
    pub date_from: String,
    #[serde(deserialize_with = "lenient_text")]
    pub date_to: String,
    #[serde(deserialize_with = "lenient_text")]
    pub customer_name: String,
    pub inla_account_transactions: Option<Vec<TransactionPayload>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountPayload {
    #[serde(deserialize_with = "lenient_text")]
    pub chosen_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub account_holder: String,
    #[serde(deserialize_with = "lenient_text")]
    pub account_form: String,
    #[serde(deserialize_with = "lenient_text")]
    pub account_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub account_number: String,
    #[serde(deserialize_with = "lenient_text")]
    pub system: String,
    #[serde(deserialize_with = "lenient_text")]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountInformationPayload {
    #[serde(deserialize_with = "lenient_text")]
    pub account_number: String,
    #[serde(deserialize_with = "lenient_text")]
    pub book_balance: String,
    #[serde(deserialize_with = "lenient_text")]
    pub clearing_number: String,
    #[serde(deserialize_with = "lenient_text")]
    pub amount_of_transactions: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionPayload {
    #[serde(deserialize_with = "lenient_text")]
    pub transaction_text: String,
    #[serde(deserialize_with = "lenient_text")]
    pub transaction_date: String,
    #[serde(deserialize_with = "lenient_text")]
    pub ledger_date: String,
    #[serde(deserialize_with = "lenient_text")]
    pub transaction_amount: String,
    #[serde(deserialize_with = "lenient_text")]
    pub system_name: String,
    #[serde(deserialize_with = "lenient_text")]
    pub serial_number: String,
    #[serde(deserialize_with = "lenient_text")]
    pub bankgiro_plusgiro_number: String,
    #[serde(deserialize_with = "lenient_text")]
    pub event_time: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

/// Accepts a string, number, boolean or null and yields its text form.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(s)) => s,
        Some(Scalar::Number(n)) => n.to_string(),
        Some(Scalar::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}

/// Byte lengths of the leading `[+-]digits[.digits]` mantissa of `s` and of
/// the whole number including an optional `[eE][+-]digits` exponent.
/// `(0, 0)` when `s` does not start with a number.
fn numeric_prefix(s: &str, allow_fraction: bool) -> (usize, usize) {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if allow_fraction && bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        } else if digits > 0 {
            end = frac_start;
        }
    }
    if digits == 0 {
        return (0, 0);
    }

    let mantissa = end;
    if allow_fraction && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    (mantissa, end)
}

/// Parses the leading decimal number of `raw`, exponent form included;
/// anything unparseable or out of range is zero.
pub fn parse_amount(raw: &str) -> Decimal {
    let s = raw.trim();
    let (mantissa, len) = numeric_prefix(s, true);
    if len == 0 {
        return Decimal::ZERO;
    }
    let number = s[..mantissa].trim_end_matches('.');
    let exponent = &s[mantissa..len];
    let (negative, digits) = match number.as_bytes().first() {
        Some(b'-') => (true, &number[1..]),
        Some(b'+') => (false, &number[1..]),
        _ => (false, number),
    };
    // rust_decimal wants a leading digit: ".5" -> "0.5"
    let normalized = if digits.starts_with('.') {
        format!("0{digits}{exponent}")
    } else {
        format!("{digits}{exponent}")
    };

    let value = if exponent.is_empty() {
        normalized.parse::<Decimal>().ok()
    } else {
        Decimal::from_scientific(&normalized).ok().or_else(|| {
            normalized
                .parse::<f64>()
                .ok()
                .and_then(Decimal::from_f64)
        })
    };
    match value {
        Some(value) if negative => -value,
        Some(value) => value,
        None => Decimal::ZERO,
    }
}

/// Parses the leading integer of `raw`; anything unparseable is zero.
pub fn parse_count(raw: &str) -> i64 {
    let s = raw.trim();
    let (len, _) = numeric_prefix(s, false);
    if len == 0 {
        return 0;
    }
    s[..len].trim_start_matches('+').parse().unwrap_or(0)
}

/// UTC timestamp with millisecond precision, e.g. `2024-03-01T10:15:30.123Z`.
pub fn format_import_date(now: OffsetDateTime) -> Result<String, time::error::Format> {
    now.to_offset(UtcOffset::UTC).format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Folds a payload into a batch, deciding identities and marked flags.
pub fn prepare_import(payload: ImportPayload, rule: &MarkingRule, import_date: String) -> ImportBatch {
    let accounts = payload
        .accounts
        .unwrap_or_default()
        .into_iter()
        .map(|a| NewAccount {
            id: new_id(),
            chosen_name: a.chosen_name,
            account_holder: a.account_holder,
            account_form: a.account_form,
            account_name: a.account_name,
            account_number: a.account_number,
            system: a.system,
            status: a.status,
        })
        .collect();

    let info = payload.account_information.unwrap_or_default();
    let statement = NewStatement {
        id: new_id(),
        account_number: info.account_number,
        date_from: payload.date_from,
        date_to: payload.date_to,
        customer_name: payload.customer_name,
        book_balance: parse_amount(&info.book_balance),
        clearing_number: info.clearing_number,
        amount_of_transactions: parse_count(&info.amount_of_transactions),
    };

    let transactions = payload
        .inla_account_transactions
        .unwrap_or_default()
        .into_iter()
        .map(|t| {
            let amount = parse_amount(&t.transaction_amount);
            NewTransaction {
                id: new_id(),
                is_marked: rule.is_marked(&t.transaction_text, amount),
                transaction_text: t.transaction_text,
                transaction_date: t.transaction_date,
                ledger_date: t.ledger_date,
                transaction_amount: amount,
                system_name: t.system_name,
                serial_number: t.serial_number,
                bankgiro_plusgiro_number: t.bankgiro_plusgiro_number,
                event_time: t.event_time,
            }
        })
        .collect();

    ImportBatch {
        import_date,
        accounts,
        statement,
        transactions,
    }
}

/// Normalizes `payload` and writes it through `storage` in one transaction.
/// `caller` names who asked for the import and is only used for logging.
pub fn run_import(
    storage: &dyn StorageBackend,
    rule: &MarkingRule,
    payload: ImportPayload,
    now: OffsetDateTime,
    caller: &str,
) -> Result<ImportOutcome, ImportError> {
    let import_date = format_import_date(now)?;
    let batch = prepare_import(payload, rule, import_date);
    let marked = batch.transactions.iter().filter(|t| t.is_marked).count();

    let outcome = storage.import_statement(&batch)?;
    tracing::info!(
        statement_id = %outcome.statement_id,
        transactions = outcome.transactions_imported,
        accounts_created = outcome.accounts_created,
        marked,
        caller,
        "Bank statement imported"
    );
    Ok(outcome)
}
