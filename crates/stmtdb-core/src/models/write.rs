use rust_decimal::Decimal;

/// A fully normalized import, ready to be written in one storage transaction.
///
/// Identities, timestamps and marked flags are decided before the batch
/// reaches storage; backends only resolve accounts by account number.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportBatch {
    pub import_date: String,
    pub accounts: Vec<NewAccount>,
    pub statement: NewStatement,
    pub transactions: Vec<NewTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// Used only when no account with the same account number exists.
    pub id: String,
    pub chosen_name: String,
    pub account_holder: String,
    pub account_form: String,
    pub account_name: String,
    pub account_number: String,
    pub system: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStatement {
    pub id: String,
    /// Account number the statement declares; resolved to an account id on write.
    pub account_number: String,
    pub date_from: String,
    pub date_to: String,
    pub customer_name: String,
    pub book_balance: Decimal,
    pub clearing_number: String,
    pub amount_of_transactions: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub id: String,
    pub transaction_text: String,
    pub transaction_date: String,
    pub ledger_date: String,
    pub transaction_amount: Decimal,
    pub system_name: String,
    pub serial_number: String,
    pub bankgiro_plusgiro_number: String,
    pub event_time: String,
    pub is_marked: bool,
}
