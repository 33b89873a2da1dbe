use crate::models::{
    read::{Account, AccountInfo, AccountStatement, StatementSummary, Transaction},
    write::ImportBatch,
    ImportOutcome, Page,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("migration {version} failed: {message}")]
    Migration { version: u32, message: String },
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("{0}")]
    Other(String),
}

pub trait StorageBackend: Send + Sync {
    /// Writes the whole batch atomically: either every row lands or none does.
    fn import_statement(&self, batch: &ImportBatch) -> Result<ImportOutcome, StorageError>;

    /// All statements, most recently imported first.
    fn list_statements(&self) -> Result<Vec<StatementSummary>, StorageError>;
    fn get_statement(&self, statement_id: &str) -> Result<Option<AccountStatement>, StorageError>;
    fn latest_statement(&self) -> Result<Option<AccountStatement>, StorageError>;
    fn get_account(&self, account_id: &str) -> Result<Option<Account>, StorageError>;

    /// One page of a statement's transactions, newest transaction date first.
    fn list_transactions(&self, statement_id: &str, page: Page) -> Result<Vec<Transaction>, StorageError>;

    /// Fails with `TransactionNotFound` when no row has the given id.
    fn set_transaction_marked(&self, transaction_id: &str, is_marked: bool) -> Result<(), StorageError>;

    /// Resolves the requested statement, or the latest one when `statement_id`
    /// is `None`, together with its account.
    fn account_info(&self, statement_id: Option<&str>) -> Result<Option<AccountInfo>, StorageError> {
        let statement = match statement_id {
            Some(id) => self.get_statement(id)?,
            None => self.latest_statement()?,
        };
        let Some(statement) = statement else {
            return Ok(None);
        };
        let account = match statement.account_id.as_deref() {
            Some(account_id) => self.get_account(account_id)?,
            None => None,
        };
        Ok(Some(AccountInfo { account, statement }))
    }
}
