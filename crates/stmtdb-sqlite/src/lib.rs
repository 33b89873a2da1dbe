//! SQLite storage backend for stmtdb.

pub mod migrations;

use std::{
    str::FromStr,
    sync::{Mutex, MutexGuard},
};

use rust_decimal::Decimal;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row, Transaction as SqlTx};
use stmtdb_core::{
    Account, AccountStatement, ImportBatch, ImportOutcome, NewAccount, Page, StatementSummary,
    StorageBackend, StorageError, Transaction,
};

const ACCOUNT_COLUMNS: &str = "id, chosen_name, account_holder, account_form, account_name, \
     account_number, system, status, import_date";

const STATEMENT_COLUMNS: &str = "id, account_id, date_from, date_to, customer_name, book_balance, \
     clearing_number, amount_of_transactions, import_date";

const TRANSACTION_COLUMNS: &str = "id, account_statement_id, transaction_text, transaction_date, \
     ledger_date, transaction_amount, system_name, serial_number, bankgiro_plusgiro_number, \
     event_time, is_marked, category, notes, import_date";

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and applies pending migrations.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let mut conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(db_err)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(db_err)?;

        let applied = migrations::run_migrations(&mut conn)?;
        tracing::debug!(path, applied, "SQLite storage opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<u32, StorageError> {
        let conn = self.lock()?;
        migrations::current_version(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Other("connection lock poisoned".to_string()))
    }
}

fn db_err(e: rusqlite::Error) -> StorageError {
    StorageError::Database(e.to_string())
}

fn decimal_column(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        Decimal::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        chosen_name: row.get(1)?,
        account_holder: row.get(2)?,
        account_form: row.get(3)?,
        account_name: row.get(4)?,
        account_number: row.get(5)?,
        system: row.get(6)?,
        status: row.get(7)?,
        import_date: row.get(8)?,
    })
}

fn statement_from_row(row: &Row) -> rusqlite::Result<AccountStatement> {
    Ok(AccountStatement {
        id: row.get(0)?,
        account_id: row.get(1)?,
        date_from: row.get(2)?,
        date_to: row.get(3)?,
        customer_name: row.get(4)?,
        book_balance: decimal_column(row, 5)?,
        clearing_number: row.get(6)?,
        amount_of_transactions: row.get(7)?,
        import_date: row.get(8)?,
    })
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        account_statement_id: row.get(1)?,
        transaction_text: row.get(2)?,
        transaction_date: row.get(3)?,
        ledger_date: row.get(4)?,
        transaction_amount: decimal_column(row, 5)?,
        system_name: row.get(6)?,
        serial_number: row.get(7)?,
        bankgiro_plusgiro_number: row.get(8)?,
        event_time: row.get(9)?,
        is_marked: row.get(10)?,
        category: row.get(11)?,
        notes: row.get(12)?,
        import_date: row.get(13)?,
    })
}

/// Inserts the account unless one with the same non-empty account number
/// already exists. Returns whether a row was written.
fn upsert_account(tx: &SqlTx, account: &NewAccount, import_date: &str) -> Result<bool, StorageError> {
    let changed = tx
        .execute(
            "INSERT INTO accounts (id, chosen_name, account_holder, account_form, account_name,
                                   account_number, system, status, import_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (account_number) WHERE account_number <> '' DO NOTHING",
            params![
                account.id,
                account.chosen_name,
                account.account_holder,
                account.account_form,
                account.account_name,
                account.account_number,
                account.system,
                account.status,
                import_date,
            ],
        )
        .map_err(db_err)?;
    Ok(changed > 0)
}

fn find_account_id(tx: &SqlTx, account_number: &str) -> Result<Option<String>, StorageError> {
    if account_number.is_empty() {
        return Ok(None);
    }
    tx.query_row(
        "SELECT id FROM accounts WHERE account_number = ?1 ORDER BY rowid LIMIT 1",
        params![account_number],
        |row| row.get(0),
    )
    .optional()
    .map_err(db_err)
}

fn page_params(page: Page) -> (i64, i64) {
    let limit = i64::try_from(page.limit()).unwrap_or(i64::MAX);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    (limit, offset)
}

impl StorageBackend for SqliteStorage {
    fn import_statement(&self, batch: &ImportBatch) -> Result<ImportOutcome, StorageError> {
        let mut conn = self.lock()?;
        // Dropping the transaction without commit rolls everything back.
        let tx = conn.transaction().map_err(db_err)?;
        tracing::debug!(statement_id = %batch.statement.id, "SQLite transaction started");

        let mut accounts_created = 0;
        for account in &batch.accounts {
            if upsert_account(&tx, account, &batch.import_date)? {
                accounts_created += 1;
            }
        }

        let statement = &batch.statement;
        let account_id = find_account_id(&tx, &statement.account_number)?;
        if account_id.is_none() {
            tracing::debug!(
                account_number = %statement.account_number,
                "No account matches statement, storing it unlinked"
            );
        }

        tx.execute(
            "INSERT INTO account_statements (id, account_id, date_from, date_to, customer_name,
                                             book_balance, clearing_number, amount_of_transactions, import_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                statement.id,
                account_id,
                statement.date_from,
                statement.date_to,
                statement.customer_name,
                statement.book_balance.to_string(),
                statement.clearing_number,
                statement.amount_of_transactions,
                batch.import_date,
            ],
        )
        .map_err(db_err)?;

        {
            let mut insert = tx
                .prepare(
                    "INSERT INTO transactions (id, account_statement_id, transaction_text, transaction_date,
                                               ledger_date, transaction_amount, system_name, serial_number,
                                               bankgiro_plusgiro_number, event_time, is_marked, import_date)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                )
                .map_err(db_err)?;
            for t in &batch.transactions {
                insert
                    .execute(params![
                        t.id,
                        statement.id,
                        t.transaction_text,
                        t.transaction_date,
                        t.ledger_date,
                        t.transaction_amount.to_string(),
                        t.system_name,
                        t.serial_number,
                        t.bankgiro_plusgiro_number,
                        t.event_time,
                        t.is_marked,
                        batch.import_date,
                    ])
                    .map_err(db_err)?;
            }
        }

        tx.commit().map_err(db_err)?;
        tracing::debug!(statement_id = %statement.id, "SQLite transaction committed");

        Ok(ImportOutcome {
            statement_id: statement.id.clone(),
            account_id,
            accounts_created,
            transactions_imported: batch.transactions.len(),
        })
    }

    fn list_statements(&self) -> Result<Vec<StatementSummary>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.date_from, s.date_to, s.customer_name, s.book_balance, s.import_date,
                        a.account_holder, a.account_number, s.clearing_number
                 FROM account_statements s
                 LEFT JOIN accounts a ON a.id = s.account_id
                 ORDER BY s.import_date DESC, s.rowid DESC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StatementSummary {
                    id: row.get(0)?,
                    date_from: row.get(1)?,
                    date_to: row.get(2)?,
                    customer_name: row.get(3)?,
                    book_balance: decimal_column(row, 4)?,
                    import_date: row.get(5)?,
                    account_holder: row.get(6)?,
                    account_number: row.get(7)?,
                    clearing_number: row.get(8)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn get_statement(&self, statement_id: &str) -> Result<Option<AccountStatement>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {STATEMENT_COLUMNS} FROM account_statements WHERE id = ?1"),
            params![statement_id],
            statement_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    fn latest_statement(&self) -> Result<Option<AccountStatement>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {STATEMENT_COLUMNS} FROM account_statements
                 ORDER BY import_date DESC, rowid DESC LIMIT 1"
            ),
            [],
            statement_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    fn get_account(&self, account_id: &str) -> Result<Option<Account>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            params![account_id],
            account_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    fn list_transactions(&self, statement_id: &str, page: Page) -> Result<Vec<Transaction>, StorageError> {
        let conn = self.lock()?;
        let (limit, offset) = page_params(page);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions
                 WHERE account_statement_id = ?1
                 ORDER BY transaction_date DESC, rowid ASC
                 LIMIT ?2 OFFSET ?3"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![statement_id, limit, offset], transaction_from_row)
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn set_transaction_marked(&self, transaction_id: &str, is_marked: bool) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE transactions SET is_marked = ?1 WHERE id = ?2",
                params![is_marked, transaction_id],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(StorageError::TransactionNotFound(transaction_id.to_string()));
        }
        tracing::debug!(transaction_id, is_marked, "Transaction mark updated");
        Ok(())
    }
}
