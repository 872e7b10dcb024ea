//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, OptionalExtension, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error, account::AccountId, auth::UserId, database_id::DatabaseId, datetime_format,
    db::get_decimal,
};

// ============================================================================
// MODELS
// ============================================================================

/// The ID of a transaction in the database.
pub type TransactionId = DatabaseId;

/// The direction and purpose of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money earned.
    Income,
    /// Money spent. Expenses are always stored as negative amounts.
    Expense,
    /// Money moved between accounts.
    Transfer,
    /// Money returned for an earlier expense.
    Refund,
}

impl TransactionType {
    /// The lowercase name used in requests, responses and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
            TransactionType::Transfer => "transfer",
            TransactionType::Refund => "refund",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            "transfer" => Ok(TransactionType::Transfer),
            "refund" => Ok(TransactionType::Refund),
            other => Err(Error::InvalidTransactionType(other.to_owned())),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// A signed movement of money recorded against one account.
///
/// Transactions are immutable once posted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that posted the transaction.
    pub user_id: UserId,
    /// The account the transaction was posted to.
    pub account_id: AccountId,
    /// The signed amount: negative for expenses, as given otherwise.
    pub amount: Decimal,
    /// What kind of transaction this is.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// A free-text label such as "groceries".
    pub category: String,
    /// An optional note about the transaction.
    pub description: Option<String>,
    /// When the transaction happened.
    #[serde(with = "datetime_format::date")]
    pub date: Date,
    /// The client supplied key used to make posting safe to retry.
    #[serde(skip_serializing)]
    pub idempotency_key: Option<String>,
    /// When the transaction was recorded.
    #[serde(with = "datetime_format::timestamp")]
    pub created_at: OffsetDateTime,
    /// When the transaction was last changed.
    #[serde(with = "datetime_format::timestamp")]
    pub updated_at: OffsetDateTime,
}

/// A validated transaction that is ready to be inserted.
///
/// `amount` is already signed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The account to post to.
    pub account_id: AccountId,
    /// The signed amount.
    pub amount: Decimal,
    /// What kind of transaction this is.
    pub transaction_type: TransactionType,
    /// A non-empty label.
    pub category: String,
    /// An optional, non-empty note.
    pub description: Option<String>,
    /// When the transaction happened.
    pub date: Date,
    /// The client supplied key, if any.
    pub idempotency_key: Option<String>,
}

impl NewTransaction {
    /// Whether `transaction` records the same movement of money as `self`.
    ///
    /// Used to tell a retried request apart from a reused idempotency key.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.account_id == transaction.account_id
            && self.amount == transaction.amount
            && self.transaction_type == transaction.transaction_type
            && self.category == transaction.category
            && self.description == transaction.description
            && self.date == transaction.date
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                amount TEXT NOT NULL,
                type TEXT NOT NULL,
                category TEXT NOT NULL,
                description TEXT,
                date TEXT NOT NULL,
                idempotency_key TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, idempotency_key),
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_account_id ON \"transaction\"(account_id);",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
        (),
    )?;

    Ok(())
}

/// The columns selected by every transaction query, in the order [map_transaction_row] expects.
pub const TRANSACTION_COLUMNS: &str = "id, user_id, account_id, amount, type, category, \
    description, date, idempotency_key, created_at, updated_at";

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserId::new(row.get(1)?),
        account_id: row.get(2)?,
        amount: get_decimal(row, 3)?,
        transaction_type: row.get(4)?,
        category: row.get(5)?,
        description: row.get(6)?,
        date: row.get(7)?,
        idempotency_key: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert a transaction for `user_id`.
///
/// This only writes the transaction row. Use
/// [post_transaction](crate::transaction::post_transaction) to also update the
/// account balance.
///
/// # Errors
/// Returns an [Error::IdempotencyKeyReused] if the user already used the
/// idempotency key, or [Error::SqlError] if some other SQL error occurred,
/// e.g. the account does not exist.
pub fn insert_transaction(
    user_id: UserId,
    new_transaction: &NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .prepare(&format!(
            "INSERT INTO \"transaction\"
                (user_id, account_id, amount, type, category, description, date, idempotency_key, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                new_transaction.account_id,
                new_transaction.amount.to_string(),
                new_transaction.transaction_type,
                &new_transaction.category,
                &new_transaction.description,
                new_transaction.date,
                &new_transaction.idempotency_key,
                now,
            ),
            map_transaction_row,
        )
        .map_err(|error| error.into())
}

/// Get the transaction that `user_id` posted with `idempotency_key`, if any.
///
/// # Errors
/// Returns [Error::SqlError] if an SQL error occurred.
pub fn get_transaction_by_idempotency_key(
    user_id: UserId,
    idempotency_key: &str,
    connection: &Connection,
) -> Result<Option<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\"
             WHERE user_id = ?1 AND idempotency_key = ?2"
        ))?
        .query_row((user_id.as_i64(), idempotency_key), map_transaction_row)
        .optional()
        .map_err(|error| error.into())
}

// ============================================================================
// TESTS
// ============================================================================
