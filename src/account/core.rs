//! Defines the account type and the functions for storing and fetching accounts.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::{UserId, get_user_by_id},
    currency::Currency,
    database_id::DatabaseId,
    datetime_format,
    db::get_decimal,
};

/// The ID of an account in the database.
pub type AccountId = DatabaseId;

/// The kinds of account a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// An everyday transaction account.
    Checking,
    /// A savings account.
    Savings,
    /// A credit card or line of credit.
    Credit,
    /// A brokerage or other investment account.
    Investment,
}

impl AccountType {
    /// The lowercase name used in requests, responses and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Credit => "credit",
            AccountType::Investment => "investment",
        }
    }
}

impl Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            "credit" => Ok(AccountType::Credit),
            "investment" => Ok(AccountType::Investment),
            other => Err(Error::InvalidAccountType(other.to_owned())),
        }
    }
}

impl ToSql for AccountType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AccountType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// A named pot of money owned by a user, with a running balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub user_id: UserId,
    /// A display name for the account, e.g. "Everyday".
    pub name: String,
    /// What kind of account this is.
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// The current balance.
    pub balance: Decimal,
    /// The balance the account was opened with.
    pub opening_balance: Decimal,
    /// The currency the balance is recorded in.
    pub currency: Currency,
    /// Whether the account is in use.
    pub is_active: bool,
    /// When the account was created.
    #[serde(with = "datetime_format::timestamp")]
    pub created_at: OffsetDateTime,
    /// When the account was last changed.
    #[serde(with = "datetime_format::timestamp")]
    pub updated_at: OffsetDateTime,
}

/// The validated details for creating an account.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    /// A non-empty display name.
    pub name: String,
    /// What kind of account to create.
    pub account_type: AccountType,
    /// The balance to open the account with.
    pub opening_balance: Decimal,
    /// The currency of the account.
    pub currency: Currency,
}

/// Create the account table.
///
/// # Errors
/// Returns an error if the SQL query failed.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            balance TEXT NOT NULL,
            opening_balance TEXT NOT NULL,
            currency TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_user_id ON account(user_id)",
        (),
    )?;

    Ok(())
}

const ACCOUNT_COLUMNS: &str = "id, user_id, name, type, balance, opening_balance, currency, \
    is_active, created_at, updated_at";

fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        user_id: UserId::new(row.get(1)?),
        name: row.get(2)?,
        account_type: row.get(3)?,
        balance: get_decimal(row, 4)?,
        opening_balance: get_decimal(row, 5)?,
        currency: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Create an active account for `user_id` whose balance starts at the opening balance.
///
/// # Errors
/// Returns a:
/// - [Error::UserNotFound] if `user_id` does not belong to a registered user,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_account(
    user_id: UserId,
    new_account: NewAccount,
    connection: &Connection,
) -> Result<Account, Error> {
    get_user_by_id(user_id, connection).map_err(|error| match error {
        Error::NotFound => Error::UserNotFound,
        error => error,
    })?;

    let now = OffsetDateTime::now_utc();
    let opening_balance = new_account.opening_balance.to_string();

    connection
        .prepare(&format!(
            "INSERT INTO account
                (user_id, name, type, balance, opening_balance, currency, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5, 1, ?6, ?6)
             RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(
            (
                user_id.as_i64(),
                &new_account.name,
                new_account.account_type,
                opening_balance,
                new_account.currency,
                now,
            ),
            map_account_row,
        )
        .map_err(|error| error.into())
}

/// Get the account `account_id` if it is owned by `user_id`.
///
/// # Errors
/// Returns [Error::AccountNotFound] if the account does not exist or is owned
/// by another user, or [Error::SqlError] if some other SQL error occurred.
pub fn get_account(
    account_id: AccountId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = ?1 AND user_id = ?2"
        ))?
        .query_row((account_id, user_id.as_i64()), map_account_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::AccountNotFound,
            error => error.into(),
        })
}

/// Get all of the accounts owned by `user_id`, oldest first.
///
/// # Errors
/// Returns [Error::SqlError] if an SQL error occurred.
pub fn list_accounts(user_id: UserId, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE user_id = ?1 ORDER BY created_at ASC, id ASC"
        ))?
        .query_map([user_id.as_i64()], map_account_row)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Overwrite the balance of the account `account_id` owned by `user_id`.
///
/// Only the posting engine should call this, from inside the same SQL
/// transaction that records the change.
///
/// # Errors
/// Returns [Error::AccountNotFound] if no account was updated.
pub fn update_account_balance(
    account_id: AccountId,
    user_id: UserId,
    balance: Decimal,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET balance = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
        (
            balance.to_string(),
            OffsetDateTime::now_utc(),
            account_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::AccountNotFound);
    }

    Ok(())
}

#[cfg(test)]
pub(crate) fn create_test_account(
    user_id: UserId,
    opening_balance: Decimal,
    connection: &Connection,
) -> Account {
    create_account(
        user_id,
        NewAccount {
            name: "Everyday".to_owned(),
            account_type: AccountType::Checking,
            opening_balance,
            currency: Currency::Usd,
        },
        connection,
    )
    .expect("Could not create test account")
}
