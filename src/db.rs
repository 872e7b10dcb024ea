//! Database initialization and helpers shared by the table modules.

use std::str::FromStr;

use rusqlite::{Connection, Row, Transaction as SqlTransaction, TransactionBehavior, types::Type};
use rust_decimal::Decimal;

use crate::{
    Error, account::create_account_table, auth::create_user_table,
    transaction::create_transaction_table,
};

/// Create the application tables if they do not already exist.
///
/// Foreign key enforcement is switched on for `connection`.
///
/// # Errors
/// Returns an error if the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_account_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Read a decimal stored as text from column `index` of `row`.
///
/// Money is stored as text so that no precision is lost to floating point.
///
/// # Errors
/// Returns [rusqlite::Error::FromSqlConversionFailure] if the text is not a decimal number.
pub fn get_decimal(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    Decimal::from_str(&text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}
