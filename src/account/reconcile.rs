//! Checks that an account's stored balance agrees with its transactions.

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    Error,
    account::{AccountId, get_account},
    auth::UserId,
    db::get_decimal,
};

/// The result of recomputing an account's balance from its transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// The account that was checked.
    pub account_id: AccountId,
    /// The balance stored on the account.
    pub stored_balance: Decimal,
    /// The opening balance plus the sum of every transaction amount.
    pub computed_balance: Decimal,
    /// How many transactions have been posted to the account.
    pub transaction_count: usize,
    /// Whether the stored and computed balances agree.
    pub is_balanced: bool,
}

/// Recompute the balance of account `account_id` from its transactions and
/// compare it against the stored balance.
///
/// # Errors
/// Returns [Error::AccountNotFound] if the account does not exist or is owned
/// by another user, [Error::BalanceOverflow] if the sum does not fit in a
/// decimal, or [Error::SqlError] if some other SQL error occurred.
pub fn reconcile_account(
    account_id: AccountId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Reconciliation, Error> {
    let account = get_account(account_id, user_id, connection)?;

    let amounts = connection
        .prepare("SELECT amount FROM \"transaction\" WHERE account_id = ?1 AND user_id = ?2")?
        .query_map((account_id, user_id.as_i64()), |row| get_decimal(row, 0))?
        .collect::<Result<Vec<Decimal>, rusqlite::Error>>()?;

    let computed_balance = amounts
        .iter()
        .try_fold(account.opening_balance, |total, amount| {
            total.checked_add(*amount)
        })
        .ok_or(Error::BalanceOverflow)?;

    Ok(Reconciliation {
        account_id,
        stored_balance: account.balance,
        computed_balance,
        transaction_count: amounts.len(),
        is_balanced: computed_balance == account.balance,
    })
}
