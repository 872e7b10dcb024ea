//! The posting engine: records a transaction and updates its account's balance
//! as one atomic unit.
//!
//! A posting runs inside a single SQLite transaction opened with
//! `BEGIN IMMEDIATE`, so the write lock is held from the moment the balance is
//! read until the new balance is committed. Two postings against the same
//! account can therefore never both read the same stale balance. The SQLite
//! transaction rolls back when dropped, so every early return leaves the
//! ledger untouched.

use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;

use crate::{
    Error,
    account::{AccountId, get_account, update_account_balance},
    auth::UserId,
    datetime_format::parse_date,
    transaction::{
        NewTransaction, Transaction, TransactionType, get_transaction_by_idempotency_key,
        insert_transaction,
    },
};

/// A request to post a transaction, as received from the client.
///
/// `amount` is the magnitude the client entered; the stored amount is derived
/// with [signed_amount].
#[derive(Debug, Clone, PartialEq)]
pub struct PostingRequest {
    /// The account to post to.
    pub account_id: AccountId,
    /// The amount as entered by the client.
    pub amount: Decimal,
    /// What kind of transaction this is.
    pub transaction_type: TransactionType,
    /// A free-text label such as "groceries".
    pub category: String,
    /// An optional note about the transaction.
    pub description: Option<String>,
    /// The date in the format YYYY-MM-DD.
    pub date: String,
    /// A client chosen key that makes the request safe to retry.
    pub idempotency_key: Option<String>,
}

/// The outcome of a successful posting.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    /// The recorded transaction.
    pub transaction: Transaction,
    /// The account's balance after the transaction was applied.
    pub balance: Decimal,
    /// Whether the transaction had already been posted with the same
    /// idempotency key, in which case nothing was written.
    pub replayed: bool,
}

/// The amount to store for a transaction of `transaction_type`.
///
/// Expenses are negated and every other type is stored as given, so that the
/// sum of an account's transaction amounts always moves its balance in the
/// right direction.
pub fn signed_amount(transaction_type: TransactionType, amount: Decimal) -> Decimal {
    match transaction_type {
        TransactionType::Expense => -amount,
        TransactionType::Income | TransactionType::Transfer | TransactionType::Refund => amount,
    }
}

/// Check a posting request without touching the database.
///
/// # Errors
/// Returns a:
/// - [Error::ZeroAmount] if the amount is zero,
/// - [Error::InvalidRequest] if the category is blank,
/// - or [Error::InvalidDate] if the date is not a real date in the format YYYY-MM-DD.
pub fn validate_posting(request: PostingRequest) -> Result<NewTransaction, Error> {
    if request.amount.is_zero() {
        return Err(Error::ZeroAmount);
    }

    let category = request.category.trim().to_owned();
    if category.is_empty() {
        return Err(Error::InvalidRequest("Category cannot be empty".to_owned()));
    }

    let date = parse_date(&request.date)?;

    let description = request
        .description
        .map(|description| description.trim().to_owned())
        .filter(|description| !description.is_empty());

    Ok(NewTransaction {
        account_id: request.account_id,
        amount: signed_amount(request.transaction_type, request.amount),
        transaction_type: request.transaction_type,
        category,
        description,
        date,
        idempotency_key: request.idempotency_key,
    })
}

/// Record a transaction for `user_id` and apply it to the account's balance.
///
/// The request is validated before the database is touched. The account is
/// then read, the transaction inserted and the new balance written within one
/// SQLite transaction, so either both the transaction and the new balance are
/// committed or neither is.
///
/// If the request carries an idempotency key that `user_id` already posted
/// with, the original transaction and the account's current balance are
/// returned and nothing is written.
///
/// # Errors
/// Returns a:
/// - validation error from [validate_posting],
/// - [Error::AccountNotFound] if the account does not exist or is owned by another user,
/// - [Error::IdempotencyKeyReused] if the idempotency key was used for a different transaction,
/// - [Error::BalanceOverflow] if the new balance cannot be represented,
/// - [Error::StoreUnavailable] if another writer holds the database lock,
/// - or [Error::SqlError] if some other SQL error occurred.
pub fn post_transaction(
    user_id: UserId,
    request: PostingRequest,
    connection: &mut Connection,
) -> Result<Posting, Error> {
    let new_transaction = validate_posting(request)?;

    let unit_of_work = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some(idempotency_key) = &new_transaction.idempotency_key {
        if let Some(existing) =
            get_transaction_by_idempotency_key(user_id, idempotency_key, &unit_of_work)?
        {
            if !new_transaction.matches(&existing) {
                return Err(Error::IdempotencyKeyReused);
            }

            let account = get_account(existing.account_id, user_id, &unit_of_work)?;
            tracing::info!(
                "Replayed transaction {} for idempotency key {idempotency_key}",
                existing.id
            );

            return Ok(Posting {
                transaction: existing,
                balance: account.balance,
                replayed: true,
            });
        }
    }

    let account = get_account(new_transaction.account_id, user_id, &unit_of_work)?;
    let balance = account
        .balance
        .checked_add(new_transaction.amount)
        .ok_or(Error::BalanceOverflow)?;

    let transaction = insert_transaction(user_id, &new_transaction, &unit_of_work)?;
    update_account_balance(account.id, user_id, balance, &unit_of_work)?;

    unit_of_work.commit()?;

    tracing::info!(
        "Posted transaction {} of {} to account {}, new balance {balance}",
        transaction.id,
        transaction.amount,
        account.id
    );

    Ok(Posting {
        transaction,
        balance,
        replayed: false,
    })
}
