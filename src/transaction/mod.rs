//! Transactions and the posting engine.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the database functions for storing it
//! - The posting engine that records a transaction and updates its account's
//!   balance atomically
//! - Filtered, paginated transaction history
//! - The route handlers for posting and listing transactions

mod core;
mod create_endpoint;
mod list_endpoint;
mod posting;
mod query;

pub use core::{
    NewTransaction, TRANSACTION_COLUMNS, Transaction, TransactionId, TransactionType,
    create_transaction_table, get_transaction_by_idempotency_key, insert_transaction,
    map_transaction_row,
};
pub use create_endpoint::{IDEMPOTENCY_KEY_HEADER, create_transaction_endpoint};
pub use list_endpoint::list_transactions_endpoint;
pub use posting::{Posting, PostingRequest, post_transaction, signed_amount, validate_posting};
pub use query::{TransactionFilter, query_transactions};
