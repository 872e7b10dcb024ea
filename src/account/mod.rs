//! Bank-like accounts owned by users.

mod core;
mod create_endpoint;
mod list_endpoint;
mod reconcile;

pub use core::{
    Account, AccountId, AccountType, NewAccount, create_account, create_account_table,
    get_account, list_accounts, update_account_balance,
};
pub use create_endpoint::create_account_endpoint;
pub use list_endpoint::{get_account_endpoint, list_accounts_endpoint};
pub use reconcile::{Reconciliation, reconcile_account};

#[cfg(test)]
pub(crate) use core::create_test_account;
