//! Pocketbook is a web service for tracking personal finances.
//!
//! Users register, log in with a bearer token, manage accounts and post
//! transactions against them. This library provides the JSON REST API and the
//! transaction posting engine that keeps account balances consistent with the
//! transactions recorded against them.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod app_state;
mod auth;
mod currency;
mod database_id;
mod datetime_format;
mod db;
mod endpoints;
mod extract;
mod logging;
mod money;
mod not_found;
mod pagination;
mod routing;
mod timezone;
mod transaction;

pub use account::{
    Account, AccountId, AccountType, NewAccount, Reconciliation, create_account, get_account,
    list_accounts, reconcile_account,
};
pub use app_state::AppState;
pub use auth::{
    NewUser, PasswordHash, TokenKeys, User, UserId, ValidatedPassword, count_users, create_user,
    get_user_by_email, update_password,
};
pub use currency::Currency;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use transaction::{
    Posting, PostingRequest, Transaction, TransactionType, post_transaction, signed_amount,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// One or more required fields were missing from the request.
    ///
    /// The string lists the fields that the client must provide.
    #[error("{0} are required")]
    MissingFields(&'static str),

    /// The request body or query string could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A monetary field was not a JSON number or could not be represented
    /// exactly as a decimal.
    ///
    /// The string names the offending field.
    #[error("{0} must be a number")]
    NotANumber(&'static str),

    /// A transaction was given an amount of zero.
    #[error("Amount cannot be 0")]
    ZeroAmount,

    /// Applying the amount would take the balance outside the range of
    /// representable decimals.
    #[error("Amount would overflow the account balance")]
    BalanceOverflow,

    /// The string did not name one of the known transaction types.
    #[error("Invalid transaction type \"{0}\". Must be: income, expense, transfer, or refund")]
    InvalidTransactionType(String),

    /// The string did not name one of the known account types.
    #[error("Invalid account type \"{0}\". Must be: checking, savings, credit, or investment")]
    InvalidAccountType(String),

    /// The currency code is not supported.
    #[error("Unsupported currency \"{0}\". Only USD is supported")]
    InvalidCurrency(String),

    /// A date string was not a real calendar date in the format YYYY-MM-DD.
    #[error("Date \"{0}\" must be in YYYY-MM-DD format")]
    InvalidDate(String),

    /// The email address is not a valid email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// A user with the email address already exists.
    #[error("User with this email already exists")]
    DuplicateEmail,

    /// The idempotency key was already used for a different transaction.
    ///
    /// Clients should reuse a key only to retry the exact same request.
    #[error("Idempotency key was already used for a different transaction")]
    IdempotencyKeyReused,

    /// The user provided an invalid combination of email and password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The bearer token was missing, malformed, expired or signed with a
    /// different key.
    #[error("Unauthorized")]
    InvalidToken,

    /// The bearer token could not be created.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The account does not exist or belongs to another user.
    ///
    /// The two cases are deliberately not distinguished so that clients
    /// cannot probe for other users' accounts.
    #[error("Account not found")]
    AccountNotFound,

    /// The user referenced by a valid token no longer exists.
    #[error("User not found")]
    UserNotFound,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The database was busy or locked by another writer.
    ///
    /// The operation was abandoned without side effects and the client may
    /// retry it.
    #[error("the ledger is busy, please try again")]
    StoreUnavailable,

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("transaction.idempotency_key") =>
            {
                Error::IdempotencyKeyReused
            }
            rusqlite::Error::SqliteFailure(sql_error, _)
                if matches!(
                    sql_error.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                tracing::warn!("the database is busy: {sql_error}");
                Error::StoreUnavailable
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingFields(_)
            | Error::InvalidRequest(_)
            | Error::NotANumber(_)
            | Error::ZeroAmount
            | Error::BalanceOverflow
            | Error::InvalidTransactionType(_)
            | Error::InvalidAccountType(_)
            | Error::InvalidCurrency(_)
            | Error::InvalidDate(_)
            | Error::InvalidEmail(_)
            | Error::InvalidTimezone(_)
            | Error::TooWeak(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            Error::AccountNotFound | Error::UserNotFound | Error::NotFound => StatusCode::NOT_FOUND,
            Error::DuplicateEmail | Error::IdempotencyKeyReused => StatusCode::CONFLICT,
            Error::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::TokenCreation(_)
            | Error::HashingError(_)
            | Error::DatabaseLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal errors are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
