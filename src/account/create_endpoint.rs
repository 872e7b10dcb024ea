//! Defines the endpoint for creating a new account.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    account::{NewAccount, create_account},
    auth::UserId,
    currency::Currency,
    endpoints::{self, format_endpoint},
    extract::ApiJson,
    money::decimal_from_json,
};

/// The state needed to create an account.
#[derive(Debug, Clone)]
pub struct CreateAccountState {
    /// The database connection for managing accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateAccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for creating an account.
#[derive(Debug, Default, Deserialize)]
pub struct CreateAccountRequest {
    /// The account name.
    #[serde(default)]
    pub name: Option<String>,
    /// One of checking, savings, credit or investment.
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
    /// The opening balance as a JSON number, defaults to zero.
    #[serde(default)]
    pub balance: Value,
    /// The currency code, defaults to USD.
    #[serde(default)]
    pub currency: Option<String>,
}

fn validate_account(request: CreateAccountRequest) -> Result<NewAccount, Error> {
    let (name, account_type) = match (request.name, request.account_type) {
        (Some(name), Some(account_type)) if !name.trim().is_empty() && !account_type.is_empty() => {
            (name.trim().to_owned(), account_type)
        }
        _ => return Err(Error::MissingFields("Name and type")),
    };

    let account_type = account_type.parse()?;

    let opening_balance = match request.balance {
        Value::Null => Decimal::ZERO,
        balance => decimal_from_json(&balance, "Balance")?,
    };

    let currency = match request.currency {
        Some(currency) => currency.parse()?,
        None => Currency::default(),
    };

    Ok(NewAccount {
        name,
        account_type,
        opening_balance,
        currency,
    })
}

/// A route handler for creating a new account.
///
/// Responds with 201 and the new account on success, with the account's URI
/// in the `Location` header.
pub async fn create_account_endpoint(
    State(state): State<CreateAccountState>,
    Extension(user_id): Extension<UserId>,
    ApiJson(request): ApiJson<CreateAccountRequest>,
) -> Result<Response, Error> {
    let new_account = validate_account(request)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let account = create_account(user_id, new_account, &connection)?;
    tracing::info!("User {user_id} created account {}", account.id);

    let location = format_endpoint(endpoints::ACCOUNT, account.id);

    Ok((
        StatusCode::CREATED,
        [(LOCATION, location)],
        Json(json!({ "account": account })),
    )
        .into_response())
}
