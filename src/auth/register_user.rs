//! The route for registering a new user.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use email_address::EmailAddress;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, Error,
    auth::{NewUser, PasswordHash, ValidatedPassword, create_user},
    currency::Currency,
    extract::ApiJson,
    timezone::is_valid_timezone,
};

/// The timezone assigned to users that do not specify one.
const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The bcrypt cost used when hashing the new password.
    pub password_hash_cost: u32,
    /// The database connection for storing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            password_hash_cost: state.password_hash_cost,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The details a new user submits when registering.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    /// The email address to log in with.
    #[serde(default)]
    pub email: Option<String>,
    /// The password to log in with.
    #[serde(default)]
    pub password: Option<String>,
    /// The name to display for the user.
    #[serde(default)]
    pub name: Option<String>,
    /// The user's default currency, defaults to USD.
    #[serde(default)]
    pub currency: Option<String>,
    /// A canonical timezone name, defaults to "America/Los_Angeles".
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Validate a registration request and hash the password.
fn validate_registration(request: RegisterRequest, hash_cost: u32) -> Result<NewUser, Error> {
    let (email, password, name) = match (request.email, request.password, request.name) {
        (Some(email), Some(password), Some(name))
            if !email.is_empty() && !password.is_empty() && !name.trim().is_empty() =>
        {
            (email, password, name)
        }
        _ => return Err(Error::MissingFields("Email, password, and name")),
    };

    if !EmailAddress::is_valid(&email) {
        return Err(Error::InvalidEmail(email));
    }

    let currency = match request.currency {
        Some(currency) => currency.parse()?,
        None => Currency::default(),
    };

    let timezone = request
        .timezone
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_owned());
    if !is_valid_timezone(&timezone) {
        return Err(Error::InvalidTimezone(timezone));
    }

    let password = ValidatedPassword::new(&password)?;
    let password_hash = PasswordHash::new(password, hash_cost)?;

    Ok(NewUser {
        email,
        password_hash,
        name: name.trim().to_owned(),
        currency,
        timezone,
    })
}

/// A route handler for registering a new user.
///
/// Responds with 201 and the new user's profile on success.
pub async fn register_user(
    State(state): State<RegistrationState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Response, Error> {
    let new_user = validate_registration(request, state.password_hash_cost)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let user = create_user(new_user, &connection)?;
    tracing::info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(json!({ "user": user }))).into_response())
}
