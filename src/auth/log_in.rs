//! This file defines the route for handling log-in requests.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    auth::{TokenKeys, User, get_user_by_email, issue_token},
    extract::ApiJson,
};

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The keys used to sign bearer tokens.
    pub token_keys: TokenKeys,
    /// The duration for which issued tokens are valid.
    pub token_duration: Duration,
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            token_keys: state.token_keys.clone(),
            token_duration: state.token_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The credentials entered during log-in.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LogInRequest {
    /// Email entered during log-in.
    #[serde(default)]
    pub email: Option<String>,
    /// Password entered during log-in.
    #[serde(default)]
    pub password: Option<String>,
}

/// The response to a successful log-in.
#[derive(Debug, Serialize)]
pub struct LogInResponse {
    /// A human readable confirmation.
    pub message: &'static str,
    /// The profile of the user that logged in.
    pub user: User,
    /// The bearer token to send with requests to protected routes.
    pub token: String,
}

/// Handler for log-in requests.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The email or password is missing.
/// - The email does not belong to a registered user.
/// - The password is not correct.
/// - An internal error occurred when verifying the password or signing the token.
pub async fn post_log_in(
    State(state): State<LogInState>,
    ApiJson(request): ApiJson<LogInRequest>,
) -> Result<Json<LogInResponse>, Error> {
    let (email, password) = match (request.email, request.password) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => return Err(Error::MissingFields("Email and password")),
    };

    let user = {
        let connection = state
            .db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)?;

        match get_user_by_email(&email, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => return Err(Error::InvalidCredentials),
            Err(error) => return Err(error),
        }
    };

    let password_is_correct = user.password_hash.verify(&password).map_err(|error| {
        tracing::error!("Error verifying password: {error}");
        Error::HashingError(error.to_string())
    })?;

    if !password_is_correct {
        return Err(Error::InvalidCredentials);
    }

    let token = issue_token(&user, state.token_duration, &state.token_keys)?;
    tracing::info!("User {} logged in", user.id);

    Ok(Json(LogInResponse {
        message: "Login successful",
        user,
        token,
    }))
}
