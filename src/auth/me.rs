//! The route for fetching the profile of the logged in user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    auth::{UserId, get_user_by_id},
};

/// The state needed to look up the current user.
#[derive(Debug, Clone)]
pub struct MeState {
    /// The database connection for looking up users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for MeState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns the logged in user's profile.
///
/// Responds with 404 if the user was deleted after the token was issued.
pub async fn get_me(
    State(state): State<MeState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection).map_err(|error| match error {
        Error::NotFound => Error::UserNotFound,
        error => error,
    })?;

    Ok(Json(json!({ "user": user })))
}
