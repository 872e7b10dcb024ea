//! Authentication middleware that verifies bearer tokens.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    AppState, Error,
    auth::{TokenKeys, verify_token},
};

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The keys used to verify bearer tokens.
    pub token_keys: TokenKeys,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            token_keys: state.token_keys.clone(),
        }
    }
}

/// Middleware function that checks for a valid bearer token in the `Authorization` header.
///
/// The user ID is placed into the request extensions and the request executed normally if the
/// token is valid, otherwise a 401 response is returned and the handler is never called.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserId>`
/// to receive the verified user ID.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let bearer =
        match TypedHeader::<Authorization<Bearer>>::from_request_parts(&mut parts, &state).await {
            Ok(TypedHeader(Authorization(bearer))) => bearer,
            Err(error) => {
                tracing::debug!("Missing or malformed authorization header: {error}");
                return Error::InvalidToken.into_response();
            }
        };

    let claims = match verify_token(bearer.token(), &state.token_keys) {
        Ok(claims) => claims,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(claims.id);
    let request = Request::from_parts(parts, body);

    next.run(request).await
}
