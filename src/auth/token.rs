//! Issues and verifies the JSON Web Tokens used as bearer tokens.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    Error,
    auth::{User, UserId},
    currency::Currency,
};

/// How long a token is valid for unless configured otherwise.
pub const DEFAULT_TOKEN_DURATION: Duration = Duration::hours(72);

/// The keys used to sign and verify tokens, derived from a shared secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenKeys {
    /// Create the signing and verification keys from `secret`.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenKeys { .. }")
    }
}

/// The contents of a JSON Web Token.
///
/// Besides the user's identity the token carries a snapshot of their profile,
/// which may go stale if the profile changes before the token expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub id: UserId,
    /// The user's email address when the token was issued.
    pub email: String,
    /// The user's display name when the token was issued.
    pub name: String,
    /// The user's default currency when the token was issued.
    pub currency: Currency,
    /// The user's timezone when the token was issued.
    pub timezone: String,
    /// The time the token was issued as a Unix timestamp.
    pub iat: i64,
    /// The expiry time of the token as a Unix timestamp.
    pub exp: i64,
}

/// Issue a token for `user` that expires after `duration`.
///
/// # Errors
/// Returns [Error::TokenCreation] if the token could not be signed.
pub fn issue_token(user: &User, duration: Duration, keys: &TokenKeys) -> Result<String, Error> {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        currency: user.currency,
        timezone: user.timezone.clone(),
        iat: now.unix_timestamp(),
        exp: (now + duration).unix_timestamp(),
    };

    encode_claims(&claims, keys)
}

fn encode_claims(claims: &Claims, keys: &TokenKeys) -> Result<String, Error> {
    encode(&Header::default(), claims, &keys.encoding_key)
        .map_err(|error| Error::TokenCreation(error.to_string()))
}

/// Verify the signature and expiry of `token` and decode its claims.
///
/// # Errors
/// Returns [Error::InvalidToken] if the token is malformed, expired or was
/// signed with a different key.
pub fn verify_token(token: &str, keys: &TokenKeys) -> Result<Claims, Error> {
    decode::<Claims>(token, &keys.decoding_key, &Validation::default())
        .map(|token_data| token_data.claims)
        .map_err(|error| {
            tracing::debug!("Rejected bearer token: {error}");
            Error::InvalidToken
        })
}
