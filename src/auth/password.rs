//! Password validation and hashing.
//!
//! Raw passwords from clients become a [ValidatedPassword] once they pass the
//! length check, and only a bcrypt [PasswordHash] of them is ever stored.

use std::fmt::{self, Debug, Display};

use bcrypt::{BcryptError, hash, verify};
use serde::{Deserialize, Serialize};

use crate::Error;

const MASK: &str = "********";

/// A raw password that is long enough to be accepted.
///
/// `Debug` and `Display` both print a mask, so a validated password can be
/// logged without leaking it.
#[derive(Clone, PartialEq, Deserialize)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// The fewest characters a password may have.
    pub const MIN_LENGTH: usize = 8;

    /// Check that `raw_password` has at least [ValidatedPassword::MIN_LENGTH] characters.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] if the password is too short.
    pub fn new(raw_password: &str) -> Result<Self, Error> {
        if raw_password.chars().count() >= Self::MIN_LENGTH {
            Ok(Self(raw_password.to_owned()))
        } else {
            Err(Error::TooWeak(format!(
                "password must be at least {} characters long",
                Self::MIN_LENGTH
            )))
        }
    }

    /// Wrap `raw_password` without checking its length.
    ///
    /// Intended for seeding test data with known credentials.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_owned())
    }
}

impl Debug for ValidatedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValidatedPassword").field(&MASK).finish()
    }
}

impl Display for ValidatedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

/// A salted bcrypt hash of a user's password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// bcrypt's recommended work factor.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash `password` with the bcrypt work factor `cost`.
    ///
    /// Tests pass a low cost such as 4 to keep hashing fast.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if bcrypt rejects the cost or fails to hash.
    pub fn new(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap a hash that was read back from the database.
    pub fn new_unchecked(stored_hash: &str) -> Self {
        Self(stored_hash.to_owned())
    }

    /// Validate then hash `raw_password` in one step.
    ///
    /// # Errors
    ///
    /// Returns [Error::TooWeak] for short passwords and [Error::HashingError]
    /// if hashing fails.
    pub fn from_raw_password(raw_password: &str, cost: u32) -> Result<Self, Error> {
        Self::new(ValidatedPassword::new(raw_password)?, cost)
    }

    /// Whether `raw_password` is the password this hash was made from.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
