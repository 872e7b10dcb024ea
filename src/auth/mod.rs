//! User registration, log-in and bearer token authentication.

mod log_in;
mod me;
mod middleware;
mod password;
mod register_user;
mod token;
mod user;

pub use log_in::post_log_in;
pub use me::get_me;
pub use middleware::auth_guard;
pub use password::{PasswordHash, ValidatedPassword};
pub use register_user::register_user;
pub use token::{Claims, DEFAULT_TOKEN_DURATION, TokenKeys, issue_token, verify_token};
pub use user::{
    NewUser, User, UserId, count_users, create_user, create_user_table, get_user_by_email,
    get_user_by_id, update_password,
};

#[cfg(test)]
pub(crate) use user::create_test_user;
