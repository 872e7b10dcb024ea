//! Defines the endpoints for listing a user's accounts and fetching a single account.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    account::{AccountId, get_account, list_accounts, reconcile_account},
    auth::UserId,
    extract::ApiPath,
};

/// The state needed to read accounts.
#[derive(Debug, Clone)]
pub struct AccountsState {
    /// The database connection for reading accounts.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that lists the logged in user's accounts, oldest first.
pub async fn list_accounts_endpoint(
    State(state): State<AccountsState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let accounts = list_accounts(user_id, &connection)?;

    Ok(Json(json!({ "accounts": accounts })))
}

/// A route handler that returns one account along with a check of its balance
/// against its transactions.
///
/// Accounts owned by other users are reported as not found.
pub async fn get_account_endpoint(
    State(state): State<AccountsState>,
    Extension(user_id): Extension<UserId>,
    ApiPath(account_id): ApiPath<AccountId>,
) -> Result<Json<Value>, Error> {
    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    let account = get_account(account_id, user_id, &connection)?;
    let reconciliation = reconcile_account(account_id, user_id, &connection)?;

    if !reconciliation.is_balanced {
        tracing::warn!(
            "Account {account_id} has balance {} but its transactions sum to {}",
            reconciliation.stored_balance,
            reconciliation.computed_balance
        );
    }

    Ok(Json(
        json!({ "account": account, "reconciliation": reconciliation }),
    ))
}

#[cfg(test)]
mod account_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};

    use crate::{
        account::{Account, create_test_account},
        auth::{User, create_test_user},
        db::initialize,
    };

    use super::{AccountsState, get_account_endpoint, list_accounts_endpoint};

    struct Fixture {
        server: TestServer,
        owned: Account,
        foreign: Account,
    }

    fn get_fixture() -> (Fixture, User) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_test_user("foo@bar.baz", &connection);
        let other = create_test_user("bar@baz.qux", &connection);
        let owned = create_test_account(user.id, dec!(12.5), &connection);
        let foreign = create_test_account(other.id, dec!(99), &connection);

        let app = Router::new()
            .route("/accounts", get(list_accounts_endpoint))
            .route("/accounts/{account_id}", get(get_account_endpoint))
            .layer(Extension(user.id))
            .with_state(AccountsState {
                db_connection: Arc::new(Mutex::new(connection)),
            });

        (
            Fixture {
                server: TestServer::try_new(app).expect("Could not create test server."),
                owned,
                foreign,
            },
            user,
        )
    }

    #[tokio::test]
    async fn lists_only_own_accounts() {
        let (fixture, _) = get_fixture();

        let response = fixture.server.get("/accounts").await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        let accounts = body["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0]["id"], fixture.owned.id);
        assert_eq!(accounts[0]["balance"], "12.5");
    }

    #[tokio::test]
    async fn gets_own_account_with_reconciliation() {
        let (fixture, _) = get_fixture();

        let response = fixture
            .server
            .get(&format!("/accounts/{}", fixture.owned.id))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["account"]["name"], "Everyday");
        assert_eq!(body["reconciliation"]["isBalanced"], true);
        assert_eq!(body["reconciliation"]["transactionCount"], 0);
    }

    #[tokio::test]
    async fn other_users_account_is_not_found() {
        let (fixture, _) = get_fixture();

        let response = fixture
            .server
            .get(&format!("/accounts/{}", fixture.foreign.id))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": "Account not found" }));
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let (fixture, _) = get_fixture();

        let response = fixture.server.get("/accounts/9999").await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": "Account not found" }));
    }
}
