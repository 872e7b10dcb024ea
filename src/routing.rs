//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::{
    AppState,
    account::{create_account_endpoint, get_account_endpoint, list_accounts_endpoint},
    auth::{auth_guard, get_me, post_log_in, register_user},
    endpoints,
    not_found::get_404_not_found,
    transaction::{create_transaction_endpoint, list_transactions_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::COFFEE, get(get_coffee))
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::LOG_IN_API, post(post_log_in));

    let protected_routes = Router::new()
        .route(endpoints::ME, get(get_me))
        .route(
            endpoints::ACCOUNTS,
            get(list_accounts_endpoint).post(create_account_endpoint),
        )
        .route(endpoints::ACCOUNT, get(get_account_endpoint))
        .route(
            endpoints::TRANSACTIONS_API,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Attempt to get a cup of coffee from the server.
async fn get_coffee() -> Response {
    (
        StatusCode::IM_A_TEAPOT,
        Json(json!({ "message": "I'm a teapot" })),
    )
        .into_response()
}

#[cfg(test)]
mod router_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{AppState, endpoints, endpoints::format_endpoint, pagination::PaginationConfig};

    use super::build_router;

    fn get_test_server() -> TestServer {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "42",
            PaginationConfig::default(),
        )
        .unwrap()
        .with_password_hash_cost(4);

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    /// Register and log in a user, returning their bearer token.
    async fn log_in(server: &TestServer, email: &str) -> String {
        server
            .post(endpoints::USERS)
            .json(&json!({
                "email": email,
                "password": "averysafeandsecurepassword",
                "name": "Test User",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post(endpoints::LOG_IN_API)
            .json(&json!({ "email": email, "password": "averysafeandsecurepassword" }))
            .await;
        response.assert_status_ok();

        response.json::<Value>()["token"]
            .as_str()
            .expect("log in response should contain a token")
            .to_owned()
    }

    async fn create_account(server: &TestServer, token: &str, balance: i64) -> i64 {
        let response = server
            .post(endpoints::ACCOUNTS)
            .authorization_bearer(token)
            .json(&json!({ "name": "Everyday", "type": "checking", "balance": balance }))
            .await;
        response.assert_status(StatusCode::CREATED);

        response.json::<Value>()["account"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn coffee_is_a_teapot() {
        let server = get_test_server();

        server
            .get(endpoints::COFFEE)
            .await
            .assert_status(StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let server = get_test_server();

        let response = server.get("/api/nope").await;

        response.assert_status_not_found();
        response.assert_json(&json!({ "error": "No route for /api/nope" }));
    }

    #[tokio::test]
    async fn non_numeric_account_id_is_json_bad_request() {
        let server = get_test_server();
        let token = log_in(&server, "foo@bar.baz").await;

        let response = server
            .get("/api/accounts/abc")
            .authorization_bearer(&token)
            .await;

        response.assert_status_bad_request();
        let body = response.json::<Value>();
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|message| message.starts_with("invalid request:")),
            "expected a JSON error, got {body}"
        );
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let server = get_test_server();

        for path in [
            endpoints::ME,
            endpoints::ACCOUNTS,
            endpoints::TRANSACTIONS_API,
        ] {
            let response = server.get(path).await;

            response.assert_status_unauthorized();
            response.assert_json(&json!({ "error": "Unauthorized" }));
        }

        server
            .post(endpoints::TRANSACTIONS_API)
            .authorization_bearer("not.a.token")
            .json(&json!({}))
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn me_returns_logged_in_user() {
        let server = get_test_server();
        let token = log_in(&server, "foo@bar.baz").await;

        let response = server.get(endpoints::ME).authorization_bearer(&token).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["user"]["email"], "foo@bar.baz");
    }

    #[tokio::test]
    async fn posts_expense_and_income_end_to_end() {
        let server = get_test_server();
        let token = log_in(&server, "foo@bar.baz").await;
        let account_id = create_account(&server, &token, 100).await;

        let expense = server
            .post(endpoints::TRANSACTIONS_API)
            .authorization_bearer(&token)
            .json(&json!({
                "accountId": account_id,
                "amount": 25.5,
                "type": "expense",
                "category": "groceries",
                "date": "2024-01-15",
            }))
            .await;
        expense.assert_status(StatusCode::CREATED);
        assert_eq!(expense.json::<Value>()["accountBalance"], "74.5");

        let income = server
            .post(endpoints::TRANSACTIONS_API)
            .authorization_bearer(&token)
            .json(&json!({
                "accountId": account_id,
                "amount": 50,
                "type": "income",
                "category": "salary",
                "date": "2024-01-16",
            }))
            .await;
        income.assert_status(StatusCode::CREATED);
        assert_eq!(income.json::<Value>()["accountBalance"], "124.5");

        let account = server
            .get(&format_endpoint(endpoints::ACCOUNT, account_id))
            .authorization_bearer(&token)
            .await
            .json::<Value>();
        assert_eq!(account["account"]["balance"], "124.5");
        assert_eq!(account["reconciliation"]["isBalanced"], true);

        let history = server
            .get(endpoints::TRANSACTIONS_API)
            .authorization_bearer(&token)
            .await
            .json::<Value>();
        assert_eq!(history["pagination"]["total"], 2);
        assert_eq!(history["transactions"][0]["type"], "income");
        assert_eq!(history["transactions"][1]["amount"], "-25.5");
    }

    #[tokio::test]
    async fn users_cannot_see_or_post_to_each_others_accounts() {
        let server = get_test_server();
        let owner_token = log_in(&server, "foo@bar.baz").await;
        let intruder_token = log_in(&server, "bar@baz.qux").await;
        let account_id = create_account(&server, &owner_token, 0).await;

        server
            .get(&format_endpoint(endpoints::ACCOUNT, account_id))
            .authorization_bearer(&intruder_token)
            .await
            .assert_status_not_found();

        server
            .post(endpoints::TRANSACTIONS_API)
            .authorization_bearer(&intruder_token)
            .json(&json!({
                "accountId": account_id,
                "amount": 10,
                "type": "expense",
                "category": "theft",
                "date": "2024-01-15",
            }))
            .await
            .assert_status_not_found();

        let accounts = server
            .get(endpoints::ACCOUNTS)
            .authorization_bearer(&intruder_token)
            .await
            .json::<Value>();
        assert_eq!(accounts["accounts"], json!([]));

        let account = server
            .get(&format_endpoint(endpoints::ACCOUNT, account_id))
            .authorization_bearer(&owner_token)
            .await
            .json::<Value>();
        assert_eq!(account["account"]["balance"], "0");
    }
}
