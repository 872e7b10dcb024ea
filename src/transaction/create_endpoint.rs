//! Defines the endpoint for posting a new transaction.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    account::AccountId,
    auth::UserId,
    extract::ApiJson,
    money::decimal_from_json,
    transaction::{PostingRequest, post_transaction},
};

/// The header a client sets to make a posting safe to retry.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// The longest idempotency key that will be stored.
const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 255;

/// The state needed to post a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for posting a transaction.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    /// The account to post to.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// The amount as a JSON number.
    #[serde(default)]
    pub amount: Value,
    /// One of income, expense, transfer or refund.
    #[serde(default, rename = "type")]
    pub transaction_type: Option<String>,
    /// A free-text label.
    #[serde(default)]
    pub category: Option<String>,
    /// An optional note.
    #[serde(default)]
    pub description: Option<String>,
    /// The date in the format YYYY-MM-DD.
    #[serde(default)]
    pub date: Option<String>,
}

fn parse_idempotency_key(headers: &HeaderMap) -> Result<Option<String>, Error> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };

    let key = value
        .to_str()
        .map_err(|_| Error::InvalidRequest("Idempotency-Key must be visible ASCII".to_owned()))?
        .trim();

    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LENGTH {
        return Err(Error::InvalidRequest(format!(
            "Idempotency-Key must be between 1 and {MAX_IDEMPOTENCY_KEY_LENGTH} characters"
        )));
    }

    Ok(Some(key.to_owned()))
}

fn parse_posting_request(
    request: CreateTransactionRequest,
    idempotency_key: Option<String>,
) -> Result<PostingRequest, Error> {
    let (account_id, transaction_type, category, date) = match (
        request.account_id,
        request.transaction_type,
        request.category,
        request.date,
    ) {
        (Some(account_id), Some(transaction_type), Some(category), Some(date))
            if !request.amount.is_null()
                && !transaction_type.is_empty()
                && !category.is_empty()
                && !date.is_empty() =>
        {
            (account_id, transaction_type, category, date)
        }
        _ => {
            return Err(Error::MissingFields(
                "accountId, amount, type, category, and date",
            ));
        }
    };

    let amount = decimal_from_json(&request.amount, "Amount")?;
    let transaction_type = transaction_type.parse()?;

    Ok(PostingRequest {
        account_id,
        amount,
        transaction_type,
        category,
        description: request.description,
        date,
        idempotency_key,
    })
}

/// A route handler for posting a transaction.
///
/// Responds with 201 and the new transaction and account balance on success.
/// A retry with the same `Idempotency-Key` responds with 200 and the original
/// transaction.
pub async fn create_transaction_endpoint(
    State(state): State<CreateTransactionState>,
    Extension(user_id): Extension<UserId>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<CreateTransactionRequest>,
) -> Result<Response, Error> {
    let idempotency_key = parse_idempotency_key(&headers)?;
    let posting_request = parse_posting_request(request, idempotency_key)?;

    let mut connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let posting = post_transaction(user_id, posting_request, &mut connection)?;

    let status = if posting.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(json!({
            "transaction": posting.transaction,
            "accountBalance": posting.balance,
        })),
    )
        .into_response())
}

#[cfg(test)]
mod create_transaction_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};

    use crate::{
        account::{Account, create_test_account, get_account},
        auth::{User, create_test_user},
        db::initialize,
    };

    use super::{CreateTransactionState, IDEMPOTENCY_KEY_HEADER, create_transaction_endpoint};

    struct Fixture {
        server: TestServer,
        user: User,
        account: Account,
        foreign_account: Account,
        db_connection: Arc<Mutex<Connection>>,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_test_user("foo@bar.baz", &connection);
        let other = create_test_user("bar@baz.qux", &connection);
        let account = create_test_account(user.id, dec!(0), &connection);
        let foreign_account = create_test_account(other.id, dec!(0), &connection);
        let db_connection = Arc::new(Mutex::new(connection));

        let app = Router::new()
            .route("/transactions", post(create_transaction_endpoint))
            .layer(Extension(user.id))
            .with_state(CreateTransactionState {
                db_connection: db_connection.clone(),
            });

        Fixture {
            server: TestServer::try_new(app).expect("Could not create test server."),
            user,
            account,
            foreign_account,
            db_connection,
        }
    }

    fn count_transactions(fixture: &Fixture) -> i64 {
        fixture
            .db_connection
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM \"transaction\"", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn posts_expense_and_returns_new_balance() {
        let fixture = get_fixture();

        let response = fixture
            .server
            .post("/transactions")
            .json(&json!({
                "accountId": fixture.account.id,
                "amount": 25.50,
                "type": "expense",
                "category": "groceries",
                "date": "2024-01-15",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["transaction"]["amount"], "-25.5");
        assert_eq!(body["transaction"]["type"], "expense");
        assert_eq!(body["transaction"]["date"], "2024-01-15");
        assert_eq!(body["transaction"]["accountId"], fixture.account.id);
        assert_eq!(body["transaction"]["description"], Value::Null);
        assert_eq!(body["accountBalance"], "-25.5");

        let account = get_account(
            fixture.account.id,
            fixture.user.id,
            &fixture.db_connection.lock().unwrap(),
        )
        .unwrap();
        assert_eq!(account.balance, dec!(-25.50));
    }

    #[tokio::test]
    async fn rejects_missing_fields() {
        let fixture = get_fixture();

        let response = fixture
            .server
            .post("/transactions")
            .json(&json!({ "accountId": fixture.account.id, "amount": 10 }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(
            &json!({ "error": "accountId, amount, type, category, and date are required" }),
        );
    }

    #[tokio::test]
    async fn rejects_string_amount() {
        let fixture = get_fixture();

        let response = fixture
            .server
            .post("/transactions")
            .json(&json!({
                "accountId": fixture.account.id,
                "amount": "10",
                "type": "income",
                "category": "salary",
                "date": "2024-01-15",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Amount must be a number" }));
        assert_eq!(count_transactions(&fixture), 0);
    }

    #[tokio::test]
    async fn rejects_zero_amount() {
        let fixture = get_fixture();

        let response = fixture
            .server
            .post("/transactions")
            .json(&json!({
                "accountId": fixture.account.id,
                "amount": 0,
                "type": "refund",
                "category": "shoes",
                "date": "2024-01-15",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Amount cannot be 0" }));
        assert_eq!(count_transactions(&fixture), 0);
    }

    #[tokio::test]
    async fn rejects_unknown_type() {
        let fixture = get_fixture();

        fixture
            .server
            .post("/transactions")
            .json(&json!({
                "accountId": fixture.account.id,
                "amount": 10,
                "type": "gift",
                "category": "birthday",
                "date": "2024-01-15",
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(count_transactions(&fixture), 0);
    }

    #[tokio::test]
    async fn rejects_malformed_date() {
        let fixture = get_fixture();

        let response = fixture
            .server
            .post("/transactions")
            .json(&json!({
                "accountId": fixture.account.id,
                "amount": 10,
                "type": "income",
                "category": "salary",
                "date": "2024-13-40",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Date \"2024-13-40\" must be in YYYY-MM-DD format" }));
        assert_eq!(count_transactions(&fixture), 0);
    }

    #[tokio::test]
    async fn other_users_account_is_not_found() {
        let fixture = get_fixture();

        let response = fixture
            .server
            .post("/transactions")
            .json(&json!({
                "accountId": fixture.foreign_account.id,
                "amount": 10,
                "type": "expense",
                "category": "theft",
                "date": "2024-01-15",
            }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": "Account not found" }));
        assert_eq!(count_transactions(&fixture), 0);
    }

    #[tokio::test]
    async fn retry_with_idempotency_key_is_replayed() {
        let fixture = get_fixture();
        let body = json!({
            "accountId": fixture.account.id,
            "amount": 100,
            "type": "income",
            "category": "salary",
            "date": "2024-01-15",
        });

        let first = fixture
            .server
            .post("/transactions")
            .add_header(IDEMPOTENCY_KEY_HEADER, "payday-2024-01")
            .json(&body)
            .await;
        let second = fixture
            .server
            .post("/transactions")
            .add_header(IDEMPOTENCY_KEY_HEADER, "payday-2024-01")
            .json(&body)
            .await;

        first.assert_status(StatusCode::CREATED);
        second.assert_status_ok();
        assert_eq!(
            first.json::<Value>()["transaction"],
            second.json::<Value>()["transaction"]
        );
        assert_eq!(second.json::<Value>()["accountBalance"], "100");
        assert_eq!(count_transactions(&fixture), 1);
    }

    #[tokio::test]
    async fn reused_idempotency_key_is_a_conflict() {
        let fixture = get_fixture();

        fixture
            .server
            .post("/transactions")
            .add_header(IDEMPOTENCY_KEY_HEADER, "key")
            .json(&json!({
                "accountId": fixture.account.id,
                "amount": 100,
                "type": "income",
                "category": "salary",
                "date": "2024-01-15",
            }))
            .await
            .assert_status(StatusCode::CREATED);
        let response = fixture
            .server
            .post("/transactions")
            .add_header(IDEMPOTENCY_KEY_HEADER, "key")
            .json(&json!({
                "accountId": fixture.account.id,
                "amount": 5,
                "type": "expense",
                "category": "coffee",
                "date": "2024-01-15",
            }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        response.assert_json(&json!({
            "error": "Idempotency key was already used for a different transaction"
        }));
        assert_eq!(count_transactions(&fixture), 1);
    }

    #[tokio::test]
    async fn long_amount_is_posted_without_rounding() {
        let fixture = get_fixture();
        let body: Value = serde_json::from_str(&format!(
            r#"{{
                "accountId": {},
                "amount": 1234567890123456.78,
                "type": "expense",
                "category": "house",
                "date": "2024-01-15"
            }}"#,
            fixture.account.id
        ))
        .unwrap();

        let response = fixture.server.post("/transactions").json(&body).await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["transaction"]["amount"], "-1234567890123456.78");
        assert_eq!(body["accountBalance"], "-1234567890123456.78");
    }

    #[tokio::test]
    async fn rejects_blank_idempotency_key() {
        let fixture = get_fixture();

        fixture
            .server
            .post("/transactions")
            .add_header(IDEMPOTENCY_KEY_HEADER, " ")
            .json(&json!({
                "accountId": fixture.account.id,
                "amount": 100,
                "type": "income",
                "category": "salary",
                "date": "2024-01-15",
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(count_transactions(&fixture), 0);
    }
}
