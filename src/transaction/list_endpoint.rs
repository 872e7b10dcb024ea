//! Defines the endpoint for browsing transaction history.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    auth::UserId,
    datetime_format::parse_date,
    extract::ApiQuery,
    pagination::{Pagination, PaginationConfig},
    transaction::{TransactionFilter, query_transactions},
};

/// The state needed to list transactions.
#[derive(Debug, Clone)]
pub struct ListTransactionsState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The default and maximum page sizes.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ListTransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query string accepted by the transaction list.
///
/// Values are kept as text so that empty parameters can be ignored and bad
/// values reported with a clear message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    /// The number of transactions to skip.
    pub offset: Option<String>,
    /// The page size.
    pub limit: Option<String>,
    /// Only transactions posted to this account.
    pub account_id: Option<String>,
    /// Only transactions with this category.
    pub category: Option<String>,
    /// Only transactions of this type.
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// The earliest date to include, YYYY-MM-DD.
    pub start_date: Option<String>,
    /// The latest date to include, YYYY-MM-DD.
    pub end_date: Option<String>,
}

/// Drop empty query parameters, e.g. `?category=`.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn parse_count(value: Option<String>, name: &str) -> Result<Option<u64>, Error> {
    non_empty(value)
        .map(|value| {
            value.parse::<u64>().map_err(|_| {
                Error::InvalidRequest(format!("{name} must be a non-negative integer"))
            })
        })
        .transpose()
}

fn parse_filter(query: TransactionQuery) -> Result<TransactionFilter, Error> {
    let account_id = non_empty(query.account_id)
        .map(|value| {
            value
                .parse()
                .map_err(|_| Error::InvalidRequest("accountId must be an integer".to_owned()))
        })
        .transpose()?;

    let transaction_type = non_empty(query.transaction_type)
        .map(|value| value.parse())
        .transpose()?;

    let start_date = non_empty(query.start_date)
        .map(|value| parse_date(&value))
        .transpose()?;
    let end_date = non_empty(query.end_date)
        .map(|value| parse_date(&value))
        .transpose()?;

    Ok(TransactionFilter {
        account_id,
        category: non_empty(query.category),
        transaction_type,
        start_date,
        end_date,
    })
}

/// A route handler that returns one page of the user's transactions, newest first.
pub async fn list_transactions_endpoint(
    State(state): State<ListTransactionsState>,
    Extension(user_id): Extension<UserId>,
    ApiQuery(mut query): ApiQuery<TransactionQuery>,
) -> Result<Json<Value>, Error> {
    let offset = parse_count(query.offset.take(), "offset")?;
    let limit = parse_count(query.limit.take(), "limit")?;
    let page = state.pagination_config.page_request(offset, limit);
    let filter = parse_filter(query)?;

    let connection = state
        .db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;
    let (transactions, total) = query_transactions(user_id, &filter, page, &connection)?;

    Ok(Json(json!({
        "transactions": transactions,
        "pagination": Pagination::new(page, total),
    })))
}
