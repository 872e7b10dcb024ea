//! Database queries for filtered, paginated transaction history.

use rusqlite::{Connection, params_from_iter, types::Value};
use time::Date;

use crate::{
    Error,
    account::AccountId,
    auth::UserId,
    pagination::PageRequest,
    transaction::{TRANSACTION_COLUMNS, Transaction, TransactionType, map_transaction_row},
};

/// Narrows down which of a user's transactions a query returns.
///
/// Every field is optional and the set fields are combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// Only transactions posted to this account.
    pub account_id: Option<AccountId>,
    /// Only transactions with exactly this category.
    pub category: Option<String>,
    /// Only transactions of this type.
    pub transaction_type: Option<TransactionType>,
    /// Only transactions on or after this date.
    pub start_date: Option<Date>,
    /// Only transactions on or before this date.
    pub end_date: Option<Date>,
}

impl TransactionFilter {
    /// Build the WHERE clause and its parameters for `user_id`.
    fn where_clause(&self, user_id: UserId) -> (String, Vec<Value>) {
        let mut conditions = vec!["user_id = ?"];
        let mut params = vec![Value::Integer(user_id.as_i64())];

        if let Some(account_id) = self.account_id {
            conditions.push("account_id = ?");
            params.push(Value::Integer(account_id));
        }

        if let Some(category) = &self.category {
            conditions.push("category = ?");
            params.push(Value::Text(category.clone()));
        }

        if let Some(transaction_type) = self.transaction_type {
            conditions.push("type = ?");
            params.push(Value::Text(transaction_type.as_str().to_owned()));
        }

        if let Some(start_date) = self.start_date {
            conditions.push("date >= ?");
            params.push(Value::Text(start_date.to_string()));
        }

        if let Some(end_date) = self.end_date {
            conditions.push("date <= ?");
            params.push(Value::Text(end_date.to_string()));
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }
}

/// Get one page of `user_id`'s transactions matching `filter`, newest first,
/// along with the number of matching transactions across all pages.
///
/// Transactions are ordered by date, then by when they were recorded, then
/// by ID, all descending.
///
/// # Errors
/// Returns [Error::SqlError] if:
/// - SQL query preparation or execution fails
/// - Transaction row mapping fails
pub fn query_transactions(
    user_id: UserId,
    filter: &TransactionFilter,
    page: PageRequest,
    connection: &Connection,
) -> Result<(Vec<Transaction>, u64), Error> {
    let (where_clause, params) = filter.where_clause(user_id);

    let total: i64 = connection.query_row(
        &format!("SELECT COUNT(*) FROM \"transaction\" {where_clause}"),
        params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    let mut page_params = params;
    page_params.push(Value::Integer(clamp_to_i64(page.limit)));
    page_params.push(Value::Integer(clamp_to_i64(page.offset)));

    let transactions = connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" {where_clause}
             ORDER BY date DESC, created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))?
        .query_map(params_from_iter(page_params.iter()), map_transaction_row)?
        .collect::<Result<Vec<Transaction>, rusqlite::Error>>()?;

    Ok((transactions, total.max(0) as u64))
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        account::{AccountId, create_test_account},
        auth::{User, create_test_user},
        db::initialize,
        pagination::PageRequest,
        transaction::{PostingRequest, TransactionType, post_transaction},
    };

    use super::{TransactionFilter, query_transactions};

    const ALL: PageRequest = PageRequest {
        offset: 0,
        limit: 100,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn post(
        user: &User,
        account_id: AccountId,
        transaction_type: TransactionType,
        category: &str,
        date: &str,
        conn: &mut Connection,
    ) -> i64 {
        post_transaction(
            user.id,
            PostingRequest {
                account_id,
                amount: dec!(10),
                transaction_type,
                category: category.to_owned(),
                description: None,
                date: date.to_owned(),
                idempotency_key: None,
            },
            conn,
        )
        .unwrap()
        .transaction
        .id
    }

    #[test]
    fn returns_only_own_transactions_newest_first() {
        let mut conn = get_test_connection();
        let user = create_test_user("foo@bar.baz", &conn);
        let other = create_test_user("bar@baz.qux", &conn);
        let account = create_test_account(user.id, dec!(0), &conn);
        let other_account = create_test_account(other.id, dec!(0), &conn);

        let older = post(&user, account.id, TransactionType::Income, "a", "2024-01-01", &mut conn);
        let newer = post(&user, account.id, TransactionType::Income, "a", "2024-02-01", &mut conn);
        let same_day = post(&user, account.id, TransactionType::Income, "a", "2024-02-01", &mut conn);
        post(&other, other_account.id, TransactionType::Income, "a", "2024-03-01", &mut conn);

        let (transactions, total) =
            query_transactions(user.id, &TransactionFilter::default(), ALL, &conn).unwrap();

        let ids: Vec<_> = transactions.iter().map(|transaction| transaction.id).collect();
        assert_eq!(ids, vec![same_day, newer, older]);
        assert_eq!(total, 3);
    }

    #[test]
    fn filters_by_account_category_and_type() {
        let mut conn = get_test_connection();
        let user = create_test_user("foo@bar.baz", &conn);
        let everyday = create_test_account(user.id, dec!(0), &conn);
        let savings = create_test_account(user.id, dec!(0), &conn);

        let want = post(&user, everyday.id, TransactionType::Expense, "food", "2024-01-01", &mut conn);
        post(&user, savings.id, TransactionType::Expense, "food", "2024-01-01", &mut conn);
        post(&user, everyday.id, TransactionType::Income, "food", "2024-01-01", &mut conn);
        post(&user, everyday.id, TransactionType::Expense, "rent", "2024-01-01", &mut conn);

        let filter = TransactionFilter {
            account_id: Some(everyday.id),
            category: Some("food".to_owned()),
            transaction_type: Some(TransactionType::Expense),
            ..Default::default()
        };
        let (transactions, total) = query_transactions(user.id, &filter, ALL, &conn).unwrap();

        assert_eq!(total, 1);
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].id, want);
    }

    #[test]
    fn date_range_is_inclusive() {
        let mut conn = get_test_connection();
        let user = create_test_user("foo@bar.baz", &conn);
        let account = create_test_account(user.id, dec!(0), &conn);

        post(&user, account.id, TransactionType::Income, "a", "2023-12-31", &mut conn);
        let start = post(&user, account.id, TransactionType::Income, "a", "2024-01-01", &mut conn);
        let end = post(&user, account.id, TransactionType::Income, "a", "2024-01-31", &mut conn);
        post(&user, account.id, TransactionType::Income, "a", "2024-02-01", &mut conn);

        let filter = TransactionFilter {
            start_date: Some(date!(2024 - 01 - 01)),
            end_date: Some(date!(2024 - 01 - 31)),
            ..Default::default()
        };
        let (transactions, total) = query_transactions(user.id, &filter, ALL, &conn).unwrap();

        let ids: Vec<_> = transactions.iter().map(|transaction| transaction.id).collect();
        assert_eq!(ids, vec![end, start]);
        assert_eq!(total, 2);
    }

    #[test]
    fn pages_through_results() {
        let mut conn = get_test_connection();
        let user = create_test_user("foo@bar.baz", &conn);
        let account = create_test_account(user.id, dec!(0), &conn);
        let ids: Vec<_> = (1..=5)
            .map(|day| {
                post(
                    &user,
                    account.id,
                    TransactionType::Income,
                    "a",
                    &format!("2024-01-0{day}"),
                    &mut conn,
                )
            })
            .collect();

        let (transactions, total) = query_transactions(
            user.id,
            &TransactionFilter::default(),
            PageRequest {
                offset: 2,
                limit: 2,
            },
            &conn,
        )
        .unwrap();

        let got: Vec<_> = transactions.iter().map(|transaction| transaction.id).collect();
        assert_eq!(got, vec![ids[2], ids[1]]);
        assert_eq!(total, 5);
    }

    #[test]
    fn offset_past_end_returns_empty_page() {
        let mut conn = get_test_connection();
        let user = create_test_user("foo@bar.baz", &conn);
        let account = create_test_account(user.id, dec!(0), &conn);
        post(&user, account.id, TransactionType::Income, "a", "2024-01-01", &mut conn);

        let (transactions, total) = query_transactions(
            user.id,
            &TransactionFilter::default(),
            PageRequest {
                offset: 10,
                limit: 20,
            },
            &conn,
        )
        .unwrap();

        assert!(transactions.is_empty());
        assert_eq!(total, 1);
    }
}
