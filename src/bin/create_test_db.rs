use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use rust_decimal::Decimal;

use pocketbook::{
    AccountType, Currency, NewAccount, NewUser, PasswordHash, PostingRequest, TransactionType,
    ValidatedPassword, create_account, create_user, initialize_db, post_transaction,
    reconcile_account,
};

/// A utility for creating a test database for the REST API server of pocketbook.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
///
/// The database contains the user "test@example.com" with the password
/// "testpassword", one checking account and a few postings.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    if output_path
        .extension()
        .is_none_or(|extension| extension.is_empty())
    {
        eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
        exit(1);
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let mut conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test user...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("testpassword"),
        PasswordHash::DEFAULT_COST,
    )?;

    let user = create_user(
        NewUser {
            email: "test@example.com".to_owned(),
            password_hash,
            name: "Test User".to_owned(),
            currency: Currency::Usd,
            timezone: "America/Los_Angeles".to_owned(),
        },
        &conn,
    )?;

    println!("Creating test account...");

    let account = create_account(
        user.id,
        NewAccount {
            name: "Everyday".to_owned(),
            account_type: AccountType::Checking,
            opening_balance: Decimal::new(10000, 2),
            currency: Currency::Usd,
        },
        &conn,
    )?;

    println!("Posting test transactions...");

    let postings = [
        (TransactionType::Income, Decimal::new(250000, 2), "salary", "2024-01-01"),
        (TransactionType::Expense, Decimal::new(2550, 2), "groceries", "2024-01-15"),
        (TransactionType::Expense, Decimal::new(120000, 2), "rent", "2024-01-16"),
        (TransactionType::Refund, Decimal::new(1999, 2), "shopping", "2024-01-20"),
    ];

    for (transaction_type, amount, category, date) in postings {
        post_transaction(
            user.id,
            PostingRequest {
                account_id: account.id,
                amount,
                transaction_type,
                category: category.to_owned(),
                description: None,
                date: date.to_owned(),
                idempotency_key: None,
            },
            &mut conn,
        )?;
    }

    let reconciliation = reconcile_account(account.id, user.id, &conn)?;
    println!(
        "Account balance is {} ({} transactions)",
        reconciliation.stored_balance, reconciliation.transaction_count
    );

    println!("Success!");

    Ok(())
}
