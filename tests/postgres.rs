//! Storage tests against PostgreSQL
//!
//! Each test gets a fresh database with the migrations applied.
//! Run with: DATABASE_URL=postgres://... cargo test --test postgres -- --ignored

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio_test::{assert_err, assert_ok};

use prestamos_server::{
    config::LendingConfig,
    error::AppError,
    models::{loan::LoanStatus, title::Title, unit::UnitStatus},
    repository::{postgres::PgLendingStore, CopyPool, LendingStore, LendingTx, LoanLedger, Repository},
    services::Services,
};

fn title(isbn: &str) -> Title {
    Title {
        isbn: isbn.to_string(),
        title: "La tregua".to_string(),
        author: Some("Mario Benedetti".to_string()),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn losing_allocation_is_a_conflict(pool: PgPool) {
    let store = PgLendingStore::new(pool);
    let units = store.add_stock(&title("X"), 1).await.unwrap();
    let unit_id = units[0].id;

    let mut first = store.begin().await.unwrap();
    let mut second = store.begin().await.unwrap();
    assert_eq!(first.find_available_unit("X", &[]).await.unwrap(), Some(unit_id));
    assert_eq!(second.find_available_unit("X", &[]).await.unwrap(), Some(unit_id));

    let loan = first.open(1, unit_id, Utc::now()).await.unwrap();
    first.allocate(unit_id, loan.id).await.unwrap();
    first.commit().await.unwrap();

    let err = second.allocate(unit_id, loan.id + 1).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    drop(second);

    let unit = store.get_unit(unit_id).await.unwrap();
    assert_eq!(unit.status, UnitStatus::Loaned);
    assert_eq!(unit.loan_id, Some(loan.id));
    assert_eq!(store.count_available("X").await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn second_active_loan_on_a_unit_is_a_conflict(pool: PgPool) {
    let store = PgLendingStore::new(pool);
    let units = store.add_stock(&title("X"), 1).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.open(1, units[0].id, Utc::now()).await.unwrap();
    let err = tx.open(2, units[0].id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
    drop(tx);

    assert!(store.list_loans().await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn release_and_withdraw_check_unit_status(pool: PgPool) {
    let store = PgLendingStore::new(pool);
    let units = store.add_stock(&title("X"), 2).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let err = tx.release(units[0].id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)), "{err:?}");
    drop(tx);

    let withdrawn = store.withdraw_unit(units[1].id).await.unwrap();
    assert_eq!(withdrawn.status, UnitStatus::Withdrawn);
    assert!(matches!(
        store.withdraw_unit(units[1].id).await,
        Err(AppError::InvalidState(_))
    ));
    assert!(matches!(store.withdraw_unit(9999).await, Err(AppError::NotFound(_))));
    assert_eq!(store.count_units("X").await.unwrap(), 1);
    assert_eq!(store.count_available("X").await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn borrow_and_return_through_services(pool: PgPool) {
    let repository = Repository::new(pool);
    repository.lending.add_stock(&title("X"), 1).await.unwrap();
    let services = Services::new(repository.clone(), &LendingConfig::default());

    let loan = assert_ok!(services.loans.create_loan(7, "X").await);
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.due_date - loan.loan_date, Duration::days(15));
    assert!(matches!(
        services.loans.create_loan(8, "X").await,
        Err(AppError::NoCopiesAvailable(_))
    ));

    assert!(matches!(
        services.loans.return_loan(loan.id, 8).await,
        Err(AppError::NotLoanOwner(_))
    ));
    assert_eq!(repository.lending.get_loan(loan.id).await.unwrap().status, LoanStatus::Active);

    let returned = assert_ok!(services.loans.return_loan(loan.id, 7).await);
    assert_eq!(returned.status, LoanStatus::Returned);
    assert!(returned.return_date.is_some());
    assert!(matches!(
        services.loans.return_loan(loan.id, 7).await,
        Err(AppError::AlreadyReturned(_))
    ));
    assert_err!(services.loans.return_loan(9999, 7).await);

    let unit = repository.lending.get_unit(loan.unit_id).await.unwrap();
    assert_eq!(unit.status, UnitStatus::Available);
    assert_eq!(unit.loan_id, None);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn concurrent_borrowers_share_one_unit(pool: PgPool) {
    let repository = Repository::new(pool);
    repository.lending.add_stock(&title("X"), 1).await.unwrap();
    let services = Services::new(repository.clone(), &LendingConfig::default());

    let (a, b) = tokio::join!(
        services.loans.create_loan(1, "X"),
        services.loans.create_loan(2, "X"),
    );
    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "{a:?} {b:?}");
    assert_eq!(repository.lending.list_active_loans().await.unwrap().len(), 1);
    assert_eq!(repository.lending.count_available("X").await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn report_aggregates(pool: PgPool) {
    let store = PgLendingStore::new(pool);
    let x = store.add_stock(&title("X"), 2).await.unwrap();
    let y = store.add_stock(&title("Y"), 1).await.unwrap();
    let now = Utc::now();

    let mut tx = store.begin().await.unwrap();
    let old = tx.open(5, x[0].id, now - Duration::days(20)).await.unwrap();
    tx.allocate(x[0].id, old.id).await.unwrap();
    let other = tx.open(5, y[0].id, now).await.unwrap();
    tx.allocate(y[0].id, other.id).await.unwrap();
    let closed = tx.open(3, x[1].id, now).await.unwrap();
    tx.close(closed.id, 3, now).await.unwrap();
    tx.commit().await.unwrap();

    let borrowers = store.borrower_activity(10).await.unwrap();
    assert_eq!(borrowers.len(), 2);
    assert_eq!((borrowers[0].borrower_id, borrowers[0].total_loans, borrowers[0].active_loans), (5, 2, 2));
    assert_eq!((borrowers[1].borrower_id, borrowers[1].returned_loans), (3, 1));

    let titles = store.title_popularity(1).await.unwrap();
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0].isbn, "X");
    assert_eq!(titles[0].total_loans, 2);
    assert_eq!(titles[0].active_loans, 1);

    let totals = store.lending_totals(now).await.unwrap();
    assert_eq!(totals.titles, 2);
    assert_eq!(totals.units, 3);
    assert_eq!(totals.active_loans, 2);
    assert_eq!(totals.returned_loans, 1);
    assert_eq!(totals.overdue_loans, 1);
}
