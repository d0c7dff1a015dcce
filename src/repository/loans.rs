//! Loans repository: the loan ledger on PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use super::{postgres::PgLendingTx, LoanLedger};
use crate::{
    error::{AppError, AppResult},
    models::loan::{ActiveLoan, Loan, LoanStatus},
};

/// Partial unique index: one ACTIVE loan per unit
const ONE_ACTIVE_LOAN_PER_UNIT: &str = "loans_one_active_per_unit";

#[async_trait]
impl LoanLedger for PgLendingTx {
    async fn open(&mut self, borrower_id: i64, unit_id: i64, now: DateTime<Utc>) -> AppResult<Loan> {
        let conn = self.conn()?;
        sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (borrower_id, unit_id, loan_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, borrower_id, unit_id, loan_date, due_date, return_date, status
            "#,
        )
        .bind(borrower_id)
        .bind(unit_id)
        .bind(now)
        .bind(Loan::due_date_for(now))
        .bind(LoanStatus::Active)
        .fetch_one(conn)
        .await
        .map_err(|e| active_loan_conflict(e, unit_id))
    }

    async fn close(&mut self, loan_id: i64, borrower_id: i64, now: DateTime<Utc>) -> AppResult<Loan> {
        let conn = self.conn()?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            SELECT id, borrower_id, unit_id, loan_date, due_date, return_date, status
            FROM loans WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(loan_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::LoanNotFound(loan_id))?;

        loan.check_return_by(borrower_id)?;

        let closed = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET status = $1, return_date = $2
            WHERE id = $3
            RETURNING id, borrower_id, unit_id, loan_date, due_date, return_date, status
            "#,
        )
        .bind(LoanStatus::Returned)
        .bind(now)
        .bind(loan_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(closed)
    }
}

/// A second ACTIVE loan on the same unit loses the race like a failed allocation
fn active_loan_conflict(e: sqlx::Error, unit_id: i64) -> AppError {
    let duplicate = e
        .as_database_error()
        .and_then(|db| db.constraint())
        .map(|c| c == ONE_ACTIVE_LOAN_PER_UNIT)
        .unwrap_or(false);

    if duplicate {
        AppError::Conflict(format!("Unit {} already has an active loan", unit_id))
    } else {
        e.into()
    }
}

/// Get loan by ID
pub async fn get_by_id(pool: &Pool<Postgres>, loan_id: i64) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>(
        "SELECT id, borrower_id, unit_id, loan_date, due_date, return_date, status FROM loans WHERE id = $1",
    )
    .bind(loan_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::LoanNotFound(loan_id))
}

/// Get loans for a borrower, newest first
pub async fn list_by_borrower(pool: &Pool<Postgres>, borrower_id: i64) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(
        r#"
        SELECT id, borrower_id, unit_id, loan_date, due_date, return_date, status
        FROM loans
        WHERE borrower_id = $1
        ORDER BY loan_date DESC, id DESC
        "#,
    )
    .bind(borrower_id)
    .fetch_all(pool)
    .await?;
    Ok(loans)
}

/// Get every loan, newest first
pub async fn list_all(pool: &Pool<Postgres>) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(
        r#"
        SELECT id, borrower_id, unit_id, loan_date, due_date, return_date, status
        FROM loans
        ORDER BY loan_date DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(loans)
}

/// Active loans with the title of their unit, earliest due date first
pub async fn list_active(pool: &Pool<Postgres>) -> AppResult<Vec<ActiveLoan>> {
    let rows = sqlx::query(
        r#"
        SELECT l.id, l.borrower_id, l.unit_id, l.loan_date, l.due_date, l.return_date,
               l.status, u.title_isbn
        FROM loans l
        JOIN units u ON u.id = l.unit_id
        WHERE l.status = 'ACTIVE'
        ORDER BY l.due_date ASC, l.id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        result.push(ActiveLoan {
            loan: Loan {
                id: row.try_get("id")?,
                borrower_id: row.try_get("borrower_id")?,
                unit_id: row.try_get("unit_id")?,
                loan_date: row.try_get("loan_date")?,
                due_date: row.try_get("due_date")?,
                return_date: row.try_get("return_date")?,
                status: row.try_get("status")?,
            },
            title_isbn: row.try_get("title_isbn")?,
        });
    }

    Ok(result)
}
