//! PostgreSQL lending store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, Transaction};

use super::{loans, reports, units, LendingStore, LendingTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{ActiveLoan, Loan},
        report::{BorrowerActivity, LendingTotals, TitlePopularity},
        title::Title,
        unit::Unit,
    },
};

#[derive(Clone)]
pub struct PgLendingStore {
    pool: Pool<Postgres>,
}

impl PgLendingStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Database transaction; rolled back by sqlx when dropped uncommitted
pub struct PgLendingTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgLendingTx {
    pub(super) fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))
    }
}

#[async_trait]
impl LendingTx for PgLendingTx {
    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl LendingStore for PgLendingStore {
    async fn begin(&self) -> AppResult<Box<dyn LendingTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLendingTx { tx: Some(tx) }))
    }

    async fn count_available(&self, title_isbn: &str) -> AppResult<i64> {
        units::count_available(&self.pool, title_isbn).await
    }

    async fn count_units(&self, title_isbn: &str) -> AppResult<i64> {
        units::count_units(&self.pool, title_isbn).await
    }

    async fn get_unit(&self, unit_id: i64) -> AppResult<Unit> {
        units::get_by_id(&self.pool, unit_id).await
    }

    async fn get_loan(&self, loan_id: i64) -> AppResult<Loan> {
        loans::get_by_id(&self.pool, loan_id).await
    }

    async fn list_loans_by_borrower(&self, borrower_id: i64) -> AppResult<Vec<Loan>> {
        loans::list_by_borrower(&self.pool, borrower_id).await
    }

    async fn list_loans(&self) -> AppResult<Vec<Loan>> {
        loans::list_all(&self.pool).await
    }

    async fn list_active_loans(&self) -> AppResult<Vec<ActiveLoan>> {
        loans::list_active(&self.pool).await
    }

    async fn borrower_activity(&self, limit: i64) -> AppResult<Vec<BorrowerActivity>> {
        reports::borrower_activity(&self.pool, limit).await
    }

    async fn title_popularity(&self, limit: i64) -> AppResult<Vec<TitlePopularity>> {
        reports::title_popularity(&self.pool, limit).await
    }

    async fn lending_totals(&self, now: DateTime<Utc>) -> AppResult<LendingTotals> {
        reports::lending_totals(&self.pool, now).await
    }

    async fn get_title(&self, isbn: &str) -> AppResult<Option<Title>> {
        let title = sqlx::query_as::<_, Title>("SELECT isbn, title, author FROM titles WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?;
        Ok(title)
    }

    async fn add_stock(&self, title: &Title, quantity: u32) -> AppResult<Vec<Unit>> {
        units::add_stock(&self.pool, title, quantity).await
    }

    async fn withdraw_unit(&self, unit_id: i64) -> AppResult<Unit> {
        units::withdraw(&self.pool, unit_id).await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
