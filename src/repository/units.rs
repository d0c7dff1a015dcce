//! Units repository: the copy pool on PostgreSQL

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{postgres::PgLendingTx, CopyPool};
use crate::{
    error::{AppError, AppResult},
    models::{title::Title, unit::Unit},
};

#[async_trait]
impl CopyPool for PgLendingTx {
    async fn find_available_unit(&mut self, title_isbn: &str, exclude: &[i64]) -> AppResult<Option<i64>> {
        let conn = self.conn()?;
        let unit_id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM units
            WHERE title_isbn = $1 AND status = 'AVAILABLE' AND NOT (id = ANY($2))
            LIMIT 1
            "#,
        )
        .bind(title_isbn)
        .bind(exclude.to_vec())
        .fetch_optional(conn)
        .await?;
        Ok(unit_id)
    }

    async fn allocate(&mut self, unit_id: i64, loan_id: i64) -> AppResult<()> {
        let conn = self.conn()?;
        // The conditional update is the source of truth, not the earlier read
        let result = sqlx::query(
            "UPDATE units SET status = 'LOANED', loan_id = $1 WHERE id = $2 AND status = 'AVAILABLE'",
        )
        .bind(loan_id)
        .bind(unit_id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!("Unit {} is no longer available", unit_id)));
        }
        Ok(())
    }

    async fn release(&mut self, unit_id: i64) -> AppResult<()> {
        let conn = self.conn()?;
        let result = sqlx::query(
            "UPDATE units SET status = 'AVAILABLE', loan_id = NULL WHERE id = $1 AND status = 'LOANED'",
        )
        .bind(unit_id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidState(format!("Unit {} is not on loan", unit_id)));
        }
        Ok(())
    }
}

/// Count available units of a title
pub async fn count_available(pool: &Pool<Postgres>, title_isbn: &str) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM units WHERE title_isbn = $1 AND status = 'AVAILABLE'",
    )
    .bind(title_isbn)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Count units of a title that are not withdrawn
pub async fn count_units(pool: &Pool<Postgres>, title_isbn: &str) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM units WHERE title_isbn = $1 AND status <> 'WITHDRAWN'",
    )
    .bind(title_isbn)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Get unit by ID
pub async fn get_by_id(pool: &Pool<Postgres>, unit_id: i64) -> AppResult<Unit> {
    sqlx::query_as::<_, Unit>("SELECT id, title_isbn, status, loan_id FROM units WHERE id = $1")
        .bind(unit_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Unit with id {} not found", unit_id)))
}

/// Register the title if needed and create `quantity` available units
pub async fn add_stock(pool: &Pool<Postgres>, title: &Title, quantity: u32) -> AppResult<Vec<Unit>> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO titles (isbn, title, author) VALUES ($1, $2, $3) ON CONFLICT (isbn) DO NOTHING",
    )
    .bind(&title.isbn)
    .bind(&title.title)
    .bind(&title.author)
    .execute(&mut *tx)
    .await?;

    let quantity = i32::try_from(quantity)
        .map_err(|_| AppError::Validation(format!("Quantity {} is too large", quantity)))?;

    let units = sqlx::query_as::<_, Unit>(
        r#"
        INSERT INTO units (title_isbn, status)
        SELECT $1, 'AVAILABLE' FROM generate_series(1, $2)
        RETURNING id, title_isbn, status, loan_id
        "#,
    )
    .bind(&title.isbn)
    .bind(quantity)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(units)
}

/// Withdraw an available unit
pub async fn withdraw(pool: &Pool<Postgres>, unit_id: i64) -> AppResult<Unit> {
    let withdrawn = sqlx::query_as::<_, Unit>(
        r#"
        UPDATE units SET status = 'WITHDRAWN'
        WHERE id = $1 AND status = 'AVAILABLE'
        RETURNING id, title_isbn, status, loan_id
        "#,
    )
    .bind(unit_id)
    .fetch_optional(pool)
    .await?;

    match withdrawn {
        Some(unit) => Ok(unit),
        None => {
            let current = get_by_id(pool, unit_id).await?;
            Err(AppError::InvalidState(format!(
                "Unit {} cannot be withdrawn while {}",
                unit_id, current.status
            )))
        }
    }
}
