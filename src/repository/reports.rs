//! Reporting aggregates on PostgreSQL

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::report::{BorrowerActivity, LendingTotals, TitlePopularity},
};

/// Borrowers ranked by number of loans
pub async fn borrower_activity(pool: &Pool<Postgres>, limit: i64) -> AppResult<Vec<BorrowerActivity>> {
    let rows = sqlx::query_as::<_, BorrowerActivity>(
        r#"
        SELECT borrower_id,
               COUNT(*) AS total_loans,
               COUNT(*) FILTER (WHERE status = 'ACTIVE') AS active_loans,
               COUNT(*) FILTER (WHERE status = 'RETURNED') AS returned_loans
        FROM loans
        GROUP BY borrower_id
        ORDER BY total_loans DESC, borrower_id ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Titles ranked by number of loans across their units
pub async fn title_popularity(pool: &Pool<Postgres>, limit: i64) -> AppResult<Vec<TitlePopularity>> {
    let rows = sqlx::query_as::<_, TitlePopularity>(
        r#"
        SELECT t.isbn, t.title, t.author,
               COUNT(*) AS total_loans,
               COUNT(*) FILTER (WHERE l.status = 'ACTIVE') AS active_loans
        FROM loans l
        JOIN units u ON u.id = l.unit_id
        JOIN titles t ON t.isbn = u.title_isbn
        GROUP BY t.isbn, t.title, t.author
        ORDER BY total_loans DESC, t.isbn ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// System-wide counters in one round trip
pub async fn lending_totals(pool: &Pool<Postgres>, now: DateTime<Utc>) -> AppResult<LendingTotals> {
    let totals = sqlx::query_as::<_, LendingTotals>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM titles) AS titles,
            (SELECT COUNT(*) FROM units) AS units,
            (SELECT COUNT(*) FROM loans WHERE status = 'ACTIVE') AS active_loans,
            (SELECT COUNT(*) FROM loans WHERE status = 'RETURNED') AS returned_loans,
            (SELECT COUNT(*) FROM loans WHERE status = 'ACTIVE' AND due_date < $1) AS overdue_loans
        "#,
    )
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(totals)
}
