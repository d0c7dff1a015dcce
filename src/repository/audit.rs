//! Audit entries repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::AuditSink;
use crate::{
    error::AppResult,
    models::audit::{AuditEntry, NewAuditEntry},
};

#[derive(Clone)]
pub struct PgAuditSink {
    pool: Pool<Postgres>,
}

impl PgAuditSink {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: NewAuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (actor_id, action, entity, detail, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(&entry.entity)
        .bind(&entry.detail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, entity: Option<String>, limit: i64) -> AppResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, actor_id, action, entity, detail, created_at
            FROM audit_entries
            WHERE ($1::text IS NULL OR entity = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(entity)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
