//! Audit trail service

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::audit::{AuditAction, AuditEntry, AuditQuery, NewAuditEntry},
    repository::AuditSink,
};

#[derive(Clone)]
pub struct AuditService {
    sink: Arc<dyn AuditSink>,
}

impl AuditService {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record an action. Failures are logged and never reach the caller.
    pub async fn record(&self, actor_id: i64, action: AuditAction, entity: &str, detail: impl Into<String>) {
        let entry = NewAuditEntry {
            actor_id,
            action,
            entity: entity.to_string(),
            detail: detail.into(),
        };

        if let Err(e) = self.sink.append(entry).await {
            tracing::warn!(
                actor_id,
                action = action.as_str(),
                entity,
                error = %e,
                "Failed to write audit entry"
            );
        }
    }

    /// Read the audit log, newest first
    pub async fn list(&self, query: &AuditQuery) -> AppResult<Vec<AuditEntry>> {
        self.sink
            .list(query.entity_filter(), query.effective_limit())
            .await
    }
}
