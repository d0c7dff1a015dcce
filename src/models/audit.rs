//! Audit trail entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Default and maximum number of entries returned by an audit query
pub const AUDIT_DEFAULT_LIMIT: i64 = 100;
pub const AUDIT_MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Read => "READ",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

/// Entity names recorded in the audit trail
pub mod entity {
    pub const LOAN: &str = "Loan";
    pub const UNIT: &str = "Unit";
    pub const REPORT: &str = "Report";
    pub const AUDIT_LOG: &str = "AuditLog";
}

/// Entry to append; the sink stamps id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub actor_id: i64,
    pub action: AuditAction,
    pub entity: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditEntry {
    #[serde(rename = "id_bitacora")]
    pub id: i64,
    #[serde(rename = "usuario_id")]
    pub actor_id: i64,
    #[serde(rename = "accion")]
    pub action: String,
    #[serde(rename = "entidad")]
    pub entity: String,
    #[serde(rename = "detalle")]
    pub detail: String,
    #[serde(rename = "fecha_hora")]
    pub created_at: DateTime<Utc>,
}

/// Audit log query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AuditQuery {
    /// Only entries for this entity
    pub entidad: Option<String>,
    /// Maximum entries (default 100, at most 1000)
    pub limit: Option<i64>,
}

impl AuditQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(AUDIT_DEFAULT_LIMIT)
            .clamp(1, AUDIT_MAX_LIMIT)
    }

    pub fn entity_filter(&self) -> Option<String> {
        self.entidad
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
