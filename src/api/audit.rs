//! Audit log endpoint

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::audit::{entity, AuditAction, AuditEntry, AuditQuery},
    AppState,
};

use super::{ApiResponse, AuthenticatedUser, QueryParams};

/// Audit entries, newest first
#[utoipa::path(
    get,
    path = "/admin/bitacora",
    tag = "audit",
    security(("bearer_auth" = [])),
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = Vec<AuditEntry>),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_entries(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    QueryParams(query): QueryParams<AuditQuery>,
) -> AppResult<Json<ApiResponse<Vec<AuditEntry>>>> {
    claims.require_admin()?;

    let entries = state.services.audit.list(&query).await?;
    state
        .services
        .audit
        .record(claims.user_id, AuditAction::Read, entity::AUDIT_LOG, "audit log consulted")
        .await;

    Ok(Json(ApiResponse::ok("Audit entries retrieved", entries)))
}
