//! Report endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::report::ReportQuery,
    services::reports::{ActiveLoansReport, BorrowerActivityReport, LendingStatistics, TitlePopularityReport},
    AppState,
};

use super::{ApiResponse, AuthenticatedUser, QueryParams};

/// Active loans with overdue and due-soon counts, earliest due date first
#[utoipa::path(
    get,
    path = "/admin/reports/prestamos-activos",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active loans report", body = ActiveLoansReport),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn active_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<ActiveLoansReport>>> {
    claims.require_admin()?;

    let report = state.services.reports.active_loans(claims.user_id).await?;
    Ok(Json(ApiResponse::ok("Report generated", report)))
}

/// Borrowers ranked by number of loans
#[utoipa::path(
    get,
    path = "/admin/reports/usuarios-activos",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Most active borrowers", body = BorrowerActivityReport),
        (status = 400, description = "Invalid limit"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn borrower_activity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    QueryParams(query): QueryParams<ReportQuery>,
) -> AppResult<Json<ApiResponse<BorrowerActivityReport>>> {
    claims.require_admin()?;

    let report = state
        .services
        .reports
        .borrower_activity(claims.user_id, query.effective_limit())
        .await?;
    Ok(Json(ApiResponse::ok("Report generated", report)))
}

/// Titles ranked by number of loans
#[utoipa::path(
    get,
    path = "/admin/reports/libros-populares",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(ReportQuery),
    responses(
        (status = 200, description = "Most borrowed titles", body = TitlePopularityReport),
        (status = 400, description = "Invalid limit"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn popular_titles(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    QueryParams(query): QueryParams<ReportQuery>,
) -> AppResult<Json<ApiResponse<TitlePopularityReport>>> {
    claims.require_admin()?;

    let report = state
        .services
        .reports
        .title_popularity(claims.user_id, query.effective_limit())
        .await?;
    Ok(Json(ApiResponse::ok("Report generated", report)))
}

/// Title, unit and loan counters
#[utoipa::path(
    get,
    path = "/admin/reports/estadisticas",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "General statistics", body = LendingStatistics),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn statistics(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<LendingStatistics>>> {
    claims.require_admin()?;

    let stats = state.services.reports.statistics(claims.user_id).await?;
    Ok(Json(ApiResponse::ok("Statistics generated", stats)))
}
