//! Loan endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{error::AppResult, models::loan::Loan, AppState};

use super::{ApiResponse, AuthenticatedUser, JsonBody, PathParam};

/// Create loan request
#[derive(Deserialize, Validate, ToSchema)]
pub struct CreateLoanRequest {
    /// ISBN of the title to borrow
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
}

/// Loans of the calling borrower
#[utoipa::path(
    get,
    path = "/loans/my-loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's loans, newest first", body = Vec<Loan>),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn get_my_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<Loan>>>> {
    let loans = state.services.loans.get_user_loans(claims.user_id).await?;
    Ok(Json(ApiResponse::ok("Loans retrieved", loans)))
}

/// Borrow any available unit of a title
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 400, description = "Invalid body or no copies available"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    JsonBody(request): JsonBody<CreateLoanRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Loan>>)> {
    request.validate()?;

    let loan = state
        .services
        .loans
        .create_loan(claims.user_id, request.isbn.trim())
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Loan created", loan))))
}

/// Return a borrowed unit
#[utoipa::path(
    put,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan returned", body = Loan),
        (status = 400, description = "Loan not found, not owned by caller, or already returned"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    PathParam(loan_id): PathParam<i64>,
) -> AppResult<Json<ApiResponse<Loan>>> {
    let loan = state
        .services
        .loans
        .return_loan(loan_id, claims.user_id)
        .await?;
    Ok(Json(ApiResponse::ok("Loan returned", loan)))
}

/// Every loan in the system
#[utoipa::path(
    get,
    path = "/admin/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All loans, newest first", body = Vec<Loan>),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn list_all_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<Loan>>>> {
    claims.require_admin()?;

    let loans = state.services.loans.list_all_loans().await?;
    Ok(Json(ApiResponse::ok("Loans retrieved", loans)))
}
