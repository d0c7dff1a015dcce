//! Stock endpoints: intake, withdrawal and availability

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        title::{AddCopies, Availability},
        unit::Unit,
    },
    AppState,
};

use super::{ApiResponse, AuthenticatedUser, JsonBody, PathParam};

/// Add units of a title, registering the title when unknown
#[utoipa::path(
    post,
    path = "/admin/books/{isbn}/copies",
    tag = "stock",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "Title ISBN")
    ),
    request_body = AddCopies,
    responses(
        (status = 201, description = "Units created", body = Vec<Unit>),
        (status = 400, description = "Invalid quantity or missing title"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn add_copies(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    PathParam(isbn): PathParam<String>,
    JsonBody(request): JsonBody<AddCopies>,
) -> AppResult<(StatusCode, Json<ApiResponse<Vec<Unit>>>)> {
    claims.require_admin()?;

    let units = state
        .services
        .catalog
        .add_copies(claims.user_id, &isbn, request)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Copies added", units))))
}

/// Withdraw an available unit from circulation
#[utoipa::path(
    put,
    path = "/admin/copies/{id}/withdraw",
    tag = "stock",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Unit ID")
    ),
    responses(
        (status = 200, description = "Unit withdrawn", body = Unit),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Unit not found"),
        (status = 409, description = "Unit is on loan or already withdrawn")
    )
)]
pub async fn withdraw_unit(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    PathParam(unit_id): PathParam<i64>,
) -> AppResult<Json<ApiResponse<Unit>>> {
    claims.require_admin()?;

    let unit = state
        .services
        .catalog
        .withdraw_unit(claims.user_id, unit_id)
        .await?;
    Ok(Json(ApiResponse::ok("Unit withdrawn", unit)))
}

/// Total and available units of a title
#[utoipa::path(
    get,
    path = "/books/{isbn}/availability",
    tag = "stock",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "Title ISBN")
    ),
    responses(
        (status = 200, description = "Availability", body = Availability),
        (status = 404, description = "Title not found")
    )
)]
pub async fn availability(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    PathParam(isbn): PathParam<String>,
) -> AppResult<Json<ApiResponse<Availability>>> {
    let availability = state.services.catalog.availability(&isbn).await?;
    Ok(Json(ApiResponse::ok("Availability retrieved", availability)))
}
