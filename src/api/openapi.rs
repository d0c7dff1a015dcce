//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{audit, catalog, health, loans, reports};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Prestamos API",
        version = "0.1.0",
        description = "Library lending REST API: loans, returns and copy stock",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Loans
        loans::get_my_loans,
        loans::create_loan,
        loans::return_loan,
        loans::list_all_loans,
        // Stock
        catalog::add_copies,
        catalog::withdraw_unit,
        catalog::availability,
        // Reports
        reports::active_loans,
        reports::borrower_activity,
        reports::popular_titles,
        reports::statistics,
        // Audit
        audit::list_entries,
    ),
    components(
        schemas(
            loans::CreateLoanRequest,
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanStanding,
            crate::models::unit::Unit,
            crate::models::unit::UnitStatus,
            crate::models::title::AddCopies,
            crate::models::title::Availability,
            crate::models::audit::AuditEntry,
            crate::models::audit::AuditQuery,
            crate::services::reports::ActiveLoansReport,
            crate::services::reports::ActiveLoanLine,
            crate::services::reports::BorrowerActivityReport,
            crate::services::reports::TitlePopularityReport,
            crate::services::reports::LendingStatistics,
            crate::models::report::BorrowerActivity,
            crate::models::report::TitlePopularity,
            crate::models::report::LendingTotals,
            crate::models::report::ReportQuery,
            health::HealthResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "loans", description = "Loans and returns"),
        (name = "stock", description = "Copy stock management"),
        (name = "reports", description = "Lending reports"),
        (name = "audit", description = "Audit log")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
