//! Aggregates behind the lending reports

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

/// Default and maximum rows of a ranking report
pub const RANKING_DEFAULT_LIMIT: i64 = 10;
pub const RANKING_MAX_LIMIT: i64 = 100;

/// Loan counts of one borrower
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct BorrowerActivity {
    #[serde(rename = "usuario_id")]
    pub borrower_id: i64,
    #[serde(rename = "total_prestamos")]
    pub total_loans: i64,
    #[serde(rename = "prestamos_activos")]
    pub active_loans: i64,
    #[serde(rename = "prestamos_devueltos")]
    pub returned_loans: i64,
}

/// Loan counts of one title, over all of its units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct TitlePopularity {
    pub isbn: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "autor")]
    pub author: Option<String>,
    #[serde(rename = "total_prestamos")]
    pub total_loans: i64,
    #[serde(rename = "prestamos_activos")]
    pub active_loans: i64,
}

/// System-wide counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct LendingTotals {
    #[serde(rename = "total_libros")]
    pub titles: i64,
    /// Units ever stocked, withdrawn ones included
    #[serde(rename = "total_ejemplares")]
    pub units: i64,
    #[serde(rename = "prestamos_activos")]
    pub active_loans: i64,
    #[serde(rename = "prestamos_devueltos")]
    pub returned_loans: i64,
    /// Active loans past their due date
    #[serde(rename = "prestamos_vencidos")]
    pub overdue_loans: i64,
}

/// Ranking report query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ReportQuery {
    /// Maximum rows (default 10, at most 100)
    pub limit: Option<i64>,
}

impl ReportQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(RANKING_DEFAULT_LIMIT)
            .clamp(1, RANKING_MAX_LIMIT)
    }
}
