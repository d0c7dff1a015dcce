//! Loan model, lending policy constants and overdue classification

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

use crate::error::AppError;

/// Days between loan date and due date
pub const LOAN_PERIOD_DAYS: i64 = 15;

/// Days before the due date during which a loan is reported as due soon
pub const DUE_SOON_WINDOW_DAYS: i64 = 3;

/// Persisted loan status. Overdue is derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LoanStatus {
    #[serde(rename = "ACTIVO")]
    Active,
    #[serde(rename = "DEVUELTO")]
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Returned => "RETURNED",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(LoanStatus::Active),
            "RETURNED" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan record binding one borrower to one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    #[serde(rename = "id_prestamo")]
    pub id: i64,
    #[serde(rename = "usuario_id")]
    pub borrower_id: i64,
    #[serde(rename = "ejemplar_id")]
    pub unit_id: i64,
    #[serde(rename = "fecha_prestamo")]
    pub loan_date: DateTime<Utc>,
    #[serde(rename = "fecha_devolucion_prevista")]
    pub due_date: DateTime<Utc>,
    #[serde(rename = "fecha_devolucion_real")]
    pub return_date: Option<DateTime<Utc>>,
    #[serde(rename = "estado")]
    pub status: LoanStatus,
}

impl Loan {
    /// Due date for a loan opened at `loan_date`
    pub fn due_date_for(loan_date: DateTime<Utc>) -> DateTime<Utc> {
        loan_date + Duration::days(LOAN_PERIOD_DAYS)
    }

    /// New active loan opened at `now`
    pub fn open(id: i64, borrower_id: i64, unit_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            borrower_id,
            unit_id,
            loan_date: now,
            due_date: Self::due_date_for(now),
            return_date: None,
            status: LoanStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    /// Whether `borrower_id` may return this loan now
    pub fn check_return_by(&self, borrower_id: i64) -> Result<(), AppError> {
        if self.borrower_id != borrower_id {
            return Err(AppError::NotLoanOwner(self.id));
        }
        if self.status == LoanStatus::Returned {
            return Err(AppError::AlreadyReturned(self.id));
        }
        Ok(())
    }

    /// The returned version of this loan
    pub fn returned_at(mut self, now: DateTime<Utc>) -> Self {
        self.status = LoanStatus::Returned;
        self.return_date = Some(now);
        self
    }

    /// Active and strictly past its due date
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_date < now
    }

    /// Whole days elapsed since the loan was opened (truncated)
    pub fn elapsed_days_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.loan_date).num_days()
    }

    pub fn standing_at(&self, now: DateTime<Utc>) -> LoanStanding {
        LoanStanding::from_elapsed_days(self.elapsed_days_at(now))
    }
}

/// Reporting classification of an active loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStanding {
    OnTime,
    DueSoon,
    Overdue,
}

impl LoanStanding {
    pub fn from_elapsed_days(days: i64) -> Self {
        if days > LOAN_PERIOD_DAYS {
            LoanStanding::Overdue
        } else if days > LOAN_PERIOD_DAYS - DUE_SOON_WINDOW_DAYS {
            LoanStanding::DueSoon
        } else {
            LoanStanding::OnTime
        }
    }
}

/// Active loan joined with the title of the unit it holds
#[derive(Debug, Clone)]
pub struct ActiveLoan {
    pub loan: Loan,
    pub title_isbn: String,
}
