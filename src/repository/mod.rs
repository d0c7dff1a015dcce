//! Repository layer: storage seams for units, loans and the audit trail
//!
//! Mutations of units and loans happen inside a [`LendingTx`], which is both
//! the copy pool (sole writer of unit status) and the loan ledger (sole
//! writer of loan status). Dropping a transaction without committing rolls
//! back everything it did.

pub mod audit;
pub mod loans;
pub mod memory;
pub mod postgres;
pub mod reports;
pub mod units;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        audit::{AuditEntry, NewAuditEntry},
        loan::{ActiveLoan, Loan},
        report::{BorrowerActivity, LendingTotals, TitlePopularity},
        title::Title,
        unit::Unit,
    },
};

/// Unit allocation within a transaction
#[async_trait]
pub trait CopyPool: Send {
    /// Any AVAILABLE unit of the title, skipping `exclude`. No ordering guarantee.
    async fn find_available_unit(&mut self, title_isbn: &str, exclude: &[i64]) -> AppResult<Option<i64>>;

    /// AVAILABLE -> LOANED, bound to `loan_id`. `Conflict` when the unit is
    /// not AVAILABLE at write time.
    async fn allocate(&mut self, unit_id: i64, loan_id: i64) -> AppResult<()>;

    /// LOANED -> AVAILABLE, clearing the loan reference. `InvalidState`
    /// when the unit is not LOANED.
    async fn release(&mut self, unit_id: i64) -> AppResult<()>;
}

/// Loan records within a transaction
#[async_trait]
pub trait LoanLedger: Send {
    /// Open an ACTIVE loan dated `now`. Does not check unit availability.
    async fn open(&mut self, borrower_id: i64, unit_id: i64, now: DateTime<Utc>) -> AppResult<Loan>;

    /// ACTIVE -> RETURNED. Fails with `LoanNotFound`, `NotLoanOwner` or
    /// `AlreadyReturned`, checked in that order.
    async fn close(&mut self, loan_id: i64, borrower_id: i64, now: DateTime<Utc>) -> AppResult<Loan>;
}

/// One atomic unit of work over the copy pool and the loan ledger
#[async_trait]
pub trait LendingTx: CopyPool + LoanLedger {
    async fn commit(&mut self) -> AppResult<()>;
}

/// Units and loans storage
#[async_trait]
pub trait LendingStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn LendingTx>>;

    /// AVAILABLE units of a title
    async fn count_available(&self, title_isbn: &str) -> AppResult<i64>;

    /// Units of a title that are not withdrawn
    async fn count_units(&self, title_isbn: &str) -> AppResult<i64>;

    async fn get_unit(&self, unit_id: i64) -> AppResult<Unit>;

    async fn get_loan(&self, loan_id: i64) -> AppResult<Loan>;

    /// Newest loan date first
    async fn list_loans_by_borrower(&self, borrower_id: i64) -> AppResult<Vec<Loan>>;

    /// Newest loan date first
    async fn list_loans(&self) -> AppResult<Vec<Loan>>;

    /// ACTIVE loans with their title, earliest due date first
    async fn list_active_loans(&self) -> AppResult<Vec<ActiveLoan>>;

    /// Borrowers with at least one loan, most loans first, ties by id
    async fn borrower_activity(&self, limit: i64) -> AppResult<Vec<BorrowerActivity>>;

    /// Titles with at least one loan, most loans first, ties by ISBN
    async fn title_popularity(&self, limit: i64) -> AppResult<Vec<TitlePopularity>>;

    /// Title, unit and loan counters; overdue as of `now`
    async fn lending_totals(&self, now: DateTime<Utc>) -> AppResult<LendingTotals>;

    async fn get_title(&self, isbn: &str) -> AppResult<Option<Title>>;

    /// Register the title when unknown and create `quantity` AVAILABLE units,
    /// atomically
    async fn add_stock(&self, title: &Title, quantity: u32) -> AppResult<Vec<Unit>>;

    /// AVAILABLE -> WITHDRAWN
    async fn withdraw_unit(&self, unit_id: i64) -> AppResult<Unit>;

    /// Cheap connectivity check
    async fn ping(&self) -> AppResult<()>;
}

/// Append-only audit trail
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> AppResult<()>;

    /// Newest first
    async fn list(&self, entity: Option<String>, limit: i64) -> AppResult<Vec<AuditEntry>>;
}

/// Storage handles shared by the services
#[derive(Clone)]
pub struct Repository {
    pub lending: Arc<dyn LendingStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl Repository {
    /// Repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            lending: Arc::new(postgres::PgLendingStore::new(pool.clone())),
            audit: Arc::new(audit::PgAuditSink::new(pool)),
        }
    }

    /// Process-local repository; state lives as long as the returned handles
    pub fn in_memory() -> Self {
        Self {
            lending: Arc::new(memory::MemoryStore::new()),
            audit: Arc::new(memory::MemoryAuditSink::new()),
        }
    }
}
