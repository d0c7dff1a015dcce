//! Loan coordination: copy allocation and loan ledger as one unit of work

use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{
        audit::{entity, AuditAction},
        loan::Loan,
    },
    repository::LendingStore,
};

use super::audit::AuditService;

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LendingStore>,
    audit: AuditService,
    max_attempts: u32,
}

/// Outcome of one allocation transaction
enum Attempt {
    Allocated(Loan),
    NoUnit,
    /// Another borrower took this unit first
    Lost(i64),
}

impl LoansService {
    pub fn new(store: Arc<dyn LendingStore>, audit: AuditService, config: &LendingConfig) -> Self {
        Self {
            store,
            audit,
            max_attempts: config.max_allocation_attempts.max(1),
        }
    }

    /// Lend one available unit of a title to a borrower
    #[tracing::instrument(skip(self))]
    pub async fn create_loan(&self, borrower_id: i64, title_isbn: &str) -> AppResult<Loan> {
        let mut lost = Vec::new();

        for attempt in 1..=self.max_attempts {
            match self.try_allocate(borrower_id, title_isbn, &lost).await? {
                Attempt::Allocated(loan) => {
                    tracing::info!(loan_id = loan.id, unit_id = loan.unit_id, "Loan created");
                    self.audit
                        .record(
                            borrower_id,
                            AuditAction::Create,
                            entity::LOAN,
                            format!("loan created for title {}", title_isbn),
                        )
                        .await;
                    return Ok(loan);
                }
                Attempt::NoUnit => break,
                Attempt::Lost(unit_id) => {
                    tracing::debug!(unit_id, attempt, "Allocation conflict, retrying");
                    lost.push(unit_id);
                }
            }
        }

        Err(AppError::NoCopiesAvailable(title_isbn.to_string()))
    }

    async fn try_allocate(&self, borrower_id: i64, title_isbn: &str, exclude: &[i64]) -> AppResult<Attempt> {
        // Any early return drops the transaction and rolls back
        let mut tx = self.store.begin().await?;

        let Some(unit_id) = tx.find_available_unit(title_isbn, exclude).await? else {
            return Ok(Attempt::NoUnit);
        };

        let loan = match tx.open(borrower_id, unit_id, Utc::now()).await {
            Ok(loan) => loan,
            Err(AppError::Conflict(_)) => return Ok(Attempt::Lost(unit_id)),
            Err(e) => return Err(e),
        };

        match tx.allocate(unit_id, loan.id).await {
            Ok(()) => {}
            Err(AppError::Conflict(_)) => return Ok(Attempt::Lost(unit_id)),
            Err(e) => return Err(e),
        }

        tx.commit().await?;
        Ok(Attempt::Allocated(loan))
    }

    /// Close a loan and put its unit back in the pool
    #[tracing::instrument(skip(self))]
    pub async fn return_loan(&self, loan_id: i64, borrower_id: i64) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;
        let loan = tx.close(loan_id, borrower_id, Utc::now()).await?;
        tx.release(loan.unit_id).await?;
        tx.commit().await?;

        tracing::info!(loan_id, unit_id = loan.unit_id, "Loan returned");
        self.audit
            .record(
                borrower_id,
                AuditAction::Update,
                entity::LOAN,
                format!("loan {} returned", loan_id),
            )
            .await;

        Ok(loan)
    }

    /// Get loans for a borrower, newest first
    pub async fn get_user_loans(&self, borrower_id: i64) -> AppResult<Vec<Loan>> {
        self.store.list_loans_by_borrower(borrower_id).await
    }

    /// Get every loan, newest first
    pub async fn list_all_loans(&self) -> AppResult<Vec<Loan>> {
        self.store.list_loans().await
    }

    pub async fn count_available(&self, title_isbn: &str) -> AppResult<i64> {
        self.store.count_available(title_isbn).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        models::{
            audit::NewAuditEntry,
            loan::{ActiveLoan, LoanStatus},
            report::{BorrowerActivity, LendingTotals, TitlePopularity},
            title::Title,
            unit::{Unit, UnitStatus},
        },
        repository::{
            memory::{MemoryAuditSink, MemoryStore},
            CopyPool, LendingTx, LoanLedger, MockAuditSink,
        },
    };

    fn title(isbn: &str) -> Title {
        Title {
            isbn: isbn.to_string(),
            title: "Pedro Páramo".to_string(),
            author: Some("Juan Rulfo".to_string()),
        }
    }

    fn service_with(store: Arc<dyn LendingStore>, sink: MockAuditSink) -> LoansService {
        LoansService::new(
            store,
            AuditService::new(Arc::new(sink)),
            &LendingConfig::default(),
        )
    }

    fn quiet_sink() -> MockAuditSink {
        let mut sink = MockAuditSink::new();
        sink.expect_append().returning(|_| Ok(()));
        sink
    }

    #[tokio::test]
    async fn create_loan_audits_the_borrower_action() {
        let store = MemoryStore::new();
        store.add_stock(&title("X"), 1).await.unwrap();

        let mut sink = MockAuditSink::new();
        sink.expect_append()
            .with(eq(NewAuditEntry {
                actor_id: 1,
                action: AuditAction::Create,
                entity: "Loan".to_string(),
                detail: "loan created for title X".to_string(),
            }))
            .times(1)
            .returning(|_| Ok(()));

        let service = service_with(Arc::new(store.clone()), sink);
        let loan = service.create_loan(1, "X").await.unwrap();
        assert_eq!(loan.status, LoanStatus::Active);

        let unit = store.get_unit(loan.unit_id).await.unwrap();
        assert_eq!(unit.status, UnitStatus::Loaned);
        assert_eq!(unit.loan_id, Some(loan.id));
    }

    #[tokio::test]
    async fn failing_audit_sink_does_not_fail_lending() {
        let store = MemoryStore::new();
        store.add_stock(&title("X"), 1).await.unwrap();

        let mut sink = MockAuditSink::new();
        sink.expect_append()
            .times(2)
            .returning(|_| Err(AppError::Unavailable("audit down".into())));

        let service = service_with(Arc::new(store.clone()), sink);
        let loan = service.create_loan(1, "X").await.unwrap();
        service.return_loan(loan.id, 1).await.unwrap();
        assert_eq!(store.count_available("X").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn return_is_audited_as_update() {
        let store = MemoryStore::new();
        store.add_stock(&title("X"), 1).await.unwrap();
        let sink = MemoryAuditSink::new();
        let service = LoansService::new(
            Arc::new(store.clone()),
            AuditService::new(Arc::new(sink.clone())),
            &LendingConfig::default(),
        );

        let loan = service.create_loan(3, "X").await.unwrap();
        service.return_loan(loan.id, 3).await.unwrap();

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, "UPDATE");
        assert_eq!(entries[1].detail, format!("loan {} returned", loan.id));
        assert_eq!(entries[1].actor_id, 3);
    }

    #[tokio::test]
    async fn unknown_title_has_no_copies() {
        let service = service_with(Arc::new(MemoryStore::new()), MockAuditSink::new());
        let err = service.create_loan(1, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NoCopiesAvailable(isbn) if isbn == "nope"));
    }

    #[tokio::test]
    async fn failed_release_rolls_back_the_close() {
        let store = MemoryStore::new();
        let units = store.add_stock(&title("X"), 1).await.unwrap();

        // An active loan whose unit was never allocated
        let mut tx = store.begin().await.unwrap();
        let loan = tx.open(1, units[0].id, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let service = service_with(Arc::new(store.clone()), MockAuditSink::new());
        let err = service.return_loan(loan.id, 1).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let reloaded = store.get_loan(loan.id).await.unwrap();
        assert_eq!(reloaded.status, LoanStatus::Active);
        assert!(reloaded.return_date.is_none());
    }

    /// Store whose transactions lose the unit they find to a rival borrower
    struct ContendedStore {
        inner: MemoryStore,
        steals: Arc<AtomicU32>,
    }

    struct ContendedTx {
        inner: Box<dyn LendingTx>,
        store: MemoryStore,
        steals: Arc<AtomicU32>,
    }

    const RIVAL: i64 = 999;

    #[async_trait]
    impl CopyPool for ContendedTx {
        async fn find_available_unit(&mut self, title_isbn: &str, exclude: &[i64]) -> AppResult<Option<i64>> {
            let found = self.inner.find_available_unit(title_isbn, exclude).await?;
            if let Some(unit_id) = found {
                let steal = self
                    .steals
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if steal {
                    let mut rival = self.store.begin().await?;
                    let loan = rival.open(RIVAL, unit_id, Utc::now()).await?;
                    rival.allocate(unit_id, loan.id).await?;
                    rival.commit().await?;
                }
            }
            Ok(found)
        }

        async fn allocate(&mut self, unit_id: i64, loan_id: i64) -> AppResult<()> {
            self.inner.allocate(unit_id, loan_id).await
        }

        async fn release(&mut self, unit_id: i64) -> AppResult<()> {
            self.inner.release(unit_id).await
        }
    }

    #[async_trait]
    impl LoanLedger for ContendedTx {
        async fn open(&mut self, borrower_id: i64, unit_id: i64, now: DateTime<Utc>) -> AppResult<Loan> {
            self.inner.open(borrower_id, unit_id, now).await
        }

        async fn close(&mut self, loan_id: i64, borrower_id: i64, now: DateTime<Utc>) -> AppResult<Loan> {
            self.inner.close(loan_id, borrower_id, now).await
        }
    }

    #[async_trait]
    impl LendingTx for ContendedTx {
        async fn commit(&mut self) -> AppResult<()> {
            self.inner.commit().await
        }
    }

    #[async_trait]
    impl LendingStore for ContendedStore {
        async fn begin(&self) -> AppResult<Box<dyn LendingTx>> {
            Ok(Box::new(ContendedTx {
                inner: self.inner.begin().await?,
                store: self.inner.clone(),
                steals: Arc::clone(&self.steals),
            }))
        }

        async fn count_available(&self, title_isbn: &str) -> AppResult<i64> {
            self.inner.count_available(title_isbn).await
        }

        async fn count_units(&self, title_isbn: &str) -> AppResult<i64> {
            self.inner.count_units(title_isbn).await
        }

        async fn get_unit(&self, unit_id: i64) -> AppResult<Unit> {
            self.inner.get_unit(unit_id).await
        }

        async fn get_loan(&self, loan_id: i64) -> AppResult<Loan> {
            self.inner.get_loan(loan_id).await
        }

        async fn list_loans_by_borrower(&self, borrower_id: i64) -> AppResult<Vec<Loan>> {
            self.inner.list_loans_by_borrower(borrower_id).await
        }

        async fn list_loans(&self) -> AppResult<Vec<Loan>> {
            self.inner.list_loans().await
        }

        async fn list_active_loans(&self) -> AppResult<Vec<ActiveLoan>> {
            self.inner.list_active_loans().await
        }

        async fn borrower_activity(&self, limit: i64) -> AppResult<Vec<BorrowerActivity>> {
            self.inner.borrower_activity(limit).await
        }

        async fn title_popularity(&self, limit: i64) -> AppResult<Vec<TitlePopularity>> {
            self.inner.title_popularity(limit).await
        }

        async fn lending_totals(&self, now: DateTime<Utc>) -> AppResult<LendingTotals> {
            self.inner.lending_totals(now).await
        }

        async fn get_title(&self, isbn: &str) -> AppResult<Option<Title>> {
            self.inner.get_title(isbn).await
        }

        async fn add_stock(&self, title: &Title, quantity: u32) -> AppResult<Vec<Unit>> {
            self.inner.add_stock(title, quantity).await
        }

        async fn withdraw_unit(&self, unit_id: i64) -> AppResult<Unit> {
            self.inner.withdraw_unit(unit_id).await
        }

        async fn ping(&self) -> AppResult<()> {
            Ok(())
        }
    }

    fn contended(inner: &MemoryStore, steals: u32) -> Arc<dyn LendingStore> {
        Arc::new(ContendedStore {
            inner: inner.clone(),
            steals: Arc::new(AtomicU32::new(steals)),
        })
    }

    #[tokio::test]
    async fn lost_allocation_retries_with_another_unit() {
        let store = MemoryStore::new();
        store.add_stock(&title("X"), 2).await.unwrap();
        let service = service_with(contended(&store, 1), quiet_sink());

        let loan = service.create_loan(1, "X").await.unwrap();
        assert_eq!(loan.borrower_id, 1);

        let loans = store.list_loans().await.unwrap();
        assert_eq!(loans.len(), 2);
        let rival = loans.iter().find(|l| l.borrower_id == RIVAL).unwrap();
        assert_ne!(rival.unit_id, loan.unit_id);
        assert_eq!(store.count_available("X").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn lost_last_unit_reports_no_copies() {
        let store = MemoryStore::new();
        store.add_stock(&title("X"), 1).await.unwrap();
        let service = service_with(contended(&store, 1), MockAuditSink::new());

        let err = service.create_loan(1, "X").await.unwrap_err();
        assert!(matches!(err, AppError::NoCopiesAvailable(_)));
        assert!(store.list_loans_by_borrower(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let store = MemoryStore::new();
        store.add_stock(&title("X"), 5).await.unwrap();
        let service = service_with(contended(&store, u32::MAX), MockAuditSink::new());

        let err = service.create_loan(1, "X").await.unwrap_err();
        assert!(matches!(err, AppError::NoCopiesAvailable(_)));
        // Three attempts, three units taken by rivals, two left untouched
        assert_eq!(store.count_available("X").await.unwrap(), 2);
    }
}
