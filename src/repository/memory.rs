//! Process-local lending store and audit sink
//!
//! Writes are applied immediately under a short lock and journaled; an
//! uncommitted transaction replays its journal backwards when dropped.
//! Allocation is a compare-and-set on unit status, exactly as in PostgreSQL,
//! so concurrent transactions race the same way.
//!
//! Isolation is read-uncommitted: other transactions and the store's read
//! methods (`get_loan`, `list_loans`, `count_available`, ...) see a
//! transaction's writes before it commits, and a rollback restores whole-row
//! snapshots. Callers must only touch rows their own transaction has won,
//! which the loan coordinator guarantees. A rolled-back loan may briefly
//! appear in listings.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AuditSink, CopyPool, LendingStore, LendingTx, LoanLedger};
use crate::{
    error::{AppError, AppResult},
    models::{
        audit::{AuditEntry, NewAuditEntry},
        loan::{ActiveLoan, Loan},
        report::{BorrowerActivity, LendingTotals, TitlePopularity},
        title::Title,
        unit::{Unit, UnitStatus},
    },
};

#[derive(Default)]
struct LendingState {
    titles: BTreeMap<String, Title>,
    units: BTreeMap<i64, Unit>,
    loans: BTreeMap<i64, Loan>,
    last_unit_id: i64,
    last_loan_id: i64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<LendingState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

enum Undo {
    Unit(Unit),
    InsertedLoan(i64),
    Loan(Loan),
}

pub struct MemoryTx {
    state: Arc<Mutex<LendingState>>,
    journal: Vec<Undo>,
    finished: bool,
}

impl MemoryTx {
    fn rollback(&mut self) {
        let mut state = lock(&self.state);
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Unit(unit) => {
                    state.units.insert(unit.id, unit);
                }
                Undo::InsertedLoan(id) => {
                    state.loans.remove(&id);
                }
                Undo::Loan(loan) => {
                    state.loans.insert(loan.id, loan);
                }
            }
        }
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.finished {
            return Err(AppError::Internal("Transaction already committed".to_string()));
        }
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.rollback();
        }
    }
}

#[async_trait]
impl CopyPool for MemoryTx {
    async fn find_available_unit(&mut self, title_isbn: &str, exclude: &[i64]) -> AppResult<Option<i64>> {
        self.ensure_open()?;
        let state = lock(&self.state);
        Ok(state
            .units
            .values()
            .find(|u| u.title_isbn == title_isbn && u.is_available() && !exclude.contains(&u.id))
            .map(|u| u.id))
    }

    async fn allocate(&mut self, unit_id: i64, loan_id: i64) -> AppResult<()> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        let unit = state
            .units
            .get_mut(&unit_id)
            .ok_or_else(|| AppError::NotFound(format!("Unit with id {} not found", unit_id)))?;

        if unit.status != UnitStatus::Available {
            return Err(AppError::Conflict(format!("Unit {} is no longer available", unit_id)));
        }

        self.journal.push(Undo::Unit(unit.clone()));
        unit.status = UnitStatus::Loaned;
        unit.loan_id = Some(loan_id);
        Ok(())
    }

    async fn release(&mut self, unit_id: i64) -> AppResult<()> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        let unit = state
            .units
            .get_mut(&unit_id)
            .ok_or_else(|| AppError::NotFound(format!("Unit with id {} not found", unit_id)))?;

        if unit.status != UnitStatus::Loaned {
            return Err(AppError::InvalidState(format!("Unit {} is not on loan", unit_id)));
        }

        self.journal.push(Undo::Unit(unit.clone()));
        unit.status = UnitStatus::Available;
        unit.loan_id = None;
        Ok(())
    }
}

#[async_trait]
impl LoanLedger for MemoryTx {
    async fn open(&mut self, borrower_id: i64, unit_id: i64, now: DateTime<Utc>) -> AppResult<Loan> {
        self.ensure_open()?;
        let mut state = lock(&self.state);

        if state.loans.values().any(|l| l.unit_id == unit_id && l.is_active()) {
            return Err(AppError::Conflict(format!("Unit {} already has an active loan", unit_id)));
        }

        state.last_loan_id += 1;
        let loan = Loan::open(state.last_loan_id, borrower_id, unit_id, now);
        state.loans.insert(loan.id, loan.clone());
        self.journal.push(Undo::InsertedLoan(loan.id));
        Ok(loan)
    }

    async fn close(&mut self, loan_id: i64, borrower_id: i64, now: DateTime<Utc>) -> AppResult<Loan> {
        self.ensure_open()?;
        let mut state = lock(&self.state);
        let loan = state
            .loans
            .get_mut(&loan_id)
            .ok_or(AppError::LoanNotFound(loan_id))?;

        loan.check_return_by(borrower_id)?;

        self.journal.push(Undo::Loan(loan.clone()));
        *loan = loan.clone().returned_at(now);
        Ok(loan.clone())
    }
}

#[async_trait]
impl LendingTx for MemoryTx {
    async fn commit(&mut self) -> AppResult<()> {
        self.ensure_open()?;
        self.finished = true;
        self.journal.clear();
        Ok(())
    }
}

#[async_trait]
impl LendingStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn LendingTx>> {
        Ok(Box::new(MemoryTx {
            state: Arc::clone(&self.state),
            journal: Vec::new(),
            finished: false,
        }))
    }

    async fn count_available(&self, title_isbn: &str) -> AppResult<i64> {
        let state = lock(&self.state);
        Ok(state
            .units
            .values()
            .filter(|u| u.title_isbn == title_isbn && u.is_available())
            .count() as i64)
    }

    async fn count_units(&self, title_isbn: &str) -> AppResult<i64> {
        let state = lock(&self.state);
        Ok(state
            .units
            .values()
            .filter(|u| u.title_isbn == title_isbn && u.status != UnitStatus::Withdrawn)
            .count() as i64)
    }

    async fn get_unit(&self, unit_id: i64) -> AppResult<Unit> {
        lock(&self.state)
            .units
            .get(&unit_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Unit with id {} not found", unit_id)))
    }

    async fn get_loan(&self, loan_id: i64) -> AppResult<Loan> {
        lock(&self.state)
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or(AppError::LoanNotFound(loan_id))
    }

    async fn list_loans_by_borrower(&self, borrower_id: i64) -> AppResult<Vec<Loan>> {
        let state = lock(&self.state);
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| l.borrower_id == borrower_id)
            .cloned()
            .collect();
        newest_first(&mut loans);
        Ok(loans)
    }

    async fn list_loans(&self) -> AppResult<Vec<Loan>> {
        let state = lock(&self.state);
        let mut loans: Vec<Loan> = state.loans.values().cloned().collect();
        newest_first(&mut loans);
        Ok(loans)
    }

    async fn list_active_loans(&self) -> AppResult<Vec<ActiveLoan>> {
        let state = lock(&self.state);
        let mut active: Vec<ActiveLoan> = state
            .loans
            .values()
            .filter(|l| l.is_active())
            .filter_map(|l| {
                state.units.get(&l.unit_id).map(|u| ActiveLoan {
                    loan: l.clone(),
                    title_isbn: u.title_isbn.clone(),
                })
            })
            .collect();
        active.sort_by(|a, b| {
            a.loan
                .due_date
                .cmp(&b.loan.due_date)
                .then(a.loan.id.cmp(&b.loan.id))
        });
        Ok(active)
    }

    async fn borrower_activity(&self, limit: i64) -> AppResult<Vec<BorrowerActivity>> {
        let state = lock(&self.state);
        let mut by_borrower: BTreeMap<i64, BorrowerActivity> = BTreeMap::new();
        for loan in state.loans.values() {
            let row = by_borrower
                .entry(loan.borrower_id)
                .or_insert_with(|| BorrowerActivity {
                    borrower_id: loan.borrower_id,
                    total_loans: 0,
                    active_loans: 0,
                    returned_loans: 0,
                });
            row.total_loans += 1;
            if loan.is_active() {
                row.active_loans += 1;
            } else {
                row.returned_loans += 1;
            }
        }

        let mut rows: Vec<BorrowerActivity> = by_borrower.into_values().collect();
        rows.sort_by(|a, b| b.total_loans.cmp(&a.total_loans).then(a.borrower_id.cmp(&b.borrower_id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn title_popularity(&self, limit: i64) -> AppResult<Vec<TitlePopularity>> {
        let state = lock(&self.state);
        let mut by_title: BTreeMap<String, TitlePopularity> = BTreeMap::new();
        for loan in state.loans.values() {
            let Some(title) = state
                .units
                .get(&loan.unit_id)
                .and_then(|u| state.titles.get(&u.title_isbn))
            else {
                continue;
            };
            let row = by_title
                .entry(title.isbn.clone())
                .or_insert_with(|| TitlePopularity {
                    isbn: title.isbn.clone(),
                    title: title.title.clone(),
                    author: title.author.clone(),
                    total_loans: 0,
                    active_loans: 0,
                });
            row.total_loans += 1;
            if loan.is_active() {
                row.active_loans += 1;
            }
        }

        let mut rows: Vec<TitlePopularity> = by_title.into_values().collect();
        rows.sort_by(|a, b| b.total_loans.cmp(&a.total_loans).then(a.isbn.cmp(&b.isbn)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn lending_totals(&self, now: DateTime<Utc>) -> AppResult<LendingTotals> {
        let state = lock(&self.state);
        let active = state.loans.values().filter(|l| l.is_active()).count() as i64;

        Ok(LendingTotals {
            titles: state.titles.len() as i64,
            units: state.units.len() as i64,
            active_loans: active,
            returned_loans: state.loans.len() as i64 - active,
            overdue_loans: state.loans.values().filter(|l| l.is_overdue_at(now)).count() as i64,
        })
    }

    async fn get_title(&self, isbn: &str) -> AppResult<Option<Title>> {
        Ok(lock(&self.state).titles.get(isbn).cloned())
    }

    async fn add_stock(&self, title: &Title, quantity: u32) -> AppResult<Vec<Unit>> {
        let mut state = lock(&self.state);
        state
            .titles
            .entry(title.isbn.clone())
            .or_insert_with(|| title.clone());

        let mut created = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            state.last_unit_id += 1;
            let unit = Unit {
                id: state.last_unit_id,
                title_isbn: title.isbn.clone(),
                status: UnitStatus::Available,
                loan_id: None,
            };
            state.units.insert(unit.id, unit.clone());
            created.push(unit);
        }
        Ok(created)
    }

    async fn withdraw_unit(&self, unit_id: i64) -> AppResult<Unit> {
        let mut state = lock(&self.state);
        let unit = state
            .units
            .get_mut(&unit_id)
            .ok_or_else(|| AppError::NotFound(format!("Unit with id {} not found", unit_id)))?;

        if unit.status != UnitStatus::Available {
            return Err(AppError::InvalidState(format!(
                "Unit {} cannot be withdrawn while {}",
                unit_id, unit.status
            )));
        }

        unit.status = UnitStatus::Withdrawn;
        Ok(unit.clone())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

fn newest_first(loans: &mut [Loan]) {
    loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date).then(b.id.cmp(&a.id)));
}

/// Audit sink keeping entries in memory
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry in insertion order
    pub fn entries(&self) -> Vec<AuditEntry> {
        lock(&self.entries).clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: NewAuditEntry) -> AppResult<()> {
        let mut entries = lock(&self.entries);
        let id = entries.len() as i64 + 1;
        entries.push(AuditEntry {
            id,
            actor_id: entry.actor_id,
            action: entry.action.as_str().to_string(),
            entity: entry.entity,
            detail: entry.detail,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list(&self, entity: Option<String>, limit: i64) -> AppResult<Vec<AuditEntry>> {
        let entries = lock(&self.entries);
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(entries
            .iter()
            .rev()
            .filter(|e| entity.as_deref().map_or(true, |name| e.entity == name))
            .take(limit)
            .cloned()
            .collect())
    }
}
