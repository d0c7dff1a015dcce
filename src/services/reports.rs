//! Lending reports: active loans, borrower and title rankings, statistics

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        audit::{entity, AuditAction},
        loan::{ActiveLoan, LoanStanding, LoanStatus},
        report::{BorrowerActivity, LendingTotals, TitlePopularity},
    },
    repository::LendingStore,
};

use super::audit::AuditService;

/// One active loan as listed in the report
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActiveLoanLine {
    pub id_prestamo: i64,
    pub fecha_prestamo: DateTime<Utc>,
    pub fecha_devolucion_prevista: DateTime<Utc>,
    /// Whole days since the loan was opened
    pub dias_prestamo: i64,
    pub estado: LoanStatus,
    pub situacion: LoanStanding,
    pub usuario_id: i64,
    pub ejemplar_id: i64,
    pub libro_isbn: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActiveLoansReport {
    pub total: usize,
    /// Loans open for more than the loan period
    pub vencidos: usize,
    /// Loans within the last days of the loan period
    pub por_vencer: usize,
    pub prestamos: Vec<ActiveLoanLine>,
    pub fecha_reporte: DateTime<Utc>,
}

impl ActiveLoansReport {
    /// Classify active loans as of `now`, keeping their order
    pub fn build(loans: Vec<ActiveLoan>, now: DateTime<Utc>) -> Self {
        let prestamos: Vec<ActiveLoanLine> = loans
            .into_iter()
            .map(|active| {
                let loan = active.loan;
                ActiveLoanLine {
                    id_prestamo: loan.id,
                    fecha_prestamo: loan.loan_date,
                    fecha_devolucion_prevista: loan.due_date,
                    dias_prestamo: loan.elapsed_days_at(now),
                    estado: loan.status,
                    situacion: loan.standing_at(now),
                    usuario_id: loan.borrower_id,
                    ejemplar_id: loan.unit_id,
                    libro_isbn: active.title_isbn,
                }
            })
            .collect();

        let count = |standing: LoanStanding| prestamos.iter().filter(|l| l.situacion == standing).count();

        Self {
            total: prestamos.len(),
            vencidos: count(LoanStanding::Overdue),
            por_vencer: count(LoanStanding::DueSoon),
            prestamos,
            fecha_reporte: now,
        }
    }
}

/// Most active borrowers
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowerActivityReport {
    pub usuarios_activos: Vec<BorrowerActivity>,
    pub fecha_reporte: DateTime<Utc>,
}

/// Most borrowed titles
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TitlePopularityReport {
    pub libros_populares: Vec<TitlePopularity>,
    pub fecha_reporte: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LendingStatistics {
    #[serde(flatten)]
    pub totals: LendingTotals,
    pub fecha_reporte: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ReportsService {
    store: Arc<dyn LendingStore>,
    audit: AuditService,
}

impl ReportsService {
    pub fn new(store: Arc<dyn LendingStore>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    pub async fn active_loans(&self, actor_id: i64) -> AppResult<ActiveLoansReport> {
        let loans = self.store.list_active_loans().await?;
        let report = ActiveLoansReport::build(loans, Utc::now());

        self.audit
            .record(
                actor_id,
                AuditAction::Read,
                entity::REPORT,
                "active loans report generated",
            )
            .await;

        Ok(report)
    }

    pub async fn borrower_activity(&self, actor_id: i64, limit: i64) -> AppResult<BorrowerActivityReport> {
        let usuarios_activos = self.store.borrower_activity(limit).await?;
        self.audit
            .record(
                actor_id,
                AuditAction::Read,
                entity::REPORT,
                "borrower activity report generated",
            )
            .await;

        Ok(BorrowerActivityReport {
            usuarios_activos,
            fecha_reporte: Utc::now(),
        })
    }

    pub async fn title_popularity(&self, actor_id: i64, limit: i64) -> AppResult<TitlePopularityReport> {
        let libros_populares = self.store.title_popularity(limit).await?;
        self.audit
            .record(
                actor_id,
                AuditAction::Read,
                entity::REPORT,
                "popular titles report generated",
            )
            .await;

        Ok(TitlePopularityReport {
            libros_populares,
            fecha_reporte: Utc::now(),
        })
    }

    pub async fn statistics(&self, actor_id: i64) -> AppResult<LendingStatistics> {
        let now = Utc::now();
        let totals = self.store.lending_totals(now).await?;
        self.audit
            .record(
                actor_id,
                AuditAction::Read,
                entity::REPORT,
                "general statistics generated",
            )
            .await;

        Ok(LendingStatistics {
            totals,
            fecha_reporte: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::{
        models::{loan::Loan, title::Title},
        repository::{
            memory::{MemoryAuditSink, MemoryStore},
            CopyPool, LoanLedger,
        },
    };

    fn active(id: i64, opened_days_ago: i64, now: DateTime<Utc>) -> ActiveLoan {
        ActiveLoan {
            loan: Loan::open(id, 10 + id, 100 + id, now - Duration::days(opened_days_ago)),
            title_isbn: "X".to_string(),
        }
    }

    #[test]
    fn build_classifies_by_elapsed_days() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap();
        let loans = vec![
            active(1, 20, now),
            active(2, 16, now),
            active(3, 15, now),
            active(4, 13, now),
            active(5, 12, now),
            active(6, 0, now),
        ];

        let report = ActiveLoansReport::build(loans, now);
        assert_eq!(report.total, 6);
        assert_eq!(report.vencidos, 2);
        assert_eq!(report.por_vencer, 2);
        assert_eq!(report.fecha_reporte, now);

        let ids: Vec<i64> = report.prestamos.iter().map(|l| l.id_prestamo).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(report.prestamos[0].dias_prestamo, 20);
        assert_eq!(report.prestamos[2].situacion, LoanStanding::DueSoon);
        assert_eq!(report.prestamos[4].situacion, LoanStanding::OnTime);
        assert_eq!(report.prestamos[1].usuario_id, 12);
        assert_eq!(report.prestamos[1].ejemplar_id, 102);
    }

    #[test]
    fn empty_report() {
        let report = ActiveLoansReport::build(Vec::new(), Utc::now());
        assert_eq!(report.total, 0);
        assert_eq!(report.vencidos, 0);
        assert!(report.prestamos.is_empty());
    }

    async fn lent_store() -> MemoryStore {
        let store = MemoryStore::new();
        let title = Title {
            isbn: "X".to_string(),
            title: "Cien años de soledad".to_string(),
            author: Some("Gabriel García Márquez".to_string()),
        };
        let units = store.add_stock(&title, 2).await.unwrap();

        let now = Utc::now();
        let mut tx = store.begin().await.unwrap();
        let old = tx.open(4, units[0].id, now - Duration::days(30)).await.unwrap();
        tx.allocate(units[0].id, old.id).await.unwrap();
        let recent = tx.open(6, units[1].id, now).await.unwrap();
        tx.allocate(units[1].id, recent.id).await.unwrap();
        tx.commit().await.unwrap();
        store
    }

    fn service(store: &MemoryStore, sink: &MemoryAuditSink) -> ReportsService {
        ReportsService::new(Arc::new(store.clone()), AuditService::new(Arc::new(sink.clone())))
    }

    #[tokio::test]
    async fn rankings_are_audited_as_report_reads() {
        let store = lent_store().await;
        let sink = MemoryAuditSink::new();
        let reports = service(&store, &sink);

        let borrowers = reports.borrower_activity(1, 10).await.unwrap();
        let ids: Vec<i64> = borrowers.usuarios_activos.iter().map(|b| b.borrower_id).collect();
        assert_eq!(ids, vec![4, 6]);

        let titles = reports.title_popularity(1, 10).await.unwrap();
        assert_eq!(titles.libros_populares.len(), 1);
        assert_eq!(titles.libros_populares[0].total_loans, 2);

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| e.entity == entity::REPORT && e.action == "READ" && e.actor_id == 1));
    }

    #[tokio::test]
    async fn statistics_count_overdue_active_loans() {
        let store = lent_store().await;
        let sink = MemoryAuditSink::new();

        let stats = service(&store, &sink).statistics(2).await.unwrap();
        assert_eq!(stats.totals.titles, 1);
        assert_eq!(stats.totals.units, 2);
        assert_eq!(stats.totals.active_loans, 2);
        assert_eq!(stats.totals.returned_loans, 0);
        assert_eq!(stats.totals.overdue_loans, 1);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["prestamos_vencidos"], 1);
        assert_eq!(json["total_ejemplares"], 2);
        assert!(json["fecha_reporte"].is_string());
        assert_eq!(sink.entries()[0].detail, "general statistics generated");
    }
}
