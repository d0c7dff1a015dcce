//! Business logic services

pub mod audit;
pub mod catalog;
pub mod loans;
pub mod reports;

use crate::{config::LendingConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub loans: loans::LoansService,
    pub catalog: catalog::CatalogService,
    pub reports: reports::ReportsService,
    pub audit: audit::AuditService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, lending: &LendingConfig) -> Self {
        let audit = audit::AuditService::new(repository.audit.clone());

        Self {
            loans: loans::LoansService::new(repository.lending.clone(), audit.clone(), lending),
            catalog: catalog::CatalogService::new(repository.lending.clone(), audit.clone()),
            reports: reports::ReportsService::new(repository.lending.clone(), audit.clone()),
            audit,
            repository,
        }
    }

    /// Storage connectivity, for the readiness check
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.repository.lending.ping().await
    }
}
