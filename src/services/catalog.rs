//! Stock management: adding and withdrawing units, availability

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        audit::{entity, AuditAction},
        title::{AddCopies, Availability, Title},
        unit::Unit,
    },
    repository::LendingStore,
};

use super::audit::AuditService;

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LendingStore>,
    audit: AuditService,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LendingStore>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    /// Create `quantity` available units, registering the title on first intake
    pub async fn add_copies(&self, actor_id: i64, isbn: &str, request: AddCopies) -> AppResult<Vec<Unit>> {
        request.validate()?;

        let isbn = isbn.trim();
        if isbn.is_empty() {
            return Err(AppError::Validation("ISBN must not be empty".to_string()));
        }

        let title = match self.store.get_title(isbn).await? {
            Some(title) => title,
            None => Title {
                isbn: isbn.to_string(),
                title: request.title.ok_or_else(|| {
                    AppError::Validation(format!("Title is required to register ISBN {}", isbn))
                })?,
                author: request.author,
            },
        };

        let units = self.store.add_stock(&title, request.quantity).await?;
        tracing::info!(isbn, quantity = units.len(), "Stock added");

        self.audit
            .record(
                actor_id,
                AuditAction::Create,
                entity::UNIT,
                format!("{} copies added for title {}", units.len(), isbn),
            )
            .await;

        Ok(units)
    }

    /// Take an available unit out of circulation
    pub async fn withdraw_unit(&self, actor_id: i64, unit_id: i64) -> AppResult<Unit> {
        let unit = self.store.withdraw_unit(unit_id).await?;
        tracing::info!(unit_id, "Unit withdrawn");

        self.audit
            .record(
                actor_id,
                AuditAction::Update,
                entity::UNIT,
                format!("unit {} withdrawn", unit_id),
            )
            .await;

        Ok(unit)
    }

    pub async fn availability(&self, isbn: &str) -> AppResult<Availability> {
        let title = self
            .store
            .get_title(isbn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Title with ISBN {} not found", isbn)))?;

        Ok(Availability {
            total: self.store.count_units(isbn).await?,
            available: self.store.count_available(isbn).await?,
            isbn: title.isbn,
            title: title.title,
            author: title.author,
        })
    }
}
