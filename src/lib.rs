//! Prestamos lending server
//!
//! REST JSON API for lending physical copies of library titles: allocating
//! an available unit to a borrower, returning it, and reporting on active
//! loans, with an audit trail of user and administrative actions.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, repository: repository::Repository) -> Self {
        let services = services::Services::new(repository, &config.lending);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
