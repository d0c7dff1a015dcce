//! Data models for the lending server

pub mod audit;
pub mod loan;
pub mod report;
pub mod title;
pub mod unit;
pub mod user;

pub use loan::{Loan, LoanStatus};
pub use unit::{Unit, UnitStatus};
pub use user::UserClaims;
