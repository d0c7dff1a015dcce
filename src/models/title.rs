//! Title (catalog entry) and stock intake types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Title {
    pub isbn: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "autor")]
    pub author: Option<String>,
}

/// Add-stock request: creates `quantity` available units of a title.
/// `title` is required the first time an ISBN is stocked.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddCopies {
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000"))]
    pub quantity: u32,
    #[serde(alias = "titulo")]
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,
    #[serde(alias = "autor")]
    pub author: Option<String>,
}

/// Availability summary for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Availability {
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    /// Units that are not withdrawn
    pub total: i64,
    pub available: i64,
}
