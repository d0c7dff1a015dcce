//! Unit (lendable physical copy of a title) model

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Lifecycle status of a unit
///
/// Units are never deleted; `Withdrawn` is terminal. Stored as
/// `AVAILABLE` / `LOANED` / `WITHDRAWN`, exposed to clients with the
/// catalog vocabulary (`DISPONIBLE` / `PRESTADO` / `NO_DISPONIBLE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum UnitStatus {
    #[serde(rename = "DISPONIBLE")]
    Available,
    #[serde(rename = "PRESTADO")]
    Loaned,
    #[serde(rename = "NO_DISPONIBLE")]
    Withdrawn,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Available => "AVAILABLE",
            UnitStatus::Loaned => "LOANED",
            UnitStatus::Withdrawn => "WITHDRAWN",
        }
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(UnitStatus::Available),
            "LOANED" => Ok(UnitStatus::Loaned),
            "WITHDRAWN" => Ok(UnitStatus::Withdrawn),
            _ => Err(format!("Invalid unit status: {}", s)),
        }
    }
}

// SQLx conversion for UnitStatus
impl sqlx::Type<Postgres> for UnitStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for UnitStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for UnitStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// A single lendable copy of a title
///
/// When `status` is `Loaned`, `loan_id` names the open loan holding it and
/// that loan's `unit_id` points back here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Unit {
    #[serde(rename = "id_ejemplar")]
    pub id: i64,
    #[serde(rename = "libro_isbn")]
    pub title_isbn: String,
    #[serde(rename = "estado")]
    pub status: UnitStatus,
    #[serde(rename = "prestamo_id")]
    pub loan_id: Option<i64>,
}

impl Unit {
    pub fn is_available(&self) -> bool {
        self.status == UnitStatus::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_storage_names() {
        for status in [UnitStatus::Available, UnitStatus::Loaned, UnitStatus::Withdrawn] {
            assert_eq!(status.as_str().parse::<UnitStatus>(), Ok(status));
        }
        assert!("DISPONIBLE".parse::<UnitStatus>().is_err());
    }

    #[test]
    fn unit_serializes_with_catalog_vocabulary() {
        let unit = Unit {
            id: 4,
            title_isbn: "978-84-376-0494-7".into(),
            status: UnitStatus::Withdrawn,
            loan_id: None,
        };
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["id_ejemplar"], 4);
        assert_eq!(json["estado"], "NO_DISPONIBLE");
        assert!(json["prestamo_id"].is_null());
    }
}
