//! Authenticated principal (JWT claims)

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const ADMIN_ROLE: &str = "admin";

/// JWT claims for authenticated users
///
/// `user_id` is the principal identifier used as borrower and audit actor
/// throughout the lending services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Claims for `user_id` valid for `valid_hours` from now
    pub fn new(user_id: i64, email: impl Into<String>, roles: Vec<String>, valid_hours: u64) -> Self {
        let now = Utc::now();
        // capped at a century to stay within chrono's range
        let hours = valid_hours.min(876_000) as i64;
        Self {
            sub: user_id.to_string(),
            user_id,
            email: email.into(),
            roles,
            exp: (now + Duration::hours(hours)).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn token_round_trips_principal_id() {
        let claims = UserClaims::new(42, "ana@example.org", vec!["lector".into()], 1);
        let token = claims.create_token(SECRET).unwrap();
        let parsed = UserClaims::from_token(&token, SECRET).unwrap();
        assert_eq!(parsed.user_id, 42);
        assert!(!parsed.is_admin());
        assert!(parsed.require_admin().is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = UserClaims::new(1, "", vec![], 1).create_token(SECRET).unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn fractional_user_id_is_rejected() {
        let payload = serde_json::json!({
            "sub": "1", "user_id": 1.5, "exp": Utc::now().timestamp() + 60, "iat": 0
        });
        assert!(serde_json::from_value::<UserClaims>(payload).is_err());
    }

    #[test]
    fn admin_role_grants_admin() {
        let claims = UserClaims::new(1, "", vec![ADMIN_ROLE.into()], 1);
        assert!(claims.require_admin().is_ok());
    }
}
