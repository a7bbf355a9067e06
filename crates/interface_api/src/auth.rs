//! Authentication and authorization
//!
//! Tokens carry the staff member (`sub`) and the school they act for
//! (`school_id`); together they form the [`TenantContext`] every billing
//! call is scoped by.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::{SchoolId, TenantContext, UserId};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// School the user acts for
    pub school_id: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Resolves the tenant context from the subject and school claims
    pub fn tenant(&self) -> Result<TenantContext, AuthError> {
        let user_id: UserId = self.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        let school_id: SchoolId = self.school_id.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(TenantContext::new(user_id, school_id))
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing permission: {0}")]
    MissingPermission(String),
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `ctx` - User and school the token acts for
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    ctx: &TenantContext,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: ctx.user_id.as_uuid().to_string(),
        school_id: ctx.school_id.as_uuid().to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has required role
///
/// `admin` satisfies every permission and `fees:admin` every `fees:*` one.
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims.roles.iter().any(|r| {
        r == required_role
            || r == "admin"
            || (r == permissions::FEES_ADMIN && required_role.starts_with("fees:"))
    })
}

/// Fails with `MissingPermission` unless the claims grant `permission`
pub fn require(claims: &Claims, permission: &str) -> Result<(), AuthError> {
    if has_role(claims, permission) {
        Ok(())
    } else {
        Err(AuthError::MissingPermission(permission.to_string()))
    }
}

/// Permission definitions
pub mod permissions {
    /// View challans, payments and reports
    pub const FEES_READ: &str = "fees:read";
    /// Generate challans and record payments
    pub const FEES_WRITE: &str = "fees:write";
    /// Cancel or delete challans and delete payments
    pub const FEES_ADMIN: &str = "fees:admin";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(roles: &[&str]) -> Claims {
        Claims {
            sub: UserId::new().as_uuid().to_string(),
            school_id: SchoolId::new().as_uuid().to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_token_round_trip_resolves_tenant() {
        let ctx = TenantContext::new(UserId::new(), SchoolId::new());
        let token = create_token(&ctx, vec![permissions::FEES_READ.into()], "secret", 60).unwrap();

        let claims = validate_token(&token, "secret").unwrap();
        assert_eq!(claims.tenant().unwrap(), ctx);
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_role_hierarchy() {
        let reader = claims(&[permissions::FEES_READ]);
        assert!(require(&reader, permissions::FEES_READ).is_ok());
        assert!(require(&reader, permissions::FEES_WRITE).is_err());

        let fees_admin = claims(&[permissions::FEES_ADMIN]);
        assert!(has_role(&fees_admin, permissions::FEES_WRITE));
        assert!(!has_role(&fees_admin, "reports:export"));

        let admin = claims(&["admin"]);
        assert!(has_role(&admin, permissions::FEES_ADMIN));
    }

    #[test]
    fn test_bad_school_claim_is_invalid() {
        let mut bad = claims(&[]);
        bad.school_id = "not-a-uuid".into();
        assert!(matches!(bad.tenant(), Err(AuthError::InvalidToken)));
    }
}
