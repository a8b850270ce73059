//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT token generation and validation
//! - Password hashing (argon2)
//! - Authenticated identity extraction for handlers

use crate::db::models::Role;
use crate::errors::{AppError, Result};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated identity available to handlers.
///
/// Carries the token's claims only; handlers that gate on entitlement must
/// re-read the user and tenant from storage, since Pro status and plan can
/// change between token issuance and the next write.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID
    pub user_id: Uuid,

    /// User email
    pub email: String,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Owning tenant's slug
    pub tenant_slug: String,

    /// Role at token issuance
    pub role: Role,

    /// Pro flag at token issuance (advisory; re-read before gating)
    pub is_pro: bool,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require the admin role, returning ForbiddenError if not present
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "Admin role required".to_string(),
            })
        }
    }

    /// Require that the acting identity belongs to the given tenant
    pub fn require_tenant(&self, tenant_id: Uuid) -> Result<()> {
        if self.tenant_id == tenant_id {
            Ok(())
        } else {
            Err(AppError::TenantMismatch)
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// User email
    pub email: String,

    /// Tenant ID
    pub tenant_id: String,

    /// Tenant slug
    pub tenant_slug: String,

    /// User role
    pub role: String,

    /// User-level Pro flag at issuance
    #[serde(default)]
    pub is_pro: bool,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token for a user
    pub fn generate_token(
        &self,
        user_id: Uuid,
        email: &str,
        tenant_id: Uuid,
        tenant_slug: &str,
        role: Role,
        is_pro: bool,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            tenant_id: tenant_id.to_string(),
            tenant_slug: tenant_slug.to_string(),
            role: String::from(role),
            is_pro,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid token".to_string(),
                },
            })
    }

    /// Build an AuthContext from validated claims
    pub fn context_from_claims(&self, claims: JwtClaims) -> Result<AuthContext> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: "Invalid subject claim".to_string(),
        })?;
        let tenant_id = Uuid::parse_str(&claims.tenant_id).map_err(|_| AppError::Unauthorized {
            message: "Invalid tenant claim".to_string(),
        })?;

        Ok(AuthContext {
            user_id,
            email: claims.email,
            tenant_id,
            tenant_slug: claims.tenant_slug,
            role: Role::from(claims.role),
            is_pro: claims.is_pro,
        })
    }
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Extract a bearer token from an Authorization header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Axum extractor for AuthContext.
///
/// The auth middleware validates the token and inserts the context into
/// request extensions; routes without that middleware reject here.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing authentication".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("password").unwrap();
        assert!(verify_password("password", &hash));
        assert!(!verify_password("wrong_password", &hash));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("password", "not-a-phc-string"));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token("abc.def.ghi"), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, "admin@acme.test", tenant_id, "acme", Role::Admin, true)
            .unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.tenant_id, tenant_id.to_string());
        assert_eq!(claims.role, "admin");
        assert!(claims.is_pro);

        let ctx = manager.context_from_claims(claims).unwrap();
        assert_eq!(ctx.user_id, user_id);
        assert_eq!(ctx.tenant_slug, "acme");
        assert!(ctx.is_admin());
        assert!(ctx.require_admin().is_ok());
        assert!(ctx.require_tenant(tenant_id).is_ok());
        assert!(matches!(
            ctx.require_tenant(Uuid::new_v4()),
            Err(AppError::TenantMismatch)
        ));
    }

    #[test]
    fn test_member_context_is_not_admin() {
        let manager = JwtManager::new("test_secret", 3600);
        let token = manager
            .generate_token(
                Uuid::new_v4(),
                "user@acme.test",
                Uuid::new_v4(),
                "acme",
                Role::Member,
                false,
            )
            .unwrap();
        let ctx = manager
            .context_from_claims(manager.validate_token(&token).unwrap())
            .unwrap();

        assert!(!ctx.is_admin());
        assert!(ctx.require_admin().is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let manager = JwtManager::new("test_secret", 3600);
        let other = JwtManager::new("other_secret", 3600);

        let token = manager
            .generate_token(
                Uuid::new_v4(),
                "user@acme.test",
                Uuid::new_v4(),
                "acme",
                Role::Member,
                false,
            )
            .unwrap();

        assert!(other.validate_token(&token).is_err());
    }
}
