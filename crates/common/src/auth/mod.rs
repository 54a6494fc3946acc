//! Authentication utilities
//!
//! Provides:
//! - The `IdentityProvider` seam (managed identity REST API or local accounts)
//! - JWT token generation and validation for local accounts
//! - The `AuthContext` extractor for bearer-token protected routes

mod identity_toolkit;

pub use identity_toolkit::IdentityToolkitProvider;

use crate::config::{AuthConfig, IdentityBackend};
use crate::errors::{AppError, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

/// A verified user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

/// Result of a successful sign-in
#[derive(Debug, Clone)]
pub struct Session {
    pub id_token: String,
    pub identity: Identity,
}

/// Signup and login body
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Account management and token verification
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Validate an ID token and return who it belongs to
    async fn verify(&self, id_token: &str) -> Result<Identity>;
}

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,

    pub email: String,

    /// Request ID for tracing
    pub request_id: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    pub email: String,

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

    /// Generate a new JWT token
    pub fn generate_token(&self, identity: &Identity) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: identity.user_id.clone(),
            email: identity.email.clone(),
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
}

struct LocalAccount {
    user_id: String,
    password_hash: String,
}

/// In-process accounts with argon2 password hashes and HS256 tokens
pub struct LocalIdentityProvider {
    jwt: JwtManager,
    accounts: RwLock<HashMap<String, LocalAccount>>,
}

impl LocalIdentityProvider {
    pub fn new(jwt: JwtManager) -> Self {
        Self {
            jwt,
            accounts: RwLock::new(HashMap::new()),
        }
    }
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        let email = normalise_email(email);
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(AppError::DuplicateAccount { email });
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal {
                message: format!("Failed to hash password: {}", e),
            })?
            .to_string();

        let user_id = Uuid::new_v4().simple().to_string();
        accounts.insert(
            email.clone(),
            LocalAccount {
                user_id: user_id.clone(),
                password_hash,
            },
        );

        Ok(Identity { user_id, email })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalise_email(email);
        let accounts = self.accounts.read().await;
        let account = accounts.get(&email).ok_or(AppError::InvalidCredentials)?;

        let parsed = PasswordHash::new(&account.password_hash).map_err(|e| AppError::Internal {
            message: format!("Stored password hash is invalid: {}", e),
        })?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AppError::InvalidCredentials)?;

        let identity = Identity {
            user_id: account.user_id.clone(),
            email,
        };
        let id_token = self.jwt.generate_token(&identity)?;
        Ok(Session { id_token, identity })
    }

    async fn verify(&self, id_token: &str) -> Result<Identity> {
        let claims = self.jwt.validate_token(id_token)?;
        Ok(Identity {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

/// Create the identity provider selected by configuration
pub fn create_identity_provider(config: &AuthConfig) -> Result<Arc<dyn IdentityProvider>> {
    match config.provider {
        IdentityBackend::IdentityToolkit => {
            let provider = IdentityToolkitProvider::new(config)?;
            Ok(Arc::new(provider))
        }
        IdentityBackend::Local => {
            let secret = config.jwt_secret.as_deref().ok_or_else(|| AppError::Configuration {
                message: "auth.jwt_secret is required for the local identity provider".to_string(),
            })?;
            let jwt = JwtManager::new(secret, config.jwt_expiration_secs);
            Ok(Arc::new(LocalIdentityProvider::new(jwt)))
        }
    }
}

/// Extract the token from a `Bearer` Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<dyn IdentityProvider>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        // Extract request ID
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must be a Bearer token".to_string(),
        })?;

        let provider = Arc::<dyn IdentityProvider>::from_ref(state);
        let identity = provider.verify(token).await?;

        Ok(AuthContext {
            user_id: identity.user_id,
            email: identity.email,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new(JwtManager::new("test_secret", 3600))
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let identity = Identity {
            user_id: "user-1".into(),
            email: "a@example.com".into(),
        };

        let token = manager.generate_token(&identity).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@example.com");
        assert!(JwtManager::new("other_secret", 3600).validate_token(&token).is_err());
    }

    #[test]
    fn test_credentials_validation() {
        let ok = Credentials {
            email: "student@example.com".into(),
            password: "secret1".into(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = Credentials {
            email: "not-an-email".into(),
            password: "secret1".into(),
        };
        assert!(bad_email.validate().is_err());

        let short = Credentials {
            email: "student@example.com".into(),
            password: "123".into(),
        };
        assert!(short.validate().is_err());
    }

    #[tokio::test]
    async fn test_local_signup_login_verify() {
        let provider = local_provider();
        let identity = provider.sign_up("Student@Example.com", "secret1").await.unwrap();
        assert_eq!(identity.email, "student@example.com");

        let session = provider.sign_in("student@example.com", "secret1").await.unwrap();
        assert_eq!(session.identity, identity);

        let verified = provider.verify(&session.id_token).await.unwrap();
        assert_eq!(verified, identity);
    }

    #[tokio::test]
    async fn test_local_rejects_duplicates_and_bad_passwords() {
        let provider = local_provider();
        provider.sign_up("a@example.com", "secret1").await.unwrap();

        assert!(matches!(
            provider.sign_up("a@example.com", "secret2").await,
            Err(AppError::DuplicateAccount { .. })
        ));
        assert!(matches!(
            provider.sign_in("a@example.com", "wrong-password").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            provider.sign_in("nobody@example.com", "secret1").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(provider.verify("garbage").await.is_err());
    }
}
