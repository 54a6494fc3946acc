//! Managed identity provider over the Identity Toolkit REST API

use super::{Identity, IdentityProvider, Session};
use crate::config::AuthConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub struct IdentityToolkitProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    local_id: String,
    email: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map the provider's error message (e.g. `WEAK_PASSWORD : Password should be...`)
fn map_provider_error(message: &str, email: &str) -> AppError {
    let code = message.split([' ', ':']).next().unwrap_or(message);
    match code {
        "EMAIL_EXISTS" => AppError::DuplicateAccount {
            email: email.to_string(),
        },
        "WEAK_PASSWORD" => AppError::Validation {
            message: message.to_string(),
            field: Some("password".to_string()),
        },
        "INVALID_EMAIL" => AppError::Validation {
            message: message.to_string(),
            field: Some("email".to_string()),
        },
        "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" | "INVALID_LOGIN_CREDENTIALS" => {
            AppError::InvalidCredentials
        }
        "TOKEN_EXPIRED" => AppError::ExpiredToken,
        "INVALID_ID_TOKEN" | "USER_NOT_FOUND" | "USER_DISABLED" => AppError::Unauthorized {
            message: message.to_string(),
        },
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AppError::RateLimited { limit: 0 },
        _ => AppError::IdentityProvider {
            message: message.to_string(),
        },
    }
}

impl IdentityToolkitProvider {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "auth.api_key is required for the identity_toolkit provider".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value, email: &str) -> Result<T> {
        let url = format!("{}/v1/accounts:{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("API error {}: {}", status, text));
            return Err(map_provider_error(&message, email));
        }

        response.json().await.map_err(|e| AppError::IdentityProvider {
            message: format!("Failed to parse response: {}", e),
        })
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let created: SignUpResponse = self.call("signUp", body, email).await?;

        tracing::info!(user_id = %created.local_id, "Account created");
        Ok(Identity {
            user_id: created.local_id,
            email: created.email,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let signed_in: SignInResponse = self.call("signInWithPassword", body, email).await?;

        Ok(Session {
            id_token: signed_in.id_token,
            identity: Identity {
                user_id: signed_in.local_id,
                email: signed_in.email,
            },
        })
    }

    async fn verify(&self, id_token: &str) -> Result<Identity> {
        let lookup: LookupResponse = self.call("lookup", json!({ "idToken": id_token }), "").await?;
        let user = lookup.users.into_iter().next().ok_or_else(|| AppError::Unauthorized {
            message: "Token does not belong to any user".to_string(),
        })?;

        Ok(Identity {
            user_id: user.local_id,
            email: user.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_error_mapping() {
        let cases = [
            ("EMAIL_EXISTS", StatusCode::CONFLICT),
            ("INVALID_PASSWORD", StatusCode::UNAUTHORIZED),
            ("EMAIL_NOT_FOUND", StatusCode::UNAUTHORIZED),
            ("INVALID_LOGIN_CREDENTIALS", StatusCode::UNAUTHORIZED),
            ("INVALID_ID_TOKEN", StatusCode::UNAUTHORIZED),
            ("TOKEN_EXPIRED", StatusCode::UNAUTHORIZED),
            (
                "WEAK_PASSWORD : Password should be at least 6 characters",
                StatusCode::BAD_REQUEST,
            ),
            ("SOMETHING_ELSE", StatusCode::BAD_GATEWAY),
        ];
        for (message, status) in cases {
            assert_eq!(map_provider_error(message, "a@example.com").status_code(), status, "{}", message);
        }
    }

    #[test]
    fn test_requires_api_key() {
        let config = AuthConfig::default();
        assert!(matches!(
            IdentityToolkitProvider::new(&config),
            Err(AppError::Configuration { .. })
        ));
    }
}
