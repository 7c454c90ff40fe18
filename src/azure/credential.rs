//! Azure AD credential sources
//!
//! A session's credential is opaque to the rest of the crate: anything that can
//! hand out an AAD access/refresh token pair for a resource implements
//! [`TokenCredential`].

use crate::error::{AcrError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// AAD access + refresh token pair
#[derive(Clone, PartialEq, Eq)]
pub struct AadTokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for AadTokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AadTokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Acquire an AAD token pair for `resource`
    async fn acquire_token(&self, resource: &str) -> Result<AadTokenPair>;
}

/// Fixed token pair, for pre-acquired tokens and tests
pub struct StaticTokenCredential {
    tokens: AadTokenPair,
}

impl StaticTokenCredential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            tokens: AadTokenPair {
                access_token: access_token.into(),
                refresh_token: refresh_token.into(),
            },
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn acquire_token(&self, _resource: &str) -> Result<AadTokenPair> {
        if self.tokens.access_token.is_empty() || self.tokens.refresh_token.is_empty() {
            return Err(AcrError::AuthAcquisitionFailed(
                "Static credential has an empty token".to_string(),
            ));
        }
        Ok(self.tokens.clone())
    }
}

#[derive(Debug, Deserialize)]
struct AadTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Refresh-token grant against the AAD token endpoint.
///
/// AAD rotates refresh tokens; the newest one is kept for the next request.
pub struct RefreshTokenCredential {
    client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    refresh_token: Mutex<String>,
}

impl RefreshTokenCredential {
    pub fn new(
        client: reqwest::Client,
        active_directory_endpoint: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        let token_endpoint = format!(
            "{}/{}/oauth2/token",
            active_directory_endpoint.trim_end_matches('/'),
            tenant_id
        );

        Self {
            client,
            token_endpoint,
            client_id: client_id.into(),
            refresh_token: Mutex::new(refresh_token.into()),
        }
    }

    fn current_refresh_token(&self) -> Result<String> {
        self.refresh_token
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| AcrError::AuthAcquisitionFailed("Refresh token lock poisoned".to_string()))
    }
}

#[async_trait]
impl TokenCredential for RefreshTokenCredential {
    async fn acquire_token(&self, resource: &str) -> Result<AadTokenPair> {
        let refresh_token = self.current_refresh_token()?;
        tracing::debug!(endpoint = %self.token_endpoint, resource, "requesting AAD token");

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("resource", resource),
        ];

        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| AcrError::AuthAcquisitionFailed(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AcrError::AuthAcquisitionFailed(format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            return Err(AcrError::AuthAcquisitionFailed(format!(
                "Token endpoint returned status {}: {}",
                status, body
            )));
        }

        let parsed: AadTokenResponse = serde_json::from_str(&body)
            .map_err(|e| AcrError::AuthAcquisitionFailed(format!("Unparsable token response: {}", e)))?;

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AcrError::AuthAcquisitionFailed("Token response has no access_token".to_string()))?;
        let refresh_token = parsed.refresh_token.filter(|t| !t.is_empty()).unwrap_or(refresh_token);

        if let Ok(mut guard) = self.refresh_token.lock() {
            *guard = refresh_token.clone();
        }

        Ok(AadTokenPair {
            access_token,
            refresh_token,
        })
    }
}

/// Credential description as stored in the account profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSpec {
    Static {
        access_token: String,
        refresh_token: String,
    },
    RefreshToken {
        client_id: String,
        refresh_token: String,
    },
}

impl CredentialSpec {
    pub fn into_credential(
        self,
        client: &reqwest::Client,
        active_directory_endpoint: &str,
        tenant_id: &str,
    ) -> Arc<dyn TokenCredential> {
        match self {
            CredentialSpec::Static {
                access_token,
                refresh_token,
            } => Arc::new(StaticTokenCredential::new(access_token, refresh_token)),
            CredentialSpec::RefreshToken {
                client_id,
                refresh_token,
            } => Arc::new(RefreshTokenCredential::new(
                client.clone(),
                active_directory_endpoint,
                tenant_id,
                client_id,
                refresh_token,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credential_returns_pair() {
        let credential = StaticTokenCredential::new("aadAT", "aadRT");
        let pair = credential.acquire_token("https://management.core.windows.net/").await.unwrap();
        assert_eq!(pair.access_token, "aadAT");
        assert_eq!(pair.refresh_token, "aadRT");
    }

    #[tokio::test]
    async fn test_static_credential_rejects_empty_tokens() {
        let credential = StaticTokenCredential::new("", "aadRT");
        let err = credential.acquire_token("resource").await.unwrap_err();
        assert!(matches!(err, AcrError::AuthAcquisitionFailed(_)));
    }

    #[test]
    fn test_token_pair_debug_is_redacted() {
        let pair = AadTokenPair {
            access_token: "secret".to_string(),
            refresh_token: "secret".to_string(),
        };
        assert!(!format!("{:?}", pair).contains("secret"));
    }

    #[test]
    fn test_credential_spec_deserialize() {
        let spec: CredentialSpec = serde_json::from_str(
            r#"{"type":"refresh_token","client_id":"cid","refresh_token":"rt"}"#,
        )
        .unwrap();
        assert!(matches!(spec, CredentialSpec::RefreshToken { .. }));
    }
}
