//! ACR token exchange
//!
//! Turns a session's AAD tokens into registry tokens in two OAuth2 calls:
//!
//! 1. `POST /oauth2/exchange` trades the AAD access/refresh pair for an ACR
//!    refresh token bound to the registry.
//! 2. `POST /oauth2/token` trades that refresh token for an access token bound
//!    to a single scope.
//!
//! The refresh token works for any scope on the same registry. Access tokens do
//! not, so every scope needs its own second call. By default both calls are made
//! for every request; [`TokenExchangeClient::with_refresh_token_cache`] keeps the
//! refresh token per (tenant, registry) and only repeats the second call.

use crate::azure::account::{AzureAccount, Session};
use crate::azure::credential::AadTokenPair;
use crate::azure::models::Registry;
use crate::error::handlers::HttpErrorHandler;
use crate::error::{AcrError, ExchangeStep, Result};
use crate::logging::Logger;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use url::Url;

/// Registry-scoped token pair
#[derive(Clone, PartialEq, Eq)]
pub struct AcrTokenPair {
    pub refresh_token: String,
    pub access_token: String,
}

impl fmt::Debug for AcrTokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcrTokenPair")
            .field("refresh_token", &"<redacted>")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Permission string an access token is issued for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope(String);

impl Scope {
    /// `registry:catalog:*`
    pub fn catalog() -> Self {
        Scope("registry:catalog:*".to_string())
    }

    /// `repository:<name>:pull`
    pub fn pull(repository: &str) -> Self {
        Scope(format!("repository:{}:pull", repository))
    }

    /// `repository:<name>:*`, needed for deletes
    pub fn repository_all(repository: &str) -> Self {
        Scope(format!("repository:{}:*", repository))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base URL and OAuth2 `service` name of a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
    base: String,
    service: String,
}

impl RegistryEndpoint {
    /// Login servers without a scheme are addressed over https
    pub fn from_login_server(login_server: &str) -> Result<Self> {
        let login_server = login_server.trim().trim_end_matches('/');
        if login_server.is_empty() {
            return Err(AcrError::Validation("Login server cannot be empty".to_string()));
        }

        let with_scheme = if login_server.contains("://") {
            login_server.to_string()
        } else {
            format!("https://{}", login_server)
        };

        let url = Url::parse(&with_scheme)?;
        let host = url
            .host_str()
            .ok_or_else(|| AcrError::Validation(format!("Login server has no host: {}", login_server)))?;
        let service = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            base: format!("{}://{}", url.scheme(), service),
            service,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
}

pub struct TokenExchangeClient {
    client: Client,
    output: Logger,
    refresh_cache: Option<Mutex<HashMap<(String, String), String>>>,
}

impl TokenExchangeClient {
    pub fn new(client: Client, output: Logger) -> Self {
        Self {
            client,
            output,
            refresh_cache: None,
        }
    }

    /// Keep ACR refresh tokens per (tenant, registry) between calls
    pub fn with_refresh_token_cache(mut self, enabled: bool) -> Self {
        self.refresh_cache = if enabled { Some(Mutex::new(HashMap::new())) } else { None };
        self
    }

    pub fn caches_refresh_tokens(&self) -> bool {
        self.refresh_cache.is_some()
    }

    /// Step 2: AAD token pair -> ACR refresh token
    pub async fn exchange_refresh_token(
        &self,
        endpoint: &RegistryEndpoint,
        tenant_id: &str,
        aad: &AadTokenPair,
    ) -> Result<String> {
        let step = ExchangeStep::RefreshToken;
        let url = endpoint.url("oauth2/exchange");
        self.output.detail(&format!("Exchanging AAD token at {}", url));

        let form = [
            ("grant_type", "access_token_refresh_token"),
            ("service", endpoint.service()),
            ("tenant", tenant_id),
            ("refresh_token", aad.refresh_token.as_str()),
            ("access_token", aad.access_token.as_str()),
        ];

        let body = self.post_form(&url, &form, step).await?;
        let parsed: ExchangeResponse = serde_json::from_str(&body)
            .map_err(|e| AcrError::exchange(step, format!("unparsable response body: {}", e)))?;

        parsed
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AcrError::exchange(step, "response has no refresh_token"))
    }

    /// Step 3: ACR refresh token -> access token for `scope`
    pub async fn request_access_token(
        &self,
        endpoint: &RegistryEndpoint,
        refresh_token: &str,
        scope: &Scope,
    ) -> Result<String> {
        let step = ExchangeStep::AccessToken;
        let url = endpoint.url("oauth2/token");
        self.output
            .detail(&format!("Requesting access token for scope {}", scope));

        let form = [
            ("grant_type", "refresh_token"),
            ("service", endpoint.service()),
            ("scope", scope.as_str()),
            ("refresh_token", refresh_token),
        ];

        let body = self.post_form(&url, &form, step).await?;
        let parsed: AccessTokenResponse = serde_json::from_str(&body)
            .map_err(|e| AcrError::exchange(step, format!("unparsable response body: {}", e)))?;

        parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AcrError::exchange(step, "response has no access_token"))
    }

    /// Full exchange for one scope. Never returns a partial pair.
    pub async fn acquire_tokens(
        &self,
        session: &Session,
        login_server: &str,
        scope: &Scope,
    ) -> Result<AcrTokenPair> {
        let endpoint = RegistryEndpoint::from_login_server(login_server)?;
        let cache_key = (session.tenant_id.to_lowercase(), endpoint.service().to_lowercase());

        let cached = self.cached_refresh_token(&cache_key);
        let from_cache = cached.is_some();
        let refresh_token = match cached {
            Some(token) => {
                self.output
                    .detail(&format!("Reusing cached refresh token for {}", endpoint.service()));
                token
            }
            None => {
                let aad = session.acquire_token().await?;
                let token = self
                    .exchange_refresh_token(&endpoint, &session.tenant_id, &aad)
                    .await?;
                self.store_refresh_token(cache_key.clone(), &token);
                token
            }
        };

        let access_token = match self.request_access_token(&endpoint, &refresh_token, scope).await {
            Ok(token) => token,
            Err(err) => {
                if from_cache {
                    self.evict(&cache_key);
                }
                return Err(err);
            }
        };

        tracing::debug!(service = endpoint.service(), %scope, "ACR tokens acquired");
        Ok(AcrTokenPair {
            refresh_token,
            access_token,
        })
    }

    /// Exchange using the session of the tenant that owns `registry`
    pub async fn acquire_for_registry(
        &self,
        account: &AzureAccount,
        registry: &Registry,
        scope: &Scope,
    ) -> Result<AcrTokenPair> {
        let session = account.session_for_registry(registry)?;
        self.acquire_tokens(session, registry.login_server(), scope).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)], step: ExchangeStep) -> Result<String> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| AcrError::exchange(step, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = HttpErrorHandler::error_text(response).await;
            self.output
                .verbose(&format!("{} failed: HTTP {} - {}", step, status, error_text));
            return Err(HttpErrorHandler::handle_exchange_error(step, status, &error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AcrError::exchange(step, format!("failed to read response: {}", e)))?;

        if body.trim().is_empty() {
            return Err(AcrError::exchange(step, "empty response body"));
        }

        Ok(body)
    }

    fn cached_refresh_token(&self, key: &(String, String)) -> Option<String> {
        let cache = self.refresh_cache.as_ref()?;
        cache.lock().ok()?.get(key).cloned()
    }

    fn store_refresh_token(&self, key: (String, String), token: &str) {
        if let Some(cache) = &self.refresh_cache {
            if let Ok(mut guard) = cache.lock() {
                guard.insert(key, token.to_string());
            }
        }
    }

    fn evict(&self, key: &(String, String)) {
        if let Some(cache) = &self.refresh_cache {
            if let Ok(mut guard) = cache.lock() {
                guard.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes() {
        assert_eq!(Scope::catalog().as_str(), "registry:catalog:*");
        assert_eq!(Scope::pull("app1").to_string(), "repository:app1:pull");
        assert_eq!(Scope::repository_all("team/app").as_str(), "repository:team/app:*");
    }

    #[test]
    fn test_endpoint_defaults_to_https() {
        let endpoint = RegistryEndpoint::from_login_server("myreg.azurecr.io").unwrap();
        assert_eq!(endpoint.service(), "myreg.azurecr.io");
        assert_eq!(endpoint.url("/v2/_catalog"), "https://myreg.azurecr.io/v2/_catalog");
    }

    #[test]
    fn test_endpoint_keeps_explicit_scheme_and_port() {
        let endpoint = RegistryEndpoint::from_login_server("http://127.0.0.1:5000/").unwrap();
        assert_eq!(endpoint.service(), "127.0.0.1:5000");
        assert_eq!(endpoint.base(), "http://127.0.0.1:5000");
    }

    #[test]
    fn test_endpoint_rejects_empty() {
        assert!(RegistryEndpoint::from_login_server("  ").is_err());
    }

    #[test]
    fn test_token_pair_debug_is_redacted() {
        let pair = AcrTokenPair {
            refresh_token: "acrRT".to_string(),
            access_token: "acrAT".to_string(),
        };
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("acrRT"));
        assert!(!debug.contains("acrAT"));
    }
}
