//! `docker login` credentials for a registry
//!
//! Registries with the admin user enabled hand out the admin username and first
//! password. Other registries are logged into with an ACR refresh token and the
//! well-known null-GUID username.

use crate::azure::account::AzureAccount;
use crate::azure::management::ManagementApi;
use crate::azure::models::Registry;
use crate::error::{AcrError, Result};
use crate::logging::Logger;
use crate::registry::token_exchange::{Scope, TokenExchangeClient};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use std::fmt;

/// Username the registry expects alongside a token password
pub const TOKEN_USERNAME: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_token(&self) -> bool {
        self.username == TOKEN_USERNAME
    }

    /// `docker login` invocation reading the password from stdin
    pub fn docker_login_command(&self, login_server: &str) -> String {
        format!("docker login {} -u {} --password-stdin", login_server, self.username)
    }

    /// `auths` entry for `~/.docker/config.json`
    pub fn docker_config_entry(&self, login_server: &str) -> serde_json::Value {
        let auth = STANDARD.encode(format!("{}:{}", self.username, self.password));
        let mut auths = serde_json::Map::new();
        auths.insert(login_server.to_string(), json!({ "auth": auth }));
        json!({ "auths": auths })
    }
}

/// Where login credentials come from
pub struct CredentialResolver<'a> {
    api: &'a dyn ManagementApi,
    tokens: &'a TokenExchangeClient,
    account: &'a AzureAccount,
    output: Logger,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(
        api: &'a dyn ManagementApi,
        tokens: &'a TokenExchangeClient,
        account: &'a AzureAccount,
        output: Logger,
    ) -> Self {
        Self {
            api,
            tokens,
            account,
            output,
        }
    }

    /// Credentials for `docker login`; an explicit pair always wins
    pub async fn login_credentials(
        &self,
        registry: &Registry,
        explicit: Option<LoginCredentials>,
    ) -> Result<LoginCredentials> {
        if let Some(credentials) = explicit {
            self.output.verbose("Using explicitly supplied credentials");
            return Ok(credentials);
        }

        if registry.admin_user_enabled() {
            self.output
                .verbose(&format!("Using admin user credentials of {}", registry.name));
            let credentials = self.api.list_credentials(registry).await?;
            let password = credentials
                .passwords
                .into_iter()
                .next()
                .map(|password| password.value)
                .ok_or_else(|| {
                    AcrError::Validation(format!("Registry {} returned no admin passwords", registry.name))
                })?;
            return Ok(LoginCredentials::new(credentials.username, password));
        }

        self.output
            .verbose(&format!("Admin user disabled on {}, using token login", registry.name));
        let pair = self
            .tokens
            .acquire_for_registry(self.account, registry, &Scope::catalog())
            .await?;
        Ok(LoginCredentials::new(TOKEN_USERNAME, pair.refresh_token))
    }
}
