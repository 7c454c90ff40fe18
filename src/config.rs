//! Configuration module for HTTP, concurrency and token caching settings

use crate::error::{AcrError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Concurrent subscription requests when listing resource groups
pub const RESOURCE_GROUP_CONCURRENCY: usize = 5;
/// Concurrent subscription requests when listing registries
pub const REGISTRY_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds; `None` keeps the transport default
    pub timeout: Option<u64>,
    pub skip_tls: bool,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub resource_groups: usize,
    pub registries: usize,
}

#[derive(Debug, Clone)]
pub struct AcrConfig {
    pub http: HttpConfig,
    pub pool: PoolConfig,
    /// Reuse ACR refresh tokens per (tenant, login server)
    pub cache_refresh_tokens: bool,
    /// Path to the Azure account profile
    pub profile: Option<PathBuf>,
}

impl Default for AcrConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                timeout: None,
                skip_tls: false,
            },
            pool: PoolConfig {
                resource_groups: RESOURCE_GROUP_CONCURRENCY,
                registries: REGISTRY_CONCURRENCY,
            },
            cache_refresh_tokens: false,
            profile: None,
        }
    }
}

impl AcrConfig {
    /// Defaults overridden by `ACR_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(profile) = env::var("ACR_PROFILE") {
            config.profile = Some(PathBuf::from(profile));
        }

        if let Ok(timeout) = env::var("ACR_HTTP_TIMEOUT") {
            config.http.timeout = Some(parse_var("ACR_HTTP_TIMEOUT", &timeout)?);
        }

        if let Ok(value) = env::var("ACR_SKIP_TLS") {
            config.http.skip_tls = parse_flag(&value);
        }

        if let Ok(value) = env::var("ACR_CACHE_REFRESH_TOKENS") {
            config.cache_refresh_tokens = parse_flag(&value);
        }

        if let Ok(value) = env::var("ACR_RESOURCE_GROUP_CONCURRENCY") {
            config.pool.resource_groups = parse_var("ACR_RESOURCE_GROUP_CONCURRENCY", &value)?;
        }

        if let Ok(value) = env::var("ACR_REGISTRY_CONCURRENCY") {
            config.pool.registries = parse_var("ACR_REGISTRY_CONCURRENCY", &value)?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool.resource_groups == 0 || self.pool.registries == 0 {
            return Err(AcrError::Configuration(
                "Concurrency limits must be greater than 0".to_string(),
            ));
        }

        if self.http.timeout == Some(0) {
            return Err(AcrError::Configuration(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the shared HTTP client
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.http.timeout {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        if self.http.skip_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        builder
            .build()
            .map_err(|e| AcrError::Configuration(format!("Failed to create HTTP client: {}", e)))
    }

    /// Profile path, required by every command that talks to Azure
    pub fn profile_path(&self) -> Result<&PathBuf> {
        self.profile.as_ref().ok_or_else(|| {
            AcrError::Configuration(
                "No account profile configured; pass --profile or set ACR_PROFILE".to_string(),
            )
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AcrError::Configuration(format!("Invalid value for {}: '{}'", name, value)))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
