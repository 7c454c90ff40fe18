//! Error types and handlers for registry and management operations

pub mod handlers;

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AcrError>;

/// Step of the ACR token exchange that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStep {
    /// POST /oauth2/exchange (AAD tokens -> ACR refresh token)
    RefreshToken,
    /// POST /oauth2/token (ACR refresh token -> scoped access token)
    AccessToken,
}

impl fmt::Display for ExchangeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeStep::RefreshToken => write!(f, "refresh token exchange"),
            ExchangeStep::AccessToken => write!(f, "access token request"),
        }
    }
}

/// Step of the quick build submission that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Archive,
    RequestUploadUrl,
    ParseUploadUrl,
    Upload,
    QueueBuild,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStep::Archive => "archive source",
            BuildStep::RequestUploadUrl => "request upload url",
            BuildStep::ParseUploadUrl => "parse upload url",
            BuildStep::Upload => "upload source",
            BuildStep::QueueBuild => "queue build",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error)]
pub enum AcrError {
    /// No session exists for the tenant
    #[error("Failed to get credentials, tenant {tenant_id} not found")]
    CredentialNotFound { tenant_id: String },

    /// AAD token acquisition was rejected
    #[error("Azure AD token acquisition failed: {0}")]
    AuthAcquisitionFailed(String),

    #[error("ACR token exchange failed during {step}: {message}")]
    AcrTokenExchangeFailed { step: ExchangeStep, message: String },

    /// Non-2xx from catalog, tags or delete endpoints
    #[error("Registry API error during {operation} (status {status}): {message}")]
    RegistryApi {
        operation: String,
        status: u16,
        message: String,
    },

    /// Non-2xx from the Azure Resource Manager
    #[error("Management API error during {operation} (status {status}): {message}")]
    Management {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Malformed resource ID: {0}")]
    MalformedResourceId(String),

    #[error("Malformed upload URL: {0}")]
    MalformedUploadUrl(String),

    #[error("Build submission failed during {step}: {source}")]
    BuildSubmissionFailed {
        step: BuildStep,
        #[source]
        source: Box<AcrError>,
    },

    /// A `docker` invocation exited unsuccessfully
    #[error("docker {command} failed: {message}")]
    Docker { command: String, message: String },

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AcrError {
    pub fn exchange(step: ExchangeStep, message: impl Into<String>) -> Self {
        AcrError::AcrTokenExchangeFailed {
            step,
            message: message.into(),
        }
    }

    /// Wrap an error with the build step it happened in
    pub fn at_build_step(self, step: BuildStep) -> Self {
        AcrError::BuildSubmissionFailed {
            step,
            source: Box::new(self),
        }
    }

    /// The failing build step, if this error came out of a build submission
    pub fn build_step(&self) -> Option<BuildStep> {
        match self {
            AcrError::BuildSubmissionFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AcrError::UserCancelled)
    }
}

impl From<url::ParseError> for AcrError {
    fn from(err: url::ParseError) -> Self {
        AcrError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_step_wrapping() {
        let err = AcrError::MalformedUploadUrl("no container".to_string())
            .at_build_step(BuildStep::ParseUploadUrl);
        assert_eq!(err.build_step(), Some(BuildStep::ParseUploadUrl));
        assert!(err.to_string().contains("parse upload url"));
        assert!(err.to_string().contains("no container"));
    }

    #[test]
    fn test_exchange_error_names_step() {
        let err = AcrError::exchange(ExchangeStep::AccessToken, "empty body");
        assert_eq!(
            err.to_string(),
            "ACR token exchange failed during access token request: empty body"
        );
    }
}
