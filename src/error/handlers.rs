//! Standardized error handling patterns shared by the HTTP clients

use crate::error::{AcrError, ExchangeStep, Result};
use reqwest::{Response, StatusCode};

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Read the body of a failed response for error reporting
    pub async fn error_text(response: Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string())
    }

    /// Handle token exchange HTTP errors
    pub fn handle_exchange_error(step: ExchangeStep, status: StatusCode, error_text: &str) -> AcrError {
        let message = match status.as_u16() {
            400 => format!("Invalid token request parameters: {}", error_text),
            401 => format!("Azure AD token rejected by registry: {}", error_text),
            403 => format!("Access denied - insufficient permissions: {}", error_text),
            404 => "OAuth2 endpoint not found on registry".to_string(),
            _ => format!("status {}: {}", status, error_text),
        };

        AcrError::exchange(step, message)
    }

    /// Handle registry-related HTTP errors
    pub fn handle_registry_error(status: StatusCode, error_text: &str, operation: &str) -> AcrError {
        let message = match status.as_u16() {
            401 => format!("Unauthorized to perform {}: {}", operation, error_text),
            403 => format!("Forbidden: insufficient permissions for {}: {}", operation, error_text),
            404 => format!("Resource not found for {}: {}", operation, error_text),
            429 => format!("Rate limited during {}: {}", operation, error_text),
            500 => format!("Registry server error during {}: {}", operation, error_text),
            502 | 503 => format!("Registry unavailable for {}: {}", operation, error_text),
            _ => error_text.to_string(),
        };

        AcrError::RegistryApi {
            operation: operation.to_string(),
            status: status.as_u16(),
            message,
        }
    }

    /// Handle Azure Resource Manager errors
    pub fn handle_management_error(status: StatusCode, error_text: &str, operation: &str) -> AcrError {
        let message = match status.as_u16() {
            401 => format!("Azure credentials rejected: {}", error_text),
            403 => format!("Authorization failed for {}: {}", operation, error_text),
            404 => format!("Resource not found: {}", error_text),
            409 => format!("Conflict: {}", error_text),
            429 => format!("Throttled by Azure Resource Manager: {}", error_text),
            _ => error_text.to_string(),
        };

        AcrError::Management {
            operation: operation.to_string(),
            status: status.as_u16(),
            message,
        }
    }

    /// Handle blob storage errors
    pub fn handle_blob_error(status: StatusCode, error_text: &str, operation: &str) -> AcrError {
        let message = match status.as_u16() {
            403 => format!("SAS token rejected or expired: {}", error_text),
            404 => format!("Blob container not found: {}", error_text),
            413 => "Source archive too large for blob upload".to_string(),
            _ => error_text.to_string(),
        };

        AcrError::RegistryApi {
            operation: operation.to_string(),
            status: status.as_u16(),
            message,
        }
    }
}

/// Validation error utilities
pub struct ValidationErrorHandler;

impl ValidationErrorHandler {
    /// Validate a source folder for archiving
    pub fn validate_source_folder(path: &std::path::Path) -> Result<()> {
        if !path.exists() {
            return Err(AcrError::Validation(format!(
                "Source folder does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(AcrError::Validation(format!(
                "Source path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    /// Validate an image name in `<name>:<tag>` form
    pub fn validate_image_name(image: &str) -> Result<()> {
        if image.is_empty() {
            return Err(AcrError::Validation("Image name cannot be empty".to_string()));
        }

        if image.chars().any(char::is_whitespace) {
            return Err(AcrError::Validation(
                "Image name cannot contain whitespace".to_string(),
            ));
        }

        match image.rsplit_once(':') {
            Some((name, tag)) if !name.is_empty() && !tag.is_empty() && !tag.contains('/') => Ok(()),
            _ => Err(AcrError::Validation(format!(
                "Image name must be in format <name>:<tag>, got '{}'",
                image
            ))),
        }
    }

    /// Validate a repository name
    pub fn validate_repository(repository: &str) -> Result<()> {
        if repository.is_empty() {
            return Err(AcrError::Validation("Repository cannot be empty".to_string()));
        }

        if repository.contains("//") || repository.starts_with('/') || repository.ends_with('/') {
            return Err(AcrError::Validation(format!(
                "Invalid repository format: {}",
                repository
            )));
        }

        Ok(())
    }
}
