//! Registry catalog operations
//!
//! Implements the registry-level reads and deletes used to browse a registry:
//! - Repository listing (GET /v2/_catalog)
//! - Tag listing (GET /v2/{name}/tags/list)
//! - Tag deletion (DELETE /v2/_acr/{name}/tags/{tag})
//! - Repository deletion (DELETE /v2/_acr/{name}/repository)
//!
//! Every call derives a token pair for its own scope through the
//! [`TokenExchangeClient`].

use crate::azure::account::AzureAccount;
use crate::azure::models::Registry;
use crate::error::handlers::{HttpErrorHandler, ValidationErrorHandler};
use crate::error::{AcrError, Result};
use crate::logging::Logger;
use crate::registry::models::{AzureImage, Repository};
use crate::registry::token_exchange::{AcrTokenPair, RegistryEndpoint, Scope, TokenExchangeClient};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    repositories: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

pub struct CatalogClient<'a> {
    client: Client,
    tokens: &'a TokenExchangeClient,
    account: &'a AzureAccount,
    output: Logger,
}

impl<'a> CatalogClient<'a> {
    pub fn new(
        client: Client,
        tokens: &'a TokenExchangeClient,
        account: &'a AzureAccount,
        output: Logger,
    ) -> Self {
        Self {
            client,
            tokens,
            account,
            output,
        }
    }

    /// Repositories of a registry, in the order the registry returns them
    pub async fn list_repositories(&self, registry: &Registry) -> Result<Vec<Repository>> {
        let pair = self
            .tokens
            .acquire_for_registry(self.account, registry, &Scope::catalog())
            .await?;
        let endpoint = RegistryEndpoint::from_login_server(registry.login_server())?;

        let names = self.fetch_repository_names(&endpoint, &pair.access_token).await?;
        Ok(names
            .into_iter()
            .map(|name| Repository::new(registry.clone(), name, pair.clone()))
            .collect())
    }

    /// Tags of a repository
    pub async fn list_tags(&self, repository: &Repository) -> Result<Vec<AzureImage>> {
        self.list_tags_by_name(&repository.registry, &repository.name).await
    }

    pub async fn list_tags_by_name(&self, registry: &Registry, repository: &str) -> Result<Vec<AzureImage>> {
        ValidationErrorHandler::validate_repository(repository)?;

        let pair = self
            .tokens
            .acquire_for_registry(self.account, registry, &Scope::pull(repository))
            .await?;
        let endpoint = RegistryEndpoint::from_login_server(registry.login_server())?;

        let tags = self
            .fetch_tag_names(&endpoint, repository, &pair.access_token)
            .await?;
        Ok(tags
            .into_iter()
            .map(|tag| AzureImage {
                registry: registry.clone(),
                repository: repository.to_string(),
                tag,
                tokens: pair.clone(),
            })
            .collect())
    }

    /// Untag an image
    pub async fn delete_image(&self, registry: &Registry, repository: &str, tag: &str) -> Result<()> {
        ValidationErrorHandler::validate_repository(repository)?;
        if tag.is_empty() {
            return Err(AcrError::Validation("Tag cannot be empty".to_string()));
        }

        let pair = self.delete_tokens(registry, repository).await?;
        let endpoint = RegistryEndpoint::from_login_server(registry.login_server())?;
        let path = format!("v2/_acr/{}/tags/{}", repository, tag);

        self.send_delete(&endpoint, &path, &pair.access_token, "tag deletion")
            .await?;
        self.output
            .success(&format!("Deleted {}/{}:{}", registry.login_server(), repository, tag));
        Ok(())
    }

    /// Delete a repository with all of its tags and manifests
    pub async fn delete_repository(&self, registry: &Registry, repository: &str) -> Result<()> {
        ValidationErrorHandler::validate_repository(repository)?;

        let pair = self.delete_tokens(registry, repository).await?;
        let endpoint = RegistryEndpoint::from_login_server(registry.login_server())?;
        let path = format!("v2/_acr/{}/repository", repository);

        self.send_delete(&endpoint, &path, &pair.access_token, "repository deletion")
            .await?;
        self.output
            .success(&format!("Deleted repository {}/{}", registry.login_server(), repository));
        Ok(())
    }

    /// `GET /v2/_catalog` with an already scoped access token
    pub async fn fetch_repository_names(
        &self,
        endpoint: &RegistryEndpoint,
        access_token: &str,
    ) -> Result<Vec<String>> {
        self.output
            .verbose(&format!("Listing repositories in {}", endpoint.service()));

        let body = self
            .get_text(&endpoint.url("v2/_catalog"), access_token, "repository listing")
            .await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let catalog: CatalogResponse = serde_json::from_str(&body)?;
        let repositories = catalog.repositories.unwrap_or_default();

        self.output.verbose(&format!(
            "Found {} repositories in {}",
            repositories.len(),
            endpoint.service()
        ));
        Ok(repositories)
    }

    /// `GET /v2/{name}/tags/list` with an already scoped access token
    pub async fn fetch_tag_names(
        &self,
        endpoint: &RegistryEndpoint,
        repository: &str,
        access_token: &str,
    ) -> Result<Vec<String>> {
        self.output
            .verbose(&format!("Listing tags for repository: {}", repository));

        let url = endpoint.url(&format!("v2/{}/tags/list", repository));
        let body = self.get_text(&url, access_token, "tag listing").await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let response: TagsResponse = serde_json::from_str(&body)?;
        Ok(response.tags.unwrap_or_default())
    }

    async fn delete_tokens(&self, registry: &Registry, repository: &str) -> Result<AcrTokenPair> {
        self.tokens
            .acquire_for_registry(self.account, registry, &Scope::repository_all(repository))
            .await
    }

    async fn get_text(&self, url: &str, access_token: &str, operation: &str) -> Result<String> {
        tracing::debug!(%url, operation, "registry GET");
        let response = self.client.get(url).bearer_auth(access_token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = HttpErrorHandler::error_text(response).await;
            self.output
                .error(&format!("Failed {}: HTTP {} - {}", operation, status, error_text));
            return Err(HttpErrorHandler::handle_registry_error(status, &error_text, operation));
        }

        Ok(response.text().await?)
    }

    async fn send_delete(
        &self,
        endpoint: &RegistryEndpoint,
        path: &str,
        access_token: &str,
        operation: &str,
    ) -> Result<()> {
        let url = endpoint.url(path);
        tracing::debug!(%url, operation, "registry DELETE");

        let response = self.client.delete(&url).bearer_auth(access_token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = HttpErrorHandler::error_text(response).await;
            self.output
                .error(&format!("Failed {}: HTTP {} - {}", operation, status, error_text));
            return Err(HttpErrorHandler::handle_registry_error(status, &error_text, operation));
        }

        Ok(())
    }
}
