//! Azure Resource Manager client for container registry management
//!
//! [`ManagementApi`] is the seam the rest of the crate talks to; [`ArmClient`]
//! implements it over the ARM REST API using the account's session for the
//! subscription's tenant.

use crate::azure::account::AzureAccount;
use crate::azure::models::{
    Build, BuildLogLink, BuildTask, BuildTaskBuildRequest, Location, Page, QuickBuildRequest,
    Registry, RegistryCredentials, RegistryNameStatus, ResourceGroup, SourceUploadDefinition,
    Subscription,
};
use crate::azure::resource_id::ResourceId;
use crate::build::tasks::{BuildStepDefinition, BuildTaskDefinition};
use crate::error::handlers::HttpErrorHandler;
use crate::error::{AcrError, Result};
use crate::logging::Logger;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

pub const REGISTRY_API_VERSION: &str = "2017-10-01";
pub const BUILD_API_VERSION: &str = "2018-02-01-preview";
pub const RESOURCE_GROUP_API_VERSION: &str = "2018-05-01";
pub const LOCATION_API_VERSION: &str = "2016-06-01";

const REGISTRY_PROVIDER: &str = "Microsoft.ContainerRegistry";

#[async_trait]
pub trait ManagementApi: Send + Sync {
    async fn list_resource_groups(&self, subscription: &Subscription) -> Result<Vec<ResourceGroup>>;

    async fn list_registries(&self, subscription: &Subscription) -> Result<Vec<Registry>>;

    async fn list_registries_by_resource_group(
        &self,
        subscription: &Subscription,
        resource_group: &str,
    ) -> Result<Vec<Registry>>;

    async fn list_locations(&self, subscription: &Subscription) -> Result<Vec<Location>>;

    async fn check_name_availability(
        &self,
        subscription: &Subscription,
        name: &str,
    ) -> Result<RegistryNameStatus>;

    async fn create_registry(
        &self,
        subscription: &Subscription,
        resource_group: &str,
        name: &str,
        sku: &str,
        location: &str,
    ) -> Result<Registry>;

    async fn list_credentials(&self, registry: &Registry) -> Result<RegistryCredentials>;

    async fn get_build_source_upload_url(&self, registry: &Registry) -> Result<SourceUploadDefinition>;

    async fn queue_build(&self, registry: &Registry, request: &QuickBuildRequest) -> Result<Build>;

    async fn list_builds(&self, registry: &Registry, top: Option<usize>) -> Result<Vec<Build>>;

    async fn get_log_link(&self, registry: &Registry, build_id: &str) -> Result<String>;

    async fn create_build_task(
        &self,
        registry: &Registry,
        task_name: &str,
        task: &BuildTaskDefinition,
    ) -> Result<serde_json::Value>;

    async fn create_build_step(
        &self,
        registry: &Registry,
        task_name: &str,
        step_name: &str,
        step: &BuildStepDefinition,
    ) -> Result<serde_json::Value>;

    async fn list_build_tasks(&self, registry: &Registry) -> Result<Vec<BuildTask>>;

    async fn get_build_task(&self, registry: &Registry, task_name: &str) -> Result<BuildTask>;

    /// Queue a build of an existing build task
    async fn run_build_task(&self, registry: &Registry, task_name: &str) -> Result<Build>;
}

/// ARM REST implementation of [`ManagementApi`]
pub struct ArmClient<'a> {
    client: Client,
    account: &'a AzureAccount,
    output: Logger,
}

impl<'a> ArmClient<'a> {
    pub fn new(client: Client, account: &'a AzureAccount, output: Logger) -> Self {
        Self {
            client,
            account,
            output,
        }
    }

    /// Endpoint and bearer token for the subscription's tenant
    async fn authorize(&self, subscription: &Subscription) -> Result<(String, String)> {
        let session = self.account.session_for_tenant(&subscription.tenant_id)?;
        let tokens = session.acquire_token().await?;
        Ok((session.environment.resource_manager_endpoint.clone(), tokens.access_token))
    }

    fn build_url(endpoint: &str, path: &str, api_version: &str) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        token: &str,
        body: Option<&B>,
        operation: &str,
    ) -> Result<String> {
        tracing::debug!(%method, %url, operation, "ARM request");

        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.text().await?)
        } else {
            let error_text = HttpErrorHandler::error_text(response).await;
            self.output
                .verbose(&format!("{} failed: HTTP {} - {}", operation, status, error_text));
            Err(HttpErrorHandler::handle_management_error(status, &error_text, operation))
        }
    }

    async fn request_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        token: &str,
        body: Option<&B>,
        operation: &str,
    ) -> Result<T> {
        let text = self.send(method, url, token, body, operation).await?;
        serde_json::from_str(&text).map_err(|e| AcrError::Management {
            operation: operation.to_string(),
            status: 200,
            message: format!("Unparsable response: {}", e),
        })
    }

    /// GET a list, following `nextLink` until exhausted
    async fn get_paged<T: DeserializeOwned>(&self, url: Url, token: &str, operation: &str) -> Result<Vec<T>> {
        self.get_paged_limited(url, token, operation, None).await
    }

    /// GET a list, following `nextLink` until exhausted or `limit` items are collected
    async fn get_paged_limited<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
        operation: &str,
        limit: Option<usize>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let page: Page<T> = self
                .request_json(Method::GET, url, token, None::<&()>, operation)
                .await?;
            items.extend(page.value);

            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    break;
                }
            }

            next = match page.next_link.filter(|link| !link.is_empty()) {
                Some(link) => Some(Url::parse(&link)?),
                None => None,
            };
        }

        Ok(items)
    }

    /// Subscription, endpoint and token for a registry-scoped call
    async fn registry_context(&self, registry: &Registry) -> Result<(ResourceId, String, String)> {
        let resource_id = registry.resource_id()?;
        let subscription = self.account.subscription(&resource_id.subscription_id)?;
        let (endpoint, token) = self.authorize(subscription).await?;
        Ok((resource_id, endpoint, token))
    }
}

#[async_trait]
impl<'a> ManagementApi for ArmClient<'a> {
    async fn list_resource_groups(&self, subscription: &Subscription) -> Result<Vec<ResourceGroup>> {
        let (endpoint, token) = self.authorize(subscription).await?;
        let path = format!("subscriptions/{}/resourcegroups", subscription.subscription_id);
        let url = Self::build_url(&endpoint, &path, RESOURCE_GROUP_API_VERSION)?;
        self.get_paged(url, &token, "list resource groups").await
    }

    async fn list_registries(&self, subscription: &Subscription) -> Result<Vec<Registry>> {
        let (endpoint, token) = self.authorize(subscription).await?;
        let path = format!(
            "subscriptions/{}/providers/{}/registries",
            subscription.subscription_id, REGISTRY_PROVIDER
        );
        let url = Self::build_url(&endpoint, &path, REGISTRY_API_VERSION)?;
        self.get_paged(url, &token, "list registries").await
    }

    async fn list_registries_by_resource_group(
        &self,
        subscription: &Subscription,
        resource_group: &str,
    ) -> Result<Vec<Registry>> {
        let (endpoint, token) = self.authorize(subscription).await?;
        let path = format!(
            "subscriptions/{}/resourceGroups/{}/providers/{}/registries",
            subscription.subscription_id, resource_group, REGISTRY_PROVIDER
        );
        let url = Self::build_url(&endpoint, &path, REGISTRY_API_VERSION)?;
        self.get_paged(url, &token, "list registries by resource group").await
    }

    async fn list_locations(&self, subscription: &Subscription) -> Result<Vec<Location>> {
        let (endpoint, token) = self.authorize(subscription).await?;
        let path = format!("subscriptions/{}/locations", subscription.subscription_id);
        let url = Self::build_url(&endpoint, &path, LOCATION_API_VERSION)?;
        self.get_paged(url, &token, "list locations").await
    }

    async fn check_name_availability(
        &self,
        subscription: &Subscription,
        name: &str,
    ) -> Result<RegistryNameStatus> {
        let (endpoint, token) = self.authorize(subscription).await?;
        let path = format!(
            "subscriptions/{}/providers/{}/checkNameAvailability",
            subscription.subscription_id, REGISTRY_PROVIDER
        );
        let url = Self::build_url(&endpoint, &path, REGISTRY_API_VERSION)?;
        let body = json!({ "name": name, "type": "Microsoft.ContainerRegistry/registries" });
        self.request_json(Method::POST, url, &token, Some(&body), "check name availability")
            .await
    }

    async fn create_registry(
        &self,
        subscription: &Subscription,
        resource_group: &str,
        name: &str,
        sku: &str,
        location: &str,
    ) -> Result<Registry> {
        let (endpoint, token) = self.authorize(subscription).await?;
        let path = format!(
            "subscriptions/{}/resourceGroups/{}/providers/{}/registries/{}",
            subscription.subscription_id, resource_group, REGISTRY_PROVIDER, name
        );
        let url = Self::build_url(&endpoint, &path, REGISTRY_API_VERSION)?;
        let body = json!({ "location": location, "sku": { "name": sku } });
        self.request_json(Method::PUT, url, &token, Some(&body), "create registry")
            .await
    }

    async fn list_credentials(&self, registry: &Registry) -> Result<RegistryCredentials> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/listCredentials", resource_id);
        let url = Self::build_url(&endpoint, &path, REGISTRY_API_VERSION)?;
        self.request_json(Method::POST, url, &token, None::<&()>, "list registry credentials")
            .await
    }

    async fn get_build_source_upload_url(&self, registry: &Registry) -> Result<SourceUploadDefinition> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/getBuildSourceUploadUrl", resource_id);
        let url = Self::build_url(&endpoint, &path, BUILD_API_VERSION)?;
        self.request_json(Method::POST, url, &token, None::<&()>, "get build source upload url")
            .await
    }

    async fn queue_build(&self, registry: &Registry, request: &QuickBuildRequest) -> Result<Build> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/queueBuild", resource_id);
        let url = Self::build_url(&endpoint, &path, BUILD_API_VERSION)?;
        self.request_json(Method::POST, url, &token, Some(request), "queue build")
            .await
    }

    async fn list_builds(&self, registry: &Registry, top: Option<usize>) -> Result<Vec<Build>> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/builds", resource_id);
        let mut url = Self::build_url(&endpoint, &path, BUILD_API_VERSION)?;
        if let Some(top) = top {
            url.query_pairs_mut().append_pair("$top", &top.to_string());
        }
        self.get_paged_limited(url, &token, "list builds", top).await
    }

    async fn get_log_link(&self, registry: &Registry, build_id: &str) -> Result<String> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/builds/{}/getLogLink", resource_id, build_id);
        let url = Self::build_url(&endpoint, &path, BUILD_API_VERSION)?;
        let link: BuildLogLink = self
            .request_json(Method::POST, url, &token, None::<&()>, "get build log link")
            .await?;
        Ok(link.log_link)
    }

    async fn create_build_task(
        &self,
        registry: &Registry,
        task_name: &str,
        task: &BuildTaskDefinition,
    ) -> Result<serde_json::Value> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/buildTasks/{}", resource_id, task_name);
        let url = Self::build_url(&endpoint, &path, BUILD_API_VERSION)?;
        self.request_json(Method::PUT, url, &token, Some(task), "create build task")
            .await
    }

    async fn create_build_step(
        &self,
        registry: &Registry,
        task_name: &str,
        step_name: &str,
        step: &BuildStepDefinition,
    ) -> Result<serde_json::Value> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/buildTasks/{}/steps/{}", resource_id, task_name, step_name);
        let url = Self::build_url(&endpoint, &path, BUILD_API_VERSION)?;
        self.request_json(Method::PUT, url, &token, Some(step), "create build step")
            .await
    }

    async fn list_build_tasks(&self, registry: &Registry) -> Result<Vec<BuildTask>> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/buildTasks", resource_id);
        let url = Self::build_url(&endpoint, &path, BUILD_API_VERSION)?;
        self.get_paged(url, &token, "list build tasks").await
    }

    async fn get_build_task(&self, registry: &Registry, task_name: &str) -> Result<BuildTask> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/buildTasks/{}", resource_id, task_name);
        let url = Self::build_url(&endpoint, &path, BUILD_API_VERSION)?;
        self.request_json(Method::GET, url, &token, None::<&()>, "get build task")
            .await
    }

    async fn run_build_task(&self, registry: &Registry, task_name: &str) -> Result<Build> {
        let (resource_id, endpoint, token) = self.registry_context(registry).await?;
        let path = format!("{}/queueBuild", resource_id);
        let url = Self::build_url(&endpoint, &path, BUILD_API_VERSION)?;
        let request = BuildTaskBuildRequest::new(task_name);
        self.request_json(Method::POST, url, &token, Some(&request), "run build task")
            .await
    }
}
