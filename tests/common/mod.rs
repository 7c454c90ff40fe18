#![allow(dead_code)]

use acr_toolkit::azure::account::{AzureAccount, Environment, Session};
use acr_toolkit::azure::credential::StaticTokenCredential;
use acr_toolkit::azure::management::ManagementApi;
use acr_toolkit::azure::models::{
    Build, BuildTask, Location, QuickBuildRequest, Registry, RegistryCredentials, RegistryNameStatus,
    RegistryPassword, ResourceGroup, SourceUploadDefinition, Subscription,
};
use acr_toolkit::build::tasks::{BuildStepDefinition, BuildTaskDefinition};
use acr_toolkit::{AcrError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "tenant-1";

pub fn subscription(id: &str, tenant: &str) -> Subscription {
    Subscription {
        subscription_id: id.to_string(),
        tenant_id: tenant.to_string(),
        display_name: format!("Subscription {}", id),
    }
}

/// One session for `tenant-1` holding aadAT/aadRT, plus the given subscriptions
pub fn account_with(subscriptions: Vec<Subscription>) -> AzureAccount {
    let session = Session::new(
        TENANT,
        Environment::default(),
        Arc::new(StaticTokenCredential::new("aadAT", "aadRT")),
    );
    AzureAccount::new(vec![session], subscriptions)
}

pub fn account() -> AzureAccount {
    account_with(vec![subscription("sub1", TENANT)])
}

pub fn registry_in(subscription_id: &str, name: &str, login_server: &str) -> Registry {
    Registry::new(
        format!(
            "/subscriptions/{}/resourceGroups/rg/providers/Microsoft.ContainerRegistry/registries/{}",
            subscription_id, name
        ),
        name,
        login_server,
    )
}

pub fn registry(login_server: &str) -> Registry {
    registry_in("sub1", "myreg", login_server)
}

/// `/oauth2/exchange` answering `acrRT`, expected `exchanges` times
pub async fn mount_exchange(server: &MockServer, exchanges: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/exchange"))
        .and(body_string_contains("grant_type=access_token_refresh_token"))
        .and(body_string_contains("tenant=tenant-1"))
        .and(body_string_contains("access_token=aadAT"))
        .and(body_string_contains("refresh_token=aadRT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "refresh_token": "acrRT" })))
        .expect(exchanges)
        .mount(server)
        .await;
}

/// `/oauth2/token` answering `access_token` for any scope
pub async fn mount_access_token(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=acrRT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": access_token })))
        .mount(server)
        .await;
}

/// In-memory management API with call tracking
#[derive(Default)]
pub struct FakeManagementApi {
    pub delay: Duration,
    pub failing_subscriptions: HashSet<String>,
    pub registries_per_subscription: usize,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
    pub upload: Option<SourceUploadDefinition>,
    pub fail_queue: bool,
    pub queued: Mutex<Vec<QuickBuildRequest>>,
    pub builds: Vec<Build>,
    pub log_link: String,
    pub admin_credentials: Option<RegistryCredentials>,
    pub build_tasks: Vec<BuildTask>,
    pub task_runs: Mutex<Vec<String>>,
}

impl FakeManagementApi {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn tracked<T>(&self, subscription: &Subscription, value: T) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing_subscriptions.contains(&subscription.subscription_id) {
            return Err(AcrError::Management {
                operation: "list".to_string(),
                status: 403,
                message: format!("no access to {}", subscription.subscription_id),
            });
        }
        Ok(value)
    }

    fn unsupported<T>(operation: &str) -> Result<T> {
        Err(AcrError::Management {
            operation: operation.to_string(),
            status: 501,
            message: "not supported by the fake".to_string(),
        })
    }
}

#[async_trait]
impl ManagementApi for FakeManagementApi {
    async fn list_resource_groups(&self, subscription: &Subscription) -> Result<Vec<ResourceGroup>> {
        let group = ResourceGroup {
            id: String::new(),
            name: format!("rg-{}", subscription.subscription_id),
            location: "westus".to_string(),
        };
        self.tracked(subscription, vec![group]).await
    }

    async fn list_registries(&self, subscription: &Subscription) -> Result<Vec<Registry>> {
        let registries = (0..self.registries_per_subscription.max(1))
            .map(|i| {
                let name = format!("{}-reg{}", subscription.subscription_id, i);
                let login_server = format!("{}.azurecr.io", name);
                registry_in(&subscription.subscription_id, &name, &login_server)
            })
            .collect();
        self.tracked(subscription, registries).await
    }

    async fn list_registries_by_resource_group(
        &self,
        subscription: &Subscription,
        _resource_group: &str,
    ) -> Result<Vec<Registry>> {
        self.list_registries(subscription).await
    }

    async fn list_locations(&self, _subscription: &Subscription) -> Result<Vec<Location>> {
        Self::unsupported("list locations")
    }

    async fn check_name_availability(
        &self,
        _subscription: &Subscription,
        _name: &str,
    ) -> Result<RegistryNameStatus> {
        Self::unsupported("check name availability")
    }

    async fn create_registry(
        &self,
        _subscription: &Subscription,
        _resource_group: &str,
        _name: &str,
        _sku: &str,
        _location: &str,
    ) -> Result<Registry> {
        Self::unsupported("create registry")
    }

    async fn list_credentials(&self, _registry: &Registry) -> Result<RegistryCredentials> {
        match &self.admin_credentials {
            Some(credentials) => Ok(credentials.clone()),
            None => Self::unsupported("list registry credentials"),
        }
    }

    async fn get_build_source_upload_url(&self, _registry: &Registry) -> Result<SourceUploadDefinition> {
        match &self.upload {
            Some(upload) => Ok(upload.clone()),
            None => Err(AcrError::Management {
                operation: "get build source upload url".to_string(),
                status: 500,
                message: "upload url unavailable".to_string(),
            }),
        }
    }

    async fn queue_build(&self, _registry: &Registry, request: &QuickBuildRequest) -> Result<Build> {
        if self.fail_queue {
            return Err(AcrError::Management {
                operation: "queue build".to_string(),
                status: 409,
                message: "build quota exceeded".to_string(),
            });
        }
        self.queued.lock().unwrap().push(request.clone());
        Ok(serde_json::from_value(json!({
            "id": "build-id",
            "name": "aa1",
            "properties": { "buildId": "aa1", "status": "Queued" }
        }))
        .unwrap())
    }

    async fn list_builds(&self, _registry: &Registry, top: Option<usize>) -> Result<Vec<Build>> {
        let limit = top.unwrap_or(self.builds.len());
        Ok(self.builds.iter().take(limit).cloned().collect())
    }

    async fn get_log_link(&self, _registry: &Registry, _build_id: &str) -> Result<String> {
        Ok(self.log_link.clone())
    }

    async fn create_build_task(
        &self,
        _registry: &Registry,
        _task_name: &str,
        _task: &BuildTaskDefinition,
    ) -> Result<serde_json::Value> {
        Self::unsupported("create build task")
    }

    async fn create_build_step(
        &self,
        _registry: &Registry,
        _task_name: &str,
        _step_name: &str,
        _step: &BuildStepDefinition,
    ) -> Result<serde_json::Value> {
        Self::unsupported("create build step")
    }

    async fn list_build_tasks(&self, _registry: &Registry) -> Result<Vec<BuildTask>> {
        Ok(self.build_tasks.clone())
    }

    async fn get_build_task(&self, _registry: &Registry, task_name: &str) -> Result<BuildTask> {
        self.build_tasks
            .iter()
            .find(|task| task.name == task_name)
            .cloned()
            .ok_or_else(|| AcrError::Management {
                operation: "get build task".to_string(),
                status: 404,
                message: format!("{} not found", task_name),
            })
    }

    async fn run_build_task(&self, _registry: &Registry, task_name: &str) -> Result<Build> {
        self.task_runs.lock().unwrap().push(task_name.to_string());
        Ok(serde_json::from_value(json!({
            "name": "ab1",
            "properties": { "buildId": "ab1", "status": "Queued", "buildTask": task_name }
        }))
        .unwrap())
    }
}

pub fn admin_credentials(username: &str, password: &str) -> RegistryCredentials {
    RegistryCredentials {
        username: username.to_string(),
        passwords: vec![RegistryPassword {
            name: "password".to_string(),
            value: password.to_string(),
        }],
    }
}
