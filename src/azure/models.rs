//! Azure Resource Manager data types used by the management client

use crate::azure::resource_id::ResourceId;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Subscription visible through the account's subscription filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryProperties {
    pub login_server: String,
    #[serde(default)]
    pub admin_user_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

/// Container registry snapshot as returned by the management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    pub properties: RegistryProperties,
}

impl Registry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, login_server: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: String::new(),
            sku: None,
            properties: RegistryProperties {
                login_server: login_server.into(),
                admin_user_enabled: false,
                provisioning_state: None,
            },
        }
    }

    pub fn login_server(&self) -> &str {
        &self.properties.login_server
    }

    pub fn admin_user_enabled(&self) -> bool {
        self.properties.admin_user_enabled
    }

    pub fn resource_id(&self) -> Result<ResourceId> {
        ResourceId::parse(&self.id)
    }

    pub fn resource_group(&self) -> Result<String> {
        Ok(self.resource_id()?.resource_group)
    }

    pub fn subscription_id(&self) -> Result<String> {
        Ok(self.resource_id()?.subscription_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryPassword {
    pub name: String,
    pub value: String,
}

/// Admin user credentials from `listCredentials`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: String,
    #[serde(default)]
    pub passwords: Vec<RegistryPassword>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryNameStatus {
    pub name_available: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One-time upload location for build sources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUploadDefinition {
    pub upload_url: String,
    pub relative_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsType {
    Linux,
    Windows,
}

impl OsType {
    /// Map an `std::env::consts::OS` style name onto a build platform
    pub fn from_host(os: &str) -> Self {
        if os.eq_ignore_ascii_case("windows") || os.eq_ignore_ascii_case("windows_nt") {
            OsType::Windows
        } else {
            OsType::Linux
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformProperties {
    pub os_type: OsType,
}

/// Quick build request payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickBuildRequest {
    #[serde(rename = "type")]
    pub request_type: String,
    pub image_names: Vec<String>,
    pub is_push_enabled: bool,
    pub source_location: String,
    pub platform: PlatformProperties,
    pub docker_file_path: String,
}

impl QuickBuildRequest {
    pub fn new(
        image_names: Vec<String>,
        source_location: impl Into<String>,
        docker_file_path: impl Into<String>,
        os_type: OsType,
    ) -> Self {
        Self {
            request_type: "QuickBuild".to_string(),
            image_names,
            is_push_enabled: true,
            source_location: source_location.into(),
            platform: PlatformProperties { os_type },
            docker_file_path: docker_file_path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProperties {
    #[serde(default)]
    pub build_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub build_type: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub finish_time: Option<String>,
    #[serde(default)]
    pub build_task: Option<String>,
    /// Registries sometimes report a list holding a single null entry
    #[serde(default)]
    pub output_images: Option<Vec<Option<ImageDescriptor>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: BuildProperties,
}

impl Build {
    pub fn build_id(&self) -> &str {
        if self.properties.build_id.is_empty() {
            &self.name
        } else {
            &self.properties.build_id
        }
    }

    /// Output images, skipping null entries
    pub fn output_images(&self) -> impl Iterator<Item = &ImageDescriptor> {
        self.properties
            .output_images
            .iter()
            .flatten()
            .filter_map(|image| image.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSourceRepository {
    #[serde(default)]
    pub source_control_type: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub is_commit_trigger_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTaskInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repository: Option<TaskSourceRepository>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Build task as returned by `GET .../buildTasks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTask {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub properties: BuildTaskInfo,
}

/// Queue-build payload that runs an existing build task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTaskBuildRequest {
    #[serde(rename = "type")]
    pub request_type: String,
    pub build_task_name: String,
}

impl BuildTaskBuildRequest {
    pub fn new(build_task_name: impl Into<String>) -> Self {
        Self {
            request_type: "BuildTask".to_string(),
            build_task_name: build_task_name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildLogLink {
    pub log_link: String,
}

/// ARM list envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub next_link: Option<String>,
}
