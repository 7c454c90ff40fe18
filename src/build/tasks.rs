//! Build task creation, listing and runs
//!
//! A build task is created in two calls: the task itself (source repository and
//! platform), then a docker build step named after the task. Running a task
//! queues a build of type `BuildTask`.

use crate::azure::management::ManagementApi;
use crate::azure::models::{Build, BuildTask, OsType, PlatformProperties, Registry};
use crate::error::handlers::ValidationErrorHandler;
use crate::error::{AcrError, Result};
use crate::logging::Logger;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRepository {
    pub source_control_type: String,
    pub repository_url: String,
    pub is_commit_trigger_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTaskProperties {
    pub alias: String,
    pub source_repository: SourceRepository,
    pub platform: PlatformProperties,
}

/// ARM body for `PUT .../buildTasks/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTaskDefinition {
    pub location: String,
    pub properties: BuildTaskProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerBuildStepProperties {
    #[serde(rename = "type")]
    pub step_type: String,
    pub image_names: Vec<String>,
    pub is_push_enabled: bool,
    pub no_cache: bool,
    pub docker_file_path: String,
}

/// ARM body for `PUT .../buildTasks/{task}/steps/{step}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStepDefinition {
    pub properties: DockerBuildStepProperties,
}

/// Everything needed to create a GitHub-triggered build task
#[derive(Debug, Clone)]
pub struct BuildTaskRequest {
    pub task_name: String,
    pub alias: String,
    pub git_url: String,
    pub image_names: Vec<String>,
    pub docker_file_path: String,
    pub os_type: OsType,
}

impl BuildTaskRequest {
    pub fn validate(&self) -> Result<()> {
        if self.task_name.is_empty() {
            return Err(AcrError::Validation("Build task name cannot be empty".to_string()));
        }
        if !self.git_url.starts_with("https://") {
            return Err(AcrError::Validation(format!(
                "Source repository URL must be an https URL, got '{}'",
                self.git_url
            )));
        }
        if self.docker_file_path.is_empty() {
            return Err(AcrError::Validation("Dockerfile path cannot be empty".to_string()));
        }
        for image in &self.image_names {
            ValidationErrorHandler::validate_image_name(image)?;
        }
        Ok(())
    }

    pub fn task_definition(&self, location: &str) -> BuildTaskDefinition {
        let alias = if self.alias.is_empty() {
            self.task_name.clone()
        } else {
            self.alias.clone()
        };

        BuildTaskDefinition {
            location: location.to_string(),
            properties: BuildTaskProperties {
                alias,
                source_repository: SourceRepository {
                    source_control_type: "GitHub".to_string(),
                    repository_url: self.git_url.clone(),
                    is_commit_trigger_enabled: true,
                },
                platform: PlatformProperties { os_type: self.os_type },
            },
        }
    }

    pub fn step_definition(&self) -> BuildStepDefinition {
        BuildStepDefinition {
            properties: DockerBuildStepProperties {
                step_type: "Docker".to_string(),
                image_names: self.image_names.clone(),
                is_push_enabled: true,
                no_cache: false,
                docker_file_path: self.docker_file_path.clone(),
            },
        }
    }
}

/// Create the build task and its docker build step
pub async fn create_build_task(
    api: &dyn ManagementApi,
    registry: &Registry,
    request: &BuildTaskRequest,
    output: &Logger,
) -> Result<()> {
    request.validate()?;

    output.step(&format!("Creating build task {} in {}", request.task_name, registry.name));
    api.create_build_task(registry, &request.task_name, &request.task_definition(&registry.location))
        .await?;

    output.step("Creating docker build step");
    api.create_build_step(
        registry,
        &request.task_name,
        &request.task_name,
        &request.step_definition(),
    )
    .await?;

    output.success(&format!("Build task {} created", request.task_name));
    Ok(())
}

/// Build tasks of a registry; an empty list is reported as a warning
pub async fn list_build_tasks(
    api: &dyn ManagementApi,
    registry: &Registry,
    output: &Logger,
) -> Result<Vec<BuildTask>> {
    let tasks = api.list_build_tasks(registry).await?;
    if tasks.is_empty() {
        output.warning(&format!(
            "You do not have any build tasks in '{}'. Create one with `acr create-task`.",
            registry.name
        ));
    }
    Ok(tasks)
}

/// Queue a build of an existing task
pub async fn run_build_task(
    api: &dyn ManagementApi,
    registry: &Registry,
    task_name: &str,
    output: &Logger,
) -> Result<Build> {
    if task_name.is_empty() {
        return Err(AcrError::Validation("Build task name cannot be empty".to_string()));
    }

    output.step(&format!("Running build task {} in {}", task_name, registry.name));
    let build = api.run_build_task(registry, task_name).await?;
    output.success(&format!("Queued build {}", build.build_id()));
    Ok(build)
}

/// One-line description of a build task for listings
pub fn build_task_summary(task: &BuildTask) -> String {
    let properties = &task.properties;
    let platform = properties
        .platform
        .as_ref()
        .map(|platform| format!("{:?}", platform.os_type))
        .unwrap_or_else(|| "-".to_string());
    let repository = properties
        .source_repository
        .as_ref()
        .and_then(|source| source.repository_url.as_deref())
        .unwrap_or("-");

    format!(
        "{}  {}  {}  {}",
        task.name,
        properties.status.as_deref().unwrap_or("Unknown"),
        platform,
        repository
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BuildTaskRequest {
        BuildTaskRequest {
            task_name: "nightly".to_string(),
            alias: String::new(),
            git_url: "https://github.com/org/app".to_string(),
            image_names: vec!["app:{{.Build.ID}}".to_string()],
            docker_file_path: "Dockerfile".to_string(),
            os_type: OsType::Linux,
        }
    }

    #[test]
    fn test_task_definition_wire_format() {
        let value = serde_json::to_value(request().task_definition("westus")).unwrap();
        assert_eq!(value["location"], "westus");
        assert_eq!(value["properties"]["alias"], "nightly");
        assert_eq!(value["properties"]["sourceRepository"]["sourceControlType"], "GitHub");
        assert_eq!(value["properties"]["platform"]["osType"], "Linux");
    }

    #[test]
    fn test_step_definition_wire_format() {
        let value = serde_json::to_value(request().step_definition()).unwrap();
        assert_eq!(value["properties"]["type"], "Docker");
        assert_eq!(value["properties"]["isPushEnabled"], true);
        assert_eq!(value["properties"]["dockerFilePath"], "Dockerfile");
    }

    #[test]
    fn test_validate_rejects_plain_git_url() {
        let mut req = request();
        req.git_url = "git@github.com:org/app.git".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_build_task_summary() {
        let task: BuildTask = serde_json::from_value(serde_json::json!({
            "name": "nightly",
            "properties": {
                "status": "Enabled",
                "platform": { "osType": "Linux" },
                "sourceRepository": { "repositoryUrl": "https://github.com/org/app" }
            }
        }))
        .unwrap();
        assert_eq!(build_task_summary(&task), "nightly  Enabled  Linux  https://github.com/org/app");

        let bare: BuildTask = serde_json::from_value(serde_json::json!({ "name": "bare" })).unwrap();
        assert_eq!(build_task_summary(&bare), "bare  Unknown  -  -");
    }
}
