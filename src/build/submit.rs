//! Quick build submission
//!
//! Submitting a quick build is a fixed sequence:
//! archive the source folder, ask the registry for a one-time upload URL, split
//! that URL into blob coordinates, upload the archive as a block blob, and queue
//! the build against the uploaded path. The first failing step aborts the flow
//! and is reported as [`AcrError::BuildSubmissionFailed`].

use crate::azure::management::ManagementApi;
use crate::azure::models::{Build, OsType, QuickBuildRequest, Registry};
use crate::build::archive;
use crate::build::blob::{BlobClient, BlobLocation};
use crate::error::handlers::ValidationErrorHandler;
use crate::error::{AcrError, BuildStep, Result};
use crate::logging::Logger;
use reqwest::Client;
use std::path::{Component, Path, PathBuf};

/// Inputs of a quick build
#[derive(Debug, Clone)]
pub struct QuickBuildOptions {
    pub source_folder: PathBuf,
    /// Dockerfile path, absolute or relative to the source folder
    pub docker_file: PathBuf,
    pub image_names: Vec<String>,
    pub os_type: OsType,
    /// Where the temporary source archive is written
    pub temp_dir: PathBuf,
}

impl QuickBuildOptions {
    pub fn new(
        source_folder: impl Into<PathBuf>,
        docker_file: impl Into<PathBuf>,
        image_names: Vec<String>,
    ) -> Self {
        Self {
            source_folder: source_folder.into(),
            docker_file: docker_file.into(),
            image_names,
            os_type: OsType::from_host(std::env::consts::OS),
            temp_dir: std::env::temp_dir(),
        }
    }

    pub fn with_os_type(mut self, os_type: OsType) -> Self {
        self.os_type = os_type;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        ValidationErrorHandler::validate_source_folder(&self.source_folder)?;

        if self.image_names.is_empty() {
            return Err(AcrError::Validation("At least one image name is required".to_string()));
        }
        for image in &self.image_names {
            ValidationErrorHandler::validate_image_name(image)?;
        }

        Ok(())
    }
}

/// Dockerfile path relative to the source folder, with `/` separators
pub fn relative_docker_file_path(source_folder: &Path, docker_file: &Path) -> Result<String> {
    let candidate = if docker_file.is_absolute() {
        docker_file.to_path_buf()
    } else {
        source_folder.join(docker_file)
    };

    let folder = source_folder.canonicalize()?;
    let file = candidate.canonicalize().map_err(|_| {
        AcrError::Validation(format!("Dockerfile not found: {}", candidate.display()))
    })?;

    let relative = file.strip_prefix(&folder).map_err(|_| {
        AcrError::Validation(format!(
            "Dockerfile {} is not inside the source folder {}",
            file.display(),
            folder.display()
        ))
    })?;

    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        return Err(AcrError::Validation(format!("Dockerfile path is a directory: {}", file.display())));
    }

    Ok(parts.join("/"))
}

pub struct QuickBuildSubmitter<'a> {
    api: &'a dyn ManagementApi,
    blob: BlobClient,
    output: Logger,
}

impl<'a> QuickBuildSubmitter<'a> {
    pub fn new(api: &'a dyn ManagementApi, client: Client, output: Logger) -> Self {
        Self {
            api,
            blob: BlobClient::new(client, output.clone()),
            output,
        }
    }

    /// Run the whole flow and return the queued build
    pub async fn submit(&self, registry: &Registry, options: &QuickBuildOptions) -> Result<Build> {
        options.validate()?;
        let docker_file_path = relative_docker_file_path(&options.source_folder, &options.docker_file)?;

        self.output.section(&format!("Queueing build in {}", registry.name));

        let archive_path = options
            .temp_dir
            .join(format!("sourceArchive{}.tar.gz", uuid::Uuid::new_v4()));

        let result = self
            .run_steps(registry, options, &archive_path, docker_file_path)
            .await;

        match tokio::fs::remove_file(&archive_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => self.output.warning(&format!(
                "Failed to remove temporary archive {}: {}",
                archive_path.display(),
                e
            )),
        }

        match &result {
            Ok(build) => self
                .output
                .success(&format!("Build {} queued in {}", build.build_id(), registry.name)),
            Err(e) => self.output.error(&format!("Build submission failed: {}", e)),
        }

        result
    }

    async fn run_steps(
        &self,
        registry: &Registry,
        options: &QuickBuildOptions,
        archive_path: &Path,
        docker_file_path: String,
    ) -> Result<Build> {
        self.output.step("Archiving source folder");
        let size = archive::archive_source(&options.source_folder, archive_path)
            .await
            .map_err(|e| e.at_build_step(BuildStep::Archive))?;
        self.output
            .detail(&format!("Archive size: {}", self.output.format_size(size)));

        self.output.step("Requesting source upload location");
        let upload = self
            .api
            .get_build_source_upload_url(registry)
            .await
            .map_err(|e| e.at_build_step(BuildStep::RequestUploadUrl))?;

        let location =
            BlobLocation::parse(&upload.upload_url).map_err(|e| e.at_build_step(BuildStep::ParseUploadUrl))?;

        self.output.step("Uploading source archive");
        self.blob
            .upload_block_blob(&location, archive_path)
            .await
            .map_err(|e| e.at_build_step(BuildStep::Upload))?;

        self.output.step("Queueing build");
        let request = QuickBuildRequest::new(
            options.image_names.clone(),
            upload.relative_path,
            docker_file_path,
            options.os_type,
        );
        self.api
            .queue_build(registry, &request)
            .await
            .map_err(|e| e.at_build_step(BuildStep::QueueBuild))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_docker_file_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docker")).unwrap();
        std::fs::write(dir.path().join("docker").join("Dockerfile"), "FROM scratch\n").unwrap();

        let absolute = dir.path().join("docker").join("Dockerfile");
        assert_eq!(relative_docker_file_path(dir.path(), &absolute).unwrap(), "docker/Dockerfile");
        assert_eq!(
            relative_docker_file_path(dir.path(), Path::new("docker/Dockerfile")).unwrap(),
            "docker/Dockerfile"
        );
    }

    #[test]
    fn test_docker_file_outside_source_folder_is_rejected() {
        let source = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let docker_file = other.path().join("Dockerfile");
        std::fs::write(&docker_file, "FROM scratch\n").unwrap();

        assert!(matches!(
            relative_docker_file_path(source.path(), &docker_file),
            Err(AcrError::Validation(_))
        ));
    }

    #[test]
    fn test_options_require_tagged_image() {
        let dir = tempfile::tempdir().unwrap();
        let options = QuickBuildOptions::new(dir.path(), "Dockerfile", vec!["app".to_string()]);
        assert!(options.validate().is_err());

        let options = QuickBuildOptions::new(dir.path(), "Dockerfile", vec!["app:v1".to_string()]);
        assert!(options.validate().is_ok());
    }
}
