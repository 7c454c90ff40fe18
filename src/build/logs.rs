//! Build history and logs

use crate::azure::management::ManagementApi;
use crate::azure::models::{Build, Registry};
use crate::build::blob::BlobClient;
use crate::error::Result;
use crate::logging::Logger;
use reqwest::Client;

/// Which builds of a registry to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildLogFilter {
    All,
    /// Builds that pushed any image to this repository
    Repository(String),
    /// Builds that pushed any image with this tag
    Tag(String),
}

impl BuildLogFilter {
    pub fn matches(&self, build: &Build) -> bool {
        match self {
            BuildLogFilter::All => true,
            BuildLogFilter::Repository(name) => build
                .output_images()
                .any(|image| image.repository.as_deref() == Some(name.as_str())),
            BuildLogFilter::Tag(tag) => build
                .output_images()
                .any(|image| image.tag.as_deref() == Some(tag.as_str())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLineKind {
    Error,
    Success,
    Plain,
}

const ERROR_MARKERS: &[&str] = &["error", "fail"];
const SUCCESS_MARKERS: &[&str] = &["success", "succeeded", "complete", "0 warning(s)", "0 error(s)"];

/// Error markers win over success markers, except for the zero-count summaries
pub fn classify_line(line: &str) -> LogLineKind {
    let lower = line.to_lowercase();
    let without_zero_counts = lower.replace("0 error(s)", "").replace("0 warning(s)", "");

    if ERROR_MARKERS.iter().any(|marker| without_zero_counts.contains(marker)) {
        LogLineKind::Error
    } else if SUCCESS_MARKERS.iter().any(|marker| lower.contains(marker)) {
        LogLineKind::Success
    } else {
        LogLineKind::Plain
    }
}

#[derive(Debug, Clone)]
pub struct BuildLog {
    pub build_id: String,
    pub lines: Vec<(LogLineKind, String)>,
}

impl BuildLog {
    pub fn parse(build_id: impl Into<String>, text: &str) -> Self {
        Self {
            build_id: build_id.into(),
            lines: text
                .lines()
                .map(|line| (classify_line(line), line.to_string()))
                .collect(),
        }
    }

    /// Log lines for display; markers are added only when `decorate` is set
    pub fn rendered_lines(&self, decorate: bool) -> Vec<String> {
        self.lines
            .iter()
            .map(|(kind, line)| match (decorate, kind) {
                (true, LogLineKind::Error) => format!("❌ {}", line),
                (true, LogLineKind::Success) => format!("✅ {}", line),
                _ => line.clone(),
            })
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|(kind, _)| *kind == LogLineKind::Error)
            .count()
    }
}

pub struct BuildLogViewer<'a> {
    api: &'a dyn ManagementApi,
    blob: BlobClient,
    output: Logger,
}

impl<'a> BuildLogViewer<'a> {
    pub fn new(api: &'a dyn ManagementApi, client: Client, output: Logger) -> Self {
        Self {
            api,
            blob: BlobClient::new(client, output.clone()),
            output,
        }
    }

    /// Builds of a registry that pass `filter`, newest first as listed by the registry
    pub async fn list_builds(
        &self,
        registry: &Registry,
        filter: &BuildLogFilter,
        top: Option<usize>,
    ) -> Result<Vec<Build>> {
        let builds = self.api.list_builds(registry, top).await?;
        let total = builds.len();
        let matching: Vec<Build> = builds.into_iter().filter(|build| filter.matches(build)).collect();

        self.output.verbose(&format!(
            "{} of {} builds in {} match {:?}",
            matching.len(),
            total,
            registry.name,
            filter
        ));
        Ok(matching)
    }

    /// Download and classify the log of one build
    pub async fn fetch_log(&self, registry: &Registry, build_id: &str) -> Result<BuildLog> {
        let link = self.api.get_log_link(registry, build_id).await?;
        let text = self.blob.download_text(&link).await?;
        Ok(BuildLog::parse(build_id, &text))
    }

    /// Print every log line, quiet mode included
    pub fn render(&self, log: &BuildLog) {
        self.output.subsection(&format!("Build {}", log.build_id));
        for line in log.rendered_lines(!self.output.quiet) {
            self.output.line(&line);
        }
    }
}

/// One-line description of a build for listings
pub fn build_summary(build: &Build) -> String {
    let images: Vec<String> = build
        .output_images()
        .map(|image| {
            format!(
                "{}:{}",
                image.repository.as_deref().unwrap_or("<none>"),
                image.tag.as_deref().unwrap_or("<none>")
            )
        })
        .collect();

    format!(
        "{}  {}  {}  {}",
        build.build_id(),
        build.properties.status.as_deref().unwrap_or("Unknown"),
        build.properties.create_time.as_deref().unwrap_or("-"),
        if images.is_empty() { "-".to_string() } else { images.join(", ") }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::models::{BuildProperties, ImageDescriptor};

    fn build(id: &str, images: Vec<Option<(&str, &str)>>) -> Build {
        Build {
            id: String::new(),
            name: id.to_string(),
            properties: BuildProperties {
                build_id: id.to_string(),
                output_images: Some(
                    images
                        .into_iter()
                        .map(|image| {
                            image.map(|(repository, tag)| ImageDescriptor {
                                registry: None,
                                repository: Some(repository.to_string()),
                                tag: Some(tag.to_string()),
                                digest: None,
                            })
                        })
                        .collect(),
                ),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_repository_and_tag_filters() {
        let builds = vec![
            build("aa1", vec![Some(("app", "v1"))]),
            build("aa2", vec![Some(("web", "v1")), Some(("app", "v2"))]),
            build("aa3", vec![None]),
        ];

        let by_repo: Vec<&str> = builds
            .iter()
            .filter(|b| BuildLogFilter::Repository("app".to_string()).matches(b))
            .map(|b| b.build_id())
            .collect();
        assert_eq!(by_repo, vec!["aa1", "aa2"]);

        let by_tag: Vec<&str> = builds
            .iter()
            .filter(|b| BuildLogFilter::Tag("v1".to_string()).matches(b))
            .map(|b| b.build_id())
            .collect();
        assert_eq!(by_tag, vec!["aa1", "aa2"]);

        assert!(BuildLogFilter::All.matches(&builds[2]));
        assert!(!BuildLogFilter::Tag("v1".to_string()).matches(&builds[2]));
    }

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("Step 3/4 : RUN make"), LogLineKind::Plain);
        assert_eq!(classify_line("ERROR: build step failed"), LogLineKind::Error);
        assert_eq!(classify_line("Successfully tagged app:v1"), LogLineKind::Success);
        assert_eq!(classify_line("Run ID: aa1 was successful"), LogLineKind::Success);
        assert_eq!(classify_line("    0 Warning(s)"), LogLineKind::Success);
        assert_eq!(classify_line("    0 Error(s)"), LogLineKind::Success);
        assert_eq!(classify_line("    2 Error(s)"), LogLineKind::Error);
    }

    #[test]
    fn test_build_log_counts_errors() {
        let log = BuildLog::parse("aa1", "pulling\nfailed to fetch\ncomplete\n");
        assert_eq!(log.lines.len(), 3);
        assert_eq!(log.error_count(), 1);
    }

    #[test]
    fn test_summary_skips_null_images() {
        let summary = build_summary(&build("aa3", vec![None]));
        assert!(summary.starts_with("aa3  Unknown"));
        assert!(summary.ends_with('-'));
    }

    #[test]
    fn test_rendered_lines_keep_every_kind() {
        let log = BuildLog::parse("aa1", "Step 1/2 : FROM scratch\nerror pulling layer\nSuccessfully tagged app:v1");

        assert_eq!(
            log.rendered_lines(false),
            vec!["Step 1/2 : FROM scratch", "error pulling layer", "Successfully tagged app:v1"]
        );
        assert_eq!(
            log.rendered_lines(true),
            vec!["Step 1/2 : FROM scratch", "❌ error pulling layer", "✅ Successfully tagged app:v1"]
        );
    }
}
