//! Command-line argument parsing

use crate::azure::models::OsType;
use crate::config::AcrConfig;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "acr")]
#[command(about = "Browse Azure Container Registries and queue ACR builds")]
#[command(version, author)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Azure account profile
    #[arg(long = "profile", global = true, help = "Path to the Azure account profile (JSON)")]
    pub profile: Option<PathBuf>,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet mode
    #[arg(long = "quiet", short = 'q', global = true, help = "Only print results and errors")]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long = "yes", short = 'y', global = true, help = "Do not ask before deleting")]
    pub yes: bool,

    /// Timeout in seconds for network operations
    #[arg(long = "timeout", short = 't', global = true, help = "Timeout for network operations in seconds")]
    pub timeout: Option<u64>,

    /// Skip TLS verification
    #[arg(long = "skip-tls", short = 'k', global = true, help = "Skip TLS certificate verification")]
    pub skip_tls: bool,

    /// Reuse registry refresh tokens within one run
    #[arg(long = "cache-tokens", global = true, help = "Cache ACR refresh tokens per registry")]
    pub cache_tokens: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List subscriptions in the profile
    Subscriptions,

    /// List resource groups
    ResourceGroups {
        #[arg(long, short = 's', help = "Only this subscription")]
        subscription: Option<String>,
    },

    /// List container registries
    Registries {
        #[arg(long, short = 's', help = "Only this subscription")]
        subscription: Option<String>,
        #[arg(long, short = 'g', requires = "subscription", help = "Only this resource group")]
        resource_group: Option<String>,
        #[arg(long, help = "Sort registries by name")]
        sort: bool,
    },

    /// List repositories of a registry
    Repos {
        #[command(flatten)]
        target: RegistryTarget,
    },

    /// List tags of a repository
    Tags {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, help = "Repository name")]
        repository: String,
    },

    /// Delete one tag of a repository
    DeleteImage {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, help = "Repository name")]
        repository: String,
        #[arg(long, help = "Tag to delete")]
        tag: String,
    },

    /// Delete a repository with all of its tags
    DeleteRepo {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, help = "Repository name")]
        repository: String,
    },

    /// Print docker login credentials for a registry
    Credentials {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, short = 'u', requires = "password", help = "Use this username instead")]
        username: Option<String>,
        #[arg(long, short = 'p', requires = "username", help = "Use this password instead")]
        password: Option<String>,
        #[arg(long, help = "Print a docker config.json auths entry")]
        docker_config: bool,
    },

    /// Log in with docker and pull an image from a registry
    Pull {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, help = "Repository name")]
        repository: String,
        #[arg(long, default_value = "latest", help = "Tag to pull")]
        tag: String,
        #[arg(long, short = 'u', requires = "password", help = "Use this username instead")]
        username: Option<String>,
        #[arg(long, short = 'p', requires = "username", help = "Use this password instead")]
        password: Option<String>,
    },

    /// Queue a quick build from a local folder
    Build {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, default_value = ".", help = "Source folder to upload")]
        source: PathBuf,
        #[arg(long, short = 'f', default_value = "Dockerfile", help = "Dockerfile inside the source folder")]
        dockerfile: PathBuf,
        #[arg(long = "image", short = 'i', required = true, help = "Image name as <name>:<tag>")]
        images: Vec<String>,
        #[arg(long, value_enum, help = "Build platform, defaults to the host OS")]
        os: Option<Platform>,
    },

    /// Show build history and logs
    Logs {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, conflicts_with = "tag", help = "Only builds that pushed this repository")]
        repository: Option<String>,
        #[arg(long, help = "Only builds that pushed this tag")]
        tag: Option<String>,
        #[arg(long, help = "Print the log of this build")]
        build_id: Option<String>,
        #[arg(long, help = "Number of most recent builds to list")]
        top: Option<usize>,
    },

    /// Create a container registry
    CreateRegistry {
        #[arg(long, short = 's', help = "Subscription ID")]
        subscription: String,
        #[arg(long, short = 'g', help = "Resource group")]
        resource_group: String,
        #[arg(long, help = "Registry name")]
        name: String,
        #[arg(long, value_enum, default_value = "basic", help = "Registry SKU")]
        sku: SkuTier,
        #[arg(long, help = "Azure location, e.g. westus")]
        location: String,
    },

    /// Create a GitHub-triggered build task
    CreateTask {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, help = "Build task name")]
        name: String,
        #[arg(long, default_value = "", help = "Build task alias")]
        alias: String,
        #[arg(long, help = "GitHub repository URL")]
        git_url: String,
        #[arg(long = "image", short = 'i', required = true, help = "Image name as <name>:<tag>")]
        images: Vec<String>,
        #[arg(long, short = 'f', default_value = "Dockerfile", help = "Dockerfile path in the repository")]
        dockerfile: String,
        #[arg(long, value_enum, default_value = "linux", help = "Build platform")]
        os: Platform,
    },

    /// List build tasks of a registry
    Tasks {
        #[command(flatten)]
        target: RegistryTarget,
    },

    /// Show the properties of a build task
    ShowTask {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, help = "Build task name")]
        name: String,
    },

    /// Queue a build of an existing build task
    RunTask {
        #[command(flatten)]
        target: RegistryTarget,
        #[arg(long, help = "Build task name")]
        name: String,
    },
}

/// How a command finds its registry
#[derive(ClapArgs, Debug, Clone)]
pub struct RegistryTarget {
    #[arg(long, short = 'r', help = "Registry name")]
    pub registry: String,
    #[arg(long, short = 's', help = "Subscription ID to look in")]
    pub subscription: Option<String>,
    #[arg(long, short = 'g', requires = "subscription", help = "Resource group to look in")]
    pub resource_group: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
}

impl From<Platform> for OsType {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Linux => OsType::Linux,
            Platform::Windows => OsType::Windows,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkuTier {
    Basic,
    Standard,
    Premium,
}

impl SkuTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkuTier::Basic => "Basic",
            SkuTier::Standard => "Standard",
            SkuTier::Premium => "Premium",
        }
    }
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Apply command-line overrides on top of a configuration
    pub fn apply_to(&self, mut config: AcrConfig) -> AcrConfig {
        if let Some(profile) = &self.profile {
            config.profile = Some(profile.clone());
        }
        if let Some(timeout) = self.timeout {
            config.http.timeout = Some(timeout);
        }
        if self.skip_tls {
            config.http.skip_tls = true;
        }
        if self.cache_tokens {
            config.cache_refresh_tokens = true;
        }
        config
    }
}
