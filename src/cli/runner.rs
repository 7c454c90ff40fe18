//! Command runner: loads the account, builds the clients and dispatches commands

use crate::azure::account::AzureAccount;
use crate::azure::enumerate::{Enumeration, RegistryScope, ResourceEnumerator};
use crate::azure::management::{ArmClient, ManagementApi};
use crate::azure::models::{OsType, Registry, Subscription};
use crate::build::logs::{BuildLogFilter, BuildLogViewer, build_summary};
use crate::build::submit::{QuickBuildOptions, QuickBuildSubmitter};
use crate::build::tasks::{
    BuildTaskRequest, build_task_summary, create_build_task, list_build_tasks, run_build_task,
};
use crate::cli::args::{Args, Command, RegistryTarget};
use crate::config::AcrConfig;
use crate::error::{AcrError, Result};
use crate::logging::Logger;
use crate::registry::catalog::CatalogClient;
use crate::registry::credentials::{CredentialResolver, LoginCredentials};
use crate::registry::docker::{DockerCli, image_reference};
use crate::registry::token_exchange::TokenExchangeClient;
use reqwest::Client;
use std::io::{BufRead, Write};

/// Ask on stdout and read the answer; anything but yes cancels
pub fn confirm_with<R: BufRead>(prompt: &str, assume_yes: bool, input: &mut R) -> Result<()> {
    if assume_yes {
        return Ok(());
    }

    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(()),
        _ => Err(AcrError::UserCancelled),
    }
}

/// A username/password pair given on the command line
fn explicit_credentials(username: Option<&str>, password: Option<&str>) -> Option<LoginCredentials> {
    match (username, password) {
        (Some(username), Some(password)) => Some(LoginCredentials::new(username, password)),
        _ => None,
    }
}

/// Clients shared by every command of one run
struct Clients<'a> {
    http: Client,
    account: &'a AzureAccount,
    api: &'a dyn ManagementApi,
    tokens: &'a TokenExchangeClient,
}

pub struct Runner {
    args: Args,
    config: AcrConfig,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        let config = args.apply_to(AcrConfig::from_env()?);
        config.validate()?;

        Ok(Self { args, config, output })
    }

    pub fn output(&self) -> &Logger {
        &self.output
    }

    pub async fn run(&self) -> Result<()> {
        let http = self.config.http_client()?;
        let profile = self.config.profile_path()?;
        self.output
            .verbose(&format!("Loading account profile {}", profile.display()));

        let account = AzureAccount::load_profile(profile, &http)?;
        if !account.is_logged_in() {
            return Err(AcrError::Configuration(
                "Account profile has no sessions; sign in to Azure first".to_string(),
            ));
        }

        let api = ArmClient::new(http.clone(), &account, self.output.clone());
        let tokens = TokenExchangeClient::new(http.clone(), self.output.clone())
            .with_refresh_token_cache(self.config.cache_refresh_tokens);

        let clients = Clients {
            http,
            account: &account,
            api: &api,
            tokens: &tokens,
        };

        self.dispatch(&clients).await?;

        self.output.verbose(&format!(
            "Completed in {}",
            self.output.format_duration(self.output.elapsed())
        ));
        Ok(())
    }

    async fn dispatch(&self, clients: &Clients<'_>) -> Result<()> {
        match &self.args.command {
            Command::Subscriptions => {
                self.list_subscriptions(clients);
                Ok(())
            }
            Command::ResourceGroups { subscription } => {
                self.list_resource_groups(clients, subscription.as_deref()).await
            }
            Command::Registries {
                subscription,
                resource_group,
                sort,
            } => {
                self.list_registries(clients, subscription.as_deref(), resource_group.as_deref(), *sort)
                    .await
            }
            Command::Repos { target } => self.list_repositories(clients, target).await,
            Command::Tags { target, repository } => self.list_tags(clients, target, repository).await,
            Command::DeleteImage {
                target,
                repository,
                tag,
            } => self.delete_image(clients, target, repository, tag).await,
            Command::DeleteRepo { target, repository } => {
                self.delete_repository(clients, target, repository).await
            }
            Command::Credentials {
                target,
                username,
                password,
                docker_config,
            } => {
                let explicit = explicit_credentials(username.as_deref(), password.as_deref());
                self.print_credentials(clients, target, explicit, *docker_config).await
            }
            Command::Pull {
                target,
                repository,
                tag,
                username,
                password,
            } => {
                let explicit = explicit_credentials(username.as_deref(), password.as_deref());
                self.pull_image(clients, target, repository, tag, explicit).await
            }
            Command::Build {
                target,
                source,
                dockerfile,
                images,
                os,
            } => {
                let registry = self.find_registry(clients, target).await?;
                let mut options = QuickBuildOptions::new(source.clone(), dockerfile.clone(), images.clone());
                if let Some(os) = os {
                    options = options.with_os_type(OsType::from(*os));
                }

                let submitter = QuickBuildSubmitter::new(clients.api, clients.http.clone(), self.output.clone());
                let build = submitter.submit(&registry, &options).await?;
                self.output.line(build.build_id());
                Ok(())
            }
            Command::Logs {
                target,
                repository,
                tag,
                build_id,
                top,
            } => {
                let filter = match (repository, tag) {
                    (Some(repository), _) => BuildLogFilter::Repository(repository.clone()),
                    (None, Some(tag)) => BuildLogFilter::Tag(tag.clone()),
                    (None, None) => BuildLogFilter::All,
                };
                self.show_logs(clients, target, filter, build_id.as_deref(), *top).await
            }
            Command::CreateRegistry {
                subscription,
                resource_group,
                name,
                sku,
                location,
            } => {
                self.create_registry(clients, subscription, resource_group, name, sku.as_str(), location)
                    .await
            }
            Command::CreateTask {
                target,
                name,
                alias,
                git_url,
                images,
                dockerfile,
                os,
            } => {
                let registry = self.find_registry(clients, target).await?;
                let request = BuildTaskRequest {
                    task_name: name.clone(),
                    alias: alias.clone(),
                    git_url: git_url.clone(),
                    image_names: images.clone(),
                    docker_file_path: dockerfile.clone(),
                    os_type: OsType::from(*os),
                };
                create_build_task(clients.api, &registry, &request, &self.output).await
            }
            Command::Tasks { target } => {
                let registry = self.find_registry(clients, target).await?;
                self.output.section(&format!("Build tasks in {}", registry.name));
                for task in list_build_tasks(clients.api, &registry, &self.output).await? {
                    self.output.line(&build_task_summary(&task));
                }
                Ok(())
            }
            Command::ShowTask { target, name } => {
                let registry = self.find_registry(clients, target).await?;
                let task = clients.api.get_build_task(&registry, name).await?;
                self.output.line(&serde_json::to_string_pretty(&task)?);
                Ok(())
            }
            Command::RunTask { target, name } => {
                let registry = self.find_registry(clients, target).await?;
                let build = run_build_task(clients.api, &registry, name, &self.output).await?;
                self.output.line(build.build_id());
                Ok(())
            }
        }
    }

    fn list_subscriptions(&self, clients: &Clients<'_>) {
        self.output.section("Subscriptions");
        for subscription in clients.account.subscriptions() {
            self.output.line(&format!(
                "{}  {}  (tenant {})",
                subscription.subscription_id, subscription.display_name, subscription.tenant_id
            ));
        }
    }

    fn selected_subscriptions(
        &self,
        clients: &Clients<'_>,
        subscription: Option<&str>,
    ) -> Result<Vec<Subscription>> {
        match subscription {
            Some(id) => Ok(vec![clients.account.subscription(id)?.clone()]),
            None => Ok(clients.account.subscriptions().to_vec()),
        }
    }

    async fn list_resource_groups(&self, clients: &Clients<'_>, subscription: Option<&str>) -> Result<()> {
        let subscriptions = self.selected_subscriptions(clients, subscription)?;
        let enumerator = ResourceEnumerator::new(clients.api, self.config.pool.clone(), self.output.clone());

        self.output.section("Resource groups");
        let enumeration = enumerator.list_resource_groups(&subscriptions).await;
        self.report_failures(&enumeration);

        for group in enumeration.into_result()? {
            self.output.line(&format!("{}  {}", group.name, group.location));
        }
        Ok(())
    }

    async fn list_registries(
        &self,
        clients: &Clients<'_>,
        subscription: Option<&str>,
        resource_group: Option<&str>,
        sort: bool,
    ) -> Result<()> {
        let enumerator = ResourceEnumerator::new(clients.api, self.config.pool.clone(), self.output.clone());
        let selected = subscription
            .map(|id| clients.account.subscription(id))
            .transpose()?;

        let scope = match (selected, resource_group) {
            (Some(subscription), Some(group)) => RegistryScope::ResourceGroup(subscription, group),
            (Some(subscription), None) => RegistryScope::Subscription(subscription),
            (None, _) => RegistryScope::AllSubscriptions,
        };

        self.output.section("Registries");
        let enumeration = enumerator
            .registries(scope, clients.account.subscriptions(), sort)
            .await?;
        self.report_failures(&enumeration);

        for registry in enumeration.into_result()? {
            let sku = registry
                .sku
                .as_ref()
                .map(|sku| sku.name.as_str())
                .unwrap_or("-");
            self.output.line(&format!(
                "{}  {}  {}  {}",
                registry.name,
                registry.login_server(),
                registry.location,
                sku
            ));
        }
        Ok(())
    }

    async fn list_repositories(&self, clients: &Clients<'_>, target: &RegistryTarget) -> Result<()> {
        let registry = self.find_registry(clients, target).await?;
        let catalog = self.catalog(clients);

        self.output
            .section(&format!("Repositories in {}", registry.login_server()));
        for repository in catalog.list_repositories(&registry).await? {
            self.output.line(&repository.name);
        }
        Ok(())
    }

    async fn list_tags(&self, clients: &Clients<'_>, target: &RegistryTarget, repository: &str) -> Result<()> {
        let registry = self.find_registry(clients, target).await?;
        let catalog = self.catalog(clients);

        self.output
            .section(&format!("Tags in {}/{}", registry.login_server(), repository));
        for image in catalog.list_tags_by_name(&registry, repository).await? {
            self.output.line(&image.full_name());
        }
        Ok(())
    }

    async fn delete_image(
        &self,
        clients: &Clients<'_>,
        target: &RegistryTarget,
        repository: &str,
        tag: &str,
    ) -> Result<()> {
        let registry = self.find_registry(clients, target).await?;
        self.confirm(&format!(
            "Delete image {}/{}:{}? This removes the tag from the registry.",
            registry.login_server(),
            repository,
            tag
        ))?;

        self.catalog(clients).delete_image(&registry, repository, tag).await
    }

    async fn delete_repository(&self, clients: &Clients<'_>, target: &RegistryTarget, repository: &str) -> Result<()> {
        let registry = self.find_registry(clients, target).await?;
        self.confirm(&format!(
            "Delete repository {}/{} and all of its images?",
            registry.login_server(),
            repository
        ))?;

        self.catalog(clients).delete_repository(&registry, repository).await
    }

    async fn print_credentials(
        &self,
        clients: &Clients<'_>,
        target: &RegistryTarget,
        explicit: Option<LoginCredentials>,
        docker_config: bool,
    ) -> Result<()> {
        let registry = self.find_registry(clients, target).await?;
        let resolver = CredentialResolver::new(clients.api, clients.tokens, clients.account, self.output.clone());
        let credentials = resolver.login_credentials(&registry, explicit).await?;

        if docker_config {
            let entry = credentials.docker_config_entry(registry.login_server());
            self.output.line(&serde_json::to_string_pretty(&entry)?);
        } else {
            self.output.summary_kv(
                "Login credentials",
                &[
                    ("Server", registry.login_server().to_string()),
                    ("Username", credentials.username.clone()),
                ],
            );
            self.output.line(&credentials.password);
            self.output
                .info(&credentials.docker_login_command(registry.login_server()));
        }
        Ok(())
    }

    async fn pull_image(
        &self,
        clients: &Clients<'_>,
        target: &RegistryTarget,
        repository: &str,
        tag: &str,
        explicit: Option<LoginCredentials>,
    ) -> Result<()> {
        let registry = self.find_registry(clients, target).await?;
        let resolver = CredentialResolver::new(clients.api, clients.tokens, clients.account, self.output.clone());
        let credentials = resolver.login_credentials(&registry, explicit).await?;

        let reference = image_reference(registry.login_server(), repository, tag);
        self.output.section(&format!("Pulling {}", reference));
        DockerCli::new(self.output.clone())
            .login_and_pull(registry.login_server(), &credentials, &reference)
            .await
    }

    async fn show_logs(
        &self,
        clients: &Clients<'_>,
        target: &RegistryTarget,
        filter: BuildLogFilter,
        build_id: Option<&str>,
        top: Option<usize>,
    ) -> Result<()> {
        let registry = self.find_registry(clients, target).await?;
        let viewer = BuildLogViewer::new(clients.api, clients.http.clone(), self.output.clone());

        if let Some(build_id) = build_id {
            let log = viewer.fetch_log(&registry, build_id).await?;
            viewer.render(&log);
            if log.error_count() > 0 {
                self.output
                    .warning(&format!("{} error lines in build {}", log.error_count(), build_id));
            }
            return Ok(());
        }

        self.output.section(&format!("Builds in {}", registry.name));
        for build in viewer.list_builds(&registry, &filter, top).await? {
            self.output.line(&build_summary(&build));
        }
        Ok(())
    }

    async fn create_registry(
        &self,
        clients: &Clients<'_>,
        subscription_id: &str,
        resource_group: &str,
        name: &str,
        sku: &str,
        location: &str,
    ) -> Result<()> {
        let subscription = clients.account.subscription(subscription_id)?;

        self.output.section(&format!("Creating registry {}", name));
        self.output.step("Checking name availability");
        let status = clients.api.check_name_availability(subscription, name).await?;
        if !status.name_available {
            return Err(AcrError::Validation(status.message.unwrap_or_else(|| {
                format!("Registry name {} is not available", name)
            })));
        }

        let locations = clients.api.list_locations(subscription).await?;
        let location = locations
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(location) || l.display_name.eq_ignore_ascii_case(location))
            .map(|l| l.name.as_str())
            .ok_or_else(|| {
                AcrError::Validation(format!(
                    "Location {} is not available in subscription {}",
                    location, subscription.subscription_id
                ))
            })?;

        self.output.step(&format!("Creating {} registry in {}", sku, location));
        let registry = clients
            .api
            .create_registry(subscription, resource_group, name, sku, location)
            .await?;

        self.output
            .success(&format!("Registry {} created", registry.name));
        self.output.line(registry.login_server());
        if let Ok(url) = clients.account.portal_url(&registry, false) {
            self.output.info(&format!("Portal: {}", url));
        }
        Ok(())
    }

    /// Locate a registry by name within the target's subscription scope
    async fn find_registry(&self, clients: &Clients<'_>, target: &RegistryTarget) -> Result<Registry> {
        let enumerator = ResourceEnumerator::new(clients.api, self.config.pool.clone(), self.output.clone());
        let selected = target
            .subscription
            .as_deref()
            .map(|id| clients.account.subscription(id))
            .transpose()?;

        let scope = match (selected, target.resource_group.as_deref()) {
            (Some(subscription), Some(group)) => RegistryScope::ResourceGroup(subscription, group),
            (Some(subscription), None) => RegistryScope::Subscription(subscription),
            (None, _) => RegistryScope::AllSubscriptions,
        };

        let enumeration = enumerator
            .registries(scope, clients.account.subscriptions(), false)
            .await?;
        let skipped = enumeration.failures.len();

        enumeration
            .items
            .into_iter()
            .find(|registry| registry.name.eq_ignore_ascii_case(&target.registry))
            .ok_or_else(|| {
                let mut message = format!("Registry {} not found", target.registry);
                if skipped > 0 {
                    message.push_str(&format!(" ({} subscriptions could not be searched)", skipped));
                }
                AcrError::Validation(message)
            })
    }

    fn catalog<'a>(&self, clients: &Clients<'a>) -> CatalogClient<'a> {
        CatalogClient::new(clients.http.clone(), clients.tokens, clients.account, self.output.clone())
    }

    fn confirm(&self, prompt: &str) -> Result<()> {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        confirm_with(prompt, self.args.yes, &mut input)
    }

    fn report_failures<T>(&self, enumeration: &Enumeration<T>) {
        if !enumeration.is_complete() {
            self.output.warning(&format!(
                "{} subscriptions could not be listed; results are partial",
                enumeration.failures.len()
            ));
        }
    }
}
