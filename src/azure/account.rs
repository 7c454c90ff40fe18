//! Azure account, sessions and the tenant -> credential resolver
//!
//! An [`AzureAccount`] is built once (usually from a JSON profile) and passed by
//! reference to everything that needs credentials.

use crate::azure::credential::{AadTokenPair, CredentialSpec, TokenCredential};
use crate::azure::models::{Registry, Subscription};
use crate::error::{AcrError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Cloud environment descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub active_directory_endpoint: String,
    pub active_directory_resource_id: String,
    pub resource_manager_endpoint: String,
    pub portal_url: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            active_directory_endpoint: "https://login.microsoftonline.com/".to_string(),
            active_directory_resource_id: "https://management.core.windows.net/".to_string(),
            resource_manager_endpoint: "https://management.azure.com/".to_string(),
            portal_url: "https://portal.azure.com".to_string(),
        }
    }
}

/// A signed-in tenant with its credential
#[derive(Clone)]
pub struct Session {
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub environment: Environment,
    credential: Arc<dyn TokenCredential>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        tenant_id: impl Into<String>,
        environment: Environment,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: None,
            environment,
            credential,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn credential(&self) -> Arc<dyn TokenCredential> {
        Arc::clone(&self.credential)
    }

    /// AAD tokens for the environment's active-directory resource
    pub async fn acquire_token(&self) -> Result<AadTokenPair> {
        self.credential
            .acquire_token(&self.environment.active_directory_resource_id)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct SessionEntry {
    tenant_id: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    environment: Environment,
    credential: CredentialSpec,
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    sessions: Vec<SessionEntry>,
    #[serde(default)]
    subscriptions: Vec<Subscription>,
}

/// Sessions plus the filtered subscription list
#[derive(Debug, Clone, Default)]
pub struct AzureAccount {
    sessions: Vec<Session>,
    subscriptions: Vec<Subscription>,
}

impl AzureAccount {
    pub fn new(sessions: Vec<Session>, subscriptions: Vec<Subscription>) -> Self {
        Self {
            sessions,
            subscriptions,
        }
    }

    /// Load the account from a JSON profile file
    pub fn load_profile(path: &Path, client: &reqwest::Client) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AcrError::Configuration(format!("Failed to read profile {}: {}", path.display(), e))
        })?;
        Self::from_profile_json(&content, client)
    }

    pub fn from_profile_json(content: &str, client: &reqwest::Client) -> Result<Self> {
        let profile: ProfileFile = serde_json::from_str(content)
            .map_err(|e| AcrError::Configuration(format!("Invalid profile: {}", e)))?;

        let sessions = profile
            .sessions
            .into_iter()
            .map(|entry| {
                let credential = entry.credential.into_credential(
                    client,
                    &entry.environment.active_directory_endpoint,
                    &entry.tenant_id,
                );
                let mut session = Session::new(entry.tenant_id, entry.environment, credential);
                session.user_id = entry.user_id;
                session
            })
            .collect();

        Ok(Self::new(sessions, profile.subscriptions))
    }

    pub fn is_logged_in(&self) -> bool {
        !self.sessions.is_empty()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Case-insensitive tenant lookup
    pub fn session_for_tenant(&self, tenant_id: &str) -> Result<&Session> {
        self.sessions
            .iter()
            .find(|s| s.tenant_id.eq_ignore_ascii_case(tenant_id))
            .ok_or_else(|| AcrError::CredentialNotFound {
                tenant_id: tenant_id.to_string(),
            })
    }

    pub fn credential_for_tenant(&self, tenant_id: &str) -> Result<Arc<dyn TokenCredential>> {
        Ok(self.session_for_tenant(tenant_id)?.credential())
    }

    pub fn subscription(&self, subscription_id: &str) -> Result<&Subscription> {
        self.subscriptions
            .iter()
            .find(|s| s.subscription_id.eq_ignore_ascii_case(subscription_id))
            .ok_or_else(|| AcrError::SubscriptionNotFound(subscription_id.to_string()))
    }

    /// Subscription a registry lives in, from its resource ID
    pub fn subscription_for_registry(&self, registry: &Registry) -> Result<&Subscription> {
        let subscription_id = registry.subscription_id()?;
        self.subscription(&subscription_id)
    }

    pub fn session_for_registry(&self, registry: &Registry) -> Result<&Session> {
        let subscription = self.subscription_for_registry(registry)?;
        self.session_for_tenant(&subscription.tenant_id)
    }

    /// Portal link for a registry, or its repository blade
    pub fn portal_url(&self, registry: &Registry, repository_blade: bool) -> Result<String> {
        let subscription = self.subscription_for_registry(registry)?;
        let session = self.session_for_tenant(&subscription.tenant_id)?;

        let mut url = format!(
            "{}/{}/#resource{}",
            session.environment.portal_url.trim_end_matches('/'),
            subscription.tenant_id,
            registry.id
        );
        if repository_blade {
            url.push_str("/repository");
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::credential::StaticTokenCredential;

    fn account() -> AzureAccount {
        let session = Session::new(
            "Tenant-ABC",
            Environment::default(),
            Arc::new(StaticTokenCredential::new("aadAT", "aadRT")),
        );
        let subscription = Subscription {
            subscription_id: "sub1".to_string(),
            tenant_id: "tenant-abc".to_string(),
            display_name: "Dev".to_string(),
        };
        AzureAccount::new(vec![session], vec![subscription])
    }

    fn registry() -> Registry {
        Registry::new(
            "/subscriptions/sub1/resourceGroups/rg/providers/Microsoft.ContainerRegistry/registries/myreg",
            "myreg",
            "myreg.azurecr.io",
        )
    }

    #[test]
    fn test_tenant_lookup_is_case_insensitive() {
        let account = account();
        assert!(account.session_for_tenant("tenant-abc").is_ok());
        assert!(account.session_for_tenant("TENANT-ABC").is_ok());
    }

    #[test]
    fn test_unknown_tenant_is_credential_not_found() {
        let account = account();
        match account.credential_for_tenant("other") {
            Err(AcrError::CredentialNotFound { tenant_id }) => assert_eq!(tenant_id, "other"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_session_for_registry() {
        let account = account();
        let session = account.session_for_registry(&registry()).unwrap();
        assert_eq!(session.tenant_id, "Tenant-ABC");
    }

    #[test]
    fn test_portal_url() {
        let account = account();
        let url = account.portal_url(&registry(), true).unwrap();
        assert_eq!(
            url,
            "https://portal.azure.com/tenant-abc/#resource/subscriptions/sub1/resourceGroups/rg/providers/Microsoft.ContainerRegistry/registries/myreg/repository"
        );
    }

    #[test]
    fn test_profile_json() {
        let client = reqwest::Client::new();
        let account = AzureAccount::from_profile_json(
            r#"{
                "sessions": [{
                    "tenant_id": "t1",
                    "credential": {"type": "static", "access_token": "a", "refresh_token": "r"}
                }],
                "subscriptions": [{"subscription_id": "s1", "tenant_id": "t1", "display_name": "One"}]
            }"#,
            &client,
        )
        .unwrap();

        assert!(account.is_logged_in());
        assert_eq!(account.subscriptions().len(), 1);
        assert_eq!(
            account.sessions()[0].environment.resource_manager_endpoint,
            "https://management.azure.com/"
        );
    }
}
