//! Registry-side data types: repositories and tagged images

use crate::azure::models::Registry;
use crate::registry::token_exchange::AcrTokenPair;

/// A repository together with the tokens used to list it
#[derive(Debug, Clone)]
pub struct Repository {
    pub registry: Registry,
    pub name: String,
    pub tokens: AcrTokenPair,
}

impl Repository {
    pub fn new(registry: Registry, name: impl Into<String>, tokens: AcrTokenPair) -> Self {
        Self {
            registry,
            name: name.into(),
            tokens,
        }
    }

    /// `<loginServer>/<name>`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.registry.login_server(), self.name)
    }
}

/// One tag in a repository
#[derive(Debug, Clone)]
pub struct AzureImage {
    pub registry: Registry,
    pub repository: String,
    pub tag: String,
    pub tokens: AcrTokenPair,
}

impl AzureImage {
    /// `<repository>:<tag>`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }

    /// `<loginServer>/<repository>:<tag>`, the name used with `docker pull`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.registry.login_server(), self.reference())
    }
}
