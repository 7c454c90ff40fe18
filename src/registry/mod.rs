//! Registry module for Azure Container Registry data-plane interactions
//!
//! This module exchanges Azure AD tokens for registry tokens and uses them
//! against the registry's catalog, tag and delete endpoints, and drives the
//! docker CLI for login and pull.

pub mod catalog;
pub mod credentials;
pub mod docker;
pub mod models;
pub mod token_exchange;

pub use catalog::CatalogClient;
pub use credentials::{CredentialResolver, LoginCredentials, TOKEN_USERNAME};
pub use docker::{DockerCli, image_reference};
pub use models::{AzureImage, Repository};
pub use token_exchange::{AcrTokenPair, RegistryEndpoint, Scope, TokenExchangeClient};
