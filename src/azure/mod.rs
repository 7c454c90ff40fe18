//! Azure account, credentials and Resource Manager access
//!
//! This module resolves sessions and credentials per tenant, parses resource IDs,
//! talks to the management API, and fans listings out across subscriptions.

pub mod account;
pub mod credential;
pub mod enumerate;
pub mod management;
pub mod models;
pub mod resource_id;

pub use account::{AzureAccount, Environment, Session};
pub use credential::{AadTokenPair, StaticTokenCredential, TokenCredential};
pub use enumerate::{Enumeration, RegistryScope, ResourceEnumerator, SubscriptionFailure};
pub use management::{ArmClient, ManagementApi};
pub use models::{Registry, ResourceGroup, Subscription};
pub use resource_id::ResourceId;
