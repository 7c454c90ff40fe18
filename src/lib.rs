//! Azure Container Registry Toolkit Library
//!
//! This file serves as the library root for the acr-toolkit crate, organizing
//! and exposing the modules behind the `acr` command: Azure account and
//! management access, registry token exchange and catalog operations, quick
//! builds, and the bounded subscription fan-out.

pub mod azure;
pub mod build;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod logging;
pub mod registry;

pub use config::AcrConfig;
pub use error::{AcrError, Result};
pub use logging::Logger;
