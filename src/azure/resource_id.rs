//! Azure resource ID parsing
//!
//! Registry resource IDs look like
//! `/subscriptions/{id}/resourceGroups/{name}/providers/{namespace}/{type}/{name}`.

use crate::error::{AcrError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: String,
    pub resource_type: String,
    pub name: String,
}

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self> {
        let malformed = |reason: &str| AcrError::MalformedResourceId(format!("{} ({})", id, reason));

        let segments: Vec<&str> = id.trim_end_matches('/').split('/').collect();
        // Leading '/' yields an empty first segment
        if segments.len() < 9 || !segments[0].is_empty() {
            return Err(malformed("expected /subscriptions/{id}/resourceGroups/{name}/providers/..."));
        }

        if !segments[1].eq_ignore_ascii_case("subscriptions") {
            return Err(malformed("missing subscriptions segment"));
        }
        if !segments[3].eq_ignore_ascii_case("resourceGroups") {
            return Err(malformed("missing resourceGroups segment"));
        }
        if !segments[5].eq_ignore_ascii_case("providers") {
            return Err(malformed("missing providers segment"));
        }

        if segments[1..].iter().any(|s| s.is_empty()) {
            return Err(malformed("empty path segment"));
        }

        Ok(Self {
            subscription_id: segments[2].to_string(),
            resource_group: segments[4].to_string(),
            provider: segments[6].to_string(),
            resource_type: segments[7].to_string(),
            name: segments[8..].join("/"),
        })
    }
}

impl FromStr for ResourceId {
    type Err = AcrError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription_id, self.resource_group, self.provider, self.resource_type, self.name
        )
    }
}
