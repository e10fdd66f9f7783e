//! Deployment environment resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TopologyError, TopologyResult};

/// Variable holding the target account.
pub const ACCOUNT_VAR: &str = "CDK_DEFAULT_ACCOUNT";

/// Variable holding the target region.
pub const REGION_VAR: &str = "CDK_DEFAULT_REGION";

/// Account and region a stack is deployed into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    /// Create an environment, rejecting empty account or region.
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> TopologyResult<Self> {
        let account = account.into();
        let region = region.into();
        Self::check(Some(account), Some(region))
    }

    /// Resolve the environment from the process environment.
    pub fn from_env() -> TopologyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the environment through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> TopologyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let account = lookup(ACCOUNT_VAR);
        let region = lookup(REGION_VAR);
        let env = Self::check(account, region)?;
        debug!("Resolved environment {}", env);
        Ok(env)
    }

    fn check(account: Option<String>, region: Option<String>) -> TopologyResult<Self> {
        let account = account.map(|a| a.trim().to_string()).unwrap_or_default();
        let region = region.map(|r| r.trim().to_string()).unwrap_or_default();

        let mut missing = Vec::new();
        if account.is_empty() {
            missing.push(ACCOUNT_VAR.to_string());
        }
        if region.is_empty() {
            missing.push(REGION_VAR.to_string());
        }
        if !missing.is_empty() {
            return Err(TopologyError::MissingEnvironment(missing));
        }

        Ok(Self { account, region })
    }

    /// Environment URI used in the assembly manifest.
    pub fn uri(&self) -> String {
        format!("aws://{}/{}", self.account, self.region)
    }

    /// Availability zone names for the first `count` zones of the region.
    pub fn availability_zones(&self, count: u8) -> Vec<String> {
        (b'a'..=b'z')
            .take(usize::from(count))
            .map(|letter| format!("{}{}", self.region, letter as char))
            .collect()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}
