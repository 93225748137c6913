//! Process-wide service endpoint defaults.
//!
//! Individual accounts may override these (see [`crate::routing`]); an unset
//! field falls through to the provider's built-in endpoint.
//!
//! # Example
//!
//! ```toml
//! [endpoints]
//! use_custom_resolver = true
//! compute = "compute.private-api.example.net:443"
//! iam = "iam.private-api.example.net:443"
//! resource_manager = "resource-manager.private-api.example.net:443"
//! ```

use serde::{Deserialize, Serialize};

use super::{
    ConfigError,
    env::{EnvSource, bool_var},
};

/// Environment variable holding the default compute endpoint.
pub const COMPUTE_ENDPOINT_VAR: &str = "YC_COMPUTE_ENDPOINT";
/// Environment variable holding the default IAM endpoint.
pub const IAM_ENDPOINT_VAR: &str = "YC_IAM_ENDPOINT";
/// Environment variable holding the default resource-manager endpoint.
pub const RM_ENDPOINT_VAR: &str = "YC_RM_ENDPOINT";
/// Environment variable toggling endpoint overrides.
pub const CUSTOM_RESOLVER_VAR: &str = "YC_CUSTOM_SERVICE_ENDPOINT_RESOLVER";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EndpointsConfig {
    /// Whether accounts use overridden endpoints unless they say otherwise.
    /// Default: false (always use the provider's public endpoints)
    #[serde(default)]
    pub use_custom_resolver: bool,

    /// Default endpoint for the compute API (images).
    #[serde(default)]
    pub compute: Option<String>,

    /// Default endpoint for the IAM API (token exchange).
    #[serde(default)]
    pub iam: Option<String>,

    /// Default endpoint for the resource-manager API (folders).
    #[serde(default)]
    pub resource_manager: Option<String>,
}

impl EndpointsConfig {
    /// Apply the unprefixed `YC_*_ENDPOINT` variables and the resolver flag.
    pub fn apply_env(&mut self, env: &dyn EnvSource) -> Result<(), ConfigError> {
        if let Some(compute) = env.non_empty(COMPUTE_ENDPOINT_VAR) {
            self.compute = Some(compute);
        }
        if let Some(iam) = env.non_empty(IAM_ENDPOINT_VAR) {
            self.iam = Some(iam);
        }
        if let Some(rm) = env.non_empty(RM_ENDPOINT_VAR) {
            self.resource_manager = Some(rm);
        }
        if let Some(flag) = bool_var(env, CUSTOM_RESOLVER_VAR)? {
            self.use_custom_resolver = flag;
        }
        Ok(())
    }
}
