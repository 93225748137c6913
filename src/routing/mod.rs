//! Service endpoint routing.
//!
//! Every provider call targets one of three logical services. Which network
//! endpoint serves it is decided per account by [`EndpointResolver`]:
//!
//! - the account's own override, if set and non-empty
//! - else the process-wide default from `[endpoints]` / `YC_*_ENDPOINT`
//! - else the provider's public endpoint
//!
//! When the account (or the process default) disables the custom resolver,
//! the public endpoints are used no matter what overrides are present.

pub mod resolver;

use std::fmt;

pub use resolver::{EndpointResolver, ResolvedEndpoints, normalize_endpoint};

/// A logical cloud API service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    /// Compute API: list and delete images.
    Compute,
    /// IAM API: exchange the service-account JWT for an IAM token.
    Iam,
    /// Resource manager API: list folders of a cloud.
    ResourceManager,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Compute, Service::Iam, Service::ResourceManager];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Compute => "compute",
            Service::Iam => "iam",
            Service::ResourceManager => "resource-manager",
        }
    }

    /// Public endpoint used when no override applies.
    pub fn builtin_endpoint(&self) -> &'static str {
        match self {
            Service::Compute => "https://compute.api.cloud.yandex.net",
            Service::Iam => "https://iam.api.cloud.yandex.net",
            Service::ResourceManager => "https://resource-manager.api.cloud.yandex.net",
        }
    }

    /// Variable name stem, e.g. `COMPUTE_ENDPOINT` in `YC_COMPUTE_ENDPOINT_0`.
    pub fn env_stem(&self) -> &'static str {
        match self {
            Service::Compute => "COMPUTE_ENDPOINT",
            Service::Iam => "IAM_ENDPOINT",
            Service::ResourceManager => "RM_ENDPOINT",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from endpoint resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("Invalid {service} endpoint {value:?}: {reason}")]
    InvalidEndpoint {
        service: Service,
        value: String,
        reason: String,
    },
}
