//! Per-account endpoint resolution.
//!
//! Resolution is pure: it reads the account and the process defaults and
//! produces a [`ResolvedEndpoints`] that is handed to the session factory once
//! per run. Nothing here performs I/O.

use url::Url;

use super::{RoutingError, Service};
use crate::{accounts::AccountConfig, config::EndpointsConfig};

/// Endpoints for one account's provider session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    compute: Url,
    iam: Url,
    resource_manager: Url,
    custom: bool,
}

impl ResolvedEndpoints {
    /// The provider's public endpoints.
    pub fn builtin() -> Self {
        let parse = |service: Service| {
            Url::parse(service.builtin_endpoint()).expect("built-in endpoint is a valid URL")
        };
        Self {
            compute: parse(Service::Compute),
            iam: parse(Service::Iam),
            resource_manager: parse(Service::ResourceManager),
            custom: false,
        }
    }

    pub fn get(&self, service: Service) -> &Url {
        match service {
            Service::Compute => &self.compute,
            Service::Iam => &self.iam,
            Service::ResourceManager => &self.resource_manager,
        }
    }

    /// Whether the custom resolver was in effect for this account.
    pub fn is_custom(&self) -> bool {
        self.custom
    }

    /// Join an API path onto a service endpoint, keeping any base path.
    pub fn url(&self, service: Service, path: &str) -> String {
        let base = self.get(service).as_str().trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }

    /// Append path segments to a service endpoint, percent-encoding each one
    /// so that ids cannot alter the path or add a query.
    pub fn segments_url(&self, service: Service, segments: &[&str]) -> Url {
        let mut url = self.get(service).clone();
        // http(s) endpoints always have a base
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Resolves endpoints for accounts against the process-wide defaults.
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    defaults: EndpointsConfig,
}

impl EndpointResolver {
    pub fn new(defaults: EndpointsConfig) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &EndpointsConfig {
        &self.defaults
    }

    /// Whether overrides apply to `account`. The account's own flag wins over
    /// the process default.
    pub fn uses_custom_resolver(&self, account: &AccountConfig) -> bool {
        account
            .use_custom_resolver
            .unwrap_or(self.defaults.use_custom_resolver)
    }

    /// Resolve every service endpoint for `account`.
    pub fn resolve(&self, account: &AccountConfig) -> Result<ResolvedEndpoints, RoutingError> {
        if !self.uses_custom_resolver(account) {
            return Ok(ResolvedEndpoints::builtin());
        }

        let pick = |service: Service| -> Result<Url, RoutingError> {
            let value = non_empty(account.endpoint_overrides.get(service))
                .or_else(|| non_empty(self.default_for(service)))
                .unwrap_or(service.builtin_endpoint());
            normalize_endpoint(service, value)
        };

        Ok(ResolvedEndpoints {
            compute: pick(Service::Compute)?,
            iam: pick(Service::Iam)?,
            resource_manager: pick(Service::ResourceManager)?,
            custom: true,
        })
    }

    fn default_for(&self, service: Service) -> Option<&str> {
        match service {
            Service::Compute => self.defaults.compute.as_deref(),
            Service::Iam => self.defaults.iam.as_deref(),
            Service::ResourceManager => self.defaults.resource_manager.as_deref(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Turn an endpoint setting into a base URL.
///
/// Values without a scheme (`host:port`, the form used by the provider SDKs)
/// are taken as `https://host:port`.
pub fn normalize_endpoint(service: Service, value: &str) -> Result<Url, RoutingError> {
    let trimmed = value.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let invalid = |reason: String| RoutingError::InvalidEndpoint {
        service,
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}
