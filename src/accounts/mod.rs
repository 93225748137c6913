//! Cloud accounts subject to cleanup.
//!
//! Accounts are discovered from the environment once per run (see
//! [`discovery`]) and are immutable afterwards.

pub mod discovery;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

pub use discovery::{Discovery, DiscoveryIssue, IndexedAccounts, discover_accounts};

use crate::routing::Service;

/// Where an account's configuration was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccountSlot {
    /// `YC_CLOUD_ID`, `YC_SA_ID`, ...
    Base,
    /// `YC_ORG_CLOUD_ID`, `YC_ORG_SA_ID`, ...
    Organization,
    /// `YC_CLOUD_ID_{i}`, `YC_SA_ID_{i}`, ...
    Indexed(usize),
}

impl AccountSlot {
    /// Full variable name for `stem` in this slot, e.g. `CLOUD_ID` becomes
    /// `YC_ORG_CLOUD_ID` for the organization slot.
    pub fn var(&self, stem: &str) -> String {
        match self {
            AccountSlot::Base => format!("YC_{stem}"),
            AccountSlot::Organization => format!("YC_ORG_{stem}"),
            AccountSlot::Indexed(i) => format!("YC_{stem}_{i}"),
        }
    }
}

impl fmt::Display for AccountSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountSlot::Base => f.write_str("base"),
            AccountSlot::Organization => f.write_str("organization"),
            AccountSlot::Indexed(i) => write!(f, "account-{i}"),
        }
    }
}

/// Service-account credentials used to obtain IAM tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccountKey {
    pub service_account_id: String,
    pub access_key_id: String,
    /// PEM-encoded private key.
    pub private_key: String,
}

impl ServiceAccountKey {
    pub fn new(
        service_account_id: impl Into<String>,
        access_key_id: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            service_account_id: service_account_id.into(),
            access_key_id: access_key_id.into(),
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("service_account_id", &self.service_account_id)
            .field("access_key_id", &self.access_key_id)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Per-account endpoint overrides, keyed by service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointOverrides(BTreeMap<Service, String>);

impl EndpointOverrides {
    pub fn with(mut self, service: Service, endpoint: impl Into<String>) -> Self {
        self.insert(service, endpoint);
        self
    }

    pub fn insert(&mut self, service: Service, endpoint: impl Into<String>) {
        self.0.insert(service, endpoint.into());
    }

    pub fn get(&self, service: Service) -> Option<&str> {
        self.0.get(&service).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Service, &str)> {
        self.0.iter().map(|(s, e)| (*s, e.as_str()))
    }
}

/// One cloud account to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountConfig {
    pub slot: AccountSlot,
    pub cloud_id: String,
    pub credentials: ServiceAccountKey,
    /// Restricts processing to these folders. `None` means every folder of
    /// the cloud. Listing order is kept; this is only a membership filter.
    pub folder_ids: Option<BTreeSet<String>>,
    pub endpoint_overrides: EndpointOverrides,
    /// `None` inherits the process-wide default.
    pub use_custom_resolver: Option<bool>,
}

impl AccountConfig {
    /// Label used in logs, metrics and the run report.
    pub fn label(&self) -> String {
        self.slot.to_string()
    }

    /// Whether `folder_id` passes this account's folder filter.
    pub fn includes_folder(&self, folder_id: &str) -> bool {
        self.folder_ids
            .as_ref()
            .is_none_or(|ids| ids.contains(folder_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_variable_names() {
        assert_eq!(AccountSlot::Base.var("CLOUD_ID"), "YC_CLOUD_ID");
        assert_eq!(AccountSlot::Organization.var("SA_ID"), "YC_ORG_SA_ID");
        assert_eq!(
            AccountSlot::Indexed(2).var("SA_PRIVATE_KEY"),
            "YC_SA_PRIVATE_KEY_2"
        );
    }

    #[test]
    fn test_slot_labels() {
        assert_eq!(AccountSlot::Base.to_string(), "base");
        assert_eq!(AccountSlot::Organization.to_string(), "organization");
        assert_eq!(AccountSlot::Indexed(7).to_string(), "account-7");
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let key = ServiceAccountKey::new("aje-sa", "ajk-key", "super-secret-pem");
        let debug = format!("{key:?}");
        assert!(debug.contains("aje-sa"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-pem"));
    }

    #[test]
    fn test_folder_filter() {
        let mut account = AccountConfig {
            slot: AccountSlot::Base,
            cloud_id: "b1g".into(),
            credentials: ServiceAccountKey::new("sa", "key", "pem"),
            folder_ids: None,
            endpoint_overrides: EndpointOverrides::default(),
            use_custom_resolver: None,
        };
        assert!(account.includes_folder("anything"));

        account.folder_ids = Some(BTreeSet::from(["f1".to_string(), "f3".to_string()]));
        assert!(account.includes_folder("f3"));
        assert!(!account.includes_folder("f2"));
    }
}
