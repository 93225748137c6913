//! Account discovery from environment variables.
//!
//! Three independent sources are read, in this order:
//!
//! 1. the base slot (`YC_CLOUD_ID`, `YC_SA_ID`, `YC_SA_ACCESS_KEY_ID`,
//!    `YC_SA_PRIVATE_KEY`, optional `YC_FOLDER_IDS`)
//! 2. the organization slot (same names with the `YC_ORG_` prefix, plus
//!    optional endpoint overrides and resolver flag)
//! 3. indexed slots `0, 1, 2, ...` (same names with a `_{i}` suffix)
//!
//! The indexed scan stops at the first slot whose required variables are not
//! all present. Nothing past that slot is read, even if it would be complete.

use std::{collections::BTreeSet, iter::FusedIterator};

use tracing::debug;

use super::{AccountConfig, AccountSlot, EndpointOverrides, ServiceAccountKey};
use crate::{
    config::env::{EnvSource, bool_var, get_env},
    routing::Service,
};

/// Required variable stems, in `AccountConfig` field order.
const REQUIRED: [&str; 4] = ["CLOUD_ID", "SA_ID", "SA_ACCESS_KEY_ID", "SA_PRIVATE_KEY"];
const FOLDER_IDS: &str = "FOLDER_IDS";
const CUSTOM_RESOLVER: &str = "CUSTOM_SERVICE_ENDPOINT_RESOLVER";

/// A configuration problem found during discovery.
///
/// Issues are recorded on the run report; none of them stop the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryIssue {
    #[error("{slot} account is incomplete, missing {}", missing.join(", "))]
    Incomplete {
        slot: AccountSlot,
        missing: Vec<String>,
    },

    #[error("{slot} account is invalid: {message}")]
    Invalid { slot: AccountSlot, message: String },

    #[error("No cloud accounts configured")]
    NoAccounts,
}

/// Result of discovering accounts for one run.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Base first, then organization, then indexed accounts in index order.
    pub accounts: Vec<AccountConfig>,
    pub issues: Vec<DiscoveryIssue>,
}

/// Outcome of reading a single slot.
#[derive(Debug)]
enum SlotRead {
    /// None of the required variables are set.
    Unset,
    Incomplete(Vec<String>),
    /// All required variables are set. `invalid` describes an optional value
    /// that could not be parsed and was replaced by the inherited default.
    Complete {
        account: Box<AccountConfig>,
        invalid: Option<String>,
    },
}

/// Discover every configured account.
pub fn discover_accounts(env: &dyn EnvSource) -> Discovery {
    let mut discovery = Discovery::default();

    for slot in [AccountSlot::Base, AccountSlot::Organization] {
        match read_slot(env, slot) {
            SlotRead::Complete { account, invalid } => {
                if let Some(message) = invalid {
                    discovery
                        .issues
                        .push(DiscoveryIssue::Invalid { slot, message });
                }
                discovery.accounts.push(*account);
            }
            SlotRead::Unset => debug!(%slot, "Account slot not configured"),
            SlotRead::Incomplete(missing) => discovery
                .issues
                .push(DiscoveryIssue::Incomplete { slot, missing }),
        }
    }

    for account in indexed_accounts(env) {
        match account {
            Ok(account) => discovery.accounts.push(account),
            Err(issue) => discovery.issues.push(issue),
        }
    }

    if discovery.accounts.is_empty() {
        discovery.issues.push(DiscoveryIssue::NoAccounts);
    }

    discovery
}

/// Lazily scan indexed slots starting at 0.
pub fn indexed_accounts(env: &dyn EnvSource) -> IndexedAccounts<'_> {
    IndexedAccounts {
        env,
        next: Some(0),
        pending: None,
    }
}

/// Iterator over indexed account slots.
///
/// Yields `Ok` for each complete slot. Ends at the first slot that is unset or
/// incomplete. A complete slot with an unparsable optional value yields an
/// `Err` describing it, then the account itself with that value inherited.
pub struct IndexedAccounts<'a> {
    env: &'a dyn EnvSource,
    next: Option<usize>,
    /// Account held back while its issue is yielded.
    pending: Option<AccountConfig>,
}

impl Iterator for IndexedAccounts<'_> {
    type Item = Result<AccountConfig, DiscoveryIssue>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(account) = self.pending.take() {
            return Some(Ok(account));
        }

        let index = self.next.take()?;
        let slot = AccountSlot::Indexed(index);

        match read_slot(self.env, slot) {
            SlotRead::Complete { account, invalid } => {
                self.next = Some(index + 1);
                match invalid {
                    Some(message) => {
                        self.pending = Some(*account);
                        Some(Err(DiscoveryIssue::Invalid { slot, message }))
                    }
                    None => Some(Ok(*account)),
                }
            }
            SlotRead::Unset => {
                debug!(accounts = index, "Indexed account scan finished");
                None
            }
            SlotRead::Incomplete(missing) => {
                debug!(
                    accounts = index,
                    missing = ?missing,
                    "Indexed account scan stopped at incomplete slot"
                );
                None
            }
        }
    }
}

impl FusedIterator for IndexedAccounts<'_> {}

fn read_slot(env: &dyn EnvSource, slot: AccountSlot) -> SlotRead {
    let values = REQUIRED.map(|stem| get_env(env, &slot.var(stem), None).ok());

    let missing: Vec<String> = REQUIRED
        .iter()
        .zip(&values)
        .filter(|(_, value)| value.is_none())
        .map(|(stem, _)| slot.var(stem))
        .collect();

    let [Some(cloud_id), Some(sa_id), Some(access_key_id), Some(private_key)] = values else {
        if missing.len() == REQUIRED.len() {
            return SlotRead::Unset;
        }
        return SlotRead::Incomplete(missing);
    };

    // The unprefixed endpoint variables are the process-wide defaults, so the
    // base slot has no overrides of its own.
    let mut invalid = None;
    let (endpoint_overrides, use_custom_resolver) = if slot == AccountSlot::Base {
        (EndpointOverrides::default(), None)
    } else {
        let mut overrides = EndpointOverrides::default();
        for service in Service::ALL {
            if let Some(endpoint) = env.non_empty(&slot.var(service.env_stem())) {
                overrides.insert(service, endpoint);
            }
        }
        // An unparsable flag falls back to the process-wide default
        let flag = bool_var(env, &slot.var(CUSTOM_RESOLVER)).unwrap_or_else(|e| {
            invalid = Some(e.to_string());
            None
        });
        (overrides, flag)
    };

    SlotRead::Complete {
        account: Box::new(AccountConfig {
            slot,
            cloud_id,
            credentials: ServiceAccountKey::new(
                sa_id,
                access_key_id,
                unescape_newlines(&private_key),
            ),
            folder_ids: parse_folder_ids(env.var(&slot.var(FOLDER_IDS)).as_deref()),
            endpoint_overrides,
            use_custom_resolver,
        }),
        invalid,
    }
}

/// Parse a comma-separated folder filter. Blank entries are ignored; a filter
/// with no entries means "all folders".
fn parse_folder_ids(value: Option<&str>) -> Option<BTreeSet<String>> {
    let ids: BTreeSet<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    (!ids.is_empty()).then_some(ids)
}

/// PEM keys stored in single-line env files carry literal `\n` sequences.
fn unescape_newlines(key: &str) -> String {
    key.replace("\\n", "\n")
}
