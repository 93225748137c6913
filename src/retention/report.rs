//! Per-run results.

use chrono::{DateTime, Utc};

use super::{budget::FolderFailure, executor::DeletionOutcome};
use crate::{accounts::DiscoveryIssue, providers::ProviderError, routing::RoutingError};

/// Why an account's pipeline was aborted.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Endpoint resolution failed: {0}")]
    Routing(#[from] RoutingError),

    #[error("Failed to create provider session: {0}")]
    Session(#[source] ProviderError),

    #[error("Failed to list folders: {0}")]
    FolderListing(#[source] ProviderError),

    #[error("Account task failed: {0}")]
    TaskFailed(String),
}

impl RunError {
    /// Pipeline stage label used for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            RunError::Routing(_) | RunError::Session(_) => "session",
            RunError::FolderListing(_) => "folder_listing",
            RunError::TaskFailed(_) => "task",
        }
    }
}

/// What one account's completed pipeline did.
#[derive(Debug, Default)]
pub struct AccountSummary {
    /// Folders selected after the account's folder filter.
    pub folders_listed: usize,
    pub folders_visited: usize,
    pub folder_failures: Vec<FolderFailure>,
    pub candidates: usize,
    /// Folder cut short by the deletion budget, if any.
    pub truncated_folder: Option<String>,
    pub budget_exhausted: bool,
    pub deletions: DeletionOutcome,
}

#[derive(Debug)]
pub struct AccountOutcome {
    pub label: String,
    pub cloud_id: String,
    pub result: Result<AccountSummary, RunError>,
}

impl AccountOutcome {
    pub fn is_aborted(&self) -> bool {
        self.result.is_err()
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every account completed without folder or deletion failures.
    Success,
    /// Some accounts, folders or deletions failed, or a slot was misconfigured.
    Partial,
    /// No account was discovered, or every account aborted.
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Partial => "partial",
            RunOutcome::Failed => "failed",
        }
    }
}

/// Aggregated outcome of one scheduled invocation across all accounts.
#[derive(Debug)]
pub struct RunReport {
    /// Account outcomes in discovery order.
    pub accounts: Vec<AccountOutcome>,
    pub issues: Vec<DiscoveryIssue>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn summaries(&self) -> impl Iterator<Item = &AccountSummary> {
        self.accounts.iter().filter_map(|a| a.result.as_ref().ok())
    }

    pub fn accounts_aborted(&self) -> usize {
        self.accounts.iter().filter(|a| a.is_aborted()).count()
    }

    pub fn total_candidates(&self) -> usize {
        self.summaries().map(|s| s.candidates).sum()
    }

    pub fn total_submitted(&self) -> usize {
        self.summaries().map(|s| s.deletions.submitted).sum()
    }

    pub fn total_succeeded(&self) -> usize {
        self.summaries().map(|s| s.deletions.succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.summaries().map(|s| s.deletions.failed()).sum()
    }

    pub fn folder_failures(&self) -> usize {
        self.summaries().map(|s| s.folder_failures.len()).sum()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.accounts.is_empty() || self.accounts_aborted() == self.accounts.len() {
            return RunOutcome::Failed;
        }
        let degraded = self.accounts_aborted() > 0
            || self.folder_failures() > 0
            || self.total_failed() > 0
            || !self.issues.is_empty();
        if degraded {
            RunOutcome::Partial
        } else {
            RunOutcome::Success
        }
    }

    /// Whether a one-shot run should exit non-zero.
    ///
    /// Partial failures are logged but do not fail the process; the next
    /// scheduled run picks them up.
    pub fn has_failures(&self) -> bool {
        self.outcome() == RunOutcome::Failed
    }
}
