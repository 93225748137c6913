//! Run orchestration.
//!
//! [`RetentionRunner::run_once`] is one scheduled invocation: every
//! discovered account runs its own pipeline as a separate task, and the run
//! completes once all of them have settled. [`start_retention_worker`] repeats
//! that on a fixed interval for deployments without an external scheduler.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::Utc;
use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::Instrument;

use super::{
    budget::BudgetAllocator,
    executor::delete_all,
    folders::list_folders,
    report::{AccountOutcome, AccountSummary, RunError, RunReport},
    selector::select_candidates,
};
use crate::{
    accounts::{AccountConfig, Discovery, DiscoveryIssue, discover_accounts},
    config::{RetentionConfig, env::EnvSource},
    observability::metrics,
    providers::SessionFactory,
    routing::{EndpointResolver, Service},
};

/// Runs the retention pipeline for a set of accounts.
///
/// Cheap to clone; each account task gets its own copy.
#[derive(Clone)]
pub struct RetentionRunner {
    retention: RetentionConfig,
    resolver: EndpointResolver,
    sessions: Arc<dyn SessionFactory>,
}

impl RetentionRunner {
    pub fn new(
        retention: RetentionConfig,
        resolver: EndpointResolver,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            retention,
            resolver,
            sessions,
        }
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Run one account's pipeline: resolve endpoints, open a session, list
    /// folders, allocate the deletion budget over them, delete.
    ///
    /// Only endpoint, session and folder listing failures abort the account.
    /// Image listing and deletion failures are recorded on the summary.
    pub async fn run_account(&self, account: &AccountConfig) -> Result<AccountSummary, RunError> {
        let label = account.label();
        let endpoints = self.resolver.resolve(account)?;
        tracing::debug!(
            compute = %endpoints.get(Service::Compute),
            iam = %endpoints.get(Service::Iam),
            resource_manager = %endpoints.get(Service::ResourceManager),
            custom = endpoints.is_custom(),
            "Resolved endpoints"
        );

        let session = self
            .sessions
            .create_session(account, &endpoints)
            .map_err(RunError::Session)?;

        let folders = list_folders(session.folders.as_ref(), account, self.retention.page_size)
            .await
            .map_err(RunError::FolderListing)?;

        let keep_count = self.retention.keep_count;
        let page_size = self.retention.page_size;
        let allocator = BudgetAllocator::new(self.retention.max_deletions_per_run);
        let allocation = allocator
            .allocate(&folders, |folder_id| {
                let images = session.images.clone();
                async move {
                    select_candidates(images.as_ref(), &folder_id, keep_count, page_size).await
                }
            })
            .await;

        for _ in &allocation.folder_failures {
            metrics::record_error("image_listing");
        }
        metrics::record_candidates(&label, allocation.candidates.len() as u64);

        if let Some(folder_id) = &allocation.truncated_folder {
            tracing::info!(
                folder_id = %folder_id,
                budget = allocator.budget(),
                "Deletion budget reached, remaining folders deferred to the next run"
            );
        }

        let deletions = delete_all(
            session.images.as_ref(),
            &allocation.candidates,
            self.retention.dry_run,
            &label,
        )
        .await;

        Ok(AccountSummary {
            folders_listed: folders.len(),
            folders_visited: allocation.folders_visited,
            candidates: allocation.candidates.len(),
            budget_exhausted: allocation.budget_exhausted(),
            truncated_folder: allocation.truncated_folder,
            folder_failures: allocation.folder_failures,
            deletions,
        })
    }

    /// Run every discovered account concurrently and collect the outcomes in
    /// discovery order.
    pub async fn run_once(&self, discovery: Discovery) -> RunReport {
        let started_at = Utc::now();
        let Discovery { accounts, issues } = discovery;

        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<AccountOutcome>> = Vec::with_capacity(accounts.len());
        let mut labels = Vec::with_capacity(accounts.len());

        for (index, account) in accounts.into_iter().enumerate() {
            let runner = self.clone();
            let label = account.label();
            let span = tracing::info_span!("account", account = %label, cloud_id = %account.cloud_id);
            labels.push((label, account.cloud_id.clone()));
            slots.push(None);

            tasks.spawn(
                async move {
                    let result = AssertUnwindSafe(runner.run_account(&account))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(RunError::TaskFailed(panic_message(panic))));
                    (index, result)
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    let (label, cloud_id) = labels[index].clone();
                    if let Err(e) = &result {
                        metrics::record_error(e.stage());
                    }
                    slots[index] = Some(AccountOutcome {
                        label,
                        cloud_id,
                        result,
                    });
                }
                Err(e) => tracing::error!(error = %e, "Account task did not complete"),
            }
        }

        let accounts = slots
            .into_iter()
            .zip(labels)
            .map(|(slot, (label, cloud_id))| {
                slot.unwrap_or_else(|| {
                    metrics::record_error("task");
                    AccountOutcome {
                        label,
                        cloud_id,
                        result: Err(RunError::TaskFailed("task was cancelled".into())),
                    }
                })
            })
            .collect();

        let report = RunReport {
            accounts,
            issues,
            dry_run: self.retention.dry_run,
            started_at,
            finished_at: Utc::now(),
        };
        metrics::record_run(report.outcome().as_str());
        report
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "account task panicked".to_string()
    }
}

/// Log a finished run: discovery issues, each account's outcome, and totals.
pub fn log_report(report: &RunReport) {
    let dry_run_msg = if report.dry_run { " (DRY RUN)" } else { "" };

    for issue in &report.issues {
        match issue {
            DiscoveryIssue::NoAccounts => tracing::error!("{}", issue),
            _ => tracing::warn!(issue = %issue, "Account configuration problem"),
        }
        metrics::record_error("discovery");
    }

    for account in &report.accounts {
        match &account.result {
            Ok(summary) => {
                for failure in &summary.folder_failures {
                    tracing::warn!(
                        account = %account.label,
                        folder_id = %failure.folder_id,
                        error = %failure.error,
                        "Folder skipped"
                    );
                }
                tracing::info!(
                    account = %account.label,
                    cloud_id = %account.cloud_id,
                    folders = summary.folders_listed,
                    folders_visited = summary.folders_visited,
                    folders_failed = summary.folder_failures.len(),
                    candidates = summary.candidates,
                    submitted = summary.deletions.submitted,
                    succeeded = summary.deletions.succeeded,
                    failed = summary.deletions.failed(),
                    budget_exhausted = summary.budget_exhausted,
                    "Account cleanup finished{}",
                    dry_run_msg
                );
            }
            Err(e) => tracing::error!(
                account = %account.label,
                cloud_id = %account.cloud_id,
                error = %e,
                "Account cleanup aborted"
            ),
        }
    }

    tracing::info!(
        outcome = report.outcome().as_str(),
        accounts = report.accounts.len(),
        aborted = report.accounts_aborted(),
        candidates = report.total_candidates(),
        submitted = report.total_submitted(),
        succeeded = report.total_succeeded(),
        failed = report.total_failed(),
        duration_ms = report.duration().num_milliseconds(),
        "Retention run complete{}",
        dry_run_msg
    );
}

/// Starts the retention worker loop.
///
/// Accounts are rediscovered from `env` before every run so that credential
/// rotation takes effect without a restart. Runs until the task is cancelled.
pub async fn start_retention_worker(
    runner: RetentionRunner,
    env: Arc<dyn EnvSource>,
    interval: Duration,
) {
    let retention = runner.retention();
    let dry_run_msg = if retention.dry_run { " (DRY RUN)" } else { "" };

    tracing::info!(
        interval_secs = interval.as_secs(),
        keep_count = retention.keep_count,
        max_deletions_per_run = retention.max_deletions_per_run,
        dry_run = retention.dry_run,
        "Starting retention worker{}",
        dry_run_msg
    );

    loop {
        let discovery = discover_accounts(env.as_ref());
        let report = runner.run_once(discovery).await;
        log_report(&report);

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        accounts::{AccountSlot, EndpointOverrides, ServiceAccountKey},
        config::env::MapEnv,
        providers::{
            CloudSession, ProviderError,
            test_utils::{MockCloud, MockSessionFactory},
        },
        retention::report::RunOutcome,
        routing::ResolvedEndpoints,
    };

    fn account(slot: AccountSlot, cloud_id: &str) -> AccountConfig {
        AccountConfig {
            slot,
            cloud_id: cloud_id.into(),
            credentials: ServiceAccountKey::new("sa", "key", "pem"),
            folder_ids: None,
            endpoint_overrides: EndpointOverrides::default(),
            use_custom_resolver: None,
        }
    }

    fn runner(cloud: &MockCloud, retention: RetentionConfig) -> RetentionRunner {
        RetentionRunner::new(
            retention,
            EndpointResolver::default(),
            Arc::new(MockSessionFactory::new(cloud.clone())),
        )
    }

    fn retention(keep_count: usize, budget: usize) -> RetentionConfig {
        RetentionConfig {
            keep_count,
            max_deletions_per_run: budget,
            ..Default::default()
        }
    }

    fn discovery(accounts: Vec<AccountConfig>) -> Discovery {
        Discovery {
            accounts,
            issues: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_account_pipeline_respects_keep_and_budget() {
        let cloud = MockCloud::new()
            .with_generated_images("cloud-a", "f1", 4)
            .with_generated_images("cloud-a", "f2", 7)
            .with_generated_images("cloud-a", "f3", 6);
        let runner = runner(&cloud, retention(2, 6));

        let summary = runner
            .run_account(&account(AccountSlot::Base, "cloud-a"))
            .await
            .unwrap();

        // f1 contributes 2, f2 contributes 4 of its 5, f3 is never listed
        assert_eq!(summary.candidates, 6);
        assert_eq!(summary.truncated_folder.as_deref(), Some("f2"));
        assert_eq!(cloud.queried_folders(), vec!["f1", "f2"]);

        let mut deleted = cloud.deleted();
        deleted.sort();
        assert_eq!(
            deleted,
            vec!["f1-2", "f1-3", "f2-2", "f2-3", "f2-4", "f2-5"]
        );
    }

    #[tokio::test]
    async fn test_image_listing_failure_is_isolated() {
        let cloud = MockCloud::new()
            .with_generated_images("cloud-a", "f1", 3)
            .with_generated_images("cloud-a", "f2", 3)
            .fail_image_listing("f1");
        let runner = runner(&cloud, retention(1, 100));

        let summary = runner
            .run_account(&account(AccountSlot::Base, "cloud-a"))
            .await
            .unwrap();

        assert_eq!(summary.folder_failures.len(), 1);
        assert_eq!(summary.candidates, 2);
        let mut deleted = cloud.deleted();
        deleted.sort();
        assert_eq!(deleted, vec!["f2-1", "f2-2"]);
    }

    #[tokio::test]
    async fn test_folder_listing_failure_does_not_affect_other_accounts() {
        let cloud = MockCloud::new()
            .with_generated_images("cloud-a", "fa", 3)
            .with_generated_images("cloud-b", "fb", 3)
            .fail_folder_listing("cloud-b");
        let runner = runner(&cloud, retention(1, 100));

        let report = runner
            .run_once(discovery(vec![
                account(AccountSlot::Base, "cloud-a"),
                account(AccountSlot::Indexed(0), "cloud-b"),
            ]))
            .await;

        assert_eq!(report.accounts.len(), 2);
        assert_eq!(report.accounts[0].label, "base");
        assert!(report.accounts[0].result.is_ok());
        assert!(matches!(
            report.accounts[1].result,
            Err(RunError::FolderListing(_))
        ));
        assert_eq!(report.total_succeeded(), 2);
        assert_eq!(report.outcome(), RunOutcome::Partial);
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_session_failure_aborts_account() {
        let cloud = MockCloud::new()
            .with_generated_images("cloud-a", "fa", 3)
            .fail_session("cloud-a");
        let runner = runner(&cloud, retention(0, 100));

        let report = runner
            .run_once(discovery(vec![account(AccountSlot::Base, "cloud-a")]))
            .await;

        assert!(matches!(report.accounts[0].result, Err(RunError::Session(_))));
        assert!(report.has_failures());
        assert!(cloud.delete_attempts().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_deletes_nothing() {
        let cloud = MockCloud::new().with_generated_images("cloud-a", "f1", 5);
        let runner = runner(
            &cloud,
            RetentionConfig {
                dry_run: true,
                ..retention(1, 100)
            },
        );

        let report = runner
            .run_once(discovery(vec![account(AccountSlot::Base, "cloud-a")]))
            .await;

        assert!(report.dry_run);
        assert_eq!(report.total_candidates(), 4);
        assert_eq!(report.total_submitted(), 4);
        assert!(cloud.delete_attempts().is_empty());
    }

    #[tokio::test]
    async fn test_folder_filter_applies() {
        let cloud = MockCloud::new()
            .with_generated_images("cloud-a", "f1", 2)
            .with_generated_images("cloud-a", "f2", 2);
        let runner = runner(&cloud, retention(0, 100));
        let mut account = account(AccountSlot::Organization, "cloud-a");
        account.folder_ids = Some(BTreeSet::from(["f2".to_string()]));

        runner.run_account(&account).await.unwrap();

        assert_eq!(cloud.queried_folders(), vec!["f2"]);
        assert_eq!(cloud.deleted().len(), 2);
    }

    #[tokio::test]
    async fn test_no_accounts_is_a_failed_run() {
        let cloud = MockCloud::new();
        let report = runner(&cloud, retention(1, 1))
            .run_once(Discovery {
                accounts: vec![],
                issues: vec![DiscoveryIssue::NoAccounts],
            })
            .await;
        assert!(report.accounts.is_empty());
        assert!(report.has_failures());
    }

    struct PanickingFactory;

    impl SessionFactory for PanickingFactory {
        fn create_session(
            &self,
            account: &AccountConfig,
            _endpoints: &ResolvedEndpoints,
        ) -> Result<CloudSession, ProviderError> {
            panic!("no session for {}", account.cloud_id);
        }
    }

    #[tokio::test]
    async fn test_panicking_account_is_reported() {
        let runner = RetentionRunner::new(
            retention(1, 1),
            EndpointResolver::default(),
            Arc::new(PanickingFactory),
        );

        let report = runner
            .run_once(discovery(vec![account(AccountSlot::Base, "cloud-a")]))
            .await;

        match &report.accounts[0].result {
            Err(RunError::TaskFailed(message)) => assert!(message.contains("cloud-a")),
            other => panic!("expected task failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_waits_full_interval_after_each_run() {
        let cloud = MockCloud::new().with_generated_images("cloud-a", "f1", 4);
        let env = MapEnv::new()
            .with("YC_CLOUD_ID", "cloud-a")
            .with("YC_SA_ID", "sa")
            .with("YC_SA_ACCESS_KEY_ID", "key")
            .with("YC_SA_PRIVATE_KEY", "pem");
        let interval = Duration::from_secs(600);
        let worker = tokio::spawn(start_retention_worker(
            runner(&cloud, retention(1, 1)),
            Arc::new(env),
            interval,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cloud.deleted().len(), 1);

        tokio::time::sleep(interval - Duration::from_secs(2)).await;
        assert_eq!(cloud.deleted().len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cloud.deleted().len(), 2);

        worker.abort();
    }
}
