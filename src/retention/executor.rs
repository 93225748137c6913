//! Concurrent image deletion.

use futures::future::join_all;
use tracing::{info, warn};

use super::selector::DeletionCandidate;
use crate::{
    observability::metrics,
    providers::{ImageService, ProviderError},
};

/// A deletion request the provider rejected.
#[derive(Debug)]
pub struct DeletionFailure {
    pub image_id: String,
    pub folder_id: String,
    pub error: ProviderError,
}

/// What happened to an account's deletion list.
#[derive(Debug, Default)]
pub struct DeletionOutcome {
    /// Candidates handed to the executor. In dry-run mode nothing is sent,
    /// but this still counts every candidate.
    pub submitted: usize,
    pub succeeded: usize,
    pub failures: Vec<DeletionFailure>,
    pub dry_run: bool,
}

impl DeletionOutcome {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Submit one deletion per candidate, all at once, and wait for every
/// request to settle.
///
/// A failed request never cancels its siblings and is not retried.
pub async fn delete_all(
    images: &dyn ImageService,
    candidates: &[DeletionCandidate],
    dry_run: bool,
    account: &str,
) -> DeletionOutcome {
    if dry_run {
        for candidate in candidates {
            info!(
                image_id = %candidate.image.id,
                image_name = %candidate.image.name,
                folder_id = %candidate.folder_id,
                created_at = %candidate.image.created_at,
                "[DRY RUN] Would delete image"
            );
        }
        metrics::record_deletions(account, "dry_run", candidates.len() as u64);
        return DeletionOutcome {
            submitted: candidates.len(),
            dry_run: true,
            ..Default::default()
        };
    }

    let results = join_all(candidates.iter().map(|candidate| async move {
        (candidate, images.delete_image(&candidate.image.id).await)
    }))
    .await;

    let mut outcome = DeletionOutcome {
        submitted: candidates.len(),
        ..Default::default()
    };
    for (candidate, result) in results {
        match result {
            Ok(()) => {
                tracing::debug!(image_id = %candidate.image.id, "Image deletion accepted");
                outcome.succeeded += 1;
            }
            Err(error) => {
                warn!(
                    image_id = %candidate.image.id,
                    folder_id = %candidate.folder_id,
                    error = %error,
                    "Failed to delete image"
                );
                metrics::record_error("delete");
                outcome.failures.push(DeletionFailure {
                    image_id: candidate.image.id.clone(),
                    folder_id: candidate.folder_id.clone(),
                    error,
                });
            }
        }
    }

    metrics::record_deletions(account, "success", outcome.succeeded as u64);
    metrics::record_deletions(account, "failure", outcome.failed() as u64);
    outcome
}
