//! Cross-folder deletion budget.
//!
//! Folders are visited sequentially in listing order. Each folder's
//! candidates are appended until the per-run budget is reached; the folder
//! that crosses the budget is truncated and no later folder is queried at all.

use std::future::Future;

use tracing::{debug, warn};

use super::selector::DeletionCandidate;
use crate::providers::{Folder, ProviderError};

/// A folder whose images could not be listed.
#[derive(Debug)]
pub struct FolderFailure {
    pub folder_id: String,
    pub error: ProviderError,
}

/// Result of allocating the budget over an account's folders.
#[derive(Debug, Default)]
pub struct Allocation {
    /// Images to delete, grouped by folder in visiting order.
    pub candidates: Vec<DeletionCandidate>,
    /// Folders whose images were requested, including failed ones.
    pub folders_visited: usize,
    pub folder_failures: Vec<FolderFailure>,
    /// Folder whose candidate list was cut short by the budget.
    pub truncated_folder: Option<String>,
    budget: usize,
}

impl Allocation {
    pub fn budget_exhausted(&self) -> bool {
        self.candidates.len() >= self.budget
    }
}

/// Caps the number of deletions submitted for one account in one run.
#[derive(Debug, Clone, Copy)]
pub struct BudgetAllocator {
    budget: usize,
}

impl BudgetAllocator {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Walk `folders` in order, fetching each folder's candidates with
    /// `fetch`, until the budget is used up.
    ///
    /// A folder whose listing fails is recorded and skipped; it contributes
    /// nothing and does not stop the walk.
    pub async fn allocate<F, Fut>(&self, folders: &[Folder], mut fetch: F) -> Allocation
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<Vec<DeletionCandidate>, ProviderError>>,
    {
        let mut allocation = Allocation {
            budget: self.budget,
            ..Default::default()
        };

        for folder in folders {
            if allocation.candidates.len() >= self.budget {
                debug!(
                    budget = self.budget,
                    next_folder = %folder.id,
                    "Deletion budget exhausted, skipping remaining folders"
                );
                break;
            }

            allocation.folders_visited += 1;
            let mut candidates = match fetch(folder.id.clone()).await {
                Ok(candidates) => candidates,
                Err(error) => {
                    warn!(folder_id = %folder.id, error = %error, "Failed to list images in folder");
                    allocation.folder_failures.push(FolderFailure {
                        folder_id: folder.id.clone(),
                        error,
                    });
                    continue;
                }
            };

            let remaining = self.budget - allocation.candidates.len();
            if candidates.len() > remaining {
                debug!(
                    folder_id = %folder.id,
                    candidates = candidates.len(),
                    taken = remaining,
                    "Truncating folder to fit deletion budget"
                );
                candidates.truncate(remaining);
                allocation.truncated_folder = Some(folder.id.clone());
                allocation.candidates.extend(candidates);
                break;
            }
            allocation.candidates.extend(candidates);
        }

        allocation
    }
}
