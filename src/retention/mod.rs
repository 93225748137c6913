//! Image retention pipeline.
//!
//! For each account: list folders, pick deletion candidates per folder
//! (everything but the `keep_count` newest images), cap the total at the
//! per-run budget, and delete.
//!
//! - [`folders`]: folder enumeration and filtering
//! - [`selector`]: per-folder keep/delete partition
//! - [`budget`]: folder-ordered budget allocation
//! - [`executor`]: concurrent deletion
//! - [`worker`]: per-account orchestration and the periodic loop
//!
//! Folders are visited in the order the provider lists them, and the budget
//! favors earlier folders. When candidates exceed the budget every run, later
//! folders wait until earlier ones are cleaned up.

pub mod budget;
pub mod executor;
pub mod folders;
pub mod report;
pub mod selector;
mod worker;

pub use budget::{Allocation, BudgetAllocator, FolderFailure};
pub use executor::{DeletionFailure, DeletionOutcome, delete_all};
pub use folders::list_folders;
pub use report::{AccountOutcome, AccountSummary, RunError, RunOutcome, RunReport};
pub use selector::{DeletionCandidate, partition_images, select_candidates};
pub use worker::{RetentionRunner, log_report, start_retention_worker};
