//! # Cloud provider access
//!
//! The retention pipeline talks to the cloud only through the traits defined
//! here, so it can run against the real Yandex Cloud REST API
//! ([`yandex::YandexSessionFactory`]) or an in-memory fake in tests.
//!
//! A [`SessionFactory`] turns one account's credentials plus its resolved
//! endpoints into a [`CloudSession`]. Sessions are created once per account
//! per run and dropped when the account's pipeline finishes.
//!
//! ## Retry policy
//!
//! Listing calls and the IAM token exchange are idempotent and go through
//! [`retry::with_retry`]. Image deletion is issued exactly once; a failed
//! deletion is picked up again by the next scheduled run because the image is
//! still listed and still outside the retained window.

pub mod error;
pub mod pagination;
pub mod retry;
#[cfg(test)]
pub mod test_utils;
pub mod yandex;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use error::ProviderError;
pub use pagination::collect_pages;
use serde::{Deserialize, Serialize};

use crate::{accounts::AccountConfig, routing::ResolvedEndpoints};

/// A resource folder under a cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A compute image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page. `None` or empty means this was the last page.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page_token: None,
        }
    }
}

/// Lists folders of a cloud.
#[async_trait]
pub trait FolderService: Send + Sync {
    async fn list_folders(
        &self,
        cloud_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<Folder>, ProviderError>;
}

/// Lists and deletes images in a folder.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn list_images(
        &self,
        folder_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<Image>, ProviderError>;

    /// Submit deletion of one image. Success means the provider accepted the
    /// request; the deletion itself may still be in progress.
    async fn delete_image(&self, image_id: &str) -> Result<(), ProviderError>;
}

/// Clients scoped to a single account for a single run.
#[derive(Clone)]
pub struct CloudSession {
    pub folders: Arc<dyn FolderService>,
    pub images: Arc<dyn ImageService>,
}

/// Builds provider sessions.
pub trait SessionFactory: Send + Sync {
    fn create_session(
        &self,
        account: &AccountConfig,
        endpoints: &ResolvedEndpoints,
    ) -> Result<CloudSession, ProviderError>;
}
