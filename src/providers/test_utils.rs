//! In-memory cloud for pipeline tests.
//!
//! [`MockCloud`] implements the provider traits over plain maps, splits
//! listings into pages, and records every folder listing and delete call so
//! tests can assert on exactly what the pipeline touched.
//!
//! ```ignore
//! let cloud = MockCloud::new()
//!     .with_folder("cloud-a", "f1")
//!     .with_images("f1", &[("img-1", 10), ("img-2", 20)])
//!     .fail_image_listing("f2");
//! let factory = MockSessionFactory::new(cloud.clone());
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    CloudSession, Folder, FolderService, Image, ImageService, Page, ProviderError, SessionFactory,
};
use crate::{accounts::AccountConfig, routing::ResolvedEndpoints};

/// Build an image created `secs` seconds after the epoch.
pub fn image(id: &str, secs: i64) -> Image {
    Image {
        id: id.to_string(),
        name: format!("image-{id}"),
        created_at: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
    }
}

#[derive(Default)]
struct State {
    folders: HashMap<String, Vec<Folder>>,
    images: HashMap<String, Vec<Image>>,
    failing_folder_listings: HashSet<String>,
    failing_image_listings: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_sessions: HashSet<String>,
    page_limit: Option<usize>,
    queried_folders: Vec<String>,
    delete_attempts: Vec<String>,
    deleted: Vec<String>,
    sessions: Vec<(String, ResolvedEndpoints)>,
}

/// Shared in-memory cloud. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MockCloud {
    state: Arc<Mutex<State>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Add a folder to a cloud. Folders are listed in insertion order.
    pub fn with_folder(self, cloud_id: &str, folder_id: &str) -> Self {
        self.state()
            .folders
            .entry(cloud_id.to_string())
            .or_default()
            .push(Folder {
                id: folder_id.to_string(),
                name: format!("folder-{folder_id}"),
            });
        self
    }

    /// Add images to a folder, as `(id, created_at seconds)`, in listing order.
    pub fn with_images(self, folder_id: &str, images: &[(&str, i64)]) -> Self {
        self.state()
            .images
            .entry(folder_id.to_string())
            .or_default()
            .extend(images.iter().map(|(id, secs)| image(id, *secs)));
        self
    }

    /// Add a folder with `count` images named `{folder_id}-{n}`, newest first.
    pub fn with_generated_images(self, cloud_id: &str, folder_id: &str, count: usize) -> Self {
        let images: Vec<(String, i64)> = (0..count)
            .map(|n| (format!("{folder_id}-{n}"), 1_000_000 - n as i64))
            .collect();
        let refs: Vec<(&str, i64)> = images.iter().map(|(id, t)| (id.as_str(), *t)).collect();
        self.with_folder(cloud_id, folder_id)
            .with_images(folder_id, &refs)
    }

    pub fn fail_folder_listing(self, cloud_id: &str) -> Self {
        self.state()
            .failing_folder_listings
            .insert(cloud_id.to_string());
        self
    }

    pub fn fail_image_listing(self, folder_id: &str) -> Self {
        self.state()
            .failing_image_listings
            .insert(folder_id.to_string());
        self
    }

    pub fn fail_delete(self, image_id: &str) -> Self {
        self.state().failing_deletes.insert(image_id.to_string());
        self
    }

    pub fn fail_session(self, cloud_id: &str) -> Self {
        self.state().failing_sessions.insert(cloud_id.to_string());
        self
    }

    /// Cap the number of items per page, regardless of the requested size.
    pub fn with_page_limit(self, limit: usize) -> Self {
        self.state().page_limit = Some(limit);
        self
    }

    /// Folders whose images were listed (first page only), in call order.
    pub fn queried_folders(&self) -> Vec<String> {
        self.state().queried_folders.clone()
    }

    /// Every delete call, including failed ones.
    pub fn delete_attempts(&self) -> Vec<String> {
        self.state().delete_attempts.clone()
    }

    /// Images that were deleted successfully.
    pub fn deleted(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    /// Endpoints each session was created with, keyed by cloud id.
    pub fn sessions(&self) -> Vec<(String, ResolvedEndpoints)> {
        self.state().sessions.clone()
    }

    fn paginate<T: Clone>(
        &self,
        items: &[T],
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<T>, ProviderError> {
        let limit = self
            .state()
            .page_limit
            .unwrap_or(usize::MAX)
            .min(page_size as usize);
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ProviderError::Decode(format!("bad page token {token}")))?,
            None => 0,
        };
        let end = (offset + limit).min(items.len());
        Ok(Page {
            items: items[offset.min(end)..end].to_vec(),
            next_page_token: (end < items.len()).then(|| end.to_string()),
        })
    }
}

fn injected(what: &str) -> ProviderError {
    ProviderError::Status {
        status: 503,
        body: format!("injected failure: {what}"),
    }
}

#[async_trait]
impl FolderService for MockCloud {
    async fn list_folders(
        &self,
        cloud_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<Folder>, ProviderError> {
        let folders = {
            let state = self.state();
            if state.failing_folder_listings.contains(cloud_id) {
                return Err(injected(cloud_id));
            }
            state.folders.get(cloud_id).cloned().unwrap_or_default()
        };
        self.paginate(&folders, page_size, page_token)
    }
}

#[async_trait]
impl ImageService for MockCloud {
    async fn list_images(
        &self,
        folder_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<Image>, ProviderError> {
        let images = {
            let mut state = self.state();
            if page_token.is_none() {
                state.queried_folders.push(folder_id.to_string());
            }
            if state.failing_image_listings.contains(folder_id) {
                return Err(injected(folder_id));
            }
            state.images.get(folder_id).cloned().unwrap_or_default()
        };
        self.paginate(&images, page_size, page_token)
    }

    async fn delete_image(&self, image_id: &str) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.delete_attempts.push(image_id.to_string());
        if state.failing_deletes.contains(image_id) {
            return Err(injected(image_id));
        }
        for images in state.images.values_mut() {
            images.retain(|image| image.id != image_id);
        }
        state.deleted.push(image_id.to_string());
        Ok(())
    }
}

/// Hands out sessions backed by one [`MockCloud`].
pub struct MockSessionFactory {
    cloud: MockCloud,
}

impl MockSessionFactory {
    pub fn new(cloud: MockCloud) -> Self {
        Self { cloud }
    }
}

impl SessionFactory for MockSessionFactory {
    fn create_session(
        &self,
        account: &AccountConfig,
        endpoints: &ResolvedEndpoints,
    ) -> Result<CloudSession, ProviderError> {
        {
            let mut state = self.cloud.state();
            if state.failing_sessions.contains(&account.cloud_id) {
                return Err(ProviderError::InvalidKey("injected failure".into()));
            }
            state
                .sessions
                .push((account.cloud_id.clone(), endpoints.clone()));
        }

        let cloud = Arc::new(self.cloud.clone());
        Ok(CloudSession {
            folders: cloud.clone(),
            images: cloud,
        })
    }
}
