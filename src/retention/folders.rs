//! Folder enumeration for an account.

use tracing::warn;

use crate::{
    accounts::AccountConfig,
    providers::{Folder, FolderService, ProviderError, collect_pages},
};

/// List every folder of the account's cloud, keeping listing order, then
/// apply the account's folder filter.
///
/// Any page failing fails the whole listing; a partial folder list is never
/// returned.
pub async fn list_folders(
    folders: &dyn FolderService,
    account: &AccountConfig,
    page_size: u32,
) -> Result<Vec<Folder>, ProviderError> {
    let cloud_id = account.cloud_id.as_str();
    let all = collect_pages(|token: Option<String>| async move {
        folders
            .list_folders(cloud_id, page_size, token.as_deref())
            .await
    })
    .await?;

    let listed = all.len();
    let selected: Vec<Folder> = all
        .into_iter()
        .filter(|folder| account.includes_folder(&folder.id))
        .collect();

    if let Some(wanted) = &account.folder_ids {
        let unknown: Vec<&str> = wanted
            .iter()
            .filter(|id| !selected.iter().any(|f| &f.id == *id))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            warn!(
                cloud_id,
                unknown = ?unknown,
                "Configured folders not found in cloud"
            );
        }
    }

    tracing::debug!(cloud_id, listed, selected = selected.len(), "Listed folders");
    Ok(selected)
}
