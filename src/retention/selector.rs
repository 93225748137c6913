//! Per-folder image retention.

use crate::providers::{Image, ImageService, ProviderError, collect_pages};

/// An image chosen for deletion, with the folder it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionCandidate {
    pub image: Image,
    pub folder_id: String,
}

/// Split images into the `keep_count` newest and the rest.
///
/// Sorting is by `created_at` descending and stable, so images with equal
/// timestamps keep their listing order. Both halves come back newest first.
pub fn partition_images(mut images: Vec<Image>, keep_count: usize) -> (Vec<Image>, Vec<Image>) {
    images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let rest = if keep_count < images.len() {
        images.split_off(keep_count)
    } else {
        Vec::new()
    };
    (images, rest)
}

/// List every image in `folder_id` and return those outside the retained
/// window, newest first.
pub async fn select_candidates(
    images: &dyn ImageService,
    folder_id: &str,
    keep_count: usize,
    page_size: u32,
) -> Result<Vec<DeletionCandidate>, ProviderError> {
    let listed = collect_pages(|token: Option<String>| async move {
        images
            .list_images(folder_id, page_size, token.as_deref())
            .await
    })
    .await?;

    let total = listed.len();
    let (_kept, rest) = partition_images(listed, keep_count);

    tracing::debug!(
        folder_id,
        images = total,
        candidates = rest.len(),
        "Selected deletion candidates"
    );

    Ok(rest
        .into_iter()
        .map(|image| DeletionCandidate {
            image,
            folder_id: folder_id.to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;

    use super::*;
    use crate::providers::test_utils::{MockCloud, image};

    fn ids(images: &[Image]) -> Vec<&str> {
        images.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_keeps_newest() {
        let images = vec![image("a", 10), image("b", 30), image("c", 20)];
        let (kept, rest) = partition_images(images, 1);
        assert_eq!(ids(&kept), vec!["b"]);
        assert_eq!(ids(&rest), vec!["c", "a"]);
    }

    #[test]
    fn test_ties_keep_listing_order() {
        let images = vec![
            image("first", 50),
            image("old", 10),
            image("second", 50),
            image("third", 50),
        ];
        let (kept, rest) = partition_images(images, 2);
        assert_eq!(ids(&kept), vec!["first", "second"]);
        assert_eq!(ids(&rest), vec!["third", "old"]);
    }

    #[rstest]
    #[case(0, 5)]
    #[case(1, 4)]
    #[case(4, 1)]
    #[case(5, 0)]
    #[case(30, 0)]
    fn test_candidate_count(#[case] keep: usize, #[case] expected: usize) {
        let images: Vec<_> = (0..5).map(|n| image(&format!("img-{n}"), n * 7 % 5)).collect();
        let original: HashSet<String> = images.iter().map(|i| i.id.clone()).collect();

        let (kept, rest) = partition_images(images, keep);

        assert_eq!(rest.len(), expected);
        assert_eq!(kept.len(), 5 - expected);
        let union: HashSet<String> = kept.iter().chain(&rest).map(|i| i.id.clone()).collect();
        assert_eq!(union, original);
        // Nothing kept is older than anything deleted
        if let (Some(oldest_kept), Some(newest_rest)) = (kept.last(), rest.first()) {
            assert!(oldest_kept.created_at >= newest_rest.created_at);
        }
    }

    #[tokio::test]
    async fn test_select_candidates_across_pages() {
        let cloud = MockCloud::new()
            .with_images("f1", &[("a", 10), ("b", 30), ("c", 20), ("d", 40)])
            .with_page_limit(3);

        let candidates = select_candidates(&cloud, "f1", 2, 1000).await.unwrap();

        let ids: Vec<_> = candidates.iter().map(|c| c.image.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert!(candidates.iter().all(|c| c.folder_id == "f1"));
    }

    #[tokio::test]
    async fn test_empty_folder() {
        let cloud = MockCloud::new();
        let candidates = select_candidates(&cloud, "empty", 0, 1000).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let cloud = MockCloud::new()
            .with_images("f1", &[("a", 1)])
            .fail_image_listing("f1");
        assert!(select_candidates(&cloud, "f1", 0, 1000).await.is_err());
    }
}
