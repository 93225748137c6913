//! Wire types for the Yandex Cloud REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::{Folder, Image, Page};

#[derive(Debug, Serialize)]
pub(super) struct IamTokenRequest<'a> {
    pub jwt: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IamTokenResponse {
    pub iam_token: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT claims for the service-account token exchange.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct JwtClaims {
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ListFoldersResponse {
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl From<ListFoldersResponse> for Page<Folder> {
    fn from(response: ListFoldersResponse) -> Self {
        Page {
            items: response.folders,
            next_page_token: response.next_page_token,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ListImagesResponse {
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl From<ListImagesResponse> for Page<Image> {
    fn from(response: ListImagesResponse) -> Self {
        Page {
            items: response.images,
            next_page_token: response.next_page_token,
        }
    }
}

/// Error body returned by the API: `{"code": 7, "message": "..."}`.
#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_images_page() {
        let response: ListImagesResponse = serde_json::from_str(
            r#"{
                "images": [
                    {"id": "fd8a", "folderId": "b1gf", "name": "web-1", "createdAt": "2024-05-01T10:00:00Z", "status": "READY"},
                    {"id": "fd8b", "createdAt": "2024-05-02T10:00:00.123456Z"}
                ],
                "nextPageToken": "tok"
            }"#,
        )
        .unwrap();
        let page: Page<Image> = response.into();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "web-1");
        assert_eq!(page.items[1].name, "");
        assert!(page.items[1].created_at > page.items[0].created_at);
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_parse_empty_folder_listing() {
        // The API omits empty repeated fields entirely
        let response: ListFoldersResponse = serde_json::from_str("{}").unwrap();
        let page: Page<Folder> = response.into();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_parse_token_response() {
        let response: IamTokenResponse = serde_json::from_str(
            r#"{"iamToken": "t1.9eu", "expiresAt": "2024-05-01T22:00:00.000000Z"}"#,
        )
        .unwrap();
        assert_eq!(response.iam_token, "t1.9eu");
    }
}
