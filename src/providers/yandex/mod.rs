//! Yandex Cloud REST API client.
//!
//! Endpoints used:
//!
//! - `POST {iam}/iam/v1/tokens` (token exchange, see [`auth`])
//! - `GET {resource-manager}/resource-manager/v1/folders?cloudId=...`
//! - `GET {compute}/compute/v1/images?folderId=...`
//! - `DELETE {compute}/compute/v1/images/{imageId}`

pub mod auth;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;

use self::{
    auth::IamTokenSource,
    types::{ApiErrorBody, ListFoldersResponse, ListImagesResponse},
};
use super::{
    CloudSession, Folder, FolderService, Image, ImageService, Page, ProviderError, SessionFactory,
    error::truncate_body, retry::with_retry,
};
use crate::{
    accounts::AccountConfig,
    config::{ProviderConfig, RetryConfig},
    routing::{ResolvedEndpoints, Service},
};

pub(crate) const PROVIDER_NAME: &str = "yandex";

/// Creates [`YandexClient`] sessions sharing one HTTP connection pool.
#[derive(Clone)]
pub struct YandexSessionFactory {
    http: reqwest::Client,
    retry: RetryConfig,
}

impl YandexSessionFactory {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            retry: config.retry.clone(),
        })
    }
}

impl SessionFactory for YandexSessionFactory {
    fn create_session(
        &self,
        account: &AccountConfig,
        endpoints: &ResolvedEndpoints,
    ) -> Result<CloudSession, ProviderError> {
        let auth = IamTokenSource::new(
            self.http.clone(),
            self.retry.clone(),
            endpoints.url(Service::Iam, "/iam/v1/tokens"),
            &account.credentials,
        )?;

        let client = Arc::new(YandexClient {
            http: self.http.clone(),
            retry: self.retry.clone(),
            endpoints: endpoints.clone(),
            auth,
        });

        Ok(CloudSession {
            folders: client.clone(),
            images: client,
        })
    }
}

/// Folder and image API client for one account.
pub struct YandexClient {
    http: reqwest::Client,
    retry: RetryConfig,
    endpoints: ResolvedEndpoints,
    auth: IamTokenSource,
}

impl YandexClient {
    /// Authorized GET with retries, decoding a JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        query: &[(&str, &str)],
        operation: &str,
    ) -> Result<T, ProviderError> {
        let token = self.auth.token().await?;
        let url = self.endpoints.url(service, path);

        let response = with_retry(&self.retry, operation, || {
            self.http
                .get(&url)
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .query(query)
                .send()
        })
        .await?;

        let response = check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("{operation}: {e}")))
    }
}

/// Check response status and extract the API error message on failure.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or(body);

    Err(ProviderError::Status {
        status,
        body: truncate_body(message),
    })
}

#[async_trait]
impl FolderService for YandexClient {
    async fn list_folders(
        &self,
        cloud_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<Folder>, ProviderError> {
        let page_size = page_size.to_string();
        let mut query = vec![("cloudId", cloud_id), ("pageSize", page_size.as_str())];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response: ListFoldersResponse = self
            .get_json(
                Service::ResourceManager,
                "/resource-manager/v1/folders",
                &query,
                "list_folders",
            )
            .await?;
        Ok(response.into())
    }
}

#[async_trait]
impl ImageService for YandexClient {
    async fn list_images(
        &self,
        folder_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<Page<Image>, ProviderError> {
        let page_size = page_size.to_string();
        let mut query = vec![("folderId", folder_id), ("pageSize", page_size.as_str())];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response: ListImagesResponse = self
            .get_json(Service::Compute, "/compute/v1/images", &query, "list_images")
            .await?;
        Ok(response.into())
    }

    async fn delete_image(&self, image_id: &str) -> Result<(), ProviderError> {
        let token = self.auth.token().await?;
        let url = self.endpoints.segments_url(
            Service::Compute,
            &["compute", "v1", "images", image_id],
        );

        // Single attempt, deletions are never retried
        let response = self
            .http
            .delete(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;

        check_response(response).await.map(|_| ())
    }
}
