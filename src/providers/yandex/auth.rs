//! IAM token exchange for service-account keys.
//!
//! A short-lived PS256 JWT, signed with the account's private key and carrying
//! the access key id as `kid`, is exchanged for an IAM token. The token is
//! cached and reused until it is close to expiry.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::CONTENT_TYPE;
use tokio::sync::Mutex;

use super::{
    PROVIDER_NAME,
    types::{ApiErrorBody, IamTokenRequest, IamTokenResponse, JwtClaims},
};
use crate::{
    accounts::ServiceAccountKey,
    config::RetryConfig,
    providers::{ProviderError, retry::with_retry},
};

/// Audience the IAM service expects in every exchange JWT, regardless of which
/// endpoint the request is sent to.
pub const TOKEN_AUDIENCE: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";

/// Lifetime of the signed JWT. The IAM service rejects anything over an hour.
const JWT_LIFETIME_SECS: i64 = 3600;

/// Refresh the IAM token this long before it expires.
const REFRESH_MARGIN_SECS: i64 = 300;

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Produces IAM tokens for one service account.
pub struct IamTokenSource {
    http: reqwest::Client,
    retry: RetryConfig,
    token_url: String,
    service_account_id: String,
    access_key_id: String,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl IamTokenSource {
    /// Parse the private key up front so a malformed key fails session setup
    /// instead of the first API call.
    pub fn new(
        http: reqwest::Client,
        retry: RetryConfig,
        token_url: String,
        credentials: &ServiceAccountKey,
    ) -> Result<Self, ProviderError> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| ProviderError::InvalidKey(e.to_string()))?;

        Ok(Self {
            http,
            retry,
            token_url,
            service_account_id: credentials.service_account_id.clone(),
            access_key_id: credentials.access_key_id.clone(),
            key,
            cached: Mutex::new(None),
        })
    }

    /// Current IAM token, exchanging a new one when missing or near expiry.
    pub async fn token(&self) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().await;

        if let Some(current) = cached.as_ref()
            && current.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > Utc::now()
        {
            return Ok(current.token.clone());
        }

        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn sign_jwt(&self, now: DateTime<Utc>) -> Result<String, ProviderError> {
        let mut header = Header::new(Algorithm::PS256);
        header.kid = Some(self.access_key_id.clone());

        let claims = JwtClaims {
            iss: self.service_account_id.clone(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + JWT_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| ProviderError::Auth(format!("failed to sign JWT: {e}")))
    }

    async fn exchange(&self) -> Result<CachedToken, ProviderError> {
        let jwt = self.sign_jwt(Utc::now())?;

        // Pre-serialize so retries clone bytes instead of re-encoding
        let body = serde_json::to_vec(&IamTokenRequest { jwt: &jwt })
            .map_err(|e| ProviderError::Auth(e.to_string()))?;

        let response = with_retry(&self.retry, "iam_token", || {
            self.http
                .post(&self.token_url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            return Err(ProviderError::Auth(format!(
                "{PROVIDER_NAME} IAM returned {status}: {message}"
            )));
        }

        let parsed: IamTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        tracing::debug!(
            service_account_id = %self.service_account_id,
            expires_at = %parsed.expires_at,
            "Obtained IAM token"
        );

        Ok(CachedToken {
            token: parsed.iam_token,
            expires_at: parsed.expires_at,
        })
    }
}
