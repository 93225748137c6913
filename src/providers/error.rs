//! Provider error type.

use thiserror::Error;

/// Errors from provider calls and session setup.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("IAM token exchange failed: {0}")]
    Auth(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Invalid service account key: {0}")]
    InvalidKey(String),
}

impl ProviderError {
    /// HTTP status code, when the provider answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            ProviderError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

const MAX_ERROR_BODY: usize = 512;

/// Cap error bodies kept in reports and logs.
pub(crate) fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}
