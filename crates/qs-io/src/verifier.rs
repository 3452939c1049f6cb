//! HTTP attestation verifier
//!
//! Uploads the quote as a multipart form (`file` = `quote.bin`) and reads
//! the verifier's `checksum` from the JSON answer.

use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use qs_machine::{QuoteVerifier, UploadError};

/// Default upload timeout
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    checksum: String,
}

/// Client for the attestation verification endpoint
#[derive(Debug, Clone)]
pub struct HttpQuoteVerifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpQuoteVerifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Upload `blob`, returning the verifier's checksum
    pub async fn upload(&self, blob: &[u8]) -> Result<String, UploadError> {
        let part = Part::bytes(blob.to_vec())
            .file_name("quote.bin")
            .mime_str("application/octet-stream")
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        log::info!("[Verifier] Uploading {} bytes to {}", blob.len(), self.url);
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let parsed: VerifyResponse =
            serde_json::from_slice(&body).map_err(|e| UploadError::Malformed(e.to_string()))?;

        if parsed.checksum.trim().is_empty() {
            return Err(UploadError::Malformed("empty checksum".into()));
        }
        Ok(parsed.checksum)
    }
}

impl QuoteVerifier for HttpQuoteVerifier {
    fn verify<'a>(&'a self, blob: &'a [u8]) -> BoxFuture<'a, Result<String, UploadError>> {
        self.upload(blob).boxed()
    }
}
