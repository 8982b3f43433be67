// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Payload compression and delivery to the ingestion endpoints.
//!
//! ```text
//!   serialized buffer
//!         │
//!         v
//!   ┌─────────────┐
//!   │  Compress   │ (gzip)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │ HTTP POST   │ (Api-Key, Content-Encoding: gzip)
//!   └──────┬──────┘
//!          │
//!          v
//!     status code ──> worker
//! ```
//!
//! The worker only needs a status code back, so the network sits behind the
//! [`Transport`] trait and tests can script responses.

use crate::config::HarvestConfig;
use crate::constants::API_KEY_HEADER;
use crate::errors::TransportError;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use std::io::Write;
use tracing::{debug, error};

/// One compressed payload ready to be posted.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub url: String,
    pub api_key: String,
    /// gzip-compressed JSON
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Posts the payload. `Err` means no HTTP response was obtained.
    async fn post(&self, request: IngestRequest) -> Result<StatusCode, TransportError>;
}

/// gzip-compresses `data` at `level` (0-9).
pub fn gzip(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Creates a reqwest client with the configured timeout and proxy.
///
/// If the proxy configuration is invalid, logs an error and returns a default
/// client so harvesting keeps working without it.
#[must_use]
pub fn get_client(config: &HarvestConfig) -> reqwest::Client {
    match build_client(config) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "HARVEST | Unable to parse proxy configuration: {}, no proxy will be used",
                e
            );
            reqwest::Client::new()
        }
    }
}

fn build_client(config: &HarvestConfig) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder().timeout(config.timeout());
    if let Some(https_uri) = &config.https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(https_uri)?);
    }
    builder.build()
}

/// [`Transport`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }

    #[must_use]
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(get_client(config))
    }

    fn headers(api_key: &str) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let key = HeaderValue::from_str(api_key).map_err(|_| TransportError::InvalidApiKey)?;
        headers.insert(API_KEY_HEADER, key);
        Ok(headers)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, request: IngestRequest) -> Result<StatusCode, TransportError> {
        let headers = Self::headers(&request.api_key)?;
        let n_bytes = request.body.len();
        let resp = self
            .client
            .post(&request.url)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = resp.status();
        debug!(
            "HARVEST | Posted {} bytes to {}, response code = {}",
            n_bytes, request.url, status
        );
        if !status.is_success() {
            // Don't read response body unless needed
            debug!(
                "HARVEST | Response body: {:?}",
                resp.text().await.unwrap_or_default()
            );
        }
        Ok(status)
    }
}
