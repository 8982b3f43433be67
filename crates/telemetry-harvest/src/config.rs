// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_BUFFER_SIZE, DEFAULT_COMPRESSION_LEVEL, DEFAULT_HARVEST_TIME,
    DEFAULT_REQUEST_TIMEOUT, MAX_BUFFER_SIZE, MAX_HARVEST_TIME, MIN_BUFFER_SIZE,
    MIN_HARVEST_TIME,
};
use crate::endpoint::{Endpoint, Region};
use crate::errors::HarvestError;
use std::env;
use std::time::Duration;

/// Configuration shared by the three harvest workers.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Ingestion API key
    pub api_key: Option<String>,
    /// Account ID, required by the events endpoint
    pub account_id: Option<String>,
    /// Data region (US or EU)
    pub region: Region,
    /// Replaces scheme and host of every ingestion URL
    pub ingest_url: Option<String>,
    /// Initial harvest interval in seconds
    pub harvest_interval: u64,
    /// Initial buffer capacity per category
    pub buffer_size: usize,
    /// Timeout of one ingestion request in seconds
    pub request_timeout: u64,
    /// gzip level (0-9)
    pub compression_level: u32,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            account_id: None,
            region: Region::Us,
            ingest_url: None,
            harvest_interval: DEFAULT_HARVEST_TIME,
            buffer_size: DEFAULT_BUFFER_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            https_proxy: None,
            log_level: "info".to_string(),
        }
    }
}

impl HarvestConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, HarvestError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from any key lookup, using the same variable names
    /// as [`HarvestConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarvestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        let api_key = non_empty("HARVEST_API_KEY").map(|val| val.trim().to_string());
        let account_id = non_empty("HARVEST_ACCOUNT_ID").map(|val| val.trim().to_string());
        let region = non_empty("HARVEST_REGION")
            .and_then(|val| val.parse::<Region>().ok())
            .unwrap_or(defaults.region);
        let ingest_url = non_empty("HARVEST_INGEST_URL");
        let harvest_interval = parse_number("HARVEST_INTERVAL", non_empty("HARVEST_INTERVAL"))?
            .unwrap_or(defaults.harvest_interval);
        let buffer_size = parse_number("HARVEST_BUFFER_SIZE", non_empty("HARVEST_BUFFER_SIZE"))?
            .unwrap_or(defaults.buffer_size);
        let request_timeout = parse_number("HARVEST_TIMEOUT", non_empty("HARVEST_TIMEOUT"))?
            .unwrap_or(defaults.request_timeout);
        let compression_level = parse_number(
            "HARVEST_COMPRESSION_LEVEL",
            non_empty("HARVEST_COMPRESSION_LEVEL"),
        )?
        .unwrap_or(defaults.compression_level);
        let https_proxy = non_empty("HARVEST_PROXY_HTTPS").or_else(|| non_empty("HTTPS_PROXY"));
        let log_level = non_empty("HARVEST_LOG_LEVEL")
            .map(|val| val.trim().to_lowercase())
            .unwrap_or(defaults.log_level);

        let config = Self {
            api_key,
            account_id,
            region,
            ingest_url,
            harvest_interval,
            buffer_size,
            request_timeout,
            compression_level,
            https_proxy,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), HarvestError> {
        if !(MIN_HARVEST_TIME..=MAX_HARVEST_TIME).contains(&self.harvest_interval) {
            return Err(HarvestError::InvalidConfig(format!(
                "Harvest interval must be between {MIN_HARVEST_TIME} and {MAX_HARVEST_TIME} seconds, got {}",
                self.harvest_interval
            )));
        }

        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&self.buffer_size) {
            return Err(HarvestError::InvalidConfig(format!(
                "Buffer size must be between {MIN_BUFFER_SIZE} and {MAX_BUFFER_SIZE}, got {}",
                self.buffer_size
            )));
        }

        if self.request_timeout == 0 {
            return Err(HarvestError::InvalidConfig(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.compression_level > 9 {
            return Err(HarvestError::InvalidConfig(format!(
                "Compression level must be between 0 and 9, got {}",
                self.compression_level
            )));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(HarvestError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.region, self.ingest_url.clone())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

fn parse_number<N: std::str::FromStr>(
    key: &str,
    value: Option<String>,
) -> Result<Option<N>, HarvestError> {
    value
        .map(|val| {
            val.trim()
                .parse::<N>()
                .map_err(|_| HarvestError::InvalidConfig(format!("{key} is not a number: '{val}'")))
        })
        .transpose()
}
