// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced while configuring or constructing the harvest system.
///
/// Nothing that happens during a harvest cycle is reported through this type:
/// delivery failures are absorbed by the workers and only logged.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("API key is not set")]
    MissingApiKey,

    #[error("Account ID is required for the events endpoint")]
    MissingAccountId,
}

/// A request that produced no HTTP response at all.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API key could not be resolved")]
    MissingApiKey,

    #[error("API key is not a valid header value")]
    InvalidApiKey,
}

/// Failure to turn a buffer into a request body.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to compress payload: {0}")]
    Compress(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = HarvestError::InvalidConfig("harvest interval out of range".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: harvest interval out of range"
        );
        assert_eq!(HarvestError::MissingApiKey.to_string(), "API key is not set");
    }

    #[test]
    fn test_encode_error_from_io() {
        let error: EncodeError = std::io::Error::other("disk on fire").into();
        assert!(matches!(error, EncodeError::Compress(_)));
        assert!(error.to_string().contains("disk on fire"));
    }
}
