// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::sync::Arc;
use std::{future::Future, pin::Pin};
use tokio::sync::OnceCell;

pub type ApiKeyResolverFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = String> + Send>> + Send + Sync>;

/// Source of the ingestion key shared by the three harvest workers.
///
/// A dynamic key is resolved on the first harvest and cached afterwards, so a
/// slow secret lookup never delays recording.
#[derive(Clone)]
pub enum ApiKeyFactory {
    Static(String),
    Dynamic {
        resolver_fn: ApiKeyResolverFn,
        api_key: Arc<OnceCell<String>>,
    },
}

impl ApiKeyFactory {
    pub fn new_from_resolver(resolver_fn: ApiKeyResolverFn) -> Self {
        Self::Dynamic {
            resolver_fn,
            api_key: Arc::new(OnceCell::new()),
        }
    }

    pub fn new_from_static_key(api_key: &str) -> Self {
        Self::Static(api_key.to_string())
    }

    /// Returns the key, or `None` when it resolved to an empty string.
    pub async fn get_api_key(&self) -> Option<&str> {
        let key = match self {
            Self::Static(api_key) => api_key.as_str(),
            Self::Dynamic {
                resolver_fn,
                api_key,
            } => api_key
                .get_or_init(|| async { (resolver_fn)().await.trim().to_string() })
                .await
                .as_str(),
        };
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

impl Debug for ApiKeyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => write!(f, "ApiKeyFactory::Static(<redacted>)"),
            Self::Dynamic { .. } => write!(f, "ApiKeyFactory::Dynamic"),
        }
    }
}
