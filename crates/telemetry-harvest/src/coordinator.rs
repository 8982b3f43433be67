// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Owns the three category workers and the custom attribute map.
//!
//! Every recorded sample gets its attributes merged as
//! `system < caller < custom` (later wins) before it is offered to the buffer
//! of its category.

use crate::api_key::ApiKeyFactory;
use crate::config::HarvestConfig;
use crate::constants::{MAX_HARVEST_TIME, MIN_HARVEST_TIME};
use crate::endpoint::Endpoint;
use crate::errors::HarvestError;
use crate::sample::{AttributeValue, Attributes, Category, Sample, Summary};
use crate::serializer::{CategorySerializer, EventSerializer, LogSerializer, MetricSerializer};
use crate::transport::{ReqwestTransport, Transport};
use crate::worker::{HarvestOutcome, HarvestWorker, WorkerConfig};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Outcome of one coordinated harvest, per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestReport {
    pub events: HarvestOutcome,
    pub logs: HarvestOutcome,
    pub metrics: HarvestOutcome,
}

pub struct HarvestCoordinator {
    events: HarvestWorker<EventSerializer>,
    logs: HarvestWorker<LogSerializer>,
    metrics: HarvestWorker<MetricSerializer>,
    system_attributes: Attributes,
    custom_attributes: Mutex<Attributes>,
}

struct WorkerSettings<'a> {
    config: &'a HarvestConfig,
    endpoint: Endpoint,
    account_id: &'a str,
    api_key_factory: Arc<ApiKeyFactory>,
    transport: Arc<dyn Transport>,
}

impl WorkerSettings<'_> {
    fn worker<S: CategorySerializer + 'static>(&self, serializer: S) -> HarvestWorker<S> {
        let url = self.endpoint.url(serializer.category(), self.account_id);
        debug!("HARVEST | {} endpoint: {}", serializer.category(), url);
        HarvestWorker::new(WorkerConfig {
            serializer,
            url,
            api_key_factory: Arc::clone(&self.api_key_factory),
            transport: Arc::clone(&self.transport),
            harvest_interval: self.config.harvest_interval,
            buffer_size: self.config.buffer_size,
            compression_level: self.config.compression_level,
        })
    }
}

impl HarvestCoordinator {
    /// Builds the coordinator with a static API key and an HTTP transport.
    pub fn from_config(config: &HarvestConfig) -> Result<Self, HarvestError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or(HarvestError::MissingApiKey)?;
        Self::new(
            config,
            Arc::new(ApiKeyFactory::new_from_static_key(api_key)),
            Arc::new(ReqwestTransport::from_config(config)),
        )
    }

    pub fn new(
        config: &HarvestConfig,
        api_key_factory: Arc<ApiKeyFactory>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, HarvestError> {
        config.validate()?;
        let account_id = config
            .account_id
            .as_deref()
            .ok_or(HarvestError::MissingAccountId)?;
        let settings = WorkerSettings {
            config,
            endpoint: config.endpoint(),
            account_id,
            api_key_factory,
            transport,
        };

        Ok(HarvestCoordinator {
            events: settings.worker(EventSerializer),
            logs: settings.worker(LogSerializer),
            metrics: settings.worker(MetricSerializer),
            system_attributes: Attributes::new(),
            custom_attributes: Mutex::new(Attributes::new()),
        })
    }

    /// Attributes merged under every sample at the lowest precedence.
    #[must_use]
    pub fn with_system_attributes(mut self, attributes: Attributes) -> Self {
        self.system_attributes = attributes;
        self
    }

    /// Arms the timers of all three workers.
    pub fn start(&self) {
        self.events.start();
        self.logs.start();
        self.metrics.start();
    }

    /// Cancels all pending timers. In-flight requests still complete.
    pub fn shutdown(&self) {
        self.events.shutdown();
        self.logs.shutdown();
        self.metrics.shutdown();
    }

    fn custom_attributes(&self) -> MutexGuard<'_, Attributes> {
        self.custom_attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn merge_attributes(&self, attributes: Option<Attributes>) -> Attributes {
        let mut merged = self.system_attributes.clone();
        if let Some(attributes) = attributes {
            merged.extend(attributes);
        }
        merged.extend(
            self.custom_attributes()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }

    pub fn record_event(&self, event_type: &str, attributes: Option<Attributes>) -> bool {
        let sample = Sample::event(event_type, self.merge_attributes(attributes));
        self.events.put(sample)
    }

    pub fn record_log(&self, message: &str, attributes: Option<Attributes>) -> bool {
        let sample = Sample::log(message, self.merge_attributes(attributes));
        self.logs.put(sample)
    }

    pub fn record_gauge_metric(
        &self,
        name: &str,
        value: f64,
        attributes: Option<Attributes>,
    ) -> bool {
        let sample = Sample::gauge(name, value, self.merge_attributes(attributes));
        self.metrics.put(sample)
    }

    pub fn record_count_metric(
        &self,
        name: &str,
        value: f64,
        interval_ms: u64,
        attributes: Option<Attributes>,
    ) -> bool {
        let sample = Sample::count(name, value, interval_ms, self.merge_attributes(attributes));
        self.metrics.put(sample)
    }

    pub fn record_summary_metric(
        &self,
        name: &str,
        summary: Summary,
        interval_ms: u64,
        attributes: Option<Attributes>,
    ) -> bool {
        let sample = Sample::summary(name, summary, interval_ms, self.merge_attributes(attributes));
        self.metrics.put(sample)
    }

    /// Applies `seconds` to all three workers. Rejected as a whole when it
    /// falls outside [60, 600].
    pub fn set_harvest_time(&self, seconds: u64) -> bool {
        if !(MIN_HARVEST_TIME..=MAX_HARVEST_TIME).contains(&seconds) {
            warn!(
                "HARVEST | Ignoring harvest time of {}s, must be between {} and {}",
                seconds, MIN_HARVEST_TIME, MAX_HARVEST_TIME
            );
            return false;
        }
        self.events.set_harvest_time(seconds)
            && self.logs.set_harvest_time(seconds)
            && self.metrics.set_harvest_time(seconds)
    }

    /// Harvests the three categories concurrently.
    pub async fn harvest_now(&self) -> HarvestReport {
        let (events, logs, metrics) = tokio::join!(
            self.events.harvest_now(),
            self.logs.harvest_now(),
            self.metrics.harvest_now()
        );
        HarvestReport {
            events,
            logs,
            metrics,
        }
    }

    /// Sets a custom attribute and returns the value it replaced.
    pub fn set_attribute(
        &self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.custom_attributes().insert(name.into(), value.into())
    }

    pub fn remove_attribute(&self, name: &str) -> Option<AttributeValue> {
        self.custom_attributes().remove(name)
    }

    pub fn remove_all_attributes(&self) {
        self.custom_attributes().clear();
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.custom_attributes().get(name).cloned()
    }

    #[must_use]
    pub fn events(&self) -> &HarvestWorker<EventSerializer> {
        &self.events
    }

    #[must_use]
    pub fn logs(&self) -> &HarvestWorker<LogSerializer> {
        &self.logs
    }

    #[must_use]
    pub fn metrics(&self) -> &HarvestWorker<MetricSerializer> {
        &self.metrics
    }

    /// Samples currently buffered for `category`.
    #[must_use]
    pub fn len(&self, category: Category) -> usize {
        match category {
            Category::Events => self.events.len(),
            Category::Logs => self.logs.len(),
            Category::Metrics => self.metrics.len(),
        }
    }
}
