// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Application-facing recording API.
//!
//! [`Agent`] wraps a [`HarvestCoordinator`] and adds the agent level event
//! kinds (system events, errors, breadcrumbs) and the session identity.

use crate::constants::{BREADCRUMB_EVENT_TYPE, ERROR_EVENT_TYPE, SYSTEM_EVENT_TYPE};
use crate::coordinator::{HarvestCoordinator, HarvestReport};
use crate::sample::{now_ms, AttributeValue, Attributes, Summary};
use tracing::debug;

const SESSION_ATTRIBUTE: &str = "agentSession";
const USER_ID_ATTRIBUTE: &str = "userId";

pub struct Agent {
    harvest: HarvestCoordinator,
    session: String,
}

fn random_session_id() -> String {
    format!("{:x}{:x}", now_ms(), rand::random::<u64>())
}

impl Agent {
    /// Wraps `harvest` and tags every later sample with a fresh session id.
    #[must_use]
    pub fn new(harvest: HarvestCoordinator) -> Self {
        let session = random_session_id();
        harvest.set_attribute(SESSION_ATTRIBUTE, session.as_str());
        debug!("HARVEST | Agent session {}", session);
        Agent { harvest, session }
    }

    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub fn coordinator(&self) -> &HarvestCoordinator {
        &self.harvest
    }

    pub fn start(&self) {
        self.harvest.start();
    }

    pub fn shutdown(&self) {
        self.harvest.shutdown();
    }

    pub fn record_custom_event(&self, event_type: &str, attributes: Option<Attributes>) -> bool {
        self.harvest.record_event(event_type, attributes)
    }

    pub fn record_system_event(&self, attributes: Option<Attributes>) -> bool {
        self.record_custom_event(SYSTEM_EVENT_TYPE, attributes)
    }

    /// Records an error event. `name` and `message` overwrite caller
    /// attributes of the same key.
    pub fn record_error(
        &self,
        name: &str,
        message: &str,
        stack: Option<&str>,
        attributes: Option<Attributes>,
    ) -> bool {
        let mut attributes = attributes.unwrap_or_default();
        attributes.insert("name".to_string(), name.into());
        attributes.insert("errorMessage".to_string(), message.into());
        if let Some(stack) = stack.filter(|s| !s.is_empty()) {
            attributes.insert("errorStack".to_string(), stack.into());
        }
        self.record_custom_event(ERROR_EVENT_TYPE, Some(attributes))
    }

    pub fn record_breadcrumb(&self, name: &str, attributes: Option<Attributes>) -> bool {
        let mut attributes = attributes.unwrap_or_default();
        attributes.insert("name".to_string(), name.into());
        self.record_custom_event(BREADCRUMB_EVENT_TYPE, Some(attributes))
    }

    pub fn record_log(&self, message: &str, attributes: Option<Attributes>) -> bool {
        self.harvest.record_log(message, attributes)
    }

    pub fn record_gauge_metric(
        &self,
        name: &str,
        value: f64,
        attributes: Option<Attributes>,
    ) -> bool {
        self.harvest.record_gauge_metric(name, value, attributes)
    }

    pub fn record_count_metric(
        &self,
        name: &str,
        value: f64,
        interval_ms: u64,
        attributes: Option<Attributes>,
    ) -> bool {
        self.harvest
            .record_count_metric(name, value, interval_ms, attributes)
    }

    pub fn record_summary_metric(
        &self,
        name: &str,
        summary: Summary,
        interval_ms: u64,
        attributes: Option<Attributes>,
    ) -> bool {
        self.harvest
            .record_summary_metric(name, summary, interval_ms, attributes)
    }

    pub fn set_user_id(&self, user_id: &str) -> Option<AttributeValue> {
        self.harvest.set_attribute(USER_ID_ATTRIBUTE, user_id)
    }

    pub fn set_attribute(
        &self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.harvest.set_attribute(name, value)
    }

    pub fn remove_attribute(&self, name: &str) -> Option<AttributeValue> {
        self.harvest.remove_attribute(name)
    }

    pub fn remove_all_attributes(&self) {
        self.harvest.remove_all_attributes();
    }

    pub fn set_harvest_time(&self, seconds: u64) -> bool {
        self.harvest.set_harvest_time(seconds)
    }

    pub async fn harvest_now(&self) -> HarvestReport {
        self.harvest.harvest_now().await
    }
}
