// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ingestion endpoint resolution per category and region.

use crate::sample::Category;
use derive_more::Display;
use std::str::FromStr;

/// Data region of the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum Region {
    #[default]
    #[display("US")]
    Us,
    #[display("EU")]
    Eu,
}

impl FromStr for Region {
    type Err = std::convert::Infallible;

    /// `"EU"` in any case selects the EU region, anything else falls back to US.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("eu") {
            Ok(Region::Eu)
        } else {
            Ok(Region::Us)
        }
    }
}

/// Where a category's payloads are posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub region: Region,
    /// Replaces scheme and host of the regional URL, keeping the category path.
    pub url_override: Option<String>,
}

impl Endpoint {
    #[must_use]
    pub fn new(region: Region, url_override: Option<String>) -> Self {
        Endpoint {
            region,
            url_override: url_override.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn host(&self, category: Category) -> &'static str {
        match (category, self.region) {
            (Category::Events, Region::Us) => "https://insights-collector.newrelic.com",
            (Category::Events, Region::Eu) => "https://insights-collector.eu01.nr-data.net",
            (Category::Logs, Region::Us) => "https://log-api.newrelic.com",
            (Category::Logs, Region::Eu) => "https://log-api.eu.newrelic.com",
            (Category::Metrics, Region::Us) => "https://metric-api.newrelic.com",
            (Category::Metrics, Region::Eu) => "https://metric-api.eu.newrelic.com",
        }
    }

    /// Full URL for `category`. The account id is only used by the events path.
    #[must_use]
    pub fn url(&self, category: Category, account_id: &str) -> String {
        let path = match category {
            Category::Events => format!("/v1/accounts/{account_id}/events"),
            Category::Logs => "/log/v1".to_string(),
            Category::Metrics => "/metric/v1".to_string(),
        };
        match &self.url_override {
            Some(base) => format!("{base}{path}"),
            None => format!("{}{path}", self.host(category)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parse() {
        assert_eq!("EU".parse::<Region>(), Ok(Region::Eu));
        assert_eq!(" eu ".parse::<Region>(), Ok(Region::Eu));
        assert_eq!("US".parse::<Region>(), Ok(Region::Us));
        assert_eq!("mars".parse::<Region>(), Ok(Region::Us));
    }

    #[test]
    fn test_us_urls() {
        let endpoint = Endpoint::new(Region::Us, None);
        assert_eq!(
            endpoint.url(Category::Events, "12345"),
            "https://insights-collector.newrelic.com/v1/accounts/12345/events"
        );
        assert_eq!(
            endpoint.url(Category::Logs, "12345"),
            "https://log-api.newrelic.com/log/v1"
        );
        assert_eq!(
            endpoint.url(Category::Metrics, "12345"),
            "https://metric-api.newrelic.com/metric/v1"
        );
    }

    #[test]
    fn test_eu_urls() {
        let endpoint = Endpoint::new(Region::Eu, None);
        assert_eq!(
            endpoint.url(Category::Events, "1"),
            "https://insights-collector.eu01.nr-data.net/v1/accounts/1/events"
        );
        assert_eq!(
            endpoint.url(Category::Logs, "1"),
            "https://log-api.eu.newrelic.com/log/v1"
        );
        assert_eq!(
            endpoint.url(Category::Metrics, "1"),
            "https://metric-api.eu.newrelic.com/metric/v1"
        );
    }

    #[test]
    fn test_override_keeps_path() {
        let endpoint = Endpoint::new(Region::Eu, Some("http://127.0.0.1:8080/".to_string()));
        assert_eq!(
            endpoint.url(Category::Events, "7"),
            "http://127.0.0.1:8080/v1/accounts/7/events"
        );
        assert_eq!(
            endpoint.url(Category::Metrics, "7"),
            "http://127.0.0.1:8080/metric/v1"
        );
    }
}
