// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON-lines recording commands read from stdin.
//!
//! ```text
//! {"kind":"event","event_type":"Purchase","attributes":{"amount":12}}
//! {"kind":"gauge","name":"temperature","value":21.5}
//! {"kind":"harvest_now"}
//! ```

use serde::Deserialize;
use telemetry_harvest::agent::Agent;
use telemetry_harvest::sample::{AttributeValue, Attributes, Summary};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Event {
        event_type: String,
        attributes: Option<Attributes>,
    },
    SystemEvent {
        attributes: Option<Attributes>,
    },
    Error {
        name: String,
        message: String,
        stack: Option<String>,
        attributes: Option<Attributes>,
    },
    Breadcrumb {
        name: String,
        attributes: Option<Attributes>,
    },
    Log {
        message: String,
        attributes: Option<Attributes>,
    },
    Gauge {
        name: String,
        value: f64,
        attributes: Option<Attributes>,
    },
    Count {
        name: String,
        value: f64,
        interval_ms: u64,
        attributes: Option<Attributes>,
    },
    Summary {
        name: String,
        summary: Summary,
        interval_ms: u64,
        attributes: Option<Attributes>,
    },
    HarvestNow,
    SetHarvestTime {
        seconds: u64,
    },
    SetAttribute {
        name: String,
        value: AttributeValue,
    },
    RemoveAttribute {
        name: String,
    },
    SetUserId {
        user_id: String,
    },
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Forwards the command to `agent`.
    pub async fn apply(self, agent: &Agent) {
        let accepted = match self {
            Command::Event {
                event_type,
                attributes,
            } => agent.record_custom_event(&event_type, attributes),
            Command::SystemEvent { attributes } => agent.record_system_event(attributes),
            Command::Error {
                name,
                message,
                stack,
                attributes,
            } => agent.record_error(&name, &message, stack.as_deref(), attributes),
            Command::Breadcrumb { name, attributes } => agent.record_breadcrumb(&name, attributes),
            Command::Log {
                message,
                attributes,
            } => agent.record_log(&message, attributes),
            Command::Gauge {
                name,
                value,
                attributes,
            } => agent.record_gauge_metric(&name, value, attributes),
            Command::Count {
                name,
                value,
                interval_ms,
                attributes,
            } => agent.record_count_metric(&name, value, interval_ms, attributes),
            Command::Summary {
                name,
                summary,
                interval_ms,
                attributes,
            } => agent.record_summary_metric(&name, summary, interval_ms, attributes),
            Command::HarvestNow => {
                let report = agent.harvest_now().await;
                info!("Harvest finished: {:?}", report);
                true
            }
            Command::SetHarvestTime { seconds } => agent.set_harvest_time(seconds),
            Command::SetAttribute { name, value } => {
                agent.set_attribute(name, value);
                true
            }
            Command::RemoveAttribute { name } => {
                agent.remove_attribute(&name);
                true
            }
            Command::SetUserId { user_id } => {
                agent.set_user_id(&user_id);
                true
            }
        };
        if accepted {
            debug!("Command applied");
        } else {
            warn!("Command was not applied");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_harvest::config::HarvestConfig;
    use telemetry_harvest::coordinator::HarvestCoordinator;
    use telemetry_harvest::sample::Category;

    fn agent() -> Agent {
        let config = HarvestConfig {
            api_key: Some("key".to_string()),
            account_id: Some("1".to_string()),
            ingest_url: Some("http://127.0.0.1:1".to_string()),
            ..Default::default()
        };
        Agent::new(HarvestCoordinator::from_config(&config).unwrap())
    }

    #[test]
    fn test_parse_event() {
        let command = Command::parse(
            r#"{"kind":"event","event_type":"Purchase","attributes":{"amount":12,"vip":true,"ratio":0.5,"sku":"a1"}}"#,
        )
        .unwrap();
        let Command::Event {
            event_type,
            attributes,
        } = command
        else {
            panic!("expected an event, got {command:?}");
        };
        assert_eq!(event_type, "Purchase");
        let attributes = attributes.unwrap();
        assert_eq!(attributes["amount"], AttributeValue::Int(12));
        assert_eq!(attributes["vip"], AttributeValue::Bool(true));
        assert_eq!(attributes["ratio"], AttributeValue::Float(0.5));
        assert_eq!(attributes["sku"], AttributeValue::String("a1".to_string()));
    }

    #[test]
    fn test_parse_summary_and_controls() {
        let command = Command::parse(
            r#"{"kind":"summary","name":"latency","summary":{"count":2,"min":1,"max":3,"sum":4},"interval_ms":1000}"#,
        )
        .unwrap();
        assert!(matches!(command, Command::Summary { interval_ms: 1000, .. }));

        assert!(matches!(
            Command::parse(r#"{"kind":"harvest_now"}"#).unwrap(),
            Command::HarvestNow
        ));
        assert!(matches!(
            Command::parse(r#"{"kind":"set_harvest_time","seconds":90}"#).unwrap(),
            Command::SetHarvestTime { seconds: 90 }
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        assert!(Command::parse(r#"{"kind":"teleport"}"#).is_err());
        assert!(Command::parse("not json").is_err());
    }

    #[tokio::test]
    async fn test_apply_records() {
        let agent = agent();
        for line in [
            r#"{"kind":"event","event_type":"Purchase"}"#,
            r#"{"kind":"breadcrumb","name":"home"}"#,
            r#"{"kind":"log","message":"hello"}"#,
            r#"{"kind":"count","name":"requests","value":1,"interval_ms":500}"#,
            r#"{"kind":"set_user_id","user_id":"u1"}"#,
            r#"{"kind":"set_harvest_time","seconds":300}"#,
        ] {
            Command::parse(line).unwrap().apply(&agent).await;
        }
        assert_eq!(agent.coordinator().len(Category::Events), 2);
        assert_eq!(agent.coordinator().len(Category::Logs), 1);
        assert_eq!(agent.coordinator().len(Category::Metrics), 1);
        assert_eq!(agent.coordinator().attribute("userId"), Some("u1".into()));
        assert_eq!(
            agent.coordinator().events().harvest_interval(),
            std::time::Duration::from_secs(300)
        );
        agent.shutdown();
    }
}
