// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sample data model.
//!
//! A [`Sample`] is one buffered telemetry record. Each variant knows how to
//! render itself as the JSON record its ingestion endpoint expects through
//! [`Sample::to_wire_record`].

use derive_more::Display;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Attribute map attached to every sample. Key order is irrelevant.
pub type Attributes = HashMap<String, AttributeValue>;

/// Largest integer a JSON consumer can represent exactly as a double.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Int(i) => Value::from(*i),
            AttributeValue::Float(f) => json_number(*f),
            AttributeValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

/// Writes integral floats as JSON integers and non-finite floats as `null`.
pub(crate) fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < MAX_SAFE_INTEGER {
        #[allow(clippy::cast_possible_truncation)]
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

fn attributes_to_json(attributes: &Attributes) -> Map<String, Value> {
    attributes
        .iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect()
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Ingestion category. Each category has its own worker and endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Category {
    #[display("events")]
    Events,
    #[display("logs")]
    Logs,
    #[display("metrics")]
    Metrics,
}

/// Aggregated values of a summary metric.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Summary {
    pub count: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
}

/// Kind-specific payload of a metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Gauge { value: f64 },
    Count { value: f64, interval_ms: u64 },
    Summary { summary: Summary, interval_ms: u64 },
}

impl MetricValue {
    fn kind(&self) -> &'static str {
        match self {
            MetricValue::Gauge { .. } => "gauge",
            MetricValue::Count { .. } => "count",
            MetricValue::Summary { .. } => "summary",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: String,
    pub attributes: Attributes,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Log {
    pub message: String,
    pub attributes: Attributes,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub value: MetricValue,
    pub attributes: Attributes,
    pub timestamp: u64,
}

/// One buffered telemetry record.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Event(Event),
    Log(Log),
    Metric(Metric),
}

impl Sample {
    #[must_use]
    pub fn event(event_type: impl Into<String>, attributes: Attributes) -> Self {
        Sample::Event(Event {
            event_type: event_type.into(),
            attributes,
            timestamp: now_ms(),
        })
    }

    #[must_use]
    pub fn log(message: impl Into<String>, attributes: Attributes) -> Self {
        Sample::Log(Log {
            message: message.into(),
            attributes,
            timestamp: now_ms(),
        })
    }

    #[must_use]
    pub fn gauge(name: impl Into<String>, value: f64, attributes: Attributes) -> Self {
        Self::metric(name, MetricValue::Gauge { value }, attributes)
    }

    #[must_use]
    pub fn count(
        name: impl Into<String>,
        value: f64,
        interval_ms: u64,
        attributes: Attributes,
    ) -> Self {
        Self::metric(name, MetricValue::Count { value, interval_ms }, attributes)
    }

    #[must_use]
    pub fn summary(
        name: impl Into<String>,
        summary: Summary,
        interval_ms: u64,
        attributes: Attributes,
    ) -> Self {
        Self::metric(
            name,
            MetricValue::Summary {
                summary,
                interval_ms,
            },
            attributes,
        )
    }

    fn metric(name: impl Into<String>, value: MetricValue, attributes: Attributes) -> Self {
        Sample::Metric(Metric {
            name: name.into(),
            value,
            attributes,
            timestamp: now_ms(),
        })
    }

    #[must_use]
    pub fn timestamp(&self) -> u64 {
        match self {
            Sample::Event(e) => e.timestamp,
            Sample::Log(l) => l.timestamp,
            Sample::Metric(m) => m.timestamp,
        }
    }

    /// Replaces the construction timestamp.
    ///
    /// Takes the sample by value, so it can only be applied before the sample
    /// is handed to a buffer. Buffered samples are never mutated.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        match &mut self {
            Sample::Event(e) => e.timestamp = timestamp,
            Sample::Log(l) => l.timestamp = timestamp,
            Sample::Metric(m) => m.timestamp = timestamp,
        }
        self
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Sample::Event(_) => Category::Events,
            Sample::Log(_) => Category::Logs,
            Sample::Metric(_) => Category::Metrics,
        }
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        match self {
            Sample::Event(e) => &e.attributes,
            Sample::Log(l) => &l.attributes,
            Sample::Metric(m) => &m.attributes,
        }
    }

    /// Renders the record in the shape its category's endpoint expects.
    #[must_use]
    pub fn to_wire_record(&self) -> Value {
        match self {
            Sample::Event(event) => {
                // Reserved fields go last so they win over attributes.
                let mut record = attributes_to_json(&event.attributes);
                record.insert(
                    "eventType".to_string(),
                    Value::String(event.event_type.clone()),
                );
                record.insert("timestamp".to_string(), Value::from(event.timestamp));
                Value::Object(record)
            }
            Sample::Log(log) => {
                let mut record = Map::new();
                record.insert("message".to_string(), Value::String(log.message.clone()));
                record.insert("timestamp".to_string(), Value::from(log.timestamp));
                record.insert(
                    "attributes".to_string(),
                    Value::Object(attributes_to_json(&log.attributes)),
                );
                Value::Object(record)
            }
            Sample::Metric(metric) => {
                let mut record = Map::new();
                record.insert("name".to_string(), Value::String(metric.name.clone()));
                record.insert(
                    "type".to_string(),
                    Value::String(metric.value.kind().to_string()),
                );
                match &metric.value {
                    MetricValue::Gauge { value } => {
                        record.insert("value".to_string(), json_number(*value));
                    }
                    MetricValue::Count { value, interval_ms } => {
                        record.insert("value".to_string(), json_number(*value));
                        record.insert("interval.ms".to_string(), Value::from(*interval_ms));
                    }
                    MetricValue::Summary {
                        summary,
                        interval_ms,
                    } => {
                        let mut value = Map::new();
                        value.insert("count".to_string(), json_number(summary.count));
                        value.insert("sum".to_string(), json_number(summary.sum));
                        value.insert("min".to_string(), json_number(summary.min));
                        value.insert("max".to_string(), json_number(summary.max));
                        record.insert("value".to_string(), Value::Object(value));
                        record.insert("interval.ms".to_string(), Value::from(*interval_ms));
                    }
                }
                record.insert("timestamp".to_string(), Value::from(metric.timestamp));
                record.insert(
                    "attributes".to_string(),
                    Value::Object(attributes_to_json(&metric.attributes)),
                );
                Value::Object(record)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_with_timestamp() {
        let event = Sample::event("Test", Attributes::new());
        assert!(event.timestamp() > 0);
        let event = event.with_timestamp(5);
        assert_eq!(event.timestamp(), 5);
        assert_eq!(event.category(), Category::Events);
    }

    #[test]
    fn test_event_wire_record() {
        let event = Sample::event("Test", attrs(&[("test", true.into())]));
        let event = event.with_timestamp(0);
        assert_eq!(
            event.to_wire_record(),
            json!({"eventType": "Test", "timestamp": 0, "test": true})
        );
    }

    #[test]
    fn test_event_reserved_fields_win() {
        let event = Sample::event(
            "Real",
            attrs(&[("eventType", "Fake".into()), ("timestamp", 42.into())]),
        );
        let event = event.with_timestamp(7);
        assert_eq!(
            event.to_wire_record(),
            json!({"eventType": "Real", "timestamp": 7})
        );
    }

    #[test]
    fn test_log_wire_record() {
        let log = Sample::log("Test", attrs(&[("test", true.into())]));
        let log = log.with_timestamp(0);
        assert_eq!(
            log.to_wire_record(),
            json!({"message": "Test", "timestamp": 0, "attributes": {"test": true}})
        );
    }

    #[test]
    fn test_metric_wire_records() {
        let gauge = Sample::gauge("Test", 10.0, attrs(&[("test", true.into())]));
        let gauge = gauge.with_timestamp(0);
        assert_eq!(
            gauge.to_wire_record(),
            json!({
                "name": "Test",
                "type": "gauge",
                "value": 10,
                "timestamp": 0,
                "attributes": {"test": true}
            })
        );

        let count = Sample::count("Test", 10.0, 1000, attrs(&[("test", true.into())]));
        let count = count.with_timestamp(0);
        assert_eq!(
            count.to_wire_record(),
            json!({
                "name": "Test",
                "type": "count",
                "value": 10,
                "interval.ms": 1000,
                "timestamp": 0,
                "attributes": {"test": true}
            })
        );

        let summary = Summary {
            count: 10.0,
            min: 1.0,
            max: 99.0,
            sum: 100.0,
        };
        let sum = Sample::summary("Test", summary, 1000, attrs(&[("test", true.into())]));
        let sum = sum.with_timestamp(0);
        assert_eq!(
            sum.to_wire_record(),
            json!({
                "name": "Test",
                "type": "summary",
                "value": {"count": 10, "max": 99, "min": 1, "sum": 100},
                "interval.ms": 1000,
                "timestamp": 0,
                "attributes": {"test": true}
            })
        );
    }

    #[test]
    fn test_json_number() {
        assert_eq!(json_number(10.0), json!(10));
        assert_eq!(json_number(-3.0), json!(-3));
        assert_eq!(json_number(0.5), json!(0.5));
        assert_eq!(json_number(f64::NAN), Value::Null);
        assert_eq!(json_number(f64::INFINITY), Value::Null);
    }

    #[test]
    fn test_category_and_timestamp() {
        let sample = Sample::log("hello", Attributes::new());
        assert_eq!(sample.category(), Category::Logs);
        assert!(sample.timestamp() > 0);
        assert_eq!(Category::Metrics.to_string(), "metrics");
    }

    #[test]
    fn test_attribute_value_deserialize() {
        let parsed: Attributes =
            serde_json::from_str(r#"{"a": true, "b": 3, "c": 1.5, "d": "x"}"#)
                .expect("failed to parse attributes");
        assert_eq!(parsed["a"], AttributeValue::Bool(true));
        assert_eq!(parsed["b"], AttributeValue::Int(3));
        assert_eq!(parsed["c"], AttributeValue::Float(1.5));
        assert_eq!(parsed["d"], AttributeValue::String("x".to_string()));
    }
}
