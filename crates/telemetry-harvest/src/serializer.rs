// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-category payload builders.
//!
//! Serializers are stateless strategies injected into a
//! [`ReservoirBuffer`](crate::buffer::ReservoirBuffer). They are deterministic
//! for a given input order and produce a valid payload for empty input.

use crate::sample::{Category, Sample};
use serde_json::{json, Value};

/// Turns an ordered slice of items into a request body.
pub trait Serializer<T>: Send + Sync {
    fn serialize(&self, items: &[T]) -> Result<Vec<u8>, serde_json::Error>;
}

/// A [`Serializer`] bound to one ingestion category.
pub trait CategorySerializer: Serializer<Sample> {
    fn category(&self) -> Category;
}

fn wire_records(items: &[Sample]) -> Vec<Value> {
    items.iter().map(Sample::to_wire_record).collect()
}

/// Flat array of event records.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSerializer;

impl Serializer<Sample> for EventSerializer {
    fn serialize(&self, items: &[Sample]) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&wire_records(items))
    }
}

impl CategorySerializer for EventSerializer {
    fn category(&self) -> Category {
        Category::Events
    }
}

/// Single-element array wrapping `{"common": {}, "logs": [...]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSerializer;

impl Serializer<Sample> for LogSerializer {
    fn serialize(&self, items: &[Sample]) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&json!([{
            "common": {},
            "logs": wire_records(items),
        }]))
    }
}

impl CategorySerializer for LogSerializer {
    fn category(&self) -> Category {
        Category::Logs
    }
}

/// Single-element array wrapping `{"common": {}, "metrics": [...]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricSerializer;

impl Serializer<Sample> for MetricSerializer {
    fn serialize(&self, items: &[Sample]) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&json!([{
            "common": {},
            "metrics": wire_records(items),
        }]))
    }
}

impl CategorySerializer for MetricSerializer {
    fn category(&self) -> Category {
        Category::Metrics
    }
}
