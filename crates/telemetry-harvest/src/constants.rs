// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Event type used for agent generated system events.
pub const SYSTEM_EVENT_TYPE: &str = "KeplerSystem";
/// Event type used for recorded errors.
pub const ERROR_EVENT_TYPE: &str = "KeplerError";
/// Event type used for breadcrumbs.
pub const BREADCRUMB_EVENT_TYPE: &str = "KeplerBreadcrumb";

/// Default harvest interval in seconds (2 minutes).
pub const DEFAULT_HARVEST_TIME: u64 = 120;
/// Minimum allowed harvest interval in seconds.
pub const MIN_HARVEST_TIME: u64 = 60;
/// Maximum allowed harvest interval in seconds (10 minutes).
pub const MAX_HARVEST_TIME: u64 = 600;
/// Step used when backing off or recovering the harvest interval.
pub const HARVEST_TIME_DELTA: u64 = 60;

/// Default buffer capacity.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;
/// Minimum buffer capacity reachable through payload-too-large backoff.
pub const MIN_BUFFER_SIZE: usize = 100;
/// Maximum configurable buffer capacity.
pub const MAX_BUFFER_SIZE: usize = 1000;
/// Step used when shrinking or regrowing the buffer capacity.
pub const BUFFER_SIZE_DELTA: usize = 100;

/// Default gzip level for harvest payloads.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
/// Default timeout for one ingestion request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 10;

/// Header carrying the ingestion key.
pub const API_KEY_HEADER: &str = "Api-Key";
