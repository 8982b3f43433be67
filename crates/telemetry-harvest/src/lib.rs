// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Buffering and delivery core of a telemetry agent.
//!
//! Samples (events, logs, metrics) are kept in bounded reservoir buffers and
//! periodically harvested by one worker per category. Each worker gzips the
//! serialized buffer, posts it to the ingestion endpoint and adapts its
//! harvest interval and buffer capacity from the response.

pub mod agent;
pub mod api_key;
pub mod buffer;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod endpoint;
pub mod errors;
pub mod logger;
pub mod sample;
pub mod serializer;
pub mod timer;
pub mod transport;
pub mod worker;
