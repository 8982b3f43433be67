// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use flate2::read::GzDecoder;
use mockito::Server;
use std::io::Read;
use telemetry_harvest::{
    agent::Agent,
    config::HarvestConfig,
    coordinator::HarvestCoordinator,
    sample::{Attributes, Category},
    worker::HarvestOutcome,
};

fn config(ingest_url: String) -> HarvestConfig {
    HarvestConfig {
        api_key: Some("test-key".to_string()),
        account_id: Some("42".to_string()),
        ingest_url: Some(ingest_url),
        ..Default::default()
    }
}

fn gunzip(body: &[u8]) -> Option<serde_json::Value> {
    let mut json = String::new();
    GzDecoder::new(body).read_to_string(&mut json).ok()?;
    serde_json::from_str(&json).ok()
}

#[tokio::test]
async fn events_are_posted_gzipped_with_api_key() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/accounts/42/events")
        .match_header("Api-Key", "test-key")
        .match_header("Content-Type", "application/json")
        .match_header("Content-Encoding", "gzip")
        .match_request(|request| {
            let Some(payload) = request.body().ok().and_then(|body| gunzip(body)) else {
                return false;
            };
            payload[0]["eventType"] == "Purchase" && payload[0]["amount"] == 12
        })
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let coordinator = HarvestCoordinator::from_config(&config(server.url())).unwrap();
    let mut attributes = Attributes::new();
    attributes.insert("amount".to_string(), 12.into());
    assert!(coordinator.record_event("Purchase", Some(attributes)));

    let report = coordinator.harvest_now().await;
    assert_eq!(report.events, HarvestOutcome::Accepted);
    assert_eq!(report.logs, HarvestOutcome::Empty);
    assert_eq!(report.metrics, HarvestOutcome::Empty);
    assert_eq!(coordinator.len(Category::Events), 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn logs_and_metrics_use_wrapped_payloads() {
    let mut server = Server::new_async().await;
    let logs = server
        .mock("POST", "/log/v1")
        .match_request(|request| {
            request
                .body()
                .ok()
                .and_then(|body| gunzip(body))
                .is_some_and(|payload| payload[0]["logs"][0]["message"] == "hello")
        })
        .with_status(200)
        .create_async()
        .await;
    let metrics = server
        .mock("POST", "/metric/v1")
        .match_request(|request| {
            request
                .body()
                .ok()
                .and_then(|body| gunzip(body))
                .is_some_and(|payload| {
                    payload[0]["metrics"][0]["type"] == "gauge"
                        && payload[0]["metrics"][0]["value"] == 10
                })
        })
        .with_status(200)
        .create_async()
        .await;

    let agent = Agent::new(HarvestCoordinator::from_config(&config(server.url())).unwrap());
    agent.record_log("hello", None);
    agent.record_gauge_metric("Test", 10.0, None);

    let report = agent.harvest_now().await;
    assert_eq!(report.logs, HarvestOutcome::Accepted);
    assert_eq!(report.metrics, HarvestOutcome::Accepted);
    logs.assert_async().await;
    metrics.assert_async().await;
}

#[tokio::test]
async fn payload_too_large_shrinks_until_accepted() {
    let mut server = Server::new_async().await;
    let rejected = server
        .mock("POST", "/log/v1")
        .with_status(413)
        .expect(1)
        .create_async()
        .await;

    let coordinator = HarvestCoordinator::from_config(&config(server.url())).unwrap();
    coordinator.record_log("big", None);

    let report = coordinator.harvest_now().await;
    assert_eq!(report.logs, HarvestOutcome::PayloadTooLarge);
    assert_eq!(coordinator.logs().capacity(), 900);
    assert_eq!(coordinator.len(Category::Logs), 1);
    rejected.assert_async().await;
    rejected.remove_async().await;

    let accepted = server
        .mock("POST", "/log/v1")
        .with_status(202)
        .expect(1)
        .create_async()
        .await;
    let report = coordinator.harvest_now().await;
    assert_eq!(report.logs, HarvestOutcome::Accepted);
    assert_eq!(coordinator.logs().capacity(), 1000);
    assert_eq!(coordinator.len(Category::Logs), 0);
    accepted.assert_async().await;
}

#[tokio::test]
async fn unexpected_status_drops_data() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/metric/v1")
        .with_status(404)
        .with_body("no such route")
        .create_async()
        .await;

    let coordinator = HarvestCoordinator::from_config(&config(server.url())).unwrap();
    coordinator.record_count_metric("requests", 1.0, 1000, None);

    let report = coordinator.harvest_now().await;
    assert_eq!(
        report.metrics,
        HarvestOutcome::Dropped(reqwest::StatusCode::NOT_FOUND)
    );
    assert_eq!(coordinator.len(Category::Metrics), 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_endpoint_keeps_data() {
    let coordinator =
        HarvestCoordinator::from_config(&config("http://127.0.0.1:1".to_string())).unwrap();
    coordinator.record_event("Test", None);

    let report = coordinator.harvest_now().await;
    assert_eq!(report.events, HarvestOutcome::TransportFailed);
    assert_eq!(coordinator.len(Category::Events), 1);
}
