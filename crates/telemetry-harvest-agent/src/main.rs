// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod command;

use std::env;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use telemetry_harvest::{
    agent::Agent, config::HarvestConfig, coordinator::HarvestCoordinator, logger::Formatter,
    sample::Attributes,
};

use crate::command::Command;

fn system_attributes() -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("osName".to_string(), env::consts::OS.into());
    attributes.insert("architecture".to_string(), env::consts::ARCH.into());
    attributes.insert(
        "agentVersion".to_string(),
        env!("CARGO_PKG_VERSION").into(),
    );
    attributes
}

/// Filter directives for `log_level`, with the HTTP stack silenced.
fn env_filter(log_level: &str) -> String {
    format!("h2=off,hyper=off,rustls=off,{log_level}")
}

#[tokio::main]
pub async fn main() {
    // Loaded before the subscriber so the configured level applies. A config
    // error is reported once logging is up, at the default level.
    let config = HarvestConfig::from_env();
    let log_level = config
        .as_ref()
        .map(|config| config.log_level.clone())
        .unwrap_or_else(|_| HarvestConfig::default().log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter(&log_level))
                .expect("could not parse log level in configuration"),
        )
        .event_format(Formatter)
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading harvest configuration: {e}");
            return;
        }
    };

    let coordinator = match HarvestCoordinator::from_config(&config) {
        Ok(coordinator) => coordinator.with_system_attributes(system_attributes()),
        Err(e) => {
            error!("Error creating harvest coordinator: {e}");
            return;
        }
    };
    let agent = Agent::new(coordinator);
    agent.start();
    info!(
        "Telemetry agent started, region {}, harvesting every {}s",
        config.region, config.harvest_interval
    );

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                shutdown.cancel();
            }
            Err(e) => error!("Unable to listen for Ctrl-C: {e}"),
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match Command::parse(&line) {
                    Ok(command) => command.apply(&agent).await,
                    Err(e) => error!("Ignoring malformed command: {e}"),
                },
                Ok(None) => {
                    debug!("Input closed");
                    break;
                }
                Err(e) => {
                    error!("Error reading input: {e}");
                    break;
                }
            },
        }
    }

    let report = agent.harvest_now().await;
    info!("Final harvest: {:?}", report);
    agent.shutdown();
}
