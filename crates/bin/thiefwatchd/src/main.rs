//! # thiefwatchd: thiefwatch daemon
//!
//! Composition root that wires all adapters together and runs the lighting
//! controller.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Load and repair the directory snapshot
//! - Connect to the MQTT broker and restore sensor subscriptions
//! - Start the periodic jobs (decision tick, subscription refresh, reaper)
//! - Serve the REST API
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use thiefwatch_adapter_http_axum::state::{AppState, BrokerInfo};
use thiefwatch_app::event_bus::InProcessEventBus;
use thiefwatch_app::periodic;
use thiefwatch_app::services::command_dispatcher::CommandDispatcher;
use thiefwatch_app::services::correlation_engine::CorrelationEngine;
use thiefwatch_app::services::directory_service::DirectoryService;
use thiefwatch_app::services::inbound::InboundRouter;
use thiefwatch_app::services::staleness_reaper::StalenessReaper;
use thiefwatch_app::services::subscription_manager::SubscriptionManager;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();
    let control = &config.control;

    // Directory
    let repo = thiefwatch_adapter_storage_json::Config {
        path: config.storage.path.clone(),
    }
    .build()
    .await?;
    let event_bus = Arc::new(InProcessEventBus::new(256));
    let directory =
        Arc::new(DirectoryService::open(repo, Arc::clone(&event_bus), &control.namespace).await?);
    let snapshot = directory.snapshot().await;
    tracing::info!(
        namespace = %snapshot.namespace,
        locations = snapshot.locations().len(),
        devices = snapshot.devices().count(),
        path = %config.storage.path.display(),
        "directory loaded"
    );

    // Transport
    let (transport, eventloop) = thiefwatch_adapter_mqtt::connect(&config.mqtt)?;

    // Services
    let dispatcher = Arc::new(CommandDispatcher::new(
        transport.clone(),
        Arc::clone(&directory),
        control.actuator_name.clone(),
    ));
    let engine = Arc::new(CorrelationEngine::new(
        Arc::clone(&dispatcher),
        control.policy(),
    ));
    let subscriptions = Arc::new(SubscriptionManager::new(
        transport.clone(),
        Arc::clone(&directory),
        control.unsubscribe_removed,
    ));
    let reaper = Arc::new(StalenessReaper::new(
        Arc::clone(&directory),
        control.retention(),
    ));

    // Background tasks
    let follower = Arc::clone(&dispatcher).follow(event_bus.subscribe());
    let inbound = eventloop.spawn(Arc::new(InboundRouter::new(
        Arc::clone(&engine),
        Arc::clone(&subscriptions),
    )));
    let report = subscriptions.refresh().await;
    tracing::info!(active = report.active, failed = report.failed, "initial subscriptions requested");
    let tasks: [JoinHandle<()>; 5] = [
        follower,
        inbound,
        periodic::spawn(Arc::clone(&engine), control.tick_interval()),
        periodic::spawn(Arc::clone(&subscriptions), control.refresh_interval()),
        periodic::spawn(reaper, control.reap_interval()),
    ];

    // HTTP
    if config.server.enabled {
        let state = AppState::from_arcs(Arc::clone(&directory), Arc::clone(&engine))
            .with_broker(BrokerInfo {
                host: config.mqtt.broker_host.clone(),
                port: config.mqtt.broker_port,
            });
        let app = thiefwatch_adapter_http_axum::router::build(state);

        let bind_addr = config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        tracing::info!("thiefwatchd listening on http://{bind_addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        tracing::info!("HTTP server disabled");
        shutdown_signal().await;
    }

    tracing::info!("shutting down");
    if let Err(err) = transport.disconnect().await {
        tracing::debug!(error = %err, "broker session already closed");
    }
    for task in &tasks {
        task.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
