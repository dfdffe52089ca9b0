// Framework bootstrap for the hub server runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::{index_handler, ws_handler};
use crate::interface_adapters::protocol::JsonSnapshotEncoder;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{HubSettings, spawn_hub};

use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state();

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/sockets", get(ws_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::http_host(), config::http_port());

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Arc<AppState> {
    let settings = HubSettings {
        event_channel_capacity: config::EVENT_CHANNEL_CAPACITY,
        client_queue_capacity: config::CLIENT_QUEUE_CAPACITY,
        tick_interval: config::TICK_INTERVAL,
        beacon_uuid: config::BEACON_UUID.to_string(),
        role_seed: config::role_seed(),
    };
    tracing::debug!(
        tick_interval_ms = settings.tick_interval.as_millis() as u64,
        client_queue_capacity = settings.client_queue_capacity,
        seeded = settings.role_seed.is_some(),
        "hub configured"
    );

    // The hub task owns the world state and every subscriber queue.
    let hub = spawn_hub(settings, JsonSnapshotEncoder);
    Arc::new(AppState { hub })
}
