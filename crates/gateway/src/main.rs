use axum::Router;
use clap::{Arg, Command};
use mash_gateway::config::GatewayConfig;
use mash_gateway::radio_link::SimulatedRadioLink;
use mash_gateway::runtime::GatewayRuntime;
use mash_gateway::sinks::ws_frames_route;
use mash_topology::{JsonFileStore, PersistedTopology, TopologyStore};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mash_gateway=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = Command::new("mash_gateway")
        .about("MASH sensor-fusion gateway node")
        .arg(
            Arg::new("config")
                .long("config")
                .default_value("gateway.toml")
                .help("Path to the gateway's TOML configuration file"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").expect("has default");
    let config = GatewayConfig::load(config_path);
    tracing::info!(listen_addr = %config.listen_addr, "mash gateway starting");

    let topology_store = JsonFileStore::new(&config.topology_store_path);
    let topology_hint = topology_store.load();
    match &topology_hint {
        Some(hint) => tracing::info!(
            nodes = hint.nodes.len(),
            grace_us = config.registration_grace_us,
            "loaded topology persistence hint, nodes must re-register within the grace window"
        ),
        None => tracing::info!("no topology persistence hint found, starting from empty topology"),
    }

    let (frames_tx, _rx) = broadcast::channel(config.sync_frame_queue_capacity);
    let link = Arc::new(SimulatedRadioLink::new(256));
    let listen_addr = config.listen_addr.clone();
    let (mut runtime, handle) = GatewayRuntime::new(config, link, frames_tx.clone());
    if let Some(hint) = topology_hint {
        runtime.restore_topology_hint(hint);
    }

    let app: Router = ws_frames_route(frames_tx);
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    let server_handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(%err, "frame sink server error");
        }
    });

    let shutdown = runtime.shutdown_token();
    let runtime_handle = tokio::spawn(runtime.run());

    handle.start_streaming().await;

    tracing::info!("mash gateway running, press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    shutdown.cancel();
    let _ = runtime_handle.await;
    server_handle.abort();

    // Persist whatever the topology manager currently knows before exiting,
    // purely as a future-startup hint — it is never treated as authoritative.
    let snapshot = handle.get_sync_status().await;
    let persisted = PersistedTopology {
        nodes: snapshot
            .per_node
            .iter()
            .filter_map(|n| {
                n.slot.map(|slot| mash_topology::PersistedNode {
                    node_id: n.id,
                    slot_index: slot,
                    sensor_ids: n.sensor_ids.clone(),
                })
            })
            .collect(),
    };
    if let Err(err) = topology_store.save(&persisted) {
        tracing::warn!(%err, "failed to persist topology hint on shutdown");
    }

    Ok(())
}
