use clap::{Arg, Command};
use mash_node::config::NodeConfig;
use mash_node::radio_link::SimulatedNodeLink;
use mash_node::runtime::NodeRuntime;
use mash_node::sensor_source::SimulatedSensorSource;
use mash_node::state_machine::NodeCore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mash_node=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = Command::new("mash_node")
        .about("MASH sensor node")
        .arg(
            Arg::new("config")
                .long("config")
                .default_value("node.toml")
                .help("Path to the node's TOML configuration file"),
        )
        .arg(
            Arg::new("hw-address")
                .long("hw-address")
                .default_value("00:11:22:33:44:55")
                .help("Hardware address this node derives its NodeId from"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").expect("has default");
    let config = NodeConfig::load(config_path);

    let hw_address_raw = matches.get_one::<String>("hw-address").expect("has default");
    let hw_address: Vec<u8> = hw_address_raw
        .split(':')
        .filter_map(|b| u8::from_str_radix(b, 16).ok())
        .collect();

    let core = NodeCore::new(config.clone(), &hw_address);
    tracing::info!(node_id = %core.node_id(), "mash node starting");

    let link = Arc::new(SimulatedNodeLink::new(256));
    let sensor_source = Box::new(SimulatedSensorSource::new(
        config.sensor_id_set(),
        config.sample_period_us,
    ));
    let runtime = NodeRuntime::new(core, link, sensor_source, config.sample_period_us);
    let shutdown = runtime.shutdown_token();

    let runtime_handle = tokio::spawn(runtime.run());

    tracing::info!("mash node running, press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    shutdown.cancel();
    let _ = runtime_handle.await;
    Ok(())
}
