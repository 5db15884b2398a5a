//! # wotkit
//!
//! Runs a gateway on simulated devices and keeps its thing registered.
//!
//! ## Usage
//!
//! ```bash
//! wotkit --config config/gateway.json --simulate
//! RUST_LOG=wotkit_registry=debug wotkit --config config/gateway.json --simulate
//! ```

use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;
use wotkit_core::GatewayConfig;
use wotkit_gateway::{Gateway, spawn_feeders};
use wotkit_hardware::mock::MockDriver;
use wotkit_pipeline::StateChange;
use wotkit_registry::{HttpTransport, HttpTransportConfig, ResourceDescriptor, ThingSynchronizer};

/// wotkit sensor/actuator gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Gateway configuration file (JSON)
    #[arg(short, long, default_value = "config/gateway.json")]
    config: PathBuf,

    /// Back every sensor with a mock device fed synthetic values
    #[arg(short, long)]
    simulate: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(args.log_level.into()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("wotkit v{}", wotkit_core::VERSION);

    if !args.simulate {
        bail!("no hardware driver is built in; run with --simulate");
    }

    let config = GatewayConfig::from_json_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let transport = HttpTransport::new(HttpTransportConfig::from(&config))?;
    let driver = MockDriver::new();
    let gateway = Gateway::start(config, Arc::new(driver.clone()), transport)?;

    let created = gateway.create_configured_sensors().await;
    let mut sensors = Vec::with_capacity(created);
    for id in gateway.sensor_ids().await {
        if let Some(state) = gateway.sensor(&id).await {
            sensors.push(state);
        }
    }
    info!(created, configured = gateway.config().sensors.len(), "Sensors ready");

    let token = CancellationToken::new();
    let mut feeders = spawn_feeders(&driver, &sensors, token.child_token());
    let publisher = spawn_publisher(gateway.synchronizer(), gateway.subscribe(), token.child_token());

    let camera = ResourceDescriptor::camera("pi-camera", gateway.mapper().operation_uri("camera"));
    let registered = match gateway.register_thing(vec![camera]).await {
        Ok(document) => {
            info!(resources = document.resources().len(), "Thing registered");
            true
        }
        Err(e) => {
            warn!(error = %e, "Thing registration failed, running unregistered");
            false
        }
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Ctrl-C received");

    token.cancel();
    while feeders.join_next().await.is_some() {}
    if let Err(e) = publisher.await {
        warn!(error = %e, "Reading publisher failed");
    }

    if registered && let Err(e) = gateway.delete_thing().await {
        warn!(error = %e, "Thing deletion failed");
    }

    gateway.shutdown().await;
    Ok(())
}

/// Forward every stored reading to the registry.
fn spawn_publisher(
    synchronizer: ThingSynchronizer<HttpTransport>,
    mut changes: tokio::sync::broadcast::Receiver<StateChange>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let change = tokio::select! {
                _ = token.cancelled() => break,
                change = changes.recv() => change,
            };

            match change {
                Ok(change) => {
                    if !synchronizer.is_registered().await {
                        continue;
                    }
                    if let Err(e) = synchronizer.publish_reading(&change.id, change.value).await {
                        debug!(sensor = %change.id, error = %e, "Reading not published");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Reading publisher lagging");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
