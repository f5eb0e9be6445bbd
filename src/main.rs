mod blackboard;
mod bus;
mod config;
mod graphics;
mod marker;
mod sync;
mod viewport;
mod worker;

use std::{sync::Arc, time::Duration};

use amr_map::HttpEdgeApi;
use blackboard::Blackboard;
use bus::Topic;
use graphics::window_conf;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use worker::{Event, WorkerSettings};

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("AMR map viewer started.");
    if let Err(e) = run().await {
        error!("AMR map viewer failed: {:?}", e);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = config::load_config()?;
    info!(base_url = %config.server.base_url, "Configuration loaded.");

    let tokio_rt = tokio::runtime::Runtime::new()?;
    let rt_guard = tokio_rt.enter();

    let api = HttpEdgeApi::new(&config.server.base_url, config.server.request_timeout())?;
    let bb: Blackboard = Arc::default();
    let events: Topic<Event> = Topic::new(64);
    let events_rx = events.subscribe();
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let settings = WorkerSettings {
        poll_interval: config.sync.poll_interval(),
        telemetry_timeout: config.sync.telemetry_timeout(),
    };

    tokio_rt.spawn({
        let bb = Arc::clone(&bb);
        async move {
            match worker::run_worker(api, bb, cmd_rx, events, settings).await {
                Ok(()) => info!("Worker finished."),
                Err(e) => error!("Worker failed: {:?}", e),
            }
        }
    });

    graphics::run_visualization_loop(
        events_rx,
        bb,
        cmd_tx,
        config.robot.dimensions(),
        config.sync.thresholds(),
    )
    .await;

    info!("Display closed, stopping worker runtime.");
    drop(rt_guard);
    tokio_rt.shutdown_timeout(Duration::from_secs(2));
    Ok(())
}
