use anyhow::Result;
use percept_core::DetectionSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod dbus_interface;
mod engine;
mod gate;
mod registry;
mod session;
#[cfg(test)]
mod testutil;

use config::Config;
use controller::spawn_controller;
use dbus_interface::PerceptService;
use engine::FusionEngine;
use registry::ModelRegistry;
use session::{CaptureSession, V4l2Backend};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("perceptd starting");
    let config = Config::from_env();

    // Load both models in parallel. A failure is fatal to readiness,
    // not to the daemon: the gate and capture state stay observable,
    // fusion ticks no-op.
    let registry = Arc::new(match ModelRegistry::load(&config).await {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!(error = %e, "model load failed; detection disabled until restart");
            ModelRegistry::empty()
        }
    });

    let backend = V4l2Backend::new(config.device_map());
    let (session, state_rx, source_rx) =
        CaptureSession::new(backend, config.ideal_width, config.ideal_height);
    let (detections_tx, detections_rx) = watch::channel(DetectionSet::empty());

    let controller = spawn_controller(
        session,
        Arc::clone(&registry),
        detections_tx.clone(),
        config.initial_facing,
    );

    FusionEngine::new(registry, source_rx, detections_tx, config.tick_period()).spawn();

    let service = PerceptService::new(controller.clone(), detections_rx, state_rx);
    let _conn = zbus::connection::Builder::session()?
        .name("org.freedesktop.Percept1")?
        .serve_at("/org/freedesktop/Percept1", service)?
        .build()
        .await?;

    tracing::info!("perceptd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("perceptd shutting down");
    controller.shutdown().await?;

    Ok(())
}
