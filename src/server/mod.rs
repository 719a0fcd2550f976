// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, reload};

mod initialization;
mod metrics_server;
mod spawner;

pub use initialization::HostState;

/// The host's main startup function: build state, spawn every background task,
/// then run until a background task exits (which in steady state only happens on
/// shutdown).
pub async fn run(
    config: Config,
    log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
) -> Result<()> {
    let mut ctx = initialization::setup(config, log_reload_handle).await?;
    spawner::spawn_all(&mut ctx).await?;

    while let Some(res) = ctx.background_tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("a background task failed: {e}"),
            Err(e) => tracing::error!("a background task panicked: {e}"),
        }
    }

    Ok(())
}
