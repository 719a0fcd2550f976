// src/server/spawner.rs

//! Spawns every one of the host's long-running background tasks into its
//! `JoinSet`, mirroring the teacher's `spawner::spawn_all` shape scaled down to
//! this crate's two subsystems.

use super::initialization::HostState;
use super::metrics_server;
use crate::core::ffc::rpc_server as ffc_rpc_server;
use anyhow::{Context, Result};
use tracing::info;

/// Spawns the coordinator and controller actors plus every optional background
/// task their configuration enables (peer RPC listener, heartbeat liveness,
/// metrics server).
pub async fn spawn_all(ctx: &mut HostState) -> Result<()> {
    let shutdown_tx = ctx.shutdown_tx.clone();

    if let Some(actor) = ctx.ffc_actor.take() {
        ctx.background_tasks.spawn(async move {
            actor.run().await;
            Ok(())
        });

        if ctx.config.ffc.enabled {
            let ffc = ctx
                .ffc
                .clone()
                .expect("ffc handle must exist alongside ffc_actor");
            // Safe to await now: the actor task above is already spawned and
            // draining its request channel.
            ffc.init().await;
            let bind_addr = ctx
                .config
                .ffc
                .rpc_bind
                .parse()
                .with_context(|| format!("invalid ffc.rpc_bind '{}'", ctx.config.ffc.rpc_bind))?;
            let shutdown_rx = shutdown_tx.subscribe();
            ctx.background_tasks.spawn(async move {
                ffc_rpc_server::run(ffc, bind_addr, shutdown_rx).await
            });
        }
    }

    if let Some((oracle, bind_addr)) = ctx.heartbeat.take() {
        let shutdown_rx = shutdown_tx.subscribe();
        ctx.background_tasks.spawn(async move {
            oracle.run(bind_addr, shutdown_rx).await
        });
    }

    if let Some(actor) = ctx.mpfc_actor.take() {
        ctx.background_tasks.spawn(async move {
            actor.run().await;
            Ok(())
        });
    }

    if ctx.config.metrics.enabled {
        let mpfc = ctx.mpfc.clone();
        let port = ctx.config.metrics.port;
        let shutdown_rx = shutdown_tx.subscribe();
        ctx.background_tasks.spawn(async move {
            metrics_server::run(port, mpfc, shutdown_rx).await;
            Ok(())
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    info!("all background tasks have been spawned");
    Ok(())
}
