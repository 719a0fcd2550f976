// src/server/initialization.rs

//! Builds every long-lived collaborator this host needs and hands back a
//! `HostState` ready for `spawner::spawn_all`.

use crate::config::Config;
use crate::core::app_catalog::{AppCatalog, ConfigAppCatalog};
use crate::core::enabled_store::{EnabledStore, FileEnabledStore};
use crate::core::ffc::{FfcConfig, actor::FfcActor, handle::FfcHandle};
use crate::core::membership::{MembershipOracle, PeerId, StaticMembershipOracle, heartbeat::UdpHeartbeatMembershipOracle};
use crate::core::memory_oracle::{MemoryOracle, SysinfoMemoryOracle};
use crate::core::mpfc::{MpfcConfig, actor::MpfcActor, handle::MpfcHandle};
use crate::core::peer_rpc::{PeerRpc, tcp::TcpPeerRpc};
use crate::core::registry::Registry;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, reload};

/// Everything the host needs to run: the two subsystem handles (absent if their
/// section of the config disabled them), the background-task supervisor, and the
/// shutdown signal every task subscribes to.
pub struct HostState {
    pub config: Config,
    pub ffc: Option<FfcHandle>,
    pub mpfc: Option<MpfcHandle>,
    pub(super) ffc_actor: Option<FfcActor>,
    pub(super) mpfc_actor: Option<MpfcActor>,
    pub(super) heartbeat: Option<(Arc<UdpHeartbeatMembershipOracle>, std::net::SocketAddr)>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<()>>,
}

/// Initializes every component named in the host's configuration before the
/// server's background tasks are spawned.
pub async fn setup(
    config: Config,
    _log_reload_handle: Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>,
) -> Result<HostState> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let mut ffc = None;
    let mut ffc_actor = None;
    let mut heartbeat = None;

    if config.ffc.enabled {
        let registry = Arc::new(Registry::new());
        let enabled_store: Arc<dyn EnabledStore> =
            Arc::new(FileEnabledStore::new(config.ffc.enabled_flags_path.clone()));
        let app_catalog: Arc<dyn AppCatalog> =
            Arc::new(ConfigAppCatalog::from_decls(&config.ffc.flags));

        let peers: Vec<(PeerId, std::net::SocketAddr)> = config
            .ffc
            .peers
            .iter()
            .map(|p| {
                p.addr
                    .parse()
                    .map(|addr| (PeerId(p.id.clone()), addr))
                    .with_context(|| format!("invalid peer address '{}'", p.addr))
            })
            .collect::<Result<_>>()?;

        let membership: Arc<dyn MembershipOracle> = if config.ffc.use_heartbeat_liveness {
            let mut id_bytes = [0u8; 20];
            getrandom::fill(&mut id_bytes)
                .with_context(|| "failed to generate a random node id for the heartbeat oracle")?;
            let my_id = hex::encode(id_bytes);
            info!(node_id = %my_id, "heartbeat liveness oracle node id generated");
            let oracle = Arc::new(UdpHeartbeatMembershipOracle::new(
                my_id,
                peers,
                config.ffc.node_timeout,
            ));
            let heartbeat_bind = config
                .ffc
                .heartbeat_bind
                .parse()
                .with_context(|| format!("invalid ffc.heartbeat_bind '{}'", config.ffc.heartbeat_bind))?;
            heartbeat = Some((oracle.clone(), heartbeat_bind));
            oracle
        } else {
            Arc::new(StaticMembershipOracle::new(peers))
        };

        let peer_rpc: Arc<dyn PeerRpc> = Arc::new(TcpPeerRpc::new());
        let ffc_cfg = FfcConfig {
            peer_timeout: config.ffc.peer_timeout,
        };
        let (handle, actor) =
            FfcHandle::new(ffc_cfg, registry, enabled_store, app_catalog, membership, peer_rpc);
        ffc = Some(handle);
        ffc_actor = Some(actor);
        info!("feature-flag coordinator initialized");
    } else {
        info!("feature-flag coordinator disabled in configuration");
    }

    let mut mpfc = None;
    let mut mpfc_actor = None;
    if config.mpfc.enabled {
        let memory_oracle: Arc<dyn MemoryOracle> = Arc::new(SysinfoMemoryOracle::new());
        let mpfc_cfg = MpfcConfig {
            mem_scale: config.mpfc.mem_scale,
            limit_threshold: config.mpfc.limit_threshold,
            sum_inc_threshold: config.mpfc.sum_inc_threshold,
            sum_inc_amount: config.mpfc.sum_inc_amount,
            osc_guard: config.mpfc.osc_guard,
            epsilon: config.mpfc.epsilon,
            tick: config.mpfc.tick,
            vmm_default_bytes: config.mpfc.vmm_default_bytes,
        };
        let (handle, actor) = MpfcHandle::new(mpfc_cfg, memory_oracle);
        mpfc = Some(handle);
        mpfc_actor = Some(actor);
        info!("memory-pressure feedback controller initialized");
    } else {
        info!("memory-pressure feedback controller disabled in configuration");
    }

    Ok(HostState {
        config,
        ffc,
        mpfc,
        ffc_actor,
        mpfc_actor,
        heartbeat,
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

fn log_startup_info(config: &Config) {
    info!(
        ffc_enabled = config.ffc.enabled,
        mpfc_enabled = config.mpfc.enabled,
        metrics_enabled = config.metrics.enabled,
        "host configuration loaded"
    );
}
