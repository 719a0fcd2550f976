// src/core/ffc/actor.rs

//! The single-threaded actor owning the registry, the persisted enabled set, and
//! every collaborator (app catalog, membership, peer transport) needed to carry
//! out an `enable`.

use super::FfcConfig;
use crate::core::app_catalog::{AppCatalog, merge_all};
use crate::core::enabled_store::EnabledStore;
use crate::core::errors::FfcError;
use crate::core::flags::{ListFilter, Migration, MigrationEvent, Name};
use crate::core::membership::{MembershipOracle, PeerId};
use crate::core::peer_rpc::{PeerRpc, RpcRequest, RpcResponse, SerializableFilter};
use crate::core::registry::{Registry, RegistrySnapshot};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub(super) enum Request {
    List {
        filter: ListFilter,
        reply: oneshot::Sender<HashMap<Name, crate::core::flags::FeatureFlag>>,
    },
    IsSupported {
        name: Name,
        reply: oneshot::Sender<bool>,
    },
    AreSupported {
        names: Vec<Name>,
        reply: oneshot::Sender<bool>,
    },
    IsEnabled {
        name: Name,
        reply: oneshot::Sender<bool>,
    },
    Enable {
        name: Name,
        reply: oneshot::Sender<Result<(), FfcError>>,
    },
    Disable {
        reply: oneshot::Sender<Result<(), FfcError>>,
    },
    Init {
        reply: oneshot::Sender<()>,
    },
    CheckNodeCompatibility {
        addr: SocketAddr,
        reply: oneshot::Sender<Result<(), FfcError>>,
    },
    /// Served on behalf of a remote peer's `PeerRpc` call, not by a local caller.
    HandleRpc {
        request: RpcRequest,
        reply: oneshot::Sender<RpcResponse>,
    },
}

pub struct FfcActor {
    cfg: FfcConfig,
    registry: Arc<Registry>,
    enabled_store: Arc<dyn EnabledStore>,
    app_catalog: Arc<dyn AppCatalog>,
    membership: Arc<dyn MembershipOracle>,
    peer_rpc: Arc<dyn PeerRpc>,
    rx: mpsc::Receiver<Request>,
}

impl FfcActor {
    pub(super) fn new(
        cfg: FfcConfig,
        registry: Arc<Registry>,
        enabled_store: Arc<dyn EnabledStore>,
        app_catalog: Arc<dyn AppCatalog>,
        membership: Arc<dyn MembershipOracle>,
        peer_rpc: Arc<dyn PeerRpc>,
        rx: mpsc::Receiver<Request>,
    ) -> Self {
        Self {
            cfg,
            registry,
            enabled_store,
            app_catalog,
            membership,
            peer_rpc,
            rx,
        }
    }

    pub async fn run(mut self) {
        while let Some(req) = self.rx.recv().await {
            self.handle(req).await;
        }
    }

    async fn handle(&self, req: Request) {
        match req {
            Request::List { filter, reply } => {
                tracing::trace!(filter = %filter, "serving list request");
                let _ = reply.send(self.registry.snapshot().list(filter));
            }
            Request::IsSupported { name, reply } => {
                let _ = reply.send(self.is_supported(&name).await);
            }
            Request::AreSupported { names, reply } => {
                let _ = reply.send(self.are_supported(&names).await);
            }
            Request::IsEnabled { name, reply } => {
                let _ = reply.send(self.registry.snapshot().is_enabled(&name));
            }
            Request::Enable { name, reply } => {
                let result = self.enable(name).await;
                match &result {
                    Ok(()) => crate::core::metrics::FFC_FLAGS_ENABLED_TOTAL.inc(),
                    Err(_) => crate::core::metrics::FFC_ENABLE_FAILURES_TOTAL.inc(),
                }
                let _ = reply.send(result);
            }
            Request::Disable { reply } => {
                let _ = reply.send(Err(FfcError::Unsupported));
            }
            Request::Init { reply } => {
                self.rebuild_registry().await;
                let _ = reply.send(());
            }
            Request::CheckNodeCompatibility { addr, reply } => {
                let _ = reply.send(self.check_node_compatibility(addr).await);
            }
            Request::HandleRpc { request, reply } => {
                let _ = reply.send(self.serve_rpc(request).await);
            }
        }
    }

    async fn rebuild_registry(&self) {
        let guard = self.registry.rebuild_guard().await;
        let all = merge_all(&self.app_catalog).await;
        let enabled = self.enabled_store.read().await.unwrap_or_else(|e| {
            warn!("failed to read enabled-flags record, treating as empty: {e}");
            Vec::new()
        });
        self.registry.publish(RegistrySnapshot::build(all, &enabled));
        drop(guard);
    }

    /// Shuffles the running peer list before iterating, so no peer is privileged
    /// by configuration order (mirrors `choose_nodes_to_ping`).
    fn shuffled_running_peers(&self) -> Vec<(PeerId, SocketAddr)> {
        let mut peers = self.membership.running_peers();
        peers.shuffle(&mut rand::thread_rng());
        peers
    }

    async fn is_supported_remotely(&self, names: &[Name]) -> bool {
        let peers = self.shuffled_running_peers();
        if peers.is_empty() {
            return true;
        }
        for (_, addr) in peers {
            let resp = self
                .peer_rpc
                .call(
                    addr,
                    RpcRequest::AreSupportedLocally(names.to_vec()),
                    self.cfg.peer_timeout,
                )
                .await;
            match resp {
                Ok(RpcResponse::Bool(true)) => {}
                _ => return false,
            }
        }
        true
    }

    async fn is_supported(&self, name: &Name) -> bool {
        if !self.registry.snapshot().is_supported(name) {
            return false;
        }
        self.is_supported_remotely(std::slice::from_ref(name)).await
    }

    async fn are_supported(&self, names: &[Name]) -> bool {
        let snap = self.registry.snapshot();
        if !names.iter().all(|n| snap.is_supported(n)) {
            return false;
        }
        self.is_supported_remotely(names).await
    }

    fn enable<'a>(&'a self, name: Name) -> BoxFuture<'a, Result<(), FfcError>> {
        Box::pin(async move {
            let snap = self.registry.snapshot();
            if snap.is_enabled(&name) {
                return Ok(());
            }

            if !snap.is_supported(&name) || !self.is_supported_remotely(&[name.clone()]).await {
                return Err(FfcError::Unsupported);
            }

            let depends_on = snap
                .get(&name)
                .map(|f| f.depends_on.clone())
                .unwrap_or_default();
            for dep in depends_on {
                self.enable(dep).await?;
            }

            // Re-snapshot: a dependency's enable may have rebuilt the registry.
            let snap = self.registry.snapshot();
            let migration = snap.get(&name).and_then(|f| f.migration.clone());
            if let Some(migration) = migration {
                run_migration(migration).await?;
            }

            let mut current = self.enabled_store.read().await.unwrap_or_default();
            if !current.contains(&name) {
                current.push(name.clone());
            }
            self.enabled_store
                .write(&current)
                .await
                .map_err(|e| FfcError::Transport(e.to_string()))?;
            self.rebuild_registry().await;

            for (_, addr) in self.membership.running_peers() {
                let resp = self
                    .peer_rpc
                    .call(
                        addr,
                        RpcRequest::MarkAsEnabledLocally(name.clone()),
                        self.cfg.peer_timeout,
                    )
                    .await
                    .map_err(|e| FfcError::Transport(e.to_string()))?;
                match resp {
                    RpcResponse::Ack => {}
                    RpcResponse::Error(e) => return Err(FfcError::Transport(e)),
                    _ => return Err(FfcError::Transport("unexpected peer response".to_string())),
                }
            }

            info!(flag = %name, "feature flag enabled");
            Ok(())
        })
    }

    async fn check_node_compatibility(&self, addr: SocketAddr) -> Result<(), FfcError> {
        let snap = self.registry.snapshot();
        let enabled_local = snap.enabled_names();

        let peer_enabled = match self
            .peer_rpc
            .call(
                addr,
                RpcRequest::List(SerializableFilter::Enabled),
                self.cfg.peer_timeout,
            )
            .await
        {
            Ok(RpcResponse::Names(n)) => n,
            _ => return Err(FfcError::IncompatibleFeatureFlags),
        };
        if !peer_enabled.iter().all(|n| snap.is_supported(n)) {
            return Err(FfcError::IncompatibleFeatureFlags);
        }

        let peer_supported: HashSet<Name> = match self
            .peer_rpc
            .call(
                addr,
                RpcRequest::List(SerializableFilter::All),
                self.cfg.peer_timeout,
            )
            .await
        {
            Ok(RpcResponse::Names(n)) => n.into_iter().collect(),
            _ => return Err(FfcError::IncompatibleFeatureFlags),
        };
        if !enabled_local.iter().all(|n| peer_supported.contains(n)) {
            return Err(FfcError::IncompatibleFeatureFlags);
        }

        Ok(())
    }

    async fn serve_rpc(&self, request: RpcRequest) -> RpcResponse {
        match request {
            RpcRequest::List(filter) => {
                let snap = self.registry.snapshot();
                let filter = match filter {
                    SerializableFilter::All => ListFilter::All,
                    SerializableFilter::Enabled => ListFilter::Enabled,
                    SerializableFilter::Disabled => ListFilter::Disabled,
                };
                RpcResponse::Names(snap.list(filter).into_keys().collect())
            }
            RpcRequest::AreSupportedLocally(names) => {
                let snap = self.registry.snapshot();
                RpcResponse::Bool(names.iter().all(|n| snap.is_supported(n)))
            }
            RpcRequest::MarkAsEnabledLocally(name) => {
                let mut current = match self.enabled_store.read().await {
                    Ok(v) => v,
                    Err(e) => return RpcResponse::Error(e.to_string()),
                };
                if !current.contains(&name) {
                    current.push(name);
                }
                if let Err(e) = self.enabled_store.write(&current).await {
                    return RpcResponse::Error(e.to_string());
                }
                self.rebuild_registry().await;
                RpcResponse::Ack
            }
        }
    }
}

/// Runs a migration under a supervised task so a panic inside it surfaces as a
/// structured error instead of taking the coordinator down.
async fn run_migration(migration: Arc<dyn Migration>) -> Result<(), FfcError> {
    let handle = tokio::spawn(async move { migration.run(MigrationEvent::Enable).await });
    match handle.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(FfcError::MigrationFailed(reason)),
        Err(join_err) => {
            let reason = if join_err.is_panic() {
                "migration panicked".to_string()
            } else {
                "migration task was cancelled".to_string()
            };
            Err(FfcError::MigrationCrash {
                reason,
                trace: join_err.to_string(),
            })
        }
    }
}
