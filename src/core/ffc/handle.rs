// src/core/ffc/handle.rs

//! A cheaply cloneable handle to a running `FfcActor`.

use super::FfcConfig;
use super::actor::{FfcActor, Request};
use crate::core::app_catalog::AppCatalog;
use crate::core::enabled_store::EnabledStore;
use crate::core::errors::FfcError;
use crate::core::flags::{FeatureFlag, ListFilter, Name};
use crate::core::membership::MembershipOracle;
use crate::core::peer_rpc::{PeerRpc, RpcRequest, RpcResponse};
use crate::core::registry::Registry;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct FfcHandle {
    tx: mpsc::Sender<Request>,
}

impl FfcHandle {
    /// Builds the actor and a handle to it without spawning anything, so the
    /// caller can place the actor's `run()` future under its own supervision
    /// (a `JoinSet`, typically) rather than have it run detached.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: FfcConfig,
        registry: Arc<Registry>,
        enabled_store: Arc<dyn EnabledStore>,
        app_catalog: Arc<dyn AppCatalog>,
        membership: Arc<dyn MembershipOracle>,
        peer_rpc: Arc<dyn PeerRpc>,
    ) -> (Self, FfcActor) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let actor = FfcActor::new(
            cfg,
            registry,
            enabled_store,
            app_catalog,
            membership,
            peer_rpc,
            rx,
        );
        (Self { tx }, actor)
    }

    /// Convenience for tests and demos: builds the actor and spawns it detached.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        cfg: FfcConfig,
        registry: Arc<Registry>,
        enabled_store: Arc<dyn EnabledStore>,
        app_catalog: Arc<dyn AppCatalog>,
        membership: Arc<dyn MembershipOracle>,
        peer_rpc: Arc<dyn PeerRpc>,
    ) -> Self {
        let (handle, actor) = Self::new(
            cfg,
            registry,
            enabled_store,
            app_catalog,
            membership,
            peer_rpc,
        );
        tokio::spawn(actor.run());
        handle
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Request) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).await.ok()?;
        rx.await.ok()
    }

    pub async fn init(&self) {
        self.request(|reply| Request::Init { reply }).await;
    }

    pub async fn list(&self, filter: ListFilter) -> HashMap<Name, FeatureFlag> {
        self.request(|reply| Request::List { filter, reply })
            .await
            .unwrap_or_default()
    }

    pub async fn is_supported(&self, name: Name) -> bool {
        self.request(|reply| Request::IsSupported { name, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn are_supported(&self, names: Vec<Name>) -> bool {
        self.request(|reply| Request::AreSupported { names, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn is_enabled(&self, name: Name) -> bool {
        self.request(|reply| Request::IsEnabled { name, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn enable(&self, name: Name) -> Result<(), FfcError> {
        self.request(|reply| Request::Enable { name, reply })
            .await
            .unwrap_or(Err(FfcError::Transport("actor unavailable".to_string())))
    }

    /// Always fails: disabling an enabled flag is unsupported.
    pub async fn disable(&self, _name: Name) -> Result<(), FfcError> {
        self.request(|reply| Request::Disable { reply })
            .await
            .unwrap_or(Err(FfcError::Unsupported))
    }

    pub async fn check_node_compatibility(&self, addr: SocketAddr) -> Result<(), FfcError> {
        self.request(|reply| Request::CheckNodeCompatibility { addr, reply })
            .await
            .unwrap_or(Err(FfcError::Transport("actor unavailable".to_string())))
    }

    pub async fn is_node_compatible(&self, addr: SocketAddr) -> bool {
        self.check_node_compatibility(addr).await.is_ok()
    }

    /// Answers an `RpcRequest` received from a peer over `PeerRpc`.
    pub async fn handle_rpc(&self, request: RpcRequest) -> RpcResponse {
        self.request(|reply| Request::HandleRpc { request, reply })
            .await
            .unwrap_or_else(|| RpcResponse::Error("actor unavailable".to_string()))
    }
}
