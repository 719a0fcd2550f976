// src/core/peer_rpc/mod.rs

//! Cross-node invocation: the set of local operations a peer can ask this node to
//! perform, and the client-side contract for asking a peer to perform them.

pub mod tcp;

use super::flags::{ListFilter, Name};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// The wire request for a peer RPC call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcRequest {
    /// List flag names in the given filter class.
    List(SerializableFilter),
    /// Check whether every name in the list is supported locally.
    AreSupportedLocally(Vec<Name>),
    /// Mark a flag as enabled locally (the tail end of the enable propagation
    /// step).
    MarkAsEnabledLocally(Name),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SerializableFilter {
    All,
    Enabled,
    Disabled,
}

impl From<ListFilter> for SerializableFilter {
    fn from(f: ListFilter) -> Self {
        match f {
            ListFilter::All => SerializableFilter::All,
            ListFilter::Enabled => SerializableFilter::Enabled,
            ListFilter::Disabled => SerializableFilter::Disabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcResponse {
    Names(Vec<Name>),
    Bool(bool),
    Ack,
    Error(String),
}

/// Invokes named operations on a remote peer with a bounded timeout. Implementors
/// own the transport; callers never see connection-level detail.
#[async_trait]
pub trait PeerRpc: Send + Sync {
    async fn call(
        &self,
        addr: SocketAddr,
        request: RpcRequest,
        timeout: Duration,
    ) -> anyhow::Result<RpcResponse>;
}
