// src/core/membership/mod.rs

//! Cluster membership: who is part of this cluster, and who is currently
//! reachable.

pub mod heartbeat;

use async_trait::async_trait;
use std::net::SocketAddr;

/// A cluster peer's identity as seen by the membership oracle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(pub String);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves cluster membership: the full configured member list, and the subset
/// currently believed to be running. Both exclude this node itself.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    fn all_peers(&self) -> Vec<(PeerId, SocketAddr)>;
    fn running_peers(&self) -> Vec<(PeerId, SocketAddr)>;
}

/// A fixed peer list with no liveness tracking: every configured peer is always
/// considered running. Useful for tests and single-process demos where there is no
/// real network to probe.
pub struct StaticMembershipOracle {
    peers: Vec<(PeerId, SocketAddr)>,
}

impl StaticMembershipOracle {
    pub fn new(peers: Vec<(PeerId, SocketAddr)>) -> Self {
        Self { peers }
    }

    pub fn empty() -> Self {
        Self { peers: Vec::new() }
    }
}

#[async_trait]
impl MembershipOracle for StaticMembershipOracle {
    fn all_peers(&self) -> Vec<(PeerId, SocketAddr)> {
        self.peers.clone()
    }

    fn running_peers(&self) -> Vec<(PeerId, SocketAddr)> {
        self.peers.clone()
    }
}
