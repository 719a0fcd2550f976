// src/core/membership/heartbeat.rs

//! A minimal UDP heartbeat liveness oracle, modeled on the cluster bus's gossip
//! ping/pong exchange but stripped down to the one thing this crate needs:
//! knowing which configured peers are currently reachable.

use super::{MembershipOracle, PeerId};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const MAX_DATAGRAM_SIZE: usize = 2048;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum HeartbeatMessage {
    Ping { from: String },
    Pong { from: String },
}

struct LivenessEntry {
    addr: SocketAddr,
    last_pong: Option<Instant>,
}

/// Tracks peer liveness via a periodic UDP ping/pong exchange. `run` owns the
/// socket and the send side; `MembershipOracle` reads are served from a shared
/// `DashMap` so the background task and any number of readers never contend on a
/// lock, mirroring `ClusterState::nodes`.
pub struct UdpHeartbeatMembershipOracle {
    my_id: String,
    nodes: Arc<DashMap<PeerId, LivenessEntry>>,
    node_timeout: Duration,
}

impl UdpHeartbeatMembershipOracle {
    /// Constructs the oracle and its background heartbeat task together. `peers`
    /// is the full configured membership (excluding self); liveness starts
    /// unknown (not running) for all of them until the first pong arrives.
    pub fn new(
        my_id: impl Into<String>,
        peers: Vec<(PeerId, SocketAddr)>,
        node_timeout: Duration,
    ) -> Self {
        let nodes = Arc::new(DashMap::new());
        for (id, addr) in peers {
            nodes.insert(
                id,
                LivenessEntry {
                    addr,
                    last_pong: None,
                },
            );
        }
        Self {
            my_id: my_id.into(),
            nodes,
            node_timeout,
        }
    }

    /// Runs the heartbeat loop until `shutdown` fires: periodically pings every
    /// configured peer and marks peers as down if no pong arrived within
    /// `node_timeout`. Mirrors `gossip::run`'s `tokio::select!` over a tick and a
    /// shutdown signal.
    pub async fn run(
        self: Arc<Self>,
        bind_addr: SocketAddr,
        mut shutdown: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let socket = UdpSocket::bind(bind_addr).await?;
        let mut ping_tick = tokio::time::interval(self.node_timeout / 3);
        let mut sweep_tick = tokio::time::interval(self.node_timeout);
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = ping_tick.tick() => {
                    self.broadcast_pings(&socket).await;
                }
                _ = sweep_tick.tick() => {
                    self.sweep_expired();
                }
                recv = socket.recv_from(&mut buf) => {
                    let (len, _from_addr) = match recv {
                        Ok(v) => v,
                        Err(e) => { warn!("heartbeat recv error: {e}"); continue; }
                    };
                    self.handle_datagram(&socket, &buf[..len]).await;
                }
                _ = shutdown.recv() => {
                    debug!("heartbeat task shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn broadcast_pings(&self, socket: &UdpSocket) {
        let ping = HeartbeatMessage::Ping {
            from: self.my_id.clone(),
        };
        let Ok(encoded) = bincode::serde::encode_to_vec(&ping, bincode::config::standard())
        else {
            return;
        };
        for entry in self.nodes.iter() {
            let _ = socket.send_to(&encoded, entry.addr).await;
        }
    }

    async fn handle_datagram(&self, socket: &UdpSocket, datagram: &[u8]) {
        let Ok((msg, _)) = bincode::serde::decode_from_slice::<HeartbeatMessage, _>(
            datagram,
            bincode::config::standard(),
        ) else {
            return;
        };
        match msg {
            HeartbeatMessage::Ping { from } => {
                let pong = HeartbeatMessage::Pong {
                    from: self.my_id.clone(),
                };
                if let (Ok(encoded), Some(entry)) = (
                    bincode::serde::encode_to_vec(&pong, bincode::config::standard()),
                    self.nodes.get(&PeerId(from)),
                ) {
                    let _ = socket.send_to(&encoded, entry.addr).await;
                }
            }
            HeartbeatMessage::Pong { from } => {
                if let Some(mut entry) = self.nodes.get_mut(&PeerId(from)) {
                    entry.last_pong = Some(Instant::now());
                }
            }
        }
    }

    fn sweep_expired(&self) {
        let now = Instant::now();
        for mut entry in self.nodes.iter_mut() {
            if let Some(last) = entry.last_pong
                && now.duration_since(last) > self.node_timeout
            {
                entry.last_pong = None;
            }
        }
    }
}

#[async_trait]
impl MembershipOracle for UdpHeartbeatMembershipOracle {
    fn all_peers(&self) -> Vec<(PeerId, SocketAddr)> {
        self.nodes
            .iter()
            .map(|e| (e.key().clone(), e.value().addr))
            .collect()
    }

    fn running_peers(&self) -> Vec<(PeerId, SocketAddr)> {
        let now = Instant::now();
        self.nodes
            .iter()
            .filter(|e| {
                e.value()
                    .last_pong
                    .is_some_and(|last| now.duration_since(last) <= self.node_timeout)
            })
            .map(|e| (e.key().clone(), e.value().addr))
            .collect()
    }
}
