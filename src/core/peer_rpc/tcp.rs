// src/core/peer_rpc/tcp.rs

//! A reference `PeerRpc` transport: one short-lived TCP connection per call,
//! length-delimited framing, `bincode` payloads, wrapped in a caller-supplied
//! timeout. Modeled on `ClusterClient::connect`/`send_and_receive`.

use super::{PeerRpc, RpcRequest, RpcResponse};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

pub struct TcpPeerRpc;

impl Default for TcpPeerRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpPeerRpc {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PeerRpc for TcpPeerRpc {
    async fn call(
        &self,
        addr: SocketAddr,
        request: RpcRequest,
        timeout: Duration,
    ) -> anyhow::Result<RpcResponse> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr)).await??;
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

        let encoded = bincode::serde::encode_to_vec(&request, bincode::config::standard())?;
        tokio::time::timeout(timeout, framed.send(Bytes::from(encoded))).await??;

        let frame: BytesMut = tokio::time::timeout(timeout, framed.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("peer closed connection without a reply"))??;

        let (response, _) = bincode::serde::decode_from_slice::<RpcResponse, _>(
            &frame,
            bincode::config::standard(),
        )?;
        Ok(response)
    }
}
