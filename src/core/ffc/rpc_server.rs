// src/core/ffc/rpc_server.rs

//! The server side of the peer RPC surface: accepts one short-lived TCP
//! connection per incoming call, decodes an `RpcRequest`, dispatches it to the
//! local `FfcActor` via its handle, and replies. The mirror image of
//! `peer_rpc::tcp::TcpPeerRpc`.

use super::handle::FfcHandle;
use crate::core::peer_rpc::{RpcRequest, RpcResponse};
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

pub async fn run(
    ffc: FfcHandle,
    bind_addr: SocketAddr,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    debug!(addr = %bind_addr, "feature-flag peer RPC listener bound");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(v) => v,
                    Err(e) => { warn!("peer rpc accept error: {e}"); continue; }
                };
                let ffc = ffc.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, ffc).await {
                        debug!(peer = %peer_addr, "peer rpc connection ended: {e}");
                    }
                });
            }
            _ = shutdown.recv() => {
                debug!("peer rpc listener shutting down");
                return Ok(());
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, ffc: FfcHandle) -> anyhow::Result<()> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
    while let Some(frame) = framed.next().await {
        let frame: BytesMut = frame?;
        let (request, _) =
            bincode::serde::decode_from_slice::<RpcRequest, _>(&frame, bincode::config::standard())?;
        let response = ffc.handle_rpc(request).await;
        let encoded = bincode::serde::encode_to_vec(&response, bincode::config::standard())?;
        framed.send(Bytes::from(encoded)).await?;
    }
    Ok(())
}
