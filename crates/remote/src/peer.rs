// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 The Axon Authors
//
// This file is part of Axon.
//
// Axon is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// Axon is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Axon. If not, see <https://www.gnu.org/licenses/>.

//! Peer sessions: per-connection read and write machinery
//!
//! ## Session states
//! A fresh connection starts in `wait_for_process_info`: both sides send
//! their node-info frame and read the peer's ([`perform_handshake`]). The
//! read side then alternates between `wait_for_msg_size` (4 length bytes)
//! and `read_message` (exactly that many body bytes, decoded and
//! delivered). A decode failure or socket error ends the session; the
//! middleman then kills every proxy bound to it.
//!
//! ## Delivery
//! A decoded envelope whose recipient lives on this node is enqueued
//! through the registry. Anything else is a routing error in the star
//! topology and is dropped with a warning.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use axon_actor::ActorSystem;
use axon_core::{Content, Envelope, ExitReason, MessageHeader, NodeId};

use crate::middleman::MiddlemanOp;
use crate::wire::{
    decode_envelope, decode_node_info, encode_node_info, read_frame, write_frame, NodeInfo,
    WireError, MAX_FRAME_SIZE,
};

/// Exchange node-info frames. Ours goes out first; the peer's first frame
/// must be its node info.
pub(crate) async fn perform_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    local: &NodeInfo,
) -> Result<NodeInfo, WireError> {
    write_frame(stream, &encode_node_info(local)).await?;
    let body = read_frame(stream)
        .await?
        .ok_or(WireError::BadHandshake)?;
    decode_node_info(&body)
}

enum ReadState {
    WaitForMsgSize,
    ReadMessage(u32),
}

/// Read loop of one session. Ends on EOF, socket error or decode failure,
/// reporting the peer as down either way.
pub(crate) async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    peer: NodeId,
    system: Arc<ActorSystem>,
    ops: mpsc::UnboundedSender<MiddlemanOp>,
) {
    let mut state = ReadState::WaitForMsgSize;
    loop {
        match state {
            ReadState::WaitForMsgSize => {
                let mut len_bytes = [0u8; 4];
                match reader.read_exact(&mut len_bytes).await {
                    Ok(_) => {}
                    Err(err) => {
                        if err.kind() != std::io::ErrorKind::UnexpectedEof {
                            warn!(%peer, %err, "peer socket error");
                        }
                        break;
                    }
                }
                let len = u32::from_be_bytes(len_bytes);
                if len > MAX_FRAME_SIZE {
                    warn!(%peer, len, "oversized frame announced, closing session");
                    break;
                }
                state = ReadState::ReadMessage(len);
            }
            ReadState::ReadMessage(len) => {
                let mut body = vec![0u8; len as usize];
                if let Err(err) = reader.read_exact(&mut body).await {
                    warn!(%peer, %err, "peer socket error mid-frame");
                    break;
                }
                match decode_envelope(&body) {
                    Ok(env) => deliver(&system, &ops, peer, env),
                    Err(err) => {
                        // No resync is possible without a checksum; the
                        // only safe reaction is closing the stream.
                        warn!(%peer, %err, "undecodable frame, closing session");
                        break;
                    }
                }
                metrics::counter!("axon_peer_frames_received_total").increment(1);
                state = ReadState::WaitForMsgSize;
            }
        }
    }
    let _ = ops.send(MiddlemanOp::PeerDown { node: peer });
}

/// Hand one decoded envelope to its local recipient.
fn deliver(
    system: &Arc<ActorSystem>,
    ops: &mpsc::UnboundedSender<MiddlemanOp>,
    peer: NodeId,
    env: Envelope,
) {
    // Peer-level operation, not addressed to an actor.
    if let Content::KillProxy { id, reason } = &env.content {
        let _ = ops.send(MiddlemanOp::KillProxy {
            node: peer,
            id: *id,
            reason: *reason,
        });
        return;
    }

    if env.header.recipient.node != system.node() {
        warn!(
            recipient = %env.header.recipient,
            "frame for a foreign node in a star topology, dropped"
        );
        metrics::counter!("axon_peer_misrouted_total").increment(1);
        return;
    }

    // Linking or monitoring a local actor that is already gone must answer
    // with its recorded fate instead of silence.
    let fate_query = match &env.content {
        Content::Link(from) => Some((*from, env.header.recipient, true)),
        Content::Monitor(from) => Some((*from, env.header.recipient, false)),
        _ => None,
    };

    // An exit/down notification delivered directly settles the local
    // bookkeeping on the source's proxy: the recipient must not be told
    // again when the proxy itself dies.
    match &env.content {
        Content::Exit { source, .. } if source.node == peer => {
            let _ = ops.send(MiddlemanOp::ProxySignal {
                source: *source,
                partner: env.header.recipient,
                link: true,
            });
        }
        Content::Down { source, .. } if source.node == peer => {
            let _ = ops.send(MiddlemanOp::ProxySignal {
                source: *source,
                partner: env.header.recipient,
                link: false,
            });
        }
        _ => {}
    }

    if let Err(err) = system.route(env) {
        debug!(%err, "incoming frame undeliverable");
        if let Some((from, target, is_link)) = fate_query {
            let (_, recorded) = system.registry().get_entry(target.id);
            let reason = if recorded.is_invalid() {
                ExitReason::NORMAL
            } else {
                recorded
            };
            let content = if is_link {
                Content::Exit {
                    source: target,
                    reason,
                }
            } else {
                Content::Down {
                    source: target,
                    reason,
                }
            };
            let _ = system.route(Envelope::new(MessageHeader::new(target, from), content));
        }
    }
}

/// Write loop of one session: drains the outbound queue into the socket.
/// Ends when the queue closes (session removed) or the socket fails.
pub(crate) async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    peer: NodeId,
    ops: mpsc::UnboundedSender<MiddlemanOp>,
) {
    while let Some(body) = frames.recv().await {
        if let Err(err) = write_frame(&mut writer, &body).await {
            warn!(%peer, %err, "peer write failed");
            break;
        }
        metrics::counter!("axon_peer_frames_sent_total").increment(1);
    }
    let _ = ops.send(MiddlemanOp::PeerDown { node: peer });
}

#[cfg(test)]
mod tests {
    use axon_core::HOST_ID_SIZE;

    use super::*;

    #[tokio::test]
    async fn test_handshake_exchanges_node_info() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let client_info = NodeInfo {
            node: NodeId::new(1, [1; HOST_ID_SIZE]),
            advertised: vec![10],
        };
        let server_info = NodeInfo {
            node: NodeId::new(2, [2; HOST_ID_SIZE]),
            advertised: vec![],
        };

        let client_side = tokio::spawn({
            let client_info = client_info.clone();
            async move { perform_handshake(&mut client, &client_info).await }
        });
        let seen_by_server = perform_handshake(&mut server, &server_info).await.unwrap();
        let seen_by_client = client_side.await.unwrap().unwrap();

        assert_eq!(seen_by_server, client_info);
        assert_eq!(seen_by_client, server_info);
    }

    #[tokio::test]
    async fn test_handshake_fails_on_immediate_close() {
        let (client, mut server) = tokio::io::duplex(4096);
        drop(client);
        let info = NodeInfo {
            node: NodeId::new(2, [2; HOST_ID_SIZE]),
            advertised: vec![],
        };
        assert!(perform_handshake(&mut server, &info).await.is_err());
    }
}
