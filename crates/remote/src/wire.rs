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

//! Wire protocol: frames, handshake and envelope encoding
//!
//! ## Framing
//! Every unit on a peer stream is a frame: a `u32` length in network byte
//! order followed by that many body bytes.
//!
//! ## Handshake
//! The first frame in each direction is the node-info frame with a fixed
//! layout: `u32` process id (network byte order), 20 host-id bytes, `u32`
//! count, then `count` advertised actor ids as `u32`s. Everything after it
//! is a protobuf-encoded [`WireEnvelope`].
//!
//! ## Identity preservation
//! Addresses travel as `(id, process_id, host_id)` triples, so a header
//! decoded on the far side names exactly the same actors it named here.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use axon_core::{
    ActorAddress, ActorId, Content, Envelope, ExitReason, MessageHeader, MessageId,
    MessagePriority, NodeId, Payload, HOST_ID_SIZE,
};

/// Upper bound on one frame body; larger announcements close the session.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Errors of the peer wire layer.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Socket-level failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame body failed protobuf decoding.
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A frame announced more than [`MAX_FRAME_SIZE`] bytes.
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(u32),

    /// The node-info frame was missing or malformed.
    #[error("malformed node-info frame")]
    BadHandshake,

    /// An address on the wire did not carry a 20-byte host id.
    #[error("malformed address on the wire")]
    BadAddress,

    /// The peer is already connected; the first session wins.
    #[error("node {0} is already connected")]
    DuplicatePeer(NodeId),

    /// Local-only content that must never cross the wire.
    #[error("content cannot cross the wire")]
    NotWireable,
}

// ── wire messages ───────────────────────────────────────────────────────

/// An actor address on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WireAddress {
    /// Actor id on the owning node.
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// Owning node: process id.
    #[prost(uint32, tag = "2")]
    pub process_id: u32,
    /// Owning node: 20 host-id bytes.
    #[prost(bytes = "vec", tag = "3")]
    pub host_id: Vec<u8>,
}

/// An encoded user payload on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WirePayload {
    /// Uniform type name.
    #[prost(string, tag = "1")]
    pub type_name: String,
    /// Codec output.
    #[prost(bytes = "vec", tag = "2")]
    pub bytes: Vec<u8>,
}

/// Exit or down notification on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WireSignal {
    /// The terminating/terminated actor.
    #[prost(message, optional, tag = "1")]
    pub source: Option<WireAddress>,
    /// Exit reason code.
    #[prost(uint32, tag = "2")]
    pub reason: u32,
}

/// Kill-proxy peer operation on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WireKill {
    /// Id of the terminated actor on the sending node.
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// Exit reason code.
    #[prost(uint32, tag = "2")]
    pub reason: u32,
}

/// The content variants that cross the wire.
#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum WireContent {
    /// Application message.
    #[prost(message, tag = "4")]
    User(WirePayload),
    /// Exit notification.
    #[prost(message, tag = "5")]
    Exit(WireSignal),
    /// Down notification.
    #[prost(message, tag = "6")]
    Down(WireSignal),
    /// Link request.
    #[prost(message, tag = "7")]
    Link(WireAddress),
    /// Unlink request.
    #[prost(message, tag = "8")]
    Unlink(WireAddress),
    /// Monitor registration.
    #[prost(message, tag = "9")]
    Monitor(WireAddress),
    /// Monitor cancellation.
    #[prost(message, tag = "10")]
    Demonitor(WireAddress),
    /// Peer operation: kill the proxies of a terminated actor.
    #[prost(message, tag = "11")]
    KillProxy(WireKill),
}

/// One serialized header-plus-content unit.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WireEnvelope {
    /// Originating actor.
    #[prost(message, optional, tag = "1")]
    pub sender: Option<WireAddress>,
    /// Target actor.
    #[prost(message, optional, tag = "2")]
    pub recipient: Option<WireAddress>,
    /// Raw message id (request/response flags plus counter).
    #[prost(uint64, tag = "3")]
    pub message_id: u64,
    /// Carried content.
    #[prost(oneof = "WireContent", tags = "4, 5, 6, 7, 8, 9, 10, 11")]
    pub content: Option<WireContent>,
    /// Delivery priority: 0 normal, 1 high.
    #[prost(uint32, tag = "12")]
    pub priority: u32,
}

// ── address conversions ─────────────────────────────────────────────────

impl From<&ActorAddress> for WireAddress {
    fn from(addr: &ActorAddress) -> Self {
        WireAddress {
            id: addr.id,
            process_id: addr.node.process_id(),
            host_id: addr.node.host_id().to_vec(),
        }
    }
}

impl TryFrom<&WireAddress> for ActorAddress {
    type Error = WireError;

    fn try_from(wire: &WireAddress) -> Result<Self, WireError> {
        let host_id: [u8; HOST_ID_SIZE] = wire
            .host_id
            .as_slice()
            .try_into()
            .map_err(|_| WireError::BadAddress)?;
        Ok(ActorAddress::new(
            wire.id,
            NodeId::new(wire.process_id, host_id),
        ))
    }
}

// ── envelope conversions ────────────────────────────────────────────────

/// Serialize an envelope for transmission.
pub fn encode_envelope(env: &Envelope) -> Result<Vec<u8>, WireError> {
    use prost::Message;

    let content = match &env.content {
        Content::User(payload) => WireContent::User(WirePayload {
            type_name: payload.type_name.clone(),
            bytes: payload.bytes.clone(),
        }),
        Content::Exit { source, reason } => WireContent::Exit(WireSignal {
            source: Some(source.into()),
            reason: reason.0,
        }),
        Content::Down { source, reason } => WireContent::Down(WireSignal {
            source: Some(source.into()),
            reason: reason.0,
        }),
        Content::Link(addr) => WireContent::Link(addr.into()),
        Content::Unlink(addr) => WireContent::Unlink(addr.into()),
        Content::Monitor(addr) => WireContent::Monitor(addr.into()),
        Content::Demonitor(addr) => WireContent::Demonitor(addr.into()),
        Content::KillProxy { id, reason } => WireContent::KillProxy(WireKill {
            id: *id,
            reason: reason.0,
        }),
        Content::SyncTimeout { .. } => return Err(WireError::NotWireable),
    };
    let wire = WireEnvelope {
        sender: Some((&env.header.sender).into()),
        recipient: Some((&env.header.recipient).into()),
        message_id: env.header.id.raw(),
        content: Some(content),
        priority: match env.header.priority {
            MessagePriority::Normal => 0,
            MessagePriority::High => 1,
        },
    };
    Ok(wire.encode_to_vec())
}

/// Deserialize a received frame body into an envelope.
pub fn decode_envelope(body: &[u8]) -> Result<Envelope, WireError> {
    use prost::Message;

    let wire = WireEnvelope::decode(body)?;
    let sender = wire
        .sender
        .as_ref()
        .ok_or(WireError::BadAddress)
        .and_then(ActorAddress::try_from)?;
    let recipient = wire
        .recipient
        .as_ref()
        .ok_or(WireError::BadAddress)
        .and_then(ActorAddress::try_from)?;

    let signal_source = |signal: &WireSignal| -> Result<ActorAddress, WireError> {
        signal
            .source
            .as_ref()
            .ok_or(WireError::BadAddress)
            .and_then(ActorAddress::try_from)
    };

    let content = match wire.content.as_ref().ok_or(WireError::BadAddress)? {
        WireContent::User(payload) => Content::User(Payload::from_parts(
            payload.type_name.clone(),
            payload.bytes.clone(),
        )),
        WireContent::Exit(signal) => Content::Exit {
            source: signal_source(signal)?,
            reason: ExitReason(signal.reason),
        },
        WireContent::Down(signal) => Content::Down {
            source: signal_source(signal)?,
            reason: ExitReason(signal.reason),
        },
        WireContent::Link(addr) => Content::Link(addr.try_into()?),
        WireContent::Unlink(addr) => Content::Unlink(addr.try_into()?),
        WireContent::Monitor(addr) => Content::Monitor(addr.try_into()?),
        WireContent::Demonitor(addr) => Content::Demonitor(addr.try_into()?),
        WireContent::KillProxy(kill) => Content::KillProxy {
            id: kill.id,
            reason: ExitReason(kill.reason),
        },
    };

    let header = MessageHeader::new(sender, recipient)
        .with_id(MessageId::from_raw(wire.message_id))
        .with_priority(if wire.priority == 1 {
            MessagePriority::High
        } else {
            MessagePriority::Normal
        });
    Ok(Envelope::new(header, content))
}

// ── node-info frame ─────────────────────────────────────────────────────

/// Contents of the handshake frame.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeInfo {
    /// Identity of the sending node.
    pub node: NodeId,
    /// Actor ids the sender expects the peer to track.
    pub advertised: Vec<ActorId>,
}

/// Encode the node-info frame body: process id, host id, advertised ids.
pub fn encode_node_info(info: &NodeInfo) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + HOST_ID_SIZE + 4 + info.advertised.len() * 4);
    body.extend_from_slice(&info.node.process_id().to_be_bytes());
    body.extend_from_slice(info.node.host_id());
    body.extend_from_slice(&(info.advertised.len() as u32).to_be_bytes());
    for id in &info.advertised {
        body.extend_from_slice(&id.to_be_bytes());
    }
    body
}

/// Decode a node-info frame body.
pub fn decode_node_info(body: &[u8]) -> Result<NodeInfo, WireError> {
    if body.len() < 4 + HOST_ID_SIZE + 4 {
        return Err(WireError::BadHandshake);
    }
    let process_id = u32::from_be_bytes(body[0..4].try_into().expect("sliced"));
    let mut host_id = [0u8; HOST_ID_SIZE];
    host_id.copy_from_slice(&body[4..4 + HOST_ID_SIZE]);
    let count_at = 4 + HOST_ID_SIZE;
    let count = u32::from_be_bytes(body[count_at..count_at + 4].try_into().expect("sliced"));
    let ids_at = count_at + 4;
    if body.len() != ids_at + count as usize * 4 {
        return Err(WireError::BadHandshake);
    }
    let mut advertised = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let offset = ids_at + i * 4;
        advertised.push(u32::from_be_bytes(
            body[offset..offset + 4].try_into().expect("sliced"),
        ));
    }
    Ok(NodeInfo {
        node: NodeId::new(process_id, host_id),
        advertised,
    })
}

// ── frame i/o ───────────────────────────────────────────────────────────

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> std::io::Result<()> {
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Read one length-prefixed frame. `Ok(None)` on clean end-of-stream at a
/// frame boundary.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, WireError> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}
