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

//! Message model: ids, headers, payloads and envelopes
//!
//! ## Message ids
//! A 64-bit id correlates synchronous requests with their responses. The
//! low 62 bits carry the request counter; bit 63 marks a request, bit 62 a
//! response. Plain asynchronous messages carry id 0.
//!
//! ## Payloads
//! A payload is the uniform type name of the value plus its encoded bytes.
//! The default codec is `serde_json`; any isomorphic serializer can be
//! substituted by constructing [`Payload`] values directly.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::exit::ExitReason;
use crate::node::{ActorAddress, ActorId};

/// Correlation id for request/response messaging.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct MessageId(u64);

impl MessageId {
    const REQUEST_FLAG: u64 = 1 << 63;
    const RESPONSE_FLAG: u64 = 1 << 62;
    const VALUE_MASK: u64 = (1 << 62) - 1;

    /// The id of a plain asynchronous message.
    pub const ASYNC: MessageId = MessageId(0);

    /// A request id wrapping the given 62-bit counter value.
    pub fn request(value: u64) -> Self {
        MessageId(Self::REQUEST_FLAG | (value & Self::VALUE_MASK))
    }

    /// Reconstruct an id from its raw wire representation.
    pub fn from_raw(raw: u64) -> Self {
        MessageId(raw)
    }

    /// Raw wire representation.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Whether the request flag is set.
    pub fn is_request(&self) -> bool {
        self.0 & Self::REQUEST_FLAG != 0
    }

    /// Whether the response flag is set.
    pub fn is_response(&self) -> bool {
        self.0 & Self::RESPONSE_FLAG != 0
    }

    /// Whether this is a plain asynchronous message.
    pub fn is_async(&self) -> bool {
        self.0 == 0
    }

    /// The 62-bit counter value.
    pub fn request_id(&self) -> u64 {
        self.0 & Self::VALUE_MASK
    }

    /// The id a response to this request must carry.
    pub fn as_response(&self) -> Self {
        MessageId(Self::RESPONSE_FLAG | self.request_id())
    }
}

/// Delivery priority. High-priority messages overtake normal ones in the
/// recipient's mailbox; ordering within each priority is FIFO per sender.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MessagePriority {
    /// Default priority.
    #[default]
    Normal,
    /// Drained before any normal-priority message.
    High,
}

/// Routing information carried by every envelope.
#[derive(Clone, Debug)]
pub struct MessageHeader {
    /// Originating actor; invalid address when not sent from an actor.
    pub sender: ActorAddress,
    /// Target actor.
    pub recipient: ActorAddress,
    /// Request/response correlation id, [`MessageId::ASYNC`] otherwise.
    pub id: MessageId,
    /// Delivery priority.
    pub priority: MessagePriority,
}

impl MessageHeader {
    /// Header for a plain asynchronous message.
    pub fn new(sender: ActorAddress, recipient: ActorAddress) -> Self {
        MessageHeader {
            sender,
            recipient,
            id: MessageId::ASYNC,
            priority: MessagePriority::Normal,
        }
    }

    /// Set the correlation id.
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Error encoding or decoding a payload with the default codec.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The value could not be serialized or deserialized.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The payload carries a different type than the caller expects.
    #[error("type mismatch: payload is {actual}, expected {expected}")]
    TypeMismatch {
        /// Uniform type name stored in the payload.
        actual: String,
        /// Uniform type name the caller asked for.
        expected: String,
    },
}

/// An encoded user message: uniform type name plus codec output.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Payload {
    /// Uniform name of the encoded type.
    pub type_name: String,
    /// Codec output.
    pub bytes: Vec<u8>,
}

impl Payload {
    /// Encode a value with the default codec.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, PayloadError> {
        Ok(Payload {
            type_name: uniform_type_name::<T>(),
            bytes: serde_json::to_vec(value)?,
        })
    }

    /// Decode the payload, checking the uniform type name first.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        let expected = uniform_type_name::<T>();
        if self.type_name != expected {
            return Err(PayloadError::TypeMismatch {
                actual: self.type_name.clone(),
                expected,
            });
        }
        Ok(serde_json::from_slice(&self.bytes)?)
    }

    /// Whether the payload carries a value of type `T`.
    pub fn is<T>(&self) -> bool {
        self.type_name == uniform_type_name::<T>()
    }

    /// A payload from raw parts, for substituted codecs.
    pub fn from_parts(type_name: String, bytes: Vec<u8>) -> Self {
        Payload { type_name, bytes }
    }
}

/// Uniform name of a Rust type as used in payload headers.
pub fn uniform_type_name<T: ?Sized>() -> String {
    std::any::type_name::<T>().to_string()
}

/// What an envelope carries.
///
/// `User`, `Exit` and `Down` are observable by behaviors; the remaining
/// variants are control operations consumed by the actor cell or the peer
/// layer before user code sees them.
#[derive(Clone, Debug)]
pub enum Content {
    /// An application message.
    User(Payload),
    /// Exit notification from a terminating linked actor, or an explicit
    /// `send_exit`.
    Exit {
        /// The terminating actor.
        source: ActorAddress,
        /// Its exit reason.
        reason: ExitReason,
    },
    /// Termination notification for a monitored actor.
    Down {
        /// The terminated actor.
        source: ActorAddress,
        /// Its exit reason.
        reason: ExitReason,
    },
    /// Establish a link with the carried actor.
    Link(ActorAddress),
    /// Dissolve the link with the carried actor.
    Unlink(ActorAddress),
    /// Register the carried actor as a monitor of the recipient.
    Monitor(ActorAddress),
    /// Cancel one monitor registration of the carried actor.
    Demonitor(ActorAddress),
    /// Peer-layer operation: the remote actor with this id terminated and
    /// all proxies for it must be killed with the carried reason.
    KillProxy {
        /// Id of the terminated actor on the sending node.
        id: ActorId,
        /// Its exit reason.
        reason: ExitReason,
    },
    /// Local control message from the delayed-send scheduler: a timed
    /// request expired. Never crosses the wire.
    SyncTimeout {
        /// The request that timed out.
        request_id: u64,
    },
}

/// One unit of delivery: header plus content. Owned by the enqueuer until
/// enqueue, by the mailbox until dequeue, by the receiving actor for the
/// handler invocation.
#[derive(Clone, Debug)]
pub struct Envelope {
    /// Routing information.
    pub header: MessageHeader,
    /// Carried content.
    pub content: Content,
}

impl Envelope {
    /// Build an envelope.
    pub fn new(header: MessageHeader, content: Content) -> Self {
        Envelope { header, content }
    }

    /// Decode the user payload, if this is a user message of type `T`.
    pub fn user<T: DeserializeOwned>(&self) -> Option<T> {
        match &self.content {
            Content::User(payload) => payload.decode().ok(),
            _ => None,
        }
    }
}
