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

//! Core types of the Axon actor runtime
//!
//! ## Purpose
//! Everything the rest of the runtime agrees on: actor and node identity,
//! addresses, exit reasons, the message model (headers, payloads, envelopes),
//! the process-wide identifier allocator, and the actor registry.
//!
//! ## Design
//! This crate is deliberately free of I/O. The mailbox, the dispatch engine
//! and the peer layer all build on these types; none of them leak back in.

mod actor_trait;
mod error;
mod exit;
mod ids;
mod message;
mod node;
mod registry;

pub use actor_trait::AbstractActor;
pub use error::SendError;
pub use exit::ExitReason;
pub use ids::IdAllocator;
pub use message::{
    Content, Envelope, MessageHeader, MessageId, MessagePriority, Payload, PayloadError,
};
pub use node::{host_id, ActorAddress, ActorId, HostId, NodeId, NodeIdParseError, HOST_ID_SIZE};
pub use registry::ActorRegistry;
