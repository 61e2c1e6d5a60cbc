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

//! Axon: an actor-model concurrency runtime
//!
//! Lightweight concurrent actors communicating exclusively through
//! asynchronous messages, referable by opaque addresses across machine
//! boundaries, supervised through link and monitor relationships.
//!
//! Three layers:
//! 1. identity, registry and lifecycle machinery (`axon_core`)
//! 2. mailboxes and the message-dispatch engine (`axon_mailbox`,
//!    `axon_actor`)
//! 3. the distributed peer layer (`axon_remote`)

#![warn(missing_docs)]

// Independent crates, re-exported here.
pub use axon_actor as actor;
pub use axon_core as core;
pub use axon_mailbox as mailbox;
pub use axon_remote as remote;

// Re-export the working set for convenience.
pub use axon_actor::{
    Actor, ActorContext, ActorRef, ActorSystem, Behavior, DelayedSender, FnActor, GroupRegistry,
    Handled, RemoteHub, SpawnOptions,
};
pub use axon_core::{
    AbstractActor, ActorAddress, ActorId, ActorRegistry, Content, Envelope, ExitReason,
    IdAllocator, MessageHeader, MessageId, MessagePriority, NodeId, Payload, SendError,
};
pub use axon_mailbox::Mailbox;
pub use axon_remote::{Middleman, NodeInfo, WireError};
