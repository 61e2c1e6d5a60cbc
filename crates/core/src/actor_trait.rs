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

//! The common interface of everything messages can be enqueued into
//!
//! ## Purpose
//! Local actors and proxies for remote actors share one shape: they have an
//! address and accept envelopes. The registry stores trait objects of this
//! type; senders never care which concrete kind they talk to.

use crate::message::Envelope;
use crate::node::{ActorAddress, ActorId};

/// Interface shared by local actor handles and remote-actor proxies.
///
/// `enqueue` never blocks and never fails: after the target terminated the
/// envelope is silently discarded, matching the fire-and-forget send
/// semantics of the runtime.
pub trait AbstractActor: Send + Sync {
    /// The actor's globally unique address.
    fn address(&self) -> ActorAddress;

    /// The actor's process-local id.
    fn id(&self) -> ActorId {
        self.address().id
    }

    /// Deliver an envelope. Discards silently if the target is gone.
    fn enqueue(&self, env: Envelope);
}
