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

//! Seam between the local runtime and the peer layer
//!
//! The system routes envelopes addressed to foreign nodes through this
//! trait and reports local actor exits into it, without depending on the
//! peer-layer crate. The middleman implements it.

use std::sync::Arc;

use axon_core::{AbstractActor, ActorAddress, ActorId, ExitReason};

/// What the local runtime needs from a running peer layer.
pub trait RemoteHub: Send + Sync {
    /// Resolve a remote address to its proxy, creating one if necessary.
    /// Returns `None` when the hub is shutting down.
    fn proxy(&self, addr: &ActorAddress) -> Option<Arc<dyn AbstractActor>>;

    /// A local actor terminated; peers tracking it must be told so their
    /// proxies die with the carried reason.
    fn actor_exited(&self, id: ActorId, reason: ExitReason);
}
