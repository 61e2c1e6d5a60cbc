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

//! Errors shared across the runtime crates.

use crate::node::{ActorAddress, NodeId};

/// Why a send could not be routed.
///
/// A successful send only means the envelope reached a mailbox or the peer
/// layer; delivery remains fire-and-forget beyond that point.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The recipient id is not registered on this node (never existed or
    /// already exited).
    #[error("no such actor: {0}")]
    UnknownActor(ActorAddress),

    /// The recipient lives on a remote node but no peer layer is running.
    #[error("no remote hub configured, cannot reach node {0}")]
    NoRemoteHub(NodeId),

    /// The payload could not be encoded.
    #[error(transparent)]
    Payload(#[from] crate::message::PayloadError),
}
