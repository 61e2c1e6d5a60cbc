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

//! Distributed peer layer
//!
//! ## Purpose
//! Carries actor messages between processes: length-prefixed frames over
//! TCP, a node-info handshake, proxies standing in for remote actors, and
//! the middleman event loop owning all sessions of a node. Actor addresses
//! survive the trip: a header decoded on the far side names exactly the
//! actors it named on this side.

mod middleman;
mod peer;
mod proxy;
mod wire;

pub use middleman::Middleman;
pub use wire::{
    decode_envelope, decode_node_info, encode_envelope, encode_node_info, read_frame, write_frame,
    NodeInfo, WireError, MAX_FRAME_SIZE,
};
