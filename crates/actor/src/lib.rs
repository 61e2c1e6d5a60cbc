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

//! Local actors: dispatch engine, behaviors, context and system
//!
//! ## Purpose
//! The message-dispatch engine around the mailbox: user-facing actor and
//! behavior abstractions, the per-actor cell with links, monitors, groups
//! and synchronous-request correlation, the delayed-send scheduler, and
//! the [`ActorSystem`] context that ties one node together.

mod actor;
mod behavior;
mod cell;
mod context;
mod group;
mod remote_hub;
mod system;
mod timer;

pub use actor::{Actor, FnActor};
pub use behavior::{Behavior, Handled};
pub use cell::LocalRef;
pub use context::ActorContext;
pub use group::GroupRegistry;
pub use remote_hub::RemoteHub;
pub use system::{ActorRef, ActorSystem, SpawnOptions};
pub use timer::DelayedSender;
