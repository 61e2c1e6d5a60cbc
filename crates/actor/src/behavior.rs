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

//! Behaviors: swappable message handlers
//!
//! ## Purpose
//! An actor reacts to messages through a stack of behaviors. The topmost
//! behavior is active; `become`/`unbecome` on the context push, replace and
//! pop entries, which is how actors change what they respond to over time.
//! The actor's own [`Actor::receive`](crate::Actor::receive) implementation
//! acts as the bottom of the stack and only sees messages while the stack
//! is empty.

use axon_core::Envelope;

use crate::context::ActorContext;

/// Whether a handler consumed a message.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Handled {
    /// The message was matched and processed.
    Done,
    /// The handler does not match this message; the dispatch loop falls
    /// through to exit handling, response correlation or the drop path.
    Skipped,
}

/// One entry of the behavior stack.
///
/// Handlers are synchronous: every operation available on the context is a
/// non-blocking enqueue, so nothing inside a handler ever needs to await.
pub struct Behavior {
    handler: Box<dyn FnMut(&mut ActorContext, &Envelope) -> Handled + Send>,
}

impl Behavior {
    /// Wrap a handler closure.
    pub fn new(
        handler: impl FnMut(&mut ActorContext, &Envelope) -> Handled + Send + 'static,
    ) -> Self {
        Behavior {
            handler: Box::new(handler),
        }
    }

    pub(crate) fn invoke(&mut self, ctx: &mut ActorContext, env: &Envelope) -> Handled {
        (self.handler)(ctx, env)
    }
}

impl std::fmt::Debug for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Behavior")
    }
}
