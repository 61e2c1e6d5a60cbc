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

//! The user-facing actor trait

use async_trait::async_trait;

use axon_core::{Envelope, ExitReason};

use crate::behavior::Handled;
use crate::context::ActorContext;

/// What applications implement to define an actor.
///
/// ## Lifecycle
/// `started` runs before the first message. `receive` is invoked for every
/// message not consumed by a pushed [`Behavior`](crate::Behavior); it is
/// the bottom of the behavior stack. When the actor terminates, `on_exit`
/// runs once; installing a behavior (or any `become`) from there cancels
/// the termination and the actor keeps running.
///
/// ## Synchronous messaging hooks
/// `on_sync_failure` fires when a response arrives for a pending request
/// that has no installed response handler; `on_sync_timeout` fires when a
/// timed request expires. Returning `false` (the default) makes the actor
/// quit with [`ExitReason::UNHANDLED_SYNC_FAILURE`] or
/// [`ExitReason::UNHANDLED_SYNC_TIMEOUT`] respectively.
#[async_trait]
pub trait Actor: Send + 'static {
    /// Hook invoked before the first message is dispatched.
    async fn started(&mut self, _ctx: &mut ActorContext) {}

    /// Handle one message. Only called while the behavior stack is empty.
    async fn receive(&mut self, ctx: &mut ActorContext, env: &Envelope) -> Handled;

    /// Hook invoked when the actor is about to terminate.
    async fn on_exit(&mut self, _ctx: &mut ActorContext, _reason: ExitReason) {}

    /// A response arrived for a pending request without a handler.
    /// Return `true` if the actor dealt with it.
    async fn on_sync_failure(&mut self, _ctx: &mut ActorContext, _env: &Envelope) -> bool {
        false
    }

    /// A timed request expired before its response arrived.
    /// Return `true` if the actor dealt with it.
    async fn on_sync_timeout(&mut self, _ctx: &mut ActorContext, _request_id: u64) -> bool {
        false
    }
}

/// Adapter turning a plain closure into an [`Actor`].
///
/// Used by [`ActorSystem::spawn_fn`](crate::ActorSystem::spawn_fn); handy
/// for small actors and tests.
pub struct FnActor<F> {
    handler: F,
}

impl<F> FnActor<F>
where
    F: FnMut(&mut ActorContext, &Envelope) -> Handled + Send + 'static,
{
    /// Wrap a closure.
    pub fn new(handler: F) -> Self {
        FnActor { handler }
    }
}

#[async_trait]
impl<F> Actor for FnActor<F>
where
    F: FnMut(&mut ActorContext, &Envelope) -> Handled + Send + 'static,
{
    async fn receive(&mut self, ctx: &mut ActorContext, env: &Envelope) -> Handled {
        (self.handler)(ctx, env)
    }
}
