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

//! The context handed to actor code
//!
//! ## Purpose
//! Everything an actor may do while handling a message goes through this
//! object: sending (asynchronous, synchronous, delayed, exit), linking and
//! monitoring, group membership, behavior-stack manipulation and
//! termination.
//!
//! ## Deferred operations
//! Sends go out immediately. Operations that mutate the actor's own state
//! (become/unbecome, quit, trap-exit, link bookkeeping, pending-response
//! registration) are recorded and applied by the dispatch loop after the
//! handler returns. The handler never observes a half-applied state, and
//! `become` takes effect for the next message, never the current one.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use axon_core::{
    ActorAddress, Content, Envelope, ExitReason, MessageHeader, MessageId, MessagePriority,
    Payload, SendError,
};

use crate::actor::Actor;
use crate::behavior::Behavior;
use crate::system::{ActorRef, ActorSystem};

/// One-shot handler for an awaited response.
pub(crate) type ResponseHandler = Box<dyn FnOnce(&mut ActorContext, &Envelope) + Send>;

/// State mutation recorded by a handler, applied by the dispatch loop.
pub(crate) enum CtxOp {
    Become { behavior: Behavior, replace: bool },
    Unbecome,
    Quit(ExitReason),
    SetTrapExit(bool),
    Link(ActorAddress),
    LinkSeed(ActorAddress),
    Unlink(ActorAddress),
    Monitor(ActorAddress),
    Demonitor(ActorAddress),
    Join(String),
    Leave(String),
    ExpectPending(u64),
    ExpectResponse {
        request_id: u64,
        handler: ResponseHandler,
    },
}

/// Capabilities available to actor code during a handler invocation.
pub struct ActorContext {
    system: Arc<ActorSystem>,
    self_addr: ActorAddress,
    trap_exit: bool,
    current: Option<MessageHeader>,
    replied: bool,
    pub(crate) ops: Vec<CtxOp>,
}

impl ActorContext {
    pub(crate) fn new(
        system: Arc<ActorSystem>,
        self_addr: ActorAddress,
        trap_exit: bool,
        current: Option<MessageHeader>,
    ) -> Self {
        ActorContext {
            system,
            self_addr,
            trap_exit,
            current,
            replied: false,
            ops: Vec::new(),
        }
    }

    // ── introspection ───────────────────────────────────────────────────

    /// This actor's address.
    pub fn self_address(&self) -> ActorAddress {
        self.self_addr
    }

    /// Sender of the message currently being handled.
    pub fn sender(&self) -> Option<ActorAddress> {
        self.current.as_ref().map(|h| h.sender)
    }

    /// Header of the message currently being handled.
    pub fn current_header(&self) -> Option<&MessageHeader> {
        self.current.as_ref()
    }

    /// The runtime this actor lives in.
    pub fn system(&self) -> &Arc<ActorSystem> {
        &self.system
    }

    /// Whether exit messages are currently trapped.
    pub fn trap_exit(&self) -> bool {
        self.trap_exit
    }

    // ── asynchronous sends ──────────────────────────────────────────────

    /// Send `value` to `to` with normal priority.
    pub fn send<T: Serialize>(&self, to: &ActorAddress, value: &T) -> Result<(), SendError> {
        self.send_with_priority(to, value, MessagePriority::Normal)
    }

    /// Send `value` to `to` with the given priority.
    pub fn send_with_priority<T: Serialize>(
        &self,
        to: &ActorAddress,
        value: &T,
        priority: MessagePriority,
    ) -> Result<(), SendError> {
        let payload = Payload::encode(value)?;
        self.send_payload(to, payload, priority)
    }

    /// Send an already-encoded payload.
    pub fn send_payload(
        &self,
        to: &ActorAddress,
        payload: Payload,
        priority: MessagePriority,
    ) -> Result<(), SendError> {
        let header = MessageHeader::new(self.self_addr, *to).with_priority(priority);
        self.system
            .route(Envelope::new(header, Content::User(payload)))
    }

    /// Send an exit message carrying `reason` to `to`.
    ///
    /// The recipient handles it per the exit protocol: trapped as an
    /// ordinary message, otherwise terminating it unless the reason is
    /// normal.
    pub fn send_exit(&self, to: &ActorAddress, reason: ExitReason) -> Result<(), SendError> {
        let header = MessageHeader::new(self.self_addr, *to);
        self.system.route(Envelope::new(
            header,
            Content::Exit {
                source: self.self_addr,
                reason,
            },
        ))
    }

    /// Deliver `value` to `to` after `delay`, on this sender's behalf.
    pub fn delayed_send<T: Serialize>(
        &self,
        to: &ActorAddress,
        value: &T,
        delay: Duration,
        priority: MessagePriority,
    ) -> Result<(), SendError> {
        let payload = Payload::encode(value)?;
        let header = MessageHeader::new(self.self_addr, *to).with_priority(priority);
        self.system
            .delayed()
            .schedule(delay, Envelope::new(header, Content::User(payload)));
        Ok(())
    }

    // ── synchronous messaging ───────────────────────────────────────────

    /// Send a request and return its fresh request id.
    ///
    /// The response is correlated against the returned id; install a
    /// handler with [`ActorContext::expect_response`]. A response arriving
    /// without one goes through the sync-failure path.
    pub fn sync_send<T: Serialize>(
        &mut self,
        to: &ActorAddress,
        value: &T,
    ) -> Result<u64, SendError> {
        let payload = Payload::encode(value)?;
        let request_id = self.system.allocator().next_request_id();
        let header = MessageHeader::new(self.self_addr, *to).with_id(MessageId::request(request_id));
        self.ops.push(CtxOp::ExpectPending(request_id));
        self.system
            .route(Envelope::new(header, Content::User(payload)))?;
        Ok(request_id)
    }

    /// As [`ActorContext::sync_send`], plus a timeout: if no response
    /// arrived when it fires, the sync-timeout hook runs (or the actor
    /// quits with [`ExitReason::UNHANDLED_SYNC_TIMEOUT`]).
    pub fn timed_sync_send<T: Serialize>(
        &mut self,
        to: &ActorAddress,
        value: &T,
        timeout: Duration,
    ) -> Result<u64, SendError> {
        let request_id = self.sync_send(to, value)?;
        let header = MessageHeader::new(self.self_addr, self.self_addr)
            .with_priority(MessagePriority::High);
        self.system.delayed().schedule(
            timeout,
            Envelope::new(header, Content::SyncTimeout { request_id }),
        );
        Ok(request_id)
    }

    /// Install a one-shot handler for the response to `request_id`.
    pub fn expect_response(
        &mut self,
        request_id: u64,
        handler: impl FnOnce(&mut ActorContext, &Envelope) + Send + 'static,
    ) {
        self.ops.push(CtxOp::ExpectResponse {
            request_id,
            handler: Box::new(handler),
        });
    }

    /// Respond to the request currently being handled.
    ///
    /// A no-op with a warning when the current message is not a request or
    /// was already replied to; programmer errors never fault the runtime.
    pub fn reply<T: Serialize>(&mut self, value: &T) -> Result<(), SendError> {
        let Some(current) = self.current.clone() else {
            warn!(actor = %self.self_addr, "reply outside of a message handler");
            return Ok(());
        };
        if !current.id.is_request() {
            warn!(actor = %self.self_addr, "reply to a non-request message dropped");
            return Ok(());
        }
        if self.replied {
            warn!(actor = %self.self_addr, "duplicate reply dropped");
            return Ok(());
        }
        let payload = Payload::encode(value)?;
        let header = MessageHeader::new(self.self_addr, current.sender)
            .with_id(current.id.as_response());
        self.system
            .route(Envelope::new(header, Content::User(payload)))?;
        self.replied = true;
        Ok(())
    }

    // ── links, monitors, groups ─────────────────────────────────────────

    /// Link this actor with `target`. Idempotent: repeated calls keep one
    /// link; the first unlink removes it.
    pub fn link(&mut self, target: &ActorAddress) {
        self.ops.push(CtxOp::Link(*target));
    }

    /// Dissolve the link with `target`.
    pub fn unlink(&mut self, target: &ActorAddress) {
        self.ops.push(CtxOp::Unlink(*target));
    }

    /// Monitor `target`. Not deduplicated: every call produces one down
    /// message when `target` terminates.
    pub fn monitor(&mut self, target: &ActorAddress) {
        self.ops.push(CtxOp::Monitor(*target));
    }

    /// Cancel one monitor registration on `target`.
    pub fn demonitor(&mut self, target: &ActorAddress) {
        self.ops.push(CtxOp::Demonitor(*target));
    }

    /// Join the named group. Membership ends at `leave` or termination.
    pub fn join(&mut self, group: impl Into<String>) {
        self.ops.push(CtxOp::Join(group.into()));
    }

    /// Leave the named group.
    pub fn leave(&mut self, group: impl Into<String>) {
        self.ops.push(CtxOp::Leave(group.into()));
    }

    /// Send `value` to every current member of the named group.
    pub fn send_group<T: Serialize>(
        &self,
        group: &str,
        value: &T,
        priority: MessagePriority,
    ) -> Result<(), SendError> {
        let payload = Payload::encode(value)?;
        self.system
            .send_group_from(self.self_addr, group, payload, priority);
        Ok(())
    }

    // ── behavior stack and lifecycle ────────────────────────────────────

    /// Push a behavior; it becomes active for the next message.
    pub fn become_push(&mut self, behavior: Behavior) {
        self.ops.push(CtxOp::Become {
            behavior,
            replace: false,
        });
    }

    /// Replace the active behavior (or install the first one).
    pub fn become_replace(&mut self, behavior: Behavior) {
        self.ops.push(CtxOp::Become {
            behavior,
            replace: true,
        });
    }

    /// Pop the active behavior, reverting to the one below (or to the
    /// actor's own `receive`).
    pub fn unbecome(&mut self) {
        self.ops.push(CtxOp::Unbecome);
    }

    /// Terminate this actor with `reason` once the current handler
    /// returns. Clears the behavior stack and runs the `on_exit` hook;
    /// installing a behavior from there cancels the termination.
    pub fn quit(&mut self, reason: ExitReason) {
        self.ops.push(CtxOp::Quit(reason));
    }

    /// Toggle exit trapping. While trapped, exit messages are delivered
    /// like ordinary messages instead of terminating the actor.
    pub fn set_trap_exit(&mut self, trap: bool) {
        self.trap_exit = trap;
        self.ops.push(CtxOp::SetTrapExit(trap));
    }

    // ── spawning ────────────────────────────────────────────────────────

    /// Spawn a new actor.
    pub fn spawn(&self, actor: impl Actor) -> ActorRef {
        self.system.spawn(actor)
    }

    /// Spawn a new actor linked to this one before its first dispatch.
    pub fn spawn_linked(&mut self, actor: impl Actor) -> ActorRef {
        let child = self
            .system
            .spawn_with(actor, crate::system::SpawnOptions::new().link(self.self_addr));
        self.ops.push(CtxOp::LinkSeed(child.address()));
        child
    }

    /// Spawn a new actor monitored by this one before its first dispatch.
    pub fn spawn_monitored(&self, actor: impl Actor) -> ActorRef {
        self.system.spawn_with(
            actor,
            crate::system::SpawnOptions::new().monitor(self.self_addr),
        )
    }
}
