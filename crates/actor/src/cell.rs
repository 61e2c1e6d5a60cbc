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

//! The local actor cell: state machine and dispatch loop
//!
//! ## Dispatch order
//! For every dequeued envelope: control operations (link/monitor
//! bookkeeping, sync timeouts) are consumed by the cell; everything else is
//! offered to the active behavior first, then to the exit protocol, then to
//! response correlation, and finally dropped as unhandled.
//!
//! ## Termination
//! `quit` records a planned exit reason and clears the behavior stack; the
//! loop notices, runs the `on_exit` hook (which may install a behavior and
//! thereby cancel termination) and then executes the cleanup protocol:
//! exit messages to linked partners, down messages to monitors, group
//! unsubscription, registry erase, running-count decrement.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, warn};

use axon_core::{
    AbstractActor, ActorAddress, Content, Envelope, ExitReason, MessageHeader,
};
use axon_mailbox::Mailbox;

use crate::actor::Actor;
use crate::behavior::{Behavior, Handled};
use crate::context::{ActorContext, CtxOp, ResponseHandler};
use crate::system::ActorSystem;

/// Handle to a local actor: its address plus its mailbox.
///
/// This is what the registry stores and what senders resolve addresses to.
/// Holding it does not keep the actor running.
pub struct LocalRef {
    addr: ActorAddress,
    mailbox: Arc<Mailbox>,
}

impl LocalRef {
    pub(crate) fn new(addr: ActorAddress, mailbox: Arc<Mailbox>) -> Self {
        LocalRef { addr, mailbox }
    }
}

impl AbstractActor for LocalRef {
    fn address(&self) -> ActorAddress {
        self.addr
    }

    fn enqueue(&self, env: Envelope) {
        self.mailbox.enqueue(env);
    }
}

#[derive(Default)]
pub(crate) struct CellState {
    pub(crate) behaviors: Vec<Behavior>,
    pub(crate) pending_responses: Vec<u64>,
    pub(crate) response_handlers: HashMap<u64, ResponseHandler>,
    pub(crate) links: HashSet<ActorAddress>,
    pub(crate) monitors: Vec<ActorAddress>,
    pub(crate) groups: HashSet<String>,
    pub(crate) planned_exit: ExitReason,
    pub(crate) trap_exit: bool,
}

pub(crate) struct ActorCell {
    addr: ActorAddress,
    system: Arc<ActorSystem>,
    mailbox: Arc<Mailbox>,
    actor: Box<dyn Actor>,
    state: CellState,
}

impl ActorCell {
    pub(crate) fn new(
        addr: ActorAddress,
        system: Arc<ActorSystem>,
        mailbox: Arc<Mailbox>,
        actor: Box<dyn Actor>,
        seed_links: Vec<ActorAddress>,
        seed_monitors: Vec<ActorAddress>,
        seed_groups: Vec<String>,
    ) -> Self {
        let mut state = CellState {
            planned_exit: ExitReason::INVALID,
            ..CellState::default()
        };
        state.links.extend(seed_links);
        state.monitors.extend(seed_monitors);
        for group in seed_groups {
            system.groups().join(group.clone(), addr);
            state.groups.insert(group);
        }
        ActorCell {
            addr,
            system,
            mailbox,
            actor,
            state,
        }
    }

    fn make_ctx(&self, current: Option<MessageHeader>) -> ActorContext {
        ActorContext::new(
            Arc::clone(&self.system),
            self.addr,
            self.state.trap_exit,
            current,
        )
    }

    /// Drive the actor until it terminates, then run cleanup.
    pub(crate) async fn run(mut self) {
        let started = std::panic::AssertUnwindSafe(async {
            let mut ctx = self.make_ctx(None);
            self.actor.started(&mut ctx).await;
            ctx.ops
        })
        .catch_unwind()
        .await;
        match started {
            Ok(ops) => self.apply_ops(ops),
            Err(_) => {
                error!(actor = %self.addr, "started hook panicked");
                self.quit_now(ExitReason::UNHANDLED_EXCEPTION);
            }
        }

        loop {
            if !self.state.planned_exit.is_invalid() && self.state.behaviors.is_empty() {
                if self.confirm_exit().await {
                    break;
                }
            }
            let Some(env) = self.mailbox.dequeue().await else {
                break;
            };
            let outcome = std::panic::AssertUnwindSafe(self.process(env))
                .catch_unwind()
                .await;
            if outcome.is_err() {
                error!(actor = %self.addr, "message handler panicked");
                self.quit_now(ExitReason::UNHANDLED_EXCEPTION);
            }
        }

        let reason = if self.state.planned_exit.is_invalid() {
            ExitReason::NORMAL
        } else {
            self.state.planned_exit
        };
        self.cleanup(reason);
    }

    /// Run the `on_exit` hook. Returns `false` if the hook installed a new
    /// behavior, which cancels the termination.
    async fn confirm_exit(&mut self) -> bool {
        let reason = self.state.planned_exit;
        let hook = std::panic::AssertUnwindSafe(async {
            let mut ctx = self.make_ctx(None);
            self.actor.on_exit(&mut ctx, reason).await;
            ctx.ops
        })
        .catch_unwind()
        .await;
        match hook {
            Ok(ops) => self.apply_ops(ops),
            Err(_) => {
                error!(actor = %self.addr, "on_exit hook panicked");
                return true;
            }
        }
        if self.state.behaviors.is_empty() {
            true
        } else {
            self.state.planned_exit = ExitReason::INVALID;
            false
        }
    }

    async fn process(&mut self, env: Envelope) {
        // Control operations never reach user code.
        match &env.content {
            Content::Link(from) => {
                self.state.links.insert(*from);
                return;
            }
            Content::Unlink(from) => {
                self.state.links.remove(from);
                return;
            }
            Content::Monitor(from) => {
                self.state.monitors.push(*from);
                return;
            }
            Content::Demonitor(from) => {
                if let Some(pos) = self.state.monitors.iter().position(|a| a == from) {
                    self.state.monitors.remove(pos);
                }
                return;
            }
            Content::KillProxy { .. } => {
                warn!(actor = %self.addr, "kill-proxy operation sent to a local actor, dropped");
                return;
            }
            Content::SyncTimeout { request_id } => {
                self.handle_sync_timeout(*request_id).await;
                return;
            }
            Content::User(_) | Content::Exit { .. } | Content::Down { .. } => {}
        }

        // A terminating partner dissolves the link on this side, whether or
        // not the exit message itself gets matched below.
        if let Content::Exit { source, .. } = &env.content {
            self.state.links.remove(source);
        }

        if self.offer(&env).await == Handled::Done {
            return;
        }

        match &env.content {
            Content::Exit { reason, .. } if !self.state.trap_exit => {
                if !reason.is_normal() {
                    self.quit_now(*reason);
                }
            }
            _ if env.header.id.is_response() => self.handle_response(&env).await,
            _ => {
                metrics::counter!(
                    "axon_unhandled_messages_total",
                    "actor" => self.addr.id.to_string()
                )
                .increment(1);
                debug!(actor = %self.addr, "unhandled message dropped");
            }
        }
    }

    /// Offer the envelope to the active behavior, or to the actor's own
    /// `receive` when the stack is empty.
    async fn offer(&mut self, env: &Envelope) -> Handled {
        let mut ctx = self.make_ctx(Some(env.header.clone()));
        let handled = if let Some(top) = self.state.behaviors.last_mut() {
            top.invoke(&mut ctx, env)
        } else {
            self.actor.receive(&mut ctx, env).await
        };
        let ops = std::mem::take(&mut ctx.ops);
        self.apply_ops(ops);
        handled
    }

    async fn handle_response(&mut self, env: &Envelope) {
        let request_id = env.header.id.request_id();
        let Some(pos) = self
            .state
            .pending_responses
            .iter()
            .position(|&rid| rid == request_id)
        else {
            warn!(
                actor = %self.addr,
                request_id,
                "response for a request nobody sent, dropped"
            );
            metrics::counter!("axon_stray_responses_total").increment(1);
            return;
        };
        self.state.pending_responses.remove(pos);

        if let Some(handler) = self.state.response_handlers.remove(&request_id) {
            let mut ctx = self.make_ctx(Some(env.header.clone()));
            handler(&mut ctx, env);
            let ops = std::mem::take(&mut ctx.ops);
            self.apply_ops(ops);
        } else {
            let mut ctx = self.make_ctx(Some(env.header.clone()));
            let handled = self.actor.on_sync_failure(&mut ctx, env).await;
            let ops = std::mem::take(&mut ctx.ops);
            self.apply_ops(ops);
            if !handled {
                self.quit_now(ExitReason::UNHANDLED_SYNC_FAILURE);
            }
        }
    }

    async fn handle_sync_timeout(&mut self, request_id: u64) {
        let Some(pos) = self
            .state
            .pending_responses
            .iter()
            .position(|&rid| rid == request_id)
        else {
            // The response won the race; nothing to do.
            return;
        };
        self.state.pending_responses.remove(pos);
        self.state.response_handlers.remove(&request_id);

        let mut ctx = self.make_ctx(None);
        let handled = self.actor.on_sync_timeout(&mut ctx, request_id).await;
        let ops = std::mem::take(&mut ctx.ops);
        self.apply_ops(ops);
        if !handled {
            self.quit_now(ExitReason::UNHANDLED_SYNC_TIMEOUT);
        }
    }

    fn quit_now(&mut self, reason: ExitReason) {
        if self.state.planned_exit.is_invalid() {
            self.state.planned_exit = reason;
        }
        self.state.behaviors.clear();
    }

    fn apply_ops(&mut self, ops: Vec<CtxOp>) {
        for op in ops {
            match op {
                CtxOp::Become { behavior, replace } => {
                    if replace {
                        self.state.behaviors.pop();
                    }
                    self.state.behaviors.push(behavior);
                }
                CtxOp::Unbecome => {
                    self.state.behaviors.pop();
                }
                CtxOp::Quit(reason) => self.quit_now(reason),
                CtxOp::SetTrapExit(trap) => self.state.trap_exit = trap,
                CtxOp::Link(target) => self.establish_link(target),
                CtxOp::LinkSeed(target) => {
                    self.state.links.insert(target);
                }
                CtxOp::Unlink(target) => {
                    if self.state.links.remove(&target) {
                        let header = MessageHeader::new(self.addr, target);
                        let _ = self
                            .system
                            .route(Envelope::new(header, Content::Unlink(self.addr)));
                    }
                }
                CtxOp::Monitor(target) => self.establish_monitor(target),
                CtxOp::Demonitor(target) => {
                    let header = MessageHeader::new(self.addr, target);
                    let _ = self
                        .system
                        .route(Envelope::new(header, Content::Demonitor(self.addr)));
                }
                CtxOp::Join(group) => {
                    if self.state.groups.insert(group.clone()) {
                        self.system.groups().join(group, self.addr);
                    }
                }
                CtxOp::Leave(group) => {
                    if self.state.groups.remove(&group) {
                        self.system.groups().leave(&group, &self.addr);
                    }
                }
                CtxOp::ExpectPending(request_id) => {
                    self.state.pending_responses.push(request_id);
                }
                CtxOp::ExpectResponse {
                    request_id,
                    handler,
                } => {
                    if self.state.pending_responses.contains(&request_id) {
                        self.state.response_handlers.insert(request_id, handler);
                    } else {
                        warn!(
                            actor = %self.addr,
                            request_id,
                            "response handler for a request that is not pending, dropped"
                        );
                    }
                }
            }
        }
    }

    /// Record a link and perform the handshake with the partner. Linking
    /// to an already-terminated actor delivers its recorded exit reason
    /// right back to this actor.
    fn establish_link(&mut self, target: ActorAddress) {
        if target == self.addr || !self.state.links.insert(target) {
            return;
        }
        let header = MessageHeader::new(self.addr, target);
        if self
            .system
            .route(Envelope::new(header, Content::Link(self.addr)))
            .is_err()
        {
            let reason = self.recorded_reason(&target);
            self.mailbox.enqueue(Envelope::new(
                MessageHeader::new(target, self.addr),
                Content::Exit {
                    source: target,
                    reason,
                },
            ));
        }
    }

    /// Register a monitor on the target. Monitoring an already-terminated
    /// actor delivers the down message immediately.
    fn establish_monitor(&mut self, target: ActorAddress) {
        let header = MessageHeader::new(self.addr, target);
        if self
            .system
            .route(Envelope::new(header, Content::Monitor(self.addr)))
            .is_err()
        {
            let reason = self.recorded_reason(&target);
            self.mailbox.enqueue(Envelope::new(
                MessageHeader::new(target, self.addr),
                Content::Down {
                    source: target,
                    reason,
                },
            ));
        }
    }

    /// Exit reason recorded for a local target, NORMAL when unknown.
    fn recorded_reason(&self, target: &ActorAddress) -> ExitReason {
        if target.node == self.system.node() {
            let (_, reason) = self.system.registry().get_entry(target.id);
            if !reason.is_invalid() {
                return reason;
            }
        }
        ExitReason::NORMAL
    }

    /// The cleanup protocol of a terminating actor.
    fn cleanup(mut self, reason: ExitReason) {
        self.mailbox.close();

        for link in std::mem::take(&mut self.state.links) {
            let header = MessageHeader::new(self.addr, link);
            let _ = self.system.route(Envelope::new(
                header,
                Content::Exit {
                    source: self.addr,
                    reason,
                },
            ));
        }
        for observer in std::mem::take(&mut self.state.monitors) {
            let header = MessageHeader::new(self.addr, observer);
            let _ = self.system.route(Envelope::new(
                header,
                Content::Down {
                    source: self.addr,
                    reason,
                },
            ));
        }

        self.system.groups().leave_all(&self.addr);
        self.system.registry().erase(self.addr.id, reason);
        self.system.notify_actor_exited(self.addr.id, reason);

        // Destroy whatever is still queued before the mailbox goes away.
        drop(self.mailbox.drain());

        self.system.allocator().dec_running();
        debug!(actor = %self.addr, %reason, "actor terminated");
    }
}
