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

//! The actor system: one explicit runtime context per node
//!
//! ## Purpose
//! Owns everything actors share: the identifier allocator, the registry,
//! the group table, the delayed-send scheduler and (optionally) the peer
//! layer. The system is handed to every actor at spawn. There are no global
//! singletons; two systems with distinct node ids coexist in one process,
//! which is how the two-node tests run.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::debug;

use axon_core::{
    AbstractActor, ActorAddress, ActorId, Content, Envelope, ExitReason, IdAllocator,
    MessageHeader, MessagePriority, NodeId, Payload, ActorRegistry, SendError,
};
use axon_mailbox::Mailbox;

use crate::actor::{Actor, FnActor};
use crate::behavior::Handled;
use crate::cell::{ActorCell, LocalRef};
use crate::context::ActorContext;
use crate::group::GroupRegistry;
use crate::remote_hub::RemoteHub;
use crate::timer::DelayedSender;

/// Spawn-time options: relations established before the first dispatch.
#[derive(Default)]
pub struct SpawnOptions {
    seed_links: Vec<ActorAddress>,
    seed_monitors: Vec<ActorAddress>,
    groups: Vec<String>,
}

impl SpawnOptions {
    /// No pre-established relations.
    pub fn new() -> Self {
        SpawnOptions::default()
    }

    /// Link the new actor with `partner` from the start.
    pub fn link(mut self, partner: ActorAddress) -> Self {
        self.seed_links.push(partner);
        self
    }

    /// Let `observer` monitor the new actor from the start.
    pub fn monitor(mut self, observer: ActorAddress) -> Self {
        self.seed_monitors.push(observer);
        self
    }

    /// Subscribe the new actor to a group from the start.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }
}

/// Handle to a spawned actor (local) or a connected remote actor (proxy).
#[derive(Clone)]
pub struct ActorRef {
    addr: ActorAddress,
    target: Arc<dyn AbstractActor>,
    local_node: NodeId,
}

impl ActorRef {
    /// Build a handle from an address and an enqueue target. Used by the
    /// spawn path and by the peer layer for proxy-backed handles.
    pub fn new(addr: ActorAddress, target: Arc<dyn AbstractActor>, local_node: NodeId) -> Self {
        ActorRef {
            addr,
            target,
            local_node,
        }
    }

    /// The actor's address.
    pub fn address(&self) -> ActorAddress {
        self.addr
    }

    /// Fire-and-forget send from outside any actor.
    pub fn tell<T: Serialize>(&self, value: &T) -> Result<(), SendError> {
        self.tell_with_priority(value, MessagePriority::Normal)
    }

    /// As [`ActorRef::tell`] with an explicit priority.
    pub fn tell_with_priority<T: Serialize>(
        &self,
        value: &T,
        priority: MessagePriority,
    ) -> Result<(), SendError> {
        let payload = Payload::encode(value)?;
        let header = MessageHeader::new(ActorAddress::invalid(self.local_node), self.addr)
            .with_priority(priority);
        self.target
            .enqueue(Envelope::new(header, Content::User(payload)));
        Ok(())
    }

    /// Enqueue a raw envelope.
    pub fn enqueue(&self, env: Envelope) {
        self.target.enqueue(env);
    }
}

impl std::fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActorRef({})", self.addr)
    }
}

/// The runtime context shared by all actors of one node.
pub struct ActorSystem {
    node: NodeId,
    allocator: IdAllocator,
    registry: ActorRegistry,
    groups: GroupRegistry,
    delayed: Arc<DelayedSender>,
    remote_hub: RwLock<Option<Arc<dyn RemoteHub>>>,
}

impl ActorSystem {
    /// Create a system for this process's node id.
    ///
    /// Must be called within a tokio runtime; the delayed-send scheduler
    /// task is spawned here.
    pub fn new() -> Arc<Self> {
        Self::with_node(NodeId::local())
    }

    /// Create a system with an explicit node id. Used by tests that run
    /// several nodes inside one process.
    pub fn with_node(node: NodeId) -> Arc<Self> {
        let system = Arc::new(ActorSystem {
            node,
            allocator: IdAllocator::new(),
            registry: ActorRegistry::new(),
            groups: GroupRegistry::new(),
            delayed: Arc::new(DelayedSender::new()),
            remote_hub: RwLock::new(None),
        });
        tokio::spawn(Arc::clone(&system.delayed).run(Arc::downgrade(&system)));
        system
    }

    /// This node's id.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The identifier allocator.
    pub fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    /// The actor registry.
    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    /// The group table.
    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// The delayed-send scheduler.
    pub fn delayed(&self) -> &Arc<DelayedSender> {
        &self.delayed
    }

    /// Install the peer layer. Called by the middleman when it starts.
    pub fn set_remote_hub(&self, hub: Arc<dyn RemoteHub>) {
        let mut slot = self.remote_hub.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(hub);
    }

    /// The installed peer layer, if any.
    pub fn remote_hub(&self) -> Option<Arc<dyn RemoteHub>> {
        let slot = self.remote_hub.read().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }

    /// Resolve an address to something envelopes can be enqueued into:
    /// the registry for local ids, the proxy table for remote ones.
    pub fn resolve(&self, addr: &ActorAddress) -> Option<Arc<dyn AbstractActor>> {
        if addr.node == self.node {
            self.registry.get(addr.id)
        } else {
            self.remote_hub()?.proxy(addr)
        }
    }

    /// Route an envelope to its recipient.
    pub fn route(&self, env: Envelope) -> Result<(), SendError> {
        let recipient = env.header.recipient;
        match self.resolve(&recipient) {
            Some(target) => {
                target.enqueue(env);
                Ok(())
            }
            None if recipient.node != self.node => Err(SendError::NoRemoteHub(recipient.node)),
            None => Err(SendError::UnknownActor(recipient)),
        }
    }

    /// Fire-and-forget send from outside any actor.
    pub fn send<T: Serialize>(&self, to: &ActorAddress, value: &T) -> Result<(), SendError> {
        let payload = Payload::encode(value)?;
        let header = MessageHeader::new(ActorAddress::invalid(self.node), *to);
        self.route(Envelope::new(header, Content::User(payload)))
    }

    /// Send an exit message from outside any actor.
    pub fn send_exit(&self, to: &ActorAddress, reason: ExitReason) -> Result<(), SendError> {
        let source = ActorAddress::invalid(self.node);
        let header = MessageHeader::new(source, *to);
        self.route(Envelope::new(header, Content::Exit { source, reason }))
    }

    /// Fan a payload out to every member of the named group.
    pub fn send_group_from(
        &self,
        sender: ActorAddress,
        group: &str,
        payload: Payload,
        priority: MessagePriority,
    ) {
        for member in self.groups.members(group) {
            let header = MessageHeader::new(sender, member).with_priority(priority);
            if let Err(err) = self.route(Envelope::new(header, Content::User(payload.clone()))) {
                debug!(%err, group, "group send to one member dropped");
            }
        }
    }

    // ── spawning ────────────────────────────────────────────────────────

    /// Spawn an actor with default options.
    pub fn spawn(self: &Arc<Self>, actor: impl Actor) -> ActorRef {
        self.spawn_with(actor, SpawnOptions::new())
    }

    /// Spawn an actor with explicit options.
    pub fn spawn_with(self: &Arc<Self>, actor: impl Actor, opts: SpawnOptions) -> ActorRef {
        self.spawn_boxed(Box::new(actor), opts, false)
    }

    /// Spawn a closure as an actor.
    pub fn spawn_fn(
        self: &Arc<Self>,
        handler: impl FnMut(&mut ActorContext, &Envelope) -> Handled + Send + 'static,
    ) -> ActorRef {
        self.spawn(FnActor::new(handler))
    }

    /// Spawn an actor subscribed to `group` from the start.
    pub fn spawn_in_group(self: &Arc<Self>, group: impl Into<String>, actor: impl Actor) -> ActorRef {
        self.spawn_with(actor, SpawnOptions::new().group(group))
    }

    /// Spawn an actor on its own OS thread. The actor may block inside its
    /// handlers; everything else behaves like a regular spawn.
    pub fn spawn_blocking(self: &Arc<Self>, actor: impl Actor) -> ActorRef {
        self.spawn_boxed(Box::new(actor), SpawnOptions::new(), true)
    }

    fn spawn_boxed(
        self: &Arc<Self>,
        actor: Box<dyn Actor>,
        opts: SpawnOptions,
        blocking: bool,
    ) -> ActorRef {
        let id = self.allocator.next_id();
        let addr = ActorAddress::new(id, self.node);
        let mailbox = Arc::new(Mailbox::new());
        let local_ref: Arc<LocalRef> = Arc::new(LocalRef::new(addr, Arc::clone(&mailbox)));
        self.registry.put(id, local_ref.clone());
        self.allocator.inc_running();

        let cell = ActorCell::new(
            addr,
            Arc::clone(self),
            mailbox,
            actor,
            opts.seed_links,
            opts.seed_monitors,
            opts.groups,
        );
        if blocking {
            std::thread::Builder::new()
                .name(format!("axon-actor-{id}"))
                .spawn(move || {
                    let rt = tokio::runtime::Builder::new_current_thread()
                        .enable_time()
                        .build()
                        .expect("blocking actor runtime");
                    rt.block_on(cell.run());
                })
                .expect("blocking actor thread");
        } else {
            tokio::spawn(cell.run());
        }
        debug!(actor = %addr, blocking, "actor spawned");
        ActorRef::new(addr, local_ref, self.node)
    }

    // ── lifecycle accounting ────────────────────────────────────────────

    /// Number of currently running actors on this node.
    pub fn running(&self) -> usize {
        self.allocator.running()
    }

    /// Resolve once the running count equals `expected`.
    pub async fn await_running_equal(&self, expected: usize) {
        self.allocator.await_running_equal(expected).await;
    }

    /// Report a local actor exit to the peer layer, if one is installed.
    pub fn notify_actor_exited(&self, id: ActorId, reason: ExitReason) {
        if let Some(hub) = self.remote_hub() {
            hub.actor_exited(id, reason);
        }
    }
}
