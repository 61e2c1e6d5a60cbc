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

//! Proxies: local stand-ins for remote actors
//!
//! ## Purpose
//! A proxy carries the address of an actor on another node and accepts
//! envelopes like any local actor. Its mailbox is virtual: everything
//! enqueued is handed to the middleman for transmission. Link and monitor
//! operations against the proxy are additionally recorded locally, so that
//! a lost peer connection (or a kill-proxy operation from the peer) can
//! synthesize the exit and down messages local observers are owed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use axon_actor::ActorSystem;
use axon_core::{AbstractActor, ActorAddress, Content, Envelope, ExitReason, MessageHeader};

use crate::middleman::MiddlemanOp;

/// Local representative of one remote actor.
pub(crate) struct Proxy {
    addr: ActorAddress,
    ops: mpsc::UnboundedSender<MiddlemanOp>,
    links: Mutex<HashSet<ActorAddress>>,
    monitors: Mutex<Vec<ActorAddress>>,
    dead: AtomicBool,
}

impl Proxy {
    pub(crate) fn new(addr: ActorAddress, ops: mpsc::UnboundedSender<MiddlemanOp>) -> Self {
        Proxy {
            addr,
            ops,
            links: Mutex::new(HashSet::new()),
            monitors: Mutex::new(Vec::new()),
            dead: AtomicBool::new(false),
        }
    }

    /// Terminate this proxy: deliver synthetic exit messages to linked
    /// local actors and down messages to local monitors, then refuse all
    /// further traffic.
    pub(crate) fn kill(&self, system: &ActorSystem, reason: ExitReason) {
        if self.dead.swap(true, Ordering::AcqRel) {
            return;
        }
        let links = {
            let mut links = self.links.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *links)
        };
        for link in links {
            let header = MessageHeader::new(self.addr, link);
            let _ = system.route(Envelope::new(
                header,
                Content::Exit {
                    source: self.addr,
                    reason,
                },
            ));
        }
        let monitors = {
            let mut monitors = self.monitors.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *monitors)
        };
        for observer in monitors {
            let header = MessageHeader::new(self.addr, observer);
            let _ = system.route(Envelope::new(
                header,
                Content::Down {
                    source: self.addr,
                    reason,
                },
            ));
        }
        debug!(proxy = %self.addr, %reason, "proxy killed");
    }

    /// Whether `kill` already ran.
    pub(crate) fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    /// An exit notification already reached `partner` directly; it must
    /// not be notified again when this proxy dies.
    pub(crate) fn forget_link(&self, partner: &ActorAddress) {
        let mut links = self.links.lock().unwrap_or_else(|e| e.into_inner());
        links.remove(partner);
    }

    /// A down notification already reached `partner`; drop one matching
    /// monitor registration.
    pub(crate) fn forget_monitor(&self, partner: &ActorAddress) {
        let mut monitors = self.monitors.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = monitors.iter().position(|a| a == partner) {
            monitors.remove(pos);
        }
    }
}

impl AbstractActor for Proxy {
    fn address(&self) -> ActorAddress {
        self.addr
    }

    /// Record link/monitor interest locally, then forward everything to
    /// the middleman for transmission to the owning node.
    fn enqueue(&self, env: Envelope) {
        if self.is_dead() {
            metrics::counter!("axon_proxy_discarded_total").increment(1);
            return;
        }
        match &env.content {
            Content::Link(from) => {
                let mut links = self.links.lock().unwrap_or_else(|e| e.into_inner());
                links.insert(*from);
            }
            Content::Unlink(from) => {
                let mut links = self.links.lock().unwrap_or_else(|e| e.into_inner());
                links.remove(from);
            }
            Content::Monitor(from) => {
                let mut monitors = self.monitors.lock().unwrap_or_else(|e| e.into_inner());
                monitors.push(*from);
            }
            Content::Demonitor(from) => {
                let mut monitors = self.monitors.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(pos) = monitors.iter().position(|a| a == from) {
                    monitors.remove(pos);
                }
            }
            _ => {}
        }
        let _ = self.ops.send(MiddlemanOp::Forward {
            node: self.addr.node,
            env,
        });
    }
}
