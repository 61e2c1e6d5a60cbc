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

//! The middleman: owner of all peer sessions
//!
//! ## Purpose
//! One event-loop task per node owns the `NodeId → session` map. Requests
//! from local actors (via proxies), session state changes and local exit
//! notifications arrive on an operation queue and are applied in batches,
//! so the peer set is never mutated while being iterated. Outbound
//! serialization happens here, on the session owner's side.
//!
//! ## Duplicate connections
//! A handshake for an already-registered node id is rejected and its
//! socket closed: the first session wins, never silently replaced.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use axon_actor::{ActorRef, ActorSystem, RemoteHub};
use axon_core::{
    AbstractActor, ActorAddress, ActorId, Content, Envelope, ExitReason, MessageHeader, NodeId,
};

use crate::peer::{perform_handshake, read_loop, write_loop};
use crate::proxy::Proxy;
use crate::wire::{encode_envelope, NodeInfo, WireError};

/// Operations applied by the middleman event loop.
pub(crate) enum MiddlemanOp {
    /// Transmit an envelope to the session of `node`.
    Forward { node: NodeId, env: Envelope },
    /// A handshake completed; register the session unless the node is
    /// already connected.
    PeerUp {
        node: NodeId,
        writer_tx: mpsc::UnboundedSender<Vec<u8>>,
        accepted: oneshot::Sender<bool>,
    },
    /// A session ended; kill every proxy bound to it.
    PeerDown { node: NodeId },
    /// A local actor terminated; tell all peers to kill its proxies.
    LocalExit { id: ActorId, reason: ExitReason },
    /// A peer reported one of its actors as terminated.
    KillProxy {
        node: NodeId,
        id: ActorId,
        reason: ExitReason,
    },
    /// An exit/down notification from the wire already reached `partner`
    /// directly; drop the matching bookkeeping on the source's proxy so
    /// the partner is not notified a second time.
    ProxySignal {
        source: ActorAddress,
        partner: ActorAddress,
        link: bool,
    },
    /// Stop the event loop and drop all sessions.
    Shutdown,
}

pub(crate) struct Inner {
    pub(crate) system: Arc<ActorSystem>,
    pub(crate) node: NodeId,
    pub(crate) ops: mpsc::UnboundedSender<MiddlemanOp>,
    proxies: RwLock<HashMap<NodeId, HashMap<ActorId, Arc<Proxy>>>>,
    advertised: RwLock<HashSet<ActorId>>,
    shutdown: AtomicBool,
    acceptors: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn get_or_create_proxy(&self, addr: &ActorAddress) -> Arc<Proxy> {
        let mut proxies = self.proxies.write().unwrap_or_else(|e| e.into_inner());
        let node_map = proxies.entry(addr.node).or_default();
        Arc::clone(
            node_map
                .entry(addr.id)
                .or_insert_with(|| Arc::new(Proxy::new(*addr, self.ops.clone()))),
        )
    }

    fn take_node_proxies(&self, node: &NodeId) -> Vec<Arc<Proxy>> {
        let mut proxies = self.proxies.write().unwrap_or_else(|e| e.into_inner());
        proxies
            .remove(node)
            .map(|m| m.into_values().collect())
            .unwrap_or_default()
    }

    fn remove_proxy(&self, node: &NodeId, id: ActorId) -> Option<Arc<Proxy>> {
        let mut proxies = self.proxies.write().unwrap_or_else(|e| e.into_inner());
        proxies.get_mut(node)?.remove(&id)
    }

    fn get_proxy(&self, addr: &ActorAddress) -> Option<Arc<Proxy>> {
        let proxies = self.proxies.read().unwrap_or_else(|e| e.into_inner());
        proxies.get(&addr.node)?.get(&addr.id).cloned()
    }

    fn node_info(&self) -> NodeInfo {
        let advertised = self.advertised.read().unwrap_or_else(|e| e.into_inner());
        NodeInfo {
            node: self.node,
            advertised: advertised.iter().copied().collect(),
        }
    }
}

struct PeerState {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

async fn run(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<MiddlemanOp>) {
    let mut peers: HashMap<NodeId, PeerState> = HashMap::new();
    'outer: while let Some(first) = rx.recv().await {
        // Fold everything already queued into one batch; the peer map is
        // only touched between batches, never while a batch is built.
        let mut batch = vec![first];
        while let Ok(more) = rx.try_recv() {
            batch.push(more);
        }
        for op in batch {
            match op {
                MiddlemanOp::Forward { node, env } => match peers.get(&node) {
                    Some(peer) => match encode_envelope(&env) {
                        Ok(body) => {
                            let _ = peer.tx.send(body);
                        }
                        Err(err) => warn!(%err, "outbound envelope not serializable, dropped"),
                    },
                    None => {
                        warn!(%node, "message to an unknown peer, dropped");
                        metrics::counter!("axon_peer_unknown_total").increment(1);
                    }
                },
                MiddlemanOp::PeerUp {
                    node,
                    writer_tx,
                    accepted,
                } => {
                    if peers.contains_key(&node) {
                        warn!(%node, "second connection for a connected node rejected");
                        let _ = accepted.send(false);
                    } else {
                        peers.insert(node, PeerState { tx: writer_tx });
                        info!(%node, "peer connected");
                        let _ = accepted.send(true);
                    }
                }
                MiddlemanOp::PeerDown { node } => {
                    if peers.remove(&node).is_some() {
                        info!(%node, "peer disconnected");
                        for proxy in inner.take_node_proxies(&node) {
                            proxy.kill(&inner.system, ExitReason::REMOTE_LINK_UNREACHABLE);
                        }
                    }
                }
                MiddlemanOp::LocalExit { id, reason } => {
                    for (peer_node, peer) in &peers {
                        let header = MessageHeader::new(
                            ActorAddress::invalid(inner.node),
                            ActorAddress::invalid(*peer_node),
                        );
                        let env =
                            Envelope::new(header, Content::KillProxy { id, reason });
                        match encode_envelope(&env) {
                            Ok(body) => {
                                let _ = peer.tx.send(body);
                            }
                            Err(err) => warn!(%err, "kill-proxy frame not serializable"),
                        }
                    }
                }
                MiddlemanOp::KillProxy { node, id, reason } => {
                    if let Some(proxy) = inner.remove_proxy(&node, id) {
                        proxy.kill(&inner.system, reason);
                    }
                }
                MiddlemanOp::ProxySignal {
                    source,
                    partner,
                    link,
                } => {
                    if let Some(proxy) = inner.get_proxy(&source) {
                        if link {
                            proxy.forget_link(&partner);
                        } else {
                            proxy.forget_monitor(&partner);
                        }
                    }
                }
                MiddlemanOp::Shutdown => {
                    peers.clear();
                    break 'outer;
                }
            }
        }
    }
    debug!("middleman event loop stopped");
}

/// Handle to the peer layer of one node.
///
/// Cloning is cheap; all clones drive the same event loop.
#[derive(Clone)]
pub struct Middleman {
    inner: Arc<Inner>,
}

impl Middleman {
    /// Start the peer layer for `system` and install it as the system's
    /// remote hub. Must run within a tokio runtime.
    pub fn start(system: &Arc<ActorSystem>) -> Middleman {
        let (ops, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            system: Arc::clone(system),
            node: system.node(),
            ops,
            proxies: RwLock::new(HashMap::new()),
            advertised: RwLock::new(HashSet::new()),
            shutdown: AtomicBool::new(false),
            acceptors: Mutex::new(Vec::new()),
        });
        tokio::spawn(run(Arc::clone(&inner), rx));
        let middleman = Middleman { inner };
        system.set_remote_hub(Arc::new(middleman.clone()));
        middleman
    }

    /// This node's id.
    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    /// Advertise a local actor in all future handshakes, so connecting
    /// peers receive a proxy for it.
    pub fn publish(&self, actor: &ActorRef) {
        let mut advertised = self
            .inner
            .advertised
            .write()
            .unwrap_or_else(|e| e.into_inner());
        advertised.insert(actor.address().id);
    }

    /// Accept connections on `addr`. Returns the bound address.
    pub async fn listen(&self, addr: impl ToSocketAddrs) -> std::io::Result<std::net::SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote)) => {
                        debug!(%remote, "incoming peer connection");
                        let inner = Arc::clone(&inner);
                        tokio::spawn(async move {
                            if let Err(err) = establish(inner, stream).await {
                                warn!(%err, "incoming peer rejected");
                            }
                        });
                    }
                    Err(err) => {
                        warn!(%err, "accept failed, listener stopped");
                        break;
                    }
                }
            }
        });
        let mut acceptors = self
            .inner
            .acceptors
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        acceptors.push(handle);
        info!(%local_addr, "listening for peers");
        Ok(local_addr)
    }

    /// Connect to the node listening on `addr`. Returns proxies for every
    /// actor the peer advertised in its handshake.
    pub async fn connect(&self, addr: impl ToSocketAddrs) -> Result<Vec<ActorRef>, WireError> {
        let stream = TcpStream::connect(addr).await?;
        let remote = establish(Arc::clone(&self.inner), stream).await?;
        let refs = remote
            .advertised
            .iter()
            .map(|&id| {
                let addr = ActorAddress::new(id, remote.node);
                let proxy = self.inner.get_or_create_proxy(&addr);
                ActorRef::new(addr, proxy as Arc<dyn AbstractActor>, self.inner.node)
            })
            .collect();
        Ok(refs)
    }

    /// Stop the event loop, drop all sessions and stop listening.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        let _ = self.inner.ops.send(MiddlemanOp::Shutdown);
        let mut acceptors = self
            .inner
            .acceptors
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for acceptor in acceptors.drain(..) {
            acceptor.abort();
        }
    }
}

impl RemoteHub for Middleman {
    fn proxy(&self, addr: &ActorAddress) -> Option<Arc<dyn AbstractActor>> {
        if self.inner.shutdown.load(Ordering::Acquire) || addr.node == self.inner.node {
            return None;
        }
        Some(self.inner.get_or_create_proxy(addr) as Arc<dyn AbstractActor>)
    }

    fn actor_exited(&self, id: ActorId, reason: ExitReason) {
        let _ = self.inner.ops.send(MiddlemanOp::LocalExit { id, reason });
    }
}

/// Handshake a fresh stream and, if accepted, wire up its read and write
/// loops. Returns the peer's node info.
async fn establish(inner: Arc<Inner>, mut stream: TcpStream) -> Result<NodeInfo, WireError> {
    let local_info = inner.node_info();
    let remote = perform_handshake(&mut stream, &local_info).await?;
    if remote.node == inner.node {
        warn!("peer presented our own node id, rejecting");
        return Err(WireError::BadHandshake);
    }

    let (writer_tx, writer_rx) = mpsc::unbounded_channel();
    let (accepted_tx, accepted_rx) = oneshot::channel();
    inner
        .ops
        .send(MiddlemanOp::PeerUp {
            node: remote.node,
            writer_tx,
            accepted: accepted_tx,
        })
        .map_err(|_| {
            WireError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "middleman stopped",
            ))
        })?;
    if !accepted_rx.await.unwrap_or(false) {
        return Err(WireError::DuplicatePeer(remote.node));
    }

    // Eagerly create proxies for whatever the peer advertised; linking and
    // sending resolve them lazily anyway, this just keeps them tracked per
    // session from the start.
    for &id in &remote.advertised {
        let addr = ActorAddress::new(id, remote.node);
        inner.get_or_create_proxy(&addr);
    }

    let (read_half, write_half) = stream.into_split();
    tokio::spawn(read_loop(
        read_half,
        remote.node,
        Arc::clone(&inner.system),
        inner.ops.clone(),
    ));
    tokio::spawn(write_loop(
        write_half,
        writer_rx,
        remote.node,
        inner.ops.clone(),
    ));
    Ok(remote)
}
