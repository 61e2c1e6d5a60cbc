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

//! Node identity and actor addresses
//!
//! ## Purpose
//! A node is one process participating in the runtime. Its identity is the
//! pair of the OS process id and a 20-byte host id hashed from stable
//! machine identifiers, so two processes on the same machine differ in the
//! process id and processes on different machines differ in the host id.
//!
//! ## Canonical form
//! `"<process_id>@<host_id>"` where the host id is 40 lowercase hex digits,
//! e.g. `4221@00a94fd2a4bb06e6d4b3e12b41cb1a92dfa1ae43`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use sha2::{Digest, Sha256};

/// Actor id, unique within one process. 0 is reserved as "invalid".
pub type ActorId = u32;

/// Number of bytes in a host id.
pub const HOST_ID_SIZE: usize = 20;

/// Hash derived from stable hardware identifiers; constant for the process
/// lifetime.
pub type HostId = [u8; HOST_ID_SIZE];

/// Identity of one process in the distributed runtime.
///
/// Two `NodeId`s compare equal iff both the process id and the host id
/// match. Construction through [`NodeId::local`] is cached; the identity of
/// the running process never changes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    process_id: u32,
    host_id: HostId,
}

impl NodeId {
    /// Create a node id from its two components.
    pub fn new(process_id: u32, host_id: HostId) -> Self {
        NodeId {
            process_id,
            host_id,
        }
    }

    /// The node id of the running process.
    pub fn local() -> Self {
        static LOCAL: OnceLock<NodeId> = OnceLock::new();
        *LOCAL.get_or_init(|| NodeId::new(std::process::id(), host_id()))
    }

    /// OS process id component.
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Host id component.
    pub fn host_id(&self) -> &HostId {
        &self.host_id
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@", self.process_id)?;
        for byte in &self.host_id {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}

/// Error parsing the canonical `"<pid>@<hex>"` node id form.
#[derive(Debug, thiserror::Error)]
pub enum NodeIdParseError {
    /// The `@` separator is missing.
    #[error("missing '@' separator in node id")]
    MissingSeparator,

    /// The process id part is not a decimal u32.
    #[error("invalid process id: {0}")]
    InvalidProcessId(String),

    /// The host id part is not exactly 40 hex digits.
    #[error("invalid host id: expected 40 hex digits, got {0:?}")]
    InvalidHostId(String),
}

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pid, hex) = s.split_once('@').ok_or(NodeIdParseError::MissingSeparator)?;
        let process_id: u32 = pid
            .parse()
            .map_err(|_| NodeIdParseError::InvalidProcessId(pid.to_string()))?;
        if hex.len() != HOST_ID_SIZE * 2 {
            return Err(NodeIdParseError::InvalidHostId(hex.to_string()));
        }
        let mut host_id = [0u8; HOST_ID_SIZE];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let chunk = std::str::from_utf8(chunk)
                .map_err(|_| NodeIdParseError::InvalidHostId(hex.to_string()))?;
            host_id[i] = u8::from_str_radix(chunk, 16)
                .map_err(|_| NodeIdParseError::InvalidHostId(hex.to_string()))?;
        }
        Ok(NodeId::new(process_id, host_id))
    }
}

/// Compute the 20-byte host id of this machine.
///
/// Hashes the machine id, the MAC addresses of all non-loopback interfaces
/// and the hostname with SHA-256 and truncates to [`HOST_ID_SIZE`] bytes.
/// The inputs are stable across process restarts on the same machine.
pub fn host_id() -> HostId {
    static CACHED: OnceLock<HostId> = OnceLock::new();
    *CACHED.get_or_init(compute_host_id)
}

fn compute_host_id() -> HostId {
    let mut hasher = Sha256::new();
    if let Ok(machine_id) = std::fs::read_to_string("/etc/machine-id") {
        hasher.update(machine_id.trim().as_bytes());
    }
    for mac in mac_addresses() {
        hasher.update(mac.as_bytes());
    }
    if let Ok(hostname) = std::fs::read_to_string("/proc/sys/kernel/hostname") {
        hasher.update(hostname.trim().as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = [0u8; HOST_ID_SIZE];
    out.copy_from_slice(&digest[..HOST_ID_SIZE]);
    out
}

/// MAC addresses of all interfaces with a non-zero hardware address,
/// sorted for a stable hash input regardless of enumeration order.
fn mac_addresses() -> Vec<String> {
    let mut macs = Vec::new();
    if let Ok(entries) = std::fs::read_dir("/sys/class/net") {
        for entry in entries.flatten() {
            let path = entry.path().join("address");
            if let Ok(addr) = std::fs::read_to_string(path) {
                let addr = addr.trim().to_string();
                if !addr.is_empty() && addr != "00:00:00:00:00:00" {
                    macs.push(addr);
                }
            }
        }
    }
    macs.sort();
    macs
}

/// Globally unique actor address: the actor id plus the node it lives on.
///
/// Addresses are plain values; holding one does not keep the actor alive.
/// Resolution to a live reference goes through the registry (local ids) or
/// the proxy table (remote ids).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorAddress {
    /// Actor id, unique on `node`.
    pub id: ActorId,
    /// The node the actor lives on.
    pub node: NodeId,
}

impl ActorAddress {
    /// Create an address from its components.
    pub fn new(id: ActorId, node: NodeId) -> Self {
        ActorAddress { id, node }
    }

    /// The invalid address on the given node (actor id 0). Used as the
    /// sender of messages that do not originate from an actor.
    pub fn invalid(node: NodeId) -> Self {
        ActorAddress { id: 0, node }
    }

    /// Whether this address names an actual actor.
    pub fn is_valid(&self) -> bool {
        self.id != 0
    }
}

impl fmt::Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.node)
    }
}

impl fmt::Debug for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorAddress({})", self)
    }
}
