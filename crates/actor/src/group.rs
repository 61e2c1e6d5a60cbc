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

//! Named actor groups
//!
//! Local pub/sub membership: actors join and leave named groups, and a send
//! to a group fans out to every current member. All subscriptions of an
//! actor are cancelled when it terminates.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use axon_core::ActorAddress;

/// Registry of named groups and their members.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, HashSet<ActorAddress>>>,
}

impl GroupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        GroupRegistry::default()
    }

    /// Add `member` to the named group.
    pub fn join(&self, group: String, member: ActorAddress) {
        let mut groups = self.groups.write().unwrap_or_else(|e| e.into_inner());
        groups.entry(group).or_default().insert(member);
    }

    /// Remove `member` from the named group. Empty groups disappear.
    pub fn leave(&self, group: &str, member: &ActorAddress) {
        let mut groups = self.groups.write().unwrap_or_else(|e| e.into_inner());
        if let Some(members) = groups.get_mut(group) {
            members.remove(member);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }

    /// Cancel every subscription of `member`.
    pub fn leave_all(&self, member: &ActorAddress) {
        let mut groups = self.groups.write().unwrap_or_else(|e| e.into_inner());
        groups.retain(|_, members| {
            members.remove(member);
            !members.is_empty()
        });
    }

    /// Snapshot of the members of the named group.
    pub fn members(&self, group: &str) -> Vec<ActorAddress> {
        let groups = self.groups.read().unwrap_or_else(|e| e.into_inner());
        groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use axon_core::{NodeId, HOST_ID_SIZE};

    use super::*;

    fn addr(id: u32) -> ActorAddress {
        ActorAddress::new(id, NodeId::new(1, [0; HOST_ID_SIZE]))
    }

    #[test]
    fn test_join_and_members() {
        let groups = GroupRegistry::new();
        groups.join("workers".into(), addr(1));
        groups.join("workers".into(), addr(2));
        let mut members = groups.members("workers");
        members.sort_by_key(|a| a.id);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id, 1);
    }

    #[test]
    fn test_leave_removes_membership() {
        let groups = GroupRegistry::new();
        groups.join("workers".into(), addr(1));
        groups.leave("workers", &addr(1));
        assert!(groups.members("workers").is_empty());
    }

    #[test]
    fn test_leave_all_cancels_every_subscription() {
        let groups = GroupRegistry::new();
        groups.join("a".into(), addr(1));
        groups.join("b".into(), addr(1));
        groups.join("b".into(), addr(2));
        groups.leave_all(&addr(1));
        assert!(groups.members("a").is_empty());
        assert_eq!(groups.members("b").len(), 1);
    }
}
