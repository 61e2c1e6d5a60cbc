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

//! The actor registry
//!
//! ## Purpose
//! Maps actor ids to live references while the actor runs and to the final
//! exit reason afterwards. Entries survive termination, so "has this actor
//! ever exited, and why" stays answerable for the process lifetime; they are
//! small and bounded by the number of spawns.
//!
//! ## Invariants
//! - live entry: reference present, reason [`ExitReason::INVALID`]
//! - exited entry: reference absent, reason non-invalid
//! - live → exited is a one-way transition; the first recorded reason wins

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::actor_trait::AbstractActor;
use crate::exit::ExitReason;
use crate::node::ActorId;

struct Entry {
    actor: Option<Arc<dyn AbstractActor>>,
    reason: ExitReason,
}

/// Process-wide map from actor id to live reference or exit reason.
#[derive(Default)]
pub struct ActorRegistry {
    entries: RwLock<HashMap<ActorId, Entry>>,
}

impl ActorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ActorRegistry::default()
    }

    /// Insert a live entry for `id`. A duplicate put is ignored; the first
    /// registration wins.
    pub fn put(&self, id: ActorId, actor: Arc<dyn AbstractActor>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(&id) {
            warn!(actor_id = id, "duplicate registry put ignored");
            return;
        }
        entries.insert(
            id,
            Entry {
                actor: Some(actor),
                reason: ExitReason::INVALID,
            },
        );
    }

    /// Record that `id` terminated with `reason` and drop the reference.
    ///
    /// Idempotent for a repeated identical reason; a conflicting reason is
    /// ignored and logged, the first one wins.
    ///
    /// ## Panics
    /// Debug builds assert `reason` is not [`ExitReason::INVALID`].
    pub fn erase(&self, id: ActorId, reason: ExitReason) {
        debug_assert!(!reason.is_invalid(), "erase requires a real exit reason");
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(&id) {
            Some(entry) => {
                if entry.reason.is_invalid() {
                    entry.actor = None;
                    entry.reason = reason;
                } else if entry.reason != reason {
                    warn!(
                        actor_id = id,
                        recorded = %entry.reason,
                        conflicting = %reason,
                        "conflicting exit reason ignored"
                    );
                }
            }
            None => {
                // Exit recorded for an id that was never put; keep the
                // reason so get_entry stays truthful.
                entries.insert(
                    id,
                    Entry {
                        actor: None,
                        reason,
                    },
                );
            }
        }
    }

    /// Live reference for `id`, or `None` if unknown or already exited.
    pub fn get(&self, id: ActorId) -> Option<Arc<dyn AbstractActor>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&id).and_then(|entry| entry.actor.clone())
    }

    /// Both fields of the entry for `id`.
    ///
    /// `(None, INVALID)` means the id was never registered; `(None, r)` with
    /// a non-invalid `r` means the actor exited with `r`.
    pub fn get_entry(&self, id: ActorId) -> (Option<Arc<dyn AbstractActor>>, ExitReason) {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(&id) {
            Some(entry) => (entry.actor.clone(), entry.reason),
            None => (None, ExitReason::INVALID),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Envelope;
    use crate::node::{ActorAddress, NodeId, HOST_ID_SIZE};

    struct FakeActor {
        addr: ActorAddress,
    }

    impl AbstractActor for FakeActor {
        fn address(&self) -> ActorAddress {
            self.addr
        }

        fn enqueue(&self, _env: Envelope) {}
    }

    fn fake(id: ActorId) -> Arc<dyn AbstractActor> {
        Arc::new(FakeActor {
            addr: ActorAddress::new(id, NodeId::new(1, [0; HOST_ID_SIZE])),
        })
    }

    #[test]
    fn test_put_then_get() {
        let registry = ActorRegistry::new();
        registry.put(1, fake(1));
        assert!(registry.get(1).is_some());
        assert!(registry.get(2).is_none());
    }

    #[test]
    fn test_duplicate_put_keeps_first() {
        let registry = ActorRegistry::new();
        registry.put(1, fake(1));
        let first = registry.get(1).unwrap();
        registry.put(1, fake(1));
        let after = registry.get(1).unwrap();
        assert!(Arc::ptr_eq(&first, &after));
    }

    #[test]
    fn test_erase_records_reason() {
        let registry = ActorRegistry::new();
        registry.put(1, fake(1));
        registry.erase(1, ExitReason::NORMAL);
        assert!(registry.get(1).is_none());
        let (actor, reason) = registry.get_entry(1);
        assert!(actor.is_none());
        assert_eq!(reason, ExitReason::NORMAL);
    }

    #[test]
    fn test_erase_first_reason_wins() {
        let registry = ActorRegistry::new();
        registry.put(1, fake(1));
        registry.erase(1, ExitReason::user_defined(1));
        registry.erase(1, ExitReason::NORMAL);
        let (_, reason) = registry.get_entry(1);
        assert_eq!(reason, ExitReason::user_defined(1));
    }

    #[test]
    fn test_never_existed_vs_exited() {
        let registry = ActorRegistry::new();
        let (actor, reason) = registry.get_entry(99);
        assert!(actor.is_none());
        assert!(reason.is_invalid());

        registry.put(1, fake(1));
        registry.erase(1, ExitReason::NORMAL);
        let (actor, reason) = registry.get_entry(1);
        assert!(actor.is_none());
        assert!(!reason.is_invalid());
    }
}
