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

//! Identifier allocation and the running-actor barrier
//!
//! ## Purpose
//! Hands out actor ids strictly monotonically starting at 1, allocates
//! request ids for synchronous messaging, and tracks how many actors are
//! currently running so shutdown code can await a target count.
//!
//! ## Barrier semantics
//! `await_running_equal(n)` resolves when the counter equals `n` at the
//! moment of observation. Every transition wakes all waiters; each waiter
//! re-checks its own target, so waiters for different targets coexist and
//! spurious wakeups are harmless.

use std::pin::pin;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::Notify;

use crate::node::ActorId;

/// Process-wide id allocation and running-actor accounting.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_actor_id: AtomicU32,
    next_request_id: AtomicU64,
    running: AtomicUsize,
    changed: Notify,
}

impl IdAllocator {
    /// Create a fresh allocator. Ids start at 1; the running count at 0.
    pub fn new() -> Self {
        IdAllocator::default()
    }

    /// Next free actor id. Strictly monotonic, first value 1.
    pub fn next_id(&self) -> ActorId {
        self.next_actor_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Next free 62-bit request id, first value 1.
    pub fn next_request_id(&self) -> u64 {
        (self.next_request_id.fetch_add(1, Ordering::Relaxed) + 1) & ((1 << 62) - 1)
    }

    /// Increase the running-actors count by one.
    pub fn inc_running(&self) {
        self.running.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    /// Decrease the running-actors count by one.
    pub fn dec_running(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    /// Current running-actors count.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolve once the running count equals `expected`.
    ///
    /// The count may change again immediately after this returns; the
    /// guarantee is only that it was `expected` at the moment of return.
    pub async fn await_running_equal(&self, expected: usize) {
        loop {
            // Arm the wakeup before checking, so a transition between the
            // check and the await cannot be missed.
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();
            if self.running.load(Ordering::SeqCst) == expected {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_ids_start_at_one_and_are_monotonic() {
        let alloc = IdAllocator::new();
        assert_eq!(alloc.next_id(), 1);
        assert_eq!(alloc.next_id(), 2);
        assert_eq!(alloc.next_id(), 3);
    }

    #[test]
    fn test_request_ids_fit_62_bits() {
        let alloc = IdAllocator::new();
        let rid = alloc.next_request_id();
        assert_eq!(rid, 1);
        assert!(alloc.next_request_id() < (1 << 62));
    }

    #[test]
    fn test_running_counter() {
        let alloc = IdAllocator::new();
        assert_eq!(alloc.running(), 0);
        alloc.inc_running();
        alloc.inc_running();
        assert_eq!(alloc.running(), 2);
        alloc.dec_running();
        assert_eq!(alloc.running(), 1);
    }

    #[tokio::test]
    async fn test_await_running_equal_resolves_immediately_on_match() {
        let alloc = IdAllocator::new();
        alloc.await_running_equal(0).await;
    }

    #[tokio::test]
    async fn test_await_running_equal_wakes_on_transition() {
        let alloc = Arc::new(IdAllocator::new());
        alloc.inc_running();

        let waiter = {
            let alloc = Arc::clone(&alloc);
            tokio::spawn(async move { alloc.await_running_equal(0).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        alloc.dec_running();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("barrier must resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_multiple_waiters_different_targets() {
        let alloc = Arc::new(IdAllocator::new());
        let wait_one = {
            let alloc = Arc::clone(&alloc);
            tokio::spawn(async move { alloc.await_running_equal(1).await })
        };
        let wait_two = {
            let alloc = Arc::clone(&alloc);
            tokio::spawn(async move { alloc.await_running_equal(2).await })
        };

        alloc.inc_running();
        tokio::time::timeout(Duration::from_secs(1), wait_one)
            .await
            .expect("first waiter resolves")
            .unwrap();

        alloc.inc_running();
        tokio::time::timeout(Duration::from_secs(1), wait_two)
            .await
            .expect("second waiter resolves")
            .unwrap();
    }
}
