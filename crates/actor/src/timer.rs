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

//! The delayed-send scheduler
//!
//! ## Purpose
//! Delivers envelopes after a relative delay, on the original sender's
//! behalf. A min-heap keyed by absolute deadline feeds a dedicated task
//! that sleeps until the earliest deadline, pops everything expired and
//! routes it. Entries with equal deadlines fire in scheduling order.
//!
//! Also carries the timeout control messages of `timed_sync_send`.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use axon_core::Envelope;

use crate::system::ActorSystem;

struct Entry {
    deadline: Instant,
    seq: u64,
    env: Envelope,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of pending delayed sends plus the wakeup for its driver task.
#[derive(Default)]
pub struct DelayedSender {
    heap: Mutex<BinaryHeap<Reverse<Entry>>>,
    seq: AtomicU64,
    changed: Notify,
}

impl DelayedSender {
    pub(crate) fn new() -> Self {
        DelayedSender::default()
    }

    /// Schedule `env` for delivery after `delay`.
    pub fn schedule(&self, delay: Duration, env: Envelope) {
        let entry = Entry {
            deadline: Instant::now() + delay,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            env,
        };
        {
            let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
            heap.push(Reverse(entry));
        }
        self.changed.notify_one();
    }

    /// Number of not-yet-fired entries.
    pub fn pending(&self) -> usize {
        let heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        heap.len()
    }

    fn next_deadline(&self) -> Option<Instant> {
        let heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        heap.peek().map(|Reverse(entry)| entry.deadline)
    }

    fn pop_due(&self, now: Instant) -> Vec<Envelope> {
        let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = heap.peek() {
            if entry.deadline > now {
                break;
            }
            let Some(Reverse(entry)) = heap.pop() else {
                break;
            };
            due.push(entry.env);
        }
        due
    }

    /// Driver loop. Runs until the owning system is dropped.
    pub(crate) async fn run(self: std::sync::Arc<Self>, system: Weak<ActorSystem>) {
        loop {
            match self.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        _ = self.changed.notified() => {}
                        _ = tokio::time::sleep_until(deadline) => {
                            let Some(system) = system.upgrade() else { return };
                            for env in self.pop_due(Instant::now()) {
                                if let Err(err) = system.route(env) {
                                    debug!(%err, "delayed send dropped");
                                }
                            }
                        }
                    }
                }
                None => self.changed.notified().await,
            }
            if system.strong_count() == 0 {
                return;
            }
        }
    }
}
