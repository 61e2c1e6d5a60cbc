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

//! Per-actor mailbox
//!
//! ## Purpose
//! A single-consumer, multi-producer FIFO of envelopes. Producers enqueue
//! from any thread without blocking; the owning actor pops, awaiting when
//! empty. Two internal segments implement the two delivery priorities: the
//! high segment always drains before the normal one, and each segment is
//! FIFO, which preserves per-producer ordering within a priority.
//!
//! ## Close semantics
//! After `close()` returns, no further envelope reaches the consumer:
//! later enqueues discard their envelope, and both dequeue forms report the
//! mailbox as closed even if segments still hold elements. Whatever remains
//! is recovered with `drain()` during actor cleanup and dropped there.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use axon_core::{Envelope, MessagePriority};

#[derive(Default)]
struct Segments {
    high: VecDeque<Envelope>,
    normal: VecDeque<Envelope>,
}

impl Segments {
    fn pop(&mut self) -> Option<Envelope> {
        self.high.pop_front().or_else(|| self.normal.pop_front())
    }

    fn len(&self) -> usize {
        self.high.len() + self.normal.len()
    }
}

/// Single-consumer, multi-producer FIFO mailbox.
#[derive(Default)]
pub struct Mailbox {
    segments: Mutex<Segments>,
    notify: Notify,
    closed: AtomicBool,
}

impl Mailbox {
    /// Create an empty, open mailbox.
    pub fn new() -> Self {
        Mailbox::default()
    }

    /// Enqueue an envelope. Never blocks; after `close()` the envelope is
    /// dropped instead.
    pub fn enqueue(&self, env: Envelope) {
        if self.closed.load(Ordering::Acquire) {
            metrics::counter!("axon_mailbox_discarded_total").increment(1);
            return;
        }
        {
            let mut segments = self.segments.lock().unwrap_or_else(|e| e.into_inner());
            match env.header.priority {
                MessagePriority::High => segments.high.push_back(env),
                MessagePriority::Normal => segments.normal.push_back(env),
            }
        }
        self.notify.notify_one();
    }

    /// Pop the next envelope without waiting.
    pub fn try_dequeue(&self) -> Option<Envelope> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let mut segments = self.segments.lock().unwrap_or_else(|e| e.into_inner());
        segments.pop()
    }

    /// Pop the next envelope, awaiting until one is available.
    ///
    /// Resolves to `None` once the mailbox is closed.
    pub async fn dequeue(&self) -> Option<Envelope> {
        loop {
            // Arm the wakeup before checking, so an enqueue between the
            // check and the await is not lost.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(env) = self.try_dequeue() {
                return Some(env);
            }
            notified.await;
        }
    }

    /// Close the mailbox. Subsequent enqueues discard their envelope; a
    /// consumer awaiting in `dequeue` wakes up with `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Remove and return everything still queued. Used during actor
    /// cleanup to destroy leftover elements; bypasses the closed check.
    pub fn drain(&self) -> Vec<Envelope> {
        let mut segments = self.segments.lock().unwrap_or_else(|e| e.into_inner());
        let mut drained: Vec<Envelope> = segments.high.drain(..).collect();
        drained.extend(segments.normal.drain(..));
        drained
    }

    /// Number of queued envelopes.
    pub fn len(&self) -> usize {
        let segments = self.segments.lock().unwrap_or_else(|e| e.into_inner());
        segments.len()
    }

    /// Whether no envelope is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axon_core::{
        ActorAddress, Content, Envelope, MessageHeader, MessagePriority, NodeId, Payload,
        HOST_ID_SIZE,
    };

    use super::*;

    fn envelope(sender: u32, tag: u32, priority: MessagePriority) -> Envelope {
        let node = NodeId::new(1, [0; HOST_ID_SIZE]);
        let header = MessageHeader::new(
            ActorAddress::new(sender, node),
            ActorAddress::new(999, node),
        )
        .with_priority(priority);
        Envelope::new(header, Content::User(Payload::encode(&tag).unwrap()))
    }

    #[test]
    fn test_fifo_order_single_producer() {
        let mailbox = Mailbox::new();
        for tag in 0..10u32 {
            mailbox.enqueue(envelope(1, tag, MessagePriority::Normal));
        }
        for tag in 0..10u32 {
            let env = mailbox.try_dequeue().expect("queued");
            assert_eq!(env.user::<u32>(), Some(tag));
        }
        assert!(mailbox.try_dequeue().is_none());
    }

    #[test]
    fn test_high_priority_overtakes_normal() {
        let mailbox = Mailbox::new();
        mailbox.enqueue(envelope(1, 1, MessagePriority::Normal));
        mailbox.enqueue(envelope(1, 2, MessagePriority::High));
        assert_eq!(mailbox.try_dequeue().unwrap().user::<u32>(), Some(2));
        assert_eq!(mailbox.try_dequeue().unwrap().user::<u32>(), Some(1));
    }

    #[test]
    fn test_close_discards_later_enqueues() {
        let mailbox = Mailbox::new();
        mailbox.enqueue(envelope(1, 1, MessagePriority::Normal));
        mailbox.close();
        mailbox.enqueue(envelope(1, 2, MessagePriority::Normal));
        // nothing reaches the consumer after close
        assert!(mailbox.try_dequeue().is_none());
        // the element enqueued before close is recoverable by drain only
        assert_eq!(mailbox.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_dequeue_awaits_enqueue() {
        let mailbox = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            tokio::spawn(async move { mailbox.dequeue().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        mailbox.enqueue(envelope(1, 42, MessagePriority::Normal));
        let env = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("dequeue resolves")
            .unwrap()
            .expect("envelope delivered");
        assert_eq!(env.user::<u32>(), Some(42));
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_close() {
        let mailbox = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            tokio::spawn(async move { mailbox.dequeue().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        mailbox.close();
        let popped = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("dequeue resolves")
            .unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_per_producer_fifo_under_contention() {
        let mailbox = Arc::new(Mailbox::new());
        const PRODUCERS: u32 = 8;
        const PER_PRODUCER: u32 = 1000;

        let mut producers = Vec::new();
        for producer in 0..PRODUCERS {
            let mailbox = Arc::clone(&mailbox);
            producers.push(tokio::spawn(async move {
                for seq in 0..PER_PRODUCER {
                    mailbox.enqueue(envelope(producer + 1, seq, MessagePriority::Normal));
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }

        let mut last_seen = vec![None::<u32>; PRODUCERS as usize + 2];
        let mut total = 0;
        while let Some(env) = mailbox.try_dequeue() {
            let producer = env.header.sender.id as usize;
            let seq = env.user::<u32>().unwrap();
            if let Some(prev) = last_seen[producer] {
                assert!(seq > prev, "per-producer order violated");
            }
            last_seen[producer] = Some(seq);
            total += 1;
        }
        assert_eq!(total, PRODUCERS * PER_PRODUCER);
    }
}
