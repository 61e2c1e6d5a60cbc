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

//! Synchronous request/response tests: correlation, failure, timeout

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use axon_actor::{Actor, ActorContext, ActorSystem, Handled};
use axon_core::{ActorAddress, Envelope, ExitReason};

/// Replies to every numeric request with its double.
struct Doubler;

#[async_trait]
impl Actor for Doubler {
    async fn receive(&mut self, ctx: &mut ActorContext, env: &Envelope) -> Handled {
        if let Some(n) = env.user::<u32>() {
            let _ = ctx.reply(&(n * 2));
            return Handled::Done;
        }
        Handled::Skipped
    }
}

/// Never replies; requests sent here age until their timeout.
struct BlackHole;

#[async_trait]
impl Actor for BlackHole {
    async fn receive(&mut self, _ctx: &mut ActorContext, _env: &Envelope) -> Handled {
        Handled::Done
    }
}

#[tokio::test]
async fn test_sync_send_correlates_response() {
    struct Requester {
        target: ActorAddress,
        events: mpsc::UnboundedSender<(u64, u64, u32)>,
    }

    #[async_trait]
    impl Actor for Requester {
        async fn started(&mut self, ctx: &mut ActorContext) {
            let rid = ctx.sync_send(&self.target, &1u32).expect("request routed");
            let events = self.events.clone();
            ctx.expect_response(rid, move |ctx, env| {
                let seen_rid = ctx
                    .current_header()
                    .map(|h| h.id.request_id())
                    .unwrap_or_default();
                let _ = events.send((rid, seen_rid, env.user::<u32>().unwrap_or_default()));
            });
        }

        async fn receive(&mut self, _ctx: &mut ActorContext, _env: &Envelope) -> Handled {
            Handled::Skipped
        }
    }

    let system = ActorSystem::new();
    let doubler = system.spawn(Doubler);
    let (events, mut rx) = mpsc::unbounded_channel();
    let requester = system.spawn(Requester {
        target: doubler.address(),
        events,
    });

    let (rid, seen_rid, value) = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("response within deadline")
        .expect("channel open");
    assert_eq!(rid, seen_rid, "handler runs for the matching request id");
    assert_eq!(value, 2);

    // the requester survived: the response found its pending entry
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(system.registry().get(requester.address().id).is_some());
}

#[tokio::test]
async fn test_response_without_handler_quits_with_sync_failure() {
    struct Requester {
        target: ActorAddress,
    }

    #[async_trait]
    impl Actor for Requester {
        async fn started(&mut self, ctx: &mut ActorContext) {
            // request sent, but no response handler installed
            let _ = ctx.sync_send(&self.target, &1u32);
        }

        async fn receive(&mut self, _ctx: &mut ActorContext, _env: &Envelope) -> Handled {
            Handled::Skipped
        }
    }

    let system = ActorSystem::new();
    let doubler = system.spawn(Doubler);
    let requester = system.spawn(Requester {
        target: doubler.address(),
    });

    timeout(Duration::from_secs(5), async {
        loop {
            let (_, reason) = system.registry().get_entry(requester.address().id);
            if !reason.is_invalid() {
                break reason;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map(|reason| assert_eq!(reason, ExitReason::UNHANDLED_SYNC_FAILURE))
    .expect("requester terminates");
}

#[tokio::test]
async fn test_timed_sync_send_default_timeout_quits() {
    struct Requester {
        target: ActorAddress,
    }

    #[async_trait]
    impl Actor for Requester {
        async fn started(&mut self, ctx: &mut ActorContext) {
            let rid = ctx
                .timed_sync_send(&self.target, &"work".to_string(), Duration::from_millis(50))
                .expect("request routed");
            ctx.expect_response(rid, |_ctx, _env| {
                panic!("no response can arrive from the black hole");
            });
        }

        async fn receive(&mut self, _ctx: &mut ActorContext, _env: &Envelope) -> Handled {
            Handled::Skipped
        }
    }

    let system = ActorSystem::new();
    let hole = system.spawn(BlackHole);
    let requester = system.spawn(Requester {
        target: hole.address(),
    });

    timeout(Duration::from_secs(5), async {
        loop {
            let (_, reason) = system.registry().get_entry(requester.address().id);
            if !reason.is_invalid() {
                break reason;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map(|reason| assert_eq!(reason, ExitReason::UNHANDLED_SYNC_TIMEOUT))
    .expect("requester times out and terminates");
}

#[tokio::test]
async fn test_timed_sync_send_invokes_timeout_hook() {
    struct Requester {
        target: ActorAddress,
        events: mpsc::UnboundedSender<u64>,
    }

    #[async_trait]
    impl Actor for Requester {
        async fn started(&mut self, ctx: &mut ActorContext) {
            let _ = ctx.timed_sync_send(&self.target, &"work".to_string(), Duration::from_millis(50));
        }

        async fn receive(&mut self, _ctx: &mut ActorContext, _env: &Envelope) -> Handled {
            Handled::Skipped
        }

        async fn on_sync_timeout(&mut self, _ctx: &mut ActorContext, request_id: u64) -> bool {
            let _ = self.events.send(request_id);
            true
        }
    }

    let system = ActorSystem::new();
    let hole = system.spawn(BlackHole);
    let (events, mut rx) = mpsc::unbounded_channel();
    let requester = system.spawn(Requester {
        target: hole.address(),
        events,
    });

    let rid = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timeout hook fires")
        .expect("channel open");
    assert!(rid > 0);

    // the hook handled the timeout; the requester is still alive
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(system.registry().get(requester.address().id).is_some());
}

#[tokio::test]
async fn test_response_that_arrives_first_cancels_timeout() {
    struct Requester {
        target: ActorAddress,
        events: mpsc::UnboundedSender<u32>,
    }

    #[async_trait]
    impl Actor for Requester {
        async fn started(&mut self, ctx: &mut ActorContext) {
            let rid = ctx
                .timed_sync_send(&self.target, &21u32, Duration::from_secs(2))
                .expect("request routed");
            let events = self.events.clone();
            ctx.expect_response(rid, move |_ctx, env| {
                let _ = events.send(env.user::<u32>().unwrap_or_default());
            });
        }

        async fn receive(&mut self, _ctx: &mut ActorContext, _env: &Envelope) -> Handled {
            Handled::Skipped
        }

        async fn on_sync_timeout(&mut self, _ctx: &mut ActorContext, _request_id: u64) -> bool {
            panic!("timeout must not fire after the response arrived");
        }
    }

    let system = ActorSystem::new();
    let doubler = system.spawn(Doubler);
    let (events, mut rx) = mpsc::unbounded_channel();
    let requester = system.spawn(Requester {
        target: doubler.address(),
        events,
    });

    let value = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("response within deadline")
        .expect("channel open");
    assert_eq!(value, 42);

    // wait past the timeout deadline; the actor must still be alive
    tokio::time::sleep(Duration::from_millis(2200)).await;
    assert!(system.registry().get(requester.address().id).is_some());
}

#[tokio::test]
async fn test_stray_response_is_dropped_not_fatal() {
    use axon_core::{Content, MessageHeader, MessageId, Payload};

    let system = ActorSystem::new();
    let (events, mut rx) = mpsc::unbounded_channel::<String>();
    let probe = events.clone();
    let a = system.spawn_fn(move |_ctx, env| {
        if env.user::<String>().as_deref() == Some("alive?") {
            let _ = probe.send("alive".into());
            return Handled::Done;
        }
        Handled::Skipped
    });

    // a response nobody asked for
    let header = MessageHeader::new(ActorAddress::invalid(system.node()), a.address())
        .with_id(MessageId::request(12345).as_response());
    a.enqueue(Envelope::new(
        header,
        Content::User(Payload::encode(&7u32).unwrap()),
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    a.tell(&"alive?".to_string()).unwrap();
    let answer = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("probe answer")
        .expect("channel open");
    assert_eq!(answer, "alive");
    let _ = events;
}
