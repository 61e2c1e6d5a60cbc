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

//! Lifecycle tests: links, monitors, exit propagation, cleanup

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use axon_actor::{Actor, ActorContext, ActorSystem, Handled};
use axon_core::{ActorAddress, Content, Envelope, ExitReason};

const TEST_REASON: ExitReason = ExitReason(0x10001);

/// Quits with the reason carried by the first message it receives.
struct QuitOnCommand;

#[async_trait]
impl Actor for QuitOnCommand {
    async fn receive(&mut self, ctx: &mut ActorContext, env: &Envelope) -> Handled {
        if let Some(code) = env.user::<u32>() {
            ctx.quit(ExitReason(code));
            return Handled::Done;
        }
        Handled::Skipped
    }
}

/// Traps exits and reports every exit/down notification it sees.
struct Watcher {
    events: mpsc::UnboundedSender<(String, ActorAddress, ExitReason)>,
    target: Option<ActorAddress>,
    links: u32,
    monitors: u32,
}

#[async_trait]
impl Actor for Watcher {
    async fn started(&mut self, ctx: &mut ActorContext) {
        ctx.set_trap_exit(true);
        if let Some(target) = self.target {
            for _ in 0..self.links {
                ctx.link(&target);
            }
            for _ in 0..self.monitors {
                ctx.monitor(&target);
            }
        }
    }

    async fn receive(&mut self, _ctx: &mut ActorContext, env: &Envelope) -> Handled {
        match &env.content {
            Content::Exit { source, reason } => {
                let _ = self.events.send(("exit".into(), *source, *reason));
                Handled::Done
            }
            Content::Down { source, reason } => {
                let _ = self.events.send(("down".into(), *source, *reason));
                Handled::Done
            }
            _ => Handled::Skipped,
        }
    }
}

async fn recv_event(
    events: &mut mpsc::UnboundedReceiver<(String, ActorAddress, ExitReason)>,
) -> (String, ActorAddress, ExitReason) {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event within deadline")
        .expect("channel open")
}

#[tokio::test]
async fn test_exit_propagates_to_non_trapping_link() {
    let system = ActorSystem::new();
    let b = system.spawn(QuitOnCommand);

    // a links to b and does not trap exits
    let b_addr = b.address();
    let a = system.spawn_fn(move |ctx, env| {
        if env.user::<String>().as_deref() == Some("link") {
            ctx.link(&b_addr);
            return Handled::Done;
        }
        Handled::Skipped
    });
    a.tell(&"link".to_string()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    b.tell(&TEST_REASON.0).unwrap();

    // both terminate with the same reason
    timeout(Duration::from_secs(5), system.await_running_equal(0))
        .await
        .expect("all actors terminate");
    let (_, reason_b) = system.registry().get_entry(b.address().id);
    let (_, reason_a) = system.registry().get_entry(a.address().id);
    assert_eq!(reason_b, TEST_REASON);
    assert_eq!(reason_a, TEST_REASON);
}

#[tokio::test]
async fn test_trapping_link_receives_exit_message_and_survives() {
    let system = ActorSystem::new();
    let b = system.spawn(QuitOnCommand);
    let (events, mut rx) = mpsc::unbounded_channel();
    let a = system.spawn(Watcher {
        events,
        target: Some(b.address()),
        links: 1,
        monitors: 0,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    b.tell(&TEST_REASON.0).unwrap();

    let (kind, source, reason) = recv_event(&mut rx).await;
    assert_eq!(kind, "exit");
    assert_eq!(source, b.address());
    assert_eq!(reason, TEST_REASON);

    // a is still alive
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(system.registry().get(a.address().id).is_some());
}

#[tokio::test]
async fn test_link_is_idempotent() {
    let system = ActorSystem::new();
    let b = system.spawn(QuitOnCommand);
    let (events, mut rx) = mpsc::unbounded_channel();
    // three link calls must establish exactly one link
    let _a = system.spawn(Watcher {
        events,
        target: Some(b.address()),
        links: 3,
        monitors: 0,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    b.tell(&TEST_REASON.0).unwrap();

    let (kind, _, _) = recv_event(&mut rx).await;
    assert_eq!(kind, "exit");
    // no second exit message arrives
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_unlink_cancels_propagation() {
    let system = ActorSystem::new();
    let b = system.spawn(QuitOnCommand);
    let b_addr = b.address();
    let (events, mut rx) = mpsc::unbounded_channel::<(String, ActorAddress, ExitReason)>();
    let probe = events.clone();
    let a = system.spawn_fn(move |ctx, env| {
        match env.user::<String>().as_deref() {
            Some("link") => ctx.link(&b_addr),
            Some("unlink") => ctx.unlink(&b_addr),
            Some("alive?") => {
                let _ = probe.send(("alive".into(), ctx.self_address(), ExitReason::NORMAL));
            }
            _ => return Handled::Skipped,
        }
        Handled::Done
    });
    a.tell(&"link".to_string()).unwrap();
    a.tell(&"unlink".to_string()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    b.tell(&TEST_REASON.0).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // a survived: the link was dissolved before b terminated
    a.tell(&"alive?".to_string()).unwrap();
    let (kind, source, _) = recv_event(&mut rx).await;
    assert_eq!(kind, "alive");
    assert_eq!(source, a.address());
    let _ = events;
}

#[tokio::test]
async fn test_normal_exit_message_is_ignored_without_trap() {
    let system = ActorSystem::new();
    let (events, mut rx) = mpsc::unbounded_channel::<(String, ActorAddress, ExitReason)>();
    let probe = events.clone();
    let a = system.spawn_fn(move |ctx, env| {
        if env.user::<String>().as_deref() == Some("alive?") {
            let _ = probe.send(("alive".into(), ctx.self_address(), ExitReason::NORMAL));
            return Handled::Done;
        }
        Handled::Skipped
    });
    system.send_exit(&a.address(), ExitReason::NORMAL).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    a.tell(&"alive?".to_string()).unwrap();
    let (kind, _, _) = recv_event(&mut rx).await;
    assert_eq!(kind, "alive");
    let _ = events;
}

#[tokio::test]
async fn test_monitor_fan_out_one_down_per_registration() {
    let system = ActorSystem::new();
    let t = system.spawn(QuitOnCommand);
    let (events, mut rx) = mpsc::unbounded_channel();
    let _o = system.spawn(Watcher {
        events,
        target: Some(t.address()),
        links: 0,
        monitors: 3,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    t.tell(&TEST_REASON.0).unwrap();

    for _ in 0..3 {
        let (kind, source, reason) = recv_event(&mut rx).await;
        assert_eq!(kind, "down");
        assert_eq!(source, t.address());
        assert_eq!(reason, TEST_REASON);
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err(), "exactly three down messages");
}

#[tokio::test]
async fn test_monitoring_a_dead_actor_reports_recorded_reason() {
    let system = ActorSystem::new();
    let t = system.spawn(QuitOnCommand);
    t.tell(&TEST_REASON.0).unwrap();
    timeout(Duration::from_secs(5), system.await_running_equal(0))
        .await
        .expect("target terminates");

    let (events, mut rx) = mpsc::unbounded_channel();
    let _o = system.spawn(Watcher {
        events,
        target: Some(t.address()),
        links: 0,
        monitors: 1,
    });
    let (kind, source, reason) = recv_event(&mut rx).await;
    assert_eq!(kind, "down");
    assert_eq!(source, t.address());
    assert_eq!(reason, TEST_REASON);
}

#[tokio::test]
async fn test_on_exit_can_cancel_termination() {
    struct DiesTwice {
        events: mpsc::UnboundedSender<String>,
        revived: bool,
    }

    #[async_trait]
    impl Actor for DiesTwice {
        async fn receive(&mut self, ctx: &mut ActorContext, env: &Envelope) -> Handled {
            if env.user::<String>().as_deref() == Some("die") {
                ctx.quit(TEST_REASON);
                return Handled::Done;
            }
            Handled::Skipped
        }

        async fn on_exit(&mut self, ctx: &mut ActorContext, _reason: ExitReason) {
            if !self.revived {
                self.revived = true;
                let _ = self.events.send("revived".into());
                let events = self.events.clone();
                ctx.become_push(axon_actor::Behavior::new(move |ctx, env| {
                    if env.user::<String>().as_deref() == Some("die") {
                        let _ = events.send("dying for real".into());
                        ctx.quit(ExitReason(0x10002));
                        return Handled::Done;
                    }
                    Handled::Skipped
                }));
            }
        }
    }

    let system = ActorSystem::new();
    let (events, mut rx) = mpsc::unbounded_channel();
    let a = system.spawn(DiesTwice {
        events,
        revived: false,
    });

    a.tell(&"die".to_string()).unwrap();
    assert_eq!(
        timeout(Duration::from_secs(5), rx.recv()).await.unwrap(),
        Some("revived".to_string())
    );

    a.tell(&"die".to_string()).unwrap();
    assert_eq!(
        timeout(Duration::from_secs(5), rx.recv()).await.unwrap(),
        Some("dying for real".to_string())
    );
    timeout(Duration::from_secs(5), system.await_running_equal(0))
        .await
        .expect("actor terminates after second quit");
    let (_, reason) = system.registry().get_entry(a.address().id);
    assert_eq!(reason, ExitReason(0x10002));
}

#[tokio::test]
async fn test_panicking_handler_terminates_with_unhandled_exception() {
    let system = ActorSystem::new();
    let a = system.spawn_fn(|_ctx, env| {
        if env.user::<String>().as_deref() == Some("boom") {
            panic!("intentional test panic");
        }
        Handled::Skipped
    });
    a.tell(&"boom".to_string()).unwrap();

    timeout(Duration::from_secs(5), system.await_running_equal(0))
        .await
        .expect("actor terminates");
    let (_, reason) = system.registry().get_entry(a.address().id);
    assert_eq!(reason, ExitReason::UNHANDLED_EXCEPTION);
}

#[tokio::test]
async fn test_spawn_linked_propagates_child_failure() {
    struct Parent {
        events: mpsc::UnboundedSender<(String, ActorAddress, ExitReason)>,
    }

    #[async_trait]
    impl Actor for Parent {
        async fn started(&mut self, ctx: &mut ActorContext) {
            ctx.set_trap_exit(true);
            let child = ctx.spawn_linked(QuitOnCommand);
            child.tell(&TEST_REASON.0).unwrap();
        }

        async fn receive(&mut self, _ctx: &mut ActorContext, env: &Envelope) -> Handled {
            if let Content::Exit { source, reason } = &env.content {
                let _ = self.events.send(("exit".into(), *source, *reason));
                return Handled::Done;
            }
            Handled::Skipped
        }
    }

    let system = ActorSystem::new();
    let (events, mut rx) = mpsc::unbounded_channel();
    let _parent = system.spawn(Parent { events });

    let (kind, _, reason) = recv_event(&mut rx).await;
    assert_eq!(kind, "exit");
    assert_eq!(reason, TEST_REASON);
}

#[tokio::test]
async fn test_running_count_tracks_spawn_and_exit() {
    let system = ActorSystem::new();
    assert_eq!(system.running(), 0);
    let a = system.spawn(QuitOnCommand);
    let b = system.spawn(QuitOnCommand);
    assert_eq!(system.running(), 2);

    a.tell(&TEST_REASON.0).unwrap();
    b.tell(&TEST_REASON.0).unwrap();
    timeout(Duration::from_secs(5), system.await_running_equal(0))
        .await
        .expect("barrier resolves at zero");
}
