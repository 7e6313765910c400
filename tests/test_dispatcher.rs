// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 tinybus contributors
//
// Black-box integration tests against the public API: the seed scenarios
// and testable properties (P1-P5, R1-R4, B1-B4).

use std::cell::RefCell;
use std::rc::Rc;

use tinybus::{Actor, ActorRef, DataType, Dispatcher, PsError, PublishCap, TopicHash};

struct FixedHost {
    tick: i32,
    restarts: RefCell<Vec<i32>>,
}

impl FixedHost {
    fn new(tick: i32) -> Self {
        Self { tick, restarts: RefCell::new(Vec::new()) }
    }
}

impl tinybus::TimerHost for FixedHost {
    fn restart_timer(&mut self, timeout_ms: i32) {
        self.restarts.borrow_mut().push(timeout_ms);
    }
    fn timer_tick_ms(&self) -> i32 {
        self.tick
    }
}

struct Spy {
    label: &'static str,
    received: RefCell<Vec<(TopicHash, Vec<u8>, DataType)>>,
}

impl Spy {
    fn new(label: &'static str) -> Rc<Self> {
        Rc::new(Self { label, received: RefCell::new(Vec::new()) })
    }
}

impl Actor for Spy {
    fn handle(
        &self,
        _cap: &mut dyn PublishCap,
        hash: TopicHash,
        payload: &[u8],
        dtype: DataType,
    ) -> Option<&'static str> {
        self.received.borrow_mut().push((hash, payload.to_vec(), dtype));
        Some(self.label)
    }
}

type Bus = Dispatcher<16, 4, 48, 48, 32, 512>;

fn bus(tick: i32) -> Bus {
    Bus::new(FixedHost::new(tick))
}

// -- seed scenario 1: basic pub/sub -----------------------------------------

#[test]
fn seed_basic_pub_sub() {
    let mut b = bus(0);
    let p: ActorRef = Spy::new("P");
    let s = Spy::new("S");

    let hash = b
        .register_topic_publisher(p.clone(), DataType::Bool, ".demo.bool", "", false)
        .unwrap();
    b.subscribe_single(".demo.bool", DataType::Bool, s.clone()).unwrap();

    b.publish(&p, hash, &[1u8]).unwrap();
    assert_eq!(b.waiting_events(), 1);
    assert_eq!(b.loop_once(), 1);
    assert_eq!(b.waiting_events(), 0);

    let got = s.received.borrow();
    assert_eq!(got.as_slice(), &[(hash, vec![1u8], DataType::Bool)]);
}

// -- seed scenario 2: sticky replay ------------------------------------------

#[test]
fn seed_sticky_replay_on_late_subscribe() {
    let mut b = bus(0);
    let p: ActorRef = Spy::new("P");
    let hash = b
        .register_topic_publisher(p.clone(), DataType::Bool, ".demo.sticky", "", true)
        .unwrap();
    b.publish(&p, hash, &[1u8]).unwrap();
    b.loop_once();

    let s = Spy::new("S");
    let (got_hash, snapshot) = b.subscribe_single(".demo.sticky", DataType::Bool, s.clone()).unwrap();
    assert_eq!(got_hash, hash);
    let snap = snapshot.expect("sticky topic replays last message on subscribe");
    assert_eq!(snap.as_slice(), &[1u8]);
    assert_eq!(snap.len(), 1);
    assert_eq!(snap.dtype, DataType::Bool);
    // R2: no queue delivery from the snapshot path itself.
    assert_eq!(b.waiting_events(), 0);
    assert!(s.received.borrow().is_empty());
}

// -- seed scenario 3: redef conflict ------------------------------------------

#[test]
fn seed_redef_conflict_preserves_original_dtype() {
    let mut b = bus(0);
    b.register_topic_publisher(Spy::new("A"), DataType::U8, ".x", "", false).unwrap();
    let err = b
        .register_topic_publisher(Spy::new("B"), DataType::U16, ".x", "", false)
        .unwrap_err();
    assert_eq!(err, PsError::RedefConflict);
    let (_, dtype, _) = b.check_topic(".x").unwrap();
    assert_eq!(dtype, DataType::U8);
}

// -- seed scenario 4: topic GC with change topic ------------------------------

#[test]
fn seed_topic_gc_emits_add_then_del() {
    let mut b = bus(0);
    let watcher = Spy::new("watcher");
    b.create_and_sub_tpc_change(watcher.clone()).unwrap();

    let publisher: ActorRef = Spy::new("publisher");
    let hash = b
        .register_topic_publisher(publisher.clone(), DataType::U8, ".foo", "", false)
        .unwrap();
    b.unregister_topic_publisher(&publisher, hash).unwrap();

    assert_eq!(b.loop_once(), 1);
    assert_eq!(b.loop_once(), 1);
    assert_eq!(b.loop_once(), 0);

    let events = watcher.received.borrow();
    assert_eq!(events.len(), 2);
    let add = String::from_utf8(events[0].1.clone()).unwrap();
    let del = String::from_utf8(events[1].1.clone()).unwrap();
    assert!(add.starts_with("ADD") && add.contains(".foo"));
    assert!(del.starts_with("DEL") && del.contains(".foo"));
}

// -- seed scenario 5: periodic timer -------------------------------------------

#[test]
fn seed_periodic_timer_delivers_and_rearms() {
    let mut b = bus(100);
    let sub = Spy::new("T");
    let hash = b.create_and_sub_timer(".srv.t_ms.tick.3s", sub.clone(), "", 300).unwrap();
    b.on_tick();
    b.on_tick();
    assert_eq!(sub.received.borrow().len(), 0, "not yet expired after two 100ms ticks");
    assert_eq!(b.loop_once(), 1);
    let got = sub.received.borrow();
    assert_eq!(got.last().unwrap().0, hash);
}

// -- seed scenario 6: mute --------------------------------------------------

#[test]
fn seed_mute_suppresses_one_publisher() {
    let mut b = bus(0);
    let p1: ActorRef = Spy::new("p1");
    let p2: ActorRef = Spy::new("p2");
    let hash = b.register_topic_publisher(p1.clone(), DataType::U8, ".z", "", false).unwrap();
    b.register_topic_publisher(p2.clone(), DataType::U8, ".z", "", false).unwrap();
    let sub = Spy::new("sub");
    b.subscribe_single(".z", DataType::U8, sub.clone()).unwrap();

    b.mute_by_hash(&p1, hash, true).unwrap();
    b.publish(&p1, hash, &[1]).unwrap();
    b.publish(&p2, hash, &[2]).unwrap();
    assert_eq!(b.waiting_events(), 1);
    b.loop_once();
    let got = sub.received.borrow();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].1, vec![2]);
}

// -- R3: duplicate publisher registration -------------------------------------

#[test]
fn r3_duplicate_publisher_rejected_idempotently() {
    let mut b = bus(0);
    let p = Spy::new("p");
    let (hash, _dtype) = {
        let h = b.register_topic_publisher(p.clone(), DataType::U8, ".dup", "", false).unwrap();
        (h, DataType::U8)
    };
    assert_eq!(
        b.register_topic_publisher(p.clone(), DataType::U8, ".dup", "", false).unwrap_err(),
        PsError::Duplicated
    );
    assert_eq!(
        b.register_topic_publisher(p, DataType::U8, ".dup", "", false).unwrap_err(),
        PsError::Duplicated
    );
    assert!(b.check_topic_by_hash(hash).is_ok());
}

// -- R4: mute toggled on then off restores delivery exactly -------------------

#[test]
fn r4_mute_toggle_round_trip() {
    let mut b = bus(0);
    let p: ActorRef = Spy::new("p");
    let hash = b.register_topic_publisher(p.clone(), DataType::U8, ".r4", "", false).unwrap();
    let sub = Spy::new("sub");
    b.subscribe_single(".r4", DataType::U8, sub.clone()).unwrap();

    b.mute(&p, ".r4", true).unwrap();
    b.publish(&p, hash, &[1]).unwrap();
    assert_eq!(b.waiting_events(), 0);

    b.mute(&p, ".r4", false).unwrap();
    b.publish(&p, hash, &[2]).unwrap();
    assert_eq!(b.loop_once(), 1);
    assert_eq!(sub.received.borrow().last().unwrap().1, vec![2]);
}

// -- B1: exactly-full queue, then recovers after one loop_once ----------------

#[test]
fn b1_full_queue_then_recovers() {
    // Each empty-payload frame costs 8 bytes: 4-byte ring header + 2-byte
    // topic hash + 2-byte length.
    let mut b = Dispatcher::<4, 4, 32, 32, 16, 8>::new(FixedHost::new(0));
    let p: ActorRef = Spy::new("p");
    let hash = b.register_topic_publisher(p.clone(), DataType::U8, ".q", "", false).unwrap();
    b.publish(&p, hash, &[]).unwrap();
    assert_eq!(b.publish(&p, hash, &[]).unwrap_err(), PsError::OutOfMemory);
    assert!(!b.has_enough_space(0));
    b.loop_once();
    assert!(b.publish(&p, hash, &[]).is_ok());
}

// -- B2: sticky snapshot clamps to MAX_PAYLOAD, queued frame keeps full length --

#[test]
fn b2_sticky_snapshot_clamped_queue_frame_not_clamped() {
    let mut b = Dispatcher::<8, 4, 32, 32, 4, 256>::new(FixedHost::new(0));
    let p: ActorRef = Spy::new("p");
    let hash = b
        .register_topic_publisher(p.clone(), DataType::ByteArray, ".big", "", true)
        .unwrap();
    let live_sub = Spy::new("live");
    b.subscribe_single(".big", DataType::ByteArray, live_sub.clone()).unwrap();

    let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
    b.publish(&p, hash, &payload).unwrap();
    b.loop_once();

    // The queued frame itself is not clamped to MAX_PAYLOAD — only the
    // sticky snapshot cached on the topic is.
    assert_eq!(live_sub.received.borrow().last().unwrap().1, payload.to_vec());

    let late_sub = Spy::new("late");
    let (_, snap) = b.subscribe_single(".big", DataType::ByteArray, late_sub.clone()).unwrap();
    let snap = snap.unwrap();
    assert_eq!(snap.len(), 4, "snapshot clamps to MAX_PAYLOAD");
    assert_eq!(snap.as_slice(), &payload[..4]);
}

// -- B3: duration_ms = 1 republishes every tick --------------------------------

#[test]
fn b3_duration_one_fires_every_tick() {
    let mut b = bus(1);
    let sub = Spy::new("t");
    b.create_and_sub_timer(".srv.t_ms.tick.fast", sub.clone(), "", 1).unwrap();
    for _ in 0..3 {
        b.on_tick();
        b.loop_once();
    }
    assert_eq!(sub.received.borrow().len(), 3);
}

// -- B4: reserved-prefix rule ---------------------------------------------------

#[test]
fn b4_timer_path_requires_reserved_prefix() {
    let mut b = bus(0);
    let err = b.create_and_sub_timer(".not.a.timer", Spy::new("t"), "", 100).unwrap_err();
    assert_eq!(err, PsError::NotFound);
}

// -- reentrancy: a publish issued from inside a handler lands next loop --------

#[test]
fn reentrant_publish_lands_on_next_loop_once() {
    struct Republisher {
        hash: TopicHash,
        actor: ActorRef,
    }
    impl Actor for Republisher {
        fn handle(
            &self,
            cap: &mut dyn PublishCap,
            _hash: TopicHash,
            _payload: &[u8],
            _dtype: DataType,
        ) -> Option<&'static str> {
            let _ = cap.enqueue(&self.actor, self.hash, &[9]);
            None
        }
    }

    let mut b = bus(0);
    let p: ActorRef = Spy::new("p");
    let hash = b.register_topic_publisher(p.clone(), DataType::U8, ".loop", "", false).unwrap();

    let republisher: ActorRef = Rc::new(Republisher { hash, actor: p.clone() });
    b.subscribe_single(".loop", DataType::U8, republisher).unwrap();
    let sub = Spy::new("sub");
    b.subscribe_single(".loop", DataType::U8, sub.clone()).unwrap();

    b.publish(&p, hash, &[1]).unwrap();
    b.loop_once();
    assert_eq!(sub.received.borrow().len(), 1, "reentrant publish not visible in current fan-out");
    assert_eq!(b.waiting_events(), 1);
    b.loop_once();
    assert_eq!(sub.received.borrow().len(), 2);
}

// -- check_subscriber sentinel call ---------------------------------------------

#[test]
fn check_subscriber_uses_sentinel_arguments() {
    struct LabelOnly;
    impl Actor for LabelOnly {
        fn handle(
            &self,
            _cap: &mut dyn PublishCap,
            hash: TopicHash,
            payload: &[u8],
            dtype: DataType,
        ) -> Option<&'static str> {
            assert_eq!(hash, 0);
            assert!(payload.is_empty());
            assert_eq!(dtype, DataType::None);
            Some("label-only")
        }
    }
    let mut b = bus(0);
    let actor: ActorRef = Rc::new(LabelOnly);
    assert_eq!(b.check_subscriber(&actor), Some("label-only"));
}

// -- unsubscribe from a not-yet-published topic --------------------------------

#[test]
fn subscribe_before_publish_creates_pending_topic() {
    let mut b = bus(0);
    let s: ActorRef = Spy::new("s");
    let (hash, snap) = b.subscribe_single(".pending", DataType::I32, s.clone()).unwrap();
    assert!(snap.is_none());
    let (_, dtype, _) = b.check_topic_by_hash(hash).unwrap();
    assert_eq!(dtype, DataType::I32);

    b.unsubscribe(".pending", &s).unwrap();
    assert!(b.check_topic_by_hash(hash).is_err(), "GC'd once its only subscriber leaves");
}
