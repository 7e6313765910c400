// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 tinybus contributors
//
// Minimal illustrative binary: a wall-clock-driven `TimerHost`, a periodic
// tick topic, a one-shot timeout topic, and a subscriber that logs both.
// Not part of the library's contract (see crate docs) — just enough to
// exercise the dispatcher end to end from the command line.
//
// Usage:
//   demo_ticker [seconds_to_run]

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tinybus::{Actor, DataType, Dispatcher, PublishCap, TopicHash};

struct WallClockHost {
    restarted_at: Cell<Instant>,
}

impl WallClockHost {
    fn new() -> Self {
        Self { restarted_at: Cell::new(Instant::now()) }
    }
}

impl tinybus::TimerHost for WallClockHost {
    fn restart_timer(&mut self, _timeout_ms: i32) {
        self.restarted_at.set(Instant::now());
    }

    fn timer_tick_ms(&self) -> i32 {
        self.restarted_at.get().elapsed().as_millis().min(i32::MAX as u128) as i32
    }
}

struct Printer(&'static str);

impl Actor for Printer {
    fn handle(
        &self,
        _cap: &mut dyn PublishCap,
        hash: TopicHash,
        _payload: &[u8],
        _dtype: DataType,
    ) -> Option<&'static str> {
        println!("[{}] tick on topic {hash}", self.0);
        Some(self.0)
    }
}

fn main() {
    env_logger::init();

    let run_for = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(5);

    let mut bus: Dispatcher = Dispatcher::new(WallClockHost::new());

    let ticker = Rc::new(Printer("tick"));
    bus.create_and_sub_timer(".srv.t_ms.tick.1s", ticker, "1s heartbeat", 1_000)
        .expect("register periodic timer");

    let timeout = Rc::new(Printer("timeout"));
    bus.create_and_sub_timer(".srv.t_ms.tout.boot", timeout, "boot grace period", 2_500)
        .expect("register one-shot timer");

    let watcher = Rc::new(Printer("topic-change"));
    bus.create_and_sub_tpc_change(watcher).expect("subscribe to topic changes");

    let deadline = Instant::now() + Duration::from_secs(run_for);
    while Instant::now() < deadline {
        bus.on_tick();
        while bus.loop_once() == 1 {}
        std::thread::sleep(Duration::from_millis(50));
    }
}
