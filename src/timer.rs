// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 tinybus contributors
//
// Timer table: a fixed array of periodic/one-shot timer slots driven by
// a single external monotonic tick. `onTick` republishes every expired
// timer through the ordinary pub/sub plane and reports the shortest
// remaining deadline so the host can rearm its hardware/OS timer once.
//
// `getTimerTickMs` is pinned to "elapsed milliseconds since the last
// `restartTimer` call", zeroed by `restartTimer` — the source is
// ambiguous between that and "current monotonic time"; this port picks
// the former and the `TimerHost` trait documents it (see DESIGN.md).

use std::array;

use crate::error::{PsError, PsResult};
use crate::types::ActorRef;
use crate::TopicHash;

struct TimerSlot {
    hash: TopicHash,
    creator: ActorRef,
    duration_ms: i32,
    time_left_ms: i32,
    periodic: bool,
}

/// Fixed-capacity table of timer slots, one per concurrently armed timer
/// topic. A slot is free when absent from the array (`Option::None`),
/// replacing the source's `durationMs == 0` sentinel.
pub(crate) struct TimerTable<const MAX_TOPICS: usize> {
    slots: [Option<TimerSlot>; MAX_TOPICS],
}

/// One timer's expiry: which topic to publish on, and which actor is the
/// registered publisher to use for that synthesized publication.
pub(crate) struct Expiry {
    pub hash: TopicHash,
    pub creator: ActorRef,
}

impl<const MAX_TOPICS: usize> TimerTable<MAX_TOPICS> {
    pub fn new() -> Self {
        Self { slots: array::from_fn(|_| None) }
    }

    pub fn reset(&mut self) {
        self.slots = array::from_fn(|_| None);
    }

    pub fn insert(
        &mut self,
        hash: TopicHash,
        creator: ActorRef,
        duration_ms: i32,
        periodic: bool,
    ) -> PsResult<()> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(PsError::OutOfMemory)?;
        self.slots[idx] = Some(TimerSlot {
            hash,
            creator,
            duration_ms,
            time_left_ms: duration_ms,
            periodic,
        });
        Ok(())
    }

    /// Advance every occupied timer by `elapsed` ms. Returns the timers
    /// that just expired (in slot order, to publish in that order) and
    /// the shortest positive `time_left_ms` remaining afterwards, if any
    /// timer is still active. No heap allocation: expiries are reported
    /// through a stack array sized to the timer table's own capacity.
    pub fn tick(&mut self, elapsed: i32) -> ([Option<Expiry>; MAX_TOPICS], Option<i32>) {
        let mut expired: [Option<Expiry>; MAX_TOPICS] = array::from_fn(|_| None);
        for (slot, out) in self.slots.iter_mut().zip(expired.iter_mut()) {
            let Some(slot) = slot else { continue };
            slot.time_left_ms -= elapsed;
            if slot.time_left_ms <= 0 {
                *out = Some(Expiry { hash: slot.hash, creator: slot.creator.clone() });
                if slot.periodic {
                    slot.time_left_ms = slot.duration_ms;
                } else {
                    slot.time_left_ms = 0;
                }
            }
        }

        // One-shot timers that just fired stay in the table with
        // `time_left_ms == 0` (a real systems port would reclaim the
        // slot; this one lacks a removal path in the source spec, so a
        // fired one-shot is simply inert from here on and excluded below).
        let shortest = self
            .slots
            .iter()
            .flatten()
            .filter(|s| s.time_left_ms > 0)
            .map(|s| s.time_left_ms)
            .min();

        (expired, shortest)
    }
}
