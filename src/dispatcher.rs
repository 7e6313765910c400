// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 tinybus contributors
//
// Public API surface (C6): registration, publish, subscribe, mute,
// introspection, timers, and the dispatcher loop (C3) that drains at
// most one queued message per call and fans it out to subscribers.
//
// All six capacities (`MAX_TOPICS`, `MAX_ACTORS`, `MAX_PATH_LEN`,
// `MAX_INFO_LEN`, `MAX_PAYLOAD`, `QUEUE_BYTES`) are const generic
// parameters with sensible defaults, so `Dispatcher::new(host)` names a
// working type on its own while any one capacity can still be overridden
// (`Dispatcher::<128>::new(host)`) with no runtime branch.

use crate::error::{Creation, PsError, PsResult};
use crate::registry::TopicRegistry;
use crate::service::{ChangeEvent, TIMER_TICK_PREFIX, TIMER_TOUT_PREFIX};
use crate::timer::TimerTable;
use crate::types::{ActorRef, DataType, PublishCap, TopicHash};
use crate::ring::RingBuffer;

pub use crate::registry::StickySnapshot;

pub const DEFAULT_MAX_TOPICS: usize = 64;
pub const DEFAULT_MAX_ACTORS: usize = 8;
pub const DEFAULT_MAX_PATH_LEN: usize = 64;
pub const DEFAULT_MAX_INFO_LEN: usize = 64;
pub const DEFAULT_MAX_PAYLOAD: usize = 64;
pub const DEFAULT_QUEUE_BYTES: usize = 1024;

/// Host-supplied timer primitives, injected at construction.
///
/// `timer_tick_ms` must report milliseconds **elapsed since the last
/// `restart_timer` call**, monotonically non-decreasing between restarts
/// — not an absolute/monotonic clock reading. This pins the source's
/// ambiguous "current tick" contract to the one interpretation that
/// makes `on_tick`'s subtraction arithmetic correct (see DESIGN.md).
pub trait TimerHost {
    /// Arm a one-shot host timer to fire in `timeout_ms` milliseconds
    /// from now, resetting the elapsed-time baseline `timer_tick_ms`
    /// measures against.
    fn restart_timer(&mut self, timeout_ms: i32);

    /// Milliseconds elapsed since the most recent `restart_timer` call.
    fn timer_tick_ms(&self) -> i32;
}

/// A fixed-capacity, single-threaded, in-process publish/subscribe
/// dispatcher.
///
/// Not `Send`/`Sync`: every method assumes exclusive access, and none of
/// the state is internally synchronized. Callers driving this from more
/// than one thread, or from an interrupt handler alongside normal
/// control flow, must wrap every call (including timer-expiry entry
/// points) in their own critical section.
pub struct Dispatcher<
    const MAX_TOPICS: usize = DEFAULT_MAX_TOPICS,
    const MAX_ACTORS: usize = DEFAULT_MAX_ACTORS,
    const MAX_PATH_LEN: usize = DEFAULT_MAX_PATH_LEN,
    const MAX_INFO_LEN: usize = DEFAULT_MAX_INFO_LEN,
    const MAX_PAYLOAD: usize = DEFAULT_MAX_PAYLOAD,
    const QUEUE_BYTES: usize = DEFAULT_QUEUE_BYTES,
> {
    registry: TopicRegistry<MAX_TOPICS, MAX_ACTORS, MAX_PATH_LEN, MAX_INFO_LEN, MAX_PAYLOAD>,
    queue: RingBuffer<QUEUE_BYTES>,
    timers: TimerTable<MAX_TOPICS>,
    host: Box<dyn TimerHost>,
}

impl<
        const MAX_TOPICS: usize,
        const MAX_ACTORS: usize,
        const MAX_PATH_LEN: usize,
        const MAX_INFO_LEN: usize,
        const MAX_PAYLOAD: usize,
        const QUEUE_BYTES: usize,
    > Dispatcher<MAX_TOPICS, MAX_ACTORS, MAX_PATH_LEN, MAX_INFO_LEN, MAX_PAYLOAD, QUEUE_BYTES>
{
    /// Construct a dispatcher with an empty queue and topic table,
    /// storing the injected timer callbacks.
    pub fn new(host: impl TimerHost + 'static) -> Self {
        log::debug!(
            "tinybus dispatcher initialised: topics={MAX_TOPICS} actors/topic={MAX_ACTORS} queue_bytes={QUEUE_BYTES}"
        );
        Self {
            registry: TopicRegistry::new(),
            queue: RingBuffer::new(),
            timers: TimerTable::new(),
            host: Box::new(host),
        }
    }

    /// Clear the queue, topic table, and timer table, keeping the
    /// previously-injected host callbacks. `init`/`reset` is
    /// idempotent-on-restart: no state survives across a call.
    pub fn reset(&mut self) {
        self.registry.reset();
        self.queue.flush();
        self.timers.reset();
    }

    // -- registration -----------------------------------------------------

    pub fn register_topic_publisher(
        &mut self,
        actor: ActorRef,
        dtype: DataType,
        path: &str,
        info: &str,
        sticky: bool,
    ) -> PsResult<TopicHash> {
        let (hash, creation, event) =
            self.registry.register_publisher(actor, dtype, path, info, sticky)?;
        if creation == Creation::Created {
            log::trace!("topic created: {hash} {path}");
        }
        self.announce(event);
        Ok(hash)
    }

    pub fn unregister_topic_publisher(&mut self, actor: &ActorRef, hash: TopicHash) -> PsResult<()> {
        let event = self.registry.unregister_publisher(actor, hash)?;
        self.announce(event);
        Ok(())
    }

    pub fn subscribe_single(
        &mut self,
        path: &str,
        dtype: DataType,
        actor: ActorRef,
    ) -> PsResult<(TopicHash, Option<StickySnapshot<MAX_PAYLOAD>>)> {
        let (hash, event, snapshot) = self.registry.subscribe_single(path, dtype, actor)?;
        self.announce(event);
        Ok((hash, snapshot))
    }

    pub fn unsubscribe(&mut self, path: &str, actor: &ActorRef) -> PsResult<()> {
        let event = self.registry.unsubscribe(path, actor)?;
        self.announce(event);
        Ok(())
    }

    pub fn check_topic(&self, path: &str) -> PsResult<(TopicHash, DataType, &str)> {
        let hash = self.registry.find_by_path(path).ok_or(PsError::NotFound)?;
        let topic = self.registry.topic(hash).ok_or(PsError::NotFound)?;
        Ok((hash, topic.data_type(), topic.info()))
    }

    pub fn check_topic_by_hash(&self, hash: TopicHash) -> PsResult<(&str, &str, DataType)> {
        let topic = self.registry.topic(hash).ok_or(PsError::NotFound)?;
        Ok((topic.path(), topic.info(), topic.data_type()))
    }

    /// Invoke `actor` with the sentinel call `(0, &[], DataType::None)`
    /// solely to retrieve its human-readable label.
    pub fn check_subscriber(&mut self, actor: &ActorRef) -> Option<&'static str> {
        actor.handle(self, 0, &[], DataType::None)
    }

    // -- mute ---------------------------------------------------------------

    pub fn mute(&mut self, actor: &ActorRef, path: &str, flag: bool) -> PsResult<TopicHash> {
        self.registry.mute_by_path(actor, path, flag)
    }

    pub fn mute_by_hash(&mut self, actor: &ActorRef, hash: TopicHash, flag: bool) -> PsResult<()> {
        self.registry.mute(actor, hash, flag)
    }

    // -- publish --------------------------------------------------------------

    pub fn publish(&mut self, actor: &ActorRef, hash: TopicHash, data: &[u8]) -> PsResult<()> {
        let should_enqueue = self.registry.record_publish(hash, actor, data)?;
        if !should_enqueue {
            log::trace!("publish suppressed by mute: topic {hash}");
            return Ok(());
        }
        if data.len() > u16::MAX as usize {
            return Err(PsError::OutOfMemory);
        }
        let hash_bytes = hash.to_le_bytes();
        let len_bytes = (data.len() as u16).to_le_bytes();
        if !self.queue.push_parts(&[&hash_bytes, &len_bytes, data]) {
            log::warn!("publish dropped: queue full for topic {hash}");
            return Err(PsError::OutOfMemory);
        }
        Ok(())
    }

    pub fn publish_with_registration(
        &mut self,
        actor: ActorRef,
        dtype: DataType,
        path: &str,
        info: &str,
        sticky: bool,
        data: &[u8],
    ) -> PsResult<TopicHash> {
        let hash = self.register_topic_publisher(actor.clone(), dtype, path, info, sticky)?;
        self.publish(&actor, hash, data)?;
        Ok(hash)
    }

    // -- timers ---------------------------------------------------------------

    pub fn create_and_sub_timer(
        &mut self,
        path: &str,
        actor: ActorRef,
        info: &str,
        duration_ms: i32,
    ) -> PsResult<TopicHash> {
        let periodic = if path.starts_with(TIMER_TICK_PREFIX) {
            true
        } else if path.starts_with(TIMER_TOUT_PREFIX) {
            false
        } else {
            return Err(PsError::NotFound);
        };
        if self.registry.find_by_path(path).is_some() {
            return Err(PsError::Duplicated);
        }

        let hash = self.register_topic_publisher(actor.clone(), DataType::None, path, info, false)?;
        self.subscribe_single(path, DataType::None, actor.clone())?;
        self.timers.insert(hash, actor, duration_ms, periodic)?;
        self.on_tick();
        Ok(hash)
    }

    pub fn create_and_sub_tpc_change(&mut self, actor: ActorRef) -> PsResult<TopicHash> {
        self.registry.create_and_sub_tpc_change(actor)
    }

    /// Recompute expiries against the host's elapsed-tick reading,
    /// republish anything that fired, and rearm the host timer for the
    /// shortest remaining deadline. Equivalent to the source's
    /// `pubTimerTimeoutEvent`/`onTick`; invoke from a timer interrupt
    /// handler (inside the caller's own critical section).
    pub fn on_tick(&mut self) {
        let elapsed = self.host.timer_tick_ms();
        let (expired, shortest) = self.timers.tick(elapsed);
        for expiry in expired.into_iter().flatten() {
            if let Err(e) = self.publish(&expiry.creator, expiry.hash, &[]) {
                log::warn!("timer publish on topic {} failed: {e}", expiry.hash);
            }
        }
        if let Some(next) = shortest {
            self.host.restart_timer(next);
        }
    }

    /// Alias for [`Self::on_tick`], matching the source's
    /// interrupt-entry-point name.
    pub fn pub_timer_timeout_event(&mut self) {
        self.on_tick();
    }

    // -- dispatcher loop --------------------------------------------------------

    /// Drain at most one queued message, fanning it out to every
    /// subscriber of its topic in subscriber-slot order. Returns 1 if a
    /// message was delivered, 0 if the queue was empty.
    ///
    /// A subscriber invoked here may itself publish (through the
    /// [`PublishCap`] handed to it); such a publish appends to the
    /// queue's rear and is only ever observed on a later call to this
    /// method, never within the current fan-out.
    pub fn loop_once(&mut self) -> u16 {
        let mut frame = [0u8; QUEUE_BYTES];
        let frame_len = self.queue.peek_front(&mut frame);
        if frame_len == 0 {
            return 0;
        }

        let hash = u16::from_le_bytes([frame[0], frame[1]]);
        let msg_len = u16::from_le_bytes([frame[2], frame[3]]) as usize;

        let dispatch_info = self.registry.topic(hash).map(|t| (t.subscribers_snapshot(), t.data_type()));

        match dispatch_info {
            Some((subscribers, dtype)) => {
                let payload_end = 4 + msg_len;
                for actor in subscribers.into_iter().flatten() {
                    let _ = actor.handle(self, hash, &frame[4..payload_end], dtype);
                }
            }
            None => {
                log::warn!("dispatch: topic {hash} missing for queued frame");
            }
        }

        self.queue.pop_front();
        1
    }

    // -- introspection --------------------------------------------------------

    pub fn waiting_events(&self) -> i16 {
        self.queue.len() as i16
    }

    pub fn has_enough_space(&self, bytes: usize) -> bool {
        self.queue.has_space(bytes)
    }

    fn announce(&mut self, event: Option<ChangeEvent>) {
        let Some(event) = event else { return };
        let Some((actor, hash)) = self.registry.change_announcer() else { return };
        let rendered = event.render();
        if let Err(e) = self.publish(&actor, hash, rendered.as_bytes()) {
            log::warn!("change announcement dropped: {e}");
        }
    }
}

impl<
        const MAX_TOPICS: usize,
        const MAX_ACTORS: usize,
        const MAX_PATH_LEN: usize,
        const MAX_INFO_LEN: usize,
        const MAX_PAYLOAD: usize,
        const QUEUE_BYTES: usize,
    > PublishCap for Dispatcher<MAX_TOPICS, MAX_ACTORS, MAX_PATH_LEN, MAX_INFO_LEN, MAX_PAYLOAD, QUEUE_BYTES>
{
    fn enqueue(&mut self, actor: &ActorRef, hash: TopicHash, data: &[u8]) -> PsResult<()> {
        self.publish(actor, hash, data)
    }
}
