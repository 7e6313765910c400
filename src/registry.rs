// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 tinybus contributors
//
// Fixed-capacity topic table: publisher/subscriber slots, the sticky
// last-message cache, and per-publisher mute bits. Lookup by path is a
// linear scan (the "hash" really is the slot index); lookup by hash is
// O(1) array indexing.
//
// Topic slots use `Option<Topic<..>>` rather than mirroring the source's
// "empty pathStr sentinel" convention — the option *is* the fixed-capacity
// "occupied or free" tag the design notes call for, so there's no need to
// additionally special-case an empty string.

use std::array;

use crate::error::{Creation, PsError, PsResult};
use crate::service::{ChangeEvent, TOPIC_CHANGE_PATH};
use crate::types::{actor_eq, ActorRef, DataType};
use crate::TopicHash;

fn find_actor(arr: &[Option<ActorRef>], actor: &ActorRef) -> Option<usize> {
    arr.iter().position(|slot| matches!(slot, Some(a) if actor_eq(a, actor)))
}

/// Insert `actor` into the first free slot of a publisher/subscriber array.
/// `Duplicated` if already present, `OutOfMemory` if the array is full.
fn insert_actor(arr: &mut [Option<ActorRef>], actor: ActorRef) -> PsResult<usize> {
    if find_actor(arr, &actor).is_some() {
        return Err(PsError::Duplicated);
    }
    match arr.iter().position(|s| s.is_none()) {
        Some(idx) => {
            arr[idx] = Some(actor);
            Ok(idx)
        }
        None => Err(PsError::OutOfMemory),
    }
}

fn remove_actor(arr: &mut [Option<ActorRef>], actor: &ActorRef) -> PsResult<()> {
    match find_actor(arr, actor) {
        Some(idx) => {
            arr[idx] = None;
            Ok(())
        }
        None => Err(PsError::NotFound),
    }
}

fn is_all_empty(arr: &[Option<ActorRef>]) -> bool {
    arr.iter().all(|s| s.is_none())
}

/// The cached last message on a sticky-capable topic. Copies at most
/// `MAX_PAYLOAD` bytes regardless of the published length, and remembers
/// the true copied length — fixing the source's "overwrite the whole
/// fixed region" behaviour (see DESIGN.md) while keeping it observationally
/// identical for well-formed callers (payloads at or under `MAX_PAYLOAD`).
struct LastMsg<const MAX_PAYLOAD: usize> {
    data: [u8; MAX_PAYLOAD],
    len: usize,
}

impl<const MAX_PAYLOAD: usize> LastMsg<MAX_PAYLOAD> {
    fn new() -> Self {
        Self { data: [0u8; MAX_PAYLOAD], len: 0 }
    }

    fn set(&mut self, payload: &[u8]) {
        let n = payload.len().min(MAX_PAYLOAD);
        self.data[..n].copy_from_slice(&payload[..n]);
        self.len = n;
    }
}

/// An owned, fixed-capacity copy of a sticky topic's last message, handed
/// back from a subscription instead of a raw pointer into the registry —
/// this removes the "valid until next publish" invalidation hazard the
/// source's pointer-return convention has, at the cost of one bounded
/// copy per subscribe call.
pub struct StickySnapshot<const MAX_PAYLOAD: usize> {
    data: [u8; MAX_PAYLOAD],
    len: usize,
    pub dtype: DataType,
}

impl<const MAX_PAYLOAD: usize> StickySnapshot<MAX_PAYLOAD> {
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub(crate) struct Topic<const MAX_ACTORS: usize, const MAX_PAYLOAD: usize> {
    hash: TopicHash,
    data_type: DataType,
    sticky: bool,
    path: String,
    info: String,
    publishers: [Option<ActorRef>; MAX_ACTORS],
    subscribers: [Option<ActorRef>; MAX_ACTORS],
    publisher_mute: [bool; MAX_ACTORS],
    last_msg: LastMsg<MAX_PAYLOAD>,
}

impl<const MAX_ACTORS: usize, const MAX_PAYLOAD: usize> Topic<MAX_ACTORS, MAX_PAYLOAD> {
    fn new(hash: TopicHash, data_type: DataType, sticky: bool, path: &str, info: &str) -> Self {
        Self {
            hash,
            data_type,
            sticky,
            path: path.to_owned(),
            info: info.to_owned(),
            publishers: array::from_fn(|_| None),
            subscribers: array::from_fn(|_| None),
            publisher_mute: [false; MAX_ACTORS],
            last_msg: LastMsg::new(),
        }
    }

    pub fn hash(&self) -> TopicHash {
        self.hash
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Cheap: clones `Rc` pointers (refcount bumps), not the callbacks
    /// themselves, so fan-out can release the borrow on the registry
    /// before invoking any actor.
    pub fn subscribers_snapshot(&self) -> [Option<ActorRef>; MAX_ACTORS] {
        array::from_fn(|i| self.subscribers[i].clone())
    }
}

/// Fixed-capacity table of topics, keyed by slot index.
pub(crate) struct TopicRegistry<
    const MAX_TOPICS: usize,
    const MAX_ACTORS: usize,
    const MAX_PATH_LEN: usize,
    const MAX_INFO_LEN: usize,
    const MAX_PAYLOAD: usize,
> {
    topics: [Option<Topic<MAX_ACTORS, MAX_PAYLOAD>>; MAX_TOPICS],
    /// The actor registered to publish on the change topic, and that
    /// topic's hash. `None` until `create_and_sub_tpc_change` succeeds,
    /// and cleared again if that topic is later GC'd.
    change_announcer: Option<(ActorRef, TopicHash)>,
}

fn clamp_len(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

impl<
        const MAX_TOPICS: usize,
        const MAX_ACTORS: usize,
        const MAX_PATH_LEN: usize,
        const MAX_INFO_LEN: usize,
        const MAX_PAYLOAD: usize,
    > TopicRegistry<MAX_TOPICS, MAX_ACTORS, MAX_PATH_LEN, MAX_INFO_LEN, MAX_PAYLOAD>
{
    pub fn new() -> Self {
        Self { topics: array::from_fn(|_| None), change_announcer: None }
    }

    pub fn reset(&mut self) {
        self.topics = array::from_fn(|_| None);
        self.change_announcer = None;
    }

    pub fn find_by_path(&self, path: &str) -> Option<TopicHash> {
        self.topics
            .iter()
            .flatten()
            .find(|t| t.path == path)
            .map(|t| t.hash)
    }

    pub fn topic(&self, hash: TopicHash) -> Option<&Topic<MAX_ACTORS, MAX_PAYLOAD>> {
        self.topics.get(hash as usize)?.as_ref()
    }

    pub fn is_change_topic(&self, hash: TopicHash) -> bool {
        self.change_announcer.as_ref().map(|(_, h)| *h) == Some(hash)
    }

    pub fn change_announcer(&self) -> Option<(ActorRef, TopicHash)> {
        self.change_announcer.clone()
    }

    fn topic_mut(&mut self, hash: TopicHash) -> PsResult<&mut Topic<MAX_ACTORS, MAX_PAYLOAD>> {
        self.topics
            .get_mut(hash as usize)
            .and_then(|s| s.as_mut())
            .ok_or(PsError::NotFound)
    }

    fn allocate_slot(
        &mut self,
        data_type: DataType,
        sticky: bool,
        path: &str,
        info: &str,
    ) -> PsResult<TopicHash> {
        let idx = self
            .topics
            .iter()
            .position(|s| s.is_none())
            .ok_or(PsError::OutOfMemory)?;
        let hash = idx as TopicHash;
        let path = clamp_len(path, MAX_PATH_LEN);
        let info = clamp_len(info, MAX_INFO_LEN);
        self.topics[idx] = Some(Topic::new(hash, data_type, sticky, path, info));
        Ok(hash)
    }

    /// Register `actor` as a publisher of `path`. Creates the topic if
    /// absent. Returns the assigned hash, whether the topic was freshly
    /// created, and a pending `ADD` announcement if so.
    pub fn register_publisher(
        &mut self,
        actor: ActorRef,
        data_type: DataType,
        path: &str,
        info: &str,
        sticky: bool,
    ) -> PsResult<(TopicHash, Creation, Option<ChangeEvent>)> {
        if let Some(hash) = self.find_by_path(path) {
            let topic = self.topic_mut(hash)?;
            if !is_all_empty(&topic.publishers) {
                if topic.data_type != data_type {
                    return Err(PsError::RedefConflict);
                }
                topic.sticky |= sticky;
            } else {
                topic.data_type = data_type;
                topic.sticky |= sticky;
            }
            let idx = insert_actor(&mut topic.publishers, actor)?;
            topic.publisher_mute[idx] = false;
            return Ok((hash, Creation::Existing, None));
        }

        let hash = self.allocate_slot(data_type, sticky, path, info)?;
        let topic = self.topic_mut(hash)?;
        insert_actor(&mut topic.publishers, actor)?;
        let event = ChangeEvent::add(hash, topic.path(), topic.data_type());
        Ok((hash, Creation::Created, Some(event)))
    }

    /// Remove `actor` from `hash`'s publisher set, GC'ing the topic (and
    /// returning a pending `DEL` announcement) if both actor sets are
    /// then empty.
    pub fn unregister_publisher(
        &mut self,
        actor: &ActorRef,
        hash: TopicHash,
    ) -> PsResult<Option<ChangeEvent>> {
        let topic = self.topic_mut(hash)?;
        remove_actor(&mut topic.publishers, actor)?;
        Ok(self.maybe_gc(hash))
    }

    /// Subscribe `actor` to `path`, creating a pending topic if absent.
    /// Returns the hash, whether freshly created, any `ADD` announcement,
    /// and — if the topic is sticky and has a last message — its snapshot.
    pub fn subscribe_single(
        &mut self,
        path: &str,
        data_type: DataType,
        actor: ActorRef,
    ) -> PsResult<(TopicHash, Option<ChangeEvent>, Option<StickySnapshot<MAX_PAYLOAD>>)> {
        let (hash, event) = match self.find_by_path(path) {
            Some(hash) => (hash, None),
            None => {
                let hash = self.allocate_slot(data_type, false, path, "")?;
                let topic = self.topic_mut(hash)?;
                let ev = ChangeEvent::add(hash, topic.path(), topic.data_type());
                (hash, Some(ev))
            }
        };

        let topic = self.topic_mut(hash)?;
        insert_actor(&mut topic.subscribers, actor)?;

        let snapshot = if topic.sticky && topic.last_msg.len > 0 {
            Some(StickySnapshot {
                data: topic.last_msg.data,
                len: topic.last_msg.len,
                dtype: topic.data_type,
            })
        } else {
            None
        };

        Ok((hash, event, snapshot))
    }

    /// Remove `actor` from `path`'s subscriber set, GC'ing as in
    /// [`Self::unregister_publisher`].
    pub fn unsubscribe(
        &mut self,
        path: &str,
        actor: &ActorRef,
    ) -> PsResult<Option<ChangeEvent>> {
        let hash = self.find_by_path(path).ok_or(PsError::NotFound)?;
        let topic = self.topic_mut(hash)?;
        remove_actor(&mut topic.subscribers, actor)?;
        Ok(self.maybe_gc(hash))
    }

    /// If both actor arrays of `hash` are empty, clear the slot and
    /// report a `DEL` event — unless the topic being cleared *is* the
    /// change-announcement topic, in which case the announcer is
    /// disabled and no event is produced (its own teardown is never
    /// self-announced, mirroring the enabling half of the same rule).
    fn maybe_gc(&mut self, hash: TopicHash) -> Option<ChangeEvent> {
        let topic = self.topics[hash as usize].as_ref()?;
        if !is_all_empty(&topic.publishers) || !is_all_empty(&topic.subscribers) {
            return None;
        }
        let path = topic.path().to_owned();
        let dtype = topic.data_type();
        self.topics[hash as usize] = None;

        if self.is_change_topic(hash) {
            self.change_announcer = None;
            return None;
        }
        Some(ChangeEvent::del(hash, &path, dtype))
    }

    pub fn record_publish(
        &mut self,
        hash: TopicHash,
        actor: &ActorRef,
        payload: &[u8],
    ) -> PsResult<bool> {
        let topic = self.topics.get_mut(hash as usize).and_then(|s| s.as_mut()).ok_or(PsError::NotFound)?;
        topic.last_msg.set(payload);
        let idx = find_actor(&topic.publishers, actor).ok_or(PsError::NotFound)?;
        Ok(!topic.publisher_mute[idx])
    }

    pub fn mute(&mut self, actor: &ActorRef, hash: TopicHash, flag: bool) -> PsResult<()> {
        let topic = self.topics.get_mut(hash as usize).and_then(|s| s.as_mut()).ok_or(PsError::NotFound)?;
        let idx = find_actor(&topic.publishers, actor).ok_or(PsError::NotFound)?;
        topic.publisher_mute[idx] = flag;
        Ok(())
    }

    pub fn mute_by_path(&mut self, actor: &ActorRef, path: &str, flag: bool) -> PsResult<TopicHash> {
        let hash = self.find_by_path(path).ok_or(PsError::NotFound)?;
        self.mute(actor, hash, flag)?;
        Ok(hash)
    }

    /// Arm (or re-enable) change-topic announcements, registering and
    /// subscribing `actor` on [`TOPIC_CHANGE_PATH`] exactly as a timer
    /// registers its own creator. The change topic's own `ADD` event is
    /// intentionally swallowed: the announcer only becomes active once
    /// this call returns, so it can never announce its own birth.
    pub fn create_and_sub_tpc_change(&mut self, actor: ActorRef) -> PsResult<TopicHash> {
        let (hash, _creation, _event) = self.register_publisher(
            actor.clone(),
            DataType::Str,
            TOPIC_CHANGE_PATH,
            "topic lifecycle announcements",
            false,
        )?;
        let (_hash, _event, _snapshot) = self.subscribe_single(TOPIC_CHANGE_PATH, DataType::Str, actor.clone())?;
        self.change_announcer = Some((actor, hash));
        Ok(hash)
    }
}
