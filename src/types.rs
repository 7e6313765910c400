// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 tinybus contributors
//
// Core identifiers and the actor abstraction. The source identifies
// actors by callback-pointer equality; this port uses a reference-counted
// trait object compared by pointer identity (`Rc::ptr_eq`), matching the
// single-threaded contract documented on `Dispatcher`.

use std::rc::Rc;

use crate::error::PsResult;

/// Stable index into the topic table. Not a content hash — just a slot index.
pub type TopicHash = u16;

/// The wire-level scalar type a topic carries.
///
/// Declared once per topic — at first publisher registration, or by a
/// subscriber that pre-creates a pending topic — and fixed for the
/// topic's lifetime thereafter; a later registration with a different
/// concrete type returns [`crate::PsError::RedefConflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    None,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Timestamp,
    ByteArray,
    Str,
    Bool,
}

impl DataType {
    /// Short tag used in change-topic announcements, e.g. `"ADD 3 .foo[U8]"`.
    pub fn tag(self) -> &'static str {
        match self {
            DataType::None => "None",
            DataType::U8 => "U8",
            DataType::I8 => "I8",
            DataType::U16 => "U16",
            DataType::I16 => "I16",
            DataType::U32 => "U32",
            DataType::I32 => "I32",
            DataType::U64 => "U64",
            DataType::I64 => "I64",
            DataType::Timestamp => "Timestamp",
            DataType::ByteArray => "ByteArray",
            DataType::Str => "Str",
            DataType::Bool => "Bool",
        }
    }
}

/// A narrow capability handed to an [`Actor`] during dispatch, letting it
/// publish back into the bus without holding a reference to the whole
/// `Dispatcher`. A publish issued through this capability while a delivery
/// is in progress is appended to the queue's rear and is therefore only
/// ever observed on a *subsequent* `loop_once` call, never within the
/// current fan-out.
pub trait PublishCap {
    fn enqueue(&mut self, actor: &ActorRef, hash: TopicHash, data: &[u8]) -> PsResult<()>;
}

/// A publish/subscribe endpoint: something with identity that can receive
/// deliveries and report a human-readable label.
///
/// `handle` is also used, with the sentinel arguments `(0, &[], DataType::None)`,
/// purely to retrieve an actor's label (see `Dispatcher::check_subscriber`);
/// that call carries no topic meaning and a well-behaved actor should treat
/// `hash == 0` together with an empty payload as "not a real delivery".
pub trait Actor {
    fn handle(
        &self,
        cap: &mut dyn PublishCap,
        hash: TopicHash,
        payload: &[u8],
        dtype: DataType,
    ) -> Option<&'static str>;
}

/// Reference-counted handle to an [`Actor`]. Deliberately not `Send`/`Sync`:
/// the dispatcher is single-threaded by contract (see crate docs).
pub type ActorRef = Rc<dyn Actor>;

/// Actor identity is reference identity, matching the source's
/// callback-pointer-equality model.
pub(crate) fn actor_eq(a: &ActorRef, b: &ActorRef) -> bool {
    Rc::ptr_eq(a, b)
}
