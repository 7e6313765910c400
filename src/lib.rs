// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 tinybus contributors
//
// A fixed-capacity, in-process publish/subscribe dispatcher for small,
// statically-provisioned environments (embedded controllers, single
// address-space runtimes). A fixed set of topics carries typed messages
// between actors — handler callbacks that both publish to and subscribe
// from topics — through a single bounded ring-buffered queue serviced
// cooperatively by one caller.
//
// The dispatcher is single-threaded by contract: every public method
// assumes exclusive access, and no internal locking is performed. Callers
// that drive the dispatcher from multiple threads or interrupt contexts
// must supply their own critical sections.

mod error;
mod ring;
mod service;
mod timer;
mod types;

mod registry;

mod dispatcher;

pub use error::{Creation, PsError, PsResult};
pub use service::{TIMER_TICK_PREFIX, TIMER_TOUT_PREFIX, TOPIC_CHANGE_PATH};
pub use types::{Actor, ActorRef, DataType, PublishCap, TopicHash};

pub use dispatcher::{
    Dispatcher, StickySnapshot, TimerHost, DEFAULT_MAX_ACTORS, DEFAULT_MAX_INFO_LEN,
    DEFAULT_MAX_PATH_LEN, DEFAULT_MAX_PAYLOAD, DEFAULT_MAX_TOPICS, DEFAULT_QUEUE_BYTES,
};
