// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 tinybus contributors
//
// Reserved namespaces and the topic-change announcement format. These
// prefixes are core-owned: a timer topic must fall under one of the two
// `.srv.t_ms.*` prefixes, and the dispatcher itself owns `.srv.tpc.chng`.

use crate::types::{DataType, TopicHash};

/// Prefix reserved for periodic timer topics.
pub const TIMER_TICK_PREFIX: &str = ".srv.t_ms.tick";

/// Prefix reserved for one-shot timer topics.
pub const TIMER_TOUT_PREFIX: &str = ".srv.t_ms.tout";

/// The well-known topic-change announcement topic (`DataType::Str`).
pub const TOPIC_CHANGE_PATH: &str = ".srv.tpc.chng";

/// Which side of a topic's lifecycle a [`ChangeEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Add,
    Del,
}

impl ChangeKind {
    fn tag(self) -> &'static str {
        match self {
            ChangeKind::Add => "ADD",
            ChangeKind::Del => "DEL",
        }
    }
}

/// A pending topic-lifecycle announcement, produced by the registry and
/// published by the dispatcher on [`TOPIC_CHANGE_PATH`] if that topic is
/// currently subscribed.
#[derive(Debug, Clone)]
pub(crate) struct ChangeEvent {
    pub kind: ChangeKind,
    pub hash: TopicHash,
    pub path: String,
    pub dtype: DataType,
}

impl ChangeEvent {
    pub fn add(hash: TopicHash, path: &str, dtype: DataType) -> Self {
        Self { kind: ChangeKind::Add, hash, path: path.to_owned(), dtype }
    }

    pub fn del(hash: TopicHash, path: &str, dtype: DataType) -> Self {
        Self { kind: ChangeKind::Del, hash, path: path.to_owned(), dtype }
    }

    /// Render as `"ADD <hash> <path>[<dtype>]"` / `"DEL <hash> <path>[<dtype>]"`.
    pub fn render(&self) -> String {
        format!("{} {} {}[{}]", self.kind.tag(), self.hash, self.path, self.dtype.tag())
    }
}
