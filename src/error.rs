// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 tinybus contributors
//
// Crate-wide error taxonomy. Collapses the source's single flat
// `Result` enumeration (Ok/Appended/Created/Error/NotFound/Duplicated/
// OutOfMemory/RedefConflict) into a proper `Result<T, PsError>` pair,
// with `Creation` carrying the one success-path distinction ("topic
// already existed" vs "topic freshly created") that doesn't belong in
// an error type.

use thiserror::Error;

/// Failure modes for fallible dispatcher operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PsError {
    /// Path, hash, or actor not present.
    #[error("topic, hash, or actor not found")]
    NotFound,
    /// Actor or path already registered.
    #[error("actor or path already registered")]
    Duplicated,
    /// No free topic, timer, or actor slot, or the ring buffer is full.
    #[error("no free topic/timer/actor slot, or the queue is full")]
    OutOfMemory,
    /// Publisher registration disagrees with the topic's existing `DataType`.
    #[error("registering publisher with a dataType inconsistent with the existing topic")]
    RedefConflict,
    /// Unexpected internal inconsistency; a correct caller should never see this.
    #[error("internal inconsistency: {0}")]
    Internal(&'static str),
}

pub type PsResult<T> = Result<T, PsError>;

/// Distinguishes "topic already existed" from "topic freshly created" on
/// the success path of a publisher registration, rather than folding that
/// distinction into [`PsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    Existing,
    Created,
}
