// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors returned by the configuration side of the [`Arbiter`](crate::Arbiter).
//!
//! The per-frame path never fails: unknown pointers, duplicate terminations and
//! out-of-order transitions are logged and absorbed.

use thiserror::Error;

use crate::types::GestureId;

/// Result alias for arbiter configuration calls.
pub type Result<T> = core::result::Result<T, Error>;

/// Configuration error.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The id does not refer to a live gesture (removed, or never issued by this arbiter).
    #[error("unknown gesture: {0:?}")]
    UnknownGesture(GestureId),

    /// A gesture was asked to wait for its own failure.
    #[error("gesture {0:?} cannot require itself to fail")]
    SelfDependency(GestureId),

    /// Installing the dependency would make the require-to-fail chain loop back.
    #[error("{dependent:?} requiring {required:?} to fail would form a cycle")]
    DependencyCycle {
        /// Gesture that would wait.
        dependent: GestureId,
        /// Gesture it would wait for.
        required: GestureId,
    },

    /// A gesture was made friendly with itself.
    #[error("gesture {0:?} cannot be friendly with itself")]
    SelfFriendship(GestureId),

    /// The arbiter has been shut down and accepts no new gestures.
    #[error("arbiter is shut down")]
    ShutDown,
}
