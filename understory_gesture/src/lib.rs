// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_gesture --heading-base-level=0

//! Understory Gesture: multi-touch gesture arbitration over a host scene tree.
//!
//! ## Overview
//!
//! Gestures are attached to nodes of the host's tree. Raw pointer input flows in through
//! [`InputHandle`]s, is buffered by the [`PointerRegistry`], and is dispatched once per
//! frame by the [`Arbiter`] to the gestures on the touched node and its ancestors.
//! Each gesture's [`Recognizer`] decides whether the input matches and asks for state
//! changes; the arbiter approves or refuses them so that mutually exclusive gestures on
//! related nodes never both recognize.
//!
//! The host keeps ownership of its tree. It is seen only through [`SceneGraph`] (parent
//! and child links plus activation) and [`HitTester`] (screen point to node).
//!
//! ## States
//!
//! Every gesture follows the [`GestureState`] machine. Discrete gestures (tap, press)
//! go `Possible -> Ended` or `Possible -> Failed`; continuous ones (pan, pinch) go
//! `Possible -> Began -> Changed* -> Ended | Cancelled`. A gesture that ended its
//! cycle is reset to `Possible` at the next frame boundary.
//!
//! ## Relations
//!
//! - Prevention: by default a recognized gesture fails every other still-possible
//!   gesture on its node, its ancestors and its descendants. Recognizers narrow this
//!   with [`Recognizer::can_prevent`] and [`Recognizer::can_be_prevented_by`].
//! - Friendship: [`Arbiter::add_friendly`] lets two gestures recognize together.
//! - Require-to-fail: [`Arbiter::set_require_to_fail`] holds one gesture's recognition
//!   back until another fails.
//! - Delegates: a [`GestureDelegate`] overrides all of the above for one gesture or,
//!   installed globally, for every gesture.
//!
//! ## Frame loop
//!
//! ```
//! use core::time::Duration;
//! use kurbo::Point;
//! use understory_gesture::{
//!     Arbiter, GestureConfig, GestureCx, GestureEvent, GestureState, PointerCountState,
//!     PointerId, Recognizer, SceneGraph, Tags,
//! };
//!
//! // A single-node scene.
//! struct One;
//! impl SceneGraph<u32> for One {
//!     fn parent_of(&self, _: u32) -> Option<u32> { None }
//!     fn child_count(&self, _: u32) -> usize { 0 }
//!     fn child_at(&self, _: u32, _: usize) -> Option<u32> { None }
//!     fn is_active(&self, _: u32) -> bool { true }
//! }
//!
//! #[derive(Debug)]
//! struct Tap;
//! impl Recognizer<u32> for Tap {
//!     fn pointers_ended(&mut self, cx: &mut GestureCx<'_, u32>, _: &[PointerId]) {
//!         if cx.pointer_count_state() == PointerCountState::PassedMinThreshold {
//!             cx.set_state(GestureState::Ended);
//!         }
//!     }
//! }
//!
//! let mut arbiter = Arbiter::default();
//! let tap = arbiter.add_gesture(0, GestureConfig::default(), Tap).unwrap();
//! let input = arbiter.input_handle();
//! let hit = |_: Point| Some(0_u32);
//!
//! let finger = input.begin(Point::new(10.0, 10.0), Tags::TOUCH).unwrap();
//! arbiter.process_frame(&One, &hit, Duration::from_millis(0));
//! input.end(finger);
//! arbiter.process_frame(&One, &hit, Duration::from_millis(16));
//!
//! let recognized = arbiter.drain_events().any(|e| {
//!     matches!(e, GestureEvent::StateChanged(c) if c.gesture == tap && c.state == GestureState::Ended)
//! });
//! assert!(recognized);
//! ```
//!
//! Input handles are `Send` and may be used from any thread; everything else runs on the
//! thread that calls [`Arbiter::process_frame`].
//!
//! ## Features
//!
//! - `scene_tree_adapter`: implements [`SceneGraph`] and [`HitTester`] for
//!   `understory_scene_tree::Tree`.

mod arbiter;
mod error;
mod gesture;
mod pointer;
mod recognizer;
mod scratch;
mod store;
mod types;

pub mod adapters;
pub mod hierarchy;

pub use arbiter::Arbiter;
pub use error::{Error, Result};
pub use gesture::{
    GestureConfig, GestureEvent, GestureState, PointerCountState, StateChange, centroid,
};
pub use pointer::{InputHandle, Pointer, PointerRegistry};
pub use recognizer::{GestureCx, GestureDelegate, GestureInfo, Recognizer};
pub use types::{
    GestureId, HitTester, LayerId, LayerStack, NodeKey, PointerFlags, PointerId, SceneGraph, Tags,
};
