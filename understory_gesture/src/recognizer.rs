// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The recognizer and delegate interfaces, and the context recognizers run in.
//!
//! ## Writing a recognizer
//!
//! A [`Recognizer`] is the policy half of a gesture: it watches the pointers the
//! arbiter routes to it and asks for state changes through its [`GestureCx`].
//! Requests are applied by the arbiter as soon as the callback returns, in the order
//! they were made; the arbiter may turn a request into `Failed` if another gesture
//! prevents it. The outcome is visible through [`GestureCx::state`] in the next
//! callback and through [`Recognizer::state_entered`].
//!
//! Recognizers never block. Anything time-based is expressed as a deadline, which the
//! arbiter checks against its frame clock and reports via
//! [`Recognizer::deadline_elapsed`].
//!
//! ```
//! use understory_gesture::{GestureCx, GestureState, PointerCountState, PointerId, Recognizer};
//!
//! /// Recognizes as soon as enough pointers are down.
//! #[derive(Debug, Default)]
//! struct Touch;
//!
//! impl<K: understory_gesture::NodeKey> Recognizer<K> for Touch {
//!     fn pointers_began(&mut self, cx: &mut GestureCx<'_, K>, _: &[PointerId]) {
//!         if cx.pointer_count_state() == PointerCountState::PassedMinThreshold {
//!             cx.set_state(GestureState::Ended);
//!         }
//!     }
//! }
//! ```

use core::any::Any;
use core::time::Duration;

use kurbo::Point;

use crate::gesture::{GestureConfig, GestureState, PointerCountState, StateChange, centroid};
use crate::pointer::{Pointer, PointerRegistry};
use crate::store::Slot;
use crate::types::{GestureId, NodeKey, PointerId};

/// Read-only view of another gesture, handed to prevention and delegate queries.
pub struct GestureInfo<'a, K: NodeKey> {
    /// The gesture.
    pub id: GestureId,
    /// Node it is attached to.
    pub node: K,
    /// Its current state.
    pub state: GestureState,
    pub(crate) recognizer: &'a (dyn Recognizer<K> + 'static),
}

impl<K: NodeKey> core::fmt::Debug for GestureInfo<'_, K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GestureInfo")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a, K: NodeKey> GestureInfo<'a, K> {
    /// The gesture's recognizer, if it is an `R`.
    pub fn downcast_ref<R: Recognizer<K>>(&self) -> Option<&'a R> {
        let any: &'a (dyn Any + 'static) = self.recognizer;
        any.downcast_ref::<R>()
    }

    /// Returns true if the gesture's recognizer is an `R`.
    pub fn is<R: Recognizer<K>>(&self) -> bool {
        self.downcast_ref::<R>().is_some()
    }
}

/// Gesture-specific policy plugged into the arbiter's state machine.
///
/// Every method has a default, so a recognizer only implements the callbacks it
/// cares about. Callbacks and queries run isolated: a panic is logged, the gesture is
/// failed, and the rest of the frame proceeds.
pub trait Recognizer<K: NodeKey>: Any {
    /// New pointers were routed to this gesture.
    fn pointers_began(&mut self, _cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {}

    /// Pointers this gesture holds moved.
    fn pointers_moved(&mut self, _cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {}

    /// Pointers this gesture held were lifted.
    fn pointers_ended(&mut self, _cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {}

    /// Pointers this gesture held were cancelled by the input source or another gesture.
    ///
    /// By default, losing the pointers that kept the gesture above its minimum
    /// cancels a gesture in progress and fails one still possible.
    fn pointers_cancelled(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if cx.pointer_count_state() != PointerCountState::PassedMinThreshold {
            return;
        }
        match cx.state() {
            GestureState::Began | GestureState::Changed => cx.set_state(GestureState::Cancelled),
            GestureState::Possible => cx.set_state(GestureState::Failed),
            _ => {}
        }
    }

    /// The deadline set through [`GestureCx::set_deadline`] has passed.
    fn deadline_elapsed(&mut self, _cx: &mut GestureCx<'_, K>) {}

    /// Clear per-attempt state. Called at the frame boundary after a cycle ends.
    fn reset(&mut self) {}

    /// The gesture entered a new state.
    fn state_entered(&mut self, _change: &StateChange<K>) {}

    /// Veto recognition. Consulted before `Began`, or `Ended` straight from `Possible`.
    fn should_begin(&self) -> bool {
        true
    }

    /// Filter the pointers offered to this gesture when they begin.
    fn should_receive_pointer(&self, _node: K, _pointer: &Pointer<K>) -> bool {
        true
    }

    /// Whether this gesture, once recognized, blocks `other`.
    ///
    /// Only consulted when the gesture has no delegate.
    fn can_prevent(&self, _other: &GestureInfo<'_, K>) -> bool {
        true
    }

    /// Whether `other`, once recognized, may block this gesture.
    ///
    /// Only consulted when the gesture has no delegate.
    fn can_be_prevented_by(&self, _other: &GestureInfo<'_, K>) -> bool {
        true
    }
}

/// Policy override for one gesture, or for all gestures when installed globally.
///
/// Where a gesture has a delegate, the delegate's answer replaces the recognizer's own
/// `can_prevent`/`can_be_prevented_by` and the friendly set. The global delegate is
/// consulted in addition to per-gesture delegates.
pub trait GestureDelegate<K: NodeKey> {
    /// Whether `gesture` may receive `pointer`.
    fn should_receive_pointer(&self, _gesture: &GestureInfo<'_, K>, _pointer: &Pointer<K>) -> bool {
        true
    }

    /// Whether `gesture` may begin or recognize.
    fn should_begin(&self, _gesture: &GestureInfo<'_, K>) -> bool {
        true
    }

    /// Whether `first` and `second` may be recognized at the same time.
    fn should_recognize_simultaneously(
        &self,
        _first: &GestureInfo<'_, K>,
        _second: &GestureInfo<'_, K>,
    ) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Request {
    State(GestureState),
    Cancel {
        cancel_pointers: bool,
        return_pointers: bool,
    },
}

/// Requests collected while a recognizer callback runs.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    pub(crate) requests: Vec<Request>,
    // `Some(None)` clears the deadline.
    pub(crate) deadline: Option<Option<Duration>>,
}

/// A recognizer's handle to its gesture while a callback runs.
pub struct GestureCx<'a, K: NodeKey> {
    pub(crate) id: GestureId,
    pub(crate) slot: &'a Slot<K>,
    pub(crate) pointers: &'a PointerRegistry<K>,
    pub(crate) now: Duration,
    pub(crate) pending: &'a mut Pending,
}

impl<K: NodeKey> core::fmt::Debug for GestureCx<'_, K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GestureCx")
            .field("id", &self.id)
            .field("node", &self.slot.node)
            .field("state", &self.slot.state)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl<K: NodeKey> GestureCx<'_, K> {
    /// This gesture.
    pub fn id(&self) -> GestureId {
        self.id
    }

    /// Node this gesture is attached to.
    pub fn node(&self) -> K {
        self.slot.node
    }

    /// Current state, not including requests made during this callback.
    pub fn state(&self) -> GestureState {
        self.slot.state
    }

    /// State before the last transition.
    pub fn previous_state(&self) -> GestureState {
        self.slot.previous
    }

    /// Pointer bounds and enablement.
    pub fn config(&self) -> GestureConfig {
        self.slot.config
    }

    /// Effect of the batch being delivered on the pointer count.
    pub fn pointer_count_state(&self) -> PointerCountState {
        self.slot.count_state
    }

    /// Frame clock.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Pointers this gesture holds, in arrival order.
    pub fn active_pointers(&self) -> &[PointerId] {
        &self.slot.active
    }

    /// Number of pointers this gesture holds.
    pub fn pointer_count(&self) -> usize {
        self.slot.active.len()
    }

    /// Look up any known pointer, including ones just delivered as ended.
    pub fn pointer(&self, id: PointerId) -> Option<&Pointer<K>> {
        self.pointers.get(id)
    }

    /// The pointers this gesture holds.
    pub fn pointers(&self) -> impl Iterator<Item = &Pointer<K>> + '_ {
        self.slot
            .active
            .iter()
            .filter_map(|id| self.pointers.get(*id))
    }

    /// Centroid of the held pointers.
    ///
    /// Once the last pointer lifts, the centroid of the final lifted batch is kept until
    /// the gesture resets or receives new pointers.
    pub fn screen_position(&self) -> Option<Point> {
        centroid(self.pointers().map(|p| p.position))
            .or_else(|| self.slot.cached.map(|(current, _)| current))
    }

    /// Centroid of the held pointers' positions at the start of the frame.
    pub fn previous_screen_position(&self) -> Option<Point> {
        centroid(self.pointers().map(|p| p.previous_position))
            .or_else(|| self.slot.cached.map(|(_, previous)| previous))
    }

    /// Ask the arbiter for a transition. Applied when the callback returns.
    pub fn set_state(&mut self, state: GestureState) {
        self.pending.requests.push(Request::State(state));
    }

    /// Cancel this gesture when the callback returns.
    ///
    /// With `cancel_pointers`, the held pointers are cancelled too, and with
    /// `return_pointers` they come back next frame as new pointers.
    pub fn cancel(&mut self, cancel_pointers: bool, return_pointers: bool) {
        self.pending.requests.push(Request::Cancel {
            cancel_pointers,
            return_pointers,
        });
    }

    /// Call [`Recognizer::deadline_elapsed`] on the first frame at or after `at`.
    pub fn set_deadline(&mut self, at: Duration) {
        self.pending.deadline = Some(Some(at));
    }

    /// Call [`Recognizer::deadline_elapsed`] once `delay` has passed on the frame clock.
    pub fn set_deadline_in(&mut self, delay: Duration) {
        self.set_deadline(self.now.saturating_add(delay));
    }

    /// Drop any pending deadline.
    pub fn clear_deadline(&mut self) {
        self.pending.deadline = Some(None);
    }

    /// The deadline in effect, including changes made during this callback.
    pub fn deadline(&self) -> Option<Duration> {
        match self.pending.deadline {
            Some(next) => next,
            None => self.slot.deadline,
        }
    }
}
