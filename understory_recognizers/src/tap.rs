// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single and multi-tap recognition.

use core::time::Duration;

use kurbo::{Point, Vec2};
use tracing::trace;
use understory_gesture::{
    GestureCx, GestureState, NodeKey, Pointer, PointerCountState, PointerFlags, PointerId,
    Recognizer,
};

/// Limits for [`Tap`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TapConfig {
    /// Taps needed to recognize. Values below 1 are treated as 1.
    pub taps_required: u32,
    /// Time from the first touch by which all taps must complete.
    pub time_limit: Option<Duration>,
    /// How far pointers may travel during a tap, and how far later taps may land from
    /// the first one.
    pub distance_limit: Option<f64>,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            taps_required: 1,
            time_limit: None,
            distance_limit: None,
        }
    }
}

/// Recognizes one or more quick touches.
///
/// A tap is a press followed by the release of every pointer. With `taps_required > 1`
/// the gesture stays `Possible` between taps and recognizes on the last release.
/// Pointers returned by other gestures are ignored: a contact that started as something
/// else is not a tap.
#[derive(Clone, Debug, Default)]
pub struct Tap {
    config: TapConfig,
    // Pointers are down for the current tap.
    pressing: bool,
    taps_done: u32,
    start: Point,
    travelled: Vec2,
}

impl Tap {
    /// A tap recognizer with the given limits.
    pub fn new(config: TapConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The limits in effect.
    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    /// Taps completed in the current attempt.
    pub fn taps_done(&self) -> u32 {
        self.taps_done
    }

    fn taps_required(&self) -> u32 {
        self.config.taps_required.max(1)
    }

    fn too_far(&self, offset: Vec2) -> bool {
        self.config
            .distance_limit
            .is_some_and(|limit| offset.hypot2() > limit * limit)
    }
}

impl<K: NodeKey> Recognizer<K> for Tap {
    fn should_receive_pointer(&self, _node: K, pointer: &Pointer<K>) -> bool {
        !pointer.flags().contains(PointerFlags::RETURNED)
    }

    fn pointers_began(&mut self, cx: &mut GestureCx<'_, K>, pointers: &[PointerId]) {
        if matches!(
            cx.pointer_count_state(),
            PointerCountState::PassedMaxThreshold | PointerCountState::PassedMinMaxThreshold
        ) {
            cx.set_state(GestureState::Failed);
            return;
        }

        if cx.pointer_count() == pointers.len() {
            let first = pointers
                .first()
                .and_then(|id| cx.pointer(*id))
                .map(Pointer::position)
                .unwrap_or_default();
            if self.taps_done == 0 {
                self.start = first;
                if let Some(limit) = self.config.time_limit {
                    cx.set_deadline_in(limit);
                }
            } else if self.too_far(first - self.start) {
                trace!(gesture = ?cx.id(), "tap landed too far from the first one");
                cx.set_state(GestureState::Failed);
                return;
            }
        }

        if cx.pointer_count_state() == PointerCountState::PassedMinThreshold {
            // Pressing again without lifting everything is not a tap.
            if self.pressing {
                cx.set_state(GestureState::Failed);
            } else {
                self.pressing = true;
            }
        }
    }

    fn pointers_moved(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if self.config.distance_limit.is_none() {
            return;
        }
        if let (Some(now), Some(before)) = (cx.screen_position(), cx.previous_screen_position()) {
            self.travelled += now - before;
        }
        if self.too_far(self.travelled) {
            trace!(gesture = ?cx.id(), "tap moved too far");
            cx.set_state(GestureState::Failed);
        }
    }

    fn pointers_ended(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if cx.pointer_count() > 0 {
            return;
        }
        if !self.pressing {
            cx.set_state(GestureState::Failed);
            return;
        }
        self.pressing = false;
        self.taps_done += 1;
        if self.taps_done >= self.taps_required() {
            cx.set_state(GestureState::Ended);
        }
    }

    fn deadline_elapsed(&mut self, cx: &mut GestureCx<'_, K>) {
        if cx.state() == GestureState::Possible {
            trace!(gesture = ?cx.id(), taps = self.taps_done, "tap time limit elapsed");
            cx.set_state(GestureState::Failed);
        }
    }

    fn reset(&mut self) {
        self.pressing = false;
        self.taps_done = 0;
        self.travelled = Vec2::ZERO;
    }
}
