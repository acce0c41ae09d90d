// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Long press: pointers held still for a while.

use core::time::Duration;

use kurbo::Vec2;
use tracing::trace;
use understory_gesture::{
    GestureCx, GestureState, NodeKey, PointerCountState, PointerId, Recognizer,
};

/// Timing and tolerance for [`LongPress`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LongPressConfig {
    /// How long pointers must stay down.
    pub time_to_press: Duration,
    /// How far the pointer cluster may drift while held.
    pub distance_limit: Option<f64>,
}

impl Default for LongPressConfig {
    fn default() -> Self {
        Self {
            time_to_press: Duration::from_secs(1),
            distance_limit: None,
        }
    }
}

/// Recognizes once pointers have been held for
/// [`time_to_press`](LongPressConfig::time_to_press).
///
/// Lifting early or drifting past the distance limit fails the gesture.
#[derive(Clone, Debug, Default)]
pub struct LongPress {
    config: LongPressConfig,
    drift: Vec2,
}

impl LongPress {
    /// A long press recognizer with the given timing.
    pub fn new(config: LongPressConfig) -> Self {
        Self {
            config,
            drift: Vec2::ZERO,
        }
    }

    /// The timing in effect.
    pub fn config(&self) -> &LongPressConfig {
        &self.config
    }
}

impl<K: NodeKey> Recognizer<K> for LongPress {
    fn pointers_began(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        match cx.pointer_count_state() {
            PointerCountState::PassedMaxThreshold | PointerCountState::PassedMinMaxThreshold => {
                cx.set_state(GestureState::Failed);
            }
            PointerCountState::PassedMinThreshold => {
                cx.set_deadline_in(self.config.time_to_press);
            }
            _ => {}
        }
    }

    fn pointers_moved(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        let Some(limit) = self.config.distance_limit else {
            return;
        };
        if let (Some(now), Some(before)) = (cx.screen_position(), cx.previous_screen_position()) {
            self.drift += now - before;
        }
        if self.drift.hypot2() > limit * limit {
            trace!(gesture = ?cx.id(), "long press drifted too far");
            cx.clear_deadline();
            cx.set_state(GestureState::Failed);
        }
    }

    fn pointers_ended(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if cx.pointer_count_state() == PointerCountState::PassedMinThreshold {
            cx.clear_deadline();
            cx.set_state(GestureState::Failed);
        }
    }

    fn deadline_elapsed(&mut self, cx: &mut GestureCx<'_, K>) {
        if cx.state() == GestureState::Possible && cx.pointer_count() > 0 {
            cx.set_state(GestureState::Ended);
        }
    }

    fn reset(&mut self) {
        self.drift = Vec2::ZERO;
    }
}
