// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pan: continuous translation of the pointer cluster.

use kurbo::Vec2;
use tracing::trace;
use understory_gesture::{
    GestureCx, GestureState, NodeKey, PointerCountState, PointerId, Recognizer,
};

/// Threshold for [`Pan`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanConfig {
    /// Distance the cluster centroid must travel before the pan begins.
    pub movement_threshold: f64,
}

impl Default for PanConfig {
    fn default() -> Self {
        Self {
            movement_threshold: 4.0,
        }
    }
}

/// Tracks the centroid of its pointers once it has moved far enough.
///
/// Begins when the accumulated movement crosses the threshold, reports `Changed` for
/// every later movement, and ends when the pointer count drops below the minimum.
/// Going over the maximum pointer count ends a pan in progress.
#[derive(Clone, Debug, Default)]
pub struct Pan {
    config: PanConfig,
    // Movement accumulated while still possible.
    pending: Vec2,
    delta: Vec2,
    translation: Vec2,
}

impl Pan {
    /// A pan recognizer with the given threshold.
    pub fn new(config: PanConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Movement reported by the last `Began` or `Changed`.
    pub fn delta(&self) -> Vec2 {
        self.delta
    }

    /// Total movement since the pan began, including the threshold distance.
    pub fn translation(&self) -> Vec2 {
        self.translation
    }
}

impl<K: NodeKey> Recognizer<K> for Pan {
    fn pointers_began(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if matches!(
            cx.pointer_count_state(),
            PointerCountState::PassedMaxThreshold | PointerCountState::PassedMinMaxThreshold
        ) && cx.state().is_in_progress()
        {
            cx.set_state(GestureState::Ended);
        }
    }

    fn pointers_moved(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if cx.pointer_count_state() != PointerCountState::InRange {
            return;
        }
        let (Some(now), Some(before)) = (cx.screen_position(), cx.previous_screen_position())
        else {
            return;
        };
        let step = now - before;
        match cx.state() {
            GestureState::Possible => {
                self.pending += step;
                let threshold = self.config.movement_threshold;
                if self.pending.hypot2() >= threshold * threshold {
                    trace!(gesture = ?cx.id(), "pan crossed its movement threshold");
                    self.delta = self.pending;
                    self.translation = self.pending;
                    cx.set_state(GestureState::Began);
                }
            }
            GestureState::Began | GestureState::Changed => {
                if step != Vec2::ZERO {
                    self.delta = step;
                    self.translation += step;
                    cx.set_state(GestureState::Changed);
                }
            }
            _ => {}
        }
    }

    fn pointers_ended(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if cx.pointer_count_state() != PointerCountState::PassedMinThreshold {
            return;
        }
        match cx.state() {
            GestureState::Began | GestureState::Changed => cx.set_state(GestureState::Ended),
            GestureState::Possible => cx.set_state(GestureState::Failed),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.pending = Vec2::ZERO;
        self.delta = Vec2::ZERO;
        self.translation = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use understory_gesture::GestureConfig;

    use super::*;
    use crate::testing::{CHILD, Rig};

    #[test]
    fn begins_past_threshold_and_tracks_translation() {
        let mut rig = Rig::new();
        let pan = rig.add(
            1,
            GestureConfig::default(),
            Pan::new(PanConfig {
                movement_threshold: 10.0,
            }),
        );
        let p = rig.down(CHILD);
        rig.frame();
        rig.nudge(p, CHILD, Vec2::new(6.0, 0.0));
        assert!(rig.frame().is_empty());
        rig.nudge(p, CHILD, Vec2::new(12.0, 0.0));
        assert_eq!(rig.frame(), [(pan, GestureState::Began)]);
        rig.nudge(p, CHILD, Vec2::new(12.0, 5.0));
        assert_eq!(rig.frame(), [(pan, GestureState::Changed)]);

        let rec = rig.arbiter.recognizer::<Pan>(pan).unwrap();
        assert_eq!(rec.delta(), Vec2::new(0.0, 5.0));
        assert_eq!(rec.translation(), Vec2::new(12.0, 5.0));

        rig.input.end(p);
        assert_eq!(rig.frame(), [(pan, GestureState::Ended)]);
        assert_eq!(
            rig.arbiter.recognizer::<Pan>(pan).map(Pan::translation),
            Some(Vec2::ZERO),
            "reset at the frame boundary"
        );
    }

    #[test]
    fn lifting_before_threshold_fails() {
        let mut rig = Rig::new();
        let pan = rig.add(1, GestureConfig::default(), Pan::default());
        let p = rig.down(CHILD);
        rig.frame();
        rig.input.end(p);
        assert_eq!(rig.frame(), [(pan, GestureState::Failed)]);
    }

    #[test]
    fn two_finger_pan_waits_for_both() {
        let mut rig = Rig::new();
        let pan = rig.add(1, GestureConfig::with_pointers(2, 2), Pan::default());
        let p = rig.down(CHILD);
        rig.frame();
        rig.nudge(p, CHILD, Vec2::new(20.0, 0.0));
        assert!(rig.frame().is_empty(), "one finger is too few");

        let q = rig.down(CHILD);
        rig.frame();
        rig.nudge(p, CHILD, Vec2::new(30.0, 0.0));
        rig.nudge(q, CHILD, Vec2::new(10.0, 0.0));
        assert_eq!(rig.frame(), [(pan, GestureState::Began)]);

        // A third finger pushes it over the maximum.
        rig.down(CHILD);
        assert_eq!(rig.frame(), [(pan, GestureState::Ended)]);
    }
}
