// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transform: translation, rotation and scaling from two pointer clusters.

use core::f64::consts::{PI, TAU};

use kurbo::{Point, Vec2};
use tracing::trace;
use understory_gesture::{
    GestureCx, GestureState, NodeKey, Pointer, PointerCountState, PointerId, Recognizer,
    centroid,
};

bitflags::bitflags! {
    /// Components a [`Transform`] tracks.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TransformKinds: u8 {
        /// Movement of the clusters' midpoint.
        const TRANSLATION = 1 << 0;
        /// Turning of the line between the clusters.
        const ROTATION    = 1 << 1;
        /// Change of the distance between the clusters.
        const SCALING     = 1 << 2;
    }
}

impl Default for TransformKinds {
    fn default() -> Self {
        Self::all()
    }
}

/// Limits for [`Transform`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformConfig {
    /// Components to track. Disabled components are always reported as identity.
    pub kinds: TransformKinds,
    /// Screen distance any tracked component must cover before the transform begins.
    ///
    /// Rotation counts the arc swept at the cluster distance; scaling counts the change
    /// in that distance.
    pub threshold: f64,
    /// Clusters closer than this only translate.
    pub min_cluster_distance: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            kinds: TransformKinds::default(),
            threshold: 4.0,
            min_cluster_distance: 20.0,
        }
    }
}

/// A screen-space similarity: translate, then rotate and scale about the pivot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformDelta {
    /// Movement in screen units.
    pub translation: Vec2,
    /// Rotation in radians, positive from +x towards +y.
    pub rotation: f64,
    /// Scale factor; 1.0 is unchanged.
    pub scale: f64,
}

impl TransformDelta {
    /// No change.
    pub const IDENTITY: Self = Self {
        translation: Vec2::ZERO,
        rotation: 0.0,
        scale: 1.0,
    };

    /// This change followed by `next`.
    #[must_use]
    pub fn then(self, next: Self) -> Self {
        Self {
            translation: self.translation + next.translation,
            rotation: self.rotation + next.rotation,
            scale: self.scale * next.scale,
        }
    }

    /// Whether applying this changes nothing.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for TransformDelta {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One frame's measurement.
struct Step {
    delta: TransformDelta,
    // Arc length swept by the rotation.
    swept: f64,
    // Change in cluster distance.
    stretched: f64,
    pivot: Point,
}

/// Tracks how a group of pointers moves, turns and spreads.
///
/// Held pointers are split by press order into two clusters: the first half and the
/// rest. With a single pointer, or clusters closer than
/// [`TransformConfig::min_cluster_distance`], only translation is measured.
///
/// Begins once a tracked component crosses the threshold, reports `Changed` for every
/// later frame that transforms, and ends when the pointer count drops below the
/// minimum or rises past the maximum.
#[derive(Clone, Debug, Default)]
pub struct Transform {
    config: TransformConfig,
    pending: TransformDelta,
    moved: Vec2,
    swept: f64,
    stretched: f64,
    delta: TransformDelta,
    total: TransformDelta,
    pivot: Option<Point>,
}

impl Transform {
    /// A transform recognizer with the given limits.
    pub fn new(config: TransformConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The limits in effect.
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Change reported by the last `Began` or `Changed`.
    pub fn delta(&self) -> TransformDelta {
        self.delta
    }

    /// Accumulated change since the transform began, including the threshold movement.
    pub fn total(&self) -> TransformDelta {
        self.total
    }

    /// Screen point the last rotation and scale were measured about.
    pub fn pivot(&self) -> Option<Point> {
        self.pivot
    }

    fn measure<K: NodeKey>(&self, cx: &GestureCx<'_, K>) -> Option<Step> {
        let kinds = self.config.kinds;
        let count = cx.pointer_count();
        let now = cx.screen_position()?;
        let before = cx.previous_screen_position()?;
        let mut step = Step {
            delta: TransformDelta::IDENTITY,
            swept: 0.0,
            stretched: 0.0,
            pivot: now,
        };
        if count < 2 || !kinds.intersects(TransformKinds::ROTATION | TransformKinds::SCALING) {
            if kinds.contains(TransformKinds::TRANSLATION) {
                step.delta.translation = now - before;
            }
            return Some(step);
        }

        let half = count.div_ceil(2);
        let new_a = centroid(cx.pointers().take(half).map(Pointer::position))?;
        let new_b = centroid(cx.pointers().skip(half).map(Pointer::position))?;
        let old_a = centroid(cx.pointers().take(half).map(Pointer::previous_position))?;
        let old_b = centroid(cx.pointers().skip(half).map(Pointer::previous_position))?;
        let (old_span, new_span) = (old_b - old_a, new_b - new_a);

        let min = self.config.min_cluster_distance;
        if new_span.hypot2() <= min * min || old_span == Vec2::ZERO {
            if kinds.contains(TransformKinds::TRANSLATION) {
                step.delta.translation = new_a - old_a;
            }
            step.pivot = new_a;
            return Some(step);
        }

        let (old_len, new_len) = (old_span.hypot(), new_span.hypot());
        if kinds.contains(TransformKinds::ROTATION) {
            let turn = wrap_angle(new_span.atan2() - old_span.atan2());
            step.delta.rotation = turn;
            step.swept = turn * new_len;
        }
        if kinds.contains(TransformKinds::SCALING) {
            step.delta.scale = new_len / old_len;
            step.stretched = new_len - old_len;
        }
        if kinds.contains(TransformKinds::TRANSLATION) {
            step.delta.translation = new_a.midpoint(new_b) - old_a.midpoint(old_b);
        }
        step.pivot = new_a.midpoint(new_b);
        Some(step)
    }
}

/// Map an angle difference into `(-PI, PI]`.
fn wrap_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a > PI { a - TAU } else { a }
}

impl<K: NodeKey> Recognizer<K> for Transform {
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
        let Some(step) = self.measure(cx) else {
            return;
        };
        if step.delta.is_identity() {
            return;
        }
        self.pivot = Some(step.pivot);
        match cx.state() {
            GestureState::Possible => {
                self.pending = self.pending.then(step.delta);
                self.moved += step.delta.translation;
                self.swept += step.swept;
                self.stretched += step.stretched;
                let t2 = self.config.threshold * self.config.threshold;
                if self.moved.hypot2() >= t2
                    || self.swept * self.swept >= t2
                    || self.stretched * self.stretched >= t2
                {
                    trace!(gesture = ?cx.id(), "transform crossed its threshold");
                    self.delta = self.pending;
                    self.total = self.pending;
                    cx.set_state(GestureState::Began);
                }
            }
            GestureState::Began | GestureState::Changed => {
                self.delta = step.delta;
                self.total = self.total.then(step.delta);
                cx.set_state(GestureState::Changed);
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
        let config = self.config;
        *self = Self::new(config);
    }
}

#[cfg(test)]
mod tests {
    use core::f64::consts::FRAC_PI_2;

    use understory_gesture::GestureConfig;

    use super::*;
    use crate::testing::{CHILD, Rig};

    const LEFT: Point = Point::new(30.0, 50.0);
    const RIGHT: Point = Point::new(70.0, 50.0);

    #[test]
    fn spreading_two_fingers_scales() {
        let mut rig = Rig::new();
        let t = rig.add(1, GestureConfig::with_pointers(2, 0), Transform::default());
        let p = rig.down(LEFT);
        let q = rig.down(RIGHT);
        rig.frame();

        rig.nudge(p, LEFT, Vec2::new(-20.0, 0.0));
        rig.nudge(q, RIGHT, Vec2::new(20.0, 0.0));
        assert_eq!(rig.frame(), [(t, GestureState::Began)]);

        let rec = rig.arbiter.recognizer::<Transform>(t).unwrap();
        assert_eq!(rec.total().scale, 2.0);
        assert_eq!(rec.total().rotation, 0.0);
        assert_eq!(rec.total().translation, Vec2::ZERO);
        assert_eq!(rec.pivot(), Some(CHILD));

        rig.input.end(p);
        assert_eq!(rig.frame(), [(t, GestureState::Ended)]);
    }

    #[test]
    fn turning_two_fingers_rotates_about_their_midpoint() {
        let mut rig = Rig::new();
        let t = rig.add(1, GestureConfig::with_pointers(2, 0), Transform::default());
        let p = rig.down(LEFT);
        let q = rig.down(RIGHT);
        rig.frame();

        // A quarter turn about (50, 50).
        rig.nudge(p, LEFT, Vec2::new(20.0, -20.0));
        rig.nudge(q, RIGHT, Vec2::new(-20.0, 20.0));
        assert_eq!(rig.frame(), [(t, GestureState::Began)]);

        let total = rig.arbiter.recognizer::<Transform>(t).unwrap().total();
        assert!((total.rotation - FRAC_PI_2).abs() < 1e-9);
        assert!((total.scale - 1.0).abs() < 1e-9);
        assert!(total.translation.hypot() < 1e-9);
    }

    #[test]
    fn one_finger_translates_and_reports_changes() {
        let mut rig = Rig::new();
        let t = rig.add(1, GestureConfig::default(), Transform::default());
        let p = rig.down(CHILD);
        rig.frame();
        rig.nudge(p, CHILD, Vec2::new(2.0, 0.0));
        assert!(rig.frame().is_empty());
        rig.nudge(p, CHILD, Vec2::new(10.0, 0.0));
        assert_eq!(rig.frame(), [(t, GestureState::Began)]);
        rig.nudge(p, CHILD, Vec2::new(10.0, 5.0));
        assert_eq!(rig.frame(), [(t, GestureState::Changed)]);

        let rec = rig.arbiter.recognizer::<Transform>(t).unwrap();
        assert_eq!(rec.delta().translation, Vec2::new(0.0, 5.0));
        assert_eq!(rec.total().translation, Vec2::new(10.0, 5.0));
        assert_eq!(rec.total().scale, 1.0);

        rig.input.end(p);
        assert_eq!(rig.frame(), [(t, GestureState::Ended)]);
    }

    #[test]
    fn untracked_components_do_not_begin() {
        let mut rig = Rig::new();
        let config = TransformConfig {
            kinds: TransformKinds::SCALING,
            ..TransformConfig::default()
        };
        let t = rig.add(1, GestureConfig::with_pointers(2, 0), Transform::new(config));
        let p = rig.down(LEFT);
        let q = rig.down(RIGHT);
        rig.frame();

        // Both fingers drag together: translation only.
        rig.nudge(p, LEFT, Vec2::new(0.0, 20.0));
        rig.nudge(q, RIGHT, Vec2::new(0.0, 20.0));
        assert!(rig.frame().is_empty());

        rig.input.end(p);
        rig.input.end(q);
        assert_eq!(rig.frame(), [(t, GestureState::Failed)]);
    }

    #[test]
    fn angles_wrap_to_the_short_way_round() {
        assert!((wrap_angle(1.5 * PI) + 0.5 * PI).abs() < 1e-12);
        assert!((wrap_angle(-1.5 * PI) - 0.5 * PI).abs() < 1e-12);
        assert_eq!(wrap_angle(0.0), 0.0);
    }
}
