// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flick: a fast movement right before the pointers lift.

use core::time::Duration;

use kurbo::Vec2;
use tracing::trace;
use understory_gesture::{
    GestureCx, GestureState, NodeKey, PointerCountState, PointerId, Recognizer,
};

/// Axis constraint for [`Flick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlickDirection {
    /// Any direction.
    #[default]
    Any,
    /// Only the horizontal component counts.
    Horizontal,
    /// Only the vertical component counts.
    Vertical,
}

/// Window and distances for [`Flick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlickConfig {
    /// Only movement within this long before the release counts.
    pub flick_time: Duration,
    /// Distance the counted movement must cover.
    pub min_distance: f64,
    /// Distance the cluster must move at all before a flick is considered.
    pub movement_threshold: f64,
    /// Axis constraint.
    pub direction: FlickDirection,
}

impl Default for FlickConfig {
    fn default() -> Self {
        Self {
            flick_time: Duration::from_millis(100),
            min_distance: 40.0,
            movement_threshold: 20.0,
            direction: FlickDirection::Any,
        }
    }
}

/// Recognizes on release if the cluster moved far enough within the flick window.
#[derive(Clone, Debug, Default)]
pub struct Flick {
    config: FlickConfig,
    engaged: bool,
    moving: bool,
    travelled: Vec2,
    // (frame time, centroid movement) for recent moves.
    samples: Vec<(Duration, Vec2)>,
    vector: Vec2,
    duration: Duration,
}

impl Flick {
    /// A flick recognizer with the given window.
    pub fn new(config: FlickConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Movement within the window of the last recognized flick.
    pub fn flick_vector(&self) -> Vec2 {
        self.vector
    }

    /// Time spanned by the movement of the last recognized flick.
    pub fn flick_duration(&self) -> Duration {
        self.duration
    }
}

impl<K: NodeKey> Recognizer<K> for Flick {
    fn pointers_began(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        match cx.pointer_count_state() {
            PointerCountState::PassedMaxThreshold | PointerCountState::PassedMinMaxThreshold => {
                if cx.state() == GestureState::Possible {
                    cx.set_state(GestureState::Failed);
                }
            }
            PointerCountState::PassedMinThreshold => {
                // Pressing again while already engaged is not a flick.
                if self.engaged {
                    cx.set_state(GestureState::Failed);
                } else {
                    self.engaged = true;
                }
            }
            _ => {}
        }
    }

    fn pointers_moved(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        let (Some(now), Some(before)) = (cx.screen_position(), cx.previous_screen_position())
        else {
            return;
        };
        let step = now - before;
        if !self.moving {
            self.travelled += step;
            let threshold = self.config.movement_threshold;
            self.moving = self.travelled.hypot2() >= threshold * threshold;
        }
        let horizon = cx.now().saturating_sub(self.config.flick_time);
        self.samples.retain(|(at, _)| *at >= horizon);
        self.samples.push((cx.now(), step));
    }

    fn pointers_ended(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if cx.pointer_count() > 0 {
            return;
        }
        if !self.engaged || !self.moving {
            cx.set_state(GestureState::Failed);
            return;
        }
        let horizon = cx.now().saturating_sub(self.config.flick_time);
        let mut first = None;
        let mut total = Vec2::ZERO;
        for (at, step) in self.samples.iter().filter(|(at, _)| *at >= horizon) {
            first.get_or_insert(*at);
            total += *step;
        }
        match self.config.direction {
            FlickDirection::Any => {}
            FlickDirection::Horizontal => total.y = 0.0,
            FlickDirection::Vertical => total.x = 0.0,
        }
        let min = self.config.min_distance;
        if total.hypot2() < min * min {
            trace!(gesture = ?cx.id(), "release too slow for a flick");
            cx.set_state(GestureState::Failed);
            return;
        }
        self.vector = total;
        self.duration = first.map_or(Duration::ZERO, |at| cx.now().saturating_sub(at));
        cx.set_state(GestureState::Ended);
    }

    fn reset(&mut self) {
        self.engaged = false;
        self.moving = false;
        self.travelled = Vec2::ZERO;
        self.samples.clear();
    }
}
