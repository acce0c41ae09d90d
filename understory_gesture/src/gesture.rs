// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture states, configuration, and pointer-count bookkeeping.

use kurbo::Point;

use crate::types::GestureId;

/// Recognition state of a gesture.
///
/// Every gesture starts in [`Possible`](Self::Possible). Discrete gestures go straight
/// to [`Ended`](Self::Ended) or [`Failed`](Self::Failed); continuous gestures pass
/// through [`Began`](Self::Began) and [`Changed`](Self::Changed) first.
/// `Ended`, `Failed` and `Cancelled` end a recognition cycle; the gesture is reset to
/// `Possible` at the next frame boundary.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum GestureState {
    /// Waiting for input that matches.
    #[default]
    Possible,
    /// A continuous gesture was recognized and now owns its pointers.
    Began,
    /// A continuous gesture updated.
    Changed,
    /// Recognized. For continuous gestures, the final update.
    Ended,
    /// Interrupted after it began, or cancelled explicitly.
    Cancelled,
    /// Did not match, or lost arbitration.
    Failed,
}

impl GestureState {
    /// Returns true for `Began` and `Changed`.
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Began | Self::Changed)
    }

    /// Returns true for states that end a recognition cycle.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled | Self::Failed)
    }
}

/// How the last pointer batch moved a gesture's pointer count relative to its bounds.
///
/// Recomputed for every batch delivered to the gesture, so a recognizer can react to
/// threshold crossings without redoing the arithmetic.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PointerCountState {
    /// Within bounds, and no bound was crossed by this batch.
    InRange,
    /// Below the minimum, and the batch did not cross it.
    #[default]
    TooFew,
    /// Above the maximum, and the batch did not cross it.
    TooMany,
    /// This batch crossed the minimum (upwards on press, downwards on release).
    PassedMinThreshold,
    /// This batch crossed the maximum.
    PassedMaxThreshold,
    /// This batch crossed both bounds at once.
    PassedMinMaxThreshold,
}

/// Per-gesture configuration.
///
/// A bound of `0` means "unbounded".
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GestureConfig {
    /// Pointers needed before the gesture considers itself engaged.
    pub min_pointers: usize,
    /// Pointers above which the gesture considers itself overloaded.
    pub max_pointers: usize,
    /// Disabled gestures receive no pointers and cannot leave `Failed`/`Possible`.
    pub enabled: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_pointers: 0,
            max_pointers: 0,
            enabled: true,
        }
    }
}

impl GestureConfig {
    /// Config with explicit pointer bounds.
    pub const fn with_pointers(min_pointers: usize, max_pointers: usize) -> Self {
        Self {
            min_pointers,
            max_pointers,
            enabled: true,
        }
    }

    /// Count state after `added` pointers joined `old` existing ones.
    pub fn after_press(&self, old: usize, added: usize) -> PointerCountState {
        let new = old + added;
        let (min, max) = (self.min_pointers, self.max_pointers);
        let mut state = PointerCountState::InRange;

        if min == 0 {
            if old == 0 {
                state = PointerCountState::PassedMinThreshold;
            }
        } else if old < min {
            state = if new >= min {
                PointerCountState::PassedMinThreshold
            } else {
                PointerCountState::TooFew
            };
        }

        if max > 0 {
            if old <= max {
                if new > max {
                    state = if state == PointerCountState::PassedMinThreshold {
                        PointerCountState::PassedMinMaxThreshold
                    } else {
                        PointerCountState::PassedMaxThreshold
                    };
                }
            } else {
                state = PointerCountState::TooMany;
            }
        }
        state
    }

    /// Count state for a move batch with `count` pointers held.
    pub fn after_move(&self, count: usize) -> PointerCountState {
        let (min, max) = (self.min_pointers, self.max_pointers);
        let mut state = PointerCountState::InRange;
        if min > 0 && count < min {
            state = PointerCountState::TooFew;
        }
        if max > 0 && state == PointerCountState::InRange && count > max {
            state = PointerCountState::TooMany;
        }
        state
    }

    /// Count state after `removed` of `old` pointers ended or were cancelled.
    pub fn after_release(&self, old: usize, removed: usize) -> PointerCountState {
        let new = old.saturating_sub(removed);
        let (min, max) = (self.min_pointers, self.max_pointers);
        let mut state = PointerCountState::InRange;

        if min == 0 {
            if new == 0 {
                state = PointerCountState::PassedMinThreshold;
            }
        } else if old >= min {
            if new < min {
                state = PointerCountState::PassedMinThreshold;
            }
        } else {
            state = PointerCountState::TooFew;
        }

        if max > 0 && old > max {
            if new <= max {
                state = if state == PointerCountState::PassedMinThreshold {
                    PointerCountState::PassedMinMaxThreshold
                } else {
                    PointerCountState::PassedMaxThreshold
                };
            } else {
                state = PointerCountState::TooMany;
            }
        }
        state
    }
}

/// A state transition, as reported to recognizers and to the host.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StateChange<K> {
    /// Gesture that changed.
    pub gesture: GestureId,
    /// Node the gesture is attached to.
    pub node: K,
    /// State before the transition.
    pub previous: GestureState,
    /// State after the transition.
    pub state: GestureState,
}

/// Notification queued by the arbiter for the host.
///
/// Drained with [`Arbiter::drain_events`](crate::Arbiter::drain_events).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GestureEvent<K> {
    /// A gesture changed state.
    StateChanged(StateChange<K>),
    /// A gesture was reset to `Possible` at a frame boundary.
    Reset {
        /// Gesture that was reset.
        gesture: GestureId,
        /// Node the gesture is attached to.
        node: K,
    },
}

/// Centroid of a set of points, or `None` for an empty set.
pub fn centroid(points: impl IntoIterator<Item = Point>) -> Option<Point> {
    let mut n = 0_u32;
    let (mut x, mut y) = (0.0, 0.0);
    for p in points {
        x += p.x;
        y += p.y;
        n += 1;
    }
    (n > 0).then(|| Point::new(x / f64::from(n), y / f64::from(n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use PointerCountState::*;

    #[test]
    fn unbounded_gesture_passes_min_on_first_press_and_last_release() {
        let cfg = GestureConfig::default();
        assert_eq!(cfg.after_press(0, 1), PassedMinThreshold);
        assert_eq!(cfg.after_press(1, 1), InRange);
        assert_eq!(cfg.after_move(2), InRange);
        assert_eq!(cfg.after_release(2, 1), InRange);
        assert_eq!(cfg.after_release(1, 1), PassedMinThreshold);
    }

    #[test]
    fn two_finger_minimum() {
        let cfg = GestureConfig::with_pointers(2, 0);
        assert_eq!(cfg.after_press(0, 1), TooFew);
        assert_eq!(cfg.after_move(1), TooFew);
        assert_eq!(cfg.after_press(1, 1), PassedMinThreshold);
        assert_eq!(cfg.after_press(2, 1), InRange);
        assert_eq!(cfg.after_release(3, 1), InRange);
        assert_eq!(cfg.after_release(2, 1), PassedMinThreshold);
        assert_eq!(cfg.after_release(1, 1), TooFew);
    }

    #[test]
    fn maximum_crossings() {
        let cfg = GestureConfig::with_pointers(1, 2);
        assert_eq!(cfg.after_press(0, 3), PassedMinMaxThreshold);
        assert_eq!(cfg.after_press(0, 1), PassedMinThreshold);
        assert_eq!(cfg.after_press(2, 1), PassedMaxThreshold);
        assert_eq!(cfg.after_press(3, 1), TooMany);
        assert_eq!(cfg.after_move(3), TooMany);
        assert_eq!(cfg.after_release(4, 1), TooMany);
        assert_eq!(cfg.after_release(3, 1), PassedMaxThreshold);
        assert_eq!(cfg.after_release(3, 3), PassedMinMaxThreshold);
    }

    #[test]
    fn state_classification() {
        assert!(GestureState::Began.is_in_progress());
        assert!(GestureState::Changed.is_in_progress());
        assert!(!GestureState::Possible.is_in_progress());
        for s in [
            GestureState::Ended,
            GestureState::Cancelled,
            GestureState::Failed,
        ] {
            assert!(s.is_terminal(), "{s:?}");
        }
        assert!(!GestureState::Possible.is_terminal());
    }

    #[test]
    fn centroid_of_points() {
        assert_eq!(centroid(Vec::<Point>::new()), None);
        let c = centroid([Point::new(0.0, 0.0), Point::new(4.0, 2.0)]);
        assert_eq!(c, Some(Point::new(2.0, 1.0)));
    }
}
