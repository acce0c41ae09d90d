// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_recognizers --heading-base-level=0

//! Understory Recognizers: ready-made gesture policies for `understory_gesture`.
//!
//! Every recognizer here is built only on the public [`Recognizer`] interface and works
//! with any node key type.
//!
//! | Recognizer | Kind | Recognizes when |
//! |---|---|---|
//! | [`Tap`] | discrete | the required number of taps completes within the limits |
//! | [`Press`] | discrete | pointers touch down |
//! | [`Release`] | discrete | the pointers that touched down lift again |
//! | [`LongPress`] | discrete | pointers stay down for the configured time |
//! | [`Pan`] | continuous | the pointer cluster moves past a threshold |
//! | [`Flick`] | discrete | the cluster lifts after a fast enough movement |
//! | [`Transform`] | continuous | the pointers translate, rotate or spread past a threshold |
//!
//! `Press` and `Release` neither prevent nor can be prevented by other gestures unless a
//! delegate says otherwise, so they can observe contacts alongside anything else.
//!
//! Distances are in the host's screen units; times are on the arbiter's frame clock.
//!
//! ```
//! use understory_gesture::{Arbiter, GestureConfig};
//! use understory_recognizers::{Pan, PanConfig, Tap, TapConfig};
//!
//! let mut arbiter = Arbiter::<u32>::default();
//! let double_tap = arbiter
//!     .add_gesture(0, GestureConfig::default(), Tap::new(TapConfig { taps_required: 2, ..Default::default() }))
//!     .unwrap();
//! let tap = arbiter.add_gesture(0, GestureConfig::default(), Tap::default()).unwrap();
//! arbiter.add_gesture(0, GestureConfig::default(), Pan::new(PanConfig::default())).unwrap();
//!
//! // A single tap only counts once a double tap is ruled out.
//! arbiter.set_require_to_fail(tap, Some(double_tap)).unwrap();
//! ```
//!
//! [`Recognizer`]: understory_gesture::Recognizer

mod flick;
mod long_press;
mod pan;
mod press;
mod tap;
mod transform;

pub use flick::{Flick, FlickConfig, FlickDirection};
pub use long_press::{LongPress, LongPressConfig};
pub use pan::{Pan, PanConfig};
pub use press::{Press, PressConfig, Release};
pub use tap::{Tap, TapConfig};
pub use transform::{Transform, TransformConfig, TransformDelta, TransformKinds};
