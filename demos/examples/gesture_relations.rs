// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture relations.
//!
//! A photo view carries a double tap (zoom), a single tap (toggle chrome) that waits for
//! the double tap to fail, and a long press (context menu). A global delegate lets the
//! long press coexist with a press observer.
//!
//! Run:
//! - `cargo run -p understory_demos --example gesture_relations`

use core::time::Duration;
use std::sync::Arc;

use kurbo::Point;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use understory_gesture::{
    Arbiter, GestureConfig, GestureDelegate, GestureEvent, GestureId, GestureInfo, GestureState,
    HitTester, SceneGraph, Tags,
};
use understory_recognizers::{LongPress, LongPressConfig, Press, PressConfig, Tap, TapConfig};

/// A single photo node; everything hits it.
struct Photo;

impl SceneGraph<u32> for Photo {
    fn parent_of(&self, _: u32) -> Option<u32> {
        None
    }
    fn child_count(&self, _: u32) -> usize {
        0
    }
    fn child_at(&self, _: u32, _: usize) -> Option<u32> {
        None
    }
    fn is_active(&self, node: u32) -> bool {
        node == 0
    }
}

impl HitTester<u32> for Photo {
    fn hit(&self, _: Point) -> Option<u32> {
        Some(0)
    }
}

/// Lets long presses run alongside anything.
struct LongPressFriendly;

impl GestureDelegate<u32> for LongPressFriendly {
    fn should_recognize_simultaneously(
        &self,
        first: &GestureInfo<'_, u32>,
        second: &GestureInfo<'_, u32>,
    ) -> bool {
        first.is::<LongPress>() || second.is::<LongPress>()
    }
}

struct Session {
    arbiter: Arbiter<u32>,
    now: Duration,
    names: Vec<(GestureId, &'static str)>,
}

impl Session {
    fn step(&mut self, ms: u64) {
        self.now += Duration::from_millis(ms);
        self.arbiter.process_frame(&Photo, &Photo, self.now);
        for event in self.arbiter.drain_events() {
            if let GestureEvent::StateChanged(c) = event {
                if c.state != GestureState::Possible {
                    let name = self
                        .names
                        .iter()
                        .find(|(id, _)| *id == c.gesture)
                        .map_or("?", |(_, n)| n);
                    println!("  t={:>4}ms {name:<12} {:?}", self.now.as_millis(), c.state);
                }
            }
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let mut arbiter = Arbiter::default();
    let zoom = arbiter
        .add_gesture(
            0,
            GestureConfig::default(),
            Tap::new(TapConfig {
                taps_required: 2,
                time_limit: Some(Duration::from_millis(300)),
                distance_limit: Some(24.0),
            }),
        )
        .unwrap();
    let chrome = arbiter
        .add_gesture(0, GestureConfig::default(), Tap::default())
        .unwrap();
    arbiter.set_require_to_fail(chrome, Some(zoom)).unwrap();
    let menu = arbiter
        .add_gesture(
            0,
            GestureConfig::default(),
            LongPress::new(LongPressConfig::default()),
        )
        .unwrap();
    let press = arbiter
        .add_gesture(0, GestureConfig::default(), Press::new(PressConfig::default()))
        .unwrap();
    arbiter.set_global_delegate(Some(Arc::new(LongPressFriendly)));

    let input = arbiter.input_handle();
    let mut s = Session {
        arbiter,
        now: Duration::ZERO,
        names: vec![
            (zoom, "zoom"),
            (chrome, "chrome"),
            (menu, "menu"),
            (press, "press"),
        ],
    };
    let at = Point::new(100.0, 100.0);

    println!("== One tap: chrome toggles once zoom gives up ==");
    let f = input.begin(at, Tags::TOUCH).unwrap();
    s.step(16);
    input.end(f);
    s.step(16);
    s.step(400);

    println!("== Two taps: zoom ==");
    for _ in 0..2 {
        let f = input.begin(at, Tags::TOUCH).unwrap();
        s.step(16);
        input.end(f);
        s.step(16);
    }
    s.step(400);

    println!("== Hold: context menu ==");
    let f = input.begin(at, Tags::TOUCH).unwrap();
    s.step(16);
    s.step(1200);
    input.end(f);
    s.step(16);
    s.step(400);
}
