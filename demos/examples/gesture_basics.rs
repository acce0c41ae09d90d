// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture basics.
//!
//! A scrolling list holds a button. The button has a tap, the list has a pan. A short
//! touch on the button taps it; dragging from the button scrolls the list instead.
//!
//! Run:
//! - `cargo run -p understory_demos --example gesture_basics`
//! - `RUST_LOG=understory_gesture=debug cargo run -p understory_demos --example gesture_basics`

use core::time::Duration;

use kurbo::{Point, Rect, Vec2};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use understory_gesture::{Arbiter, GestureConfig, GestureEvent, GestureId, Tags};
use understory_recognizers::{Pan, PanConfig, Tap};
use understory_scene_tree::{LocalNode, NodeId, Tree};

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let mut tree = Tree::new();
    let list = tree.insert(
        None,
        LocalNode {
            local_bounds: Rect::new(0.0, 0.0, 320.0, 480.0),
            ..Default::default()
        },
    );
    let button = tree.insert(
        Some(list),
        LocalNode {
            local_bounds: Rect::new(20.0, 20.0, 140.0, 60.0),
            ..Default::default()
        },
    );

    let mut arbiter: Arbiter<NodeId> = Arbiter::default();
    let pan = arbiter
        .add_gesture(list, GestureConfig::default(), Pan::new(PanConfig::default()))
        .unwrap();
    let tap = arbiter
        .add_gesture(button, GestureConfig::default(), Tap::default())
        .unwrap();
    let names = |id: GestureId| {
        if id == pan {
            "list pan"
        } else if id == tap {
            "button tap"
        } else {
            "?"
        }
    };

    let input = arbiter.input_handle();
    let mut now = Duration::ZERO;
    let mut frame = |arbiter: &mut Arbiter<NodeId>, label: &str| {
        now += Duration::from_millis(16);
        arbiter.process_frame(&tree, &tree, now);
        println!("-- {label}");
        for event in arbiter.drain_events() {
            match event {
                GestureEvent::StateChanged(c) => {
                    println!("  {:<10} {:?} -> {:?}", names(c.gesture), c.previous, c.state);
                }
                GestureEvent::Reset { gesture, .. } => {
                    println!("  {:<10} reset", names(gesture));
                }
            }
        }
    };

    println!("== Tap ==");
    let at = Point::new(60.0, 40.0);
    let finger = input.begin(at, Tags::TOUCH).unwrap();
    frame(&mut arbiter, "finger down on the button");
    input.end(finger);
    frame(&mut arbiter, "finger up");

    println!("== Drag from the button ==");
    let finger = input.begin(at, Tags::TOUCH).unwrap();
    frame(&mut arbiter, "finger down on the button");
    for step in 1..=3 {
        input.update(finger, at + Vec2::new(0.0, 10.0 * f64::from(step)));
        frame(&mut arbiter, "finger moves");
        if let Some(pan) = arbiter.recognizer::<Pan>(pan) {
            println!("  translation = {:?}", pan.translation());
        }
    }
    input.end(finger);
    frame(&mut arbiter, "finger up");
}
