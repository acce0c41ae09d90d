// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Rect, Vec2};
use understory_gesture::{Arbiter, GestureConfig, InputHandle, Tags};
use understory_recognizers::{Pan, PanConfig, Tap};
use understory_scene_tree::{LocalNode, NodeId, Tree};

const CELL: f64 = 50.0;

/// A root covering an `n x n` grid of cells, with a pan on the root and a tap plus pan
/// on every cell.
fn build_grid(n: usize) -> (Tree, Arbiter<NodeId>) {
    let mut tree = Tree::new();
    let side = n as f64 * CELL;
    let root = tree.insert(
        None,
        LocalNode {
            local_bounds: Rect::new(0.0, 0.0, side, side),
            ..Default::default()
        },
    );
    let mut arbiter = Arbiter::default();
    arbiter
        .add_gesture(root, GestureConfig::default(), Pan::new(PanConfig::default()))
        .unwrap();
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * CELL;
            let y0 = y as f64 * CELL;
            let cell = tree.insert(
                Some(root),
                LocalNode {
                    local_bounds: Rect::new(x0, y0, x0 + CELL, y0 + CELL),
                    ..Default::default()
                },
            );
            arbiter
                .add_gesture(cell, GestureConfig::default(), Tap::default())
                .unwrap();
            arbiter
                .add_gesture(cell, GestureConfig::default(), Pan::new(PanConfig::default()))
                .unwrap();
        }
    }
    (tree, arbiter)
}

fn cell_center(i: usize, n: usize) -> Point {
    let x = (i % n) as f64 * CELL + CELL / 2.0;
    let y = ((i / n) % n) as f64 * CELL + CELL / 2.0;
    Point::new(x, y)
}

struct Clock(Duration);

impl Clock {
    fn tick(&mut self) -> Duration {
        self.0 += Duration::from_millis(16);
        self.0
    }
}

fn bench_tap_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("tap_cycle");
    for &n in &[4_usize, 16, 64] {
        let (tree, mut arbiter) = build_grid(n);
        let input: InputHandle = arbiter.input_handle();
        let mut clock = Clock(Duration::ZERO);
        let mut i = 0_usize;
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(n * n), &n, |b, &n| {
            b.iter(|| {
                let p = input.begin(cell_center(i, n), Tags::TOUCH).unwrap();
                arbiter.process_frame(&tree, &tree, clock.tick());
                input.end(p);
                arbiter.process_frame(&tree, &tree, clock.tick());
                black_box(arbiter.drain_events().count());
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_multi_pointer_drag(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_pointer_drag");
    let n = 16;
    for &pointers in &[1_usize, 5, 10] {
        let (tree, mut arbiter) = build_grid(n);
        let input = arbiter.input_handle();
        let mut clock = Clock(Duration::ZERO);
        group.throughput(Throughput::Elements(pointers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(pointers),
            &pointers,
            |b, &pointers| {
                b.iter(|| {
                    let starts: Vec<_> = (0..pointers).map(|i| cell_center(i * 7, n)).collect();
                    let ids: Vec<_> = starts
                        .iter()
                        .map(|at| input.begin(*at, Tags::TOUCH).unwrap())
                        .collect();
                    arbiter.process_frame(&tree, &tree, clock.tick());
                    for step in 1..=8 {
                        let by = Vec2::new(f64::from(step) * 3.0, 0.0);
                        for (id, at) in ids.iter().zip(&starts) {
                            input.update(*id, *at + by);
                        }
                        arbiter.process_frame(&tree, &tree, clock.tick());
                    }
                    for id in &ids {
                        input.end(*id);
                    }
                    arbiter.process_frame(&tree, &tree, clock.tick());
                    black_box(arbiter.drain_events().count());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_tap_cycle, bench_multi_pointer_drag);
criterion_main!(benches);
