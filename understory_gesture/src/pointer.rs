// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer registry: identity, per-frame buffering, and reference counting.
//!
//! ## Producers and the frame thread
//!
//! Input sources talk to an [`InputHandle`]. Handles are cheap to clone and may live on
//! other threads; every call appends to a shared frame buffer under one mutex.
//! Once per frame the [`Arbiter`](crate::Arbiter) drains that buffer: it swaps the
//! pending lists out under the lock, releases the lock, and only then hit-tests new
//! pointers and dispatches to gestures. Producers never wait on arbitration.
//!
//! ## Coalescing
//!
//! Several moves of one pointer before a drain collapse into the latest position.
//! The pointer's previous position is its position at the start of the frame, so a
//! gesture sees exactly one (previous, current) pair per pointer per frame.
//!
//! ## Termination
//!
//! Ending or cancelling an unknown pointer, or one already terminated in the same
//! frame, is a logged no-op. A terminated pointer stays readable until every gesture
//! that retained it has released it.
//!
//! ## Returned pointers
//!
//! When a gesture cancels a pointer with "return" semantics the registry queues a
//! fresh pointer at the same position, tagged [`PointerFlags::RETURNED`], for the next
//! frame. The producer keeps using the old id; the handle forwards it to the new one.
//!
//! ```
//! use understory_gesture::{PointerRegistry, Tags};
//! use kurbo::Point;
//!
//! let registry: PointerRegistry<u32> = PointerRegistry::new();
//! let input = registry.input_handle();
//! let id = input.begin(Point::new(10.0, 10.0), Tags::TOUCH).unwrap();
//! input.update(id, Point::new(12.0, 10.0));
//! input.update(id, Point::new(15.0, 10.0));
//! input.end(id);
//! input.end(id); // duplicate: logged, ignored
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use kurbo::Point;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::types::{HitTester, LayerId, PointerFlags, PointerId, Tags};

/// One physical contact as seen by gestures.
#[derive(Clone, Debug, PartialEq)]
pub struct Pointer<K> {
    pub(crate) id: PointerId,
    pub(crate) position: Point,
    pub(crate) previous_position: Point,
    pub(crate) target: Option<K>,
    pub(crate) layer: Option<LayerId>,
    pub(crate) tags: Tags,
    pub(crate) flags: PointerFlags,
    pub(crate) ref_count: u32,
    pub(crate) terminated: bool,
}

impl<K: Copy> Pointer<K> {
    /// Stable id of this pointer.
    pub fn id(&self) -> PointerId {
        self.id
    }

    /// Position in screen space.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Position at the start of the current frame.
    pub fn previous_position(&self) -> Point {
        self.previous_position
    }

    /// Node hit when the pointer began, if any.
    pub fn target(&self) -> Option<K> {
        self.target
    }

    /// Layer whose hit tester produced [`target`](Self::target).
    pub fn layer(&self) -> Option<LayerId> {
        self.layer
    }

    /// Source-device classification.
    pub fn tags(&self) -> Tags {
        self.tags
    }

    /// Origin flags.
    pub fn flags(&self) -> PointerFlags {
        self.flags
    }

    /// Number of gestures currently retaining this pointer.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Returns true once the pointer has ended or been cancelled.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[derive(Clone, Copy, Debug)]
struct BeganPointer {
    id: PointerId,
    position: Point,
    tags: Tags,
    flags: PointerFlags,
}

#[derive(Debug, Default)]
struct Lists {
    began: Vec<BeganPointer>,
    moved: Vec<(PointerId, Point)>,
    ended: Vec<PointerId>,
    cancelled: Vec<PointerId>,
}

impl Lists {
    fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.began, &mut other.began);
        core::mem::swap(&mut self.moved, &mut other.moved);
        core::mem::swap(&mut self.ended, &mut other.ended);
        core::mem::swap(&mut self.cancelled, &mut other.cancelled);
    }

    fn clear(&mut self) {
        self.began.clear();
        self.moved.clear();
        self.ended.clear();
        self.cancelled.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Refused {
    Unknown,
    Duplicate,
}

/// State shared between producers and the frame thread.
#[derive(Debug, Default)]
struct Shared {
    next_id: u64,
    live: HashSet<PointerId>,
    // Returned pointers: old id -> replacement. Kept flat (no chains).
    aliases: HashMap<PointerId, PointerId>,
    lists: Lists,
    moved_index: HashMap<PointerId, usize>,
    closed: bool,
}

impl Shared {
    fn push_began(&mut self, position: Point, tags: Tags, flags: PointerFlags) -> PointerId {
        self.next_id += 1;
        let id = PointerId(self.next_id);
        self.live.insert(id);
        self.lists.began.push(BeganPointer {
            id,
            position,
            tags,
            flags,
        });
        id
    }

    fn resolve(&self, id: PointerId) -> PointerId {
        self.aliases.get(&id).copied().unwrap_or(id)
    }

    fn coalesce_move(&mut self, id: PointerId, position: Point) {
        match self.moved_index.get(&id) {
            Some(&slot) => self.lists.moved[slot].1 = position,
            None => {
                self.moved_index.insert(id, self.lists.moved.len());
                self.lists.moved.push((id, position));
            }
        }
    }

    fn terminate(&mut self, id: PointerId, cancel: bool) -> Result<PointerId, Refused> {
        let id = self.resolve(id);
        if self.lists.ended.contains(&id) || self.lists.cancelled.contains(&id) {
            return Err(Refused::Duplicate);
        }
        if !self.live.remove(&id) {
            return Err(Refused::Unknown);
        }
        self.aliases.retain(|_, to| *to != id);
        if cancel {
            self.lists.cancelled.push(id);
        } else {
            self.lists.ended.push(id);
        }
        Ok(id)
    }

    fn alias(&mut self, from: PointerId, to: PointerId) {
        for target in self.aliases.values_mut() {
            if *target == from {
                *target = to;
            }
        }
        self.aliases.insert(from, to);
    }
}

/// Producer-side handle to a [`PointerRegistry`].
///
/// All calls are no-ops once the owning arbiter has shut down.
#[derive(Clone, Debug)]
pub struct InputHandle {
    shared: Arc<Mutex<Shared>>,
}

impl InputHandle {
    /// Report a new contact. Returns `None` after shutdown.
    pub fn begin(&self, position: Point, tags: Tags) -> Option<PointerId> {
        let mut shared = self.shared.lock();
        if shared.closed {
            debug!("pointer begin after shutdown ignored");
            return None;
        }
        let id = shared.push_began(position, tags, PointerFlags::empty());
        trace!(?id, ?position, "pointer queued");
        Some(id)
    }

    /// Report a new position for a live contact.
    pub fn update(&self, id: PointerId, position: Point) {
        let mut shared = self.shared.lock();
        if shared.closed {
            return;
        }
        let resolved = shared.resolve(id);
        if !shared.live.contains(&resolved) {
            warn!(?id, "move for unknown or terminated pointer ignored");
            return;
        }
        shared.coalesce_move(resolved, position);
    }

    /// Report that a contact lifted.
    pub fn end(&self, id: PointerId) {
        self.terminate(id, false);
    }

    /// Report that the input source lost a contact.
    pub fn cancel(&self, id: PointerId) {
        self.terminate(id, true);
    }

    /// Returns true while `id` (or the pointer it was returned as) is live.
    pub fn is_live(&self, id: PointerId) -> bool {
        let shared = self.shared.lock();
        shared.live.contains(&shared.resolve(id))
    }

    fn terminate(&self, id: PointerId, cancel: bool) {
        let mut shared = self.shared.lock();
        if shared.closed {
            return;
        }
        match shared.terminate(id, cancel) {
            Ok(resolved) => trace!(?id, ?resolved, cancel, "pointer termination queued"),
            Err(Refused::Duplicate) => {
                warn!(?id, cancel, "pointer already terminated this frame");
            }
            Err(Refused::Unknown) => warn!(?id, cancel, "termination for unknown pointer ignored"),
        }
    }
}

/// Pointer ids touched by one drained frame, per phase.
#[derive(Debug, Default)]
pub(crate) struct FrameBatch {
    pub(crate) began: Vec<PointerId>,
    pub(crate) moved: Vec<PointerId>,
    pub(crate) ended: Vec<PointerId>,
    pub(crate) cancelled: Vec<PointerId>,
}

impl FrameBatch {
    fn clear(&mut self) {
        self.began.clear();
        self.moved.clear();
        self.ended.clear();
        self.cancelled.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.began.is_empty()
            && self.moved.is_empty()
            && self.ended.is_empty()
            && self.cancelled.is_empty()
    }
}

/// Authoritative set of live pointers.
///
/// Owned by the [`Arbiter`](crate::Arbiter); producers reach it through
/// [`InputHandle`]s obtained from [`input_handle`](Self::input_handle).
#[derive(Debug)]
pub struct PointerRegistry<K> {
    shared: Arc<Mutex<Shared>>,
    pointers: BTreeMap<PointerId, Pointer<K>>,
    inbox: Lists,
}

impl<K: Copy + core::fmt::Debug> Default for PointerRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + core::fmt::Debug> PointerRegistry<K> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            pointers: BTreeMap::new(),
            inbox: Lists::default(),
        }
    }

    /// A new producer handle feeding this registry.
    pub fn input_handle(&self) -> InputHandle {
        InputHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Look up a pointer, including terminated pointers that are still retained.
    pub fn get(&self, id: PointerId) -> Option<&Pointer<K>> {
        self.pointers.get(&id)
    }

    /// All known pointers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Pointer<K>> + '_ {
        self.pointers.values()
    }

    /// Number of known pointers.
    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    /// Returns true if no pointers are known.
    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    /// Returns true once the registry has been closed by shutdown.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Drain the producer buffers and apply them.
    ///
    /// New pointers are hit-tested and inserted, every pointer's previous position is
    /// rolled forward, coalesced moves are applied, and terminations are marked.
    pub(crate) fn begin_frame(&mut self, hits: &dyn HitTester<K>, batch: &mut FrameBatch) {
        batch.clear();
        {
            let mut shared = self.shared.lock();
            shared.lists.swap(&mut self.inbox);
            shared.moved_index.clear();
        }

        for began in self.inbox.began.drain(..) {
            let hit = hits.hit_layer(began.position);
            let pointer = Pointer {
                id: began.id,
                position: began.position,
                previous_position: began.position,
                target: hit.map(|(node, _)| node),
                layer: hit.map(|(_, layer)| layer),
                tags: began.tags,
                flags: began.flags,
                ref_count: 0,
                terminated: false,
            };
            trace!(id = ?began.id, target = ?pointer.target, "pointer began");
            self.pointers.insert(began.id, pointer);
            batch.began.push(began.id);
        }

        for pointer in self.pointers.values_mut() {
            pointer.previous_position = pointer.position;
        }
        for (id, position) in self.inbox.moved.drain(..) {
            if let Some(pointer) = self.pointers.get_mut(&id) {
                if !pointer.terminated {
                    pointer.position = position;
                    batch.moved.push(id);
                }
            }
        }

        for id in self.inbox.ended.drain(..) {
            if let Some(pointer) = self.pointers.get_mut(&id) {
                pointer.terminated = true;
                batch.ended.push(id);
            }
        }
        for id in self.inbox.cancelled.drain(..) {
            if let Some(pointer) = self.pointers.get_mut(&id) {
                if !pointer.terminated {
                    pointer.terminated = true;
                    batch.cancelled.push(id);
                }
            }
        }
        self.inbox.clear();
    }

    /// Forget pointers terminated this frame that nobody retains.
    pub(crate) fn finish_frame(&mut self, batch: &FrameBatch) {
        for id in batch.ended.iter().chain(&batch.cancelled) {
            if self.pointers.get(id).is_some_and(|p| p.ref_count == 0) {
                self.pointers.remove(id);
            }
        }
    }

    pub(crate) fn retain(&mut self, id: PointerId) {
        if let Some(pointer) = self.pointers.get_mut(&id) {
            pointer.ref_count += 1;
        }
    }

    /// Drop one reference. Returns the remaining count, or `None` for unknown ids.
    ///
    /// A terminated pointer is forgotten when its count reaches zero.
    pub(crate) fn release(&mut self, id: PointerId) -> Option<u32> {
        let pointer = self.pointers.get_mut(&id)?;
        pointer.ref_count = pointer.ref_count.saturating_sub(1);
        let remaining = pointer.ref_count;
        if remaining == 0 && pointer.terminated {
            self.pointers.remove(&id);
        }
        Some(remaining)
    }

    /// Cancel a pointer on behalf of a gesture. Takes effect next frame.
    ///
    /// With `return_pointer`, a replacement tagged [`PointerFlags::RETURNED`] begins at
    /// the same position next frame and the producer's id is forwarded to it.
    pub(crate) fn cancel(&mut self, id: PointerId, return_pointer: bool) -> Option<PointerId> {
        let pointer = self.pointers.get(&id)?;
        if pointer.terminated {
            return None;
        }
        let mut shared = self.shared.lock();
        if shared.closed {
            return None;
        }
        if let Err(reason) = shared.terminate(id, true) {
            debug!(?id, ?reason, "pointer already terminating; cancel skipped");
            return None;
        }
        if !return_pointer {
            debug!(?id, "pointer cancelled by gesture");
            return None;
        }
        let replacement = shared.push_began(
            pointer.position,
            pointer.tags,
            pointer.flags | PointerFlags::RETURNED,
        );
        shared.alias(id, replacement);
        debug!(?id, ?replacement, "pointer cancelled and returned");
        Some(replacement)
    }

    /// Stop accepting input and forget every pointer.
    pub(crate) fn close(&mut self) {
        {
            let mut shared = self.shared.lock();
            shared.closed = true;
            shared.live.clear();
            shared.aliases.clear();
            shared.moved_index.clear();
            shared.lists.clear();
        }
        self.pointers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn nothing(_: Point) -> Option<u32> {
        None
    }

    fn everywhere(_: Point) -> Option<u32> {
        Some(1)
    }

    #[test]
    fn moves_coalesce_and_previous_is_frame_start() {
        let mut reg: PointerRegistry<u32> = PointerRegistry::new();
        let input = reg.input_handle();
        let mut batch = FrameBatch::default();

        let id = input.begin(Point::new(0.0, 0.0), Tags::TOUCH).unwrap();
        reg.begin_frame(&everywhere, &mut batch);
        assert_eq!(batch.began, [id]);
        assert_eq!(reg.get(id).unwrap().target(), Some(1));

        input.update(id, Point::new(5.0, 0.0));
        input.update(id, Point::new(9.0, 0.0));
        reg.begin_frame(&everywhere, &mut batch);
        assert_eq!(batch.moved, [id], "one move per pointer per frame");
        let p = reg.get(id).unwrap();
        assert_eq!(p.position(), Point::new(9.0, 0.0));
        assert_eq!(p.previous_position(), Point::new(0.0, 0.0));

        // A frame without moves collapses previous onto current.
        reg.begin_frame(&everywhere, &mut batch);
        assert!(batch.is_empty());
        let p = reg.get(id).unwrap();
        assert_eq!(p.previous_position(), p.position());
    }

    #[test]
    fn duplicate_and_unknown_terminations_are_ignored() {
        let mut reg: PointerRegistry<u32> = PointerRegistry::new();
        let input = reg.input_handle();
        let mut batch = FrameBatch::default();

        let id = input.begin(Point::ORIGIN, Tags::MOUSE).unwrap();
        reg.begin_frame(&nothing, &mut batch);
        input.end(id);
        input.end(id);
        input.cancel(id);
        input.end(PointerId(999));
        reg.begin_frame(&nothing, &mut batch);
        assert_eq!(batch.ended, [id]);
        assert!(batch.cancelled.is_empty());

        reg.finish_frame(&batch);
        assert!(reg.get(id).is_none());
        assert!(!input.is_live(id));
    }

    #[test]
    fn begin_and_end_in_one_frame_deliver_both_phases() {
        let mut reg: PointerRegistry<u32> = PointerRegistry::new();
        let input = reg.input_handle();
        let mut batch = FrameBatch::default();

        let id = input.begin(Point::ORIGIN, Tags::TOUCH).unwrap();
        input.update(id, Point::new(3.0, 4.0));
        input.end(id);
        reg.begin_frame(&everywhere, &mut batch);
        assert_eq!(batch.began, [id]);
        assert_eq!(batch.moved, [id], "the release position is delivered before the end");
        assert_eq!(batch.ended, [id]);
        assert_eq!(reg.get(id).unwrap().position(), Point::new(3.0, 4.0));
    }

    #[test]
    fn retained_pointer_outlives_termination_until_released() {
        let mut reg: PointerRegistry<u32> = PointerRegistry::new();
        let input = reg.input_handle();
        let mut batch = FrameBatch::default();

        let id = input.begin(Point::ORIGIN, Tags::TOUCH).unwrap();
        reg.begin_frame(&everywhere, &mut batch);
        reg.retain(id);
        reg.retain(id);
        input.end(id);
        reg.begin_frame(&everywhere, &mut batch);
        reg.finish_frame(&batch);

        let p = reg.get(id).unwrap();
        assert!(p.is_terminated());
        assert_eq!(p.ref_count(), 2);
        assert_eq!(reg.release(id), Some(1));
        assert!(reg.get(id).is_some());
        assert_eq!(reg.release(id), Some(0));
        assert!(reg.get(id).is_none());
    }

    #[test]
    fn returned_pointer_is_forwarded() {
        let mut reg: PointerRegistry<u32> = PointerRegistry::new();
        let input = reg.input_handle();
        let mut batch = FrameBatch::default();

        let id = input.begin(Point::new(4.0, 4.0), Tags::PEN).unwrap();
        reg.begin_frame(&everywhere, &mut batch);
        let replacement = reg.cancel(id, true).unwrap();

        input.update(id, Point::new(6.0, 4.0));
        reg.begin_frame(&everywhere, &mut batch);
        assert_eq!(batch.cancelled, [id]);
        assert_eq!(batch.began, [replacement]);
        assert_eq!(batch.moved, [replacement]);

        let p = reg.get(replacement).unwrap();
        assert!(p.flags().contains(PointerFlags::RETURNED));
        assert_eq!(p.tags(), Tags::PEN);
        assert_eq!(p.position(), Point::new(6.0, 4.0));
        assert_eq!(p.previous_position(), Point::new(4.0, 4.0));

        input.end(id);
        reg.begin_frame(&everywhere, &mut batch);
        assert_eq!(batch.ended, [replacement]);
        assert!(!input.is_live(id));
    }

    #[test]
    fn cancel_after_producer_end_is_skipped() {
        let mut reg: PointerRegistry<u32> = PointerRegistry::new();
        let input = reg.input_handle();
        let mut batch = FrameBatch::default();

        let id = input.begin(Point::ORIGIN, Tags::TOUCH).unwrap();
        reg.begin_frame(&everywhere, &mut batch);
        input.end(id);
        assert_eq!(reg.cancel(id, true), None);
        reg.begin_frame(&everywhere, &mut batch);
        assert_eq!(batch.ended, [id]);
        assert!(batch.cancelled.is_empty());
        assert!(batch.began.is_empty());
    }

    #[test]
    fn closed_registry_refuses_input() {
        let mut reg: PointerRegistry<u32> = PointerRegistry::new();
        let input = reg.input_handle();
        let id = input.begin(Point::ORIGIN, Tags::TOUCH).unwrap();
        reg.close();
        assert!(reg.is_closed());
        assert_eq!(input.begin(Point::ORIGIN, Tags::TOUCH), None);
        input.update(id, Point::new(1.0, 1.0));
        input.end(id);

        let mut batch = FrameBatch::default();
        reg.begin_frame(&everywhere, &mut batch);
        assert!(batch.is_empty());
        assert!(reg.is_empty());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Begin,
        Move(usize, f64),
        End(usize),
        Cancel(usize),
        Frame,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Begin),
            (0..6_usize, -50.0..50.0_f64).prop_map(|(i, x)| Op::Move(i, x)),
            (0..6_usize).prop_map(Op::End),
            (0..6_usize).prop_map(Op::Cancel),
            Just(Op::Frame),
        ]
    }

    proptest! {
        #[test]
        fn every_pointer_terminates_at_most_once(ops in prop::collection::vec(op(), 1..80)) {
            let mut reg: PointerRegistry<u32> = PointerRegistry::new();
            let input = reg.input_handle();
            let mut batch = FrameBatch::default();
            let mut issued: Vec<PointerId> = Vec::new();
            let mut began: HashSet<PointerId> = HashSet::new();
            let mut terminated: HashSet<PointerId> = HashSet::new();
            let mut last_move: HashMap<PointerId, f64> = HashMap::new();

            let ops = ops.into_iter().chain(core::iter::once(Op::Frame));
            for op in ops {
                match op {
                    Op::Begin => issued.extend(input.begin(Point::ORIGIN, Tags::TOUCH)),
                    Op::Move(i, x) => if let Some(&id) = issued.get(i) {
                        if input.is_live(id) {
                            last_move.insert(id, x);
                        }
                        input.update(id, Point::new(x, 0.0));
                    },
                    Op::End(i) => if let Some(&id) = issued.get(i) { input.end(id); },
                    Op::Cancel(i) => if let Some(&id) = issued.get(i) { input.cancel(id); },
                    Op::Frame => {
                        reg.begin_frame(&everywhere, &mut batch);
                        for id in &batch.began {
                            prop_assert!(began.insert(*id), "began twice: {id:?}");
                        }
                        for id in &batch.moved {
                            let expected = last_move.remove(id);
                            prop_assert_eq!(expected.map(|x| Point::new(x, 0.0)), reg.get(*id).map(|p| p.position()));
                        }
                        for id in batch.ended.iter().chain(&batch.cancelled) {
                            prop_assert!(began.contains(id));
                            prop_assert!(terminated.insert(*id), "terminated twice: {id:?}");
                        }
                        reg.finish_frame(&batch);
                        for id in &terminated {
                            prop_assert!(reg.get(*id).is_none());
                        }
                        last_move.clear();
                    }
                }
            }
        }
    }
}
