// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The arbiter: sole authority over gesture state.
//!
//! ## Frame loop
//!
//! [`Arbiter::process_frame`] runs once per frame:
//!
//! 1. Gestures that ended a cycle last frame are reset to `Possible`.
//! 2. The pointer registry is drained; new pointers are hit-tested.
//! 3. Elapsed gesture deadlines fire.
//! 4. Pointers are dispatched in four phases: began, moved, ended, cancelled.
//! 5. Pointers that terminated and are not retained are forgotten.
//! 6. Gestures that ended a cycle during this frame are reset.
//!
//! ## Arbitration
//!
//! A gesture asking for `Began`, or for `Ended` straight from `Possible`, is checked
//! against every other gesture on its node, its ancestors and its descendants. If one
//! of them is already in progress and can prevent it, the request becomes `Failed`.
//! Otherwise the request is approved and every still-possible gesture it can prevent is
//! failed.
//!
//! Prevention between `A` and `B` is decided as follows. A global delegate that lets
//! them recognize simultaneously rules it out. Otherwise, if `A` has a delegate, it
//! decides. If not, `A`'s recognizer must agree, `B` must agree to be prevented (again
//! through its delegate if it has one), and the two must not be friendly.

use core::any::Any;
use core::time::Duration;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, trace, trace_span, warn};

use crate::error::{Error, Result};
use crate::gesture::{GestureConfig, GestureEvent, GestureState, StateChange, centroid};
use crate::hierarchy;
use crate::pointer::{FrameBatch, InputHandle, Pointer, PointerRegistry};
use crate::recognizer::{GestureCx, GestureDelegate, GestureInfo, Pending, Recognizer, Request};
use crate::scratch::Scratch;
use crate::store::GestureStore;
use crate::types::{GestureId, HitTester, NodeKey, PointerId, SceneGraph};

/// Which pointer phase is being dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Began,
    Moved,
    Ended,
    Cancelled,
}

/// What happens to retained pointers when a gesture is cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Release {
    /// Drop the references.
    Plain,
    /// Drop the references, then cancel and return pointers nobody else retains.
    CancelOrphans,
}

/// Coordinates gestures attached to a host tree.
///
/// Owns the [`PointerRegistry`]. The tree and the hit tester stay with the host and
/// are passed to every call that may need them.
pub struct Arbiter<K: NodeKey> {
    store: GestureStore<K>,
    registry: PointerRegistry<K>,
    global_delegate: Option<Arc<dyn GestureDelegate<K>>>,
    reset_queue: Vec<GestureId>,
    // Dependents whose required gesture failed while a transition was in flight.
    replays: Vec<GestureId>,
    // Nesting depth of `set_state`.
    transitions: u32,
    events: Vec<GestureEvent<K>>,
    batch: FrameBatch,
    ids: Scratch<GestureId>,
    pointer_lists: Scratch<PointerId>,
    nodes: Scratch<K>,
    targets: Vec<K>,
    pending: Pending,
    now: Duration,
    frame: u64,
    shut_down: bool,
}

impl<K: NodeKey> core::fmt::Debug for Arbiter<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arbiter")
            .field("store", &self.store)
            .field("registry", &self.registry)
            .field("global_delegate", &self.global_delegate.is_some())
            .field("reset_queue", &self.reset_queue)
            .field("events", &self.events.len())
            .field("now", &self.now)
            .field("frame", &self.frame)
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

impl<K: NodeKey> Default for Arbiter<K> {
    fn default() -> Self {
        Self::new(PointerRegistry::new())
    }
}

impl<K: NodeKey> Arbiter<K> {
    /// Create an arbiter around `registry`.
    pub fn new(registry: PointerRegistry<K>) -> Self {
        Self {
            store: GestureStore::default(),
            registry,
            global_delegate: None,
            reset_queue: Vec::new(),
            replays: Vec::new(),
            transitions: 0,
            events: Vec::new(),
            batch: FrameBatch::default(),
            ids: Scratch::default(),
            pointer_lists: Scratch::default(),
            nodes: Scratch::default(),
            targets: Vec::new(),
            pending: Pending::default(),
            now: Duration::ZERO,
            frame: 0,
            shut_down: false,
        }
    }

    // --- pointers ---

    /// A new producer handle for the owned registry.
    pub fn input_handle(&self) -> InputHandle {
        self.registry.input_handle()
    }

    /// The owned registry.
    pub fn registry(&self) -> &PointerRegistry<K> {
        &self.registry
    }

    /// Look up a pointer.
    pub fn pointer(&self, id: PointerId) -> Option<&Pointer<K>> {
        self.registry.get(id)
    }

    // --- gestures ---

    /// Attach a gesture to `node`.
    pub fn add_gesture<R: Recognizer<K>>(
        &mut self,
        node: K,
        config: GestureConfig,
        recognizer: R,
    ) -> Result<GestureId> {
        if self.shut_down {
            return Err(Error::ShutDown);
        }
        let id = self.store.insert(node, config, Box::new(recognizer));
        debug!(?id, ?node, "gesture added");
        Ok(id)
    }

    /// Detach and drop a gesture.
    ///
    /// A gesture that has not finished its cycle is failed first, so gestures waiting
    /// on it can proceed. Its require-to-fail and friendly relations are dissolved.
    pub fn remove_gesture(&mut self, tree: &dyn SceneGraph<K>, id: GestureId) -> Result<()> {
        let state = self.state(id).ok_or(Error::UnknownGesture(id))?;
        if !state.is_terminal() {
            self.set_state(tree, id, GestureState::Failed, Release::Plain);
        }
        let Some(slot) = self.store.remove(id) else {
            return Err(Error::UnknownGesture(id));
        };
        for p in &slot.retained {
            self.registry.release(*p);
        }
        if let Some(required) = slot.require_to_fail {
            if let Some(r) = self.store.get_mut(required) {
                r.dependents.retain(|d| *d != id);
            }
        }
        for dep in &slot.dependents {
            if let Some(d) = self.store.get_mut(*dep) {
                d.require_to_fail = None;
                d.required_failed = false;
                d.delayed = None;
            }
        }
        for friend in &slot.friends {
            if let Some(f) = self.store.get_mut(*friend) {
                f.friends.retain(|g| *g != id);
            }
        }
        self.reset_queue.retain(|g| *g != id);
        self.replays.retain(|g| *g != id);
        debug!(?id, node = ?slot.node, "gesture removed");
        Ok(())
    }

    /// Remove every gesture attached to `node`. Returns how many were removed.
    ///
    /// Call this for each node the host deletes.
    pub fn remove_node(&mut self, tree: &dyn SceneGraph<K>, node: K) -> usize {
        let mut ids = self.ids.take();
        ids.extend_from_slice(self.store.attached(node));
        let removed = ids
            .iter()
            .filter(|id| self.remove_gesture(tree, **id).is_ok())
            .count();
        self.ids.give(ids);
        removed
    }

    /// Gestures attached to `node`, in attachment order.
    pub fn gestures_on(&self, node: K) -> &[GestureId] {
        self.store.attached(node)
    }

    /// Number of live gestures.
    pub fn gesture_count(&self) -> usize {
        self.store.len()
    }

    /// Current state of a gesture.
    pub fn state(&self, id: GestureId) -> Option<GestureState> {
        self.store.get(id).map(|s| s.state)
    }

    /// State of a gesture before its last transition.
    pub fn previous_state(&self, id: GestureId) -> Option<GestureState> {
        self.store.get(id).map(|s| s.previous)
    }

    /// Node a gesture is attached to.
    pub fn node_of(&self, id: GestureId) -> Option<K> {
        self.store.get(id).map(|s| s.node)
    }

    /// Configuration of a gesture.
    pub fn config(&self, id: GestureId) -> Option<GestureConfig> {
        self.store.get(id).map(|s| s.config)
    }

    /// Pointers a gesture currently holds.
    pub fn active_pointers(&self, id: GestureId) -> Option<&[PointerId]> {
        self.store.get(id).map(|s| s.active.as_slice())
    }

    /// The transition a gesture is holding back until its required gesture fails.
    pub fn delayed_state(&self, id: GestureId) -> Option<GestureState> {
        self.store.get(id)?.delayed
    }

    /// Borrow a gesture's recognizer as its concrete type.
    pub fn recognizer<R: Recognizer<K>>(&self, id: GestureId) -> Option<&R> {
        let rec: &dyn Any = self.store.get(id)?.recognizer.as_deref()?;
        rec.downcast_ref::<R>()
    }

    /// Mutably borrow a gesture's recognizer as its concrete type.
    pub fn recognizer_mut<R: Recognizer<K>>(&mut self, id: GestureId) -> Option<&mut R> {
        let rec: &mut dyn Any = self.store.get_mut(id)?.recognizer.as_deref_mut()?;
        rec.downcast_mut::<R>()
    }

    /// Enable or disable a gesture.
    ///
    /// Disabling fails a gesture that has not finished its cycle; enabling resets it.
    pub fn set_enabled(
        &mut self,
        tree: &dyn SceneGraph<K>,
        id: GestureId,
        enabled: bool,
    ) -> Result<()> {
        let slot = self.store.get_mut(id).ok_or(Error::UnknownGesture(id))?;
        if slot.config.enabled == enabled {
            return Ok(());
        }
        slot.config.enabled = enabled;
        let state = slot.state;
        if enabled {
            self.reset_queue.retain(|g| *g != id);
            self.reset_gesture(id);
        } else if !state.is_terminal() {
            self.set_state(tree, id, GestureState::Failed, Release::Plain);
        }
        debug!(?id, enabled, "gesture enablement changed");
        Ok(())
    }

    /// Make `id` wait for `required` to fail before it may begin or recognize.
    ///
    /// `None` clears the dependency.
    pub fn set_require_to_fail(&mut self, id: GestureId, required: Option<GestureId>) -> Result<()> {
        if !self.store.contains(id) {
            return Err(Error::UnknownGesture(id));
        }
        if let Some(r) = required {
            if r == id {
                return Err(Error::SelfDependency(id));
            }
            if !self.store.contains(r) {
                return Err(Error::UnknownGesture(r));
            }
            let mut cur = Some(r);
            let mut steps = 0;
            while let Some(c) = cur {
                if c == id || steps > self.store.len() {
                    return Err(Error::DependencyCycle {
                        dependent: id,
                        required: r,
                    });
                }
                cur = self.store.get(c).and_then(|s| s.require_to_fail);
                steps += 1;
            }
        }

        let old = self.store.get(id).and_then(|s| s.require_to_fail);
        if old == required {
            return Ok(());
        }
        if let Some(o) = old.and_then(|o| self.store.get_mut(o)) {
            o.dependents.retain(|d| *d != id);
        }
        if let Some(slot) = self.store.get_mut(id) {
            slot.require_to_fail = required;
            slot.required_failed = false;
            slot.delayed = None;
        }
        if let Some(r) = required.and_then(|r| self.store.get_mut(r)) {
            r.dependents.push(id);
        }
        Ok(())
    }

    /// The gesture `id` waits on, if any.
    pub fn require_to_fail(&self, id: GestureId) -> Option<GestureId> {
        self.store.get(id)?.require_to_fail
    }

    /// Let `a` and `b` recognize simultaneously under the default policy.
    pub fn add_friendly(&mut self, a: GestureId, b: GestureId) -> Result<()> {
        self.check_pair(a, b)?;
        for (x, y) in [(a, b), (b, a)] {
            if let Some(slot) = self.store.get_mut(x) {
                if !slot.friends.contains(&y) {
                    slot.friends.push(y);
                }
            }
        }
        Ok(())
    }

    /// Undo [`add_friendly`](Self::add_friendly).
    pub fn remove_friendly(&mut self, a: GestureId, b: GestureId) -> Result<()> {
        self.check_pair(a, b)?;
        for (x, y) in [(a, b), (b, a)] {
            if let Some(slot) = self.store.get_mut(x) {
                slot.friends.retain(|g| *g != y);
            }
        }
        Ok(())
    }

    /// Returns true if `a` and `b` are friendly.
    pub fn is_friendly(&self, a: GestureId, b: GestureId) -> bool {
        self.store.get(a).is_some_and(|s| s.friends.contains(&b))
    }

    /// Install or clear a gesture's delegate.
    pub fn set_delegate(
        &mut self,
        id: GestureId,
        delegate: Option<Arc<dyn GestureDelegate<K>>>,
    ) -> Result<()> {
        let slot = self.store.get_mut(id).ok_or(Error::UnknownGesture(id))?;
        slot.delegate = delegate;
        Ok(())
    }

    /// Install or clear the delegate consulted for every gesture.
    pub fn set_global_delegate(&mut self, delegate: Option<Arc<dyn GestureDelegate<K>>>) {
        self.global_delegate = delegate;
    }

    /// Request a transition on behalf of the host, and return the resulting state.
    ///
    /// Goes through the same approval as recognizer requests.
    pub fn request_state(
        &mut self,
        tree: &dyn SceneGraph<K>,
        id: GestureId,
        state: GestureState,
    ) -> Result<GestureState> {
        if self.shut_down {
            return Err(Error::ShutDown);
        }
        if !self.store.contains(id) {
            return Err(Error::UnknownGesture(id));
        }
        self.set_state(tree, id, state, Release::CancelOrphans);
        self.state(id).ok_or(Error::UnknownGesture(id))
    }

    /// Cancel a gesture immediately.
    ///
    /// Cancellation is never vetoed. With `cancel_pointers`, the pointers the gesture
    /// holds are cancelled in the registry too, and with `return_pointers` they come
    /// back next frame as new pointers other gestures can pick up.
    pub fn cancel_gesture(
        &mut self,
        tree: &dyn SceneGraph<K>,
        id: GestureId,
        cancel_pointers: bool,
        return_pointers: bool,
    ) -> Result<()> {
        if !self.store.contains(id) {
            return Err(Error::UnknownGesture(id));
        }
        self.cancel(tree, id, cancel_pointers, return_pointers);
        Ok(())
    }

    /// Take the events queued since the last drain.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, GestureEvent<K>> {
        self.events.drain(..)
    }

    /// Frame clock as of the last [`process_frame`](Self::process_frame).
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Returns true after [`shutdown`](Self::shutdown).
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Tear down the session.
    ///
    /// Fails every gesture that has not finished its cycle, forgets every pointer, and
    /// turns producer handles into no-ops. Later frames do nothing.
    pub fn shutdown(&mut self, tree: &dyn SceneGraph<K>) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        let mut ids = self.ids.take();
        ids.extend(self.store.iter().map(|(id, _)| id));
        for &id in &ids {
            if self.state(id).is_some_and(|s| !s.is_terminal()) {
                self.set_state(tree, id, GestureState::Failed, Release::Plain);
            }
            if let Some(slot) = self.store.get_mut(id) {
                slot.active.clear();
                slot.deadline = None;
                slot.reset_queued = false;
            }
        }
        self.ids.give(ids);
        self.reset_queue.clear();
        self.registry.close();
        debug!("gesture arbiter shut down");
    }

    // --- frame ---

    /// Run one frame of pointer dispatch and arbitration.
    pub fn process_frame(
        &mut self,
        tree: &dyn SceneGraph<K>,
        hits: &dyn HitTester<K>,
        now: Duration,
    ) {
        if self.shut_down {
            return;
        }
        self.frame += 1;
        let _span = trace_span!("gesture_frame", frame = self.frame).entered();
        self.now = now;

        self.fail_detached(tree);
        self.reset_queued();

        let mut batch = core::mem::take(&mut self.batch);
        self.registry.begin_frame(hits, &mut batch);

        self.fire_deadlines(tree);

        if !batch.is_empty() {
            trace!(
                began = batch.began.len(),
                moved = batch.moved.len(),
                ended = batch.ended.len(),
                cancelled = batch.cancelled.len(),
                "dispatching pointers"
            );
        }
        self.dispatch(tree, Phase::Began, &batch.began);
        self.dispatch(tree, Phase::Moved, &batch.moved);
        self.dispatch(tree, Phase::Ended, &batch.ended);
        self.dispatch(tree, Phase::Cancelled, &batch.cancelled);

        self.registry.finish_frame(&batch);
        self.batch = batch;

        self.reset_queued();
    }

    /// Fail gestures whose node left the active hierarchy while they were engaged.
    fn fail_detached(&mut self, tree: &dyn SceneGraph<K>) {
        let mut ids = self.ids.take();
        ids.extend(
            self.store
                .iter()
                .filter(|(_, s)| {
                    !s.state.is_terminal()
                        && (s.state != GestureState::Possible || !s.active.is_empty())
                        && !tree.is_active(s.node)
                })
                .map(|(id, _)| id),
        );
        for &id in &ids {
            debug!(?id, "node deactivated; failing gesture");
            self.set_state(tree, id, GestureState::Failed, Release::Plain);
        }
        self.ids.give(ids);
    }

    fn fire_deadlines(&mut self, tree: &dyn SceneGraph<K>) {
        let now = self.now;
        let mut due = self.ids.take();
        due.extend(
            self.store
                .iter()
                .filter(|(_, s)| s.deadline.is_some_and(|d| d <= now))
                .map(|(id, _)| id),
        );
        for &id in &due {
            if let Some(slot) = self.store.get_mut(id) {
                slot.deadline = None;
            }
            if self.is_active(tree, id) {
                trace!(?id, "deadline elapsed");
                self.run_callback(tree, id, |rec, cx| rec.deadline_elapsed(cx));
            }
        }
        self.ids.give(due);
    }

    fn reset_queued(&mut self) {
        let mut queue = core::mem::take(&mut self.reset_queue);
        for &id in &queue {
            self.reset_gesture(id);
        }
        queue.clear();
        self.reset_queue = queue;
    }

    fn reset_gesture(&mut self, id: GestureId) {
        let Some(slot) = self.store.get_mut(id) else {
            return;
        };
        slot.reset_queued = false;
        for p in slot.retained.drain(..) {
            self.registry.release(p);
        }
        slot.active.clear();
        slot.count_state = Default::default();
        slot.delayed = None;
        slot.required_failed = false;
        slot.deadline = None;
        slot.cached = None;
        let previous = slot.state;
        slot.previous = previous;
        slot.state = GestureState::Possible;
        let change = StateChange {
            gesture: id,
            node: slot.node,
            previous,
            state: GestureState::Possible,
        };
        let Some(mut rec) = slot.recognizer.take() else {
            return;
        };
        guard(id, "reset", (), || {
            rec.reset();
            rec.state_entered(&change);
        });
        if let Some(slot) = self.store.get_mut(id) {
            slot.recognizer = Some(rec);
        }
        trace!(?id, ?previous, "gesture reset");
        self.events.push(GestureEvent::Reset {
            gesture: id,
            node: change.node,
        });
    }

    fn dispatch(&mut self, tree: &dyn SceneGraph<K>, phase: Phase, pointers: &[PointerId]) {
        if pointers.is_empty() {
            return;
        }

        let mut targets = core::mem::take(&mut self.targets);
        targets.clear();
        for &p in pointers {
            if let Some(t) = self.registry.get(p).and_then(|p| p.target) {
                if !targets.contains(&t) {
                    targets.push(t);
                }
            }
        }

        let mut order = self.ids.take();
        for &target in &targets {
            let mut group = self.pointer_lists.take();
            group.extend(pointers.iter().copied().filter(|p| {
                self.registry
                    .get(*p)
                    .is_some_and(|p| p.target == Some(target))
            }));
            if phase == Phase::Began {
                self.collect_began(tree, target, &group, &mut order);
            } else {
                self.collect_held(tree, target, &group, &mut order);
            }
            self.pointer_lists.give(group);
        }
        self.targets = targets;

        for &id in &order {
            let Some(slot) = self.store.get_mut(id) else {
                continue;
            };
            let inbox = core::mem::take(&mut slot.inbox);
            if self.is_active(tree, id) {
                self.deliver(tree, id, phase, &inbox);
            }
            if let Some(slot) = self.store.get_mut(id) {
                let mut inbox = inbox;
                inbox.clear();
                slot.inbox = inbox;
            }
        }
        self.ids.give(order);
    }

    /// Route new pointers on `target` to candidate gestures on it and its ancestors.
    fn collect_began(
        &mut self,
        tree: &dyn SceneGraph<K>,
        target: K,
        group: &[PointerId],
        order: &mut Vec<GestureId>,
    ) {
        let mut candidates = self.ids.take();
        hierarchy::ending_with(tree, &self.store, target, &mut candidates);
        let mut around = self.ids.take();
        let mut stack = self.nodes.take();
        hierarchy::containing_in(tree, &self.store, target, &mut around, &mut stack);
        self.nodes.give(stack);

        for &id in &candidates {
            if !self.is_active(tree, id) {
                continue;
            }
            let blocker = around.iter().copied().find(|&other| {
                other != id
                    && self.state(other).is_some_and(GestureState::is_in_progress)
                    && self.can_prevent_gesture(other, id)
            });
            if let Some(blocker) = blocker {
                trace!(?id, ?blocker, "pointers withheld from prevented gesture");
                continue;
            }
            for &p in group {
                if self.should_receive(id, p) {
                    self.push_inbox(id, p, order);
                }
            }
        }
        self.ids.give(around);
        self.ids.give(candidates);
    }

    /// Route held pointers on `target` to the gestures that own them.
    fn collect_held(
        &mut self,
        tree: &dyn SceneGraph<K>,
        target: K,
        group: &[PointerId],
        order: &mut Vec<GestureId>,
    ) {
        let mut candidates = self.ids.take();
        hierarchy::ending_with(tree, &self.store, target, &mut candidates);
        for &id in &candidates {
            if !self.is_active(tree, id) {
                continue;
            }
            for &p in group {
                if self.store.get(id).is_some_and(|s| s.active.contains(&p)) {
                    self.push_inbox(id, p, order);
                }
            }
        }
        self.ids.give(candidates);
    }

    fn push_inbox(&mut self, id: GestureId, p: PointerId, order: &mut Vec<GestureId>) {
        if let Some(slot) = self.store.get_mut(id) {
            if slot.inbox.is_empty() {
                order.push(id);
            }
            if !slot.inbox.contains(&p) {
                slot.inbox.push(p);
            }
        }
    }

    fn deliver(&mut self, tree: &dyn SceneGraph<K>, id: GestureId, phase: Phase, batch: &[PointerId]) {
        let Some(slot) = self.store.get_mut(id) else {
            return;
        };
        match phase {
            Phase::Began => {
                slot.count_state = slot.config.after_press(slot.active.len(), batch.len());
                slot.active.extend_from_slice(batch);
                slot.cached = None;
                if slot.state.is_in_progress() {
                    for &p in batch {
                        self.registry.retain(p);
                        slot.retained.push(p);
                    }
                }
            }
            Phase::Moved => {
                slot.count_state = slot.config.after_move(slot.active.len());
            }
            Phase::Ended | Phase::Cancelled => {
                slot.count_state = slot.config.after_release(slot.active.len(), batch.len());
                slot.active.retain(|p| !batch.contains(p));
                if phase == Phase::Ended && slot.active.is_empty() {
                    let lifted = batch.iter().filter_map(|p| self.registry.get(*p));
                    let current = centroid(lifted.clone().map(|p| p.position));
                    let previous = centroid(lifted.map(|p| p.previous_position));
                    slot.cached = current.zip(previous);
                }
            }
        }
        trace!(?id, ?phase, pointers = batch.len(), "delivering pointers");
        self.run_callback(tree, id, |rec, cx| match phase {
            Phase::Began => rec.pointers_began(cx, batch),
            Phase::Moved => rec.pointers_moved(cx, batch),
            Phase::Ended => rec.pointers_ended(cx, batch),
            Phase::Cancelled => rec.pointers_cancelled(cx, batch),
        });
    }

    /// Run a recognizer callback, then apply what it asked for.
    fn run_callback(
        &mut self,
        tree: &dyn SceneGraph<K>,
        id: GestureId,
        f: impl FnOnce(&mut dyn Recognizer<K>, &mut GestureCx<'_, K>),
    ) {
        let Some(mut rec) = self.store.get_mut(id).and_then(|s| s.recognizer.take()) else {
            return;
        };
        let mut pending = core::mem::take(&mut self.pending);
        let outcome = match self.store.get(id) {
            Some(slot) => {
                let mut cx = GestureCx {
                    id,
                    slot,
                    pointers: &self.registry,
                    now: self.now,
                    pending: &mut pending,
                };
                panic::catch_unwind(AssertUnwindSafe(|| f(&mut *rec, &mut cx)))
            }
            None => Ok(()),
        };
        if let Some(slot) = self.store.get_mut(id) {
            slot.recognizer = Some(rec);
            if let Some(deadline) = pending.deadline.take() {
                slot.deadline = deadline;
            }
        }
        let mut requests = core::mem::take(&mut pending.requests);
        self.pending = pending;

        if let Err(payload) = outcome {
            error!(?id, payload = panic_message(&*payload), "recognizer callback panicked");
            requests.clear();
            if self.state(id).is_some_and(|s| !s.is_terminal()) {
                self.set_state(tree, id, GestureState::Failed, Release::Plain);
            }
        }
        for request in requests.drain(..) {
            match request {
                Request::State(state) => {
                    self.set_state(tree, id, state, Release::CancelOrphans);
                }
                Request::Cancel {
                    cancel_pointers,
                    return_pointers,
                } => self.cancel(tree, id, cancel_pointers, return_pointers),
            }
        }
        if self.pending.requests.capacity() == 0 {
            self.pending.requests = requests;
        }
    }

    // --- state machine ---

    fn set_state(
        &mut self,
        tree: &dyn SceneGraph<K>,
        id: GestureId,
        value: GestureState,
        release: Release,
    ) -> bool {
        let shut_down = self.shut_down;
        let Some(slot) = self.store.get_mut(id) else {
            return false;
        };
        if (!slot.config.enabled || shut_down) && value != GestureState::Failed {
            debug!(?id, ?value, "transition refused: gesture is disabled");
            return false;
        }
        if slot.require_to_fail.is_some() {
            match value {
                GestureState::Began | GestureState::Ended if !slot.required_failed => {
                    trace!(?id, ?value, "transition delayed until required gesture fails");
                    slot.delayed = Some(value);
                    return false;
                }
                GestureState::Possible | GestureState::Failed | GestureState::Cancelled => {
                    slot.delayed = None;
                }
                _ => {}
            }
        }
        self.transitions += 1;
        let approved = self.approve(tree, id, value);
        self.apply_state(tree, id, approved, release);
        self.transitions -= 1;
        if self.transitions == 0 {
            self.replay_delayed(tree);
        }
        approved == value
    }

    /// Replay the transitions held back by dependents whose required gesture failed.
    ///
    /// Runs once the outermost transition is written, so a replayed gesture is
    /// arbitrated against settled peers.
    fn replay_delayed(&mut self, tree: &dyn SceneGraph<K>) {
        self.transitions += 1;
        let mut next = 0;
        while let Some(&dep) = self.replays.get(next) {
            next += 1;
            let Some(delayed) = self.store.get_mut(dep).and_then(|s| s.delayed.take()) else {
                continue;
            };
            debug!(?dep, ?delayed, "required gesture failed; replaying transition");
            self.set_state(tree, dep, delayed, Release::CancelOrphans);
        }
        self.replays.clear();
        self.transitions -= 1;
    }

    fn approve(&mut self, tree: &dyn SceneGraph<K>, id: GestureId, value: GestureState) -> GestureState {
        let Some(current) = self.state(id) else {
            return value;
        };
        match value {
            GestureState::Began => {
                if current != GestureState::Possible {
                    warn!(?id, ?current, "gesture began from a state other than Possible");
                }
                if self.recognize_if_not_prevented(tree, id) {
                    GestureState::Began
                } else {
                    self.queue_reset(id);
                    GestureState::Failed
                }
            }
            GestureState::Changed => {
                if !current.is_in_progress() {
                    warn!(?id, ?current, "gesture changed from a state other than Began/Changed");
                }
                value
            }
            GestureState::Ended => {
                self.queue_reset(id);
                match current {
                    GestureState::Possible => {
                        if self.recognize_if_not_prevented(tree, id) {
                            GestureState::Ended
                        } else {
                            GestureState::Failed
                        }
                    }
                    GestureState::Began | GestureState::Changed => value,
                    _ => {
                        warn!(?id, ?current, "gesture ended from a finished state");
                        value
                    }
                }
            }
            GestureState::Failed | GestureState::Cancelled => {
                self.queue_reset(id);
                value
            }
            GestureState::Possible => value,
        }
    }

    /// Decide whether `id` may be recognized now; if so, fail what it prevents.
    fn recognize_if_not_prevented(&mut self, tree: &dyn SceneGraph<K>, id: GestureId) -> bool {
        if !self.should_begin(id) {
            debug!(?id, "recognition refused by should_begin");
            return false;
        }
        let Some(node) = self.node_of(id) else {
            return false;
        };
        let mut around = self.ids.take();
        let mut stack = self.nodes.take();
        hierarchy::containing_in(tree, &self.store, node, &mut around, &mut stack);
        self.nodes.give(stack);
        let mut to_fail = self.ids.take();
        let mut prevented_by = None;
        for &other in &around {
            if other == id || !self.is_active(tree, other) {
                continue;
            }
            if self.state(other).is_some_and(GestureState::is_in_progress) {
                if self.can_prevent_gesture(other, id) {
                    prevented_by = Some(other);
                    break;
                }
            } else if self.can_prevent_gesture(id, other) {
                to_fail.push(other);
            }
        }
        self.ids.give(around);

        if let Some(by) = prevented_by {
            debug!(?id, ?by, "recognition prevented");
            self.ids.give(to_fail);
            return false;
        }
        for &other in &to_fail {
            if self.is_active(tree, other) {
                debug!(?id, failed = ?other, "recognition fails prevented gesture");
                self.set_state(tree, other, GestureState::Failed, Release::Plain);
            }
        }
        self.ids.give(to_fail);
        true
    }

    fn apply_state(
        &mut self,
        tree: &dyn SceneGraph<K>,
        id: GestureId,
        state: GestureState,
        release: Release,
    ) {
        let Some(slot) = self.store.get_mut(id) else {
            return;
        };
        let previous = slot.state;
        slot.previous = previous;
        slot.state = state;
        let node = slot.node;

        match state {
            GestureState::Began => {
                for &p in &slot.active {
                    if !slot.retained.contains(&p) {
                        self.registry.retain(p);
                        slot.retained.push(p);
                    }
                }
            }
            GestureState::Ended | GestureState::Failed | GestureState::Cancelled => {
                let mode = if state == GestureState::Cancelled {
                    release
                } else {
                    Release::Plain
                };
                for p in slot.retained.drain(..) {
                    let remaining = self.registry.release(p);
                    if mode == Release::CancelOrphans && remaining == Some(0) {
                        self.registry.cancel(p, true);
                    }
                }
            }
            GestureState::Possible | GestureState::Changed => {}
        }
        debug!(?id, ?previous, ?state, "gesture state changed");

        let change = StateChange {
            gesture: id,
            node,
            previous,
            state,
        };
        let panicked = match slot.recognizer.as_deref_mut() {
            Some(rec) => guard(id, "state_entered", true, || {
                rec.state_entered(&change);
                false
            }),
            None => false,
        };
        self.events.push(GestureEvent::StateChanged(change));
        self.notify_dependents(tree, id, state);
        if panicked && !state.is_terminal() {
            self.set_state(tree, id, GestureState::Failed, Release::Plain);
        }
    }

    fn notify_dependents(&mut self, tree: &dyn SceneGraph<K>, id: GestureId, state: GestureState) {
        let mut deps = self.ids.take();
        if let Some(slot) = self.store.get(id) {
            deps.extend_from_slice(&slot.dependents);
        }
        for &dep in &deps {
            match state {
                GestureState::Failed => {
                    let Some(slot) = self.store.get_mut(dep) else {
                        continue;
                    };
                    slot.required_failed = true;
                    if slot.delayed.is_some() && !self.replays.contains(&dep) {
                        self.replays.push(dep);
                    }
                }
                GestureState::Began | GestureState::Ended | GestureState::Cancelled => {
                    if self.state(dep).is_some_and(|s| s != GestureState::Failed) {
                        debug!(?dep, required = ?id, "required gesture recognized; failing dependent");
                        self.set_state(tree, dep, GestureState::Failed, Release::Plain);
                    }
                }
                GestureState::Possible | GestureState::Changed => {}
            }
        }
        self.ids.give(deps);
    }

    fn cancel(
        &mut self,
        tree: &dyn SceneGraph<K>,
        id: GestureId,
        cancel_pointers: bool,
        return_pointers: bool,
    ) {
        if self.state(id).is_none_or(GestureState::is_terminal) {
            return;
        }
        let mut held = self.pointer_lists.take();
        if let Some(slot) = self.store.get(id) {
            held.extend_from_slice(&slot.active);
        }
        self.set_state(tree, id, GestureState::Cancelled, Release::Plain);
        if cancel_pointers {
            for &p in &held {
                self.registry.cancel(p, return_pointers);
            }
        }
        self.pointer_lists.give(held);
    }

    fn queue_reset(&mut self, id: GestureId) {
        if let Some(slot) = self.store.get_mut(id) {
            if !slot.reset_queued {
                slot.reset_queued = true;
                self.reset_queue.push(id);
            }
        }
    }

    // --- policy queries ---

    fn is_active(&self, tree: &dyn SceneGraph<K>, id: GestureId) -> bool {
        self.store.get(id).is_some_and(|s| {
            s.config.enabled && !s.state.is_terminal() && tree.is_active(s.node)
        })
    }

    fn info(&self, id: GestureId) -> Option<GestureInfo<'_, K>> {
        self.store.get(id)?.info(id)
    }

    fn delegate_of(&self, id: GestureId) -> Option<&Arc<dyn GestureDelegate<K>>> {
        self.store.get(id)?.delegate.as_ref()
    }

    fn should_receive(&self, id: GestureId, p: PointerId) -> bool {
        let (Some(info), Some(pointer)) = (self.info(id), self.registry.get(p)) else {
            return false;
        };
        if let Some(global) = &self.global_delegate {
            if !guard(id, "global should_receive_pointer", false, || {
                global.should_receive_pointer(&info, pointer)
            }) {
                return false;
            }
        }
        if let Some(delegate) = self.delegate_of(id) {
            if !guard(id, "delegate should_receive_pointer", false, || {
                delegate.should_receive_pointer(&info, pointer)
            }) {
                return false;
            }
        }
        guard(id, "should_receive_pointer", false, || {
            info.recognizer.should_receive_pointer(info.node, pointer)
        })
    }

    fn should_begin(&self, id: GestureId) -> bool {
        let Some(info) = self.info(id) else {
            return false;
        };
        if let Some(global) = &self.global_delegate {
            if !guard(id, "global should_begin", false, || global.should_begin(&info)) {
                return false;
            }
        }
        if let Some(delegate) = self.delegate_of(id) {
            if !guard(id, "delegate should_begin", false, || delegate.should_begin(&info)) {
                return false;
            }
        }
        guard(id, "should_begin", false, || info.recognizer.should_begin())
    }

    /// Whether `first`, once recognized, blocks `second`.
    fn can_prevent_gesture(&self, first: GestureId, second: GestureId) -> bool {
        let (Some(a), Some(b)) = (self.info(first), self.info(second)) else {
            return false;
        };
        if let Some(global) = &self.global_delegate {
            if guard(first, "global should_recognize_simultaneously", true, || {
                global.should_recognize_simultaneously(&a, &b)
            }) {
                return false;
            }
        }
        match self.delegate_of(first) {
            Some(delegate) => !guard(first, "delegate should_recognize_simultaneously", true, || {
                delegate.should_recognize_simultaneously(&a, &b)
            }),
            None => {
                guard(first, "can_prevent", false, || a.recognizer.can_prevent(&b))
                    && self.can_be_prevented(&b, &a)
                    && !self.is_friendly(first, second)
            }
        }
    }

    /// Whether `gesture` agrees to be blocked by `by`.
    fn can_be_prevented(&self, gesture: &GestureInfo<'_, K>, by: &GestureInfo<'_, K>) -> bool {
        match self.delegate_of(gesture.id) {
            Some(delegate) => {
                !guard(gesture.id, "delegate should_recognize_simultaneously", true, || {
                    delegate.should_recognize_simultaneously(gesture, by)
                })
            }
            None => {
                guard(gesture.id, "can_be_prevented_by", false, || {
                    gesture.recognizer.can_be_prevented_by(by)
                }) && !self.is_friendly(gesture.id, by.id)
            }
        }
    }

    fn check_pair(&self, a: GestureId, b: GestureId) -> Result<()> {
        if a == b {
            return Err(Error::SelfFriendship(a));
        }
        for id in [a, b] {
            if !self.store.contains(id) {
                return Err(Error::UnknownGesture(id));
            }
        }
        Ok(())
    }
}

/// Run a recognizer or delegate call, turning a panic into `fallback`.
fn guard<T>(id: GestureId, what: &'static str, fallback: T, f: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            error!(?id, what, payload = panic_message(&*payload), "gesture callback panicked");
            fallback
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
