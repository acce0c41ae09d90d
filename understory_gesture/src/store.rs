// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture storage: generational slots plus per-node attachment lists.

use core::time::Duration;
use std::collections::HashMap;
use std::sync::Arc;

use kurbo::Point;

use crate::gesture::{GestureConfig, GestureState, PointerCountState};
use crate::hierarchy::GestureLookup;
use crate::recognizer::{GestureDelegate, GestureInfo, Recognizer};
use crate::types::{GestureId, NodeKey, PointerId};

/// Everything the arbiter tracks for one gesture.
pub(crate) struct Slot<K: NodeKey> {
    pub(crate) generation: u32,
    pub(crate) node: K,
    pub(crate) config: GestureConfig,
    pub(crate) state: GestureState,
    pub(crate) previous: GestureState,
    pub(crate) active: Vec<PointerId>,
    pub(crate) retained: Vec<PointerId>,
    pub(crate) count_state: PointerCountState,
    pub(crate) require_to_fail: Option<GestureId>,
    pub(crate) dependents: Vec<GestureId>,
    pub(crate) required_failed: bool,
    pub(crate) delayed: Option<GestureState>,
    pub(crate) friends: Vec<GestureId>,
    pub(crate) delegate: Option<Arc<dyn GestureDelegate<K>>>,
    pub(crate) deadline: Option<Duration>,
    // Centroid (current, previous) of the last lifted batch.
    pub(crate) cached: Option<(Point, Point)>,
    pub(crate) reset_queued: bool,
    // Pointers collected for this gesture during the phase being dispatched.
    pub(crate) inbox: Vec<PointerId>,
    // `None` only while one of its callbacks runs.
    pub(crate) recognizer: Option<Box<dyn Recognizer<K>>>,
}

impl<K: NodeKey> core::fmt::Debug for Slot<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Slot")
            .field("generation", &self.generation)
            .field("node", &self.node)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("previous", &self.previous)
            .field("active", &self.active)
            .field("retained", &self.retained)
            .field("require_to_fail", &self.require_to_fail)
            .field("delayed", &self.delayed)
            .field("friends", &self.friends)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl<K: NodeKey> Slot<K> {
    fn new(
        generation: u32,
        node: K,
        config: GestureConfig,
        recognizer: Box<dyn Recognizer<K>>,
    ) -> Self {
        Self {
            generation,
            node,
            config,
            state: GestureState::Possible,
            previous: GestureState::Possible,
            active: Vec::new(),
            retained: Vec::new(),
            count_state: PointerCountState::default(),
            require_to_fail: None,
            dependents: Vec::new(),
            required_failed: false,
            delayed: None,
            friends: Vec::new(),
            delegate: None,
            deadline: None,
            cached: None,
            reset_queued: false,
            inbox: Vec::new(),
            recognizer: Some(recognizer),
        }
    }

    pub(crate) fn info(&self, id: GestureId) -> Option<GestureInfo<'_, K>> {
        Some(GestureInfo {
            id,
            node: self.node,
            state: self.state,
            recognizer: self.recognizer.as_deref()?,
        })
    }
}

/// Generational arena of gestures.
pub(crate) struct GestureStore<K: NodeKey> {
    slots: Vec<Option<Slot<K>>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    attached: HashMap<K, Vec<GestureId>>,
}

impl<K: NodeKey> core::fmt::Debug for GestureStore<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let alive = self.slots.iter().filter(|s| s.is_some()).count();
        f.debug_struct("GestureStore")
            .field("slots_total", &self.slots.len())
            .field("slots_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("nodes", &self.attached.len())
            .finish_non_exhaustive()
    }
}

impl<K: NodeKey> Default for GestureStore<K> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            attached: HashMap::new(),
        }
    }
}

impl<K: NodeKey> GestureStore<K> {
    pub(crate) fn insert(
        &mut self,
        node: K,
        config: GestureConfig,
        recognizer: Box<dyn Recognizer<K>>,
    ) -> GestureId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx] + 1;
            self.generations[idx] = generation;
            self.slots[idx] = Some(Slot::new(generation, node, config, recognizer));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.slots
                .push(Some(Slot::new(generation, node, config, recognizer)));
            self.generations.push(generation);
            (self.slots.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "GestureId uses 32-bit indices."
        )]
        let id = GestureId::new(idx as u32, generation);
        self.attached.entry(node).or_default().push(id);
        id
    }

    pub(crate) fn remove(&mut self, id: GestureId) -> Option<Slot<K>> {
        self.get(id)?;
        let slot = self.slots[id.idx()].take()?;
        self.free_list.push(id.idx());
        if let Some(list) = self.attached.get_mut(&slot.node) {
            list.retain(|g| *g != id);
            if list.is_empty() {
                self.attached.remove(&slot.node);
            }
        }
        Some(slot)
    }

    pub(crate) fn contains(&self, id: GestureId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn get(&self, id: GestureId) -> Option<&Slot<K>> {
        let slot = self.slots.get(id.idx())?.as_ref()?;
        (slot.generation == id.1).then_some(slot)
    }

    pub(crate) fn get_mut(&mut self, id: GestureId) -> Option<&mut Slot<K>> {
        let slot = self.slots.get_mut(id.idx())?.as_mut()?;
        if slot.generation != id.1 {
            return None;
        }
        Some(slot)
    }

    /// Live gestures in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (GestureId, &Slot<K>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let slot = slot.as_ref()?;
            #[allow(
                clippy::cast_possible_truncation,
                reason = "GestureId uses 32-bit indices."
            )]
            let id = GestureId::new(i as u32, slot.generation);
            Some((id, slot))
        })
    }

    pub(crate) fn attached(&self, node: K) -> &[GestureId] {
        self.attached.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }
}

impl<K: NodeKey> GestureLookup<K> for GestureStore<K> {
    fn enabled_gestures(&self, node: K, out: &mut Vec<GestureId>) {
        if let Some(list) = self.attached.get(&node) {
            out.extend(
                list.iter()
                    .copied()
                    .filter(|id| self.get(*id).is_some_and(|s| s.config.enabled)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert;
    impl Recognizer<u32> for Inert {}

    fn boxed() -> Box<dyn Recognizer<u32>> {
        Box::new(Inert)
    }

    #[test]
    fn slots_are_reused_with_new_generation() {
        let mut store = GestureStore::default();
        let a = store.insert(7, GestureConfig::default(), boxed());
        let b = store.insert(7, GestureConfig::default(), boxed());
        assert_eq!(store.attached(7), &[a, b]);

        assert!(store.remove(a).is_some());
        assert!(store.remove(a).is_none(), "double remove is a no-op");
        assert!(!store.contains(a));
        assert_eq!(store.attached(7), &[b]);

        let c = store.insert(8, GestureConfig::default(), boxed());
        assert_eq!(c.idx(), a.idx());
        assert_ne!(c, a);
        assert!(store.get(a).is_none(), "stale id must not alias");
        assert_eq!(store.get(c).map(|s| s.node), Some(8));
        assert_eq!(store.len(), 2);
        assert_eq!(store.iter().map(|(id, _)| id).collect::<Vec<_>>(), [c, b]);
    }

    #[test]
    fn lookup_skips_disabled_gestures() {
        let mut store = GestureStore::default();
        let a = store.insert(1, GestureConfig::default(), boxed());
        let b = store.insert(
            1,
            GestureConfig {
                enabled: false,
                ..GestureConfig::default()
            },
            boxed(),
        );
        let mut out = Vec::new();
        store.enabled_gestures(1, &mut out);
        assert_eq!(out, [a]);
        assert_eq!(store.attached(1), &[a, b]);

        store.remove(a);
        store.remove(b);
        assert!(store.attached(1).is_empty());
    }
}
