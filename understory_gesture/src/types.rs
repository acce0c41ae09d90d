// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identifiers, flags, and the host-facing scene and hit-testing traits.

use core::fmt::Debug;
use core::hash::Hash;

use kurbo::Point;

/// Key type for host tree nodes.
///
/// Blanket-implemented for anything copyable, hashable and debuggable.
pub trait NodeKey: Copy + Eq + Hash + Debug + 'static {}

impl<T: Copy + Eq + Hash + Debug + 'static> NodeKey for T {}

/// Identifier for a gesture attached to an [`Arbiter`](crate::Arbiter).
///
/// Generational: removing a gesture frees its slot, and a later gesture reusing the
/// slot gets a new generation, so stale ids never alias a live gesture.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct GestureId(pub(crate) u32, pub(crate) u32);

impl GestureId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Identifier for a pointer (one physical contact).
///
/// Ids are assigned monotonically by the registry and never reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub(crate) u64);

impl PointerId {
    /// Raw value of the id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Identifies which hit-testing surface originated a pointer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

impl LayerId {
    /// Layer reported by single-surface hit testers.
    pub const DEFAULT: Self = Self(0);
}

bitflags::bitflags! {
    /// Classification of a pointer's source device.
    ///
    /// The low byte is reserved for the predefined tags; the remaining bits are free
    /// for host-defined tags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Tags: u32 {
        /// Finger on a touch surface.
        const TOUCH  = 1 << 0;
        /// Mouse button.
        const MOUSE  = 1 << 1;
        /// Stylus.
        const PEN    = 1 << 2;
        /// Tracked physical object (fiducial marker).
        const OBJECT = 1 << 3;

        const _ = !0;
    }
}

bitflags::bitflags! {
    /// Flags describing how a pointer came to exist.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PointerFlags: u8 {
        /// Re-injected after a gesture cancelled it with "return" semantics.
        ///
        /// The physical contact never lifted; single-pointer gestures such as taps
        /// usually ignore these.
        const RETURNED = 1 << 0;
    }
}

/// Read-only view of the host's scene tree.
///
/// The arbiter never mutates the tree; it only walks parent and child links and
/// checks activation.
pub trait SceneGraph<K> {
    /// Parent of `node`, or `None` for roots and unknown nodes.
    fn parent_of(&self, node: K) -> Option<K>;

    /// Number of children of `node`.
    fn child_count(&self, node: K) -> usize;

    /// Child of `node` at `index`, in the tree's child order.
    fn child_at(&self, node: K, index: usize) -> Option<K>;

    /// Returns true if `node` and all of its ancestors are active.
    fn is_active(&self, node: K) -> bool;
}

/// Resolves a screen position to the node under it.
///
/// Consulted once per pointer, when the pointer begins.
pub trait HitTester<K> {
    /// Topmost node at `position`.
    fn hit(&self, position: Point) -> Option<K>;

    /// Topmost node at `position` together with the layer that produced it.
    fn hit_layer(&self, position: Point) -> Option<(K, LayerId)> {
        self.hit(position).map(|node| (node, LayerId::DEFAULT))
    }
}

impl<K, F> HitTester<K> for F
where
    F: Fn(Point) -> Option<K>,
{
    fn hit(&self, position: Point) -> Option<K> {
        self(position)
    }
}

/// Ordered stack of hit testers, for example an overlay above a scene.
///
/// Layers are queried in insertion order and the first hit wins.
pub struct LayerStack<'a, K> {
    layers: Vec<&'a dyn HitTester<K>>,
}

impl<K> Debug for LayerStack<'_, K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayerStack")
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl<K> Default for LayerStack<'_, K> {
    fn default() -> Self {
        Self { layers: Vec::new() }
    }
}

impl<'a, K> LayerStack<'a, K> {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer below the existing ones and return its id.
    pub fn push(&mut self, layer: &'a dyn HitTester<K>) -> LayerId {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Layer stacks are tiny; ids are 32-bit."
        )]
        let id = LayerId(self.layers.len() as u32);
        self.layers.push(layer);
        id
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if there are no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<K> HitTester<K> for LayerStack<'_, K> {
    fn hit(&self, position: Point) -> Option<K> {
        self.hit_layer(position).map(|(node, _)| node)
    }

    fn hit_layer(&self, position: Point) -> Option<(K, LayerId)> {
        self.layers.iter().enumerate().find_map(|(i, layer)| {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Layer stacks are tiny; ids are 32-bit."
            )]
            let id = LayerId(i as u32);
            layer.hit(position).map(|node| (node, id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_layer_with_a_hit_wins() {
        let overlay = |p: Point| (p.x < 10.0).then_some("overlay");
        let scene = |_: Point| Some("scene");
        let mut stack = LayerStack::new();
        let top = stack.push(&overlay);
        let bottom = stack.push(&scene);
        assert_eq!(stack.len(), 2);

        assert_eq!(stack.hit_layer(Point::new(5.0, 0.0)), Some(("overlay", top)));
        assert_eq!(stack.hit_layer(Point::new(50.0, 0.0)), Some(("scene", bottom)));
    }

    #[test]
    fn empty_stack_misses() {
        let stack: LayerStack<'_, u32> = LayerStack::new();
        assert!(stack.is_empty());
        assert_eq!(stack.hit(Point::ORIGIN), None);
    }

    #[test]
    fn closures_report_default_layer() {
        let tester = |_: Point| Some(7_u32);
        assert_eq!(tester.hit_layer(Point::ORIGIN), Some((7, LayerId::DEFAULT)));
    }

    #[test]
    fn host_tags_survive_alongside_predefined_ones() {
        let custom = Tags::from_bits_retain(1 << 16);
        let tags = Tags::TOUCH | custom;
        assert!(tags.contains(Tags::TOUCH));
        assert!(tags.contains(custom));
        assert!(!tags.contains(Tags::MOUSE));
    }
}
