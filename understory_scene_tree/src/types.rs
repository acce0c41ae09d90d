// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node handles, flags and per-node geometry.

use alloc::vec::Vec;

use kurbo::{Affine, Rect};

/// Generational handle of a scene node.
///
/// Removing a node frees its slot. A node inserted into the same slot later gets a
/// higher generation, so an old handle goes stale instead of pointing at the newcomer.
/// [`Tree::is_alive`](crate::Tree::is_alive) tells the two apart.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(slot: u32, generation: u32) -> Self {
        Self(slot, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    /// Slot the node lives in.
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Generation stamped on this handle.
    pub const fn generation(self) -> u32 {
        self.1
    }
}

bitflags::bitflags! {
    /// Whether a node takes part in gesture routing.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Clearing this takes the node and everything below it out of routing.
        const ACTIVE   = 1 << 0;
        /// The node itself can be hit. Children are unaffected.
        const PICKABLE = 1 << 1;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// What the host sets per node.
#[derive(Clone, Debug)]
pub struct LocalNode {
    /// Hit area in the node's own coordinates.
    pub local_bounds: Rect,
    /// Maps node coordinates into the parent's.
    pub local_transform: Affine,
    /// Stacking order across the whole scene; the highest hit wins.
    pub z_index: i32,
    /// Routing flags.
    pub flags: NodeFlags,
}

impl Default for LocalNode {
    fn default() -> Self {
        Self {
            local_bounds: Rect::ZERO,
            local_transform: Affine::IDENTITY,
            z_index: 0,
            flags: NodeFlags::default(),
        }
    }
}

/// Which nodes [`Tree::hit_test_point`](crate::Tree::hit_test_point) may return.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryFilter {
    /// Skip subtrees under an inactive node.
    pub active_only: bool,
    /// Skip nodes without [`NodeFlags::PICKABLE`].
    pub pickable_only: bool,
}

impl QueryFilter {
    /// The filter pointer routing uses.
    pub const INTERACTIVE: Self = Self {
        active_only: true,
        pickable_only: true,
    };
}

/// A node found under a point.
#[derive(Clone, Debug)]
pub struct Hit {
    /// The node.
    pub node: NodeId,
    /// Root first, ending with `node`.
    pub path: Vec<NodeId>,
}
