// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene tree: slots, links, activation and hit testing.

use alloc::vec::Vec;
use kurbo::{Affine, Point, Rect};

use crate::types::{Hit, LocalNode, NodeFlags, NodeId, QueryFilter};

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: LocalNode,
}

/// Scene tree of interactive nodes.
pub struct Tree {
    nodes: Vec<Option<Node>>,
    // Survives frees so reused slots get a fresh generation.
    generations: Vec<u32>,
    free_list: Vec<usize>,
    roots: Vec<NodeId>,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let alive = self.nodes.iter().flatten().count();
        f.debug_struct("Tree")
            .field("slots", &self.nodes.len())
            .field("alive", &alive)
            .field("roots", &self.roots.len())
            .finish_non_exhaustive()
    }
}

impl Tree {
    /// An empty scene.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Insert a new node as the last child of `parent` (or as a root if `None`).
    ///
    /// A dead `parent` inserts the node as a root.
    pub fn insert(&mut self, parent: Option<NodeId>, local: LocalNode) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx] + 1;
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node {
                generation,
                parent: None,
                children: Vec::new(),
                local,
            });
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node {
                generation,
                parent: None,
                children: Vec::new(),
                local,
            }));
            self.generations.push(generation);
            (self.nodes.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeId slots are 32-bit."
        )]
        let id = NodeId::new(idx as u32, generation);
        match parent.filter(|p| self.is_alive(*p)) {
            Some(p) => self.link_parent(id, p),
            None => self.roots.push(id),
        }
        id
    }

    /// Remove a node together with everything below it.
    pub fn remove(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        self.detach(id);
        self.free_subtree(id);
    }

    /// Reparent `id` under `new_parent` (or make it a root if `None`).
    ///
    /// Reparenting a node under itself or one of its descendants is ignored.
    pub fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(p) = new_parent {
            if !self.is_alive(p) || self.is_ancestor_or_self(id, p) {
                return;
            }
        }
        self.detach(id);
        match new_parent {
            Some(p) => self.link_parent(id, p),
            None => self.roots.push(id),
        }
    }

    /// Update local bounds.
    pub fn set_local_bounds(&mut self, id: NodeId, bounds: Rect) {
        if let Some(node) = self.node_opt_mut(id) {
            node.local.local_bounds = bounds;
        }
    }

    /// Update local transform.
    pub fn set_local_transform(&mut self, id: NodeId, transform: Affine) {
        if let Some(node) = self.node_opt_mut(id) {
            node.local.local_transform = transform;
        }
    }

    /// Update z index.
    pub fn set_z_index(&mut self, id: NodeId, z: i32) {
        if let Some(node) = self.node_opt_mut(id) {
            node.local.z_index = z;
        }
    }

    /// Update flags.
    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) {
        if let Some(node) = self.node_opt_mut(id) {
            node.local.flags = flags;
        }
    }

    /// Toggle [`NodeFlags::ACTIVE`] on a node.
    pub fn set_active(&mut self, id: NodeId, active: bool) {
        if let Some(node) = self.node_opt_mut(id) {
            node.local.flags.set(NodeFlags::ACTIVE, active);
        }
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some()
    }

    /// Local data of a live node.
    pub fn local(&self, id: NodeId) -> Option<&LocalNode> {
        self.node_opt(id).map(|n| &n.local)
    }

    /// Parent of a live node, `None` for roots and dead ids.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.parent
    }

    /// Children of a live node in insertion order; empty for dead ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node_opt(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Root nodes in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Returns true if the node and all of its ancestors carry [`NodeFlags::ACTIVE`].
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(node) = self.node_opt(c) else {
                return false;
            };
            if !node.local.flags.contains(NodeFlags::ACTIVE) {
                return false;
            }
            cur = node.parent;
        }
        true
    }

    /// World transform of a node, composed from the root down.
    pub fn world_transform(&self, id: NodeId) -> Option<Affine> {
        let mut tf = self.node_opt(id)?.local.local_transform;
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            let node = self.node_opt(p)?;
            tf = node.local.local_transform * tf;
            cur = node.parent;
        }
        Some(tf)
    }

    /// Returns the topmost node at a world-space point.
    ///
    /// Candidates are ranked by z-index. Equal z-index ties are resolved in favor of the
    /// node visited last in a pre-order walk of the tree, so children win over parents and
    /// later siblings win over earlier ones.
    ///
    /// Honors [`QueryFilter`]. Inactive subtrees are skipped entirely when `active_only` is set.
    pub fn hit_test_point(&self, pt: Point, filter: QueryFilter) -> Option<Hit> {
        let mut best: Option<(NodeId, i32)> = None;
        for &root in &self.roots {
            self.hit_test_recursive(root, Affine::IDENTITY, pt, filter, &mut best);
        }
        best.map(|(node, _)| Hit {
            node,
            path: self.path_to_root(node),
        })
    }

    /// Path from the root to `id` (inclusive); empty for dead ids.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_alive(id) {
            return out;
        }
        let mut cur = Some(id);
        while let Some(c) = cur {
            out.push(c);
            cur = self.parent(c);
        }
        out.reverse();
        out
    }

    // --- internals ---

    fn hit_test_recursive(
        &self,
        id: NodeId,
        parent_tf: Affine,
        pt: Point,
        filter: QueryFilter,
        best: &mut Option<(NodeId, i32)>,
    ) {
        let Some(node) = self.node_opt(id) else {
            return;
        };
        if filter.active_only && !node.local.flags.contains(NodeFlags::ACTIVE) {
            return;
        }
        let world_tf = parent_tf * node.local.local_transform;
        let pickable = !filter.pickable_only || node.local.flags.contains(NodeFlags::PICKABLE);
        if pickable && world_tf.determinant() != 0.0 {
            let local_pt = world_tf.inverse() * pt;
            if node.local.local_bounds.contains(local_pt) {
                match *best {
                    Some((_, z_best)) if node.local.z_index < z_best => {}
                    _ => *best = Some((id, node.local.z_index)),
                }
            }
        }
        for &child in &node.children {
            self.hit_test_recursive(child, world_tf, pt, filter, best);
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children = match self.nodes[id.idx()].as_mut() {
            Some(n) => core::mem::take(&mut n.children),
            None => return,
        };
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    fn detach(&mut self, id: NodeId) {
        match self.parent(id) {
            Some(parent) => {
                if let Some(p) = self.node_opt_mut(parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        if let Some(n) = self.node_opt_mut(id) {
            n.parent = None;
        }
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId) {
        if let Some(p) = self.node_opt_mut(parent) {
            p.children.push(id);
        }
        if let Some(n) = self.node_opt_mut(id) {
            n.parent = Some(parent);
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use kurbo::Vec2;

    fn boxed(x0: f64, y0: f64, x1: f64, y1: f64) -> LocalNode {
        LocalNode {
            local_bounds: Rect::new(x0, y0, x1, y1),
            ..Default::default()
        }
    }

    #[test]
    fn insert_and_hit_test() {
        let mut tree = Tree::new();
        let root = tree.insert(None, boxed(0.0, 0.0, 200.0, 200.0));
        let _a = tree.insert(Some(root), boxed(10.0, 10.0, 60.0, 60.0));
        let b = tree.insert(
            Some(root),
            LocalNode {
                z_index: 10,
                ..boxed(40.0, 40.0, 120.0, 120.0)
            },
        );

        let hit = tree
            .hit_test_point(Point::new(50.0, 50.0), QueryFilter::INTERACTIVE)
            .unwrap();
        assert_eq!(hit.node, b, "topmost by z should win");
        assert_eq!(hit.path, vec![root, b]);
    }

    #[test]
    fn equal_z_prefers_deeper_node() {
        let mut tree = Tree::new();
        let root = tree.insert(None, boxed(0.0, 0.0, 100.0, 100.0));
        let child = tree.insert(Some(root), boxed(0.0, 0.0, 50.0, 50.0));
        let hit = tree
            .hit_test_point(Point::new(10.0, 10.0), QueryFilter::INTERACTIVE)
            .unwrap();
        assert_eq!(hit.node, child);
        let hit = tree
            .hit_test_point(Point::new(75.0, 75.0), QueryFilter::INTERACTIVE)
            .unwrap();
        assert_eq!(hit.node, root);
    }

    #[test]
    fn transforms_compose_from_root() {
        let mut tree = Tree::new();
        let root = tree.insert(
            None,
            LocalNode {
                local_transform: Affine::translate(Vec2::new(100.0, 0.0)),
                ..boxed(0.0, 0.0, 0.0, 0.0)
            },
        );
        let leaf = tree.insert(
            Some(root),
            LocalNode {
                local_transform: Affine::translate(Vec2::new(0.0, 100.0)),
                ..boxed(0.0, 0.0, 10.0, 10.0)
            },
        );
        let hit = tree.hit_test_point(Point::new(105.0, 105.0), QueryFilter::INTERACTIVE);
        assert_eq!(hit.map(|h| h.node), Some(leaf));
        assert!(
            tree.hit_test_point(Point::new(5.0, 5.0), QueryFilter::INTERACTIVE)
                .is_none()
        );
        let tf = tree.world_transform(leaf).unwrap();
        assert_eq!(tf * Point::ORIGIN, Point::new(100.0, 100.0));
    }

    #[test]
    fn inactive_subtree_is_skipped() {
        let mut tree = Tree::new();
        let root = tree.insert(None, boxed(0.0, 0.0, 100.0, 100.0));
        let panel = tree.insert(Some(root), boxed(0.0, 0.0, 50.0, 50.0));
        let button = tree.insert(Some(panel), boxed(0.0, 0.0, 10.0, 10.0));
        assert!(tree.is_active_in_hierarchy(button));

        tree.set_active(panel, false);
        assert!(!tree.is_active_in_hierarchy(button));
        assert!(tree.is_active_in_hierarchy(root));
        let hit = tree
            .hit_test_point(Point::new(5.0, 5.0), QueryFilter::INTERACTIVE)
            .unwrap();
        assert_eq!(hit.node, root);

        let unfiltered = tree
            .hit_test_point(Point::new(5.0, 5.0), QueryFilter::default())
            .unwrap();
        assert_eq!(unfiltered.node, button);
    }

    #[test]
    fn unpickable_node_is_transparent_but_children_are_not() {
        let mut tree = Tree::new();
        let root = tree.insert(None, boxed(0.0, 0.0, 100.0, 100.0));
        let overlay = tree.insert(
            Some(root),
            LocalNode {
                flags: NodeFlags::ACTIVE,
                z_index: 5,
                ..boxed(0.0, 0.0, 100.0, 100.0)
            },
        );
        let inner = tree.insert(
            Some(overlay),
            LocalNode {
                z_index: 5,
                ..boxed(20.0, 20.0, 30.0, 30.0)
            },
        );
        let hit = tree.hit_test_point(Point::new(50.0, 50.0), QueryFilter::INTERACTIVE);
        assert_eq!(hit.map(|h| h.node), Some(root));
        let hit = tree.hit_test_point(Point::new(25.0, 25.0), QueryFilter::INTERACTIVE);
        assert_eq!(hit.map(|h| h.node), Some(inner));
    }

    #[test]
    fn remove_frees_subtree_and_bumps_generation() {
        let mut tree = Tree::new();
        let root = tree.insert(None, boxed(0.0, 0.0, 10.0, 10.0));
        let a = tree.insert(Some(root), LocalNode::default());
        let b = tree.insert(Some(a), LocalNode::default());
        tree.remove(a);
        assert!(!tree.is_alive(a));
        assert!(!tree.is_alive(b));
        assert!(tree.children(root).is_empty());

        let c = tree.insert(Some(root), LocalNode::default());
        assert_ne!(c, a);
        assert_ne!(c, b);
        assert!(c.generation() > 1, "slot reuse must bump the generation");
        assert_eq!(tree.parent(c), Some(root));
    }

    #[test]
    fn reparent_moves_and_rejects_cycles() {
        let mut tree = Tree::new();
        let root = tree.insert(None, LocalNode::default());
        let a = tree.insert(Some(root), LocalNode::default());
        let b = tree.insert(Some(root), LocalNode::default());
        let leaf = tree.insert(Some(a), LocalNode::default());

        tree.reparent(leaf, Some(b));
        assert_eq!(tree.parent(leaf), Some(b));
        assert!(tree.children(a).is_empty());
        assert_eq!(tree.path_to_root(leaf), vec![root, b, leaf]);

        // Cycle: a root under its own descendant is ignored.
        tree.reparent(root, Some(leaf));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.roots(), &[root]);

        tree.reparent(b, None);
        assert_eq!(tree.roots(), &[root, b]);
        assert_eq!(tree.children(root), &[a]);
    }
}
