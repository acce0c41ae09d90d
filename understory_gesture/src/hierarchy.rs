// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hierarchy query: candidate gesture lists along the tree.
//!
//! All three queries append to a caller-provided buffer. Descendant walks keep an
//! explicit node stack, so tree depth is bounded by memory rather than by the call
//! stack. Only enabled gestures on nodes that are active in the hierarchy are listed.
//!
//! - [`ending_with`]: the node, then each ancestor up to the root.
//! - [`beginning_with`]: optionally the node, then every descendant in pre-order.
//! - [`containing`]: [`ending_with`] followed by the strict descendants.
//!
//! Within a node, gestures appear in attachment order.
//!
//! ```
//! use understory_gesture::hierarchy::{containing, GestureLookup};
//! use understory_gesture::{GestureId, SceneGraph};
//!
//! // A chain 0 -> 1 -> 2 with no gestures attached.
//! struct Chain;
//! impl SceneGraph<u32> for Chain {
//!     fn parent_of(&self, n: u32) -> Option<u32> { n.checked_sub(1) }
//!     fn child_count(&self, n: u32) -> usize { usize::from(n < 2) }
//!     fn child_at(&self, n: u32, _: usize) -> Option<u32> { (n < 2).then_some(n + 1) }
//!     fn is_active(&self, _: u32) -> bool { true }
//! }
//! struct NoGestures;
//! impl GestureLookup<u32> for NoGestures {
//!     fn enabled_gestures(&self, _: u32, _: &mut Vec<GestureId>) {}
//! }
//!
//! let mut out = Vec::new();
//! containing(&Chain, &NoGestures, 1, &mut out);
//! assert!(out.is_empty());
//! ```

use crate::types::{GestureId, SceneGraph};

/// Source of the gestures attached to each node.
pub trait GestureLookup<K> {
    /// Append the enabled gestures attached to `node`, in attachment order.
    fn enabled_gestures(&self, node: K, out: &mut Vec<GestureId>);
}

/// Gestures on `node` and then on each of its ancestors, target to root.
pub fn ending_with<K: Copy>(
    tree: &dyn SceneGraph<K>,
    gestures: &dyn GestureLookup<K>,
    node: K,
    out: &mut Vec<GestureId>,
) {
    let mut cur = Some(node);
    while let Some(n) = cur {
        if tree.is_active(n) {
            gestures.enabled_gestures(n, out);
        }
        cur = tree.parent_of(n);
    }
}

/// Gestures on `node` (when `include_self`) and on all of its descendants, pre-order.
///
/// Inactive nodes are skipped together with their subtrees.
pub fn beginning_with<K: Copy>(
    tree: &dyn SceneGraph<K>,
    gestures: &dyn GestureLookup<K>,
    node: K,
    include_self: bool,
    out: &mut Vec<GestureId>,
) {
    beginning_with_in(tree, gestures, node, include_self, out, &mut Vec::new());
}

/// [`beginning_with`] walking on a caller-owned node stack.
pub(crate) fn beginning_with_in<K: Copy>(
    tree: &dyn SceneGraph<K>,
    gestures: &dyn GestureLookup<K>,
    node: K,
    include_self: bool,
    out: &mut Vec<GestureId>,
    stack: &mut Vec<K>,
) {
    if !tree.is_active(node) {
        return;
    }
    if include_self {
        gestures.enabled_gestures(node, out);
    }
    stack.clear();
    push_children(tree, node, stack);
    while let Some(n) = stack.pop() {
        // `is_active` covers ancestors, but a child can still carry its own inactive flag.
        if !tree.is_active(n) {
            continue;
        }
        gestures.enabled_gestures(n, out);
        push_children(tree, n, stack);
    }
}

// Reversed, so popping yields children first to last.
fn push_children<K: Copy>(tree: &dyn SceneGraph<K>, node: K, stack: &mut Vec<K>) {
    for i in (0..tree.child_count(node)).rev() {
        if let Some(child) = tree.child_at(node, i) {
            stack.push(child);
        }
    }
}

/// [`ending_with`] followed by the strict descendants of `node`.
///
/// The two halves never overlap, so the result has no duplicates.
pub fn containing<K: Copy>(
    tree: &dyn SceneGraph<K>,
    gestures: &dyn GestureLookup<K>,
    node: K,
    out: &mut Vec<GestureId>,
) {
    containing_in(tree, gestures, node, out, &mut Vec::new());
}

/// [`containing`] walking on a caller-owned node stack.
pub(crate) fn containing_in<K: Copy>(
    tree: &dyn SceneGraph<K>,
    gestures: &dyn GestureLookup<K>,
    node: K,
    out: &mut Vec<GestureId>,
    stack: &mut Vec<K>,
) {
    ending_with(tree, gestures, node, out);
    beginning_with_in(tree, gestures, node, false, out, stack);
}

#[cfg(test)]
pub(crate) mod test_tree {
    //! A tiny adjacency-list tree shared by the crate's unit tests.

    use std::collections::HashSet;

    use crate::types::SceneGraph;

    #[derive(Debug, Default)]
    pub(crate) struct TestTree {
        pub(crate) parent: Vec<Option<u32>>,
        pub(crate) children: Vec<Vec<u32>>,
        pub(crate) inactive: HashSet<u32>,
    }

    impl TestTree {
        /// Add a node under `parent` and return its key.
        pub(crate) fn add(&mut self, parent: Option<u32>) -> u32 {
            #[allow(clippy::cast_possible_truncation, reason = "Test trees are tiny.")]
            let id = self.parent.len() as u32;
            self.parent.push(parent);
            self.children.push(Vec::new());
            if let Some(p) = parent {
                self.children[p as usize].push(id);
            }
            id
        }
    }

    impl SceneGraph<u32> for TestTree {
        fn parent_of(&self, node: u32) -> Option<u32> {
            self.parent.get(node as usize).copied().flatten()
        }

        fn child_count(&self, node: u32) -> usize {
            self.children.get(node as usize).map_or(0, Vec::len)
        }

        fn child_at(&self, node: u32, index: usize) -> Option<u32> {
            self.children.get(node as usize)?.get(index).copied()
        }

        fn is_active(&self, node: u32) -> bool {
            let mut cur = Some(node);
            while let Some(n) = cur {
                if self.inactive.contains(&n) {
                    return false;
                }
                cur = self.parent_of(n);
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::test_tree::TestTree;
    use super::*;

    #[derive(Default)]
    struct Attached {
        by_node: HashMap<u32, Vec<GestureId>>,
        disabled: Vec<GestureId>,
    }

    impl Attached {
        fn attach(&mut self, node: u32) -> GestureId {
            #[allow(clippy::cast_possible_truncation, reason = "Test trees are tiny.")]
            let id = GestureId::new(self.by_node.values().map(Vec::len).sum::<usize>() as u32, 1);
            self.by_node.entry(node).or_default().push(id);
            id
        }
    }

    impl GestureLookup<u32> for Attached {
        fn enabled_gestures(&self, node: u32, out: &mut Vec<GestureId>) {
            if let Some(list) = self.by_node.get(&node) {
                out.extend(list.iter().filter(|g| !self.disabled.contains(g)));
            }
        }
    }

    //      0
    //     / \
    //    1   2
    //   / \
    //  3   4
    fn sample() -> (TestTree, Attached, [GestureId; 6]) {
        let mut tree = TestTree::default();
        let n0 = tree.add(None);
        let n1 = tree.add(Some(n0));
        let n2 = tree.add(Some(n0));
        let n3 = tree.add(Some(n1));
        let n4 = tree.add(Some(n1));
        let mut g = Attached::default();
        let ids = [
            g.attach(n0),
            g.attach(n1),
            g.attach(n1),
            g.attach(n2),
            g.attach(n3),
            g.attach(n4),
        ];
        (tree, g, ids)
    }

    #[test]
    fn ending_with_walks_target_to_root() {
        let (tree, g, ids) = sample();
        let mut out = Vec::new();
        ending_with(&tree, &g, 3, &mut out);
        assert_eq!(out, [ids[4], ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn beginning_with_is_preorder() {
        let (tree, g, ids) = sample();
        let mut out = Vec::new();
        beginning_with(&tree, &g, 0, true, &mut out);
        assert_eq!(out, [ids[0], ids[1], ids[2], ids[4], ids[5], ids[3]]);

        out.clear();
        beginning_with(&tree, &g, 1, false, &mut out);
        assert_eq!(out, [ids[4], ids[5]]);
    }

    #[test]
    fn containing_is_ancestors_then_descendants() {
        let (tree, g, ids) = sample();
        let mut out = Vec::new();
        containing(&tree, &g, 1, &mut out);
        assert_eq!(out, [ids[1], ids[2], ids[0], ids[4], ids[5]]);
    }

    #[test]
    fn inactive_nodes_and_disabled_gestures_are_skipped() {
        let (mut tree, mut g, ids) = sample();
        tree.inactive.insert(4);
        g.disabled.push(ids[1]);
        let mut out = Vec::new();
        containing(&tree, &g, 1, &mut out);
        assert_eq!(out, [ids[2], ids[0], ids[4]]);

        // An inactive ancestor hides the whole chain below it.
        tree.inactive.insert(1);
        out.clear();
        ending_with(&tree, &g, 3, &mut out);
        assert_eq!(out, [ids[0]]);
        out.clear();
        beginning_with(&tree, &g, 1, true, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn deep_chains_walk_without_recursion() {
        // Node `n` has the single child `n + 1`, down to `self.0`.
        struct Chain(u32);
        impl SceneGraph<u32> for Chain {
            fn parent_of(&self, n: u32) -> Option<u32> {
                n.checked_sub(1)
            }
            fn child_count(&self, n: u32) -> usize {
                usize::from(n < self.0)
            }
            fn child_at(&self, n: u32, _: usize) -> Option<u32> {
                (n < self.0).then_some(n + 1)
            }
            fn is_active(&self, _: u32) -> bool {
                true
            }
        }
        struct OnNode(u32, GestureId);
        impl GestureLookup<u32> for OnNode {
            fn enabled_gestures(&self, node: u32, out: &mut Vec<GestureId>) {
                if node == self.0 {
                    out.push(self.1);
                }
            }
        }

        let depth = 200_000;
        let leaf = GestureId::new(0, 1);
        let mut out = Vec::new();
        let mut stack = Vec::new();
        containing_in(&Chain(depth), &OnNode(depth, leaf), 0, &mut out, &mut stack);
        assert_eq!(out, [leaf]);
        assert!(stack.capacity() >= 1);

        out.clear();
        containing(&Chain(depth), &OnNode(0, leaf), depth, &mut out);
        assert_eq!(out, [leaf]);
    }

    #[test]
    fn output_is_appended_not_replaced() {
        let (tree, g, ids) = sample();
        let mut out = vec![ids[3]];
        ending_with(&tree, &g, 2, &mut out);
        assert_eq!(out, [ids[3], ids[3], ids[0]]);
    }
}
