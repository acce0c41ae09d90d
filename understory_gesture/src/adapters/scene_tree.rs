// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adapter for Understory Scene Tree.
//!
//! ## Feature
//!
//! Enable with `scene_tree_adapter`.
//!
//! ## Notes
//!
//! [`Tree`] is used directly as both the [`SceneGraph`] and the [`HitTester`] passed to
//! [`Arbiter::process_frame`](crate::Arbiter::process_frame). Hit testing uses
//! [`QueryFilter::INTERACTIVE`], so inactive and unpickable nodes never become pointer
//! targets. Use [`FilteredHits`] for a different filter.

use kurbo::Point;
use understory_scene_tree::{NodeId, QueryFilter, Tree};

use crate::types::{HitTester, SceneGraph};

impl SceneGraph<NodeId> for Tree {
    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node)
    }

    fn child_count(&self, node: NodeId) -> usize {
        self.children(node).len()
    }

    fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.children(node).get(index).copied()
    }

    fn is_active(&self, node: NodeId) -> bool {
        self.is_active_in_hierarchy(node)
    }
}

impl HitTester<NodeId> for Tree {
    fn hit(&self, position: Point) -> Option<NodeId> {
        self.hit_test_point(position, QueryFilter::INTERACTIVE)
            .map(|hit| hit.node)
    }
}

/// Hit tests a [`Tree`] with a custom [`QueryFilter`].
#[derive(Clone, Copy, Debug)]
pub struct FilteredHits<'a> {
    /// Tree to query.
    pub tree: &'a Tree,
    /// Filter applied to every query.
    pub filter: QueryFilter,
}

impl HitTester<NodeId> for FilteredHits<'_> {
    fn hit(&self, position: Point) -> Option<NodeId> {
        self.tree
            .hit_test_point(position, self.filter)
            .map(|hit| hit.node)
    }
}
