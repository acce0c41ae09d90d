// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Scene Tree: a small Kurbo-native scene hierarchy for gesture routing.
//!
//! - Represents a hierarchy of interactive nodes with local transforms, bounds, z-order, and flags.
//! - Answers the two questions a gesture arbiter asks of a scene: "what is under this point?"
//!   and "is this node active in the hierarchy?".
//!
//! There is no spatial index here; hit testing walks the tree. Scenes that need acceleration
//! should implement the arbiter's hit-testing trait over their own structure instead.
//!
//! ## API overview
//!
//! - [`Tree`]: container managing nodes.
//! - [`LocalNode`]: per-node local data (bounds, transform, z, flags).
//! - [`NodeFlags`]: activation and picking controls.
//! - [`NodeId`]: generational handle of a node.
//! - [`QueryFilter`]: restricts hit results (active/pickable).
//!
//! ## Minimal usage
//!
//! ```
//! use understory_scene_tree::{LocalNode, NodeFlags, QueryFilter, Tree};
//! use kurbo::{Point, Rect};
//!
//! let mut tree = Tree::new();
//! let root = tree.insert(
//!     None,
//!     LocalNode { local_bounds: Rect::new(0.0, 0.0, 200.0, 200.0), ..Default::default() },
//! );
//! let button = tree.insert(
//!     Some(root),
//!     LocalNode { local_bounds: Rect::new(10.0, 10.0, 60.0, 60.0), ..Default::default() },
//! );
//!
//! let hit = tree.hit_test_point(Point::new(20.0, 20.0), QueryFilter::INTERACTIVE).unwrap();
//! assert_eq!(hit.node, button);
//!
//! // Deactivating a node removes its subtree from routing.
//! tree.set_flags(root, NodeFlags::PICKABLE);
//! assert!(!tree.is_active_in_hierarchy(button));
//! assert!(tree.hit_test_point(Point::new(20.0, 20.0), QueryFilter::INTERACTIVE).is_none());
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod tree;
mod types;

pub use tree::Tree;
pub use types::{Hit, LocalNode, NodeFlags, NodeId, QueryFilter};
