// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adapters to integrate with other Understory crates.
//!
//! Enabled via feature flags so the core carries no scene representation of its own.

#[cfg(feature = "scene_tree_adapter")]
pub mod scene_tree;
