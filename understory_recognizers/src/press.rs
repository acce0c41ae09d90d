// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Press and release: recognizers that observe contacts without competing for them.

use understory_gesture::{
    GestureCx, GestureInfo, GestureState, NodeKey, Pointer, PointerCountState, PointerId,
    Recognizer,
};

/// Options shared by [`Press`] and [`Release`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PressConfig {
    /// Only accept pointers that hit the gesture's own node, not its descendants.
    pub ignore_children: bool,
}

fn accepts<K: NodeKey>(config: &PressConfig, node: K, pointer: &Pointer<K>) -> bool {
    !config.ignore_children || pointer.target() == Some(node)
}

/// Recognizes as soon as enough pointers touch down.
///
/// Never prevents other gestures and is never prevented by them, unless a delegate
/// decides otherwise.
#[derive(Clone, Debug, Default)]
pub struct Press {
    config: PressConfig,
}

impl Press {
    /// A press recognizer with the given options.
    pub fn new(config: PressConfig) -> Self {
        Self { config }
    }
}

impl<K: NodeKey> Recognizer<K> for Press {
    fn should_receive_pointer(&self, node: K, pointer: &Pointer<K>) -> bool {
        accepts(&self.config, node, pointer)
    }

    fn can_prevent(&self, _other: &GestureInfo<'_, K>) -> bool {
        false
    }

    fn can_be_prevented_by(&self, _other: &GestureInfo<'_, K>) -> bool {
        false
    }

    fn pointers_began(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        match cx.pointer_count_state() {
            PointerCountState::PassedMinThreshold => cx.set_state(GestureState::Ended),
            PointerCountState::PassedMinMaxThreshold => cx.set_state(GestureState::Failed),
            _ => {}
        }
    }
}

/// Recognizes when the pointers that engaged it lift again.
///
/// The counterpart of [`Press`], with the same non-competing prevention rules.
#[derive(Clone, Debug, Default)]
pub struct Release {
    config: PressConfig,
}

impl Release {
    /// A release recognizer with the given options.
    pub fn new(config: PressConfig) -> Self {
        Self { config }
    }
}

impl<K: NodeKey> Recognizer<K> for Release {
    fn should_receive_pointer(&self, node: K, pointer: &Pointer<K>) -> bool {
        accepts(&self.config, node, pointer)
    }

    fn can_prevent(&self, _other: &GestureInfo<'_, K>) -> bool {
        false
    }

    fn can_be_prevented_by(&self, _other: &GestureInfo<'_, K>) -> bool {
        false
    }

    fn pointers_began(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if cx.pointer_count_state() == PointerCountState::PassedMinMaxThreshold {
            cx.set_state(GestureState::Failed);
        }
    }

    fn pointers_ended(&mut self, cx: &mut GestureCx<'_, K>, _pointers: &[PointerId]) {
        if cx.pointer_count_state() == PointerCountState::PassedMinThreshold {
            cx.set_state(GestureState::Ended);
        }
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Vec2;
    use understory_gesture::GestureConfig;

    use super::*;
    use crate::testing::{CHILD, ROOT, Rig};
    use crate::{Pan, PanConfig, Tap};

    #[test]
    fn press_and_release_observe_alongside_a_pan() {
        let mut rig = Rig::new();
        let press = rig.add(1, GestureConfig::default(), Press::default());
        let release = rig.add(1, GestureConfig::default(), Release::default());
        let pan = rig.add(1, GestureConfig::default(), Pan::new(PanConfig::default()));

        let p = rig.down(CHILD);
        assert_eq!(rig.frame(), [(press, GestureState::Ended)]);
        rig.nudge(p, CHILD, Vec2::new(10.0, 0.0));
        assert_eq!(rig.frame(), [(pan, GestureState::Began)]);
        rig.input.end(p);
        assert_eq!(
            rig.frame(),
            [(release, GestureState::Ended), (pan, GestureState::Ended)]
        );
    }

    #[test]
    fn press_does_not_prevent_tap() {
        let mut rig = Rig::new();
        let press = rig.add(0, GestureConfig::default(), Press::default());
        let tap = rig.add(1, GestureConfig::default(), Tap::default());
        let p = rig.down(CHILD);
        assert_eq!(rig.frame(), [(press, GestureState::Ended)]);
        rig.input.end(p);
        assert_eq!(rig.frame(), [(tap, GestureState::Ended)]);
    }

    #[test]
    fn ignore_children_only_accepts_own_node() {
        let mut rig = Rig::new();
        let press = rig.add(
            0,
            GestureConfig::default(),
            Press::new(PressConfig {
                ignore_children: true,
            }),
        );
        rig.down(CHILD);
        assert!(rig.frame().is_empty());
        rig.down(ROOT);
        assert_eq!(rig.frame(), [(press, GestureState::Ended)]);
    }

    #[test]
    fn too_many_at_once_fails() {
        let mut rig = Rig::new();
        let press = rig.add(1, GestureConfig::with_pointers(1, 1), Press::default());
        rig.down(CHILD);
        rig.down(CHILD);
        assert_eq!(rig.frame(), [(press, GestureState::Failed)]);
    }
}
