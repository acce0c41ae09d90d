// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pool of reusable buffers for per-frame traversal.

/// A free list of cleared vectors.
///
/// Arbitration recurses (a recognition can fail peers, whose failure can fail their
/// dependents in turn), so each level takes its own buffer and hands it
/// back when done. After warm-up the pool holds one buffer per nesting level and
/// steady-state frames allocate nothing.
#[derive(Debug)]
pub(crate) struct Scratch<T> {
    free: Vec<Vec<T>>,
}

impl<T> Default for Scratch<T> {
    fn default() -> Self {
        Self { free: Vec::new() }
    }
}

impl<T> Scratch<T> {
    /// Borrow an empty buffer.
    pub(crate) fn take(&mut self) -> Vec<T> {
        self.free.pop().unwrap_or_default()
    }

    /// Return a buffer to the pool. Its contents are dropped, its capacity kept.
    pub(crate) fn give(&mut self, mut buf: Vec<T>) {
        buf.clear();
        self.free.push(buf);
    }

    #[cfg(test)]
    pub(crate) fn pooled(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::Scratch;

    #[test]
    fn buffers_come_back_empty_with_capacity() {
        let mut pool: Scratch<u32> = Scratch::default();
        let mut a = pool.take();
        a.extend([1, 2, 3]);
        let cap = a.capacity();
        pool.give(a);
        assert_eq!(pool.pooled(), 1);

        let b = pool.take();
        assert!(b.is_empty());
        assert_eq!(b.capacity(), cap);
        assert_eq!(pool.pooled(), 0);
    }

    #[test]
    fn nested_takes_get_distinct_buffers() {
        let mut pool: Scratch<u32> = Scratch::default();
        let mut outer = pool.take();
        outer.push(1);
        let mut inner = pool.take();
        inner.push(2);
        assert_eq!(outer, [1]);
        assert_eq!(inner, [2]);
        pool.give(inner);
        pool.give(outer);
        assert_eq!(pool.pooled(), 2);
    }
}
