//! Count-based windows over an element stream.
//!
//! Both adapters are lazy and pull from their source only as far as the next
//! window needs, so they work on unbounded streams.

use std::collections::VecDeque;

/// Fixed-size, non-overlapping chunks.
pub struct Batches<I: Iterator> {
    src: I,
    size: usize,
    drop_tail: bool,
}

impl<I: Iterator> Batches<I> {
    /// `size` is clamped to at least 1.
    pub fn new(src: I, size: usize, drop_tail: bool) -> Self {
        Self {
            src,
            size: size.max(1),
            drop_tail,
        }
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<_> = self.src.by_ref().take(self.size).collect();
        if chunk.is_empty() || (self.drop_tail && chunk.len() < self.size) {
            return None;
        }
        Some(chunk)
    }
}

/// Sliding windows of `size` elements that advance by `step`.
///
/// Once a window fills up it is emitted and its first `step` elements are
/// dropped; when `step > size` the following `step - size` source elements
/// are skipped as well. With `drop_head == false` every growing prefix
/// `[x0]`, `[x0, x1]`, ... before the first full window is emitted too. With
/// `drop_tail == false` the buffer left at the end is emitted, losing `step`
/// elements at a time until it is empty.
///
/// ```
/// use datacollection::window::Rolling;
///
/// let w: Vec<_> = Rolling::new(0..5, 3, 1, false, true).collect();
/// assert_eq!(w, vec![vec![0], vec![0, 1], vec![0, 1, 2], vec![1, 2, 3], vec![2, 3, 4]]);
///
/// let w: Vec<_> = Rolling::new(0..5, 2, 2, false, false).collect();
/// assert_eq!(w, vec![vec![0], vec![0, 1], vec![2, 3], vec![4]]);
/// ```
pub struct Rolling<I: Iterator> {
    src: I,
    buf: VecDeque<I::Item>,
    size: usize,
    step: usize,
    drop_head: bool,
    drop_tail: bool,
    // Source elements still to skip after a full window.
    gap: usize,
    // No full window has been seen yet.
    in_head: bool,
    exhausted: bool,
}

impl<I: Iterator> Rolling<I> {
    /// `size` and `step` are clamped to at least 1.
    pub fn new(src: I, size: usize, step: usize, drop_head: bool, drop_tail: bool) -> Self {
        let size = size.max(1);
        Self {
            src,
            buf: VecDeque::with_capacity(size),
            size,
            step: step.max(1),
            drop_head,
            drop_tail,
            gap: 0,
            in_head: true,
            exhausted: false,
        }
    }

    fn advance(&mut self) {
        let n = self.step.min(self.buf.len());
        self.buf.drain(..n);
    }
}

impl<I> Iterator for Rolling<I>
where
    I: Iterator,
    I::Item: Clone,
{
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            let Some(x) = self.src.next() else {
                self.exhausted = true;
                break;
            };
            if self.gap > 0 {
                self.gap -= 1;
                continue;
            }
            self.buf.push_back(x);

            let full = self.buf.len() == self.size;
            let window = (full || (self.in_head && !self.drop_head))
                .then(|| self.buf.iter().cloned().collect());
            if full {
                self.in_head = false;
                self.advance();
                self.gap = self.step.saturating_sub(self.size);
            }
            if window.is_some() {
                return window;
            }
        }

        if self.drop_tail || self.buf.is_empty() {
            return None;
        }
        let window = self.buf.iter().cloned().collect();
        self.advance();
        Some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_keep_or_drop_tail() {
        let kept: Vec<_> = Batches::new(0..7, 3, false).collect();
        assert_eq!(kept, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        let dropped: Vec<_> = Batches::new(0..7, 3, true).collect();
        assert_eq!(dropped, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn rolling_full_windows_only() {
        let w: Vec<_> = Rolling::new(0..5, 3, 1, true, true).collect();
        assert_eq!(w, vec![vec![0, 1, 2], vec![1, 2, 3], vec![2, 3, 4]]);
    }

    #[test]
    fn rolling_with_tail() {
        let w: Vec<_> = Rolling::new(0..5, 3, 1, true, false).collect();
        assert_eq!(
            w,
            vec![vec![0, 1, 2], vec![1, 2, 3], vec![2, 3, 4], vec![3, 4], vec![4]]
        );
    }

    #[test]
    fn rolling_step_skips_windows() {
        let w: Vec<_> = Rolling::new(0..6, 2, 2, true, true).collect();
        assert_eq!(w, vec![vec![0, 1], vec![2, 3], vec![4, 5]]);
    }

    #[test]
    fn rolling_step_of_window_size_keeps_head_and_tail() {
        let w: Vec<_> = Rolling::new(0..5, 2, 2, false, false).collect();
        assert_eq!(w, vec![vec![0], vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[test]
    fn rolling_step_past_window_skips_elements() {
        let w: Vec<_> = Rolling::new(0..5, 2, 4, false, false).collect();
        assert_eq!(w, vec![vec![0], vec![0, 1], vec![4]]);

        let full: Vec<_> = Rolling::new(0..10, 2, 3, true, true).collect();
        assert_eq!(full, vec![vec![0, 1], vec![3, 4], vec![6, 7]]);
    }

    #[test]
    fn rolling_tail_shrinks_by_step() {
        let w: Vec<_> = Rolling::new(0..6, 4, 2, true, false).collect();
        assert_eq!(w, vec![vec![0, 1, 2, 3], vec![2, 3, 4, 5], vec![4, 5]]);
    }

    #[test]
    fn rolling_short_source() {
        let w: Vec<_> = Rolling::new(0..2, 3, 1, true, false).collect();
        assert_eq!(w, vec![vec![0, 1], vec![1]]);
        let none: Vec<Vec<i32>> = Rolling::new(0..2, 3, 1, true, true).collect();
        assert!(none.is_empty());
    }
}
