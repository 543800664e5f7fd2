//! Bounded-effort iteration.
//!
//! The walker's loops have no useful worst-case bound on adversarial
//! masks, so each one runs through [`Bounded`]: an iterator adapter that
//! yields at most `cap` items and never pulls from the inner iterator
//! once the cap is spent. The walker's inner iterators mutate the mask,
//! so an extra pull would do work that is then thrown away.
//!
//! Whether work was actually left over is the caller's question: after
//! the loop, combine [`Bounded::cap_reached`] with a side-effect-free
//! check on the caller's own state (the pipeline surfaces the result as
//! `AnalysisMetadata::truncated`). Hitting the cap is not an error.

/// Iterator adapter yielding at most `cap` items from `inner`.
#[derive(Debug)]
pub struct Bounded<I> {
    inner: I,
    remaining: usize,
}

impl<I: Iterator> Bounded<I> {
    /// Wrap `inner`, allowing at most `cap` items through.
    pub const fn new(inner: I, cap: usize) -> Self {
        Self {
            inner,
            remaining: cap,
        }
    }

    /// `true` once all `cap` items have been handed out.
    ///
    /// The inner iterator may or may not have had more; it is never
    /// asked.
    #[must_use]
    pub const fn cap_reached(&self) -> bool {
        self.remaining == 0
    }
}

impl<I: Iterator> Iterator for Bounded<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.inner.next();
        if item.is_some() {
            self.remaining -= 1;
        }
        item
    }
}

/// Extension trait adding [`bounded`](BoundedExt::bounded) to iterators.
pub trait BoundedExt: Iterator + Sized {
    /// Limit this iterator to `cap` items.
    fn bounded(self, cap: usize) -> Bounded<Self> {
        Bounded::new(self, cap)
    }
}

impl<I: Iterator> BoundedExt for I {}
