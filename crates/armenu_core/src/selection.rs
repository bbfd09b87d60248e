//! Menu scroll tracking
//!
//! Derives the active card index from the horizontal scroll offset of the
//! card strip once scrolling has settled.

use std::time::Duration;

use crate::debounce::Debouncer;

/// Horizontal scroll measurement taken from the card strip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    /// `scrollLeft` of the strip
    pub offset: f64,
    /// Width of one card; non-positive when no card was measurable
    pub card_width: f64,
    /// Width of the strip itself, used when `card_width` is unusable
    pub viewport_width: f64,
}

impl ScrollSample {
    pub fn new(offset: f64, card_width: f64, viewport_width: f64) -> Self {
        Self {
            offset,
            card_width,
            viewport_width,
        }
    }

    /// Nearest card index for this sample, clamped to `[0, item_count)`
    pub fn nearest_index(&self, item_count: usize) -> Option<usize> {
        if item_count == 0 {
            return None;
        }
        let width = if self.card_width > 0.0 {
            self.card_width
        } else {
            self.viewport_width
        };
        if !(width > 0.0) || !self.offset.is_finite() {
            return None;
        }
        let index = (self.offset / width).round().max(0.0) as usize;
        Some(index.min(item_count - 1))
    }
}

/// Selection change produced by a settled scroll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionChange {
    pub previous: usize,
    pub current: usize,
}

/// Owns the active selection; only settled scroll positions move it
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    debounce: Debouncer<ScrollSample>,
    item_count: usize,
    current: usize,
    recomputations: u64,
}

impl ScrollTracker {
    pub fn new(item_count: usize, quiet_period: Duration) -> Self {
        Self {
            debounce: Debouncer::new(quiet_period),
            item_count,
            current: 0,
            recomputations: 0,
        }
    }

    /// Active selection index
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn quiet_period(&self) -> Duration {
        self.debounce.quiet_period()
    }

    /// Record a raw scroll event
    pub fn on_scroll(&mut self, now: Duration, sample: ScrollSample) {
        self.debounce.push(now, sample);
    }

    /// Deadline of the pending settle, if any
    pub fn settle_deadline(&self) -> Option<Duration> {
        self.debounce.deadline()
    }

    /// Recompute the index if the quiet period has elapsed.
    ///
    /// Returns a change only when the settled index differs from the current
    /// selection.
    pub fn settle(&mut self, now: Duration) -> Option<SelectionChange> {
        let sample = self.debounce.poll(now)?;
        self.recomputations += 1;

        let index = sample.nearest_index(self.item_count)?;
        if index == self.current {
            return None;
        }

        let change = SelectionChange {
            previous: self.current,
            current: index,
        };
        log::debug!(
            "Scroll settled at {:.1}px: selection {} -> {}",
            sample.offset,
            change.previous,
            change.current
        );
        self.current = index;
        Some(change)
    }

    /// Move the selection directly (e.g. initial mount)
    pub fn set_current(&mut self, index: usize) -> Option<SelectionChange> {
        if index >= self.item_count || index == self.current {
            return None;
        }
        let change = SelectionChange {
            previous: self.current,
            current: index,
        };
        self.current = index;
        Some(change)
    }

    /// How many times a settled sample was turned into an index
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}
