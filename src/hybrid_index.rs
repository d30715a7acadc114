//! Hybrid Index - dense hot window plus sparse ordered overflow.
//!
//! Prices near the market land in a fixed-width window `[base, base + width)`
//! tracked by a bitset (one bit per tick) and a hash map. Neighbour queries
//! inside the window scan machine words with `trailing_zeros` /
//! `leading_zeros`. Anything outside the window goes to a `BTreeMap`.
//!
//! The window is anchored around the first price that arrives while it is
//! empty; far entries that fall inside a newly anchored window migrate in.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::ControlFlow;

use rustc_hash::FxHashMap;

use crate::arena::ArenaIndex;
use crate::config::BookConfig;
use crate::error::BookError;
use crate::price_index::{Direction, PriceIndex};

const WORD_BITS: u64 = 64;

/// One bit per tick of the hot window.
#[derive(Clone)]
struct WindowBits {
    words: Vec<u64>,
}

impl WindowBits {
    fn new(width: u64) -> Self {
        Self {
            words: vec![0; (width / WORD_BITS) as usize],
        }
    }

    #[inline]
    fn set(&mut self, slot: u64) {
        self.words[(slot / WORD_BITS) as usize] |= 1 << (slot % WORD_BITS);
    }

    #[inline]
    fn unset(&mut self, slot: u64) {
        self.words[(slot / WORD_BITS) as usize] &= !(1 << (slot % WORD_BITS));
    }

    #[inline]
    fn contains(&self, slot: u64) -> bool {
        self.words[(slot / WORD_BITS) as usize] & (1 << (slot % WORD_BITS)) != 0
    }

    /// First set slot `>= from`.
    fn next_set(&self, from: u64) -> Option<u64> {
        let mut word_idx = (from / WORD_BITS) as usize;
        let mut word = *self.words.get(word_idx)? & (u64::MAX << (from % WORD_BITS));
        loop {
            if word != 0 {
                return Some(word_idx as u64 * WORD_BITS + word.trailing_zeros() as u64);
            }
            word_idx += 1;
            word = *self.words.get(word_idx)?;
        }
    }

    /// Last set slot `<= from`.
    fn prev_set(&self, from: u64) -> Option<u64> {
        let mut word_idx = (from / WORD_BITS) as usize;
        let mut word = *self.words.get(word_idx)? & (u64::MAX >> (WORD_BITS - 1 - from % WORD_BITS));
        loop {
            if word != 0 {
                return Some(word_idx as u64 * WORD_BITS + (WORD_BITS - 1 - word.leading_zeros() as u64));
            }
            word_idx = word_idx.checked_sub(1)?;
            word = self.words[word_idx];
        }
    }

    fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn clear(&mut self) {
        self.words.fill(0);
    }
}

/// Price index tuned for books whose activity clusters near the touch.
#[derive(Clone)]
pub struct HybridIndex {
    width: u64,
    /// First price of the hot window
    base: u64,
    bits: WindowBits,
    hot: FxHashMap<u64, ArenaIndex>,
    far: BTreeMap<u64, ArenaIndex>,
}

impl HybridIndex {
    /// Create an index with a hot window of `width` ticks.
    ///
    /// # Panics
    /// Panics if `width` is zero or not a multiple of 64
    pub fn new(width: u64) -> Self {
        assert!(
            width > 0 && width % WORD_BITS == 0,
            "hot window width must be a non-zero multiple of 64"
        );
        Self {
            width,
            base: 0,
            bits: WindowBits::new(width),
            hot: FxHashMap::default(),
            far: BTreeMap::new(),
        }
    }

    /// Last price of the hot window (inclusive).
    #[inline]
    fn window_end(&self) -> u64 {
        self.base + (self.width - 1)
    }

    /// Offset of `price` inside the hot window, if it falls there.
    #[inline]
    fn slot(&self, price: u64) -> Option<u64> {
        price.checked_sub(self.base).filter(|offset| *offset < self.width)
    }

    #[inline]
    fn hot_entry(&self, slot: u64) -> Option<(u64, ArenaIndex)> {
        let price = self.base + slot;
        self.hot.get(&price).map(|bucket| (price, *bucket))
    }

    /// Anchor the (empty) window around `price` and pull far entries into it.
    fn rebase(&mut self, price: u64) {
        debug_assert!(self.hot.is_empty());
        self.base = price.saturating_sub(self.width / 2).min(u64::MAX - (self.width - 1));

        let inside: Vec<u64> = self.far.range(self.base..=self.window_end()).map(|(p, _)| *p).collect();
        for price in inside {
            if let Some(bucket) = self.far.remove(&price) {
                self.bits.set(price - self.base);
                self.hot.insert(price, bucket);
            }
        }
    }

    fn far_above_window(&self) -> Option<(u64, ArenaIndex)> {
        let start = self.window_end().checked_add(1)?;
        self.far.range(start..).next().map(|(p, b)| (*p, *b))
    }

    fn far_below_window(&self) -> Option<(u64, ArenaIndex)> {
        self.far.range(..self.base).next_back().map(|(p, b)| (*p, *b))
    }

    fn hot_first(&self) -> Option<(u64, ArenaIndex)> {
        self.bits.next_set(0).and_then(|slot| self.hot_entry(slot))
    }

    fn hot_last(&self) -> Option<(u64, ArenaIndex)> {
        self.bits.prev_set(self.width - 1).and_then(|slot| self.hot_entry(slot))
    }

    /// Entries currently held in the hot window
    pub fn hot_len(&self) -> usize {
        self.hot.len()
    }

    /// Entries currently held in the overflow tree
    pub fn far_len(&self) -> usize {
        self.far.len()
    }

    /// Current hot window as an inclusive price range
    pub fn window(&self) -> (u64, u64) {
        (self.base, self.window_end())
    }

    fn visit_hot(&self, direction: Direction, f: &mut dyn FnMut(u64, ArenaIndex) -> ControlFlow<()>) -> ControlFlow<()> {
        let mut cursor = match direction {
            Direction::Ascending => self.bits.next_set(0),
            Direction::Descending => self.bits.prev_set(self.width - 1),
        };
        while let Some(slot) = cursor {
            if let Some((price, bucket)) = self.hot_entry(slot) {
                f(price, bucket)?;
            }
            cursor = match direction {
                Direction::Ascending => slot.checked_add(1).and_then(|s| self.bits.next_set(s)),
                Direction::Descending => slot.checked_sub(1).and_then(|s| self.bits.prev_set(s)),
            };
        }
        ControlFlow::Continue(())
    }

    fn visit_all(&self, direction: Direction, f: &mut dyn FnMut(u64, ArenaIndex) -> ControlFlow<()>) -> ControlFlow<()> {
        let mut above = match self.window_end().checked_add(1) {
            Some(start) => self.far.range(start..),
            None => self.far.range(u64::MAX..u64::MAX),
        };
        let mut below = self.far.range(..self.base);

        match direction {
            Direction::Ascending => {
                below.try_for_each(|(p, b)| f(*p, *b))?;
                self.visit_hot(direction, f)?;
                above.try_for_each(|(p, b)| f(*p, *b))
            }
            Direction::Descending => {
                above.rev().try_for_each(|(p, b)| f(*p, *b))?;
                self.visit_hot(direction, f)?;
                below.rev().try_for_each(|(p, b)| f(*p, *b))
            }
        }
    }
}

impl PriceIndex for HybridIndex {
    fn with_config(config: &BookConfig) -> Self {
        Self::new(config.hot_window)
    }

    #[inline]
    fn get(&self, price: u64) -> Option<ArenaIndex> {
        match self.slot(price) {
            Some(_) => self.hot.get(&price).copied(),
            None => self.far.get(&price).copied(),
        }
    }

    /// Index `bucket` at `price` unless a bucket is already there.
    ///
    /// The window only re-anchors while it holds nothing. A single price
    /// still resting inside it keeps it in place, so once the market drifts
    /// away every new level goes to the far tree until the window drains.
    fn put(&mut self, price: u64, bucket: ArenaIndex) -> Option<ArenaIndex> {
        if let Some(existing) = self.get(price) {
            return Some(existing);
        }
        if self.hot.is_empty() && self.slot(price).is_none() {
            self.rebase(price);
        }
        match self.slot(price) {
            Some(slot) => {
                self.bits.set(slot);
                self.hot.insert(price, bucket);
            }
            None => {
                self.far.insert(price, bucket);
            }
        }
        None
    }

    fn remove(&mut self, price: u64) -> Option<ArenaIndex> {
        match self.slot(price) {
            Some(slot) => {
                let bucket = self.hot.remove(&price)?;
                self.bits.unset(slot);
                Some(bucket)
            }
            None => self.far.remove(&price),
        }
    }

    fn ceiling(&self, price: u64) -> Option<(u64, ArenaIndex)> {
        if price < self.base {
            self.far
                .range(price..self.base)
                .next()
                .map(|(p, b)| (*p, *b))
                .or_else(|| self.hot_first())
                .or_else(|| self.far_above_window())
        } else if let Some(slot) = self.slot(price) {
            self.bits
                .next_set(slot)
                .and_then(|s| self.hot_entry(s))
                .or_else(|| self.far_above_window())
        } else {
            self.far.range(price..).next().map(|(p, b)| (*p, *b))
        }
    }

    fn floor(&self, price: u64) -> Option<(u64, ArenaIndex)> {
        let end = self.window_end();
        if price > end {
            self.far
                .range(end + 1..=price)
                .next_back()
                .map(|(p, b)| (*p, *b))
                .or_else(|| self.hot_last())
                .or_else(|| self.far_below_window())
        } else if let Some(slot) = self.slot(price) {
            self.bits
                .prev_set(slot)
                .and_then(|s| self.hot_entry(s))
                .or_else(|| self.far_below_window())
        } else {
            self.far.range(..=price).next_back().map(|(p, b)| (*p, *b))
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.hot.len() + self.far.len()
    }

    fn clear(&mut self) {
        self.bits.clear();
        self.hot.clear();
        self.far.clear();
    }

    fn visit(&self, direction: Direction, f: &mut dyn FnMut(u64, ArenaIndex) -> ControlFlow<()>) {
        let _ = self.visit_all(direction, f);
    }

    fn validate(&self) -> Result<(), BookError> {
        for &price in self.hot.keys() {
            match self.slot(price) {
                Some(slot) if self.bits.contains(slot) => {}
                Some(_) => {
                    return Err(BookError::HotWindow {
                        price,
                        reason: "hot entry without its bit",
                    })
                }
                None => {
                    return Err(BookError::HotWindow {
                        price,
                        reason: "hot entry outside the window",
                    })
                }
            }
        }
        if self.bits.count() != self.hot.len() {
            return Err(BookError::HotWindow {
                price: self.base,
                reason: "bit count differs from hot entry count",
            });
        }
        if let Some(&price) = self.far.keys().find(|p| self.slot(**p).is_some()) {
            return Err(BookError::HotWindow {
                price,
                reason: "far entry inside the window",
            });
        }
        Ok(())
    }
}

impl fmt::Debug for HybridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridIndex")
            .field("window", &self.window())
            .field("hot", &self.hot.len())
            .field("far", &self.far.len())
            .finish()
    }
}
