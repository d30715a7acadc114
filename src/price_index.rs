//! Price Index - ordered map from price to the bucket resting at it.
//!
//! Each side of the book owns one index. The index only stores bucket
//! handles; the buckets themselves live in the book's bucket pool.
//! Implementations are selected at compile time through the
//! `OrderBook<I: PriceIndex>` parameter.

use std::ops::ControlFlow;

use crate::arena::ArenaIndex;
use crate::config::BookConfig;
use crate::error::BookError;

/// Visiting order for [`PriceIndex::visit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordered `price -> bucket` map with neighbour queries.
///
/// On the ask side [`first`](PriceIndex::first) is the best price, on
/// the bid side [`last`](PriceIndex::last) is.
pub trait PriceIndex {
    /// Build an empty index sized from `config`.
    fn with_config(config: &BookConfig) -> Self
    where
        Self: Sized;

    fn get(&self, price: u64) -> Option<ArenaIndex>;

    /// Insert `bucket` at `price`.
    ///
    /// If `price` is already present the existing bucket is kept and
    /// returned; callers treat that as "already there".
    fn put(&mut self, price: u64, bucket: ArenaIndex) -> Option<ArenaIndex>;

    fn remove(&mut self, price: u64) -> Option<ArenaIndex>;

    /// Smallest entry with price `>= price`.
    fn ceiling(&self, price: u64) -> Option<(u64, ArenaIndex)>;

    /// Largest entry with price `<= price`.
    fn floor(&self, price: u64) -> Option<(u64, ArenaIndex)>;

    /// Smallest entry with price `> price`.
    #[inline]
    fn higher(&self, price: u64) -> Option<(u64, ArenaIndex)> {
        price.checked_add(1).and_then(|p| self.ceiling(p))
    }

    /// Largest entry with price `< price`.
    #[inline]
    fn lower(&self, price: u64) -> Option<(u64, ArenaIndex)> {
        price.checked_sub(1).and_then(|p| self.floor(p))
    }

    #[inline]
    fn first(&self) -> Option<(u64, ArenaIndex)> {
        self.ceiling(0)
    }

    #[inline]
    fn last(&self) -> Option<(u64, ArenaIndex)> {
        self.floor(u64::MAX)
    }

    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Call `f` for every entry in `direction` until it breaks.
    fn visit(&self, direction: Direction, f: &mut dyn FnMut(u64, ArenaIndex) -> ControlFlow<()>);

    /// Check the implementation's internal structure.
    fn validate(&self) -> Result<(), BookError> {
        Ok(())
    }
}
