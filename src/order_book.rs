//! Order Book - both sides of resting liquidity for one symbol.
//!
//! Each side maps price to a bucket handle through a [`PriceIndex`];
//! buckets live in their own pool. A side table maps order id to the
//! bucket and arena slot of the order so cancels and amends never
//! search. Best prices are cached and refreshed from the index when
//! the best bucket empties.

use std::fmt;
use std::ops::ControlFlow;

use rustc_hash::FxHashMap;

use crate::arena::{Arena, ArenaIndex, OrderNode};
use crate::bucket::OrderBucket;
use crate::command::Side;
use crate::config::BookConfig;
use crate::market_data::L2MarketData;
use crate::price_index::{Direction, PriceIndex};

/// Where a resting order lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderLocation {
    /// Bucket pool handle of the order's price level
    pub bucket: ArenaIndex,
    /// Order pool handle of the order itself
    pub slot: ArenaIndex,
}

/// Price-indexed book sides plus the order id table.
pub struct OrderBook<I: PriceIndex> {
    pub(crate) asks: I,
    pub(crate) bids: I,
    pub(crate) buckets: Arena<OrderBucket>,
    pub(crate) order_index: FxHashMap<u64, OrderLocation>,
    /// Cached best bid price (highest buy price)
    best_bid: Option<u64>,
    /// Cached best ask price (lowest sell price)
    best_ask: Option<u64>,
}

impl<I: PriceIndex> OrderBook<I> {
    pub fn new(config: &BookConfig) -> Self {
        Self {
            asks: I::with_config(config),
            bids: I::with_config(config),
            buckets: Arena::new(config.bucket_capacity),
            order_index: FxHashMap::with_capacity_and_hasher(config.order_capacity as usize, Default::default()),
            best_bid: None,
            best_ask: None,
        }
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Get the best bid price (highest buy price)
    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.best_bid
    }

    /// Get the best ask price (lowest sell price)
    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.best_ask
    }

    #[inline]
    pub fn best_price(&self, side: Side) -> Option<u64> {
        match side {
            Side::Bid => self.best_bid,
            Side::Ask => self.best_ask,
        }
    }

    /// Calculate spread (best_ask - best_bid)
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    // ========================================================================
    // Level Access
    // ========================================================================

    #[inline]
    pub fn side(&self, side: Side) -> &I {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    #[inline]
    pub fn bucket(&self, index: ArenaIndex) -> &OrderBucket {
        self.buckets.get(index)
    }

    /// Bucket resting at `price`, if any.
    pub fn bucket_at(&self, side: Side, price: u64) -> Option<&OrderBucket> {
        self.side(side).get(price).map(|idx| self.buckets.get(idx))
    }

    /// Get depth at a price level: `(volume, order count)`.
    pub fn depth_at(&self, side: Side, price: u64) -> (u64, u32) {
        self.bucket_at(side, price)
            .map(|b| (b.total_volume, b.num_orders))
            .unwrap_or((0, 0))
    }

    /// Whether `volume` more can rest at `price` without overflowing the level total.
    #[inline]
    pub fn level_has_room(&self, side: Side, price: u64, volume: u64) -> bool {
        self.depth_at(side, price).0.checked_add(volume).is_some()
    }

    /// Bucket at `price`, creating and indexing an empty one if needed.
    pub(crate) fn get_or_create_bucket(&mut self, side: Side, price: u64) -> ArenaIndex {
        let index = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        if let Some(existing) = index.get(price) {
            return existing;
        }

        let bucket = self.buckets.alloc();
        *self.buckets.get_mut(bucket) = OrderBucket::new(price);
        index.put(price, bucket);
        self.update_best_price_on_add(side, price);
        bucket
    }

    /// Drop an empty bucket from its index and the pool.
    ///
    /// Index removal, pool release and the best price refresh happen
    /// together so no caller can observe an empty indexed bucket.
    pub(crate) fn release_bucket(&mut self, side: Side, price: u64) {
        let index = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        let Some(bucket) = index.remove(price) else {
            return;
        };
        debug_assert!(self.buckets.get(bucket).is_empty(), "released a non-empty bucket");
        self.buckets.free(bucket);

        match side {
            Side::Bid if self.best_bid == Some(price) => {
                self.best_bid = self.bids.lower(price).map(|(p, _)| p);
            }
            Side::Ask if self.best_ask == Some(price) => {
                self.best_ask = self.asks.higher(price).map(|(p, _)| p);
            }
            _ => {}
        }
    }

    fn update_best_price_on_add(&mut self, side: Side, price: u64) {
        match side {
            Side::Bid => {
                if self.best_bid.map_or(true, |best| price > best) {
                    self.best_bid = Some(price);
                }
            }
            Side::Ask => {
                if self.best_ask.map_or(true, |best| price < best) {
                    self.best_ask = Some(price);
                }
            }
        }
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Queue the order in `slot` at the tail of its price level.
    ///
    /// # Returns
    /// `false` if the order id is already resting (nothing changes)
    pub fn add_order(&mut self, orders: &mut Arena<OrderNode>, slot: ArenaIndex) -> bool {
        let node = orders.get(slot);
        let (order_id, side, price) = (node.order_id, node.action, node.price);
        if self.order_index.contains_key(&order_id) {
            return false;
        }

        let bucket = self.get_or_create_bucket(side, price);
        self.buckets.get_mut(bucket).add(orders, slot);
        self.order_index.insert(order_id, OrderLocation { bucket, slot });
        true
    }

    /// Take an order owned by `uid` out of the book.
    ///
    /// The order leaves its bucket and the id table; an emptied bucket is
    /// released. The node stays allocated so the caller can report on it
    /// and then free or re-queue it.
    ///
    /// # Returns
    /// The order's slot, or `None` for an unknown id or a foreign owner
    pub fn unlink_order(&mut self, orders: &mut Arena<OrderNode>, order_id: u64, uid: u64) -> Option<ArenaIndex> {
        let location = *self.order_index.get(&order_id)?;
        let bucket = self.buckets.get_mut(location.bucket);
        let slot = bucket.remove(orders, location.slot, uid)?;
        let emptied = bucket.is_empty();
        self.order_index.remove(&order_id);

        if emptied {
            let node = orders.get(slot);
            self.release_bucket(node.action, node.price);
        }
        Some(slot)
    }

    #[inline]
    pub fn locate(&self, order_id: u64) -> Option<OrderLocation> {
        self.order_index.get(&order_id).copied()
    }

    #[inline]
    pub fn contains_order(&self, order_id: u64) -> bool {
        self.order_index.contains_key(&order_id)
    }

    // ========================================================================
    // Iteration and Snapshots
    // ========================================================================

    /// Visit the buckets of one side from best to worst until `f` breaks.
    pub fn visit_buckets(&self, side: Side, f: &mut dyn FnMut(&OrderBucket) -> ControlFlow<()>) {
        let direction = match side {
            Side::Ask => Direction::Ascending,
            Side::Bid => Direction::Descending,
        };
        self.side(side)
            .visit(direction, &mut |_, bucket| f(self.buckets.get(bucket)));
    }

    /// Aggregate the best `max_levels` prices of each side.
    pub fn l2_snapshot(&self, max_levels: usize) -> L2MarketData {
        let mut data = L2MarketData::with_capacity(max_levels.min(self.asks.len().max(self.bids.len())));

        for side in [Side::Ask, Side::Bid] {
            let mut taken = 0usize;
            self.visit_buckets(side, &mut |bucket| {
                if taken >= max_levels {
                    return ControlFlow::Break(());
                }
                taken += 1;
                match side {
                    Side::Ask => data.push_ask(bucket.price, bucket.total_volume, bucket.num_orders),
                    Side::Bid => data.push_bid(bucket.price, bucket.total_volume, bucket.num_orders),
                }
                ControlFlow::Continue(())
            });
        }
        data
    }

    // ========================================================================
    // Utility Methods
    // ========================================================================

    /// Get the total number of orders in the book
    pub fn order_count(&self) -> usize {
        self.order_index.len()
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order_index.is_empty()
    }

    /// Drop every level and order reference. Order nodes are owned by
    /// the caller's pool and must be released there.
    pub fn clear(&mut self) {
        self.asks.clear();
        self.bids.clear();
        self.buckets.clear();
        self.order_index.clear();
        self.best_bid = None;
        self.best_ask = None;
    }
}

impl<I: PriceIndex> fmt::Debug for OrderBook<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderBook")
            .field("best_bid", &self.best_bid)
            .field("best_ask", &self.best_ask)
            .field("bid_levels", &self.bids.len())
            .field("ask_levels", &self.asks.len())
            .field("order_count", &self.order_index.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hybrid_index::HybridIndex;
    use crate::radix_trie::RadixIndex;

    fn create_order(orders: &mut Arena<OrderNode>, order_id: u64, side: Side, price: u64, size: u64) -> ArenaIndex {
        let idx = orders.alloc();
        *orders.get_mut(idx) = OrderNode {
            order_id,
            uid: 1,
            action: side,
            price,
            size,
            ..OrderNode::empty()
        };
        idx
    }

    fn setup<I: PriceIndex>() -> (OrderBook<I>, Arena<OrderNode>) {
        let config = BookConfig::default().with_capacity(64, 16).with_hot_window(1024);
        (OrderBook::new(&config), Arena::new(64))
    }

    fn best_price_tracking<I: PriceIndex>() {
        let (mut book, mut orders) = setup::<I>();

        for (id, price) in [(1, 100), (2, 102), (3, 101)] {
            let idx = create_order(&mut orders, id, Side::Bid, price, 10);
            assert!(book.add_order(&mut orders, idx));
        }
        for (id, price) in [(4, 110), (5, 108)] {
            let idx = create_order(&mut orders, id, Side::Ask, price, 10);
            assert!(book.add_order(&mut orders, idx));
        }
        assert_eq!(book.best_bid(), Some(102));
        assert_eq!(book.best_ask(), Some(108));
        assert_eq!(book.spread(), Some(6));

        // Removing the best level falls back to the next one
        book.unlink_order(&mut orders, 2, 1).unwrap();
        assert_eq!(book.best_bid(), Some(101));
        book.unlink_order(&mut orders, 5, 1).unwrap();
        assert_eq!(book.best_ask(), Some(110));

        // Removing a non-best level leaves the cache alone
        book.unlink_order(&mut orders, 1, 1).unwrap();
        assert_eq!(book.best_bid(), Some(101));
        assert_eq!(book.bid_levels(), 1);
    }

    #[test]
    fn test_best_price_tracking_hybrid() {
        best_price_tracking::<HybridIndex>();
    }

    #[test]
    fn test_best_price_tracking_radix() {
        best_price_tracking::<RadixIndex>();
    }

    #[test]
    fn test_empty_book() {
        let (book, _) = setup::<HybridIndex>();
        assert!(book.is_empty());
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.spread(), None);
        assert_eq!(book.l2_snapshot(10), L2MarketData::default());
    }

    #[test]
    fn test_duplicate_order_id() {
        let (mut book, mut orders) = setup::<HybridIndex>();
        let first = create_order(&mut orders, 1, Side::Bid, 100, 10);
        let second = create_order(&mut orders, 1, Side::Bid, 100, 10);
        assert!(book.add_order(&mut orders, first));
        assert!(!book.add_order(&mut orders, second));
        assert_eq!(book.depth_at(Side::Bid, 100), (10, 1));
    }

    #[test]
    fn test_unlink_checks_owner_and_releases_bucket() {
        let (mut book, mut orders) = setup::<RadixIndex>();
        let idx = create_order(&mut orders, 7, Side::Ask, 50, 5);
        book.add_order(&mut orders, idx);

        assert_eq!(book.unlink_order(&mut orders, 7, 2), None);
        assert_eq!(book.unlink_order(&mut orders, 8, 1), None);
        assert_eq!(book.unlink_order(&mut orders, 7, 1), Some(idx));
        assert_eq!(book.ask_levels(), 0);
        assert_eq!(book.best_ask(), None);
        assert!(book.buckets.is_empty());
        // Node is still the caller's to release
        assert_eq!(orders.get(idx).order_id, 7);
    }

    #[test]
    fn test_l2_snapshot_best_first_and_capped() {
        let (mut book, mut orders) = setup::<HybridIndex>();
        let mut id = 0;
        let mut add = |book: &mut OrderBook<HybridIndex>, orders: &mut Arena<OrderNode>, side, price, size| {
            id += 1;
            let idx = create_order(orders, id, side, price, size);
            book.add_order(orders, idx);
        };
        add(&mut book, &mut orders, Side::Ask, 81_600, 100);
        add(&mut book, &mut orders, Side::Ask, 81_599, 50);
        add(&mut book, &mut orders, Side::Ask, 81_599, 25);
        add(&mut book, &mut orders, Side::Ask, 201_000, 28);
        add(&mut book, &mut orders, Side::Bid, 81_593, 40);
        add(&mut book, &mut orders, Side::Bid, 10_000, 12);

        let full = book.l2_snapshot(usize::MAX);
        assert_eq!(full.ask_prices, vec![81_599, 81_600, 201_000]);
        assert_eq!(full.ask_volumes, vec![75, 100, 28]);
        assert_eq!(full.ask_orders, vec![2, 1, 1]);
        assert_eq!(full.bid_prices, vec![81_593, 10_000]);

        let top = book.l2_snapshot(1);
        assert_eq!(top.ask_prices, vec![81_599]);
        assert_eq!(top.bid_prices, vec![81_593]);

        assert_eq!(book.l2_snapshot(0), L2MarketData::default());
    }

    #[test]
    fn test_clear() {
        let (mut book, mut orders) = setup::<RadixIndex>();
        let idx = create_order(&mut orders, 1, Side::Bid, 100, 10);
        book.add_order(&mut orders, idx);
        book.clear();
        assert!(book.is_empty());
        assert_eq!(book.bid_levels(), 0);
        assert_eq!(book.best_bid(), None);
    }
}
