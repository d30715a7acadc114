//! Order Bucket - the FIFO queue of resting orders at one price.
//!
//! Orders are chained through the `prev`/`next` arena indices of their
//! nodes, so the bucket itself is a few words and lives in its own pool.
//! `total_volume` always equals the sum of `size - filled` over the queue.

use crate::arena::{Arena, ArenaIndex, OrderNode, NULL_INDEX};
use crate::error::BookError;

/// Resting orders at a single price, oldest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderBucket {
    pub price: u64,
    /// Oldest order (highest priority, first to match)
    pub head: ArenaIndex,
    /// Newest order (last to match)
    pub tail: ArenaIndex,
    /// Remaining (unfilled) volume across all orders
    pub total_volume: u64,
    pub num_orders: u32,
}

impl Default for OrderBucket {
    fn default() -> Self {
        Self::new(0)
    }
}

impl OrderBucket {
    #[inline]
    pub const fn new(price: u64) -> Self {
        Self {
            price,
            head: NULL_INDEX,
            tail: NULL_INDEX,
            total_volume: 0,
            num_orders: 0,
        }
    }

    /// Returns true if there are no orders at this level
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.num_orders == 0
    }

    /// Append an order to the tail of the queue.
    ///
    /// The level total must have room for the order's remaining volume
    /// (see `OrderBook::level_has_room`).
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn add(&mut self, orders: &mut Arena<OrderNode>, index: ArenaIndex) {
        let node = orders.get_mut(index);
        debug_assert_eq!(node.price, self.price, "order added to the wrong bucket");
        let remaining = node.remaining();
        node.prev = self.tail;
        node.next = NULL_INDEX;

        if self.tail == NULL_INDEX {
            debug_assert!(self.head == NULL_INDEX);
            self.head = index;
        } else {
            orders.get_mut(self.tail).next = index;
        }
        self.tail = index;

        self.num_orders += 1;
        self.total_volume += remaining;
    }

    /// Unlink an order owned by `uid`.
    ///
    /// # Returns
    /// The index of the unlinked order, or `None` when the order belongs to
    /// another user. The order is NOT freed from the arena; caller must do that.
    ///
    /// # Complexity
    /// O(1)
    pub fn remove(&mut self, orders: &mut Arena<OrderNode>, index: ArenaIndex, uid: u64) -> Option<ArenaIndex> {
        if orders.get(index).uid != uid {
            return None;
        }
        self.unlink(orders, index);
        Some(index)
    }

    /// Remove an order from anywhere in the queue.
    fn unlink(&mut self, orders: &mut Arena<OrderNode>, index: ArenaIndex) {
        let node = orders.get(index);
        let prev_idx = node.prev;
        let next_idx = node.next;
        let remaining = node.remaining();

        if prev_idx == NULL_INDEX {
            debug_assert!(self.head == index);
            self.head = next_idx;
        } else {
            orders.get_mut(prev_idx).next = next_idx;
        }

        if next_idx == NULL_INDEX {
            debug_assert!(self.tail == index);
            self.tail = prev_idx;
        } else {
            orders.get_mut(next_idx).prev = prev_idx;
        }

        self.num_orders -= 1;
        self.total_volume -= remaining;

        let node = orders.get_mut(index);
        node.prev = NULL_INDEX;
        node.next = NULL_INDEX;
    }

    /// Match up to `volume` against the queue in FIFO order.
    ///
    /// Orders owned by `taker_uid` are skipped (self-trade prevention) and
    /// keep their place. For every fill `on_trade(maker, size, maker_done,
    /// taker_done)` is called with the maker as it looks after the fill;
    /// fully filled makers are then unlinked and returned to `orders`.
    ///
    /// # Returns
    /// The volume matched, at most `volume`.
    pub fn match_orders<F>(
        &mut self,
        orders: &mut Arena<OrderNode>,
        volume: u64,
        taker_uid: u64,
        mut on_trade: F,
    ) -> u64
    where
        F: FnMut(&OrderNode, u64, bool, bool),
    {
        let mut left = volume;
        let mut cursor = self.head;

        while cursor != NULL_INDEX && left > 0 {
            let node = orders.get_mut(cursor);
            let next = node.next;

            if node.uid == taker_uid {
                cursor = next;
                continue;
            }

            let fill = left.min(node.remaining());
            node.filled += fill;
            left -= fill;
            self.total_volume -= fill;

            let maker = *node;
            let maker_done = maker.remaining() == 0;
            on_trade(&maker, fill, maker_done, left == 0);

            if maker_done {
                self.unlink(orders, cursor);
                orders.free(cursor);
            }
            cursor = next;
        }

        volume - left
    }

    /// Shrink the remaining volume of an order owned by `uid` to `new_remaining`.
    ///
    /// Never grows an order and never reduces below what has already
    /// traded. `on_reduce(order, reduced_by)` fires only when volume was
    /// actually taken off.
    ///
    /// # Returns
    /// `false` if the order belongs to another user.
    pub fn try_reduce_size<F>(
        &mut self,
        orders: &mut Arena<OrderNode>,
        index: ArenaIndex,
        uid: u64,
        new_remaining: u64,
        on_reduce: F,
    ) -> bool
    where
        F: FnOnce(&OrderNode, u64),
    {
        let node = orders.get_mut(index);
        if node.uid != uid {
            return false;
        }

        let reduce_by = node.remaining().saturating_sub(new_remaining);
        if reduce_by > 0 {
            node.size -= reduce_by;
            self.total_volume -= reduce_by;
            on_reduce(node, reduce_by);
        }
        true
    }

    /// Iterate the queue from oldest to newest.
    pub fn iter<'a>(&self, orders: &'a Arena<OrderNode>) -> BucketIter<'a> {
        BucketIter {
            orders,
            cursor: self.head,
        }
    }

    /// Walk the queue and check the cached totals and the linkage.
    pub fn validate(&self, orders: &Arena<OrderNode>) -> Result<(), BookError> {
        let mut volume = 0u64;
        let mut linked = 0u32;
        let mut prev = NULL_INDEX;
        let mut cursor = self.head;

        while cursor != NULL_INDEX {
            let node = orders.get(cursor);
            if node.prev != prev || linked > self.num_orders {
                return Err(BookError::BrokenLinkage {
                    price: self.price,
                    slot: cursor,
                });
            }
            if node.price != self.price {
                return Err(BookError::PriceMismatch {
                    order_id: node.order_id,
                    expected: self.price,
                    found: node.price,
                });
            }
            if node.filled >= node.size {
                return Err(BookError::BadFill {
                    order_id: node.order_id,
                    filled: node.filled,
                    size: node.size,
                });
            }
            volume += node.remaining();
            linked += 1;
            prev = cursor;
            cursor = node.next;
        }

        if prev != self.tail {
            return Err(BookError::BrokenLinkage {
                price: self.price,
                slot: self.tail,
            });
        }
        if linked != self.num_orders {
            return Err(BookError::OrderCountMismatch {
                price: self.price,
                recorded: self.num_orders,
                linked,
            });
        }
        if volume != self.total_volume {
            return Err(BookError::VolumeMismatch {
                price: self.price,
                recorded: self.total_volume,
                computed: volume,
            });
        }
        Ok(())
    }
}

/// FIFO iterator over the orders of a bucket.
pub struct BucketIter<'a> {
    orders: &'a Arena<OrderNode>,
    cursor: ArenaIndex,
}

impl<'a> Iterator for BucketIter<'a> {
    type Item = (ArenaIndex, &'a OrderNode);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NULL_INDEX {
            return None;
        }
        let index = self.cursor;
        let node = self.orders.get(index);
        self.cursor = node.next;
        Some((index, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICE: u64 = 100;

    fn order(orders: &mut Arena<OrderNode>, order_id: u64, uid: u64, size: u64) -> ArenaIndex {
        let idx = orders.alloc();
        *orders.get_mut(idx) = OrderNode {
            order_id,
            uid,
            price: PRICE,
            size,
            ..OrderNode::empty()
        };
        idx
    }

    fn setup(sizes: &[(u64, u64)]) -> (Arena<OrderNode>, OrderBucket, Vec<ArenaIndex>) {
        let mut orders = Arena::new(16);
        let mut bucket = OrderBucket::new(PRICE);
        let mut indices = Vec::new();
        for (i, &(uid, size)) in sizes.iter().enumerate() {
            let idx = order(&mut orders, i as u64 + 1, uid, size);
            bucket.add(&mut orders, idx);
            indices.push(idx);
        }
        (orders, bucket, indices)
    }

    fn ids(bucket: &OrderBucket, orders: &Arena<OrderNode>) -> Vec<u64> {
        bucket.iter(orders).map(|(_, n)| n.order_id).collect()
    }

    #[test]
    fn test_empty_bucket() {
        let bucket = OrderBucket::new(PRICE);
        assert!(bucket.is_empty());
        assert_eq!(bucket.head, NULL_INDEX);
        assert_eq!(bucket.tail, NULL_INDEX);
    }

    #[test]
    fn test_add_keeps_fifo() {
        let (orders, bucket, _) = setup(&[(1, 10), (2, 20), (3, 30)]);
        assert_eq!(bucket.num_orders, 3);
        assert_eq!(bucket.total_volume, 60);
        assert_eq!(ids(&bucket, &orders), vec![1, 2, 3]);
        assert_eq!(bucket.validate(&orders), Ok(()));
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let (mut orders, mut bucket, idx) = setup(&[(1, 10), (2, 20), (3, 30), (4, 40)]);

        assert_eq!(bucket.remove(&mut orders, idx[1], 2), Some(idx[1]));
        assert_eq!(ids(&bucket, &orders), vec![1, 3, 4]);

        assert!(bucket.remove(&mut orders, idx[0], 1).is_some());
        assert!(bucket.remove(&mut orders, idx[3], 4).is_some());
        assert_eq!(ids(&bucket, &orders), vec![3]);
        assert_eq!(bucket.head, bucket.tail);
        assert_eq!(bucket.total_volume, 30);
        assert_eq!(bucket.validate(&orders), Ok(()));
    }

    #[test]
    fn test_remove_checks_owner() {
        let (mut orders, mut bucket, idx) = setup(&[(1, 10)]);
        assert_eq!(bucket.remove(&mut orders, idx[0], 99), None);
        assert_eq!(bucket.num_orders, 1);
    }

    #[test]
    fn test_match_partial_then_full() {
        let (mut orders, mut bucket, _) = setup(&[(1, 10), (2, 20)]);
        let mut fills = Vec::new();

        let matched = bucket.match_orders(&mut orders, 15, 9, |maker, size, maker_done, taker_done| {
            fills.push((maker.order_id, size, maker_done, taker_done));
        });

        assert_eq!(matched, 15);
        assert_eq!(fills, vec![(1, 10, true, false), (2, 5, false, true)]);
        assert_eq!(bucket.num_orders, 1);
        assert_eq!(bucket.total_volume, 15);
        // Fully filled maker went back to the pool
        assert_eq!(orders.allocated(), 1);
        assert_eq!(bucket.validate(&orders), Ok(()));
    }

    #[test]
    fn test_match_skips_own_orders() {
        let (mut orders, mut bucket, _) = setup(&[(7, 10), (2, 20), (7, 5)]);
        let mut makers = Vec::new();

        let matched = bucket.match_orders(&mut orders, 100, 7, |maker, _, _, _| makers.push(maker.order_id));

        assert_eq!(matched, 20);
        assert_eq!(makers, vec![2]);
        assert_eq!(ids(&bucket, &orders), vec![1, 3]);
        assert_eq!(bucket.total_volume, 15);
    }

    #[test]
    fn test_try_reduce_size() {
        let (mut orders, mut bucket, idx) = setup(&[(1, 50)]);
        orders.get_mut(idx[0]).filled = 10;
        bucket.total_volume = 40;

        let mut reduced = None;
        assert!(bucket.try_reduce_size(&mut orders, idx[0], 1, 5, |o, by| reduced = Some((o.order_id, by))));
        assert_eq!(reduced, Some((1, 35)));
        assert_eq!(orders.get(idx[0]).size, 15);
        assert_eq!(bucket.total_volume, 5);

        // Growing is a no-op, wrong owner is refused
        let mut fired = false;
        assert!(bucket.try_reduce_size(&mut orders, idx[0], 1, 100, |_, _| fired = true));
        assert!(!fired);
        assert!(!bucket.try_reduce_size(&mut orders, idx[0], 2, 1, |_, _| ()));
        assert_eq!(bucket.validate(&orders), Ok(()));
    }

    #[test]
    fn test_validate_detects_volume_drift() {
        let (orders, mut bucket, _) = setup(&[(1, 10)]);
        bucket.total_volume = 11;
        assert!(matches!(
            bucket.validate(&orders),
            Err(BookError::VolumeMismatch { recorded: 11, computed: 10, .. })
        ));
    }
}
