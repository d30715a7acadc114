//! Matching Engine - price-time priority matching for one symbol.
//!
//! Every command runs to completion against the book before the next one:
//! 1. CROSSING: walk the opposite side from its best price while the
//!    aggressor's limit allows, filling makers in FIFO order
//! 2. RESTING: a limit order's remainder joins the tail of its level;
//!    IOC and market remainders are rejected
//!
//! Resting orders of the aggressor's own user are skipped, never traded.

use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;

use rustc_hash::FxHasher;
use tracing::debug;

use crate::arena::{Arena, ArenaIndex, OrderNode};
use crate::command::{CommandType, OrderCommand, OrderType, ResultCode, Side};
use crate::config::BookConfig;
use crate::error::{BookError, ConfigError};
use crate::events::{ActiveOrder, EventChain, MatcherTradeEvent};
use crate::market_data::L2MarketData;
use crate::order_book::{OrderBook, OrderLocation};
use crate::price_index::{Direction, PriceIndex};

/// Outcome of one command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandResult {
    pub code: ResultCode,
    /// Events in the order they happened
    pub events: Vec<MatcherTradeEvent>,
    /// Present for successful book requests
    pub market_data: Option<L2MarketData>,
}

impl CommandResult {
    fn code(code: ResultCode) -> Self {
        Self {
            code,
            events: Vec::new(),
            market_data: None,
        }
    }
}

/// The order driving a crossing pass.
#[derive(Clone, Copy, Debug)]
struct Aggressor {
    active: ActiveOrder,
    order_type: OrderType,
    price: u64,
    size: u64,
}

impl Aggressor {
    fn from_command(cmd: &OrderCommand) -> Self {
        Self {
            active: ActiveOrder {
                order_id: cmd.order_id,
                uid: cmd.uid,
                action: cmd.action,
                timestamp: cmd.timestamp,
            },
            order_type: cmd.order_type,
            price: cmd.price,
            size: cmd.size,
        }
    }

    fn from_order(order: &OrderNode) -> Self {
        Self {
            active: ActiveOrder::of(order),
            order_type: order.order_type,
            price: order.price,
            size: order.size,
        }
    }

    /// Worst maker price this order accepts.
    #[inline]
    fn limit(&self) -> u64 {
        match (self.order_type, self.active.action) {
            (OrderType::Market, Side::Bid) => u64::MAX,
            (OrderType::Market, Side::Ask) => 0,
            _ => self.price,
        }
    }
}

/// Order book for one symbol plus the pool its orders live in.
pub struct MatchingEngine<I: PriceIndex> {
    symbol: u32,
    /// Memory arena for order nodes
    orders: Arena<OrderNode>,
    book: OrderBook<I>,
}

impl<I: PriceIndex> MatchingEngine<I> {
    /// Build an empty book after checking `config`.
    pub fn new(config: &BookConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    /// `config` must already have passed [`BookConfig::validate`].
    pub(crate) fn with_valid_config(config: &BookConfig) -> Self {
        Self {
            symbol: config.symbol,
            orders: Arena::new(config.order_capacity),
            book: OrderBook::new(config),
        }
    }

    #[inline]
    pub fn symbol(&self) -> u32 {
        self.symbol
    }

    pub fn book(&self) -> &OrderBook<I> {
        &self.book
    }

    /// Apply one command.
    pub fn process(&mut self, cmd: &OrderCommand) -> CommandResult {
        if cmd.symbol != self.symbol {
            return CommandResult::code(ResultCode::InvalidOrderBookId);
        }

        let mut events = EventChain::new();
        let mut market_data = None;
        let code = match cmd.command {
            CommandType::PlaceOrder => match cmd.order_type {
                OrderType::Limit => self.place_limit(cmd, &mut events),
                OrderType::Ioc | OrderType::Market => self.match_market(cmd, &mut events),
            },
            CommandType::CancelOrder => self.cancel(cmd, &mut events),
            CommandType::MoveOrder => self.move_order(cmd, &mut events),
            CommandType::ReduceOrder => self.reduce(cmd, &mut events),
            CommandType::OrderBookRequest => {
                let depth = usize::try_from(cmd.size).unwrap_or(usize::MAX);
                market_data = Some(self.l2_snapshot(depth));
                ResultCode::Success
            }
            CommandType::ResetBook => {
                self.reset();
                ResultCode::Success
            }
            CommandType::AddUser | CommandType::BalanceAdjustment | CommandType::Nop => {
                ResultCode::UnsupportedCommand
            }
        };

        CommandResult {
            code,
            events: events.into_vec(),
            market_data,
        }
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Place a good-till-cancel order: cross, then rest the remainder.
    pub fn place_limit(&mut self, cmd: &OrderCommand, events: &mut EventChain) -> ResultCode {
        if cmd.size == 0 {
            return ResultCode::InvalidOrderSize;
        }
        if self.book.contains_order(cmd.order_id) {
            debug!(order_id = cmd.order_id, uid = cmd.uid, "duplicate order id");
            return ResultCode::DuplicateOrderId;
        }
        // Matching never touches the own side, so the level is checked up front
        if !self.book.level_has_room(cmd.action, cmd.price, cmd.size) {
            debug!(order_id = cmd.order_id, price = cmd.price, "price level volume would overflow");
            return ResultCode::InvalidOrderSize;
        }

        let filled = self.try_match_instantly(&Aggressor::from_command(cmd), 0, events);
        if filled == cmd.size {
            return ResultCode::Success;
        }

        let slot = self.orders.alloc();
        *self.orders.get_mut(slot) = OrderNode {
            price: cmd.price,
            size: cmd.size,
            filled,
            order_id: cmd.order_id,
            uid: cmd.uid,
            timestamp: cmd.timestamp,
            symbol: self.symbol,
            action: cmd.action,
            order_type: OrderType::Limit,
            ..OrderNode::empty()
        };
        let added = self.book.add_order(&mut self.orders, slot);
        debug_assert!(added, "order id became resting while matching");
        ResultCode::Success
    }

    /// Place an IOC or market order; unfilled volume is rejected.
    pub fn match_market(&mut self, cmd: &OrderCommand, events: &mut EventChain) -> ResultCode {
        if cmd.size == 0 {
            return ResultCode::InvalidOrderSize;
        }

        let aggressor = Aggressor::from_command(cmd);
        let filled = self.try_match_instantly(&aggressor, 0, events);
        if filled < cmd.size {
            events.push(MatcherTradeEvent::rejection(
                self.symbol,
                &aggressor.active,
                cmd.price,
                cmd.size - filled,
            ));
        }
        ResultCode::Success
    }

    /// Cross `taker` against the opposite side, starting from `filled`.
    ///
    /// # Returns
    /// The taker's filled volume afterwards
    fn try_match_instantly(&mut self, taker: &Aggressor, mut filled: u64, events: &mut EventChain) -> u64 {
        let maker_side = taker.active.action.opposite();
        let limit = taker.limit();
        let symbol = self.symbol;
        let mut cursor = self.book.best_price(maker_side);

        while filled < taker.size {
            let Some(from) = cursor else { break };
            let found = match maker_side {
                Side::Ask => self.book.asks.ceiling(from),
                Side::Bid => self.book.bids.floor(from),
            };
            let Some((price, bucket)) = found else { break };
            let marketable = match maker_side {
                Side::Ask => price <= limit,
                Side::Bid => price >= limit,
            };
            if !marketable {
                break;
            }

            let order_index = &mut self.book.order_index;
            let matched = self.book.buckets.get_mut(bucket).match_orders(
                &mut self.orders,
                taker.size - filled,
                taker.active.uid,
                |maker, size, maker_done, taker_done| {
                    if maker_done {
                        order_index.remove(&maker.order_id);
                    }
                    events.push(MatcherTradeEvent::trade(
                        symbol,
                        &taker.active,
                        maker,
                        price,
                        size,
                        maker_done,
                        taker_done,
                    ));
                },
            );
            filled += matched;

            if self.book.bucket(bucket).is_empty() {
                self.book.release_bucket(maker_side, price);
            }
            cursor = match maker_side {
                Side::Ask => price.checked_add(1),
                Side::Bid => price.checked_sub(1),
            };
        }

        filled
    }

    // ========================================================================
    // Cancel and Amend
    // ========================================================================

    /// Remove a resting order, reporting its remaining volume.
    pub fn cancel(&mut self, cmd: &OrderCommand, events: &mut EventChain) -> ResultCode {
        let Some(slot) = self.book.unlink_order(&mut self.orders, cmd.order_id, cmd.uid) else {
            debug!(order_id = cmd.order_id, uid = cmd.uid, "cancel of unknown order");
            return ResultCode::InvalidOrderId;
        };

        let order = *self.orders.get(slot);
        events.push(MatcherTradeEvent::reduce(
            self.symbol,
            &order,
            order.remaining(),
            true,
            cmd.timestamp,
        ));
        self.orders.free(slot);
        ResultCode::Success
    }

    /// Shrink and/or reprice a resting order.
    ///
    /// A non-zero `size` is the new remaining volume (it never grows the
    /// order). A non-zero `price` different from the current one moves the
    /// order: it may trade at the new price and otherwise rests at the tail
    /// of the new level.
    pub fn move_order(&mut self, cmd: &OrderCommand, events: &mut EventChain) -> ResultCode {
        let Some(location) = self.owned_location(cmd) else {
            return ResultCode::InvalidOrderId;
        };

        let order = self.orders.get(location.slot);
        let moving = cmd.price != 0 && cmd.price != order.price;
        let remaining = match cmd.size {
            0 => order.remaining(),
            size => size.min(order.remaining()),
        };
        if moving && !self.book.level_has_room(order.action, cmd.price, remaining) {
            debug!(order_id = cmd.order_id, price = cmd.price, "price level volume would overflow");
            return ResultCode::InvalidOrderSize;
        }

        if cmd.size > 0 {
            let symbol = self.symbol;
            self.book.buckets.get_mut(location.bucket).try_reduce_size(
                &mut self.orders,
                location.slot,
                cmd.uid,
                cmd.size,
                |order, reduced_by| {
                    events.push(MatcherTradeEvent::reduce(symbol, order, reduced_by, false, cmd.timestamp));
                },
            );
        }

        if !moving {
            return ResultCode::Success;
        }

        let Some(slot) = self.book.unlink_order(&mut self.orders, cmd.order_id, cmd.uid) else {
            return ResultCode::InvalidOrderId;
        };
        let order = self.orders.get_mut(slot);
        order.price = cmd.price;
        order.timestamp = cmd.timestamp;
        let aggressor = Aggressor::from_order(order);
        let already_filled = order.filled;

        let filled = self.try_match_instantly(&aggressor, already_filled, events);
        if filled == aggressor.size {
            self.orders.free(slot);
            return ResultCode::Success;
        }
        self.orders.get_mut(slot).filled = filled;
        self.book.add_order(&mut self.orders, slot);
        ResultCode::Success
    }

    /// Take `size` off the remaining volume; removes the order when nothing would remain.
    pub fn reduce(&mut self, cmd: &OrderCommand, events: &mut EventChain) -> ResultCode {
        if cmd.size == 0 {
            return ResultCode::InvalidOrderSize;
        }
        let Some(location) = self.owned_location(cmd) else {
            return ResultCode::InvalidOrderId;
        };

        let remaining = self.orders.get(location.slot).remaining();
        if cmd.size >= remaining {
            return self.cancel(cmd, events);
        }

        let symbol = self.symbol;
        self.book.buckets.get_mut(location.bucket).try_reduce_size(
            &mut self.orders,
            location.slot,
            cmd.uid,
            remaining - cmd.size,
            |order, reduced_by| {
                events.push(MatcherTradeEvent::reduce(symbol, order, reduced_by, false, cmd.timestamp));
            },
        );
        ResultCode::Success
    }

    /// Location of the command's order, if it rests and belongs to the command's user.
    fn owned_location(&self, cmd: &OrderCommand) -> Option<OrderLocation> {
        let location = self.book.locate(cmd.order_id)?;
        if self.orders.get(location.slot).uid != cmd.uid {
            debug!(order_id = cmd.order_id, uid = cmd.uid, "order owned by another user");
            return None;
        }
        Some(location)
    }

    // ========================================================================
    // Queries and Maintenance
    // ========================================================================

    pub fn l2_snapshot(&self, max_levels: usize) -> L2MarketData {
        self.book.l2_snapshot(max_levels)
    }

    /// A resting order by id.
    pub fn order(&self, order_id: u64) -> Option<&OrderNode> {
        self.book.locate(order_id).map(|location| self.orders.get(location.slot))
    }

    /// Resting orders at `price` on `side`, oldest first.
    pub fn orders_at(&self, side: Side, price: u64) -> Vec<&OrderNode> {
        self.book
            .bucket_at(side, price)
            .map(|bucket| bucket.iter(&self.orders).map(|(_, order)| order).collect())
            .unwrap_or_default()
    }

    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.book.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.book.best_ask()
    }

    #[inline]
    pub fn spread(&self) -> Option<u64> {
        self.book.spread()
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.book.order_count()
    }

    /// Drop every resting order and level.
    pub fn reset(&mut self) {
        self.book.clear();
        self.orders.clear();
    }

    /// Warm up the engine (pre-fault memory pages)
    pub fn warm_up(&mut self) {
        self.orders.warm_up();
        self.book.buckets.warm_up();
    }

    /// Hash of every resting order in price then queue order.
    ///
    /// Two books that went through the same commands hash equally,
    /// whatever their index implementation. Timestamps are left out.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        for side in [Side::Ask, Side::Bid] {
            side.hash(&mut hasher);
            self.book.visit_buckets(side, &mut |bucket| {
                bucket.price.hash(&mut hasher);
                bucket.num_orders.hash(&mut hasher);
                bucket.total_volume.hash(&mut hasher);
                for (_, order) in bucket.iter(&self.orders) {
                    order.order_id.hash(&mut hasher);
                    order.uid.hash(&mut hasher);
                    order.size.hash(&mut hasher);
                    order.filled.hash(&mut hasher);
                    order.action.hash(&mut hasher);
                    order.order_type.hash(&mut hasher);
                }
                ControlFlow::Continue(())
            });
        }
        hasher.finish()
    }

    /// Full consistency check of the book, its indexes and both pools.
    pub fn validate(&self) -> Result<(), BookError> {
        let mut resting = 0usize;

        for side in [Side::Ask, Side::Bid] {
            let index = self.book.side(side);
            index.validate()?;

            let mut outcome = Ok(());
            index.visit(Direction::Ascending, &mut |price, bucket| {
                match self.validate_bucket(side, price, bucket) {
                    Ok(count) => {
                        resting += count;
                        ControlFlow::Continue(())
                    }
                    Err(err) => {
                        outcome = Err(err);
                        ControlFlow::Break(())
                    }
                }
            });
            outcome?;

            let cached = self.book.best_price(side);
            let actual = match side {
                Side::Ask => index.first(),
                Side::Bid => index.last(),
            }
            .map(|(price, _)| price);
            if cached != actual {
                return Err(BookError::StaleBestPrice { side, cached, actual });
            }
        }

        let indexed = self.book.order_count();
        if resting != indexed || indexed != self.orders.allocated() as usize {
            return Err(BookError::OrderCountDivergence {
                indexed,
                resting,
                allocated: self.orders.allocated(),
            });
        }

        let levels = self.book.ask_levels() + self.book.bid_levels();
        if levels != self.book.buckets.allocated() as usize {
            return Err(BookError::BucketCountDivergence {
                allocated: self.book.buckets.allocated(),
                indexed: levels,
            });
        }
        Ok(())
    }

    fn validate_bucket(&self, side: Side, price: u64, index: ArenaIndex) -> Result<usize, BookError> {
        let bucket = self.book.bucket(index);
        if bucket.price != price {
            return Err(BookError::BucketPriceMismatch {
                side,
                price,
                bucket_price: bucket.price,
            });
        }
        if bucket.is_empty() {
            return Err(BookError::EmptyBucket { side, price });
        }
        bucket.validate(&self.orders)?;

        for (slot, order) in bucket.iter(&self.orders) {
            if order.action != side {
                return Err(BookError::SideMismatch {
                    order_id: order.order_id,
                    side: order.action,
                });
            }
            if self.book.locate(order.order_id) != Some(OrderLocation { bucket: index, slot }) {
                return Err(BookError::IndexDivergence {
                    order_id: order.order_id,
                });
            }
        }
        Ok(bucket.num_orders as usize)
    }
}

impl<I: PriceIndex> std::fmt::Debug for MatchingEngine<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingEngine")
            .field("symbol", &self.symbol)
            .field("orders", &self.orders)
            .field("book", &self.book)
            .finish()
    }
}
