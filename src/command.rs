//! Command types for the order book.
//!
//! Commands arrive from the sequencing stage already validated for
//! user balances and risk. The book only answers for its own matching
//! state and reports the outcome as a [`ResultCode`].

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    #[default]
    Bid = 0,
    /// Sell side (asks)
    Ask = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// How a placed order treats volume it cannot match immediately.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OrderType {
    /// Good-till-cancel: the unmatched remainder rests in the book.
    #[default]
    Limit = 0,
    /// Immediate-or-cancel: matches up to its price, remainder is rejected.
    Ioc = 1,
    /// Matches at any price, remainder is rejected.
    Market = 2,
}

/// Kind of inbound command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CommandType {
    PlaceOrder,
    CancelOrder,
    /// Change price and/or shrink remaining volume of a resting order.
    MoveOrder,
    /// Reduce remaining volume by `size`.
    ReduceOrder,
    OrderBookRequest,
    ResetBook,
    // Handled by other pipeline stages, never by the book.
    AddUser,
    BalanceAdjustment,
    #[default]
    Nop,
}

/// Outcome of a command, written back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    /// A resting order already uses this id
    DuplicateOrderId,
    /// Unknown order id, or the order belongs to another user
    InvalidOrderId,
    /// Zero size where a positive volume is required
    InvalidOrderSize,
    /// Command addressed to a book of another symbol
    InvalidOrderBookId,
    UnsupportedCommand,
}

impl ResultCode {
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, ResultCode::Success)
    }
}

// ============================================================================
// Inbound Command
// ============================================================================

/// A single inbound command.
///
/// The record is flat and `Copy` so it can travel through a ring buffer
/// without allocation. Field meaning depends on [`CommandType`]:
///
/// | Command            | `price`                      | `size`                          |
/// |--------------------|------------------------------|---------------------------------|
/// | `PlaceOrder`       | limit price (ignored for market) | order volume                |
/// | `MoveOrder`        | new price, `0` = keep        | new remaining volume, `0` = keep |
/// | `ReduceOrder`      | unused                       | volume to take off              |
/// | `OrderBookRequest` | unused                       | levels per side, `u64::MAX` = all |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OrderCommand {
    pub command: CommandType,
    pub order_id: u64,
    pub uid: u64,
    pub symbol: u32,
    pub price: u64,
    pub size: u64,
    pub action: Side,
    pub order_type: OrderType,
    /// Nanoseconds, assigned by the sequencer
    pub timestamp: i64,
}

impl OrderCommand {
    /// Place a good-till-cancel limit order.
    pub fn limit(order_id: u64, uid: u64, action: Side, price: u64, size: u64) -> Self {
        Self {
            command: CommandType::PlaceOrder,
            order_id,
            uid,
            price,
            size,
            action,
            order_type: OrderType::Limit,
            ..Self::default()
        }
    }

    /// Place an immediate-or-cancel order bounded by `price`.
    pub fn ioc(order_id: u64, uid: u64, action: Side, price: u64, size: u64) -> Self {
        Self {
            order_type: OrderType::Ioc,
            ..Self::limit(order_id, uid, action, price, size)
        }
    }

    /// Place a market order (no price bound).
    pub fn market(order_id: u64, uid: u64, action: Side, size: u64) -> Self {
        Self {
            order_type: OrderType::Market,
            ..Self::limit(order_id, uid, action, 0, size)
        }
    }

    pub fn cancel(order_id: u64, uid: u64) -> Self {
        Self {
            command: CommandType::CancelOrder,
            order_id,
            uid,
            ..Self::default()
        }
    }

    /// Amend a resting order. `None` leaves the respective attribute as is.
    pub fn amend(order_id: u64, uid: u64, new_price: Option<u64>, new_size: Option<u64>) -> Self {
        Self {
            command: CommandType::MoveOrder,
            order_id,
            uid,
            price: new_price.unwrap_or(0),
            size: new_size.unwrap_or(0),
            ..Self::default()
        }
    }

    pub fn reduce(order_id: u64, uid: u64, reduce_by: u64) -> Self {
        Self {
            command: CommandType::ReduceOrder,
            order_id,
            uid,
            size: reduce_by,
            ..Self::default()
        }
    }

    /// Request an L2 snapshot with at most `max_levels` per side.
    pub fn book_request(max_levels: u64) -> Self {
        Self {
            command: CommandType::OrderBookRequest,
            size: max_levels,
            ..Self::default()
        }
    }

    pub fn reset() -> Self {
        Self {
            command: CommandType::ResetBook,
            ..Self::default()
        }
    }

    /// Route to another symbol's book.
    #[inline]
    pub fn with_symbol(mut self, symbol: u32) -> Self {
        self.symbol = symbol;
        self
    }

    #[inline]
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.opposite(), Side::Bid);
    }

    #[test]
    fn test_limit_command() {
        let cmd = OrderCommand::limit(1, 100, Side::Bid, 10_050, 100).at(42);
        assert_eq!(cmd.command, CommandType::PlaceOrder);
        assert_eq!(cmd.order_type, OrderType::Limit);
        assert_eq!(cmd.order_id, 1);
        assert_eq!(cmd.uid, 100);
        assert_eq!(cmd.timestamp, 42);
    }

    #[test]
    fn test_market_ignores_price() {
        let cmd = OrderCommand::market(7, 1, Side::Ask, 30);
        assert_eq!(cmd.order_type, OrderType::Market);
        assert_eq!(cmd.price, 0);
        assert_eq!(cmd.size, 30);
    }

    #[test]
    fn test_amend_encodes_unchanged_as_zero() {
        let cmd = OrderCommand::amend(3, 9, None, Some(5));
        assert_eq!(cmd.command, CommandType::MoveOrder);
        assert_eq!(cmd.price, 0);
        assert_eq!(cmd.size, 5);

        let cmd = OrderCommand::amend(3, 9, Some(81_590), None);
        assert_eq!(cmd.price, 81_590);
        assert_eq!(cmd.size, 0);
    }

    #[test]
    fn test_result_code_success() {
        assert!(ResultCode::Success.is_success());
        assert!(!ResultCode::InvalidOrderId.is_success());
    }
}
