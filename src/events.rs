//! Matcher events.
//!
//! Every command produces an ordered list of events describing its effect:
//! one `Trade` per maker touched, `Reduce` when volume leaves the book
//! without trading, and a final `Rejection` for unfilled IOC/market volume.
//! Events are kept in the order they happened.

use crate::arena::OrderNode;
use crate::command::Side;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatcherEventType {
    Trade,
    /// Cancel or size reduction of a resting order
    Reduce,
    /// Unfilled volume of an order that may not rest
    Rejection,
    /// Opaque payload carried through the pipeline
    Binary,
}

/// One matcher event.
///
/// The "active" order is the one that caused the event: the aggressor of a
/// trade, the reduced order, or the rejected order. The "matched" order is
/// the resting maker (trades and binary payloads only).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatcherTradeEvent {
    pub event_type: MatcherEventType,
    pub symbol: u32,

    pub active_order_id: u64,
    pub active_order_uid: u64,
    pub active_order_action: Side,
    /// The active order is done: fully matched, or gone from the book
    pub active_order_completed: bool,

    pub matched_order_id: u64,
    pub matched_order_uid: u64,
    pub matched_order_completed: bool,

    pub price: u64,
    pub size: u64,
    /// Hold price reserved by the bidder; carried by binary payloads only
    pub bidder_hold_price: u64,
    pub timestamp: i64,
}

/// Identity of the order driving a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveOrder {
    pub order_id: u64,
    pub uid: u64,
    pub action: Side,
    pub timestamp: i64,
}

impl ActiveOrder {
    pub fn of(order: &OrderNode) -> Self {
        Self {
            order_id: order.order_id,
            uid: order.uid,
            action: order.action,
            timestamp: order.timestamp,
        }
    }
}

impl MatcherTradeEvent {
    /// A fill of `size` at the maker's `price`.
    pub fn trade(
        symbol: u32,
        active: &ActiveOrder,
        maker: &OrderNode,
        price: u64,
        size: u64,
        maker_completed: bool,
        active_completed: bool,
    ) -> Self {
        Self {
            event_type: MatcherEventType::Trade,
            symbol,
            active_order_id: active.order_id,
            active_order_uid: active.uid,
            active_order_action: active.action,
            active_order_completed: active_completed,
            matched_order_id: maker.order_id,
            matched_order_uid: maker.uid,
            matched_order_completed: maker_completed,
            price,
            size,
            bidder_hold_price: 0,
            timestamp: active.timestamp,
        }
    }

    /// `order` lost `size` of its remaining volume; `removed` when it left the book.
    pub fn reduce(symbol: u32, order: &OrderNode, size: u64, removed: bool, timestamp: i64) -> Self {
        Self {
            event_type: MatcherEventType::Reduce,
            symbol,
            active_order_id: order.order_id,
            active_order_uid: order.uid,
            active_order_action: order.action,
            active_order_completed: removed,
            matched_order_id: 0,
            matched_order_uid: 0,
            matched_order_completed: false,
            price: order.price,
            size,
            bidder_hold_price: 0,
            timestamp,
        }
    }

    /// `size` unfilled units of an order that may not rest.
    pub fn rejection(symbol: u32, active: &ActiveOrder, price: u64, size: u64) -> Self {
        Self {
            event_type: MatcherEventType::Rejection,
            symbol,
            active_order_id: active.order_id,
            active_order_uid: active.uid,
            active_order_action: active.action,
            active_order_completed: true,
            matched_order_id: 0,
            matched_order_uid: 0,
            matched_order_completed: false,
            price,
            size,
            bidder_hold_price: 0,
            timestamp: active.timestamp,
        }
    }

    #[inline]
    pub fn is_trade(&self) -> bool {
        self.event_type == MatcherEventType::Trade
    }
}

/// Accumulates the events of one command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventChain {
    events: Vec<MatcherTradeEvent>,
}

impl EventChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, event: MatcherTradeEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatcherTradeEvent> {
        self.events.iter()
    }

    /// Total traded volume in the chain.
    pub fn traded_volume(&self) -> u64 {
        self.events.iter().filter(|e| e.is_trade()).map(|e| e.size).sum()
    }

    pub fn into_vec(self) -> Vec<MatcherTradeEvent> {
        self.events
    }
}

// ============================================================================
// Binary payloads
// ============================================================================

/// Words per packed binary event: order id, uid, price, size, bidder hold price.
pub const BINARY_EVENT_WORDS: usize = 5;

/// Unpack `words` into a chain of binary events, in order.
///
/// The book itself never emits binary events. These helpers belong to the
/// pipeline stages around it, which forward packed payloads (for example
/// journal sections) to consumers in the same event shape as book output.
/// Trailing words that do not fill a whole group are ignored.
pub fn binary_events(symbol: u32, timestamp: i64, words: &[u64]) -> Vec<MatcherTradeEvent> {
    words
        .chunks_exact(BINARY_EVENT_WORDS)
        .map(|group| MatcherTradeEvent {
            event_type: MatcherEventType::Binary,
            symbol,
            active_order_id: 0,
            active_order_uid: 0,
            active_order_action: Side::Bid,
            active_order_completed: false,
            matched_order_id: group[0],
            matched_order_uid: group[1],
            matched_order_completed: false,
            price: group[2],
            size: group[3],
            bidder_hold_price: group[4],
            timestamp,
        })
        .collect()
}

/// Pack the binary events of `events` back into words.
pub fn binary_words(events: &[MatcherTradeEvent]) -> Vec<u64> {
    events
        .iter()
        .filter(|e| e.event_type == MatcherEventType::Binary)
        .flat_map(|e| [e.matched_order_id, e.matched_order_uid, e.price, e.size, e.bidder_hold_price])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maker() -> OrderNode {
        OrderNode {
            order_id: 2,
            uid: 413,
            price: 81_599,
            size: 50,
            action: Side::Ask,
            ..OrderNode::empty()
        }
    }

    #[test]
    fn test_trade_event_fields() {
        let taker = ActiveOrder {
            order_id: 9,
            uid: 412,
            action: Side::Bid,
            timestamp: 77,
        };
        let event = MatcherTradeEvent::trade(3, &taker, &maker(), 81_599, 50, true, false);

        assert_eq!(event.event_type, MatcherEventType::Trade);
        assert_eq!(event.symbol, 3);
        assert_eq!(event.active_order_id, 9);
        assert_eq!(event.active_order_action, Side::Bid);
        assert_eq!(event.matched_order_id, 2);
        assert_eq!(event.matched_order_uid, 413);
        assert!(event.matched_order_completed);
        assert!(!event.active_order_completed);
        assert_eq!(event.timestamp, 77);
    }

    #[test]
    fn test_reduce_event_uses_order_as_active() {
        let event = MatcherTradeEvent::reduce(0, &maker(), 20, true, 5);
        assert_eq!(event.event_type, MatcherEventType::Reduce);
        assert_eq!(event.active_order_id, 2);
        assert_eq!(event.active_order_action, Side::Ask);
        assert_eq!(event.price, 81_599);
        assert_eq!(event.size, 20);
        assert!(event.active_order_completed);
    }

    #[test]
    fn test_chain_keeps_emission_order() {
        let taker = ActiveOrder::of(&maker());
        let mut chain = EventChain::new();
        chain.push(MatcherTradeEvent::reduce(0, &maker(), 1, false, 0));
        chain.push(MatcherTradeEvent::trade(0, &taker, &maker(), 10, 4, false, false));
        chain.push(MatcherTradeEvent::trade(0, &taker, &maker(), 11, 6, true, false));
        chain.push(MatcherTradeEvent::rejection(0, &taker, 11, 3));

        assert_eq!(chain.len(), 4);
        assert_eq!(chain.traded_volume(), 10);
        let kinds: Vec<_> = chain.into_vec().into_iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                MatcherEventType::Reduce,
                MatcherEventType::Trade,
                MatcherEventType::Trade,
                MatcherEventType::Rejection
            ]
        );
    }

    #[test]
    fn test_binary_events_drop_partial_group() {
        let words = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let events = binary_events(1, 100, &words);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].matched_order_id, 6);
        assert_eq!(events[1].size, 9);
        assert_eq!(events[1].bidder_hold_price, 10);
        assert!(events.iter().all(|e| e.timestamp == 100 && e.symbol == 1));
        assert_eq!(binary_words(&events), words[..10].to_vec());
    }

    #[test]
    fn test_binary_words_skip_book_events() {
        let mut events = binary_events(0, 0, &[7, 8, 9, 10, 11]);
        events.insert(0, MatcherTradeEvent::reduce(0, &maker(), 1, false, 0));
        assert_eq!(binary_words(&events), vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_book_events_carry_no_hold_price() {
        let taker = ActiveOrder::of(&maker());
        assert_eq!(MatcherTradeEvent::trade(0, &taker, &maker(), 1, 1, true, true).bidder_hold_price, 0);
        assert_eq!(MatcherTradeEvent::rejection(0, &taker, 1, 1).bidder_hold_price, 0);
    }
}
