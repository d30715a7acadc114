//! Level 2 market data snapshot.

use std::fmt;

/// Aggregated depth per price, best price first on both sides.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct L2MarketData {
    pub ask_prices: Vec<u64>,
    pub ask_volumes: Vec<u64>,
    pub ask_orders: Vec<u32>,
    pub bid_prices: Vec<u64>,
    pub bid_volumes: Vec<u64>,
    pub bid_orders: Vec<u32>,
}

impl L2MarketData {
    pub fn with_capacity(levels: usize) -> Self {
        Self {
            ask_prices: Vec::with_capacity(levels),
            ask_volumes: Vec::with_capacity(levels),
            ask_orders: Vec::with_capacity(levels),
            bid_prices: Vec::with_capacity(levels),
            bid_volumes: Vec::with_capacity(levels),
            bid_orders: Vec::with_capacity(levels),
        }
    }

    #[inline]
    pub fn ask_size(&self) -> usize {
        self.ask_prices.len()
    }

    #[inline]
    pub fn bid_size(&self) -> usize {
        self.bid_prices.len()
    }

    pub fn push_ask(&mut self, price: u64, volume: u64, orders: u32) {
        self.ask_prices.push(price);
        self.ask_volumes.push(volume);
        self.ask_orders.push(orders);
    }

    pub fn push_bid(&mut self, price: u64, volume: u64, orders: u32) {
        self.bid_prices.push(price);
        self.bid_volumes.push(volume);
        self.bid_orders.push(orders);
    }

    /// Saturates at `u64::MAX`.
    pub fn total_ask_volume(&self) -> u64 {
        self.ask_volumes.iter().fold(0, |total, v| total.saturating_add(*v))
    }

    pub fn total_bid_volume(&self) -> u64 {
        self.bid_volumes.iter().fold(0, |total, v| total.saturating_add(*v))
    }

    /// `(price, volume)` pairs of the ask side, best first.
    pub fn asks(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.ask_prices.iter().copied().zip(self.ask_volumes.iter().copied())
    }

    /// `(price, volume)` pairs of the bid side, best first.
    pub fn bids(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.bid_prices.iter().copied().zip(self.bid_volumes.iter().copied())
    }
}

impl fmt::Display for L2MarketData {
    /// One line: `asks [p:v, ...] bids [p:v, ...]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |f: &mut fmt::Formatter<'_>, levels: &mut dyn Iterator<Item = (u64, u64)>| -> fmt::Result {
            f.write_str("[")?;
            for (i, (price, volume)) in levels.enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{price}:{volume}")?;
            }
            f.write_str("]")
        };
        f.write_str("asks ")?;
        side(f, &mut self.asks())?;
        f.write_str(" bids ")?;
        side(f, &mut self.bids())
    }
}
