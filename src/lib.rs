//! # Exchange Book
//!
//! A deterministic single-symbol order book with price-time priority matching.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: One thread owns the order book exclusively (no locks)
//! - **Pluggable Price Index**: hybrid hot window + `BTreeMap`, or an adaptive radix trie
//! - **Cache-Optimized**: 64-byte aligned nodes, 32-bit indices
//! - **Arena Allocation**: orders and price buckets come from growable pools
//!
//! ## Architecture
//!
//! ```text
//! [Sequencer] --> [SPSC Ring Buffer] --> [Engine Thread (Pinned)]
//!                                               |
//!                                  [CommandResult: code + events]
//! ```
//!
//! ## Example
//!
//! ```
//! use exchange_book::{BookConfig, Engine, OrderCommand, ResultCode, Side};
//!
//! let mut engine: Engine = Engine::new(&BookConfig::default()).unwrap();
//! engine.process_command(&OrderCommand::limit(1, 7, Side::Ask, 10_050, 10));
//! let result = engine.process_command(&OrderCommand::limit(2, 8, Side::Bid, 10_100, 4));
//!
//! assert_eq!(result.code, ResultCode::Success);
//! assert_eq!(result.events[0].price, 10_050);
//! assert_eq!(engine.best_ask(), Some(10_050));
//! ```

pub mod arena;
pub mod bucket;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod hybrid_index;
pub mod logging;
pub mod market_data;
pub mod matching;
pub mod order_book;
pub mod price_index;
pub mod radix_trie;
pub mod replay;

// Re-exports for convenience
pub use arena::{Arena, ArenaIndex, OrderNode, NULL_INDEX};
pub use bucket::OrderBucket;
pub use command::{CommandType, OrderCommand, OrderType, ResultCode, Side};
pub use config::{BookConfig, IndexKind};
pub use engine::Engine;
pub use error::{BookError, ConfigError, ReplayError};
pub use events::{EventChain, MatcherEventType, MatcherTradeEvent};
pub use hybrid_index::HybridIndex;
pub use market_data::L2MarketData;
pub use matching::{CommandResult, MatchingEngine};
pub use order_book::OrderBook;
pub use price_index::{Direction, PriceIndex};
pub use radix_trie::{RadixIndex, RadixTrie};
