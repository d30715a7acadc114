//! Error types.
//!
//! Rejected commands are not errors: they are reported through
//! [`ResultCode`](crate::command::ResultCode). The types here cover broken
//! internal invariants found by `validate`, bad configuration and
//! malformed replay input.

use thiserror::Error;

use crate::command::Side;

/// Broken structural invariant inside the book or one of its indexes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    #[error("bucket at {price}: recorded volume {recorded}, orders sum to {computed}")]
    VolumeMismatch {
        price: u64,
        recorded: u64,
        computed: u64,
    },

    #[error("bucket at {price}: recorded {recorded} orders, {linked} linked")]
    OrderCountMismatch { price: u64, recorded: u32, linked: u32 },

    #[error("bucket at {price}: broken FIFO linkage at slot {slot}")]
    BrokenLinkage { price: u64, slot: u32 },

    #[error("order {order_id} holds price {found} inside the bucket for {expected}")]
    PriceMismatch {
        order_id: u64,
        expected: u64,
        found: u64,
    },

    #[error("order {order_id} is overfilled or empty ({filled}/{size})")]
    BadFill { order_id: u64, filled: u64, size: u64 },

    #[error("empty bucket indexed on {side:?} side at {price}")]
    EmptyBucket { side: Side, price: u64 },

    #[error("{side:?} index maps {price} to a bucket priced {bucket_price}")]
    BucketPriceMismatch {
        side: Side,
        price: u64,
        bucket_price: u64,
    },

    #[error("order {order_id} is not reachable through the order index")]
    IndexDivergence { order_id: u64 },

    #[error("order index holds {indexed} orders, buckets hold {resting}, pool holds {allocated}")]
    OrderCountDivergence {
        indexed: usize,
        resting: usize,
        allocated: u32,
    },

    #[error("bucket pool holds {allocated} buckets, indexes hold {indexed}")]
    BucketCountDivergence { allocated: u32, indexed: usize },

    #[error("{side:?} best price cached as {cached:?}, index reports {actual:?}")]
    StaleBestPrice {
        side: Side,
        cached: Option<u64>,
        actual: Option<u64>,
    },

    #[error("{side:?} order {order_id} rests in the opposite book side")]
    SideMismatch { order_id: u64, side: Side },

    #[error("hot window entry {price}: {reason}")]
    HotWindow { price: u64, reason: &'static str },

    #[error("radix node at shift {shift}: {reason}")]
    RadixNode { shift: u32, reason: &'static str },

    #[error("radix trie counts {counted} leaves, expected {expected}")]
    RadixLength { counted: usize, expected: usize },
}

/// Rejected [`BookConfig`](crate::config::BookConfig) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("hot window width {0} must be a non-zero multiple of 64")]
    HotWindow(u64),

    #[error("{pool} pool capacity {capacity} collides with the null index")]
    Capacity { pool: &'static str, capacity: u32 },
}

/// Failure while reading a command file.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: missing field `{field}`")]
    MissingField { line: u64, field: &'static str },

    #[error("line {line}: invalid {field} `{value}`")]
    InvalidValue {
        line: u64,
        field: &'static str,
        value: String,
    },
}
