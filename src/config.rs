//! Book configuration.
//!
//! `BookConfig` derives [`clap::Args`] so every tool can `#[command(flatten)]`
//! it into its own argument parser; library users build it with
//! `Default` and the `with_*` setters.

use clap::{Args, ValueEnum};

use crate::arena::NULL_INDEX;
use crate::error::ConfigError;

/// Orders pre-allocated in the order pool
pub const DEFAULT_ORDER_CAPACITY: u32 = 1 << 16;

/// Price buckets pre-allocated in the bucket pool
pub const DEFAULT_BUCKET_CAPACITY: u32 = 1 << 12;

/// Width of the hybrid index's hot window, in ticks
pub const DEFAULT_HOT_WINDOW: u64 = 1 << 16;

/// Price index backing both sides of the book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum IndexKind {
    /// Hot bitset window plus ordered overflow tree
    #[default]
    Hybrid,
    /// Adaptive radix trie
    Radix,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct BookConfig {
    /// Symbol this book serves; commands for other symbols are refused
    #[arg(long, default_value_t = 0)]
    pub symbol: u32,

    /// Price index implementation
    #[arg(long, value_enum, default_value_t = IndexKind::Hybrid)]
    pub index: IndexKind,

    /// Orders pre-allocated at start-up
    #[arg(long, default_value_t = DEFAULT_ORDER_CAPACITY)]
    pub order_capacity: u32,

    /// Price buckets pre-allocated at start-up
    #[arg(long, default_value_t = DEFAULT_BUCKET_CAPACITY)]
    pub bucket_capacity: u32,

    /// Hot window width of the hybrid index (multiple of 64)
    #[arg(long, default_value_t = DEFAULT_HOT_WINDOW)]
    pub hot_window: u64,

    /// Run a full consistency check after every command
    #[arg(long)]
    pub validate_each: bool,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            symbol: 0,
            index: IndexKind::Hybrid,
            order_capacity: DEFAULT_ORDER_CAPACITY,
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            hot_window: DEFAULT_HOT_WINDOW,
            validate_each: false,
        }
    }
}

impl BookConfig {
    pub fn with_symbol(mut self, symbol: u32) -> Self {
        self.symbol = symbol;
        self
    }

    pub fn with_index(mut self, index: IndexKind) -> Self {
        self.index = index;
        self
    }

    pub fn with_capacity(mut self, orders: u32, buckets: u32) -> Self {
        self.order_capacity = orders;
        self.bucket_capacity = buckets;
        self
    }

    pub fn with_hot_window(mut self, width: u64) -> Self {
        self.hot_window = width;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_each = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hot_window == 0 || self.hot_window % 64 != 0 {
            return Err(ConfigError::HotWindow(self.hot_window));
        }
        if self.order_capacity >= NULL_INDEX {
            return Err(ConfigError::Capacity {
                pool: "order",
                capacity: self.order_capacity,
            });
        }
        if self.bucket_capacity >= NULL_INDEX {
            return Err(ConfigError::Capacity {
                pool: "bucket",
                capacity: self.bucket_capacity,
            });
        }
        Ok(())
    }
}
