//! Engine - Main event loop with CPU pinning and warm-up.
//!
//! Wraps the matching engine with logging, optional per-command
//! validation and, behind the `runtime` feature, I/O via rtrb ring buffers.

use tracing::{debug, error, trace};

use crate::command::{OrderCommand, ResultCode};
use crate::config::BookConfig;
use crate::error::{BookError, ConfigError};
use crate::hybrid_index::HybridIndex;
use crate::market_data::L2MarketData;
use crate::matching::{CommandResult, MatchingEngine};
use crate::price_index::PriceIndex;

/// Single-symbol engine owning one book.
///
/// `I` picks the price index used by both book sides.
pub struct Engine<I: PriceIndex = HybridIndex> {
    /// The underlying matching engine
    pub matcher: MatchingEngine<I>,
    validate_each: bool,
    last_violation: Option<BookError>,
}

impl<I: PriceIndex> Engine<I> {
    /// Create an engine from a checked configuration.
    pub fn new(config: &BookConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            matcher: MatchingEngine::new(config)?,
            validate_each: config.validate_each,
            last_violation: None,
        })
    }

    /// Run the engine event loop.
    ///
    /// # Arguments
    /// * `input` - Consumer end of the command ring buffer
    /// * `output` - Producer end of the result ring buffer
    /// * `pin_to_core` - Whether to pin to the last available CPU core
    ///
    /// # Note
    /// This function runs forever (until the program terminates).
    #[cfg(feature = "runtime")]
    pub fn run(
        &mut self,
        input: &mut rtrb::Consumer<OrderCommand>,
        output: &mut rtrb::Producer<CommandResult>,
        pin_to_core: bool,
    ) {
        if pin_to_core {
            self.pin_to_core();
        }
        self.warm_up();
        tracing::info!(symbol = self.matcher.symbol(), "engine loop started");

        // Busy-wait
        loop {
            while let Ok(cmd) = input.pop() {
                let result = self.process_command(&cmd);
                if output.push(result).is_err() {
                    debug!(order_id = cmd.order_id, "output ring full, result dropped");
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Process a single command.
    ///
    /// This is the main entry point for synchronous usage (testing, benchmarks).
    #[inline]
    pub fn process_command(&mut self, cmd: &OrderCommand) -> CommandResult {
        trace!(
            command = ?cmd.command,
            order_id = cmd.order_id,
            uid = cmd.uid,
            price = cmd.price,
            size = cmd.size,
            "processing"
        );
        let result = self.matcher.process(cmd);
        if result.code != ResultCode::Success {
            debug!(code = ?result.code, command = ?cmd.command, order_id = cmd.order_id, "command rejected");
        }

        if self.validate_each {
            if let Err(err) = self.matcher.validate() {
                error!(%err, command = ?cmd.command, order_id = cmd.order_id, "book invariant broken");
                self.last_violation = Some(err);
            }
        }
        result
    }

    /// Most recent invariant failure seen with `validate_each` on.
    pub fn last_violation(&self) -> Option<&BookError> {
        self.last_violation.as_ref()
    }

    /// Pin the current thread to the last available CPU core.
    ///
    /// The last core is typically isolated from OS interrupts.
    pub fn pin_to_core(&self) {
        let Some(core_ids) = core_affinity::get_core_ids() else {
            debug!("core ids unavailable, running unpinned");
            return;
        };
        if let Some(last_core) = core_ids.last() {
            if !core_affinity::set_for_current(*last_core) {
                debug!(core = last_core.id, "pinning failed");
            }
        }
    }

    /// Warm up the engine by pre-faulting memory pages.
    pub fn warm_up(&mut self) {
        self.matcher.warm_up();
    }

    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.matcher.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.matcher.best_ask()
    }

    #[inline]
    pub fn spread(&self) -> Option<u64> {
        self.matcher.spread()
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.matcher.order_count()
    }

    pub fn l2_snapshot(&self, max_levels: usize) -> L2MarketData {
        self.matcher.l2_snapshot(max_levels)
    }

    pub fn reset(&mut self) {
        self.matcher.reset();
    }

    /// Compute state hash for determinism testing.
    #[inline]
    pub fn state_hash(&self) -> u64 {
        self.matcher.state_hash()
    }

    pub fn validate(&self) -> Result<(), BookError> {
        self.matcher.validate()
    }
}

impl Default for Engine<HybridIndex> {
    fn default() -> Self {
        Self {
            matcher: MatchingEngine::with_valid_config(&BookConfig::default()),
            validate_each: false,
            last_violation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Side;
    use crate::radix_trie::RadixIndex;

    fn config() -> BookConfig {
        BookConfig::default().with_capacity(1000, 64).with_validation(true)
    }

    #[test]
    fn test_engine_creation() {
        let engine: Engine = Engine::new(&config()).unwrap();
        assert_eq!(engine.order_count(), 0);
        assert_eq!(engine.best_bid(), None);
        assert_eq!(engine.best_ask(), None);
    }

    #[test]
    fn test_engine_rejects_bad_config() {
        let result = Engine::<HybridIndex>::new(&config().with_hot_window(100));
        assert!(matches!(result, Err(ConfigError::HotWindow(100))));
    }

    #[test]
    fn test_engine_place_and_cancel() {
        let mut engine: Engine<RadixIndex> = Engine::new(&config()).unwrap();

        let result = engine.process_command(&OrderCommand::limit(1, 100, Side::Bid, 10_000, 100));
        assert_eq!(result.code, ResultCode::Success);
        assert_eq!(engine.order_count(), 1);
        assert_eq!(engine.best_bid(), Some(10_000));

        let result = engine.process_command(&OrderCommand::cancel(1, 100));
        assert_eq!(result.events.len(), 1);
        assert_eq!(engine.order_count(), 0);
        assert!(engine.last_violation().is_none());
    }

    #[test]
    fn test_engine_state_hash_determinism() {
        let mut engine1: Engine = Engine::new(&config()).unwrap();
        let mut engine2: Engine = Engine::new(&config()).unwrap();

        for i in 0..100 {
            let side = if i % 2 == 0 { Side::Bid } else { Side::Ask };
            let cmd = OrderCommand::limit(i, i % 7, side, 10_000 + (i % 10) * 10, 100);
            engine1.process_command(&cmd);
            engine2.process_command(&cmd);
        }

        assert_eq!(engine1.state_hash(), engine2.state_hash());
        assert!(engine1.last_violation().is_none());
        engine1.validate().unwrap();
    }

    #[test]
    fn test_engine_warm_up_and_reset() {
        let mut engine = Engine::default();
        engine.warm_up();
        engine.process_command(&OrderCommand::limit(1, 1, Side::Ask, 10, 1));
        engine.reset();
        assert_eq!(engine.order_count(), 0);
        assert_eq!(engine.l2_snapshot(5), L2MarketData::default());
    }
}
