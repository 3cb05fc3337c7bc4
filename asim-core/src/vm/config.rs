//! Environment configuration loading from .env files
//!
//! Loads engine defaults from `.env` or environment variables. CLI flags and
//! the `with_*` builders on [`EngineConfig`] take precedence.

use std::env;
use std::time::Duration;

use once_cell::sync::Lazy;

use super::state::BitWidth;

// Automatically load .env when config module is accessed
static DOTENV_INIT: Lazy<()> = Lazy::new(|| {
    let _ = dotenv::dotenv();
});

/// Ensure environment is loaded
#[inline]
fn ensure_loaded() {
    let _ = &*DOTENV_INIT;
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    ensure_loaded();
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Load memory capacity (cells) from environment
/// Default: 1000
pub fn memory_size() -> usize {
    env_or("ASIM_MEMORY_SIZE", 1000usize).max(1)
}

/// Load register bit width from environment
/// Default: 32 (falls back to 32 on unsupported values)
pub fn bit_width() -> BitWidth {
    BitWidth::from_bits(env_or("ASIM_BIT_WIDTH", 32u32)).unwrap_or(BitWidth::W32)
}

/// Load delay between run ticks from environment
/// Default: 0 ms (back-to-back)
pub fn run_interval_ms() -> u64 {
    env_or("ASIM_RUN_INTERVAL_MS", 0u64)
}

/// Load step limit of a single `run()` from environment
/// Default: 1_000_000
pub fn max_steps() -> u64 {
    env_or("ASIM_MAX_STEPS", 1_000_000u64)
}

/// Load event history length from environment
/// Default: 256
pub fn event_history() -> usize {
    env_or("ASIM_EVENT_HISTORY", 256usize)
}

/// Cached values
pub static MEMORY_SIZE: Lazy<usize> = Lazy::new(memory_size);
pub static BIT_WIDTH: Lazy<BitWidth> = Lazy::new(bit_width);
pub static RUN_INTERVAL_MS: Lazy<u64> = Lazy::new(run_interval_ms);
pub static MAX_STEPS: Lazy<u64> = Lazy::new(max_steps);
pub static EVENT_HISTORY: Lazy<usize> = Lazy::new(event_history);

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Memory capacity in cells
    pub memory_size: usize,
    /// Register bit width on load/reset
    pub bit_width: BitWidth,
    /// Delay between ticks of `run()`
    pub run_interval: Duration,
    /// Step limit of a single `run()` (0 = unlimited)
    pub max_steps: u64,
    /// Events kept in the bus history
    pub event_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_size: *MEMORY_SIZE,
            bit_width: *BIT_WIDTH,
            run_interval: Duration::from_millis(*RUN_INTERVAL_MS),
            max_steps: *MAX_STEPS,
            event_history: *EVENT_HISTORY,
        }
    }
}

impl EngineConfig {
    pub fn with_memory_size(mut self, cells: usize) -> Self {
        self.memory_size = cells.max(1);
        self
    }

    pub fn with_bit_width(mut self, width: BitWidth) -> Self {
        self.bit_width = width;
        self
    }

    pub fn with_run_interval(mut self, interval: Duration) -> Self {
        self.run_interval = interval;
        self
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_event_history(mut self, events: usize) -> Self {
        self.event_history = events;
        self
    }
}
