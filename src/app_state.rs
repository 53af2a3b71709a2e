// =============================================================================
// Central Application State — signal desk
// =============================================================================
//
// Ties the collaborators (market data source, signal generator) to the
// configuration and the in-memory audit trail of recent signals.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the recent-signal ring.
//   - Collaborators are `Arc<dyn Trait>` and manage their own state.
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::market_data::MarketDataSource;
use crate::runtime_config::RuntimeConfig;
use crate::signal::{SignalGenerator, SignalRecord};
use crate::snapshot::SnapshotAssembler;

/// Central application state shared across request handlers via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, bumped whenever a new
    /// signal is recorded.
    pub state_version: AtomicU64,

    pub config: RuntimeConfig,

    pub assembler: SnapshotAssembler,

    pub market_data: Arc<dyn MarketDataSource>,

    pub signal_generator: Arc<dyn SignalGenerator>,

    /// Most recent signals, oldest first.
    pub recent_signals: RwLock<VecDeque<SignalRecord>>,

    /// Instant when the service was started. Used for uptime reporting.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        market_data: Arc<dyn MarketDataSource>,
        signal_generator: Arc<dyn SignalGenerator>,
    ) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            assembler: SnapshotAssembler::new(config.indicators.clone()),
            config,
            market_data,
            signal_generator,
            recent_signals: RwLock::new(VecDeque::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Signal Audit ────────────────────────────────────────────────────

    /// Record a signal. The ring is capped at `config.max_recent_signals`;
    /// oldest entries are evicted when the limit is reached.
    pub fn push_signal(&self, record: SignalRecord) {
        let cap = self.config.max_recent_signals;
        {
            let mut signals = self.recent_signals.write();
            signals.push_back(record);
            while signals.len() > cap {
                signals.pop_front();
            }
        }
        self.increment_version();
    }

    pub fn recent_signals(&self) -> Vec<SignalRecord> {
        self.recent_signals.read().iter().cloned().collect()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
