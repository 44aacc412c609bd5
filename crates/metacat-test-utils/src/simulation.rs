//! Controllable time for deterministic tests.
//!
//! [`SimulatedClock`] implements [`Clock`] so a [`CatalogService`] under test
//! stamps audit records with instants the test chooses.
//!
//! [`CatalogService`]: metacat_catalog::CatalogService
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use metacat_core::Clock;
//! use metacat_test_utils::simulation::SimulatedClock;
//!
//! let clock = SimulatedClock::deterministic();
//! let before = clock.now();
//! clock.advance(Duration::from_secs(90));
//! assert_eq!((clock.now() - before).num_seconds(), 90);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use metacat_core::Clock;

/// Simulated clock that only moves when told to.
#[derive(Debug)]
pub struct SimulatedClock {
    /// Base time (start of simulation).
    base: DateTime<Utc>,
    /// Elapsed milliseconds since base.
    elapsed_ms: AtomicU64,
}

impl SimulatedClock {
    /// Creates a new simulated clock starting at the given time.
    #[must_use]
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            elapsed_ms: AtomicU64::new(0),
        }
    }

    /// Creates a clock anchored at a deterministic instant
    /// (2024-01-01T00:00:00Z).
    #[must_use]
    pub fn deterministic() -> Self {
        let base = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid base timestamp");
        Self::new(base)
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).expect("duration fits in u64 millis");
        self.elapsed_ms.fetch_add(millis, Ordering::Relaxed);
    }

    /// Returns the time elapsed since the base instant.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::Relaxed))
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = i64::try_from(self.elapsed_ms.load(Ordering::Relaxed))
            .expect("elapsed millis fit in i64");
        self.base + chrono::Duration::milliseconds(elapsed)
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::deterministic()
    }
}
