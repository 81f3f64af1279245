//! Injectable effect adapters: clock and ID generation.
//!
//! Production wiring uses the system clock and UUIDv7; tests inject fixed
//! or sequential implementations so every run is reproducible.

use crate::Timestamp;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Clock abstraction for entity timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Fixed clock for deterministic tests. Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Clock that advances by one second on every read, so that events
/// committed in sequence carry strictly increasing timestamps.
#[derive(Debug)]
pub struct SteppingClock {
    epoch: Timestamp,
    ticks: AtomicI64,
}

impl SteppingClock {
    pub fn new(epoch: Timestamp) -> Self {
        Self {
            epoch,
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.epoch + Duration::seconds(tick)
    }
}

/// ID generation abstraction.
pub trait IdGen: Send + Sync {
    fn new_id(&self) -> Uuid;
}

/// Production generator: timestamp-sortable UUIDv7.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Gen;

impl IdGen for UuidV7Gen {
    fn new_id(&self) -> Uuid {
        Uuid::now_v7()
    }
}

/// Deterministic generator for tests: counts up from 1, embedding the
/// counter in the low bytes of the UUID.
#[derive(Debug, Default)]
pub struct SequentialIdGen {
    counter: AtomicU64,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGen for SequentialIdGen {
    fn new_id(&self) -> Uuid {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Uuid::from_u128(n as u128)
    }
}

/// Shared handles, cheap to clone into services and handlers.
pub type SharedClock = Arc<dyn Clock>;
pub type SharedIdGen = Arc<dyn IdGen>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_is_constant() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock(instant);
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), instant);
    }

    #[test]
    fn test_stepping_clock_is_strictly_increasing() {
        let epoch = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = SteppingClock::new(epoch);
        let a = clock.now();
        let b = clock.now();
        let c = clock.now();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_sequential_ids_are_unique_and_ordered() {
        let ids = SequentialIdGen::new();
        let a = ids.new_id();
        let b = ids.new_id();
        assert_ne!(a, b);
        assert!(a < b);
    }
}
