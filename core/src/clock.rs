//! Wall-clock abstraction.
//!
//! RULE: Nothing in the core reads the system time directly.
//! Services take a `Clock` so that payout dates, cache expiry and
//! period boundaries are reproducible in tests.

use crate::types::Timestamp;
use chrono::{Duration, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<Timestamp>,
}

impl FixedClock {
    pub fn new(at: Timestamp) -> Self {
        Self { current: Mutex::new(at) }
    }

    pub fn set(&self, at: Timestamp) {
        if let Ok(mut current) = self.current.lock() {
            *current = at;
        }
    }

    /// Advance by `delta`. Returns the new time.
    pub fn advance(&self, delta: Duration) -> Timestamp {
        match self.current.lock() {
            Ok(mut current) => {
                *current += delta;
                *current
            }
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
