//! Adaptive batch sizing against replica lag.
//!
//! A self-stabilising feedback loop: healthy replicas let the batch size
//! creep up, a lagging replica shrinks it, and a badly lagging replica stops
//! the importer for as long as the replica is behind before shrinking hard.

use std::time::Duration;

pub const MIN_BATCH_SIZE: usize = 1_000;
pub const MAX_BATCH_SIZE: usize = 10_000;
pub const INITIAL_BATCH_SIZE: usize = 5_000;

pub const WARN_LAG: Duration = Duration::from_secs(2);
pub const PANIC_LAG: Duration = Duration::from_secs(60);

const STEP_UP: usize = 100;
const STEP_DOWN_WARN: usize = 200;
const STEP_DOWN_PANIC: usize = 1_000;

/// How often the importer samples the lag watermark.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAdjustment {
    /// Replica healthy; batch size grew (or stayed at the cap).
    Increased { batch_size: usize },
    /// Replica behind; batch size shrank moderately.
    Reduced { batch_size: usize },
    /// Replica badly behind; caller must sleep for `pause` before the next
    /// batch, and the batch size shrank hard.
    Panicked { batch_size: usize, pause: Duration },
}

impl RateAdjustment {
    pub fn batch_size(self) -> usize {
        match self {
            RateAdjustment::Increased { batch_size }
            | RateAdjustment::Reduced { batch_size }
            | RateAdjustment::Panicked { batch_size, .. } => batch_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchSizeController {
    size: usize,
}

impl BatchSizeController {
    pub fn new() -> Self {
        Self {
            size: INITIAL_BATCH_SIZE,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn observe(&mut self, lag: Duration) -> RateAdjustment {
        if lag > PANIC_LAG {
            self.size = self.size.saturating_sub(STEP_DOWN_PANIC).max(MIN_BATCH_SIZE);
            RateAdjustment::Panicked {
                batch_size: self.size,
                pause: lag,
            }
        } else if lag > WARN_LAG {
            self.size = self.size.saturating_sub(STEP_DOWN_WARN).max(MIN_BATCH_SIZE);
            RateAdjustment::Reduced {
                batch_size: self.size,
            }
        } else {
            self.size = (self.size + STEP_UP).min(MAX_BATCH_SIZE);
            RateAdjustment::Increased {
                batch_size: self.size,
            }
        }
    }
}

impl Default for BatchSizeController {
    fn default() -> Self {
        Self::new()
    }
}
