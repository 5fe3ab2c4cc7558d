use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::resource::TimeStamp;

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> TimeStamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> TimeStamp {
        // Pre-epoch wall clocks are clamped to zero.
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
    }
}

/// Clock driven by hand, for tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start: TimeStamp) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    pub fn set(&self, at: TimeStamp) {
        self.0.store(at, Ordering::SeqCst);
    }

    pub fn advance(&self, by: TimeStamp) {
        self.0.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> TimeStamp {
        self.0.load(Ordering::SeqCst)
    }
}

/// Issues change stamps for one resource timeline.
///
/// Stamps are strictly increasing even when the wall clock stalls or steps back, so two
/// writes to the same index never share a stamp and a strictly-greater polling bound
/// cannot skip a change.
pub struct ChangeClock {
    source: Arc<dyn Clock>,
    last: TimeStamp,
}

impl ChangeClock {
    pub fn new(source: Arc<dyn Clock>) -> Self {
        Self { source, last: 0 }
    }

    pub fn next_stamp(&mut self) -> TimeStamp {
        let stamp = self.source.now_millis().max(self.last + 1);
        self.last = stamp;
        stamp
    }

    pub fn last_stamp(&self) -> TimeStamp {
        self.last
    }
}

impl Default for ChangeClock {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
