//! Idle-stream keep-alive timer.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Fires once per `period` of stream inactivity.
///
/// The first tick is one full period after creation, and [`Heartbeat::reset`]
/// pushes the next tick a full period out again. Owned by its session, so it
/// stops when the session is dropped.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Interval,
    period: Duration,
}

impl Heartbeat {
    /// Start a heartbeat with the given idle period.
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    /// Wait for the next tick. Cancel-safe.
    pub async fn tick(&mut self) {
        let _ = self.interval.tick().await;
    }

    /// Restart the idle period from now.
    pub fn reset(&mut self) {
        self.interval.reset();
    }

    /// Idle period.
    pub fn period(&self) -> Duration {
        self.period
    }
}
