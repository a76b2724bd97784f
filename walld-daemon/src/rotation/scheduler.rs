use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use walld_core::ipc::Phase;

/// Timer half of the rotation engine.
///
/// `Idle` until started, then `Waiting` on a repeating timer. `Rotating`
/// brackets one rotation; an interval change that arrives meanwhile is
/// held back and applied once the rotation is finished. The engine runs a
/// rotation to completion before it reads the next request, so `Rotating`
/// is only seen from inside the engine and `status` reports `waiting`.
pub struct Scheduler {
    phase: Phase,
    interval: Duration,
    pending_interval: Option<Duration>,
    timer: Option<Interval>,
    next_fire: Option<Instant>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            interval,
            pending_interval: None,
            timer: None,
            next_fire: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn start(&mut self) {
        if self.phase == Phase::Idle {
            self.arm();
            self.phase = Phase::Waiting;
            info!(interval_secs = self.interval.as_secs(), "scheduler started");
        }
    }

    /// Resolves when the timer fires. Never resolves while idle.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
                self.next_fire = Instant::now().checked_add(self.interval);
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn begin_rotation(&mut self) {
        self.phase = Phase::Rotating;
    }

    pub fn finish_rotation(&mut self) {
        if self.phase != Phase::Rotating {
            return;
        }
        self.phase = Phase::Waiting;
        if let Some(interval) = self.pending_interval.take() {
            self.interval = interval;
            self.arm();
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        match self.phase {
            Phase::Rotating => {
                debug!("rotation in progress, deferring interval change");
                self.pending_interval = Some(interval);
            }
            Phase::Idle => self.interval = interval,
            Phase::Waiting => {
                self.interval = interval;
                self.arm();
            }
        }
    }

    /// Restart the countdown, e.g. after a manual rotation.
    pub fn rearm(&mut self) {
        if self.phase != Phase::Idle {
            self.arm();
        }
    }

    pub fn next_change(&self) -> Option<Duration> {
        self.next_fire
            .map(|t| t.saturating_duration_since(Instant::now()))
    }

    fn arm(&mut self) {
        let Some(first) = Instant::now().checked_add(self.interval) else {
            warn!(
                interval_secs = self.interval.as_secs(),
                "interval out of range, timer disarmed"
            );
            self.timer = None;
            self.next_fire = None;
            return;
        };
        let mut timer = interval_at(first, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.timer = Some(timer);
        self.next_fire = Some(first);
    }
}
