use crate::session::PlaybackController;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Background task feeding wall time into [`PlaybackController::tick`].
/// The task is aborted when the handle is dropped.
pub struct ClockHandle {
    task: JoinHandle<()>,
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn spawn_clock(controller: Arc<PlaybackController>, period: Duration) -> ClockHandle {
    let period = if period.is_zero() {
        DEFAULT_TICK_INTERVAL
    } else {
        period
    };

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();
        loop {
            interval.tick().await;
            let now = Instant::now();
            controller.tick(now.duration_since(last).as_secs_f64());
            last = now;
        }
    });
    tracing::debug!(period_ms = period.as_millis() as u64, "playback clock started");

    ClockHandle { task }
}
