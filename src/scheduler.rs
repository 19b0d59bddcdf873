use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::controller::{RefreshController, ScanOutcome, Trigger};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub scans: usize,
    pub skipped: usize,
    pub watchdog_attempts: u32,
}

/// Retries scanning while the page shows no badges, up to a fixed cap.
struct Watchdog {
    attempts: u32,
    max_attempts: u32,
    armed: bool,
}

impl Watchdog {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            armed: false,
        }
    }

    fn arm(&mut self) {
        self.attempts = 0;
        self.armed = self.max_attempts > 0;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

/// Decides when the controller scans.
///
/// Triggers arrive over a channel from the host (plus an internal post-load
/// timer, a change poller and the watchdog). Bursts are coalesced: after the
/// first trigger, further ones keep extending a short quiet window, and the
/// whole batch results in one scan. Runs until the trigger channel closes.
pub struct Scheduler<'c> {
    controller: &'c RefreshController,
}

impl<'c> Scheduler<'c> {
    pub fn new(controller: &'c RefreshController) -> Self {
        Self { controller }
    }

    pub async fn run(&self, mut triggers: mpsc::UnboundedReceiver<Trigger>) -> SchedulerReport {
        let mut report = SchedulerReport::default();
        if !self.controller.initialize() {
            return report;
        }

        let settings = self.controller.settings().clone();
        let post_load = time::sleep(settings.post_load_delay);
        tokio::pin!(post_load);
        let mut post_load_done = false;

        let mut poll = time::interval_at(Instant::now() + settings.poll_interval, settings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watchdog_tick = time::interval(settings.watchdog_interval);
        watchdog_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watchdog = Watchdog::new(settings.watchdog_max_attempts);

        let mut next = Some(vec![Trigger::DocumentReady]);
        loop {
            let batch = match next.take() {
                Some(batch) => batch,
                None => tokio::select! {
                    received = triggers.recv() => match received {
                        Some(trigger) => vec![trigger],
                        None => break,
                    },
                    _ = &mut post_load, if !post_load_done => {
                        post_load_done = true;
                        vec![Trigger::PostLoad]
                    }
                    _ = poll.tick() => {
                        let changes = self.controller.detect_changes();
                        if changes.is_empty() {
                            continue;
                        }
                        changes
                    }
                    _ = watchdog_tick.tick(), if watchdog.armed => {
                        if self.controller.badge_count() > 0 {
                            watchdog.disarm();
                            continue;
                        }
                        watchdog.attempts += 1;
                        report.watchdog_attempts += 1;
                        log::info!("watchdog retry #{}", watchdog.attempts);
                        if watchdog.attempts >= watchdog.max_attempts {
                            watchdog.disarm();
                        }
                        vec![Trigger::Watchdog]
                    }
                },
            };

            let (batch, closed) = self.debounce(batch, &mut triggers).await;
            let watchdog_only = batch.iter().all(|t| *t == Trigger::Watchdog);

            match self.controller.handle(&batch) {
                ScanOutcome::Completed(_) => report.scans += 1,
                ScanOutcome::Skipped(reason) => {
                    log::debug!("scan skipped: {reason:?}");
                    report.skipped += 1;
                }
            }

            // Rendering can lag behind the markup; keep retrying for a while.
            if !watchdog_only {
                watchdog.arm();
                watchdog_tick.reset();
            }

            if closed {
                break;
            }
        }

        log::debug!("scheduler stopped: {report:?}");
        report
    }

    /// Collects triggers until the channel has been quiet for the debounce
    /// delay. The flag is true when the channel closed meanwhile.
    async fn debounce(
        &self,
        mut batch: Vec<Trigger>,
        triggers: &mut mpsc::UnboundedReceiver<Trigger>,
    ) -> (Vec<Trigger>, bool) {
        let delay = self.controller.settings().debounce;
        loop {
            match time::timeout(delay, triggers.recv()).await {
                Ok(Some(trigger)) => batch.push(trigger),
                Ok(None) => return (batch, true),
                Err(_) => return (batch, false),
            }
        }
    }
}
