use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use probe::{ExecutionMode, Executor, Monitor, MonitorStore, ResultSink};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Periodic trigger - runs every active monitor at its own frequency
pub struct MonitoringScheduler {
    executor: Executor,
    sink: ResultSink,
    monitors: Arc<dyn MonitorStore>,
    refresh: Duration,
}

impl MonitoringScheduler {
    pub fn new(
        executor: Executor,
        sink: ResultSink,
        monitors: Arc<dyn MonitorStore>,
        refresh: Duration,
    ) -> Self {
        Self { executor, sink, monitors, refresh }
    }

    /// Keep one task per active monitor until `cancel` fires.
    ///
    /// The active set is reloaded every refresh period; tasks for monitors
    /// that were paused or deleted stop on their own.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut tasks: HashMap<String, JoinHandle<()>> = HashMap::new();
        let mut refresh = interval(self.refresh);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = refresh.tick() => {}
            }

            tasks.retain(|_, task| !task.is_finished());

            let active = match self.monitors.active_monitors().await {
                Ok(active) => active,
                Err(e) => {
                    error!("Failed to load active monitors: {e}");
                    continue;
                }
            };

            for monitor in active {
                if tasks.contains_key(&monitor.id) {
                    continue;
                }
                let id = monitor.id.clone();
                tasks.insert(id, self.schedule_monitor(monitor, cancel.child_token()));
            }
            debug!(scheduled = tasks.len(), "Scheduler refreshed");
        }

        info!(tasks = tasks.len(), "Scheduler stopping");
        for (_, task) in tasks {
            if let Err(e) = task.await {
                warn!("Monitor task ended abnormally: {e}");
            }
        }
    }

    /// Schedule a single monitor for periodic execution
    pub fn schedule_monitor(&self, monitor: Monitor, cancel: CancellationToken) -> JoinHandle<()> {
        let executor = self.executor.clone();
        let sink = self.sink.clone();
        let monitors = self.monitors.clone();

        tokio::spawn(async move {
            let mut frequency = monitor.frequency;
            let mut timer = interval(period(frequency));
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(monitor_id = %monitor.id, frequency, "Monitor scheduled");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = timer.tick() => {}
                }

                // Pick up edits, pauses and deletions since the last tick
                let current = match monitors.find_monitor(&monitor.account_id, &monitor.id).await {
                    Ok(Some(current)) if current.is_active() => current,
                    Ok(_) => {
                        info!(monitor_id = %monitor.id, "Monitor no longer active, unscheduling");
                        break;
                    }
                    Err(e) => {
                        warn!(monitor_id = %monitor.id, "Failed to reload monitor: {e}");
                        continue;
                    }
                };

                if current.frequency != frequency {
                    info!(
                        monitor_id = %monitor.id,
                        from = frequency,
                        to = current.frequency,
                        "Monitor frequency changed, rescheduling"
                    );
                    frequency = current.frequency;
                    timer = interval_at(Instant::now() + period(frequency), period(frequency));
                    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                }

                run_once(&executor, &sink, &current, &cancel).await;
            }
        })
    }
}

fn period(frequency: u64) -> Duration {
    Duration::from_secs(frequency.max(1))
}

async fn run_once(executor: &Executor, sink: &ResultSink, monitor: &Monitor, cancel: &CancellationToken) {
    let mode = ExecutionMode::Scheduled;
    let result = match executor
        .execute_cancellable(monitor, mode, mode.generate_result_id(), cancel)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            error!(monitor_id = %monitor.id, "Monitor cannot be executed: {e}");
            return;
        }
    };

    match sink.store(&monitor.account_id, result).await {
        Ok(stored) => {
            if let Some(blob_error) = stored.blob_error {
                warn!(result_id = %stored.result_id, "Result stored without payload: {blob_error}");
            }
        }
        Err(e) => error!(monitor_id = %monitor.id, tier = ?e.tier(), "Failed to store result: {e}"),
    }
}
