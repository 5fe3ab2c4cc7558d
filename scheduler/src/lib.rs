//! Repeating execution of one asynchronous task without overlap.
//!
//! The scheduler waits for each execution to complete before computing the delay until
//! the next one. A tick that overran the interval is followed immediately by the next tick,
//! missed ticks are never queued up.

use std::{future::Future, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use anyhow::Result;
use futures::{FutureExt as _, future::BoxFuture};
use log::{debug, error, info};
use tokio::{sync::watch, time::Instant};

pub type Task = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No loop is alive.
    Idle,
    /// Waiting for the next tick.
    Scheduled,
    /// A tick is in flight.
    Running,
    /// A tick is in flight and no further tick will follow it.
    Stopping,
}

#[derive(Debug, Clone, Copy)]
struct Control {
    state: SchedulerState,
    /// Identifies the loop currently allowed to run ticks.
    generation: u64,
}

pub struct AsyncIntervalScheduler {
    name: String,
    interval: Duration,
    task: Task,
    control: Arc<watch::Sender<Control>>,
}

impl AsyncIntervalScheduler {
    pub fn new<F, Fut>(name: impl Into<String>, interval: Duration, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (control, _) = watch::channel(Control {
            state: SchedulerState::Idle,
            generation: 0,
        });

        Self {
            name: name.into(),
            interval,
            task: Arc::new(move || task().boxed()),
            control: Arc::new(control),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        self.control.borrow().state
    }

    pub fn is_running(&self) -> bool {
        self.state() != SchedulerState::Idle
    }

    /// Starts the poll loop in a background task and returns immediately.
    ///
    /// Calling it on a running scheduler does nothing. Calling it while the scheduler is
    /// stopping keeps the existing loop alive instead of spawning a second one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut spawn_generation = None;

        self.control.send_if_modified(|control| match control.state {
            SchedulerState::Idle => {
                control.generation += 1;
                control.state = SchedulerState::Scheduled;
                spawn_generation = Some(control.generation);
                true
            }
            SchedulerState::Stopping => {
                control.state = SchedulerState::Running;
                true
            }
            SchedulerState::Scheduled | SchedulerState::Running => false,
        });

        if let Some(generation) = spawn_generation {
            info!(
                "Starting {} every {}ms",
                self.name,
                self.interval.as_millis()
            );
            tokio::spawn(run_loop(
                self.name.clone(),
                self.interval,
                Arc::clone(&self.task),
                Arc::clone(&self.control),
                generation,
            ));
        }
    }

    /// Cancels the pending wake-up, or lets the in-flight tick finish and then exits.
    ///
    /// In-flight work is never aborted.
    pub fn stop(&self) {
        let stopped = self.control.send_if_modified(|control| match control.state {
            SchedulerState::Scheduled => {
                control.state = SchedulerState::Idle;
                true
            }
            SchedulerState::Running => {
                control.state = SchedulerState::Stopping;
                true
            }
            SchedulerState::Idle | SchedulerState::Stopping => false,
        });

        if stopped {
            info!("Stopping {}", self.name);
        }
    }

    /// Resolves once no tick is in flight and none will start.
    pub async fn stopped(&self) {
        let mut changes = self.control.subscribe();
        loop {
            if changes.borrow_and_update().state == SchedulerState::Idle {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for AsyncIntervalScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    name: String,
    interval: Duration,
    task: Task,
    control: Arc<watch::Sender<Control>>,
    generation: u64,
) {
    let mut changes = control.subscribe();

    loop {
        let acquired = control.send_if_modified(|control| {
            if control.generation == generation && control.state == SchedulerState::Scheduled {
                control.state = SchedulerState::Running;
                true
            } else {
                false
            }
        });
        if !acquired {
            break;
        }

        let started_at = Instant::now();
        match AssertUnwindSafe(async { task().await })
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("{name} failed: {err:#}"),
            Err(_) => error!("{name} panicked"),
        }
        let elapsed = started_at.elapsed();

        let mut keep_running = false;
        control.send_if_modified(|control| match control.state {
            SchedulerState::Running => {
                control.state = SchedulerState::Scheduled;
                keep_running = true;
                true
            }
            SchedulerState::Stopping => {
                control.state = SchedulerState::Idle;
                true
            }
            SchedulerState::Idle | SchedulerState::Scheduled => false,
        });
        if !keep_running {
            break;
        }

        let remaining = interval.saturating_sub(elapsed);
        if remaining.is_zero() {
            // Processing is taking longer than the interval.
            debug!("{name} took {}ms", elapsed.as_millis());
            continue;
        }

        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = cancelled(&mut changes, generation) => {}
        }
    }

    debug!("{name} loop exited");
}

async fn cancelled(changes: &mut watch::Receiver<Control>, generation: u64) {
    loop {
        {
            let control = changes.borrow_and_update();
            if control.generation != generation || control.state == SchedulerState::Idle {
                return;
            }
        }
        if changes.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use anyhow::anyhow;
    use tokio::time::sleep;

    use super::*;

    const INTERVAL: Duration = Duration::from_millis(100);

    /// Task that records its start instants and then works for `exec`.
    fn recording_task(
        exec: Duration,
    ) -> (
        Arc<Mutex<Vec<Instant>>>,
        impl Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    ) {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let starts_clone = Arc::clone(&starts);
        let task = move || {
            let starts = Arc::clone(&starts_clone);
            async move {
                starts.lock().unwrap().push(Instant::now());
                sleep(exec).await;
                Ok(())
            }
            .boxed()
        };
        (starts, task)
    }

    fn gaps(starts: &[Instant]) -> Vec<Duration> {
        starts.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_tick_waits_for_interval() {
        let (starts, task) = recording_task(Duration::from_millis(30));
        let scheduler = AsyncIntervalScheduler::new("short", INTERVAL, task);

        scheduler.start();
        sleep(Duration::from_millis(350)).await;
        scheduler.stop();

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 4);
        assert!(gaps(&starts).iter().all(|gap| *gap == INTERVAL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_tick_runs_back_to_back() {
        let exec = Duration::from_millis(80);
        let (starts, task) = recording_task(exec);
        let scheduler = AsyncIntervalScheduler::new("overrun", Duration::from_millis(50), task);

        scheduler.start();
        sleep(Duration::from_millis(250)).await;
        scheduler.stop();

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 4);
        assert!(gaps(&starts).iter().all(|gap| *gap == exec));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_overlaps_and_start_is_idempotent() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let task = {
            let in_flight = Arc::clone(&in_flight);
            let max_in_flight = Arc::clone(&max_in_flight);
            let runs = Arc::clone(&runs);
            move || {
                let in_flight = Arc::clone(&in_flight);
                let max_in_flight = Arc::clone(&max_in_flight);
                let runs = Arc::clone(&runs);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(70)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        };
        let scheduler = AsyncIntervalScheduler::new("overlap", Duration::from_millis(20), task);

        for _ in 0..10 {
            scheduler.start();
            sleep(Duration::from_millis(15)).await;
        }
        scheduler.stop();
        scheduler.stopped().await;

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = {
            let runs = Arc::clone(&runs);
            move || {
                let run = runs.fetch_add(1, Ordering::SeqCst);
                async move {
                    match run {
                        0 => Err(anyhow!("gateway unreachable")),
                        1 => panic!("malformed payload"),
                        _ => Ok(()),
                    }
                }
            }
        };
        let scheduler = AsyncIntervalScheduler::new("failing", INTERVAL, task);

        scheduler.start();
        sleep(Duration::from_millis(250)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_sleeping_prevents_next_tick() {
        let (starts, task) = recording_task(Duration::ZERO);
        let scheduler = AsyncIntervalScheduler::new("sleeping", INTERVAL, task);

        scheduler.start();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        sleep(Duration::from_millis(500)).await;

        assert_eq!(starts.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_running_lets_tick_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let task = {
            let finished = Arc::clone(&finished);
            move || {
                let finished = Arc::clone(&finished);
                async move {
                    sleep(Duration::from_millis(50)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        };
        let scheduler = AsyncIntervalScheduler::new("running", INTERVAL, task);

        scheduler.start();
        sleep(Duration::from_millis(10)).await;
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopping);

        scheduler.stopped().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_stopping_keeps_single_loop() {
        let (starts, task) = recording_task(Duration::from_millis(50));
        let scheduler = AsyncIntervalScheduler::new("revive", INTERVAL, task);

        scheduler.start();
        sleep(Duration::from_millis(10)).await;
        scheduler.stop();
        scheduler.start();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        sleep(Duration::from_millis(240)).await;
        scheduler.stop();

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 3);
        assert!(gaps(&starts).iter().all(|gap| *gap == INTERVAL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let (starts, task) = recording_task(Duration::ZERO);
        let scheduler = AsyncIntervalScheduler::new("restart", INTERVAL, task);

        scheduler.start();
        sleep(Duration::from_millis(10)).await;
        scheduler.stop();
        scheduler.start();
        sleep(Duration::from_millis(10)).await;
        scheduler.stop();

        assert_eq!(starts.lock().unwrap().len(), 2);
    }
}
