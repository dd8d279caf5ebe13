//! Interval Invoker - single-flight periodic task runner
//!
//! The first tick fires one `poll_interval` after `start()`. Each tick is
//! awaited to completion before the next sleep begins, so two ticks never
//! overlap; a slow tick only delays the ones after it. `stop()` is
//! cooperative: a tick already in flight finishes but does not reschedule.

use crate::application::shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Work executed on every tick
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    async fn run_once(&self) -> Result<()>;

    /// Name used in log fields
    fn name(&self) -> &'static str {
        "periodic-task"
    }
}

struct Running {
    shutdown: ShutdownSender,
    handle: JoinHandle<()>,
}

/// Runs a [`PeriodicTask`] on a fixed interval in a background task
pub struct IntervalInvoker {
    poll_interval: Duration,
    task: Arc<dyn PeriodicTask>,
    control: Mutex<Option<Running>>,
}

impl IntervalInvoker {
    pub fn new(task: Arc<dyn PeriodicTask>, poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            task,
            control: Mutex::new(None),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Spawn the tick loop; returns false if it is already running
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if control.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let (shutdown, token) = shutdown_channel();
        let handle = tokio::spawn(run(self.poll_interval, Arc::clone(&self.task), token));
        *control = Some(Running { shutdown, handle });
        true
    }

    pub fn is_running(&self) -> bool {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Signal the loop to stop without waiting for an in-flight tick
    ///
    /// The handle is kept, so `start()` is refused and `is_running()` stays
    /// true until that tick has finished and the loop has exited.
    pub fn stop(&self) {
        if let Some(running) = self
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            running.shutdown.shutdown();
        }
    }

    /// Signal the loop to stop and wait until it has exited
    pub async fn stop_and_wait(&self) {
        let Some(running) = self.take_running() else {
            return;
        };
        running.shutdown.shutdown();
        if let Err(e) = running.handle.await {
            error!(task = self.task.name(), error = %e, "Interval loop terminated abnormally");
        }
    }

    fn take_running(&self) -> Option<Running> {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Tick loop; returns once `shutdown` is signalled
pub async fn run(poll_interval: Duration, task: Arc<dyn PeriodicTask>, mut shutdown: ShutdownToken) {
    info!(
        task = task.name(),
        poll_interval_ms = poll_interval.as_millis() as u64,
        "Interval invoker started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = sleep(poll_interval) => {}
        }

        debug!(task = task.name(), "Tick");
        if let Err(e) = task.run_once().await {
            error!(task = task.name(), error = %e, "Interval tick failed");
        }

        if shutdown.is_shutdown() {
            break;
        }
    }

    info!(task = task.name(), "Interval invoker stopped");
}
