//! Process lifecycle supervision.
//!
//! The [`Supervisor`] owns the scheduler and the shutdown signal the
//! transport listens on. Stopping the supervisor drains the scheduler
//! first and then triggers the signal, so a stop request is answered
//! before the listener goes away.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ServiceConfig, TaskDefinition};
use crate::error::Result;
use crate::scheduler::{SchedulerHandle, SchedulerParams, SchedulerService, TaskScheduler};

/// Broadcast flag that tells the transport to shut down.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Wait until the signal is triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// Whether the signal has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Owns the scheduler and coordinates shutdown.
pub struct Supervisor<S> {
    scheduler: S,
    signal: ShutdownSignal,
}

impl Supervisor<SchedulerHandle> {
    /// Start a scheduler from the validated configuration and seeded task
    /// definitions, wiring it to `signal`.
    #[must_use]
    pub fn start(
        config: &ServiceConfig,
        tasks: Vec<TaskDefinition>,
        signal: ShutdownSignal,
    ) -> Self {
        let scheduler = TaskScheduler::new(SchedulerParams::from_config(config))
            .with_tasks(tasks)
            .start();
        Self { scheduler, signal }
    }
}

impl<S: SchedulerService> Supervisor<S> {
    /// Supervise an already-started scheduler.
    pub fn with_scheduler(scheduler: S, signal: ShutdownSignal) -> Self {
        Self { scheduler, signal }
    }

    /// The signal the transport should await for graceful shutdown.
    #[must_use]
    pub fn signal(&self) -> &ShutdownSignal {
        &self.signal
    }

    /// Suspend task dispatch.
    ///
    /// # Errors
    ///
    /// Propagates the scheduler's error.
    pub fn lock(&self) -> Result<()> {
        self.scheduler.lock()
    }

    /// Resume task dispatch.
    ///
    /// # Errors
    ///
    /// Propagates the scheduler's error.
    pub fn unlock(&self) -> Result<()> {
        self.scheduler.unlock()
    }

    /// Snapshot the status of every scheduled task.
    ///
    /// # Errors
    ///
    /// Propagates the scheduler's error.
    pub fn snapshot(&self) -> Result<Vec<crate::scheduler::TaskStatusRecord>> {
        self.scheduler.snapshot()
    }

    /// Stop the scheduler, then trigger the shutdown signal.
    ///
    /// A scheduler that fails to drain within its grace bound is logged and
    /// abandoned; the signal is triggered either way so the process can
    /// exit.
    pub async fn stop(&self) {
        info!("shutdown requested");
        if let Err(e) = self.scheduler.stop().await {
            warn!(error = %e, "scheduler did not stop cleanly");
        }
        self.signal.trigger();
    }

    /// Wait for the scheduler's worker to finish.
    ///
    /// # Errors
    ///
    /// Propagates the scheduler's error.
    pub async fn join(&self) -> Result<()> {
        self.scheduler.join().await
    }
}
