//! The collaborator interface the command handler needs from a scheduler.

use async_trait::async_trait;

use crate::error::Result;
use crate::scheduler::status::TaskStatusRecord;

/// Scheduler operations consumed by the dispatcher and the lifecycle
/// coordinator.
///
/// `lock`, `unlock`, and `snapshot` operate on shared scheduler state and
/// must be observed atomically by concurrent callers. `stop` signals
/// shutdown and waits the scheduler's own grace bound for in-flight work;
/// `join` awaits worker termination and must be cancel-safe (dropping the
/// returned future neither loses the worker handle nor leaks the wait).
#[async_trait]
pub trait SchedulerService: Send + Sync + 'static {
    /// Halt dispatch of new task runs until [`SchedulerService::unlock`].
    ///
    /// # Errors
    ///
    /// Returns a scheduler failure, propagated verbatim to the caller.
    fn lock(&self) -> Result<()>;

    /// Resume task dispatch.
    ///
    /// # Errors
    ///
    /// Returns a scheduler failure, propagated verbatim to the caller.
    fn unlock(&self) -> Result<()>;

    /// Point-in-time status of every task, in a stable order. Each record
    /// is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns a scheduler failure, propagated verbatim to the caller.
    fn snapshot(&self) -> Result<Vec<TaskStatusRecord>>;

    /// Signal shutdown and wait, bounded by the scheduler's grace period,
    /// for in-flight runs to finish.
    ///
    /// # Errors
    ///
    /// Returns a scheduler failure when in-flight work outlives the grace
    /// period. Callers may treat this as reportable but non-blocking.
    async fn stop(&self) -> Result<()>;

    /// Await worker termination.
    ///
    /// # Errors
    ///
    /// Returns a scheduler failure when the worker task itself failed.
    async fn join(&self) -> Result<()>;
}
