//! In-memory task scheduler worker.
//!
//! [`TaskScheduler`] holds the validated parameters and seeded task
//! definitions; [`TaskScheduler::start`] consumes it and spawns the tick
//! loop, returning the [`SchedulerHandle`] ownership token. Consuming
//! `self` makes starting the same scheduler twice unrepresentable.
//!
//! Dispatch rules per tick: skip everything while locked; otherwise run due
//! tasks in descending priority order, never exceeding `max_tasks`
//! concurrent runs and never running two tasks that share a lock name. A
//! failed run defers the task's next attempt by the `compression` factor.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ServiceConfig, TaskDefinition};
use crate::error::{Result, TaskServError};
use crate::scheduler::service::SchedulerService;
use crate::scheduler::status::TaskStatusRecord;

/// Default seconds between dispatch passes.
const TICK_INTERVAL_SECS: u64 = 1;

/// Default bound on waiting for in-flight runs during stop.
const STOP_GRACE_SECS: u64 = 5;

/// Format of the `lastRunDate` status field.
const LAST_RUN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of one task run.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The run completed successfully.
    Success,
    /// The run failed with a reason.
    Failure(String),
}

/// Executes one task run. Runs on a blocking thread.
pub type TaskExecutor = Box<dyn Fn(&TaskSpec) -> TaskOutcome + Send + Sync>;

/// Static definition of a scheduled task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Generated identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Command line handed to the executor.
    pub command: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Lock names held for the duration of a run.
    pub locks: Vec<String>,
    /// Dispatch priority; higher runs first among due tasks.
    pub priority: i64,
    /// Base interval between runs.
    pub interval: Duration,
}

impl TaskSpec {
    fn from_definition(def: TaskDefinition) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: def.name,
            command: def.command,
            description: def.description,
            locks: def.locks,
            priority: def.priority,
            interval: Duration::from_secs(def.interval_secs),
        }
    }
}

/// Connection and throttling parameters for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerParams {
    /// Task database connection URL.
    pub jdbc_url: String,
    /// Router account user name.
    pub router_user: String,
    /// Router account password. Never logged.
    pub router_pass: String,
    /// Exclusion server base URL.
    pub exclusion_server_url: String,
    /// Name this server registers tasks under.
    pub server_name: String,
    /// Cap on concurrently running tasks.
    pub max_tasks: u32,
    /// Retry-interval stretch factor after a failed run.
    pub compression: f64,
}

impl SchedulerParams {
    /// Extract the scheduler's parameters from the validated configuration.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            jdbc_url: config.jdbc_url.clone(),
            router_user: config.router_user.clone(),
            router_pass: config.router_pass.clone(),
            exclusion_server_url: config.exclusion_server_url.clone(),
            server_name: config.server_name.clone(),
            max_tasks: config.max_tasks,
            compression: config.compression,
        }
    }
}

/// Mutable per-task run state.
#[derive(Debug, Clone)]
struct TaskState {
    running: bool,
    success: Option<bool>,
    step: u64,
    last_run: Option<DateTime<Utc>>,
    not_before: DateTime<Utc>,
}

struct TaskEntry {
    spec: TaskSpec,
    state: TaskState,
}

impl TaskEntry {
    fn status_record(&self) -> TaskStatusRecord {
        TaskStatusRecord {
            id: self.spec.id.clone(),
            name: self.spec.name.clone(),
            command: self.spec.command.clone(),
            description: self.spec.description.clone(),
            comma_separated_locks: self.spec.locks.join(","),
            running: self.state.running,
            success: self.state.success,
            priority: self.spec.priority,
            step: self.state.step,
            last_run_date: self
                .state
                .last_run
                .map(|t| t.format(LAST_RUN_FORMAT).to_string()),
        }
    }
}

struct SchedulerState {
    locked: bool,
    tasks: Vec<TaskEntry>,
}

struct Shared {
    params: SchedulerParams,
    executor: TaskExecutor,
    state: Mutex<SchedulerState>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    stopping: AtomicBool,
    stop_grace: Duration,
}

/// An unstarted scheduler: parameters plus seeded task definitions.
pub struct TaskScheduler {
    params: SchedulerParams,
    specs: Vec<TaskSpec>,
    executor: TaskExecutor,
    tick_interval: Duration,
    stop_grace: Duration,
}

impl TaskScheduler {
    /// Create a scheduler with no tasks and the shell executor.
    #[must_use]
    pub fn new(params: SchedulerParams) -> Self {
        Self {
            params,
            specs: Vec::new(),
            executor: shell_executor(),
            tick_interval: Duration::from_secs(TICK_INTERVAL_SECS),
            stop_grace: Duration::from_secs(STOP_GRACE_SECS),
        }
    }

    /// Seed one task definition.
    #[must_use]
    pub fn with_task(mut self, def: TaskDefinition) -> Self {
        self.specs.push(TaskSpec::from_definition(def));
        self
    }

    /// Seed a batch of task definitions.
    #[must_use]
    pub fn with_tasks(mut self, defs: impl IntoIterator<Item = TaskDefinition>) -> Self {
        self.specs
            .extend(defs.into_iter().map(TaskSpec::from_definition));
        self
    }

    /// Replace the executor. The default runs the task's command line
    /// through the system shell.
    #[must_use]
    pub fn with_executor(mut self, executor: TaskExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Override the dispatch tick interval. Values below one millisecond
    /// are clamped.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Override the stop grace bound.
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Start the background worker, consuming the definition.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let now = Utc::now();
        let tasks = self
            .specs
            .into_iter()
            .map(|spec| TaskEntry {
                spec,
                state: TaskState {
                    running: false,
                    success: None,
                    step: 0,
                    last_run: None,
                    not_before: now,
                },
            })
            .collect();

        let shared = Arc::new(Shared {
            params: self.params,
            executor: self.executor,
            state: Mutex::new(SchedulerState {
                locked: false,
                tasks,
            }),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            stopping: AtomicBool::new(false),
            stop_grace: self.stop_grace,
        });

        info!(
            server = %shared.params.server_name,
            max_tasks = shared.params.max_tasks,
            compression = shared.params.compression,
            "scheduler started"
        );
        debug!(
            jdbc_url = %shared.params.jdbc_url,
            router_user = %shared.params.router_user,
            exclusion_server_url = %shared.params.exclusion_server_url,
            "scheduler endpoints"
        );

        let worker = tokio::spawn(run_loop(Arc::clone(&shared), self.tick_interval));

        SchedulerHandle {
            shared,
            worker: tokio::sync::Mutex::new(Some(worker)),
        }
    }
}

/// Ownership token for a running scheduler.
pub struct SchedulerHandle {
    shared: Arc<Shared>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerHandle {
    /// Whether dispatch is currently locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .locked
    }

    /// Whether stop has been signaled.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

#[async_trait]
impl SchedulerService for SchedulerHandle {
    fn lock(&self) -> Result<()> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        state.locked = true;
        debug!("scheduler locked");
        Ok(())
    }

    fn unlock(&self) -> Result<()> {
        let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        state.locked = false;
        debug!("scheduler unlocked");
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<TaskStatusRecord>> {
        let state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.tasks.iter().map(TaskEntry::status_record).collect())
    }

    async fn stop(&self) -> Result<()> {
        if self.shared.stopping.swap(true, Ordering::SeqCst) {
            // A concurrent stop already signaled shutdown; same outcome.
            return Ok(());
        }
        self.shared.cancel.cancel();
        self.shared.tracker.close();

        let grace = self.shared.stop_grace;
        if tokio::time::timeout(grace, self.shared.tracker.wait())
            .await
            .is_err()
        {
            return Err(TaskServError::Scheduler(format!(
                "in-flight task runs outlived the {:.1}s stop grace period",
                grace.as_secs_f64()
            )));
        }
        debug!("scheduler stopped cleanly");
        Ok(())
    }

    async fn join(&self) -> Result<()> {
        let mut guard = self.worker.lock().await;
        if let Some(handle) = guard.as_mut() {
            // Awaiting through &mut keeps the handle in place if this
            // future is dropped; a later join resumes the same wait.
            let result = handle.await;
            *guard = None;
            result.map_err(|e| TaskServError::Scheduler(format!("worker task failed: {e}")))?;
        }
        Ok(())
    }
}

/// Executor that runs the task's command line through the system shell.
fn shell_executor() -> TaskExecutor {
    Box::new(|spec| {
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(&spec.command)
            .output();
        match output {
            Ok(out) if out.status.success() => TaskOutcome::Success,
            Ok(out) => TaskOutcome::Failure(format!("exit status {}", out.status)),
            Err(e) => TaskOutcome::Failure(format!("spawn failed: {e}")),
        }
    })
}

async fn run_loop(shared: Arc<Shared>, tick_interval: Duration) {
    let mut interval = tokio::time::interval(tick_interval);
    loop {
        tokio::select! {
            () = shared.cancel.cancelled() => break,
            _ = interval.tick() => dispatch_due(&shared),
        }
    }
    debug!("scheduler worker loop exited");
}

/// Run one dispatch pass: mark due tasks running under the state lock, then
/// hand them to the executor on blocking threads.
fn dispatch_due(shared: &Arc<Shared>) {
    let now = Utc::now();
    let mut to_run: Vec<TaskSpec> = Vec::new();
    {
        let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.locked {
            return;
        }

        let mut held: HashSet<String> = HashSet::new();
        let mut running = 0u32;
        for entry in &state.tasks {
            if entry.state.running {
                running += 1;
                held.extend(entry.spec.locks.iter().cloned());
            }
        }

        let mut due: Vec<usize> = (0..state.tasks.len())
            .filter(|&i| {
                let entry = &state.tasks[i];
                !entry.state.running && now >= entry.state.not_before
            })
            .collect();
        due.sort_by_key(|&i| std::cmp::Reverse(state.tasks[i].spec.priority));

        for i in due {
            if running >= shared.params.max_tasks {
                break;
            }
            if state.tasks[i].spec.locks.iter().any(|l| held.contains(l)) {
                continue;
            }
            let entry = &mut state.tasks[i];
            entry.state.running = true;
            entry.state.last_run = Some(now);
            held.extend(entry.spec.locks.iter().cloned());
            running += 1;
            to_run.push(entry.spec.clone());
        }
    }

    for spec in to_run {
        spawn_run(shared, spec);
    }
}

fn spawn_run(shared: &Arc<Shared>, spec: TaskSpec) {
    let worker_shared = Arc::clone(shared);
    shared.tracker.spawn_blocking(move || {
        debug!(task = %spec.name, command = %spec.command, "task run started");
        let outcome = (worker_shared.executor)(&spec);
        let succeeded = match &outcome {
            TaskOutcome::Success => true,
            TaskOutcome::Failure(reason) => {
                warn!(task = %spec.name, %reason, "task run failed");
                false
            }
        };

        let mut state = worker_shared
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = state.tasks.iter_mut().find(|e| e.spec.id == spec.id) {
            entry.state.running = false;
            entry.state.success = Some(succeeded);
            entry.state.step += 1;
            let factor = if succeeded {
                1.0
            } else {
                worker_shared.params.compression
            };
            entry.state.not_before = defer_from_now(entry.spec.interval, factor);
        }
    });
}

/// Next due time: now plus `interval` stretched by `factor`.
fn defer_from_now(interval: Duration, factor: f64) -> DateTime<Utc> {
    // The cast saturates; overflow falls back to the far-future sentinel.
    let millis = (interval.as_secs_f64() * factor * 1000.0).round() as i64;
    TimeDelta::try_milliseconds(millis)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
