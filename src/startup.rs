//! Wires configuration, scheduler, and dispatcher together.
//!
//! Validation happens before anything is spawned: a bad service map means
//! no scheduler ever starts and no socket is ever bound.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::access::AccessPolicy;
use crate::config::{ServiceConfig, TaskDefinition};
use crate::error::Result;
use crate::protocol::CommandDispatcher;
use crate::scheduler::SchedulerHandle;
use crate::supervisor::{ShutdownSignal, Supervisor};

/// The assembled application.
pub struct App {
    /// Dispatcher the transport serves.
    pub dispatcher: Arc<CommandDispatcher<SchedulerHandle>>,
    /// Supervisor owning the scheduler and the shutdown signal.
    pub supervisor: Arc<Supervisor<SchedulerHandle>>,
}

/// Validate the raw service map, start the scheduler, and build the
/// dispatcher over it.
///
/// # Errors
///
/// Returns [`crate::error::TaskServError::Config`] when the service map is
/// invalid; in that case nothing has been started.
pub fn init(
    service: &BTreeMap<String, String>,
    tasks: Vec<TaskDefinition>,
    signal: ShutdownSignal,
) -> Result<App> {
    let config = ServiceConfig::from_map(service)?;
    let policy = AccessPolicy::from_ips(config.ips.as_deref());
    if policy.allows_all() {
        warn!("no `ips` allowlist configured; privileged commands are open to every origin");
    }

    let supervisor = Arc::new(Supervisor::start(&config, tasks, signal));
    let dispatcher = Arc::new(CommandDispatcher::new(Arc::clone(&supervisor), policy));

    Ok(App {
        dispatcher,
        supervisor,
    })
}
