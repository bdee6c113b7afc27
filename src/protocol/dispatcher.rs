//! Command dispatch: resolve the name, check the origin, apply the effect.
//!
//! All three surfaces (execute, help, usage) share one resolution and one
//! privilege check, so a command that is unknown or denied on one surface
//! is unknown or denied on all of them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::access::AccessPolicy;
use crate::error::{Result, TaskServError};
use crate::protocol::command::{Command, Privilege};
use crate::protocol::document::{self, Document};
use crate::scheduler::SchedulerService;
use crate::supervisor::Supervisor;

/// Routes protocol requests to the supervisor.
pub struct CommandDispatcher<S> {
    supervisor: Arc<Supervisor<S>>,
    policy: AccessPolicy,
}

impl<S: SchedulerService> CommandDispatcher<S> {
    /// Create a dispatcher over `supervisor` gated by `policy`.
    pub fn new(supervisor: Arc<Supervisor<S>>, policy: AccessPolicy) -> Self {
        Self { supervisor, policy }
    }

    fn resolve(name: &str) -> Result<Command> {
        Command::parse(name).ok_or_else(|| TaskServError::CommandNotFound(name.to_owned()))
    }

    fn authorize(&self, command: Command, origin: &str) -> Result<()> {
        match command.privilege() {
            Privilege::Public => Ok(()),
            Privilege::Privileged => self.policy.check(origin),
        }
    }

    /// Execute a command on behalf of `origin`.
    ///
    /// Arguments beyond the command name are accepted for wire compatibility;
    /// no current command reads them.
    ///
    /// # Errors
    ///
    /// [`TaskServError::CommandNotFound`] for an unknown name,
    /// [`TaskServError::AccessDenied`] for a privileged command from a
    /// disallowed origin, or the scheduler's own error.
    pub async fn execute(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
        origin: &str,
    ) -> Result<Document> {
        let command = Self::resolve(name)?;
        self.authorize(command, origin)?;
        debug!(
            command = command.as_str(),
            %origin,
            args = arguments.len(),
            "executing command"
        );

        let doc = match command {
            Command::GetSessionInfo => document::session_descriptor(),
            Command::GetTasksStatus => document::task_status(&self.supervisor.snapshot()?),
            Command::LockScheduler => {
                self.supervisor.lock()?;
                Document::success()
            }
            Command::UnlockScheduler => {
                self.supervisor.unlock()?;
                Document::success()
            }
            Command::StopServer => {
                // Drain completes before the reply is built, so the caller's
                // success response reflects a scheduler that has stopped.
                self.supervisor.stop().await;
                Document::success()
            }
        };
        info!(command = command.as_str(), %origin, "command executed");
        Ok(doc)
    }

    /// Help text for a command, subject to the same privilege check as
    /// execution.
    ///
    /// # Errors
    ///
    /// Same as [`CommandDispatcher::execute`].
    pub fn describe_help(&self, name: &str, origin: &str) -> Result<&'static str> {
        let command = Self::resolve(name)?;
        self.authorize(command, origin)?;
        Ok(command.description())
    }

    /// Usage text for a command, subject to the same privilege check as
    /// execution. `None` means the command defines no usage text.
    ///
    /// # Errors
    ///
    /// Same as [`CommandDispatcher::execute`].
    pub fn describe_usage(&self, name: &str, origin: &str) -> Result<Option<&'static str>> {
        let command = Self::resolve(name)?;
        self.authorize(command, origin)?;
        Ok(command.usage())
    }
}
