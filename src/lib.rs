//! Task scheduling server speaking the XML command protocol.
//!
//! # Architecture
//!
//! The crate is a small command protocol served over HTTP, backed by an
//! in-process task scheduler:
//!
//! - **Scheduler**: runs seeded tasks on their intervals, bounded by
//!   `max_tasks` and per-task lock names
//! - **Protocol**: the closed command registry, the XML document renderer,
//!   and the dispatcher tying commands to scheduler effects
//! - **Access**: an exact-match origin allowlist gating privileged commands
//! - **Server**: the axum transport carrying the execute, help, and usage
//!   surfaces
//!
//! The `taskservd` binary loads a TOML configuration, starts the scheduler,
//! and serves until a stop command or Ctrl+C arrives.

pub mod access;
pub mod config;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod server;
pub mod startup;
pub mod supervisor;

pub use access::AccessPolicy;
pub use config::{DaemonConfig, ServiceConfig, TaskDefinition};
pub use error::{Result, TaskServError};
pub use protocol::{Command, CommandDispatcher, Document};
pub use scheduler::{SchedulerHandle, SchedulerService, TaskScheduler, TaskStatusRecord};
pub use server::CommandServer;
pub use supervisor::{ShutdownSignal, Supervisor};
