//! Background task scheduler.
//!
//! [`service::SchedulerService`] is the interface the command handler
//! consumes; [`worker::TaskScheduler`] is the in-process implementation
//! that dispatches seeded tasks on a tick loop.

pub mod service;
pub mod status;
pub mod worker;

pub use service::SchedulerService;
pub use status::{StatusField, TaskStatusRecord};
pub use worker::{SchedulerHandle, SchedulerParams, TaskOutcome, TaskScheduler, TaskSpec};
