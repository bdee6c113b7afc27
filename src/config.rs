//! Configuration types for the task server.
//!
//! The host hands the handler a flat string-to-string map at startup.
//! [`ServiceConfig::from_map`] is the single validation pass over that map;
//! after it succeeds the values are read-only for the process lifetime.
//! [`DaemonConfig`] is the TOML file the `taskservd` binary loads, carrying
//! the raw service map plus daemon-only settings (listen address, seeded
//! task definitions).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, TaskServError};

/// Default cap on concurrently running tasks.
pub const MAX_TASKS_DEFAULT: u32 = 10;

/// Default stretch factor applied to a task's retry interval after a failed run.
pub const COMPRESSION_DEFAULT: f64 = 2.0;

/// Keys that must be present in the startup map.
const REQUIRED_KEYS: [&str; 5] = [
    "jdbc_url",
    "router_user",
    "router_pass",
    "exclusion_server_url",
    "server_name",
];

/// Validated service configuration.
///
/// Produced exactly once at startup by [`ServiceConfig::from_map`]. The
/// `router_pass` value is a secret and must never be logged.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// JDBC-style connection URL for the task database.
    pub jdbc_url: String,
    /// Router account user name.
    pub router_user: String,
    /// Router account password. Never logged.
    pub router_pass: String,
    /// Base URL of the exclusion server consulted by the scheduler.
    pub exclusion_server_url: String,
    /// Name this server registers tasks under.
    pub server_name: String,
    /// Cap on concurrently running tasks (min 1, default 10).
    pub max_tasks: u32,
    /// Retry-interval stretch factor after a failed run (min 1.0, default 2.0).
    pub compression: f64,
    /// Raw origin allowlist string, if configured. Parsed by
    /// [`crate::access::AccessPolicy`]; `None` means every origin is allowed.
    pub ips: Option<String>,
}

impl ServiceConfig {
    /// Validate the raw startup map.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServError::Config`] when a required key is missing or
    /// when `max_tasks` / `compression` is unparseable or out of range.
    pub fn from_map(raw: &BTreeMap<String, String>) -> Result<Self> {
        for key in REQUIRED_KEYS {
            if !raw.contains_key(key) {
                return Err(TaskServError::Config(format!(
                    "missing required key `{key}`"
                )));
            }
        }

        let max_tasks = match raw.get("max_tasks") {
            Some(s) => {
                let value: i64 = s.trim().parse().map_err(|e| {
                    TaskServError::Config(format!("invalid `max_tasks`: {e}"))
                })?;
                if value < 1 {
                    return Err(TaskServError::Config("`max_tasks` out of range".to_owned()));
                }
                u32::try_from(value)
                    .map_err(|_| TaskServError::Config("`max_tasks` out of range".to_owned()))?
            }
            None => MAX_TASKS_DEFAULT,
        };

        let compression = match raw.get("compression") {
            Some(s) => {
                let value: f64 = s.trim().parse().map_err(|e| {
                    TaskServError::Config(format!("invalid `compression`: {e}"))
                })?;
                if value < 1.0 {
                    return Err(TaskServError::Config(
                        "`compression` out of range".to_owned(),
                    ));
                }
                value
            }
            None => COMPRESSION_DEFAULT,
        };

        Ok(Self {
            jdbc_url: raw["jdbc_url"].clone(),
            router_user: raw["router_user"].clone(),
            router_pass: raw["router_pass"].clone(),
            exclusion_server_url: raw["exclusion_server_url"].clone(),
            server_name: raw["server_name"].clone(),
            max_tasks,
            compression,
            ips: raw.get("ips").cloned(),
        })
    }
}

/// Daemon configuration file.
///
/// The `[service]` table is the raw handler map, written with string values
/// and passed to [`ServiceConfig::from_map`] verbatim; the daemon never
/// interprets it on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Socket address the HTTP transport binds (default `0.0.0.0:1357`).
    pub listen: Option<SocketAddr>,
    /// Raw service configuration map.
    pub service: BTreeMap<String, String>,
    /// Tasks seeded into the scheduler at startup.
    pub tasks: Vec<TaskDefinition>,
}

/// One seeded task definition from the daemon config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDefinition {
    /// Human-readable task name.
    pub name: String,
    /// Command line the executor runs.
    pub command: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Lock names this task holds while running; tasks sharing a lock name
    /// never run concurrently.
    pub locks: Vec<String>,
    /// Dispatch priority; higher runs first among due tasks.
    pub priority: i64,
    /// Base interval between runs, in seconds.
    pub interval_secs: u64,
}

impl Default for TaskDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            command: String::new(),
            description: None,
            locks: Vec::new(),
            priority: 0,
            interval_secs: 3600,
        }
    }
}

impl DaemonConfig {
    /// Load the daemon configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| TaskServError::Config(e.to_string()))
    }
}
