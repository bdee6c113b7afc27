//! Task status records as surfaced to the status query.

/// One named status value within a rendered record.
#[derive(Debug, Clone)]
pub struct StatusField {
    /// Wire name of the field.
    pub name: &'static str,
    /// Rendered value, or `None` when the task has no value yet (never run,
    /// no description).
    pub value: Option<String>,
}

/// Point-in-time status of one scheduled task.
///
/// All fields of one record reflect the same instant, even when different
/// records in a snapshot do not.
#[derive(Debug, Clone)]
pub struct TaskStatusRecord {
    /// Generated task identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Command line the task runs.
    pub command: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Lock names held during a run, joined with commas.
    pub comma_separated_locks: String,
    /// Whether a run is in flight right now.
    pub running: bool,
    /// Outcome of the most recent run, absent before the first.
    pub success: Option<bool>,
    /// Dispatch priority.
    pub priority: i64,
    /// Completed run count.
    pub step: u64,
    /// Start time of the most recent run, absent before the first.
    pub last_run_date: Option<String>,
}

impl TaskStatusRecord {
    /// Render the record as named fields in the canonical wire order.
    #[must_use]
    pub fn fields(&self) -> Vec<StatusField> {
        vec![
            StatusField {
                name: "id",
                value: Some(self.id.clone()),
            },
            StatusField {
                name: "name",
                value: Some(self.name.clone()),
            },
            StatusField {
                name: "command",
                value: Some(self.command.clone()),
            },
            StatusField {
                name: "description",
                value: self.description.clone(),
            },
            StatusField {
                name: "commaSeparatedLocks",
                value: Some(self.comma_separated_locks.clone()),
            },
            StatusField {
                name: "running",
                value: Some(self.running.to_string()),
            },
            StatusField {
                name: "success",
                value: self.success.map(|s| s.to_string()),
            },
            StatusField {
                name: "priority",
                value: Some(self.priority.to_string()),
            },
            StatusField {
                name: "step",
                value: Some(self.step.to_string()),
            },
            StatusField {
                name: "lastRunDate",
                value: self.last_run_date.clone(),
            },
        ]
    }
}
