//! The command registry: the closed set of protocol commands.
//!
//! Every surface resolves names through [`Command::parse`] and reads
//! privilege and description from the same enum, so the execute and help
//! surfaces can never recognize different command sets.

/// Privilege tier of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Callable by any origin.
    Public,
    /// Gated by the configured origin allowlist.
    Privileged,
}

/// A protocol command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Return the fixed session descriptor.
    GetSessionInfo,
    /// Return a status snapshot of every scheduled task.
    GetTasksStatus,
    /// Halt task dispatch until unlocked.
    LockScheduler,
    /// Resume task dispatch.
    UnlockScheduler,
    /// Gracefully stop the scheduler, then the serving transport.
    StopServer,
}

impl Command {
    /// Every command of the protocol.
    pub const ALL: [Self; 5] = [
        Self::GetSessionInfo,
        Self::GetTasksStatus,
        Self::LockScheduler,
        Self::UnlockScheduler,
        Self::StopServer,
    ];

    /// Protocol name of the command.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetSessionInfo => "GetSessionInfo",
            Self::GetTasksStatus => "GetTasksStatus",
            Self::LockScheduler => "LockScheduler",
            Self::UnlockScheduler => "UnlockScheduler",
            Self::StopServer => "StopServer",
        }
    }

    /// Resolve a protocol name. Matching is exact and case-sensitive.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "GetSessionInfo" => Some(Self::GetSessionInfo),
            "GetTasksStatus" => Some(Self::GetTasksStatus),
            "LockScheduler" => Some(Self::LockScheduler),
            "UnlockScheduler" => Some(Self::UnlockScheduler),
            "StopServer" => Some(Self::StopServer),
            _ => None,
        }
    }

    /// Privilege tier. Only [`Command::GetSessionInfo`] is public.
    #[must_use]
    pub fn privilege(&self) -> Privilege {
        match self {
            Self::GetSessionInfo => Privilege::Public,
            Self::GetTasksStatus
            | Self::LockScheduler
            | Self::UnlockScheduler
            | Self::StopServer => Privilege::Privileged,
        }
    }

    /// Human-readable description served by the help surface.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::GetSessionInfo => "Get session info",
            Self::GetTasksStatus => "Get task status",
            Self::LockScheduler => "Lock the scheduler",
            Self::UnlockScheduler => "Unlock the scheduler",
            Self::StopServer => "Stop the server",
        }
    }

    /// Usage text. This protocol defines none for any command.
    #[must_use]
    pub fn usage(&self) -> Option<&'static str> {
        None
    }
}
