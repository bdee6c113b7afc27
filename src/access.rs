//! Origin allowlist evaluation for privileged commands.
//!
//! The policy compares literal origin strings. It is not a security
//! boundary: origins are spoofable at the transport layer, and there is no
//! CIDR or prefix matching. Deployments needing real authentication put a
//! stronger gate in front of the server.

use std::collections::HashSet;

use crate::error::{Result, TaskServError};

/// Whether a caller's origin may invoke privileged commands.
///
/// Derived from the validated configuration's `ips` value. The configuration
/// is immutable after startup, so the policy is built once and shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    /// No `ips` key configured: every origin is allowed.
    AllowAll,
    /// Exact-match set of permitted origin literals. An empty set (the key
    /// was present but held no tokens) denies every origin.
    Allowlist(HashSet<String>),
}

impl AccessPolicy {
    /// Build the policy from the raw `ips` configuration value.
    #[must_use]
    pub fn from_ips(ips: Option<&str>) -> Self {
        match ips {
            None => Self::AllowAll,
            Some(raw) => Self::Allowlist(parse_allowlist(raw)),
        }
    }

    /// Check whether `origin` may invoke a privileged command.
    ///
    /// # Errors
    ///
    /// Returns [`TaskServError::AccessDenied`] naming the origin when it is
    /// not in the allowlist.
    pub fn check(&self, origin: &str) -> Result<()> {
        match self {
            Self::AllowAll => Ok(()),
            Self::Allowlist(allowed) => {
                if allowed.contains(origin) {
                    Ok(())
                } else {
                    Err(TaskServError::AccessDenied(origin.to_owned()))
                }
            }
        }
    }

    /// Returns `true` when every origin is allowed.
    #[must_use]
    pub fn allows_all(&self) -> bool {
        matches!(self, Self::AllowAll)
    }
}

/// Split the configured string on every run of characters that are neither
/// ASCII digits nor `.`, keeping the non-empty tokens.
fn parse_allowlist(raw: &str) -> HashSet<String> {
    raw.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}
