//! In-flight operator checks for privileged chat requests.
//!
//! A privileged request from IRC (moderation or a verbosity change) cannot
//! be decided on the spot: the requester's operator status is looked up
//! asynchronously. The dispatcher parks the request here, keyed by sender,
//! and resumes it when the lookup's verdict comes back carrying the same
//! [`CheckId`]. At most one check per sender is in flight.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::{Identity, Moderation, Origin};

/// Default lifetime of a pending check.
pub const DEFAULT_CHECK_TIMEOUT_SECS: i64 = 5;

/// Correlates a verdict with the request that started the lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckId {
    /// Sender key (origin plus lowercased id).
    pub sender: String,
    /// When the lookup was started.
    pub issued_at: DateTime<Utc>,
}

/// The action to perform once the requester is confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegedAction {
    /// Moderate every member on the other side whose display name matches.
    Moderate {
        /// Kick, ban or unban.
        action: Moderation,
        /// Display name to match.
        target_name: String,
    },
    /// Change the verbosity level.
    SetVerbosity(u8),
}

/// A parked request.
#[derive(Debug, Clone)]
pub struct PendingCheck {
    /// Correlation id handed to the lookup task.
    pub id: CheckId,
    /// Transport the request came from.
    pub origin: Origin,
    /// Who asked.
    pub requester: Identity,
    /// What they asked for.
    pub action: PrivilegedAction,
    /// After this instant the check is stale.
    pub expires_at: DateTime<Utc>,
}

/// Outcome of an operator lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Requester holds operator status.
    Operator,
    /// Requester is not an operator.
    NotOperator,
    /// The lookup did not answer in time.
    TimedOut,
    /// The lookup failed.
    Failed(String),
}

/// A verdict addressed to a parked request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionVerdict {
    /// Which request this answers.
    pub id: CheckId,
    /// What the lookup found.
    pub verdict: Verdict,
}

/// Result of matching a verdict against the parked requests.
#[derive(Debug)]
pub enum CheckResolution {
    /// The request is still live; here it is.
    Ready(PendingCheck),
    /// The request existed but went stale.
    Expired,
    /// Nothing parked under this id (cancelled, superseded or unknown).
    NotFound,
}

/// Parked privileged requests, owned by the dispatcher.
#[derive(Debug)]
pub struct PendingChecks {
    pending: HashMap<String, PendingCheck>,
    timeout: Duration,
}

impl PendingChecks {
    /// Create an empty table whose checks expire after `timeout`.
    pub fn new(timeout: std::time::Duration) -> Self {
        let timeout = Duration::from_std(timeout)
            .unwrap_or_else(|_| Duration::seconds(DEFAULT_CHECK_TIMEOUT_SECS));
        Self {
            pending: HashMap::new(),
            timeout,
        }
    }

    /// Park a request. Returns `None` if the sender already has a live
    /// check in flight.
    pub fn begin(
        &mut self,
        origin: Origin,
        requester: Identity,
        action: PrivilegedAction,
    ) -> Option<CheckId> {
        let key = sender_key(origin, &requester);
        let now = Utc::now();

        if let Some(existing) = self.pending.get(&key) {
            if existing.expires_at > now {
                return None;
            }
        }

        let id = CheckId {
            sender: key.clone(),
            issued_at: now,
        };
        let expires_at = now.checked_add_signed(self.timeout).unwrap_or(now);
        self.pending.insert(
            key,
            PendingCheck {
                id: id.clone(),
                origin,
                requester,
                action,
                expires_at,
            },
        );
        Some(id)
    }

    /// Take the request matching `id` out of the table.
    ///
    /// The entry is removed whatever the outcome (single use). A stale id
    /// for a sender who has since started a newer check leaves the newer
    /// check in place.
    pub fn resolve(&mut self, id: &CheckId) -> CheckResolution {
        let Some(entry) = self.pending.get(&id.sender) else {
            return CheckResolution::NotFound;
        };
        if entry.id != *id {
            return CheckResolution::NotFound;
        }
        let Some(entry) = self.pending.remove(&id.sender) else {
            return CheckResolution::NotFound;
        };
        if Utc::now() > entry.expires_at {
            return CheckResolution::Expired;
        }
        CheckResolution::Ready(entry)
    }

    /// Drop every check that came from `origin`. Returns how many were dropped.
    pub fn cancel_origin(&mut self, origin: Origin) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, check| check.origin != origin);
        before.saturating_sub(self.pending.len())
    }

    /// Remove all expired entries.
    pub fn gc_expired(&mut self) {
        let now = Utc::now();
        self.pending.retain(|_, check| check.expires_at > now);
    }

    /// Whether `requester` on `origin` has a check parked.
    pub fn contains(&self, origin: Origin, requester: &Identity) -> bool {
        self.pending.contains_key(&sender_key(origin, requester))
    }

    /// Mutable access to a parked check (for expiry manipulation in tests).
    pub fn get_mut(&mut self, id: &CheckId) -> Option<&mut PendingCheck> {
        self.pending.get_mut(&id.sender)
    }

    /// Number of parked checks.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// IRC nicks are case-insensitive, so keys are lowercased.
fn sender_key(origin: Origin, requester: &Identity) -> String {
    format!("{origin}:{}", requester.id.to_lowercase())
}
