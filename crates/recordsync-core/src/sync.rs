//! Reconciliation policy for remote records
//!
//! Last-writer-wins on `updated_at`. A persisted object is **Stale** when an
//! incoming payload carries a strictly newer `updated_at`, otherwise it is
//! **Current**. Equal timestamps keep local state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::truncate_to_millis;

/// Sync bookkeeping timestamps carried by every remote record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStamps {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SyncStamps {
    pub fn new(created_at: Option<DateTime<Utc>>, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            created_at: created_at.map(truncate_to_millis),
            updated_at: updated_at.map(truncate_to_millis),
        }
    }

    /// Overwrite with every stamp the incoming side actually carries
    ///
    /// A stamp the payload could not provide leaves the current value alone.
    pub fn absorb(&mut self, incoming: &SyncStamps) {
        if let Some(created_at) = incoming.created_at {
            self.created_at = Some(created_at);
        }
        if let Some(updated_at) = incoming.updated_at {
            self.updated_at = Some(updated_at);
        }
    }
}

/// Whether a persisted object accepts the next payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Payload is strictly newer; unpack it
    Stale,
    /// Local state is as new or newer; keep it
    Current,
}

/// Classify `current` against an incoming payload's stamps
pub fn freshness(current: &SyncStamps, incoming: &SyncStamps) -> Freshness {
    match (current.updated_at, incoming.updated_at) {
        // Without an incoming timestamp nothing proves the payload is newer
        (_, None) => Freshness::Current,
        (None, Some(_)) => Freshness::Stale,
        (Some(local), Some(remote)) => {
            if remote.timestamp_millis() > local.timestamp_millis() {
                Freshness::Stale
            } else {
                Freshness::Current
            }
        }
    }
}

/// Default unpack decision: new objects always, existing ones only when stale
pub fn should_unpack(is_new: bool, current: &SyncStamps, incoming: &SyncStamps) -> bool {
    is_new || freshness(current, incoming) == Freshness::Stale
}

/// What reconciling one payload did to the local object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnpackOutcome {
    Created,
    Updated,
    Unchanged,
}

impl UnpackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnpackOutcome::Created => "created",
            UnpackOutcome::Updated => "updated",
            UnpackOutcome::Unchanged => "unchanged",
        }
    }
}
