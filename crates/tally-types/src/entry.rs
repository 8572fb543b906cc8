use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Unique identifier for a ledger entry (UUID v7 for time-ordering).
///
/// Entry IDs are assigned once at creation and never reused. Ordering of
/// the ledger itself comes from the store-assigned sequence number, not
/// from this identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(uuid::Uuid);

impl EntryId {
    /// Generate a new time-ordered entry ID (UUID v7).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters of the UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for EntryId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidEntryId(e.to_string()))
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.short_id())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
