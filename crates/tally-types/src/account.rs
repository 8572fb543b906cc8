use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum accepted length for an account identifier.
pub const MAX_ACCOUNT_ID_LEN: usize = 64;

/// Identifier for a ledger account.
///
/// An `AccountId` is an opaque, caller-chosen name. It carries no balance
/// semantics of its own — accounts exist implicitly the first time an entry
/// or checkpoint mentions them. Valid identifiers are non-empty, at most
/// [`MAX_ACCOUNT_ID_LEN`] characters, and restricted to ASCII alphanumerics
/// plus `-`, `_`, and `.`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create an `AccountId` without validation. Use [`AccountId::parse`]
    /// for untrusted input.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse and validate an account identifier.
    pub fn parse(id: &str) -> Result<Self, TypeError> {
        if id.is_empty() {
            return Err(TypeError::EmptyAccountId);
        }
        if id.len() > MAX_ACCOUNT_ID_LEN {
            return Err(TypeError::AccountIdTooLong {
                max: MAX_ACCOUNT_ID_LEN,
                actual: id.len(),
            });
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(TypeError::InvalidAccountIdChar(bad));
        }
        Ok(Self(id.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
