use tally_types::AccountId;

/// Errors produced by ledger operations.
///
/// The first three variants are normal outcomes a caller branches on;
/// `Conflict` and `Storage` signal that the whole unit of work rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {amount}")]
    InvalidAmount { amount: i64 },

    #[error("cannot transfer from an account to itself: {account}")]
    SameAccount { account: AccountId },

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("transaction conflict, retry advisable: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Returns `true` for failures where retrying the whole operation is
    /// safe and likely to succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` for validation and business-rule rejections, which
    /// leave no ledger mutation behind.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. } | Self::SameAccount { .. } | Self::InsufficientFunds { .. }
        )
    }
}
