use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("account id is empty")]
    EmptyAccountId,

    #[error("account id too long: {actual} characters (max {max})")]
    AccountIdTooLong { max: usize, actual: usize },

    #[error("account id contains invalid character {0:?}")]
    InvalidAccountIdChar(char),

    #[error("invalid entry id: {0}")]
    InvalidEntryId(String),
}
