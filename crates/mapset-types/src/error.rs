use thiserror::Error;

use crate::names::NameKind;

/// Errors produced by type construction and request validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: NameKind,
        name: String,
        reason: String,
    },

    #[error("empty source mapset list")]
    EmptySourceList,

    #[error("invalid job id: {0}")]
    InvalidJobId(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
