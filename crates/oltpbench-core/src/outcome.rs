use std::fmt;

use serde::{Deserialize, Serialize};

/// Tagged result of one transaction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Committed.
    Success,
    /// Expected application-level rollback, optionally with a reason.
    UserAbort(Option<String>),
    /// The target rejected the attempt with a transient conflict.
    Retry,
    /// Anything else.
    UnexpectedError(String),
}

impl TransactionStatus {
    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success => OutcomeKind::Success,
            Self::UserAbort(_) => OutcomeKind::UserAbort,
            Self::Retry => OutcomeKind::Retry,
            Self::UnexpectedError(_) => OutcomeKind::UnexpectedError,
        }
    }
}

/// Outcome category used as histogram key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutcomeKind {
    Success,
    UserAbort,
    Retry,
    UnexpectedError,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 4] = [
        Self::Success,
        Self::UserAbort,
        Self::Retry,
        Self::UnexpectedError,
    ];

    /// Dense index, for per-kind counter arrays.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Success => 0,
            Self::UserAbort => 1,
            Self::Retry => 2,
            Self::UnexpectedError => 3,
        }
    }

    /// Heading used in histogram summaries.
    #[must_use]
    pub fn heading(&self) -> &'static str {
        match self {
            Self::Success => "Completed Transactions",
            Self::UserAbort => "Aborted Transactions",
            Self::Retry => "Rejected Transactions (Server Retry)",
            Self::UnexpectedError => "Unexpected Errors",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "SUCCESS",
            Self::UserAbort => "USER_ABORT",
            Self::Retry => "RETRY",
            Self::UnexpectedError => "UNEXPECTED_ERROR",
        };
        f.write_str(label)
    }
}
