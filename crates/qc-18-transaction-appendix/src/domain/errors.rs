//! Error types for the appendix subsystem.
//!
//! Three kinds of rejection reach the caller of decode/validate:
//!
//! | Kind | Meaning | Caller reaction |
//! |------|---------|-----------------|
//! | `MalformedAppendix` | bytes or JSON cannot be read | drop the transaction, penalise the peer |
//! | `NotValid` | permanent semantic violation | reject, never include in a block |
//! | `NotCurrentlyValid` | conflicts with current chain state | hold and retry later |

use super::poll::PollOutcome;
use super::transaction::{AccountId, TransactionId};
use thiserror::Error;

/// Classification of an [`AppendixError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedAppendix,
    NotValid,
    NotCurrentlyValid,
}

/// Decode and validation failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AppendixError {
    /// Buffer ended before the appendix was fully read
    #[error("Truncated appendix: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// Length field exceeds the limit for the field
    #[error("Invalid {field} length: {length} (max {max})")]
    LengthExceeded {
        field: &'static str,
        length: usize,
        max: usize,
    },

    /// Voter count on the wire exceeds the limit
    #[error("Too many possible voters: {count} (max {max})")]
    TooManyVoters { count: usize, max: usize },

    /// Modern transactions must carry an explicit non-zero appendix version
    #[error("Invalid appendix version {version} for transaction version {transaction_version}")]
    InvalidVersion { version: u8, transaction_version: u8 },

    /// Voting model byte is not a known model
    #[error("Unknown voting model: {0}")]
    UnknownVotingModel(u8),

    /// Presence flags contain bits with no appendix kind
    #[error("Unknown appendix flags: {0:#x}")]
    UnknownFlags(u32),

    /// Bytes left over after the last appendix
    #[error("Trailing bytes after appendices: {0}")]
    TrailingBytes(usize),

    /// A detected JSON appendix has a missing or mistyped field
    #[error("Invalid JSON field {field}: {reason}")]
    InvalidJson { field: &'static str, reason: String },

    /// Permanent semantic violation
    #[error("{0}")]
    NotValid(String),

    /// Conflict with current ledger state, may become valid later
    #[error("{0}")]
    NotCurrentlyValid(String),
}

impl AppendixError {
    pub fn not_valid(reason: impl Into<String>) -> Self {
        Self::NotValid(reason.into())
    }

    pub fn not_currently_valid(reason: impl Into<String>) -> Self {
        Self::NotCurrentlyValid(reason.into())
    }

    pub fn invalid_json(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidJson {
            field,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotValid(_) => ErrorKind::NotValid,
            Self::NotCurrentlyValid(_) => ErrorKind::NotCurrentlyValid,
            _ => ErrorKind::MalformedAppendix,
        }
    }

    /// Whether the transaction may be retried later.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::NotCurrentlyValid
    }
}

/// Result type for decode/validate operations
pub type AppendixResult<T> = Result<T, AppendixError>;

/// Failures reported by the account ledger collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Insufficient balance on {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        required: u64,
        available: u64,
    },

    #[error("Balance overflow on account {0}")]
    BalanceOverflow(AccountId),

    #[error("Ledger backend error: {0}")]
    Backend(String),
}

/// Failures reported by the pending-poll storage collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Poll {0} already stored")]
    Duplicate(TransactionId),

    #[error("Poll storage unavailable: {0}")]
    Unavailable(String),
}

/// Quorum engine errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PollError {
    /// No poll was ever registered under this id
    #[error("Pending poll not found: {0}")]
    NotFound(TransactionId),

    /// The poll reached a terminal state already
    #[error("Poll {id} already resolved as {outcome:?}")]
    AlreadyResolved {
        id: TransactionId,
        outcome: PollOutcome,
    },

    #[error("Voting on poll {id} closed at height {max_height} (current {height})")]
    VotingClosed {
        id: TransactionId,
        max_height: u32,
        height: u32,
    },

    #[error("Account {voter} is not a possible voter on poll {id}")]
    NotEligible { id: TransactionId, voter: AccountId },

    #[error("Account {voter} already voted on poll {id}")]
    DuplicateVote { id: TransactionId, voter: AccountId },

    #[error("Vote weight {weight} below threshold {threshold}")]
    BelowThreshold { weight: u64, threshold: u64 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result type for quorum engine operations
pub type PollResult<T> = Result<T, PollError>;
