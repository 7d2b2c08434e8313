//! Driving Ports (API - Inbound)
//!
//! Called by the peer request handlers, API handlers and the block applier.

use crate::domain::{
    AccountId, AppendixResult, AppendixSet, ApplyEffect, JsonObject, PollError, PollOutcome,
    PollResult, PollStatus, TransactionId,
};
use crate::ports::TransactionView;

/// Result of resolving one poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollResolution {
    pub id: TransactionId,
    pub outcome: PollOutcome,
    /// Account credited with the escrowed amount, if any
    pub credited: Option<AccountId>,
    pub amount: u64,
}

/// Everything `resolve_due` did at one height.
///
/// A poll in `failed` was reinstated as pending and is retried on the next
/// call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DueResolutions {
    pub resolved: Vec<PollResolution>,
    pub failed: Vec<(TransactionId, PollError)>,
}

impl DueResolutions {
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.failed.is_empty()
    }

    /// Whether every due poll was resolved.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Primary appendix API
///
/// Every call is synchronous. Block application drives `apply` and
/// `resolve_due` one block at a time.
pub trait AppendixApi: Send + Sync {
    /// Decode an appendix region from transaction bytes.
    fn parse_bytes(
        &self,
        flags: u32,
        bytes: &[u8],
        transaction_version: u8,
    ) -> AppendixResult<AppendixSet>;

    /// Decode every appendix present in an attachment object.
    fn parse_json(&self, json: &JsonObject) -> AppendixResult<AppendixSet>;

    /// Validate before admission into a block. Never mutates.
    fn validate(
        &self,
        transaction: &dyn TransactionView,
        appendices: &AppendixSet,
    ) -> AppendixResult<()>;

    /// Apply a confirmed transaction's appendices exactly once.
    fn apply(&self, transaction: &dyn TransactionView, appendices: &AppendixSet)
        -> Vec<ApplyEffect>;

    /// Count a vote, returning the running tally.
    fn record_vote(&self, id: TransactionId, voter: AccountId, height: u32) -> PollResult<u64>;

    /// Approve a pending poll and release the escrow to the recipient.
    fn commit(&self, id: TransactionId) -> PollResult<PollResolution>;

    /// Reject a pending poll and refund the sender.
    fn rollback(&self, id: TransactionId) -> PollResult<PollResolution>;

    /// Resolve every poll due at `height`, ascending by id. A failing poll
    /// does not stop the others; only an unreadable store is an error.
    fn resolve_due(&self, height: u32) -> PollResult<DueResolutions>;

    fn status(&self, id: TransactionId) -> PollResult<PollStatus>;
}
