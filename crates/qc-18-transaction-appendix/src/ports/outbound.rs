//! Driven Ports (SPI - Outbound Dependencies)
//!
//! The narrow surface this subsystem calls into. Block application is
//! sequential, so implementations only need per-call atomicity.

use crate::domain::{
    AccountId, AssetId, LedgerError, PendingPoll, PollOutcome, PublicKey, StorageError,
    TransactionHeader, TransactionId, TransactionType,
};

/// Read access to the transaction owning an appendix.
pub trait TransactionView {
    fn id(&self) -> TransactionId;

    /// 0 for legacy transactions.
    fn version(&self) -> u8;

    fn transaction_type(&self) -> TransactionType;

    fn sender_id(&self) -> AccountId;

    fn recipient_id(&self) -> Option<AccountId>;

    fn amount(&self) -> u64;

    /// Height of the block the transaction was confirmed in.
    fn height(&self) -> u32;

    fn has_recipient(&self) -> bool {
        self.transaction_type().has_recipient()
    }
}

impl TransactionView for TransactionHeader {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    fn sender_id(&self) -> AccountId {
        self.sender_id
    }

    fn recipient_id(&self) -> Option<AccountId> {
        self.recipient_id
    }

    fn amount(&self) -> u64 {
        self.amount
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Account ledger operations issued by appendix apply and poll resolution.
pub trait AccountLedger: Send + Sync {
    fn balance(&self, account: AccountId) -> Result<u64, LedgerError>;

    fn asset_balance(&self, account: AccountId, asset: AssetId) -> Result<u64, LedgerError>;

    /// Add to a balance, creating the account if needed.
    fn credit(&self, account: AccountId, amount: u64) -> Result<(), LedgerError>;

    fn debit(&self, account: AccountId, amount: u64) -> Result<(), LedgerError>;

    /// Key bound to the account, if any.
    fn public_key(&self, account: AccountId) -> Result<Option<PublicKey>, LedgerError>;

    /// Bind `key` at `height` if the account has no key or already has
    /// this key. Returns `false` when a different key is bound.
    fn bind_public_key(
        &self,
        account: AccountId,
        key: &PublicKey,
        height: u32,
    ) -> Result<bool, LedgerError>;
}

/// Persistent storage of pending polls, keyed by transaction id.
pub trait PendingPollStore: Send + Sync {
    /// Create a poll. Fails with `StorageError::Duplicate` if one exists.
    fn save(&self, poll: PendingPoll) -> Result<(), StorageError>;

    /// Replace a pending poll (votes recorded).
    fn update(&self, poll: &PendingPoll) -> Result<(), StorageError>;

    fn get(&self, id: TransactionId) -> Result<Option<PendingPoll>, StorageError>;

    fn exists(&self, id: TransactionId) -> Result<bool, StorageError> {
        Ok(self.get(id)?.is_some())
    }

    /// Remove a pending poll and record its outcome.
    fn retire(
        &self,
        id: TransactionId,
        outcome: PollOutcome,
    ) -> Result<Option<PendingPoll>, StorageError>;

    /// Undo `retire`: put the poll back to pending and forget its outcome.
    fn reinstate(&self, poll: PendingPoll) -> Result<(), StorageError>;

    /// Outcome of a retired poll.
    fn outcome(&self, id: TransactionId) -> Result<Option<PollOutcome>, StorageError>;

    /// All pending polls, ascending by id.
    fn pending(&self) -> Result<Vec<PendingPoll>, StorageError>;
}
