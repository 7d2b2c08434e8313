//! Transaction-side types the appendices are validated and applied against.

use super::limits::PUBLIC_KEY_LENGTH;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ledger account identifier.
pub type AccountId = u64;

/// Transaction identifier, also the key of a pending poll.
pub type TransactionId = u64;

/// Asset identifier for asset-weighted polls.
pub type AssetId = u64;

/// A 32-byte account public key.
pub type PublicKey = [u8; PUBLIC_KEY_LENGTH];

/// Derive the account id bound to a public key.
///
/// First 8 bytes of SHA-256(key), little-endian.
pub fn account_id(public_key: &[u8]) -> AccountId {
    let digest = Sha256::digest(public_key);
    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(id)
}

/// Transaction types relevant to appendix validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    OrdinaryPayment,
    ArbitraryMessage,
    AliasAssignment,
    AccountInfo,
    AssetTransfer,
    VoteCasting,
}

impl TransactionType {
    /// Whether transactions of this type name a recipient account.
    pub fn has_recipient(&self) -> bool {
        matches!(
            self,
            Self::OrdinaryPayment | Self::ArbitraryMessage | Self::AssetTransfer
        )
    }
}

/// Plain transaction header.
///
/// Implements [`TransactionView`](crate::ports::TransactionView) for
/// callers that do not have their own transaction type at hand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    pub id: TransactionId,
    pub version: u8,
    pub transaction_type: TransactionType,
    pub sender_id: AccountId,
    pub recipient_id: Option<AccountId>,
    pub amount: u64,
    pub height: u32,
}

impl TransactionHeader {
    pub fn new(id: TransactionId, transaction_type: TransactionType, sender_id: AccountId) -> Self {
        Self {
            id,
            version: 1,
            transaction_type,
            sender_id,
            recipient_id: None,
            amount: 0,
            height: 0,
        }
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn with_recipient(mut self, recipient_id: AccountId) -> Self {
        self.recipient_id = Some(recipient_id);
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }
}
