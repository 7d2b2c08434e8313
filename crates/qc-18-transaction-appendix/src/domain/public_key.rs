//! Recipient public key announcement.
//!
//! Wire: `[version?][public key: 32]`

use super::appendix::{ApplyContext, ApplyEffect, ValidationContext};
use super::codec::{ByteReader, ByteWriter};
use super::errors::{AppendixError, AppendixResult};
use super::json::{get_hex, JsonObject};
use super::limits::PUBLIC_KEY_LENGTH;
use super::transaction::{account_id, PublicKey};
use super::version::{
    json_version, put_json_version, read_version, version_size, write_version,
    DEFAULT_APPENDIX_VERSION,
};
use crate::ports::TransactionView;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyAnnouncement {
    version: u8,
    public_key: Vec<u8>,
}

impl PublicKeyAnnouncement {
    pub const NAME: &'static str = "PublicKeyAnnouncement";
    pub const JSON_KEY: &'static str = "recipientPublicKey";

    pub fn new(public_key: PublicKey) -> Self {
        Self {
            version: DEFAULT_APPENDIX_VERSION,
            public_key: public_key.to_vec(),
        }
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    fn key(&self) -> Option<PublicKey> {
        self.public_key.as_slice().try_into().ok()
    }

    pub fn size(&self) -> usize {
        version_size(self.version) + self.public_key.len()
    }

    pub fn encode(&self, writer: &mut ByteWriter) {
        write_version(writer, self.version);
        writer.put_bytes(&self.public_key);
    }

    pub fn decode(reader: &mut ByteReader<'_>, transaction_version: u8) -> AppendixResult<Self> {
        let version = read_version(reader, transaction_version)?;
        let public_key = reader.get_bytes(PUBLIC_KEY_LENGTH)?.to_vec();
        Ok(Self { version, public_key })
    }

    pub fn to_json(&self, json: &mut JsonObject) {
        put_json_version(json, Self::NAME, self.version);
        json.insert(
            Self::JSON_KEY.to_string(),
            Value::String(hex::encode(&self.public_key)),
        );
    }

    /// `Ok(None)` when the attachment has no `"recipientPublicKey"`.
    pub fn from_json(json: &JsonObject) -> AppendixResult<Option<Self>> {
        if json.get(Self::JSON_KEY).map_or(true, Value::is_null) {
            return Ok(None);
        }
        Ok(Some(Self {
            version: json_version(json, Self::NAME)?,
            public_key: get_hex(json, Self::JSON_KEY)?,
        }))
    }

    pub fn validate(
        &self,
        transaction: &dyn TransactionView,
        ctx: &ValidationContext<'_>,
    ) -> AppendixResult<()> {
        if !transaction.has_recipient() {
            return Err(AppendixError::not_valid(
                "PublicKeyAnnouncement cannot be attached to transactions with no recipient",
            ));
        }
        let Some(key) = self.key() else {
            return Err(AppendixError::not_valid(format!(
                "Invalid recipient public key length: {}",
                hex::encode(&self.public_key)
            )));
        };
        let recipient = transaction.recipient_id();
        if recipient != Some(account_id(&key)) {
            return Err(AppendixError::not_valid(
                "Announced public key does not match recipient accountId",
            ));
        }
        if transaction.version() == 0 {
            return Err(AppendixError::not_valid(
                "Public key announcements not enabled for version 0 transactions",
            ));
        }
        if let Some(recipient) = recipient {
            let bound = ctx
                .ledger
                .public_key(recipient)
                .map_err(|e| AppendixError::not_currently_valid(e.to_string()))?;
            if matches!(bound, Some(existing) if existing != key) {
                return Err(AppendixError::not_currently_valid(
                    "A different public key for this account has already been announced",
                ));
            }
        }
        Ok(())
    }

    /// Bind the key to the recipient unless a different key is bound.
    pub fn apply(&self, transaction: &dyn TransactionView, ctx: &ApplyContext<'_>) -> ApplyEffect {
        let (Some(recipient), Some(key)) = (transaction.recipient_id(), self.key()) else {
            return ApplyEffect::None;
        };
        match ctx.ledger.bind_public_key(recipient, &key, transaction.height()) {
            Ok(true) => {
                tracing::debug!(
                    "[qc-18] Bound public key to account {} at height {}",
                    recipient,
                    transaction.height()
                );
                ApplyEffect::PublicKeyBound { account: recipient }
            }
            Ok(false) => {
                tracing::warn!(
                    "[qc-18] Account {} has a different public key, ignoring announcement in tx {}",
                    recipient,
                    transaction.id()
                );
                ApplyEffect::None
            }
            Err(e) => {
                tracing::error!(
                    "[qc-18] Failed to bind public key for account {} (tx {}): {}",
                    recipient,
                    transaction.id(),
                    e
                );
                ApplyEffect::LedgerFault
            }
        }
    }
}
