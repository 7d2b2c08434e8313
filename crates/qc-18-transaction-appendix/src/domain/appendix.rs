//! # Appendix Sum Type
//!
//! Closed set of appendix kinds. Every operation dispatches by `match`:
//!
//! | Operation | Message | Encrypted* | PublicKeyAnnouncement | TwoPhased |
//! |-----------|---------|------------|-----------------------|-----------|
//! | apply | none | none | bind recipient key | register pending poll |
//!
//! Validation never mutates. Apply always runs exactly once per confirmed
//! transaction and never fails the block.

use super::codec::{ByteReader, ByteWriter};
use super::encrypted::{EncryptToSelfMessage, EncryptedMessage};
use super::errors::AppendixResult;
use super::json::JsonObject;
use super::limits::ProtocolLimits;
use super::message::Message;
use super::phasing::TwoPhased;
use super::public_key::PublicKeyAnnouncement;
use super::transaction::{AccountId, TransactionId};
use super::version::verify_version;
use crate::ports::{AccountLedger, PendingPollStore, TransactionView};

/// Appendix kinds in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AppendixKind {
    Message,
    EncryptedMessage,
    PublicKeyAnnouncement,
    EncryptToSelfMessage,
    TwoPhased,
}

impl AppendixKind {
    /// All kinds in the order they appear on the wire.
    pub const ALL: [AppendixKind; 5] = [
        Self::Message,
        Self::EncryptedMessage,
        Self::PublicKeyAnnouncement,
        Self::EncryptToSelfMessage,
        Self::TwoPhased,
    ];

    /// Presence bit in a transaction's appendix flags.
    pub fn flag(self) -> u32 {
        match self {
            Self::Message => 0x01,
            Self::EncryptedMessage => 0x02,
            Self::PublicKeyAnnouncement => 0x04,
            Self::EncryptToSelfMessage => 0x08,
            Self::TwoPhased => 0x10,
        }
    }

    /// Canonical name, used in the `"version.<name>"` JSON key.
    pub fn name(self) -> &'static str {
        match self {
            Self::Message => Message::NAME,
            Self::EncryptedMessage => EncryptedMessage::NAME,
            Self::PublicKeyAnnouncement => PublicKeyAnnouncement::NAME,
            Self::EncryptToSelfMessage => EncryptToSelfMessage::NAME,
            Self::TwoPhased => TwoPhased::NAME,
        }
    }

    /// JSON key whose presence marks this kind.
    pub fn json_key(self) -> &'static str {
        match self {
            Self::Message => Message::JSON_KEY,
            Self::EncryptedMessage => EncryptedMessage::JSON_KEY,
            Self::PublicKeyAnnouncement => PublicKeyAnnouncement::JSON_KEY,
            Self::EncryptToSelfMessage => EncryptToSelfMessage::JSON_KEY,
            Self::TwoPhased => TwoPhased::JSON_KEY,
        }
    }
}

/// Read-only collaborators for validation.
pub struct ValidationContext<'a> {
    pub ledger: &'a dyn AccountLedger,
    pub limits: ProtocolLimits,
}

impl<'a> ValidationContext<'a> {
    pub fn new(ledger: &'a dyn AccountLedger, limits: ProtocolLimits) -> Self {
        Self { ledger, limits }
    }
}

/// Mutable collaborators for apply, threaded through block application.
pub struct ApplyContext<'a> {
    pub ledger: &'a dyn AccountLedger,
    pub polls: &'a dyn PendingPollStore,
}

impl<'a> ApplyContext<'a> {
    pub fn new(ledger: &'a dyn AccountLedger, polls: &'a dyn PendingPollStore) -> Self {
        Self { ledger, polls }
    }
}

/// What an apply step did to the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyEffect {
    None,
    PublicKeyBound { account: AccountId },
    PollRegistered { id: TransactionId },
    /// Poll could not be stored, logged as an operational alarm
    PollPersistFailed { id: TransactionId },
    /// Ledger rejected the call, logged as an operational alarm
    LedgerFault,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Appendix {
    Message(Message),
    EncryptedMessage(EncryptedMessage),
    PublicKeyAnnouncement(PublicKeyAnnouncement),
    EncryptToSelfMessage(EncryptToSelfMessage),
    TwoPhased(TwoPhased),
}

impl Appendix {
    pub fn kind(&self) -> AppendixKind {
        match self {
            Self::Message(_) => AppendixKind::Message,
            Self::EncryptedMessage(_) => AppendixKind::EncryptedMessage,
            Self::PublicKeyAnnouncement(_) => AppendixKind::PublicKeyAnnouncement,
            Self::EncryptToSelfMessage(_) => AppendixKind::EncryptToSelfMessage,
            Self::TwoPhased(_) => AppendixKind::TwoPhased,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn version(&self) -> u8 {
        match self {
            Self::Message(a) => a.version(),
            Self::EncryptedMessage(a) => a.version(),
            Self::PublicKeyAnnouncement(a) => a.version(),
            Self::EncryptToSelfMessage(a) => a.version(),
            Self::TwoPhased(a) => a.version(),
        }
    }

    /// Encoded size in bytes, version prefix included.
    pub fn size(&self) -> usize {
        match self {
            Self::Message(a) => a.size(),
            Self::EncryptedMessage(a) => a.size(),
            Self::PublicKeyAnnouncement(a) => a.size(),
            Self::EncryptToSelfMessage(a) => a.size(),
            Self::TwoPhased(a) => a.size(),
        }
    }

    pub fn encode(&self, writer: &mut ByteWriter) {
        match self {
            Self::Message(a) => a.encode(writer),
            Self::EncryptedMessage(a) => a.encode(writer),
            Self::PublicKeyAnnouncement(a) => a.encode(writer),
            Self::EncryptToSelfMessage(a) => a.encode(writer),
            Self::TwoPhased(a) => a.encode(writer),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.size());
        self.encode(&mut writer);
        writer.into_inner()
    }

    pub fn decode(
        kind: AppendixKind,
        reader: &mut ByteReader<'_>,
        transaction_version: u8,
        limits: &ProtocolLimits,
    ) -> AppendixResult<Self> {
        Ok(match kind {
            AppendixKind::Message => Message::decode(reader, transaction_version, limits)?.into(),
            AppendixKind::EncryptedMessage => {
                EncryptedMessage::decode(reader, transaction_version, limits)?.into()
            }
            AppendixKind::PublicKeyAnnouncement => {
                PublicKeyAnnouncement::decode(reader, transaction_version)?.into()
            }
            AppendixKind::EncryptToSelfMessage => {
                EncryptToSelfMessage::decode(reader, transaction_version, limits)?.into()
            }
            AppendixKind::TwoPhased => {
                TwoPhased::decode(reader, transaction_version, limits)?.into()
            }
        })
    }

    /// Write this appendix's fields into a shared attachment object.
    pub fn put_json(&self, json: &mut JsonObject) {
        match self {
            Self::Message(a) => a.to_json(json),
            Self::EncryptedMessage(a) => a.to_json(json),
            Self::PublicKeyAnnouncement(a) => a.to_json(json),
            Self::EncryptToSelfMessage(a) => a.to_json(json),
            Self::TwoPhased(a) => a.to_json(json),
        }
    }

    pub fn to_json(&self) -> JsonObject {
        let mut json = JsonObject::new();
        self.put_json(&mut json);
        json
    }

    /// Parse the given kind from an attachment object. `Ok(None)` means the
    /// attachment does not carry it.
    pub fn from_json(kind: AppendixKind, json: &JsonObject) -> AppendixResult<Option<Self>> {
        Ok(match kind {
            AppendixKind::Message => Message::from_json(json)?.map(Into::into),
            AppendixKind::EncryptedMessage => EncryptedMessage::from_json(json)?.map(Into::into),
            AppendixKind::PublicKeyAnnouncement => {
                PublicKeyAnnouncement::from_json(json)?.map(Into::into)
            }
            AppendixKind::EncryptToSelfMessage => {
                EncryptToSelfMessage::from_json(json)?.map(Into::into)
            }
            AppendixKind::TwoPhased => TwoPhased::from_json(json)?.map(Into::into),
        })
    }

    pub fn verify_version(&self, transaction_version: u8) -> bool {
        verify_version(self.version(), transaction_version)
    }

    pub fn validate(
        &self,
        transaction: &dyn TransactionView,
        ctx: &ValidationContext<'_>,
    ) -> AppendixResult<()> {
        match self {
            Self::Message(a) => a.validate(transaction, ctx),
            Self::EncryptedMessage(a) => a.validate(transaction, ctx),
            Self::PublicKeyAnnouncement(a) => a.validate(transaction, ctx),
            Self::EncryptToSelfMessage(a) => a.validate(transaction, ctx),
            Self::TwoPhased(a) => a.validate(transaction, ctx),
        }
    }

    pub fn apply(&self, transaction: &dyn TransactionView, ctx: &ApplyContext<'_>) -> ApplyEffect {
        match self {
            Self::Message(_) | Self::EncryptedMessage(_) | Self::EncryptToSelfMessage(_) => {
                ApplyEffect::None
            }
            Self::PublicKeyAnnouncement(a) => a.apply(transaction, ctx),
            Self::TwoPhased(a) => a.apply(transaction, ctx),
        }
    }
}

impl From<Message> for Appendix {
    fn from(a: Message) -> Self {
        Self::Message(a)
    }
}

impl From<EncryptedMessage> for Appendix {
    fn from(a: EncryptedMessage) -> Self {
        Self::EncryptedMessage(a)
    }
}

impl From<PublicKeyAnnouncement> for Appendix {
    fn from(a: PublicKeyAnnouncement) -> Self {
        Self::PublicKeyAnnouncement(a)
    }
}

impl From<EncryptToSelfMessage> for Appendix {
    fn from(a: EncryptToSelfMessage) -> Self {
        Self::EncryptToSelfMessage(a)
    }
}

impl From<TwoPhased> for Appendix {
    fn from(a: TwoPhased) -> Self {
        Self::TwoPhased(a)
    }
}
