//! Appendix region of a transaction.
//!
//! A transaction carries at most one appendix per kind. Presence is
//! signalled by a flag word; appendices follow each other on the wire in
//! [`AppendixKind::ALL`] order.

use super::appendix::{Appendix, AppendixKind, ApplyContext, ApplyEffect, ValidationContext};
use super::codec::{ByteReader, ByteWriter};
use super::errors::{AppendixError, AppendixResult};
use super::json::JsonObject;
use super::limits::ProtocolLimits;
use super::message::Message;
use super::phasing::TwoPhased;
use crate::ports::TransactionView;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppendixSet {
    appendices: BTreeMap<AppendixKind, Appendix>,
}

impl AppendixSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`AppendixSet::insert`].
    pub fn with(mut self, appendix: impl Into<Appendix>) -> Self {
        self.insert(appendix.into());
        self
    }

    /// Insert an appendix, returning the one of the same kind it replaced.
    pub fn insert(&mut self, appendix: Appendix) -> Option<Appendix> {
        self.appendices.insert(appendix.kind(), appendix)
    }

    pub fn get(&self, kind: AppendixKind) -> Option<&Appendix> {
        self.appendices.get(&kind)
    }

    pub fn message(&self) -> Option<&Message> {
        match self.get(AppendixKind::Message) {
            Some(Appendix::Message(m)) => Some(m),
            _ => None,
        }
    }

    pub fn two_phased(&self) -> Option<&TwoPhased> {
        match self.get(AppendixKind::TwoPhased) {
            Some(Appendix::TwoPhased(p)) => Some(p),
            _ => None,
        }
    }

    /// Appendices in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &Appendix> {
        self.appendices.values()
    }

    pub fn len(&self) -> usize {
        self.appendices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appendices.is_empty()
    }

    pub fn flags(&self) -> u32 {
        self.appendices.keys().fold(0, |flags, kind| flags | kind.flag())
    }

    pub fn size(&self) -> usize {
        self.iter().map(Appendix::size).sum()
    }

    pub fn encode(&self, writer: &mut ByteWriter) {
        for appendix in self.iter() {
            appendix.encode(writer);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.size());
        self.encode(&mut writer);
        writer.into_inner()
    }

    /// Read the appendices named by `flags` from a larger transaction stream.
    pub fn decode_from(
        flags: u32,
        reader: &mut ByteReader<'_>,
        transaction_version: u8,
        limits: &ProtocolLimits,
    ) -> AppendixResult<Self> {
        let known = AppendixKind::ALL.iter().fold(0, |acc, k| acc | k.flag());
        if flags & !known != 0 {
            return Err(AppendixError::UnknownFlags(flags & !known));
        }
        let mut set = Self::new();
        for kind in AppendixKind::ALL {
            if flags & kind.flag() != 0 {
                set.insert(Appendix::decode(kind, reader, transaction_version, limits)?);
            }
        }
        Ok(set)
    }

    /// Decode an appendix region that must be consumed exactly.
    pub fn decode(
        flags: u32,
        bytes: &[u8],
        transaction_version: u8,
        limits: &ProtocolLimits,
    ) -> AppendixResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let set = Self::decode_from(flags, &mut reader, transaction_version, limits)?;
        if reader.remaining() > 0 {
            return Err(AppendixError::TrailingBytes(reader.remaining()));
        }
        Ok(set)
    }

    /// All appendices merged into one attachment object.
    pub fn to_json(&self) -> JsonObject {
        let mut json = JsonObject::new();
        for appendix in self.iter() {
            appendix.put_json(&mut json);
        }
        json
    }

    /// Detect every kind present in an attachment object.
    pub fn from_json(json: &JsonObject) -> AppendixResult<Self> {
        let mut set = Self::new();
        for kind in AppendixKind::ALL {
            if let Some(appendix) = Appendix::from_json(kind, json)? {
                set.insert(appendix);
            }
        }
        Ok(set)
    }

    /// Check version consistency, then each appendix in wire order.
    pub fn validate(
        &self,
        transaction: &dyn TransactionView,
        ctx: &ValidationContext<'_>,
    ) -> AppendixResult<()> {
        for appendix in self.iter() {
            if !appendix.verify_version(transaction.version()) {
                crate::metrics::record_appendix_rejected(appendix.name());
                return Err(AppendixError::not_valid(format!(
                    "Invalid attachment version {} for {} on transaction version {}",
                    appendix.version(),
                    appendix.name(),
                    transaction.version()
                )));
            }
        }
        for appendix in self.iter() {
            if let Err(e) = appendix.validate(transaction, ctx) {
                tracing::debug!(
                    "[qc-18] {} rejected on transaction {}: {}",
                    appendix.name(),
                    transaction.id(),
                    e
                );
                crate::metrics::record_appendix_rejected(appendix.name());
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn apply(
        &self,
        transaction: &dyn TransactionView,
        ctx: &ApplyContext<'_>,
    ) -> Vec<ApplyEffect> {
        self.iter()
            .map(|appendix| appendix.apply(transaction, ctx))
            .collect()
    }
}

impl FromIterator<Appendix> for AppendixSet {
    fn from_iter<I: IntoIterator<Item = Appendix>>(iter: I) -> Self {
        let mut set = Self::new();
        for appendix in iter {
            set.insert(appendix);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedger;
    use crate::domain::{
        account_id, EncryptToSelfMessage, EncryptedData, EncryptedMessage, PublicKeyAnnouncement,
        TransactionHeader, TransactionType, VotingModel,
    };

    fn full_set() -> AppendixSet {
        AppendixSet::new()
            .with(TwoPhased::new(50, VotingModel::Account, 1, 1, vec![4]))
            .with(EncryptToSelfMessage::new(EncryptedData::new(vec![1; 4], vec![2; 32]), false))
            .with(PublicKeyAnnouncement::new([9; 32]))
            .with(EncryptedMessage::new(EncryptedData::new(vec![3; 8], vec![4; 32]), true))
            .with(Message::text("memo"))
    }

    #[test]
    fn test_wire_order_independent_of_insert_order() {
        let set = full_set();
        let kinds: Vec<_> = set.iter().map(Appendix::kind).collect();
        assert_eq!(kinds, AppendixKind::ALL.to_vec());
        assert_eq!(set.flags(), 0x1F);

        let bytes = set.to_bytes();
        assert_eq!(bytes.len(), set.size());
        // Message comes first: version byte then the text length field
        assert_eq!(bytes[0], 1);
        assert_eq!(u32::from_le_bytes(bytes[1..5].try_into().unwrap()), 4 | 0x8000_0000);
    }

    #[test]
    fn test_binary_round_trip() {
        let set = full_set();
        let limits = ProtocolLimits::default();
        let decoded = AppendixSet::decode(set.flags(), &set.to_bytes(), 1, &limits).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_decode_rejects_unknown_flags_and_trailing_bytes() {
        let limits = ProtocolLimits::default();
        assert_eq!(
            AppendixSet::decode(0x20, &[], 1, &limits).unwrap_err(),
            AppendixError::UnknownFlags(0x20)
        );

        let set = AppendixSet::new().with(Message::binary(vec![1]));
        let mut bytes = set.to_bytes();
        bytes.push(0);
        assert_eq!(
            AppendixSet::decode(set.flags(), &bytes, 1, &limits).unwrap_err(),
            AppendixError::TrailingBytes(1)
        );
    }

    #[test]
    fn test_json_round_trip() {
        let set = full_set();
        let json = set.to_json();
        assert_eq!(AppendixSet::from_json(&json).unwrap(), set);
    }

    #[test]
    fn test_json_presence_is_independent() {
        let set = AppendixSet::new().with(PublicKeyAnnouncement::new([9; 32]));
        let parsed = AppendixSet::from_json(&set.to_json()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed.message().is_none());
        assert!(parsed.two_phased().is_none());
    }

    #[test]
    fn test_validate_rejects_version_mismatch() {
        let ledger = InMemoryLedger::new();
        let ctx = ValidationContext::new(&ledger, ProtocolLimits::default());
        let legacy =
            TransactionHeader::new(1, TransactionType::ArbitraryMessage, 2).with_version(0);

        // Constructed appendices default to version 1
        let set = AppendixSet::new().with(Message::binary(vec![1]));
        let err = set.validate(&legacy, &ctx).unwrap_err();
        assert!(err.to_string().contains("Invalid attachment version"));

        let set = AppendixSet::new().with(Message::binary(vec![1]).with_version(0));
        assert!(set.validate(&legacy, &ctx).is_ok());
    }

    #[test]
    fn test_validate_stops_at_first_failure() {
        let ledger = InMemoryLedger::new();
        let ctx = ValidationContext::new(&ledger, ProtocolLimits::default());
        let key = [9u8; 32];
        let tx = TransactionHeader::new(1, TransactionType::OrdinaryPayment, 2)
            .with_recipient(account_id(&key));

        let set = AppendixSet::new()
            .with(PublicKeyAnnouncement::new(key))
            .with(TwoPhased::new(50, VotingModel::Account, 1, 1, (0..17).collect()));
        let err = set.validate(&tx, &ctx).unwrap_err();
        assert_eq!(err, AppendixError::not_valid("Possible voters list is too big"));
    }
}
