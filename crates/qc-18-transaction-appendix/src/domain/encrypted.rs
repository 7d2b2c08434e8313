//! Encrypted message appendices.
//!
//! `EncryptedMessage` (to the recipient) and `EncryptToSelfMessage` (to the
//! sender) share one body layout:
//!
//! ```text
//! [version?][length|text flag: u32][ciphertext][nonce: 32 if length > 0, else none]
//! ```
//!
//! They differ in JSON wrapper key and in the recipient requirement.

use super::appendix::ValidationContext;
use super::codec::{pack_length, ByteReader, ByteWriter};
use super::errors::{AppendixError, AppendixResult};
use super::json::{get_flag, get_hex, get_object, JsonObject};
use super::limits::{ProtocolLimits, NONCE_LENGTH};
use super::version::{
    json_version, put_json_version, read_version, version_size, write_version,
    DEFAULT_APPENDIX_VERSION,
};
use crate::ports::TransactionView;
use serde_json::Value;

/// Ciphertext plus the nonce it was sealed with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncryptedData {
    data: Vec<u8>,
    nonce: Vec<u8>,
}

impl EncryptedData {
    pub fn new(data: Vec<u8>, nonce: Vec<u8>) -> Self {
        Self { data, nonce }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn size(&self) -> usize {
        self.data.len() + self.nonce.len()
    }

    /// Nonce is 32 bytes for non-empty ciphertext and absent otherwise.
    pub fn has_valid_nonce(&self) -> bool {
        if self.data.is_empty() {
            self.nonce.is_empty()
        } else {
            self.nonce.len() == NONCE_LENGTH
        }
    }

    fn read(reader: &mut ByteReader<'_>, length: usize) -> AppendixResult<Self> {
        if length == 0 {
            return Ok(Self::default());
        }
        let data = reader.get_bytes(length)?.to_vec();
        let nonce = reader.get_bytes(NONCE_LENGTH)?.to_vec();
        Ok(Self { data, nonce })
    }
}

/// Body shared by both encrypted variants.
#[derive(Clone, Debug, PartialEq, Eq)]
struct EncryptedBody {
    version: u8,
    encrypted_data: EncryptedData,
    is_text: bool,
}

impl EncryptedBody {
    fn new(encrypted_data: EncryptedData, is_text: bool) -> Self {
        Self {
            version: DEFAULT_APPENDIX_VERSION,
            encrypted_data,
            is_text,
        }
    }

    fn size(&self) -> usize {
        version_size(self.version) + 4 + self.encrypted_data.size()
    }

    fn encode(&self, writer: &mut ByteWriter) {
        write_version(writer, self.version);
        writer.put_u32(pack_length(self.encrypted_data.data.len(), self.is_text));
        writer.put_bytes(&self.encrypted_data.data);
        writer.put_bytes(&self.encrypted_data.nonce);
    }

    fn decode(
        reader: &mut ByteReader<'_>,
        transaction_version: u8,
        limits: &ProtocolLimits,
    ) -> AppendixResult<Self> {
        let version = read_version(reader, transaction_version)?;
        let (length, is_text) =
            reader.get_length("encrypted message", limits.max_encrypted_message_length)?;
        let encrypted_data = EncryptedData::read(reader, length)?;
        Ok(Self {
            version,
            encrypted_data,
            is_text,
        })
    }

    fn to_json(&self, json: &mut JsonObject, name: &str, key: &str) {
        put_json_version(json, name, self.version);
        let mut body = JsonObject::new();
        body.insert("data".to_string(), Value::String(hex::encode(&self.encrypted_data.data)));
        body.insert("nonce".to_string(), Value::String(hex::encode(&self.encrypted_data.nonce)));
        body.insert("isText".to_string(), Value::Bool(self.is_text));
        json.insert(key.to_string(), Value::Object(body));
    }

    fn from_json(json: &JsonObject, name: &str, key: &'static str) -> AppendixResult<Option<Self>> {
        if json.get(key).map_or(true, Value::is_null) {
            return Ok(None);
        }
        let version = json_version(json, name)?;
        let body = get_object(json, key)?;
        let encrypted_data = EncryptedData::new(get_hex(body, "data")?, get_hex(body, "nonce")?);
        Ok(Some(Self {
            version,
            encrypted_data,
            is_text: get_flag(body, "isText"),
        }))
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> AppendixResult<()> {
        if self.encrypted_data.data.len() > ctx.limits.max_encrypted_message_length {
            return Err(AppendixError::not_valid("Max encrypted message length exceeded"));
        }
        if !self.encrypted_data.has_valid_nonce() {
            return Err(AppendixError::not_valid(format!(
                "Invalid nonce length {}",
                self.encrypted_data.nonce.len()
            )));
        }
        Ok(())
    }
}

macro_rules! encrypted_accessors {
    () => {
        pub fn with_version(mut self, version: u8) -> Self {
            self.0.version = version;
            self
        }

        pub fn version(&self) -> u8 {
            self.0.version
        }

        pub fn encrypted_data(&self) -> &EncryptedData {
            &self.0.encrypted_data
        }

        pub fn is_text(&self) -> bool {
            self.0.is_text
        }

        pub fn size(&self) -> usize {
            self.0.size()
        }

        pub fn encode(&self, writer: &mut ByteWriter) {
            self.0.encode(writer)
        }

        pub fn decode(
            reader: &mut ByteReader<'_>,
            transaction_version: u8,
            limits: &ProtocolLimits,
        ) -> AppendixResult<Self> {
            EncryptedBody::decode(reader, transaction_version, limits).map(Self)
        }

        pub fn to_json(&self, json: &mut JsonObject) {
            self.0.to_json(json, Self::NAME, Self::JSON_KEY)
        }

        /// `Ok(None)` when the wrapper key is absent.
        pub fn from_json(json: &JsonObject) -> AppendixResult<Option<Self>> {
            Ok(EncryptedBody::from_json(json, Self::NAME, Self::JSON_KEY)?.map(Self))
        }
    };
}

/// Message encrypted to the transaction recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedMessage(EncryptedBody);

impl EncryptedMessage {
    pub const NAME: &'static str = "EncryptedMessage";
    pub const JSON_KEY: &'static str = "encryptedMessage";

    pub fn new(encrypted_data: EncryptedData, is_text: bool) -> Self {
        Self(EncryptedBody::new(encrypted_data, is_text))
    }

    encrypted_accessors!();

    pub fn validate(
        &self,
        transaction: &dyn TransactionView,
        ctx: &ValidationContext<'_>,
    ) -> AppendixResult<()> {
        self.0.validate(ctx)?;
        if !transaction.has_recipient() {
            return Err(AppendixError::not_valid(
                "Encrypted messages cannot be attached to transactions with no recipient",
            ));
        }
        if transaction.version() == 0 {
            return Err(AppendixError::not_valid(
                "Encrypted message attachments not enabled for version 0 transactions",
            ));
        }
        Ok(())
    }
}

/// Message the sender encrypted to their own key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptToSelfMessage(EncryptedBody);

impl EncryptToSelfMessage {
    pub const NAME: &'static str = "EncryptToSelfMessage";
    pub const JSON_KEY: &'static str = "encryptToSelfMessage";

    pub fn new(encrypted_data: EncryptedData, is_text: bool) -> Self {
        Self(EncryptedBody::new(encrypted_data, is_text))
    }

    encrypted_accessors!();

    pub fn validate(
        &self,
        transaction: &dyn TransactionView,
        ctx: &ValidationContext<'_>,
    ) -> AppendixResult<()> {
        self.0.validate(ctx)?;
        if transaction.version() == 0 {
            return Err(AppendixError::not_valid(
                "Encrypt-to-self message attachments not enabled for version 0 transactions",
            ));
        }
        Ok(())
    }
}
