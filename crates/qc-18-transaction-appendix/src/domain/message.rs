//! Plain (unencrypted) message appendix.
//!
//! Wire: `[version?][length|text flag: u32][payload]`

use super::appendix::ValidationContext;
use super::codec::{pack_length, ByteReader, ByteWriter};
use super::errors::{AppendixError, AppendixResult};
use super::json::{get_flag, get_str, JsonObject};
use super::limits::ProtocolLimits;
use super::transaction::TransactionType;
use super::version::{
    json_version, put_json_version, read_version, version_size, write_version,
    DEFAULT_APPENDIX_VERSION,
};
use crate::ports::TransactionView;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    version: u8,
    payload: Vec<u8>,
    is_text: bool,
}

impl Message {
    pub const NAME: &'static str = "Message";
    pub const JSON_KEY: &'static str = "message";

    /// Binary payload, shown as hex in JSON.
    pub fn binary(payload: Vec<u8>) -> Self {
        Self {
            version: DEFAULT_APPENDIX_VERSION,
            payload,
            is_text: false,
        }
    }

    /// UTF-8 text payload.
    pub fn text(text: &str) -> Self {
        Self {
            version: DEFAULT_APPENDIX_VERSION,
            payload: text.as_bytes().to_vec(),
            is_text: true,
        }
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_text(&self) -> bool {
        self.is_text
    }

    /// Payload as text, if this is a text message holding valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        if self.is_text {
            std::str::from_utf8(&self.payload).ok()
        } else {
            None
        }
    }

    pub fn size(&self) -> usize {
        version_size(self.version) + 4 + self.payload.len()
    }

    pub fn encode(&self, writer: &mut ByteWriter) {
        write_version(writer, self.version);
        writer.put_u32(pack_length(self.payload.len(), self.is_text));
        writer.put_bytes(&self.payload);
    }

    pub fn decode(
        reader: &mut ByteReader<'_>,
        transaction_version: u8,
        limits: &ProtocolLimits,
    ) -> AppendixResult<Self> {
        let version = read_version(reader, transaction_version)?;
        let (length, is_text) = reader.get_length("message", limits.max_message_length)?;
        let payload = reader.get_bytes(length)?.to_vec();
        Ok(Self {
            version,
            payload,
            is_text,
        })
    }

    pub fn to_json(&self, json: &mut JsonObject) {
        put_json_version(json, Self::NAME, self.version);
        let message = if self.is_text {
            String::from_utf8_lossy(&self.payload).into_owned()
        } else {
            hex::encode(&self.payload)
        };
        json.insert(Self::JSON_KEY.to_string(), Value::String(message));
        json.insert("messageIsText".to_string(), Value::Bool(self.is_text));
    }

    /// `Ok(None)` when the attachment has no `"message"` key.
    pub fn from_json(json: &JsonObject) -> AppendixResult<Option<Self>> {
        if json.get(Self::JSON_KEY).map_or(true, Value::is_null) {
            return Ok(None);
        }
        let version = json_version(json, Self::NAME)?;
        let is_text = get_flag(json, "messageIsText");
        let message = get_str(json, Self::JSON_KEY)?;
        let payload = if is_text {
            message.as_bytes().to_vec()
        } else {
            hex::decode(message).map_err(|e| AppendixError::invalid_json("message", e.to_string()))?
        };
        Ok(Some(Self {
            version,
            payload,
            is_text,
        }))
    }

    pub fn validate(
        &self,
        transaction: &dyn TransactionView,
        ctx: &ValidationContext<'_>,
    ) -> AppendixResult<()> {
        let legacy = transaction.version() == 0;
        if self.is_text && legacy {
            return Err(AppendixError::not_valid("Text messages not yet enabled"));
        }
        if legacy && transaction.transaction_type() != TransactionType::ArbitraryMessage {
            return Err(AppendixError::not_valid(
                "Message attachments not enabled for version 0 transactions",
            ));
        }
        if self.payload.len() > ctx.limits.max_message_length {
            return Err(AppendixError::not_valid(format!(
                "Invalid arbitrary message length: {}",
                self.payload.len()
            )));
        }
        if self.is_text && self.as_text().is_none() {
            return Err(AppendixError::not_valid("Message is not UTF-8 text"));
        }
        Ok(())
    }
}
