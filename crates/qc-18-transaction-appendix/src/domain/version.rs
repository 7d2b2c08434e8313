//! # Version Negotiation
//!
//! Decides whether an appendix carries an explicit version byte.
//!
//! | Source | Version |
//! |--------|---------|
//! | bytes, legacy transaction (version 0) | no byte on the wire, forced to 0 |
//! | bytes, modern transaction | one byte on the wire, must be non-zero |
//! | JSON | optional `"version.<Name>"`, absent means 0 |
//! | constructed in code | [`DEFAULT_APPENDIX_VERSION`] unless set |

use super::codec::{ByteReader, ByteWriter};
use super::errors::{AppendixError, AppendixResult};
use super::json::JsonObject;
use serde_json::Value;

/// Version given to appendices built programmatically.
pub const DEFAULT_APPENDIX_VERSION: u8 = 1;

/// JSON key holding the version of the named appendix.
pub fn version_key(name: &str) -> String {
    format!("version.{name}")
}

/// Read the version byte if the owning transaction is modern.
pub fn read_version(reader: &mut ByteReader<'_>, transaction_version: u8) -> AppendixResult<u8> {
    if transaction_version == 0 {
        return Ok(0);
    }
    let version = reader.get_u8()?;
    if version == 0 {
        return Err(AppendixError::InvalidVersion {
            version,
            transaction_version,
        });
    }
    Ok(version)
}

pub fn write_version(writer: &mut ByteWriter, version: u8) {
    if version > 0 {
        writer.put_u8(version);
    }
}

/// Read `"version.<name>"` from JSON, defaulting to 0.
pub fn json_version(json: &JsonObject, name: &str) -> AppendixResult<u8> {
    let key = version_key(name);
    match json.get(&key) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| AppendixError::invalid_json("version", format!("{key} = {value}"))),
    }
}

pub fn put_json_version(json: &mut JsonObject, name: &str, version: u8) {
    if version > 0 {
        json.insert(version_key(name), Value::from(version));
    }
}

/// Legacy transactions take only version-0 appendices, modern ones only
/// explicitly versioned appendices.
pub fn verify_version(version: u8, transaction_version: u8) -> bool {
    if transaction_version == 0 {
        version == 0
    } else {
        version > 0
    }
}

/// Size of the version prefix on the wire.
pub fn version_size(version: u8) -> usize {
    usize::from(version > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_transaction_reads_no_byte() {
        let data = [5u8];
        let mut reader = ByteReader::new(&data);
        assert_eq!(read_version(&mut reader, 0).unwrap(), 0);
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_modern_transaction_reads_byte() {
        let data = [3u8];
        let mut reader = ByteReader::new(&data);
        assert_eq!(read_version(&mut reader, 1).unwrap(), 3);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_modern_transaction_rejects_zero_version() {
        let data = [0u8];
        let mut reader = ByteReader::new(&data);
        assert!(matches!(
            read_version(&mut reader, 1),
            Err(AppendixError::InvalidVersion { version: 0, .. })
        ));
    }

    #[test]
    fn test_json_version() {
        let json = json!({"version.Message": 2}).as_object().cloned().unwrap();
        assert_eq!(json_version(&json, "Message").unwrap(), 2);
        assert_eq!(json_version(&json, "TwoPhased").unwrap(), 0);

        let bad = json!({"version.Message": 512}).as_object().cloned().unwrap();
        assert!(json_version(&bad, "Message").is_err());
    }

    #[test]
    fn test_verify_version() {
        assert!(verify_version(0, 0));
        assert!(!verify_version(1, 0));
        assert!(verify_version(1, 1));
        assert!(!verify_version(0, 1));
    }
}
