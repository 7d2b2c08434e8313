//! Protocol limits shared by the binary codec and validation.
//!
//! Decode and validate must agree on these values, otherwise a transaction
//! accepted from a peer could be rejected when it is re-validated for a block.

use serde::{Deserialize, Serialize};

/// Maximum plain message payload in bytes.
pub const MAX_ARBITRARY_MESSAGE_LENGTH: usize = 1000;

/// Maximum encrypted message ciphertext in bytes.
pub const MAX_ENCRYPTED_MESSAGE_LENGTH: usize = 1000;

/// Nonce length for a non-empty ciphertext.
pub const NONCE_LENGTH: usize = 32;

/// Length of an announced public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Maximum number of accounts that may be listed as possible voters.
pub const MAX_VOTERS: usize = 16;

/// Limits applied while decoding and validating appendices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolLimits {
    pub max_message_length: usize,
    pub max_encrypted_message_length: usize,
    pub max_voters: usize,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_message_length: MAX_ARBITRARY_MESSAGE_LENGTH,
            max_encrypted_message_length: MAX_ENCRYPTED_MESSAGE_LENGTH,
            max_voters: MAX_VOTERS,
        }
    }
}
