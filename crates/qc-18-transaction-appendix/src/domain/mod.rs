pub mod appendix;
pub mod appendix_set;
pub mod codec;
pub mod encrypted;
pub mod errors;
pub mod json;
pub mod limits;
pub mod message;
pub mod phasing;
pub mod poll;
pub mod public_key;
pub mod transaction;
pub mod version;

pub use appendix::*;
pub use appendix_set::*;
pub use codec::{ByteReader, ByteWriter};
pub use encrypted::*;
pub use errors::*;
pub use json::JsonObject;
pub use limits::*;
pub use message::*;
pub use phasing::*;
pub use poll::*;
pub use public_key::*;
pub use transaction::*;
pub use version::{verify_version, DEFAULT_APPENDIX_VERSION};
