//! # qc-18-transaction-appendix
//!
//! Optional payloads attached to ledger transactions.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Message**: plain text or binary memo
//! - **EncryptedMessage / EncryptToSelfMessage**: ciphertext with nonce
//! - **PublicKeyAnnouncement**: binds the recipient's public key on first use
//! - **TwoPhased**: defers a transfer until a weighted vote resolves it
//!
//! Each appendix has a compact binary encoding, a JSON encoding, a
//! validation contract and an apply contract.
//!
//! ## Architecture
//!
//! ```text
//! Peer / API ──bytes, JSON──→ AppendixService ──validate──→ AccountLedger
//!                                  │
//! Block applier ──apply──────────→ ├──save──→ PendingPollStore
//!               ──resolve_due────→ └──retire / credit
//! ```
//!
//! ## Version Negotiation
//!
//! Legacy transactions (version 0) carry no per-appendix version byte;
//! their appendices report version 0. Modern transactions carry one leading
//! version byte per appendix, which must be non-zero.
//!
//! ## Phased Poll Lifecycle
//!
//! ```text
//! [PENDING] ──commit (quorum reached)──→ [APPROVED]  recipient credited
//!     │
//!     └──── rollback (deadline missed) ─→ [REJECTED]  sender refunded
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use qc_18_transaction_appendix::{AppendixConfig, AppendixService};
//! use qc_18_transaction_appendix::ports::inbound::AppendixApi;
//!
//! let service = AppendixService::new(AppendixConfig::from_env(), ledger, polls);
//!
//! let appendices = service.parse_bytes(flags, &bytes, tx.version())?;
//! service.validate(&tx, &appendices)?;
//! service.apply(&tx, &appendices);
//!
//! // Once per block, before the block is considered applied
//! let resolutions = service.resolve_due(height)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryLedger, InMemoryPollStore};
pub use domain::{
    account_id, Appendix, AppendixError, AppendixKind, AppendixResult, AppendixSet, ApplyEffect,
    EncryptToSelfMessage, EncryptedData, EncryptedMessage, ErrorKind, Message, PendingPoll,
    PollError, PollOutcome, PollResult, PollStatus, ProtocolLimits, PublicKeyAnnouncement,
    TransactionHeader, TransactionType, TwoPhased, VotingModel,
};
pub use ports::inbound::{AppendixApi, DueResolutions, PollResolution};
pub use ports::outbound::{AccountLedger, PendingPollStore, TransactionView};
pub use service::{AppendixConfig, AppendixService};
