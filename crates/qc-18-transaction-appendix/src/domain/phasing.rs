//! # Phased Voting Appendix (TwoPhased)
//!
//! Defers the ledger effect of a transaction until a poll resolves it.
//!
//! ## Wire Layout
//!
//! ```text
//! [version?][max_height: u32][quorum: u64][vote_threshold: u64][voting_model: u8]
//! [asset_id: u64, Asset model only][voter_count: u8][voter: u64 * voter_count]
//! ```

use super::appendix::{ApplyContext, ApplyEffect, ValidationContext};
use super::codec::{ByteReader, ByteWriter};
use super::errors::{AppendixError, AppendixResult};
use super::json::{get_u32, get_u64, get_u64_array, get_u8, JsonObject};
use super::limits::ProtocolLimits;
use super::poll::PendingPoll;
use super::transaction::{AccountId, AssetId};
use super::version::{
    json_version, put_json_version, read_version, version_size, write_version,
    DEFAULT_APPENDIX_VERSION,
};
use crate::ports::TransactionView;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a vote on a phased transaction is weighted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VotingModel {
    /// Weight is the voter's balance
    Balance,
    /// One account, one vote
    Account,
    /// Weight is the voter's holding of `asset_id`
    Asset,
}

impl VotingModel {
    pub fn code(self) -> u8 {
        match self {
            Self::Balance => 0,
            Self::Account => 1,
            Self::Asset => 2,
        }
    }
}

impl TryFrom<u8> for VotingModel {
    type Error = AppendixError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Balance),
            1 => Ok(Self::Account),
            2 => Ok(Self::Asset),
            other => Err(AppendixError::UnknownVotingModel(other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TwoPhased {
    version: u8,
    max_height: u32,
    quorum: u64,
    vote_threshold: u64,
    voting_model: VotingModel,
    asset_id: AssetId,
    possible_voters: Vec<AccountId>,
}

impl TwoPhased {
    pub const NAME: &'static str = "TwoPhased";
    /// Field whose presence marks a phased attachment in JSON.
    pub const JSON_KEY: &'static str = "maxHeight";

    /// Poll weighted by balance or account count. Use
    /// [`TwoPhased::asset_weighted`] for the asset model.
    pub fn new(
        max_height: u32,
        voting_model: VotingModel,
        quorum: u64,
        vote_threshold: u64,
        possible_voters: Vec<AccountId>,
    ) -> Self {
        Self {
            version: DEFAULT_APPENDIX_VERSION,
            max_height,
            quorum,
            vote_threshold,
            voting_model,
            asset_id: 0,
            possible_voters,
        }
    }

    pub fn asset_weighted(
        max_height: u32,
        asset_id: AssetId,
        quorum: u64,
        vote_threshold: u64,
        possible_voters: Vec<AccountId>,
    ) -> Self {
        Self {
            version: DEFAULT_APPENDIX_VERSION,
            max_height,
            quorum,
            vote_threshold,
            voting_model: VotingModel::Asset,
            asset_id,
            possible_voters,
        }
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    pub fn quorum(&self) -> u64 {
        self.quorum
    }

    pub fn vote_threshold(&self) -> u64 {
        self.vote_threshold
    }

    pub fn voting_model(&self) -> VotingModel {
        self.voting_model
    }

    /// Zero unless the model is [`VotingModel::Asset`].
    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }

    pub fn possible_voters(&self) -> &[AccountId] {
        &self.possible_voters
    }

    fn is_asset(&self) -> bool {
        self.voting_model == VotingModel::Asset
    }

    pub fn size(&self) -> usize {
        version_size(self.version)
            + 4
            + 8
            + 8
            + 1
            + if self.is_asset() { 8 } else { 0 }
            + 1
            + 8 * self.possible_voters.len()
    }

    /// Callers must keep the voter list within `MAX_VOTERS`; the count
    /// is written as a single byte.
    pub fn encode(&self, writer: &mut ByteWriter) {
        write_version(writer, self.version);
        writer.put_u32(self.max_height);
        writer.put_u64(self.quorum);
        writer.put_u64(self.vote_threshold);
        writer.put_u8(self.voting_model.code());
        if self.is_asset() {
            writer.put_u64(self.asset_id);
        }
        writer.put_u8(self.possible_voters.len() as u8);
        for voter in &self.possible_voters {
            writer.put_u64(*voter);
        }
    }

    pub fn decode(
        reader: &mut ByteReader<'_>,
        transaction_version: u8,
        limits: &ProtocolLimits,
    ) -> AppendixResult<Self> {
        let version = read_version(reader, transaction_version)?;
        let max_height = reader.get_u32()?;
        let quorum = reader.get_u64()?;
        let vote_threshold = reader.get_u64()?;
        let voting_model = VotingModel::try_from(reader.get_u8()?)?;
        let asset_id = if voting_model == VotingModel::Asset {
            reader.get_u64()?
        } else {
            0
        };
        let count = usize::from(reader.get_u8()?);
        if count > limits.max_voters {
            return Err(AppendixError::TooManyVoters {
                count,
                max: limits.max_voters,
            });
        }
        let possible_voters = (0..count)
            .map(|_| reader.get_u64())
            .collect::<AppendixResult<Vec<_>>>()?;
        Ok(Self {
            version,
            max_height,
            quorum,
            vote_threshold,
            voting_model,
            asset_id,
            possible_voters,
        })
    }

    pub fn to_json(&self, json: &mut JsonObject) {
        put_json_version(json, Self::NAME, self.version);
        json.insert("maxHeight".to_string(), Value::from(self.max_height));
        json.insert("quorum".to_string(), Value::from(self.quorum));
        json.insert("voteThreshold".to_string(), Value::from(self.vote_threshold));
        json.insert("votingModel".to_string(), Value::from(self.voting_model.code()));
        if self.is_asset() {
            json.insert("assetId".to_string(), Value::from(self.asset_id));
        }
        json.insert(
            "possibleVoters".to_string(),
            Value::Array(self.possible_voters.iter().map(|v| Value::from(*v)).collect()),
        );
    }

    /// `Ok(None)` when the attachment has no `"maxHeight"`.
    pub fn from_json(json: &JsonObject) -> AppendixResult<Option<Self>> {
        if json.get(Self::JSON_KEY).map_or(true, Value::is_null) {
            return Ok(None);
        }
        let voting_model = VotingModel::try_from(get_u8(json, "votingModel")?)
            .map_err(|e| AppendixError::invalid_json("votingModel", e.to_string()))?;
        let asset_id = if voting_model == VotingModel::Asset {
            get_u64(json, "assetId")?
        } else {
            0
        };
        Ok(Some(Self {
            version: json_version(json, Self::NAME)?,
            max_height: get_u32(json, "maxHeight")?,
            quorum: get_u64(json, "quorum")?,
            vote_threshold: get_u64(json, "voteThreshold")?,
            voting_model,
            asset_id,
            possible_voters: get_u64_array(json, "possibleVoters")?,
        }))
    }

    // TODO: check quorum and vote_threshold against the voting model once
    // the weighting rules for Balance and Asset polls are settled.
    pub fn validate(
        &self,
        _transaction: &dyn TransactionView,
        ctx: &ValidationContext<'_>,
    ) -> AppendixResult<()> {
        if self.possible_voters.len() > ctx.limits.max_voters {
            return Err(AppendixError::not_valid("Possible voters list is too big"));
        }
        if self.is_asset() && self.asset_id == 0 {
            return Err(AppendixError::not_valid("Asset-weighted poll without asset id"));
        }
        Ok(())
    }

    /// Register the pending poll. Storage faults are logged, never returned:
    /// the transaction is already part of the chain.
    pub fn apply(&self, transaction: &dyn TransactionView, ctx: &ApplyContext<'_>) -> ApplyEffect {
        let poll = PendingPoll::new(transaction, self);
        let id = poll.id;
        match ctx.polls.save(poll) {
            Ok(()) => {
                tracing::info!(
                    "[qc-18] Registered pending poll {} (deadline height {})",
                    id,
                    self.max_height
                );
                crate::metrics::record_poll_registered();
                ApplyEffect::PollRegistered { id }
            }
            Err(e) => {
                tracing::error!("[qc-18] Failed to persist pending poll {}: {}", id, e);
                crate::metrics::record_poll_persist_failure();
                ApplyEffect::PollPersistFailed { id }
            }
        }
    }
}
