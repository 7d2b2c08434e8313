//! Appendix Service - validation, apply and phased poll resolution
//!
//! ```text
//! block applier ──apply──→ [AppendixService] ──save──→ PendingPollStore
//!                               │
//!      resolve_due(height) ─────┤──retire──→ PendingPollStore
//!                               └──credit──→ AccountLedger
//! ```
//!
//! A poll is retired from the store before the escrow is released, so a
//! second resolution always finds it gone and is rejected. If the release
//! fails the poll is reinstated as pending and the resolution can be retried.

use crate::domain::{
    AccountId, AppendixResult, AppendixSet, ApplyContext, ApplyEffect, JsonObject, PollError,
    PollOutcome, PollResult, PollStatus, ProtocolLimits, TransactionId, ValidationContext,
    VotingModel,
};
use crate::ports::inbound::{AppendixApi, DueResolutions, PollResolution};
use crate::ports::outbound::{AccountLedger, PendingPollStore, TransactionView};
use std::env;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Appendix subsystem configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendixConfig {
    /// Limits applied by decode and validate
    pub limits: ProtocolLimits,
    /// Commit polls that reached quorum before their deadline
    pub resolve_early: bool,
}

impl Default for AppendixConfig {
    fn default() -> Self {
        Self {
            limits: ProtocolLimits::default(),
            resolve_early: true,
        }
    }
}

impl AppendixConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            limits: ProtocolLimits {
                max_message_length: env_usize(
                    "QC_APPENDIX_MAX_MESSAGE_LENGTH",
                    defaults.limits.max_message_length,
                ),
                max_encrypted_message_length: env_usize(
                    "QC_APPENDIX_MAX_ENCRYPTED_LENGTH",
                    defaults.limits.max_encrypted_message_length,
                ),
                max_voters: env_usize("QC_APPENDIX_MAX_VOTERS", defaults.limits.max_voters),
            },
            resolve_early: env::var("QC_APPENDIX_RESOLVE_EARLY")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.resolve_early),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Appendix service, generic over its collaborators.
pub struct AppendixService<L, S>
where
    L: AccountLedger,
    S: PendingPollStore,
{
    config: AppendixConfig,
    ledger: Arc<L>,
    polls: Arc<S>,
}

impl<L, S> AppendixService<L, S>
where
    L: AccountLedger,
    S: PendingPollStore,
{
    pub fn new(config: AppendixConfig, ledger: Arc<L>, polls: Arc<S>) -> Self {
        Self {
            config,
            ledger,
            polls,
        }
    }

    pub fn config(&self) -> &AppendixConfig {
        &self.config
    }

    /// Error for an id with no pending poll.
    fn missing(&self, id: TransactionId) -> PollError {
        match self.polls.outcome(id) {
            Ok(Some(outcome)) => PollError::AlreadyResolved { id, outcome },
            Ok(None) => PollError::NotFound(id),
            Err(e) => e.into(),
        }
    }

    fn vote_weight(&self, model: VotingModel, voter: AccountId, asset: u64) -> PollResult<u64> {
        Ok(match model {
            VotingModel::Account => 1,
            VotingModel::Balance => self.ledger.balance(voter)?,
            VotingModel::Asset => self.ledger.asset_balance(voter, asset)?,
        })
    }

    fn resolve(&self, id: TransactionId, outcome: PollOutcome) -> PollResult<PollResolution> {
        let poll = match self.polls.retire(id, outcome)? {
            Some(poll) => poll,
            None => return Err(self.missing(id)),
        };

        let credited = match outcome {
            PollOutcome::Approved => poll.recipient_id,
            PollOutcome::Rejected => Some(poll.sender_id),
        };
        if let Some(account) = credited {
            if let Err(e) = self.ledger.credit(account, poll.amount) {
                error!("[qc-18] Escrow release for poll {} to {} failed: {}", id, account, e);
                // Back to pending so the resolution can be retried
                if let Err(restore) = self.polls.reinstate(poll) {
                    error!(
                        "[qc-18] Poll {} could not be reinstated, escrow stranded: {}",
                        id, restore
                    );
                }
                return Err(e.into());
            }
        }

        info!(
            "[qc-18] Poll {} resolved as {:?} (tally {}/{}, {} released to {:?})",
            id,
            outcome,
            poll.tally(),
            poll.quorum,
            poll.amount,
            credited
        );
        crate::metrics::record_poll_resolved(match outcome {
            PollOutcome::Approved => "approved",
            PollOutcome::Rejected => "rejected",
        });

        Ok(PollResolution {
            id,
            outcome,
            credited,
            amount: poll.amount,
        })
    }
}

impl<L, S> AppendixApi for AppendixService<L, S>
where
    L: AccountLedger,
    S: PendingPollStore,
{
    fn parse_bytes(
        &self,
        flags: u32,
        bytes: &[u8],
        transaction_version: u8,
    ) -> AppendixResult<AppendixSet> {
        AppendixSet::decode(flags, bytes, transaction_version, &self.config.limits).map_err(|e| {
            debug!("[qc-18] Rejected appendix bytes (flags {:#x}): {}", flags, e);
            e
        })
    }

    fn parse_json(&self, json: &JsonObject) -> AppendixResult<AppendixSet> {
        AppendixSet::from_json(json).map_err(|e| {
            debug!("[qc-18] Rejected appendix JSON: {}", e);
            e
        })
    }

    fn validate(
        &self,
        transaction: &dyn TransactionView,
        appendices: &AppendixSet,
    ) -> AppendixResult<()> {
        let ctx = ValidationContext::new(self.ledger.as_ref(), self.config.limits);
        appendices.validate(transaction, &ctx)
    }

    fn apply(
        &self,
        transaction: &dyn TransactionView,
        appendices: &AppendixSet,
    ) -> Vec<ApplyEffect> {
        let ctx = ApplyContext::new(self.ledger.as_ref(), self.polls.as_ref());
        appendices.apply(transaction, &ctx)
    }

    fn record_vote(&self, id: TransactionId, voter: AccountId, height: u32) -> PollResult<u64> {
        let mut poll = match self.polls.get(id)? {
            Some(poll) => poll,
            None => return Err(self.missing(id)),
        };

        if height > poll.max_height {
            return Err(PollError::VotingClosed {
                id,
                max_height: poll.max_height,
                height,
            });
        }
        if !poll.is_eligible(voter) {
            return Err(PollError::NotEligible { id, voter });
        }
        if poll.has_voted(voter) {
            return Err(PollError::DuplicateVote { id, voter });
        }

        let weight = self.vote_weight(poll.voting_model, voter, poll.asset_id)?;
        if weight < poll.vote_threshold {
            return Err(PollError::BelowThreshold {
                weight,
                threshold: poll.vote_threshold,
            });
        }

        poll.votes.insert(voter, weight);
        self.polls.update(&poll)?;

        let tally = poll.tally();
        debug!(
            "[qc-18] Vote on poll {} by {} (weight {}, tally {}/{})",
            id, voter, weight, tally, poll.quorum
        );
        Ok(tally)
    }

    fn commit(&self, id: TransactionId) -> PollResult<PollResolution> {
        self.resolve(id, PollOutcome::Approved)
    }

    fn rollback(&self, id: TransactionId) -> PollResult<PollResolution> {
        self.resolve(id, PollOutcome::Rejected)
    }

    fn resolve_due(&self, height: u32) -> PollResult<DueResolutions> {
        let mut batch = DueResolutions::default();
        for poll in self.polls.pending()? {
            let outcome = if poll.is_due(height) {
                if poll.is_approved() {
                    PollOutcome::Approved
                } else {
                    PollOutcome::Rejected
                }
            } else if self.config.resolve_early && poll.is_approved() {
                PollOutcome::Approved
            } else {
                continue;
            };
            match self.resolve(poll.id, outcome) {
                Ok(resolution) => batch.resolved.push(resolution),
                Err(e) => {
                    error!("[qc-18] Poll {} left unresolved at height {}: {}", poll.id, height, e);
                    batch.failed.push((poll.id, e));
                }
            }
        }
        if !batch.is_empty() {
            info!(
                "[qc-18] Resolved {} poll(s) at height {} ({} failed)",
                batch.resolved.len(),
                height,
                batch.failed.len()
            );
        }
        Ok(batch)
    }

    fn status(&self, id: TransactionId) -> PollResult<PollStatus> {
        if self.polls.exists(id)? {
            return Ok(PollStatus::Pending);
        }
        match self.polls.outcome(id)? {
            Some(outcome) => Ok(outcome.into()),
            None => Err(PollError::NotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryLedger, InMemoryPollStore};
    use crate::domain::{LedgerError, TransactionHeader, TransactionType, TwoPhased};

    const SENDER: AccountId = 1;
    const RECIPIENT: AccountId = 2;

    fn service(
        ledger: InMemoryLedger,
    ) -> (
        AppendixService<InMemoryLedger, InMemoryPollStore>,
        Arc<InMemoryLedger>,
        Arc<InMemoryPollStore>,
    ) {
        let ledger = Arc::new(ledger);
        let polls = Arc::new(InMemoryPollStore::new());
        let service =
            AppendixService::new(AppendixConfig::default(), ledger.clone(), polls.clone());
        (service, ledger, polls)
    }

    fn phased_payment(id: TransactionId, phasing: TwoPhased) -> (TransactionHeader, AppendixSet) {
        let tx = TransactionHeader::new(id, TransactionType::OrdinaryPayment, SENDER)
            .with_recipient(RECIPIENT)
            .with_amount(100)
            .with_height(10);
        (tx, AppendixSet::new().with(phasing))
    }

    fn register(
        service: &AppendixService<InMemoryLedger, InMemoryPollStore>,
        id: TransactionId,
        phasing: TwoPhased,
    ) {
        let (tx, set) = phased_payment(id, phasing);
        service.validate(&tx, &set).unwrap();
        assert_eq!(service.apply(&tx, &set), vec![ApplyEffect::PollRegistered { id }]);
    }

    #[test]
    fn test_commit_credits_recipient_once() {
        let (service, ledger, _) = service(InMemoryLedger::new());
        register(&service, 7, TwoPhased::new(20, VotingModel::Account, 1, 1, vec![]));

        let resolution = service.commit(7).unwrap();
        assert_eq!(resolution.credited, Some(RECIPIENT));
        assert_eq!(ledger.balance(RECIPIENT).unwrap(), 100);

        assert_eq!(
            service.commit(7),
            Err(PollError::AlreadyResolved {
                id: 7,
                outcome: PollOutcome::Approved
            })
        );
        assert!(matches!(service.rollback(7), Err(PollError::AlreadyResolved { .. })));
        assert_eq!(ledger.balance(RECIPIENT).unwrap(), 100);
        assert_eq!(ledger.balance(SENDER).unwrap(), 0);
        assert_eq!(service.status(7).unwrap(), PollStatus::Approved);
    }

    #[test]
    fn test_rollback_refunds_sender() {
        let (service, ledger, _) = service(InMemoryLedger::new());
        register(&service, 7, TwoPhased::new(20, VotingModel::Account, 1, 1, vec![]));

        let resolution = service.rollback(7).unwrap();
        assert_eq!(resolution.outcome, PollOutcome::Rejected);
        assert_eq!(ledger.balance(SENDER).unwrap(), 100);
        assert_eq!(ledger.balance(RECIPIENT).unwrap(), 0);
        assert_eq!(service.status(7).unwrap(), PollStatus::Rejected);
    }

    #[test]
    fn test_unknown_poll() {
        let (service, _, _) = service(InMemoryLedger::new());
        assert_eq!(service.commit(99), Err(PollError::NotFound(99)));
        assert_eq!(service.status(99), Err(PollError::NotFound(99)));
        assert_eq!(service.record_vote(99, 3, 1), Err(PollError::NotFound(99)));
    }

    #[test]
    fn test_vote_rules() {
        let (service, _, _) = service(InMemoryLedger::new());
        register(&service, 7, TwoPhased::new(20, VotingModel::Account, 2, 1, vec![3, 4]));

        assert_eq!(service.record_vote(7, 3, 15).unwrap(), 1);
        assert_eq!(
            service.record_vote(7, 3, 16),
            Err(PollError::DuplicateVote { id: 7, voter: 3 })
        );
        assert_eq!(
            service.record_vote(7, 5, 16),
            Err(PollError::NotEligible { id: 7, voter: 5 })
        );
        assert_eq!(
            service.record_vote(7, 4, 21),
            Err(PollError::VotingClosed {
                id: 7,
                max_height: 20,
                height: 21
            })
        );
        // Voting is still open at the deadline height itself
        assert_eq!(service.record_vote(7, 4, 20).unwrap(), 2);
    }

    #[test]
    fn test_balance_weighted_votes() {
        let ledger = InMemoryLedger::new().with_balance(3, 40).with_balance(4, 5);
        let (service, _, _) = service(ledger);
        register(&service, 7, TwoPhased::new(20, VotingModel::Balance, 50, 10, vec![]));

        assert_eq!(service.record_vote(7, 3, 11).unwrap(), 40);
        assert_eq!(
            service.record_vote(7, 4, 11),
            Err(PollError::BelowThreshold {
                weight: 5,
                threshold: 10
            })
        );
    }

    #[test]
    fn test_asset_weighted_votes() {
        let ledger = InMemoryLedger::new();
        ledger.set_asset_balance(3, 77, 12);
        let (service, _, _) = service(ledger);
        register(&service, 7, TwoPhased::asset_weighted(20, 77, 10, 1, vec![]));

        assert_eq!(service.record_vote(7, 3, 11).unwrap(), 12);
    }

    #[test]
    fn test_resolve_due_at_deadline() {
        let (service, ledger, polls) = service(InMemoryLedger::new());
        register(&service, 8, TwoPhased::new(20, VotingModel::Account, 1, 1, vec![]));
        register(&service, 5, TwoPhased::new(20, VotingModel::Account, 1, 1, vec![]));
        register(&service, 6, TwoPhased::new(30, VotingModel::Account, 1, 1, vec![]));
        service.record_vote(8, 3, 12).unwrap();

        let config = AppendixConfig {
            resolve_early: false,
            ..AppendixConfig::default()
        };
        let service = AppendixService::new(config, ledger.clone(), polls.clone());

        assert!(service.resolve_due(19).unwrap().is_empty());

        let batch = service.resolve_due(20).unwrap();
        assert!(batch.is_complete());
        let summary: Vec<_> = batch.resolved.iter().map(|r| (r.id, r.outcome)).collect();
        assert_eq!(
            summary,
            vec![(5, PollOutcome::Rejected), (8, PollOutcome::Approved)]
        );
        assert_eq!(ledger.balance(SENDER).unwrap(), 100);
        assert_eq!(ledger.balance(RECIPIENT).unwrap(), 100);
        assert_eq!(polls.pending_count(), 1);
    }

    #[test]
    fn test_resolve_due_commits_early_when_enabled() {
        let (service, _, polls) = service(InMemoryLedger::new());
        register(&service, 5, TwoPhased::new(100, VotingModel::Account, 1, 1, vec![]));
        service.record_vote(5, 3, 12).unwrap();

        let batch = service.resolve_due(13).unwrap();
        assert_eq!(batch.resolved.len(), 1);
        assert_eq!(batch.resolved[0].outcome, PollOutcome::Approved);
        assert_eq!(polls.pending_count(), 0);
    }

    #[test]
    fn test_failed_release_keeps_poll_pending() {
        let ledger = InMemoryLedger::new().with_balance(RECIPIENT, u64::MAX);
        let (service, ledger, _) = service(ledger);
        register(&service, 7, TwoPhased::new(20, VotingModel::Account, 1, 1, vec![]));

        assert_eq!(
            service.commit(7),
            Err(PollError::Ledger(LedgerError::BalanceOverflow(RECIPIENT)))
        );
        assert_eq!(service.status(7).unwrap(), PollStatus::Pending);

        // Once the recipient can take the credit, the retry goes through
        ledger.debit(RECIPIENT, 1_000).unwrap();
        let resolution = service.commit(7).unwrap();
        assert_eq!(resolution.credited, Some(RECIPIENT));
        assert_eq!(ledger.balance(RECIPIENT).unwrap(), u64::MAX - 1_000 + 100);
        assert_eq!(service.status(7).unwrap(), PollStatus::Approved);
    }

    #[test]
    fn test_failed_release_allows_rollback() {
        let ledger = InMemoryLedger::new().with_balance(RECIPIENT, u64::MAX);
        let (service, ledger, _) = service(ledger);
        register(&service, 7, TwoPhased::new(20, VotingModel::Account, 1, 1, vec![]));

        assert!(service.commit(7).is_err());
        service.rollback(7).unwrap();
        assert_eq!(ledger.balance(SENDER).unwrap(), 100);
        assert_eq!(service.status(7).unwrap(), PollStatus::Rejected);
    }

    #[test]
    fn test_resolve_due_continues_past_failing_poll() {
        let (service, ledger, _) = service(InMemoryLedger::new().with_balance(3, u64::MAX));
        for (id, recipient) in [(5, 2), (6, 3), (8, 4)] {
            let tx = TransactionHeader::new(id, TransactionType::OrdinaryPayment, SENDER)
                .with_recipient(recipient)
                .with_amount(100)
                .with_height(10);
            let set =
                AppendixSet::new().with(TwoPhased::new(20, VotingModel::Account, 1, 1, vec![]));
            service.apply(&tx, &set);
            service.record_vote(id, 9, 15).unwrap();
        }

        let batch = service.resolve_due(20).unwrap();
        let resolved: Vec<_> = batch.resolved.iter().map(|r| r.id).collect();
        assert_eq!(resolved, vec![5, 8]);
        assert_eq!(batch.failed, vec![(6, PollError::Ledger(LedgerError::BalanceOverflow(3)))]);
        assert!(!batch.is_complete());
        assert_eq!(ledger.balance(2).unwrap(), 100);
        assert_eq!(ledger.balance(4).unwrap(), 100);
        assert_eq!(service.status(6).unwrap(), PollStatus::Pending);

        // The failed poll is picked up again on the next height
        ledger.debit(3, 1_000).unwrap();
        let batch = service.resolve_due(21).unwrap();
        assert_eq!(batch.resolved.len(), 1);
        assert_eq!(batch.resolved[0].id, 6);
        assert!(batch.is_complete());
    }

    #[test]
    fn test_commit_without_recipient_credits_nobody() {
        let (service, ledger, _) = service(InMemoryLedger::new());
        let tx = TransactionHeader::new(9, TransactionType::AliasAssignment, SENDER)
            .with_amount(0)
            .with_height(3);
        let set = AppendixSet::new().with(TwoPhased::new(20, VotingModel::Account, 1, 1, vec![]));
        service.apply(&tx, &set);

        let resolution = service.commit(9).unwrap();
        assert_eq!(resolution.credited, None);
        assert_eq!(ledger.balance(SENDER).unwrap(), 0);
    }

    #[test]
    fn test_storage_outage_surfaces() {
        let (service, _, polls) = service(InMemoryLedger::new());
        register(&service, 5, TwoPhased::new(20, VotingModel::Account, 1, 1, vec![]));
        polls.set_unavailable(true);
        assert!(matches!(service.commit(5), Err(PollError::Storage(_))));
        assert!(matches!(service.resolve_due(20), Err(PollError::Storage(_))));
    }

    #[test]
    fn test_config_default() {
        let config = AppendixConfig::default();
        assert_eq!(config.limits, ProtocolLimits::default());
        assert!(config.resolve_early);
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("QC_APPENDIX_MAX_VOTERS", "8");
        env::set_var("QC_APPENDIX_RESOLVE_EARLY", "false");
        env::set_var("QC_APPENDIX_MAX_MESSAGE_LENGTH", "not-a-number");
        let config = AppendixConfig::from_env();
        env::remove_var("QC_APPENDIX_MAX_VOTERS");
        env::remove_var("QC_APPENDIX_RESOLVE_EARLY");
        env::remove_var("QC_APPENDIX_MAX_MESSAGE_LENGTH");

        assert_eq!(config.limits.max_voters, 8);
        assert_eq!(config.limits.max_message_length, 1000);
        assert!(!config.resolve_early);
    }
}
