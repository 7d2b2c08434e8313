//! Pending poll record for phased transactions.
//!
//! ```text
//! [PENDING] ──commit──→ [APPROVED]
//!     │
//!     └──── rollback ──→ [REJECTED]
//! ```
//!
//! Both terminal states are final. A poll is resolved exactly once.

use super::phasing::{TwoPhased, VotingModel};
use super::transaction::{AccountId, AssetId, TransactionId};
use crate::ports::TransactionView;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal result of a poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollOutcome {
    Approved,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollStatus {
    Pending,
    Approved,
    Rejected,
}

impl From<PollOutcome> for PollStatus {
    fn from(outcome: PollOutcome) -> Self {
        match outcome {
            PollOutcome::Approved => Self::Approved,
            PollOutcome::Rejected => Self::Rejected,
        }
    }
}

/// A phased transaction awaiting resolution.
///
/// Carries a snapshot of the escrowed transfer so resolution does not need
/// the original transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPoll {
    /// Id of the phased transaction.
    pub id: TransactionId,
    /// Deadline height, inclusive.
    pub max_height: u32,
    pub voting_model: VotingModel,
    pub quorum: u64,
    pub vote_threshold: u64,
    pub asset_id: AssetId,
    /// Empty means any account may vote.
    pub possible_voters: Vec<AccountId>,
    pub sender_id: AccountId,
    pub recipient_id: Option<AccountId>,
    /// Amount withheld from the recipient until approval.
    pub amount: u64,
    /// Height the transaction was confirmed at.
    pub created_height: u32,
    /// Counted weight per voter.
    pub votes: BTreeMap<AccountId, u64>,
}

impl PendingPoll {
    pub fn new(transaction: &dyn TransactionView, appendix: &TwoPhased) -> Self {
        Self {
            id: transaction.id(),
            max_height: appendix.max_height(),
            voting_model: appendix.voting_model(),
            quorum: appendix.quorum(),
            vote_threshold: appendix.vote_threshold(),
            asset_id: appendix.asset_id(),
            possible_voters: appendix.possible_voters().to_vec(),
            sender_id: transaction.sender_id(),
            recipient_id: transaction.recipient_id(),
            amount: transaction.amount(),
            created_height: transaction.height(),
            votes: BTreeMap::new(),
        }
    }

    pub fn is_eligible(&self, voter: AccountId) -> bool {
        self.possible_voters.is_empty() || self.possible_voters.contains(&voter)
    }

    pub fn has_voted(&self, voter: AccountId) -> bool {
        self.votes.contains_key(&voter)
    }

    /// Total counted weight.
    pub fn tally(&self) -> u64 {
        self.votes.values().fold(0u64, |acc, w| acc.saturating_add(*w))
    }

    pub fn is_approved(&self) -> bool {
        self.tally() >= self.quorum
    }

    /// Whether the deadline has been reached at `height`.
    pub fn is_due(&self, height: u32) -> bool {
        height >= self.max_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TransactionHeader, TransactionType};

    fn poll(quorum: u64, voters: Vec<AccountId>) -> PendingPoll {
        let tx = TransactionHeader::new(9, TransactionType::OrdinaryPayment, 1)
            .with_recipient(2)
            .with_amount(500)
            .with_height(12);
        PendingPoll::new(&tx, &TwoPhased::new(20, VotingModel::Account, quorum, 1, voters))
    }

    #[test]
    fn test_snapshot_of_transaction() {
        let poll = poll(1, vec![]);
        assert_eq!(poll.id, 9);
        assert_eq!(poll.sender_id, 1);
        assert_eq!(poll.recipient_id, Some(2));
        assert_eq!(poll.amount, 500);
        assert_eq!(poll.created_height, 12);
        assert!(poll.votes.is_empty());
    }

    #[test]
    fn test_eligibility() {
        assert!(poll(1, vec![]).is_eligible(12345));
        let restricted = poll(1, vec![3, 4]);
        assert!(restricted.is_eligible(3));
        assert!(!restricted.is_eligible(5));
    }

    #[test]
    fn test_tally_and_quorum() {
        let mut poll = poll(2, vec![]);
        assert!(!poll.is_approved());
        poll.votes.insert(3, 1);
        assert!(!poll.is_approved());
        poll.votes.insert(4, 1);
        assert_eq!(poll.tally(), 2);
        assert!(poll.is_approved());
    }

    #[test]
    fn test_tally_saturates() {
        let mut poll = poll(u64::MAX, vec![]);
        poll.votes.insert(1, u64::MAX);
        poll.votes.insert(2, 5);
        assert_eq!(poll.tally(), u64::MAX);
    }

    #[test]
    fn test_due_at_deadline() {
        let poll = poll(1, vec![]);
        assert!(!poll.is_due(19));
        assert!(poll.is_due(20));
        assert!(poll.is_due(21));
    }
}
