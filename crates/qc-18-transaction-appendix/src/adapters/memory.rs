use crate::domain::{
    AccountId, AssetId, LedgerError, PendingPoll, PollOutcome, PublicKey, StorageError,
    TransactionId,
};
use crate::ports::{AccountLedger, PendingPollStore};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Debug, Default)]
struct AccountRecord {
    balance: u64,
    assets: HashMap<AssetId, u64>,
    public_key: Option<PublicKey>,
    key_height: Option<u32>,
}

/// In-memory implementation of AccountLedger for testing
pub struct InMemoryLedger {
    accounts: RwLock<HashMap<AccountId, AccountRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Builder method to seed a balance.
    pub fn with_balance(self, account: AccountId, balance: u64) -> Self {
        self.accounts.write().entry(account).or_default().balance = balance;
        self
    }

    pub fn set_asset_balance(&self, account: AccountId, asset: AssetId, amount: u64) {
        self.accounts
            .write()
            .entry(account)
            .or_default()
            .assets
            .insert(asset, amount);
    }

    /// Height at which the account's key was first bound.
    pub fn key_height(&self, account: AccountId) -> Option<u32> {
        self.accounts.read().get(&account).and_then(|a| a.key_height)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountLedger for InMemoryLedger {
    fn balance(&self, account: AccountId) -> Result<u64, LedgerError> {
        Ok(self.accounts.read().get(&account).map_or(0, |a| a.balance))
    }

    fn asset_balance(&self, account: AccountId, asset: AssetId) -> Result<u64, LedgerError> {
        Ok(self
            .accounts
            .read()
            .get(&account)
            .and_then(|a| a.assets.get(&asset).copied())
            .unwrap_or(0))
    }

    fn credit(&self, account: AccountId, amount: u64) -> Result<(), LedgerError> {
        let mut accounts = self.accounts.write();
        let record = accounts.entry(account).or_default();
        record.balance = record
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(account))?;
        Ok(())
    }

    fn debit(&self, account: AccountId, amount: u64) -> Result<(), LedgerError> {
        let mut accounts = self.accounts.write();
        let record = accounts
            .get_mut(&account)
            .ok_or(LedgerError::AccountNotFound(account))?;
        if record.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account,
                required: amount,
                available: record.balance,
            });
        }
        record.balance -= amount;
        Ok(())
    }

    fn public_key(&self, account: AccountId) -> Result<Option<PublicKey>, LedgerError> {
        Ok(self.accounts.read().get(&account).and_then(|a| a.public_key))
    }

    fn bind_public_key(
        &self,
        account: AccountId,
        key: &PublicKey,
        height: u32,
    ) -> Result<bool, LedgerError> {
        let mut accounts = self.accounts.write();
        let record = accounts.entry(account).or_default();
        match record.public_key {
            Some(existing) if existing != *key => Ok(false),
            _ => {
                record.public_key = Some(*key);
                // Keep the earliest binding height
                record.key_height = Some(record.key_height.map_or(height, |h| h.min(height)));
                Ok(true)
            }
        }
    }
}

#[derive(Debug, Default)]
struct PollTables {
    pending: BTreeMap<TransactionId, PendingPoll>,
    resolved: HashMap<TransactionId, PollOutcome>,
}

/// In-memory implementation of PendingPollStore for testing
///
/// Each call holds the table lock for its whole duration, so create, read
/// and retire are atomic per poll.
pub struct InMemoryPollStore {
    tables: RwLock<PollTables>,
    unavailable: AtomicBool,
}

impl InMemoryPollStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(PollTables::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail, simulating a lost backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn pending_count(&self) -> usize {
        self.tables.read().pending.len()
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("in-memory store disabled".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryPollStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingPollStore for InMemoryPollStore {
    fn save(&self, poll: PendingPoll) -> Result<(), StorageError> {
        self.check_available()?;
        let mut tables = self.tables.write();
        if tables.pending.contains_key(&poll.id) || tables.resolved.contains_key(&poll.id) {
            return Err(StorageError::Duplicate(poll.id));
        }
        tables.pending.insert(poll.id, poll);
        Ok(())
    }

    fn update(&self, poll: &PendingPoll) -> Result<(), StorageError> {
        self.check_available()?;
        let mut tables = self.tables.write();
        match tables.pending.get_mut(&poll.id) {
            Some(stored) => {
                *stored = poll.clone();
                Ok(())
            }
            None => Err(StorageError::Unavailable(format!("poll {} is not pending", poll.id))),
        }
    }

    fn get(&self, id: TransactionId) -> Result<Option<PendingPoll>, StorageError> {
        self.check_available()?;
        Ok(self.tables.read().pending.get(&id).cloned())
    }

    fn retire(
        &self,
        id: TransactionId,
        outcome: PollOutcome,
    ) -> Result<Option<PendingPoll>, StorageError> {
        self.check_available()?;
        let mut tables = self.tables.write();
        let poll = tables.pending.remove(&id);
        if poll.is_some() {
            tables.resolved.insert(id, outcome);
        }
        Ok(poll)
    }

    fn reinstate(&self, poll: PendingPoll) -> Result<(), StorageError> {
        self.check_available()?;
        let mut tables = self.tables.write();
        if tables.pending.contains_key(&poll.id) {
            return Err(StorageError::Duplicate(poll.id));
        }
        tables.resolved.remove(&poll.id);
        tables.pending.insert(poll.id, poll);
        Ok(())
    }

    fn outcome(&self, id: TransactionId) -> Result<Option<PollOutcome>, StorageError> {
        self.check_available()?;
        Ok(self.tables.read().resolved.get(&id).copied())
    }

    fn pending(&self) -> Result<Vec<PendingPoll>, StorageError> {
        self.check_available()?;
        Ok(self.tables.read().pending.values().cloned().collect())
    }
}
