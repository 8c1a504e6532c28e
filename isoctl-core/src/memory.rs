//! In-memory transactional store.
//!
//! Stands in for MySQL in tests and in `isoctl --in-memory`. It keeps the
//! committed value of every account plus the pending writes of each open
//! transaction, and answers reads according to the reader's isolation
//! level:
//!
//! - READ UNCOMMITTED sees the pending write of whichever transaction holds
//!   the row lock
//! - READ COMMITTED sees the latest committed value
//! - REPEATABLE READ sees a snapshot taken at the transaction's first read
//! - SERIALIZABLE reads take a shared lock on the row; a pending foreign
//!   write is a lock wait, and so is a foreign write onto a row read this way
//!
//! A transaction always sees its own writes. Statements outside a
//! transaction autocommit. Because every caller is single-threaded, a
//! statement that would block on a row lock fails immediately with
//! [`DemoError::LockWait`] instead of waiting for a release that can never
//! come.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DemoError, Result};
use crate::factory::Connector;
use crate::isolation::IsolationLevel;
use crate::session::{Balance, Session, SessionState, ACCOUNT, SENTINEL_BALANCE};

type TxId = u64;

#[derive(Debug)]
struct Transaction {
    owner: String,
    level: IsolationLevel,
    writes: HashMap<String, Balance>,
    read_locks: HashSet<String>,
    snapshot: Option<HashMap<String, Balance>>,
}

impl Transaction {
    fn locks(&self, account: &str) -> bool {
        self.writes.contains_key(account) || self.read_locks.contains(account)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    committed: HashMap<String, Balance>,
    transactions: HashMap<TxId, Transaction>,
    next_tx: TxId,
    open_sessions: usize,
    statements: usize,
}

impl StoreInner {
    /// Transaction other than `me` holding a pending write on `account`
    fn lock_holder(&self, account: &str, me: Option<TxId>) -> Option<(TxId, &Transaction)> {
        self.transactions
            .iter()
            .find(|(id, tx)| Some(**id) != me && tx.writes.contains_key(account))
            .map(|(id, tx)| (*id, tx))
    }

    /// Transaction other than `me` holding a shared or exclusive lock on `account`
    fn conflicting_lock(&self, account: &str, me: Option<TxId>) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|(id, tx)| Some(**id) != me && tx.locks(account))
            .map(|(_, tx)| tx)
    }

    fn committed(&self, account: &str) -> Result<Balance> {
        self.committed
            .get(account)
            .copied()
            .ok_or_else(|| DemoError::account_not_found(account))
    }

    fn read(&mut self, tx_id: Option<TxId>, account: &str) -> Result<Balance> {
        self.statements += 1;

        let Some(tx_id) = tx_id else {
            return self.committed(account);
        };
        let tx = self
            .transactions
            .get(&tx_id)
            .ok_or_else(|| DemoError::store(format!("unknown transaction {}", tx_id)))?;

        if let Some(own) = tx.writes.get(account) {
            return Ok(*own);
        }

        match tx.level {
            IsolationLevel::ReadUncommitted => match self.lock_holder(account, Some(tx_id)) {
                Some((_, holder)) => Ok(holder.writes[account]),
                None => self.committed(account),
            },
            IsolationLevel::ReadCommitted => self.committed(account),
            IsolationLevel::RepeatableRead | IsolationLevel::Serializable => {
                if tx.level == IsolationLevel::Serializable {
                    if let Some((_, holder)) = self.lock_holder(account, Some(tx_id)) {
                        return Err(DemoError::lock_wait(account, holder.owner.clone()));
                    }
                }
                let committed = self.committed.clone();
                let tx = self
                    .transactions
                    .get_mut(&tx_id)
                    .ok_or_else(|| DemoError::store(format!("unknown transaction {}", tx_id)))?;
                if tx.level == IsolationLevel::Serializable {
                    tx.read_locks.insert(account.to_string());
                }
                tx.snapshot
                    .get_or_insert(committed)
                    .get(account)
                    .copied()
                    .ok_or_else(|| DemoError::account_not_found(account))
            }
        }
    }

    fn write(&mut self, tx_id: Option<TxId>, account: &str, value: Balance) -> Result<u64> {
        self.statements += 1;

        if let Some(holder) = self.conflicting_lock(account, tx_id) {
            return Err(DemoError::lock_wait(account, holder.owner.clone()));
        }
        if !self.committed.contains_key(account) {
            return Ok(0);
        }

        match tx_id {
            Some(tx_id) => {
                let tx = self
                    .transactions
                    .get_mut(&tx_id)
                    .ok_or_else(|| DemoError::store(format!("unknown transaction {}", tx_id)))?;
                tx.writes.insert(account.to_string(), value);
            }
            None => {
                self.committed.insert(account.to_string(), value);
            }
        }
        Ok(1)
    }

    fn begin(&mut self, owner: &str, level: IsolationLevel) -> TxId {
        self.statements += 1;
        let id = self.next_tx;
        self.next_tx += 1;
        self.transactions.insert(
            id,
            Transaction {
                owner: owner.to_string(),
                level,
                writes: HashMap::new(),
                read_locks: HashSet::new(),
                snapshot: None,
            },
        );
        id
    }

    fn commit(&mut self, tx_id: TxId) {
        self.statements += 1;
        if let Some(tx) = self.transactions.remove(&tx_id) {
            self.committed.extend(tx.writes);
        }
    }

    fn rollback(&mut self, tx_id: TxId) {
        self.statements += 1;
        self.transactions.remove(&tx_id);
    }
}

/// Shared handle to one in-memory database
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the single `Alice` row every scenario uses
    pub fn seeded(balance: Balance) -> Self {
        let store = Self::new();
        store.insert_account(ACCOUNT, balance);
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite a committed account row
    pub fn insert_account(&self, name: &str, balance: Balance) {
        self.lock().committed.insert(name.to_string(), balance);
    }

    /// Latest committed balance, ignoring any pending writes
    pub fn committed_balance(&self, name: &str) -> Option<Balance> {
        self.lock().committed.get(name).copied()
    }

    pub fn active_transactions(&self) -> usize {
        self.lock().transactions.len()
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    /// Number of statements (including transaction control) executed so far
    pub fn statements_executed(&self) -> usize {
        self.lock().statements
    }
}

/// Hands out sessions on a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: MemoryStore,
    refuse: Option<String>,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            refuse: None,
        }
    }

    /// Make every connection attempt fail with `reason`, as bad credentials would.
    pub fn refusing(mut self, reason: impl Into<String>) -> Self {
        self.refuse = Some(reason.into());
        self
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn backend(&self) -> &str {
        "in-memory database"
    }

    async fn connect(&self, label: &str) -> Result<Box<dyn Session>> {
        if let Some(reason) = &self.refuse {
            return Err(DemoError::connect(label, reason.clone()));
        }
        self.store.lock().open_sessions += 1;
        Ok(Box::new(MemorySession {
            label: label.to_string(),
            store: self.store.clone(),
            tx: None,
            state: SessionState::Idle,
        }))
    }
}

/// One connection to a [`MemoryStore`]
#[derive(Debug)]
pub struct MemorySession {
    label: String,
    store: MemoryStore,
    tx: Option<TxId>,
    state: SessionState,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<()> {
        if self.state.is_open() {
            Ok(())
        } else {
            Err(DemoError::session_closed(&self.label))
        }
    }

    fn end_transaction(&mut self, commit: bool) -> Result<()> {
        self.ensure_open()?;
        if let Some(tx_id) = self.tx.take() {
            let mut inner = self.store.lock();
            if commit {
                inner.commit(tx_id);
            } else {
                inner.rollback(tx_id);
            }
        }
        self.state = SessionState::Idle;
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> SessionState {
        self.state
    }

    async fn begin(&mut self, level: IsolationLevel) -> Result<()> {
        self.ensure_open()?;
        let mut inner = self.store.lock();
        // START TRANSACTION implicitly commits whatever was open
        if let Some(previous) = self.tx.take() {
            inner.commit(previous);
        }
        self.tx = Some(inner.begin(&self.label, level));
        self.state = SessionState::InTransaction(level);
        debug!(session = %self.label, %level, "begin");
        Ok(())
    }

    async fn fetch_balance(&mut self) -> Result<Balance> {
        self.ensure_open()?;
        self.store.lock().read(self.tx, ACCOUNT)
    }

    async fn update_balance(&mut self) -> Result<u64> {
        self.ensure_open()?;
        self.store.lock().write(self.tx, ACCOUNT, SENTINEL_BALANCE)
    }

    async fn commit(&mut self) -> Result<()> {
        self.end_transaction(true)
    }

    async fn rollback(&mut self) -> Result<()> {
        self.end_transaction(false)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.state.is_open() {
            return Ok(());
        }
        let mut inner = self.store.lock();
        // Disconnecting with an open transaction rolls it back
        if let Some(tx_id) = self.tx.take() {
            inner.rollback(tx_id);
        }
        inner.open_sessions = inner.open_sessions.saturating_sub(1);
        self.state = SessionState::Closed;
        Ok(())
    }
}
