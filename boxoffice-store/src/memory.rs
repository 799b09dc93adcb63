//! In-process store with the same locking contract as the Postgres store.
//!
//! Each ticket type and each ticket has its own async mutex standing in for a
//! row lock. A transaction keeps its guards until commit or drop, and its writes
//! stay staged until commit, so an abandoned transaction leaves nothing behind.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use boxoffice_core::repository::{
    InventoryLedger, LedgerTransaction, RedemptionCodeRepository, RedemptionTransaction, TicketRepository,
    UserDirectory,
};
use boxoffice_core::{StoreError, StoreResult};
use boxoffice_shared::{
    CodeStatus, Page, PageRequest, RedemptionCode, Ticket, TicketStatus, TicketType, TicketValidation, User,
};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    ticket_types: HashMap<Uuid, TicketType>,
    tickets: HashMap<Uuid, Ticket>,
    validations: Vec<TicketValidation>,
    codes: HashMap<Uuid, RedemptionCode>,
}

impl Tables {
    fn sold(&self, ticket_type_id: Uuid) -> i64 {
        self.tickets
            .values()
            .filter(|t| t.ticket_type_id == ticket_type_id && t.status == TicketStatus::Purchased)
            .map(|t| i64::from(t.quantity))
            .sum()
    }
}

#[derive(Default)]
struct RowLocks {
    rows: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl RowLocks {
    async fn acquire(&self, id: Uuid, wait: Duration) -> StoreResult<OwnedMutexGuard<()>> {
        let row = {
            let mut rows = self.rows.lock().map_err(|_| poisoned())?;
            // Holders and waiters keep their own Arc; a count of one means the row is idle
            rows.retain(|_, row| Arc::strong_count(row) > 1);
            rows.entry(id).or_default().clone()
        };

        tokio::time::timeout(wait, row.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout)
    }
}

struct Inner {
    tables: Mutex<Tables>,
    type_locks: RowLocks,
    ticket_locks: RowLocks,
    lock_timeout: Duration,
}

impl Inner {
    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| poisoned())
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("memory store mutex poisoned".into())
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                type_locks: RowLocks::default(),
                ticket_locks: RowLocks::default(),
                lock_timeout,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.tables()?.users.get(&id).cloned())
    }

    async fn save_user(&self, user: &User) -> StoreResult<User> {
        let mut tables = self.inner.tables()?;
        Ok(tables.users.entry(user.id).or_insert_with(|| user.clone()).clone())
    }
}

#[async_trait]
impl InventoryLedger for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTransaction>> {
        Ok(Box::new(MemoryLedgerTx {
            inner: self.inner.clone(),
            guards: Vec::new(),
            locked: HashSet::new(),
            staged_types: HashMap::new(),
            staged_tickets: Vec::new(),
        }))
    }

    async fn get_ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>> {
        Ok(self.inner.tables()?.ticket_types.get(&id).cloned())
    }

    async fn sold_count(&self, ticket_type_id: Uuid) -> StoreResult<i64> {
        Ok(self.inner.tables()?.sold(ticket_type_id))
    }
}

struct MemoryLedgerTx {
    inner: Arc<Inner>,
    guards: Vec<OwnedMutexGuard<()>>,
    locked: HashSet<Uuid>,
    staged_types: HashMap<Uuid, TicketType>,
    staged_tickets: Vec<Ticket>,
}

#[async_trait]
impl LedgerTransaction for MemoryLedgerTx {
    async fn acquire_for_update(&mut self, ticket_type_id: Uuid) -> StoreResult<Option<TicketType>> {
        if !self.locked.contains(&ticket_type_id) {
            let guard = self
                .inner
                .type_locks
                .acquire(ticket_type_id, self.inner.lock_timeout)
                .await?;
            self.guards.push(guard);
            self.locked.insert(ticket_type_id);
        }

        if let Some(staged) = self.staged_types.get(&ticket_type_id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.inner.tables()?.ticket_types.get(&ticket_type_id).cloned())
    }

    async fn current_sold(&mut self, ticket_type_id: Uuid) -> StoreResult<i64> {
        let committed = self.inner.tables()?.sold(ticket_type_id);
        let staged: i64 = self
            .staged_tickets
            .iter()
            .filter(|t| t.ticket_type_id == ticket_type_id && t.status == TicketStatus::Purchased)
            .map(|t| i64::from(t.quantity))
            .sum();
        Ok(committed + staged)
    }

    async fn insert_ticket_type(&mut self, ticket_type: &TicketType) -> StoreResult<()> {
        if self.inner.tables()?.ticket_types.contains_key(&ticket_type.id)
            || self.staged_types.contains_key(&ticket_type.id)
        {
            return Err(StoreError::Conflict(format!("ticket type {} already exists", ticket_type.id)));
        }
        self.staged_types.insert(ticket_type.id, ticket_type.clone());
        Ok(())
    }

    async fn update_ticket_type(&mut self, ticket_type: &TicketType) -> StoreResult<()> {
        self.staged_types.insert(ticket_type.id, ticket_type.clone());
        Ok(())
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        self.staged_tickets.push(ticket.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        {
            let mut tables = this.inner.tables()?;
            for (id, ticket_type) in this.staged_types {
                tables.ticket_types.insert(id, ticket_type);
            }
            for ticket in this.staged_tickets {
                tables.tickets.insert(ticket.id, ticket);
            }
        }
        // Row locks release only after the writes are visible
        drop(this.guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for MemoryStore {
    async fn begin_redemption(&self) -> StoreResult<Box<dyn RedemptionTransaction>> {
        Ok(Box::new(MemoryRedemptionTx {
            inner: self.inner.clone(),
            guards: Vec::new(),
            locked: HashSet::new(),
            staged_tickets: HashMap::new(),
            staged_validations: Vec::new(),
            expired_codes: Vec::new(),
        }))
    }

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.inner.tables()?.tickets.get(&id).cloned())
    }

    async fn get_for_purchaser(&self, purchaser_id: Uuid, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self
            .inner
            .tables()?
            .tickets
            .get(&ticket_id)
            .filter(|t| t.purchaser_id == purchaser_id)
            .cloned())
    }

    async fn list_for_purchaser(&self, purchaser_id: Uuid, page: PageRequest) -> StoreResult<Page<Ticket>> {
        let mut owned: Vec<Ticket> = self
            .inner
            .tables()?
            .tickets
            .values()
            .filter(|t| t.purchaser_id == purchaser_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        let total = owned.len() as u64;
        let items = owned
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn list_validations(&self, ticket_id: Uuid) -> StoreResult<Vec<TicketValidation>> {
        Ok(self
            .inner
            .tables()?
            .validations
            .iter()
            .filter(|v| v.ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}

struct MemoryRedemptionTx {
    inner: Arc<Inner>,
    guards: Vec<OwnedMutexGuard<()>>,
    locked: HashSet<Uuid>,
    staged_tickets: HashMap<Uuid, Ticket>,
    staged_validations: Vec<TicketValidation>,
    expired_codes: Vec<Uuid>,
}

#[async_trait]
impl RedemptionTransaction for MemoryRedemptionTx {
    async fn lock_ticket(&mut self, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        if !self.locked.contains(&ticket_id) {
            let guard = self
                .inner
                .ticket_locks
                .acquire(ticket_id, self.inner.lock_timeout)
                .await?;
            self.guards.push(guard);
            self.locked.insert(ticket_id);
        }

        if let Some(staged) = self.staged_tickets.get(&ticket_id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.inner.tables()?.tickets.get(&ticket_id).cloned())
    }

    async fn lock_ticket_by_code(&mut self, value: &str) -> StoreResult<Option<Ticket>> {
        let ticket_id = self
            .inner
            .tables()?
            .codes
            .values()
            .find(|c| c.value == value)
            .map(|c| c.ticket_id);

        match ticket_id {
            Some(id) => self.lock_ticket(id).await,
            None => Ok(None),
        }
    }

    async fn save_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        self.staged_tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn record_validation(&mut self, validation: &TicketValidation) -> StoreResult<()> {
        self.staged_validations.push(validation.clone());
        Ok(())
    }

    async fn expire_code(&mut self, ticket_id: Uuid) -> StoreResult<()> {
        self.expired_codes.push(ticket_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        {
            let mut tables = this.inner.tables()?;
            for (id, ticket) in this.staged_tickets {
                tables.tickets.insert(id, ticket);
            }
            tables.validations.extend(this.staged_validations);
            for ticket_id in this.expired_codes {
                if let Some(code) = tables.codes.get_mut(&ticket_id) {
                    code.status = CodeStatus::Expired;
                }
            }
        }
        drop(this.guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl RedemptionCodeRepository for MemoryStore {
    async fn insert_if_absent(&self, code: &RedemptionCode) -> StoreResult<RedemptionCode> {
        let mut tables = self.inner.tables()?;
        if let Some(existing) = tables.codes.get(&code.ticket_id) {
            return Ok(existing.clone());
        }
        if tables.codes.values().any(|c| c.value == code.value) {
            return Err(StoreError::Conflict(format!("redemption code value {} already in use", code.value)));
        }
        tables.codes.insert(code.ticket_id, code.clone());
        Ok(code.clone())
    }

    async fn find_by_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<RedemptionCode>> {
        Ok(self.inner.tables()?.codes.get(&ticket_id).cloned())
    }
}
