use async_trait::async_trait;
use boxoffice_shared::{Page, PageRequest, RedemptionCode, Ticket, TicketType, TicketValidation, User};
use uuid::Uuid;

use crate::StoreResult;

/// Repository trait for user lookup and provisioning
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Insert the user unless one with the same id already exists.
    /// Returns the stored record either way.
    async fn save_user(&self, user: &User) -> StoreResult<User>;
}

/// Durable capacity accounting per ticket type.
///
/// All writes that can change a ticket type's sold count go through a
/// [`LedgerTransaction`] opened with [`InventoryLedger::begin`].
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTransaction>>;

    /// Non-locking read; fine for display, never for capacity decisions.
    async fn get_ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>>;

    /// Non-locking read of the committed sold count.
    async fn sold_count(&self, ticket_type_id: Uuid) -> StoreResult<i64>;
}

/// One ledger transaction.
///
/// Row locks taken by `acquire_for_update` are held until `commit` or `rollback`.
/// Dropping the transaction without committing rolls it back.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Exclusively lock the ticket type row. Blocks behind other holders of the
    /// same row and fails with `StoreError::LockTimeout` past the configured wait.
    async fn acquire_for_update(&mut self, ticket_type_id: Uuid) -> StoreResult<Option<TicketType>>;

    /// Units sold against the ticket type: sum of `quantity` over PURCHASED tickets,
    /// including tickets written earlier in this transaction.
    async fn current_sold(&mut self, ticket_type_id: Uuid) -> StoreResult<i64>;

    async fn insert_ticket_type(&mut self, ticket_type: &TicketType) -> StoreResult<()>;

    async fn update_ticket_type(&mut self, ticket_type: &TicketType) -> StoreResult<()>;

    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Repository trait for ticket reads and per-ticket mutations
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn begin_redemption(&self) -> StoreResult<Box<dyn RedemptionTransaction>>;

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>>;

    async fn get_for_purchaser(&self, purchaser_id: Uuid, ticket_id: Uuid) -> StoreResult<Option<Ticket>>;

    /// Newest first.
    async fn list_for_purchaser(&self, purchaser_id: Uuid, page: PageRequest) -> StoreResult<Page<Ticket>>;

    /// Oldest first.
    async fn list_validations(&self, ticket_id: Uuid) -> StoreResult<Vec<TicketValidation>>;
}

/// Per-ticket transaction used by door validation and cancellation.
#[async_trait]
pub trait RedemptionTransaction: Send {
    async fn lock_ticket(&mut self, ticket_id: Uuid) -> StoreResult<Option<Ticket>>;

    /// Resolve a redemption code value to its ticket and lock the ticket row.
    async fn lock_ticket_by_code(&mut self, value: &str) -> StoreResult<Option<Ticket>>;

    async fn save_ticket(&mut self, ticket: &Ticket) -> StoreResult<()>;

    async fn record_validation(&mut self, validation: &TicketValidation) -> StoreResult<()>;

    /// Mark the ticket's code EXPIRED. No-op when the ticket has no code yet.
    async fn expire_code(&mut self, ticket_id: Uuid) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Repository trait for redemption codes
#[async_trait]
pub trait RedemptionCodeRepository: Send + Sync {
    /// Store `code` unless its ticket already has one; returns whichever code is stored.
    async fn insert_if_absent(&self, code: &RedemptionCode) -> StoreResult<RedemptionCode>;

    async fn find_by_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<RedemptionCode>>;
}
