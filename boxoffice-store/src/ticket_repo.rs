use std::time::Duration;

use async_trait::async_trait;
use boxoffice_core::repository::{
    InventoryLedger, LedgerTransaction, RedemptionCodeRepository, RedemptionTransaction, TicketRepository,
    UserDirectory,
};
use boxoffice_core::{StoreError, StoreResult};
use boxoffice_shared::pii::Masked;
use boxoffice_shared::{Page, PageRequest, RedemptionCode, Ticket, TicketType, TicketValidation, User};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

const TICKET_TYPE_COLUMNS: &str =
    "id, event_id, name, description, price, total_available, created_at, updated_at";
const TICKET_COLUMNS: &str =
    "id, ticket_type_id, purchaser_id, status, quantity, remaining_scans, created_at, updated_at";

/// Postgres-backed implementation of every storage seam.
///
/// Row locks are `SELECT ... FOR UPDATE`; each transaction sets a local
/// `lock_timeout` so a blocked purchase fails with `LockTimeout` instead of
/// waiting forever.
#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgTicketStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    async fn begin_tx(&self) -> StoreResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        // SET does not take bind parameters
        let statement = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&statement).execute(&mut *tx).await.map_err(map_sqlx)?;
        Ok(tx)
    }
}

/// Translate driver errors into the storage taxonomy.
pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // lock_not_available
            Some("55P03") => StoreError::LockTimeout,
            // unique_violation
            Some("23505") => StoreError::Conflict(db.message().to_string()),
            // serialization_failure, deadlock_detected
            Some("40001") | Some("40P01") => StoreError::Unavailable(db.message().to_string()),
            _ => StoreError::Backend(err.to_string()),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    warn!("Unreadable row: {}", err);
    StoreError::Backend(err.to_string())
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: Option<String>,
    email: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email.map(Masked),
            role: row.role.parse().map_err(corrupt)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketTypeRow {
    id: Uuid,
    event_id: Uuid,
    name: String,
    description: Option<String>,
    price: Decimal,
    total_available: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TicketTypeRow> for TicketType {
    fn from(row: TicketTypeRow) -> Self {
        TicketType {
            id: row.id,
            event_id: row.event_id,
            name: row.name,
            description: row.description,
            price: row.price,
            total_available: row.total_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    ticket_type_id: Uuid,
    purchaser_id: Uuid,
    status: String,
    quantity: i32,
    remaining_scans: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = StoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            id: row.id,
            ticket_type_id: row.ticket_type_id,
            purchaser_id: row.purchaser_id,
            status: row.status.parse().map_err(corrupt)?,
            quantity: row.quantity,
            remaining_scans: row.remaining_scans,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ValidationRow {
    id: Uuid,
    ticket_id: Uuid,
    method: String,
    status: String,
    validated_at: DateTime<Utc>,
}

impl TryFrom<ValidationRow> for TicketValidation {
    type Error = StoreError;

    fn try_from(row: ValidationRow) -> Result<Self, Self::Error> {
        Ok(TicketValidation {
            id: row.id,
            ticket_id: row.ticket_id,
            method: row.method.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            validated_at: row.validated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CodeRow {
    id: Uuid,
    ticket_id: Uuid,
    value: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CodeRow> for RedemptionCode {
    type Error = StoreError;

    fn try_from(row: CodeRow) -> Result<Self, Self::Error> {
        Ok(RedemptionCode {
            id: row.id,
            ticket_id: row.ticket_id,
            value: row.value,
            status: row.status.parse().map_err(corrupt)?,
            created_at: row.created_at,
        })
    }
}

fn tickets_from(rows: Vec<TicketRow>) -> StoreResult<Vec<Ticket>> {
    rows.into_iter().map(Ticket::try_from).collect()
}

#[async_trait]
impl UserDirectory for PgTicketStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email, role, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(User::try_from).transpose()
    }

    async fn save_user(&self, user: &User) -> StoreResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.email.as_ref().map(|e| e.expose().clone()))
        .bind(user.role.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        self.find_user(user.id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("user {} vanished after insert", user.id)))
    }
}

#[async_trait]
impl InventoryLedger for PgTicketStore {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTransaction>> {
        Ok(Box::new(PgLedgerTx { tx: self.begin_tx().await? }))
    }

    async fn get_ticket_type(&self, id: Uuid) -> StoreResult<Option<TicketType>> {
        let sql = format!("SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE id = $1");
        let row = sqlx::query_as::<_, TicketTypeRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(TicketType::from))
    }

    async fn sold_count(&self, ticket_type_id: Uuid) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM tickets WHERE ticket_type_id = $1 AND status = 'PURCHASED'",
        )
        .bind(ticket_type_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }
}

struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTx {
    async fn acquire_for_update(&mut self, ticket_type_id: Uuid) -> StoreResult<Option<TicketType>> {
        let sql = format!("SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, TicketTypeRow>(&sql)
            .bind(ticket_type_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(TicketType::from))
    }

    async fn current_sold(&mut self, ticket_type_id: Uuid) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM tickets WHERE ticket_type_id = $1 AND status = 'PURCHASED'",
        )
        .bind(ticket_type_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)
    }

    async fn insert_ticket_type(&mut self, ticket_type: &TicketType) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_types (id, event_id, name, description, price, total_available, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(ticket_type.id)
        .bind(ticket_type.event_id)
        .bind(&ticket_type.name)
        .bind(&ticket_type.description)
        .bind(ticket_type.price)
        .bind(ticket_type.total_available)
        .bind(ticket_type.created_at)
        .bind(ticket_type.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_ticket_type(&mut self, ticket_type: &TicketType) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE ticket_types
            SET name = $1, description = $2, price = $3, total_available = $4, updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(&ticket_type.name)
        .bind(&ticket_type.description)
        .bind(ticket_type.price)
        .bind(ticket_type.total_available)
        .bind(ticket_type.updated_at)
        .bind(ticket_type.id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tickets (id, ticket_type_id, purchaser_id, status, quantity, remaining_scans, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.ticket_type_id)
        .bind(ticket.purchaser_id)
        .bind(ticket.status.as_str())
        .bind(ticket.quantity)
        .bind(ticket.remaining_scans)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.rollback().await.map_err(map_sqlx)
    }
}

#[async_trait]
impl TicketRepository for PgTicketStore {
    async fn begin_redemption(&self) -> StoreResult<Box<dyn RedemptionTransaction>> {
        Ok(Box::new(PgRedemptionTx { tx: self.begin_tx().await? }))
    }

    async fn get_ticket(&self, id: Uuid) -> StoreResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
        let row = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(Ticket::try_from).transpose()
    }

    async fn get_for_purchaser(&self, purchaser_id: Uuid, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 AND purchaser_id = $2");
        let row = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(ticket_id)
            .bind(purchaser_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(Ticket::try_from).transpose()
    }

    async fn list_for_purchaser(&self, purchaser_id: Uuid, page: PageRequest) -> StoreResult<Page<Ticket>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets WHERE purchaser_id = $1")
            .bind(purchaser_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE purchaser_id = $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(purchaser_id)
            .bind(i64::from(page.size))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(Page::new(tickets_from(rows)?, page, total.max(0) as u64))
    }

    async fn list_validations(&self, ticket_id: Uuid) -> StoreResult<Vec<TicketValidation>> {
        let rows = sqlx::query_as::<_, ValidationRow>(
            "SELECT id, ticket_id, method, status, validated_at FROM ticket_validations WHERE ticket_id = $1 ORDER BY validated_at, id",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(TicketValidation::try_from).collect()
    }
}

struct PgRedemptionTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RedemptionTransaction for PgRedemptionTx {
    async fn lock_ticket(&mut self, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(ticket_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(Ticket::try_from).transpose()
    }

    async fn lock_ticket_by_code(&mut self, value: &str) -> StoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT t.id, t.ticket_type_id, t.purchaser_id, t.status, t.quantity, t.remaining_scans, t.created_at, t.updated_at
            FROM tickets t
            JOIN qr_codes q ON q.ticket_id = t.id
            WHERE q.value = $1
            FOR UPDATE OF t
            "#,
        )
        .bind(value)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.map(Ticket::try_from).transpose()
    }

    async fn save_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        sqlx::query("UPDATE tickets SET status = $1, remaining_scans = $2, updated_at = $3 WHERE id = $4")
            .bind(ticket.status.as_str())
            .bind(ticket.remaining_scans)
            .bind(ticket.updated_at)
            .bind(ticket.id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn record_validation(&mut self, validation: &TicketValidation) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ticket_validations (id, ticket_id, method, status, validated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(validation.id)
        .bind(validation.ticket_id)
        .bind(validation.method.as_str())
        .bind(validation.status.as_str())
        .bind(validation.validated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn expire_code(&mut self, ticket_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE qr_codes SET status = 'EXPIRED' WHERE ticket_id = $1")
            .bind(ticket_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.rollback().await.map_err(map_sqlx)
    }
}

#[async_trait]
impl RedemptionCodeRepository for PgTicketStore {
    async fn insert_if_absent(&self, code: &RedemptionCode) -> StoreResult<RedemptionCode> {
        sqlx::query(
            r#"
            INSERT INTO qr_codes (id, ticket_id, value, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (ticket_id) DO NOTHING
            "#,
        )
        .bind(code.id)
        .bind(code.ticket_id)
        .bind(&code.value)
        .bind(code.status.as_str())
        .bind(code.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        self.find_by_ticket(code.ticket_id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("code for ticket {} vanished after insert", code.ticket_id)))
    }

    async fn find_by_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<RedemptionCode>> {
        let row = sqlx::query_as::<_, CodeRow>(
            "SELECT id, ticket_id, value, status, created_at FROM qr_codes WHERE ticket_id = $1",
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(RedemptionCode::try_from).transpose()
    }
}
