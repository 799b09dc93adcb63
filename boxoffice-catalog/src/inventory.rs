use std::sync::Arc;

use boxoffice_core::repository::{InventoryLedger, LedgerTransaction};
use boxoffice_core::{TicketingError, TicketingResult};
use boxoffice_shared::TicketType;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ticket_type::{NewTicketType, TicketTypeChanges};

/// The no-oversell rule. Every path that creates tickets must evaluate this
/// while holding the ticket type's row lock.
pub fn check_capacity(snapshot: &TicketType, current_sold: i64, requested_quantity: i32) -> bool {
    current_sold + i64::from(requested_quantity) <= i64::from(snapshot.total_available)
}

/// Lock the ticket type inside `tx` and confirm `quantity` more units fit.
///
/// On success the lock stays held by `tx`, so the caller can write tickets
/// knowing nobody else can sell against this type until it commits or rolls back.
/// With `event_id` set, a ticket type listed under another event counts as missing.
pub async fn reserve(
    tx: &mut dyn LedgerTransaction,
    event_id: Option<Uuid>,
    ticket_type_id: Uuid,
    quantity: i32,
) -> TicketingResult<TicketType> {
    let snapshot = tx
        .acquire_for_update(ticket_type_id)
        .await?
        .filter(|tt| event_id.map_or(true, |event_id| tt.event_id == event_id))
        .ok_or(TicketingError::TicketTypeNotFound(ticket_type_id))?;

    let sold = tx.current_sold(ticket_type_id).await?;
    debug!(%ticket_type_id, sold, total = snapshot.total_available, quantity, "Checking capacity");

    if !check_capacity(&snapshot, sold, quantity) {
        return Err(TicketingError::TicketsSoldOut {
            requested: quantity,
            remaining: snapshot.remaining(sold),
        });
    }

    Ok(snapshot)
}

/// Point-in-time capacity figures for a ticket type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Availability {
    pub ticket_type_id: Uuid,
    pub event_id: Uuid,
    pub total_available: i32,
    pub sold: i64,
    pub remaining: i64,
}

impl Availability {
    pub fn utilization(&self) -> f64 {
        if self.total_available == 0 {
            0.0
        } else {
            self.sold as f64 / f64::from(self.total_available)
        }
    }

    pub fn is_sold_out(&self) -> bool {
        self.remaining == 0
    }
}

/// Organizer-facing ticket type management on top of the ledger
pub struct InventoryService {
    ledger: Arc<dyn InventoryLedger>,
}

impl InventoryService {
    pub fn new(ledger: Arc<dyn InventoryLedger>) -> Self {
        Self { ledger }
    }

    pub async fn create_ticket_type(&self, new: NewTicketType) -> TicketingResult<TicketType> {
        new.validate()?;
        let ticket_type = new.into_ticket_type();

        let mut tx = self.ledger.begin().await?;
        tx.insert_ticket_type(&ticket_type).await?;
        tx.commit().await?;

        info!("Ticket type created: {} (capacity {})", ticket_type.id, ticket_type.total_available);
        Ok(ticket_type)
    }

    /// Apply organizer edits. Capacity is frozen once any unit has sold.
    pub async fn update_ticket_type(
        &self,
        event_id: Uuid,
        ticket_type_id: Uuid,
        changes: TicketTypeChanges,
    ) -> TicketingResult<TicketType> {
        changes.validate()?;

        let mut tx = self.ledger.begin().await?;
        let current = tx.acquire_for_update(ticket_type_id).await?;
        let mut ticket_type = match current {
            Some(tt) if tt.event_id == event_id => tt,
            _ => {
                tx.rollback().await?;
                return Err(TicketingError::TicketTypeNotFound(ticket_type_id));
            }
        };

        if let Some(capacity) = changes.total_available {
            let sold = tx.current_sold(ticket_type_id).await?;
            if capacity != ticket_type.total_available && sold > 0 {
                tx.rollback().await?;
                return Err(TicketingError::CapacityLocked(ticket_type_id));
            }
        }

        changes.apply(&mut ticket_type);
        tx.update_ticket_type(&ticket_type).await?;
        tx.commit().await?;

        info!("Ticket type updated: {}", ticket_type_id);
        Ok(ticket_type)
    }

    pub async fn availability(&self, ticket_type_id: Uuid) -> TicketingResult<Availability> {
        let ticket_type = self
            .ledger
            .get_ticket_type(ticket_type_id)
            .await?
            .ok_or(TicketingError::TicketTypeNotFound(ticket_type_id))?;
        let sold = self.ledger.sold_count(ticket_type_id).await?;

        Ok(Availability {
            ticket_type_id,
            event_id: ticket_type.event_id,
            total_available: ticket_type.total_available,
            sold,
            remaining: ticket_type.remaining(sold),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn ticket_type(total_available: i32) -> TicketType {
        TicketType::new(Uuid::new_v4(), "General".into(), None, Decimal::ZERO, total_available)
    }

    #[test]
    fn test_check_capacity_boundaries() {
        let tt = ticket_type(5);

        assert!(check_capacity(&tt, 0, 5));
        assert!(check_capacity(&tt, 4, 1));
        assert!(!check_capacity(&tt, 5, 1));
        // A single request larger than what is left fails outright
        assert!(!check_capacity(&tt, 0, 6));
        assert!(!check_capacity(&ticket_type(0), 0, 1));
    }

    #[test]
    fn test_utilization() {
        let availability = Availability {
            ticket_type_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            total_available: 10,
            sold: 1,
            remaining: 9,
        };
        assert!((availability.utilization() - 0.1).abs() < 0.01);
        assert!(!availability.is_sold_out());
    }
}
