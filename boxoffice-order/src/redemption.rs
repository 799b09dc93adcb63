use std::sync::Arc;

use boxoffice_core::repository::{RedemptionTransaction, TicketRepository};
use boxoffice_core::{TicketingError, TicketingResult};
use boxoffice_shared::{CancelRefusal, Ticket, TicketValidation, ValidationMethod, ValidationStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// How a ticket is identified at the door
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketRef {
    /// Value read off a redemption code
    Code(String),
    /// Ticket id typed in by staff
    Id(Uuid),
}

impl TicketRef {
    /// QR scans carry a code value; manual entry carries the ticket id.
    /// A manual entry that is not a ticket id is treated as a code value.
    pub fn parse(raw: &str, method: ValidationMethod) -> Self {
        let raw = raw.trim();
        match method {
            ValidationMethod::QrCode => TicketRef::Code(raw.to_string()),
            ValidationMethod::Manual => match Uuid::parse_str(raw) {
                Ok(id) => TicketRef::Id(id),
                Err(_) => TicketRef::Code(raw.to_string()),
            },
        }
    }
}

/// Door validation and cancellation. Both hold the ticket's row lock
/// across read, check and write.
pub struct RedemptionService {
    tickets: Arc<dyn TicketRepository>,
}

impl RedemptionService {
    pub fn new(tickets: Arc<dyn TicketRepository>) -> Self {
        Self { tickets }
    }

    pub async fn validate(&self, reference: TicketRef, method: ValidationMethod) -> TicketingResult<TicketValidation> {
        let mut tx = self.tickets.begin_redemption().await?;

        let locked = match &reference {
            TicketRef::Code(value) => tx.lock_ticket_by_code(value).await?,
            TicketRef::Id(id) => tx.lock_ticket(*id).await?,
        };
        let Some(mut ticket) = locked else {
            tx.rollback().await?;
            return Err(TicketingError::TicketNotFound);
        };

        let status = ticket.admit();
        let validation = TicketValidation::new(ticket.id, method, status);

        if status == ValidationStatus::Valid {
            tx.save_ticket(&ticket).await?;
            if ticket.is_exhausted() {
                tx.expire_code(ticket.id).await?;
            }
        }
        tx.record_validation(&validation).await?;
        tx.commit().await?;

        match status {
            ValidationStatus::Valid => {
                info!(ticket_id = %ticket.id, remaining = ticket.remaining_scans, method = method.as_str(), "Ticket admitted");
                Ok(validation)
            }
            ValidationStatus::Expired => {
                warn!(ticket_id = %ticket.id, "Rejected scan: no remaining scans");
                Err(TicketingError::NoRemainingScans(ticket.id))
            }
            ValidationStatus::Invalid => {
                warn!(ticket_id = %ticket.id, "Rejected scan: ticket cancelled");
                Err(TicketingError::TicketCancelled(ticket.id))
            }
        }
    }

    /// Purchaser cancels their own unscanned ticket; its units stop counting as sold.
    pub async fn cancel(&self, user_id: Uuid, ticket_id: Uuid) -> TicketingResult<Ticket> {
        let mut tx = self.tickets.begin_redemption().await?;

        let mut ticket = match owned(tx.as_mut(), user_id, ticket_id).await {
            Ok(ticket) => ticket,
            Err(err) => {
                tx.rollback().await?;
                return Err(err);
            }
        };

        if let Err(refusal) = ticket.cancel() {
            tx.rollback().await?;
            return Err(match refusal {
                CancelRefusal::AlreadyCancelled => TicketingError::TicketCancelled(ticket_id),
                CancelRefusal::Redeemed => {
                    warn!(%ticket_id, remaining = ticket.remaining_scans, "Refused cancel of admitted ticket");
                    TicketingError::AlreadyRedeemed(ticket_id)
                }
            });
        }

        tx.save_ticket(&ticket).await?;
        tx.commit().await?;

        info!(%ticket_id, %user_id, "Ticket cancelled");
        Ok(ticket)
    }

    /// Admission attempts for a ticket, oldest first.
    pub async fn list_validations(&self, ticket_id: Uuid) -> TicketingResult<Vec<TicketValidation>> {
        if self.tickets.get_ticket(ticket_id).await?.is_none() {
            return Err(TicketingError::TicketNotFound);
        }
        Ok(self.tickets.list_validations(ticket_id).await?)
    }
}

async fn owned(tx: &mut dyn RedemptionTransaction, user_id: Uuid, ticket_id: Uuid) -> TicketingResult<Ticket> {
    let ticket = tx.lock_ticket(ticket_id).await?.ok_or(TicketingError::TicketNotFound)?;
    if ticket.purchaser_id != user_id {
        return Err(TicketingError::Forbidden(ticket_id));
    }
    Ok(ticket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_ref_parsing() {
        let id = Uuid::new_v4();

        assert_eq!(TicketRef::parse(&id.to_string(), ValidationMethod::Manual), TicketRef::Id(id));
        assert_eq!(
            TicketRef::parse(" BOX-ABC ", ValidationMethod::Manual),
            TicketRef::Code("BOX-ABC".into())
        );
        // QR payloads are never reinterpreted as ids
        assert_eq!(
            TicketRef::parse(&id.to_string(), ValidationMethod::QrCode),
            TicketRef::Code(id.to_string())
        );
    }
}
