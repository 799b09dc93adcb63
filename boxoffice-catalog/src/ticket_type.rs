use boxoffice_core::{TicketingError, TicketingResult};
use boxoffice_shared::TicketType;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organizer input for a new ticket type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicketType {
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub total_available: i32,
}

impl NewTicketType {
    pub fn validate(&self) -> TicketingResult<()> {
        validate_name(&self.name)?;
        validate_price(self.price)?;
        validate_capacity(self.total_available)
    }

    pub fn into_ticket_type(self) -> TicketType {
        TicketType::new(
            self.event_id,
            self.name.trim().to_string(),
            self.description,
            self.price,
            self.total_available,
        )
    }
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketTypeChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub total_available: Option<i32>,
}

impl TicketTypeChanges {
    pub fn validate(&self) -> TicketingResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(capacity) = self.total_available {
            validate_capacity(capacity)?;
        }
        Ok(())
    }

    pub fn apply(self, ticket_type: &mut TicketType) {
        if let Some(name) = self.name {
            ticket_type.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            ticket_type.description = Some(description);
        }
        if let Some(price) = self.price {
            ticket_type.price = price;
        }
        if let Some(capacity) = self.total_available {
            ticket_type.total_available = capacity;
        }
        ticket_type.updated_at = Utc::now();
    }
}

fn validate_name(name: &str) -> TicketingResult<()> {
    if name.trim().is_empty() {
        return Err(TicketingError::InvalidArgument("Ticket type name must not be empty".into()));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> TicketingResult<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(TicketingError::InvalidArgument("Price must not be negative".into()));
    }
    Ok(())
}

fn validate_capacity(total_available: i32) -> TicketingResult<()> {
    if total_available < 0 {
        return Err(TicketingError::InvalidArgument("Total available must not be negative".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_ticket_type() -> NewTicketType {
        NewTicketType {
            event_id: Uuid::new_v4(),
            name: "  VIP ".into(),
            description: Some("Front row".into()),
            price: Decimal::new(4999, 2),
            total_available: 50,
        }
    }

    #[test]
    fn test_rejects_negative_price_and_capacity() {
        let mut new = new_ticket_type();
        new.price = Decimal::new(-1, 0);
        assert!(matches!(new.validate(), Err(TicketingError::InvalidArgument(_))));

        let mut new = new_ticket_type();
        new.total_available = -1;
        assert!(matches!(new.validate(), Err(TicketingError::InvalidArgument(_))));

        assert!(new_ticket_type().validate().is_ok());
    }

    #[test]
    fn test_changes_apply_only_present_fields() {
        let mut tt = new_ticket_type().into_ticket_type();
        assert_eq!(tt.name, "VIP");

        TicketTypeChanges {
            price: Some(Decimal::new(2500, 2)),
            ..Default::default()
        }
        .apply(&mut tt);

        assert_eq!(tt.price, Decimal::new(2500, 2));
        assert_eq!(tt.total_available, 50);
        assert_eq!(tt.description.as_deref(), Some("Front row"));
    }
}
