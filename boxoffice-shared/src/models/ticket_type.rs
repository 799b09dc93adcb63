use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable category within an event, with a fixed inventory ceiling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub total_available: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    pub fn new(
        event_id: Uuid,
        name: String,
        description: Option<String>,
        price: Decimal,
        total_available: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_id,
            name,
            description,
            price,
            total_available,
            created_at: now,
            updated_at: now,
        }
    }

    /// Units still sellable given the current sold count
    pub fn remaining(&self, sold: i64) -> i64 {
        (i64::from(self.total_available) - sold).max(0)
    }
}
