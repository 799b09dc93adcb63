use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::UnknownVariant;

/// Ticket status in the purchase lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Purchased,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Purchased => "PURCHASED",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASED" => Ok(TicketStatus::Purchased),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            other => Err(UnknownVariant::new("ticket status", other)),
        }
    }
}

/// How a ticket was presented at the door
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationMethod {
    Manual,
    QrCode,
}

impl ValidationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMethod::Manual => "MANUAL",
            ValidationMethod::QrCode => "QR_CODE",
        }
    }
}

impl FromStr for ValidationMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(ValidationMethod::Manual),
            "QR_CODE" => Ok(ValidationMethod::QrCode),
            other => Err(UnknownVariant::new("validation method", other)),
        }
    }
}

/// Outcome recorded for one admission attempt.
///
/// `Expired` means the ticket had no scans left; `Invalid` means it was cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Expired,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Valid => "VALID",
            ValidationStatus::Invalid => "INVALID",
            ValidationStatus::Expired => "EXPIRED",
        }
    }
}

impl FromStr for ValidationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALID" => Ok(ValidationStatus::Valid),
            "INVALID" => Ok(ValidationStatus::Invalid),
            "EXPIRED" => Ok(ValidationStatus::Expired),
            other => Err(UnknownVariant::new("validation status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeStatus {
    Active,
    Expired,
}

impl CodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeStatus::Active => "ACTIVE",
            CodeStatus::Expired => "EXPIRED",
        }
    }
}

impl FromStr for CodeStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(CodeStatus::Active),
            "EXPIRED" => Ok(CodeStatus::Expired),
            other => Err(UnknownVariant::new("code status", other)),
        }
    }
}

/// One purchase: `quantity` units bought against a ticket type.
///
/// `quantity` never changes after purchase and is what counts against capacity.
/// `remaining_scans` starts equal to it and only ever goes down, one per admission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_type_id: Uuid,
    pub purchaser_id: Uuid,
    pub status: TicketStatus,
    pub quantity: i32,
    pub remaining_scans: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn purchased(ticket_type_id: Uuid, purchaser_id: Uuid, quantity: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ticket_type_id,
            purchaser_id,
            status: TicketStatus::Purchased,
            quantity,
            remaining_scans: quantity,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_scans <= 0
    }

    /// Apply one admission attempt. Only a `Valid` outcome consumes a scan.
    pub fn admit(&mut self) -> ValidationStatus {
        if self.status == TicketStatus::Cancelled {
            return ValidationStatus::Invalid;
        }
        if self.is_exhausted() {
            return ValidationStatus::Expired;
        }

        self.remaining_scans -= 1;
        self.updated_at = Utc::now();
        ValidationStatus::Valid
    }

    /// True once any unit has been admitted at the door.
    pub fn is_redeemed(&self) -> bool {
        self.remaining_scans < self.quantity
    }

    /// Admitted units stay sold, so a ticket that has been scanned cannot be cancelled.
    pub fn cancel(&mut self) -> Result<(), CancelRefusal> {
        if self.status == TicketStatus::Cancelled {
            return Err(CancelRefusal::AlreadyCancelled);
        }
        if self.is_redeemed() {
            return Err(CancelRefusal::Redeemed);
        }
        self.status = TicketStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Why [`Ticket::cancel`] left the ticket untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRefusal {
    AlreadyCancelled,
    Redeemed,
}

/// Append-only audit record of one admission attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketValidation {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub method: ValidationMethod,
    pub status: ValidationStatus,
    pub validated_at: DateTime<Utc>,
}

impl TicketValidation {
    pub fn new(ticket_id: Uuid, method: ValidationMethod, status: ValidationStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            method,
            status,
            validated_at: Utc::now(),
        }
    }
}

/// Door-scan code bound to exactly one ticket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedemptionCode {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub value: String,
    pub status: CodeStatus,
    pub created_at: DateTime<Utc>,
}

impl RedemptionCode {
    pub fn new(ticket_id: Uuid, value: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_id,
            value,
            status: CodeStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn expire(&mut self) {
        self.status = CodeStatus::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_consumes_scans_until_exhausted() {
        let mut ticket = Ticket::purchased(Uuid::new_v4(), Uuid::new_v4(), 2);

        assert_eq!(ticket.admit(), ValidationStatus::Valid);
        assert_eq!(ticket.admit(), ValidationStatus::Valid);
        assert!(ticket.is_exhausted());

        // Exhausted tickets never go below zero
        assert_eq!(ticket.admit(), ValidationStatus::Expired);
        assert_eq!(ticket.remaining_scans, 0);
        assert_eq!(ticket.quantity, 2);
    }

    #[test]
    fn test_cancelled_ticket_is_invalid() {
        let mut ticket = Ticket::purchased(Uuid::new_v4(), Uuid::new_v4(), 3);

        assert_eq!(ticket.cancel(), Ok(()));
        assert_eq!(ticket.cancel(), Err(CancelRefusal::AlreadyCancelled));
        assert_eq!(ticket.admit(), ValidationStatus::Invalid);
        assert_eq!(ticket.remaining_scans, 3);
    }

    #[test]
    fn test_scanned_ticket_cannot_be_cancelled() {
        let mut ticket = Ticket::purchased(Uuid::new_v4(), Uuid::new_v4(), 2);

        assert_eq!(ticket.admit(), ValidationStatus::Valid);
        assert!(ticket.is_redeemed());
        assert_eq!(ticket.cancel(), Err(CancelRefusal::Redeemed));
        assert_eq!(ticket.status, TicketStatus::Purchased);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&ValidationMethod::QrCode).unwrap(),
            "\"QR_CODE\""
        );
        assert_eq!("QR_CODE".parse::<ValidationMethod>().unwrap(), ValidationMethod::QrCode);
        assert_eq!("EXPIRED".parse::<ValidationStatus>().unwrap(), ValidationStatus::Expired);
        assert!("SCANNED".parse::<TicketStatus>().is_err());
    }
}
