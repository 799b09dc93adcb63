use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::pii::Masked;
use crate::UnknownVariant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Attendee,
    Organizer,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Attendee => "ATTENDEE",
            Role::Organizer => "ORGANIZER",
            Role::Staff => "STAFF",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ATTENDEE" => Ok(Role::Attendee),
            "ORGANIZER" => Ok(Role::Organizer),
            "STAFF" => Ok(Role::Staff),
            _ => Err(UnknownVariant::new("role", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<Masked<String>>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: Uuid, name: Option<String>, email: Option<String>, role: Role) -> Self {
        Self {
            id,
            name,
            email: email.map(Masked),
            role,
            created_at: Utc::now(),
        }
    }
}
