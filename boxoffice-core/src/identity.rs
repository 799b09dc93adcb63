//! Maps an identity provider's subject claim onto an internal user id.
//!
//! Strategy v1: a subject that is already a UUID is used verbatim. Anything else
//! (an email, a username) becomes a name-based UUIDv5 under [`SUBJECT_NAMESPACE`],
//! so the same subject always lands on the same user. Changing the namespace or
//! the hash would orphan every provisioned user; bump the version instead.

use uuid::Uuid;

pub const IDENTITY_STRATEGY_VERSION: u8 = 1;

pub const SUBJECT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1f, 0x3c, 0x52, 0x94, 0x0e, 0x4d, 0x7a, 0xb2, 0x61, 0x0c, 0x8e, 0x5f, 0x27, 0xd4, 0x19,
]);

pub fn resolve_subject(subject: &str) -> Uuid {
    match Uuid::parse_str(subject) {
        Ok(id) => id,
        Err(_) => {
            tracing::debug!("Subject is not a UUID, deriving user id (strategy v{})", IDENTITY_STRATEGY_VERSION);
            Uuid::new_v5(&SUBJECT_NAMESPACE, subject.as_bytes())
        }
    }
}
