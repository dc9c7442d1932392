//! Identity tokens for cohort and membership records.
//!
//! Every cohort and membership carries an opaque identity token. Equality between records is
//! decided by this token and it is the final tie-break when memberships are ordered, so the
//! representation has to be stable across process and serialisation boundaries.
//!
//! The canonical form is **32 lowercase hexadecimal characters** (no hyphens), the same value
//! produced by `Uuid::new_v4().simple().to_string()`. Externally supplied tokens must already be
//! canonical; use [`RecordUuid::parse`] to validate them.
//!
//! Ordering of [`RecordUuid`] values is lexical over the canonical string.

mod record;

pub use record::{RecordUuid, Uuid};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
