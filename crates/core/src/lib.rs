//! # Cohort Core
//!
//! In-memory cohort model for a medical record system:
//! - [`Membership`]: one subject's time-bounded, voidable association with a cohort
//! - [`Cohort`]: the owning set, with containment and point-in-time activity queries
//! - set algebra ([`Cohort::union`], [`Cohort::intersect`], [`Cohort::subtract`]) that keeps
//!   voided and expired records in its results
//! - [`CohortService`]: an in-memory registry for cross-cohort workflows
//!
//! **No persistence or API concerns**: flushing cohorts to storage and rendering them for a
//! REST API belong to the callers. Everything here is synchronous and lock-free; a caller that
//! shares a cohort between threads provides its own synchronisation.

pub mod algebra;
pub mod cohort;
pub mod config;
pub mod constants;
pub mod error;
pub mod membership;
pub mod service;
pub mod validation;

pub use algebra::SetOperation;
pub use cohort::Cohort;
pub use config::CoreConfig;
pub use error::{CohortError, CohortResult};
pub use membership::Membership;
pub use service::CohortService;

pub use cohort_types::{NonEmptyText, Subject, SubjectId, TextError};
pub use cohort_uuid::{RecordUuid, UuidError};
