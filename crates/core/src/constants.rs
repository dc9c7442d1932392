//! Constants used throughout the cohort core crate.

/// Separator for legacy comma-separated member id lists.
pub const MEMBER_ID_SEPARATOR: char = ',';

/// Default size above which a bulk member-id import is logged as a warning.
pub const DEFAULT_BULK_IMPORT_WARN_THRESHOLD: usize = 100_000;

/// Environment variable holding a fixed "now" used for activity queries.
pub const AS_OF_ENV_VAR: &str = "COHORT_AS_OF";

/// Environment variable overriding [`DEFAULT_BULK_IMPORT_WARN_THRESHOLD`].
pub const BULK_IMPORT_WARN_THRESHOLD_ENV_VAR: &str = "COHORT_BULK_IMPORT_WARN_THRESHOLD";

/// Name used in place of a missing cohort name when composing set-algebra result names.
pub const UNNAMED_COHORT: &str = "NULL";
