//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services, rather
//! than having the model read process-wide environment variables while answering queries. This
//! keeps activity queries reproducible in tests and batch reports.

use crate::constants::DEFAULT_BULK_IMPORT_WARN_THRESHOLD;
use crate::validation::parse_instant;
use crate::{CohortError, CohortResult};
use chrono::{DateTime, Utc};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    fixed_as_of: Option<DateTime<Utc>>,
    bulk_import_warn_threshold: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            fixed_as_of: None,
            bulk_import_warn_threshold: DEFAULT_BULK_IMPORT_WARN_THRESHOLD,
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `fixed_as_of` pins the instant returned by [`CoreConfig::now`]; `None` uses the system
    /// clock.
    pub fn new(
        fixed_as_of: Option<DateTime<Utc>>,
        bulk_import_warn_threshold: usize,
    ) -> CohortResult<Self> {
        if bulk_import_warn_threshold == 0 {
            return Err(CohortError::InvalidInput(
                "bulk_import_warn_threshold must be greater than zero".into(),
            ));
        }

        Ok(Self {
            fixed_as_of,
            bulk_import_warn_threshold,
        })
    }

    /// The instant treated as "now" by services built on this configuration.
    pub fn now(&self) -> DateTime<Utc> {
        self.fixed_as_of.unwrap_or_else(Utc::now)
    }

    pub fn fixed_as_of(&self) -> Option<DateTime<Utc>> {
        self.fixed_as_of
    }

    pub fn bulk_import_warn_threshold(&self) -> usize {
        self.bulk_import_warn_threshold
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the fixed as-of instant from an optional environment value.
///
/// `None` or a blank value means "use the system clock".
pub fn as_of_from_env_value(value: Option<String>) -> CohortResult<Option<DateTime<Utc>>> {
    non_blank(value).map(|v| parse_instant(&v)).transpose()
}

/// Parse the bulk-import warning threshold from an optional environment value.
///
/// If `value` is `None` or blank, returns [`DEFAULT_BULK_IMPORT_WARN_THRESHOLD`].
pub fn bulk_import_threshold_from_env_value(value: Option<String>) -> CohortResult<usize> {
    let Some(raw) = non_blank(value) else {
        return Ok(DEFAULT_BULK_IMPORT_WARN_THRESHOLD);
    };

    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CohortError::InvalidInput(format!(
            "bulk import warning threshold must be a positive integer, got: '{}'",
            raw
        ))),
    }
}
