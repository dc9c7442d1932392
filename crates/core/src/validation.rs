//! Input validation and parsing utilities.
//!
//! Everything a caller hands to the cohort model as text passes through here so that malformed
//! input is rejected before any collection is touched.

use crate::constants::MEMBER_ID_SEPARATOR;
use crate::{CohortError, CohortResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use cohort_types::{NonEmptyText, SubjectId, SubjectIdError};

/// Parses a comma-separated list of subject ids.
///
/// Segments are trimmed and blank segments are skipped, so `"1, 2,,3 "` yields `[1, 2, 3]`.
/// Order and duplicates are preserved; de-duplication is left to the caller.
///
/// # Errors
///
/// Returns [`CohortError::InvalidSubjectId`] for the first segment that is not an integer.
pub fn parse_subject_ids(input: &str) -> CohortResult<Vec<SubjectId>> {
    let mut ids = Vec::new();
    for (position, segment) in input.split(MEMBER_ID_SEPARATOR).enumerate() {
        match segment.parse::<SubjectId>() {
            Ok(id) => ids.push(id),
            Err(SubjectIdError::Blank) => continue,
            Err(source) => return Err(CohortError::InvalidSubjectId { position, source }),
        }
    }
    Ok(ids)
}

/// Parses an instant given as RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`.
///
/// Naive values are interpreted as UTC; a bare date means midnight at the start of that day.
pub fn parse_instant(input: &str) -> CohortResult<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Some(naive) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }

    Err(CohortError::InvalidDate {
        input: input.to_string(),
    })
}

/// Validates a void reason, which must contain at least one non-whitespace character.
pub fn validate_void_reason(reason: &str) -> CohortResult<NonEmptyText> {
    NonEmptyText::new(reason).map_err(|_| CohortError::MissingVoidReason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_subject_ids_trims_and_skips_blanks() {
        let ids = parse_subject_ids(" 1, 2,,3 ,").unwrap();
        let raw: Vec<i32> = ids.into_iter().map(SubjectId::get).collect();
        assert_eq!(raw, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_subject_ids_empty_input_is_empty() {
        assert!(parse_subject_ids("").unwrap().is_empty());
        assert!(parse_subject_ids(" , ,").unwrap().is_empty());
    }

    #[test]
    fn test_parse_subject_ids_reports_bad_token_position() {
        let err = parse_subject_ids("1,2,abc,4").unwrap_err();
        match err {
            CohortError::InvalidSubjectId { position, source } => {
                assert_eq!(position, 2);
                assert!(source.to_string().contains("abc"));
            }
            other => panic!("expected InvalidSubjectId, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_instant_accepts_all_formats() {
        let date_only = parse_instant("2017-01-31").unwrap();
        assert_eq!((date_only.year(), date_only.month(), date_only.day()), (2017, 1, 31));
        assert_eq!(date_only.hour(), 0);

        let with_time = parse_instant("2017-01-01 12:30:00").unwrap();
        assert_eq!((with_time.hour(), with_time.minute()), (12, 30));

        let rfc = parse_instant("2017-01-01T12:00:00+02:00").unwrap();
        assert_eq!(rfc.hour(), 10);
    }

    #[test]
    fn test_parse_instant_rejects_garbage() {
        assert!(matches!(
            parse_instant("31/01/2017"),
            Err(CohortError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_validate_void_reason() {
        assert_eq!(validate_void_reason(" duplicate ").unwrap().as_str(), "duplicate");
        assert!(matches!(
            validate_void_reason("  "),
            Err(CohortError::MissingVoidReason)
        ));
    }
}
