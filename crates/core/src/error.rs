use cohort_types::SubjectIdError;

#[derive(Debug, thiserror::Error)]
pub enum CohortError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid subject id at position {position}: {source}")]
    InvalidSubjectId {
        position: usize,
        #[source]
        source: SubjectIdError,
    },
    #[error("{operation} requires both cohorts, but the {side} cohort is missing")]
    MissingCohort {
        operation: &'static str,
        side: &'static str,
    },
    #[error("invalid date '{input}': expected YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339")]
    InvalidDate { input: String },
    #[error("void reason is required")]
    MissingVoidReason,
    #[error("cohort name is required")]
    MissingCohortName,
    #[error("cohort {0} not found")]
    CohortNotFound(i32),
    #[error("cohort membership {0} not found")]
    MembershipNotFound(String),
}

pub type CohortResult<T> = std::result::Result<T, CohortError>;
