//! Set algebra over cohorts.
//!
//! Union, intersection and difference work on the full historical record: voided and expired
//! memberships are carried into the result rather than filtered out. Membership in the *other*
//! operand is decided by [`Cohort::contains`] (any non-voided record, dates ignored).
//!
//! Results are new cohorts holding copies of the source records, so later edits to a result
//! never reach either input.

use crate::cohort::Cohort;
use crate::constants::UNNAMED_COHORT;
use crate::error::{CohortError, CohortResult};
use crate::membership::Membership;
use cohort_types::NonEmptyText;
use std::fmt;
use std::str::FromStr;

/// One of the three binary cohort operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SetOperation {
    Union,
    Intersect,
    Subtract,
}

impl SetOperation {
    fn symbol(self) -> char {
        match self {
            SetOperation::Union => '+',
            SetOperation::Intersect => '*',
            SetOperation::Subtract => '-',
        }
    }

    /// Applies the operation to operands that may be missing.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::MissingCohort`] naming the absent side if either operand is `None`.
    pub fn apply(self, a: Option<&Cohort>, b: Option<&Cohort>) -> CohortResult<Cohort> {
        let a = a.ok_or(CohortError::MissingCohort {
            operation: self.as_str(),
            side: "left",
        })?;
        let b = b.ok_or(CohortError::MissingCohort {
            operation: self.as_str(),
            side: "right",
        })?;

        Ok(match self {
            SetOperation::Union => Cohort::union(a, b),
            SetOperation::Intersect => Cohort::intersect(a, b),
            SetOperation::Subtract => Cohort::subtract(a, b),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SetOperation::Union => "union",
            SetOperation::Intersect => "intersect",
            SetOperation::Subtract => "subtract",
        }
    }
}

impl fmt::Display for SetOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SetOperation {
    type Err = CohortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "union" => Ok(SetOperation::Union),
            "intersect" | "intersection" => Ok(SetOperation::Intersect),
            "subtract" | "difference" => Ok(SetOperation::Subtract),
            other => Err(CohortError::InvalidInput(format!(
                "unknown set operation '{}' (expected union, intersect or subtract)",
                other
            ))),
        }
    }
}

impl Cohort {
    /// Every record of `a` followed by every record of `b`. Records are never merged, so a
    /// subject present in both keeps one record per source.
    pub fn union(a: &Cohort, b: &Cohort) -> Cohort {
        combine(
            SetOperation::Union,
            a,
            b,
            a.memberships().iter().chain(b.memberships()),
        )
    }

    /// Records of `a` whose subject is contained in `b`, followed by records of `b` whose
    /// subject is contained in `a`. Voided and expired records are included, each keeping the
    /// metadata of its own source, so the result holds the same subjects in either operand order.
    pub fn intersect(a: &Cohort, b: &Cohort) -> Cohort {
        let from_a = a
            .memberships()
            .iter()
            .filter(|m| b.contains(m.subject_id()));
        let from_b = b
            .memberships()
            .iter()
            .filter(|m| a.contains(m.subject_id()));
        combine(SetOperation::Intersect, a, b, from_a.chain(from_b))
    }

    /// Records of `a` whose subject is not contained in `b`, voided and expired ones included.
    pub fn subtract(a: &Cohort, b: &Cohort) -> Cohort {
        combine(
            SetOperation::Subtract,
            a,
            b,
            a.memberships()
                .iter()
                .filter(|m| !b.contains(m.subject_id())),
        )
    }
}

fn combine<'a, I>(op: SetOperation, a: &Cohort, b: &Cohort, records: I) -> Cohort
where
    I: Iterator<Item = &'a Membership>,
{
    let mut result = Cohort::from_memberships(records.map(Membership::copy_for_new_owner));
    result.set_name(NonEmptyText::new(result_name(op, a, b)).ok());

    tracing::debug!(
        operation = %op,
        left = %a.uuid(),
        right = %b.uuid(),
        records = result.memberships().len(),
        "combined cohorts"
    );

    result
}

fn result_name(op: SetOperation, a: &Cohort, b: &Cohort) -> String {
    let name = |c: &Cohort| {
        c.name()
            .map(NonEmptyText::as_str)
            .unwrap_or(UNNAMED_COHORT)
            .to_string()
    };
    format!("({} {} {})", name(a), op.symbol(), name(b))
}
