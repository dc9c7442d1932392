//! A single subject's membership in a cohort over a time interval.
//!
//! Whether a membership is in effect at an instant depends only on its own start and end dates
//! and its voided flag. Memberships are never physically deleted in normal workflows; they are
//! voided (keeping who, when and why) or ended by setting an end date.

use chrono::{DateTime, Utc};
use cohort_types::{NonEmptyText, SubjectId};
use cohort_uuid::RecordUuid;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A timestamped, voidable record of a subject's association with a cohort.
///
/// Equality and hashing use the identity token only, so two copies of the same record compare
/// equal even after one of them has been edited.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Membership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    membership_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner_id: Option<i32>,
    subject_id: SubjectId,
    #[serde(default)]
    start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    voided: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    voided_by: Option<NonEmptyText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date_voided: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    void_reason: Option<NonEmptyText>,
    #[serde(default)]
    uuid: RecordUuid,
}

impl Membership {
    /// Creates a membership starting now, with no end date.
    pub fn new(subject_id: impl Into<SubjectId>) -> Self {
        Self::build(subject_id.into(), Some(Utc::now()))
    }

    /// Creates a membership starting at `start_date`, with no end date.
    pub fn with_start_date(subject_id: impl Into<SubjectId>, start_date: DateTime<Utc>) -> Self {
        Self::build(subject_id.into(), Some(start_date))
    }

    /// Creates a membership with neither start nor end date; it is active at every instant
    /// until voided.
    pub fn unbounded(subject_id: impl Into<SubjectId>) -> Self {
        Self::build(subject_id.into(), None)
    }

    fn build(subject_id: SubjectId, start_date: Option<DateTime<Utc>>) -> Self {
        Self {
            membership_id: None,
            owner_id: None,
            subject_id,
            start_date,
            end_date: None,
            voided: false,
            voided_by: None,
            date_voided: None,
            void_reason: None,
            uuid: RecordUuid::new(),
        }
    }

    pub fn membership_id(&self) -> Option<i32> {
        self.membership_id
    }

    /// Id of the cohort that owns this record, if it has been added to a saved cohort.
    pub fn owner_id(&self) -> Option<i32> {
        self.owner_id
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn voided(&self) -> bool {
        self.voided
    }

    pub fn voided_by(&self) -> Option<&NonEmptyText> {
        self.voided_by.as_ref()
    }

    pub fn date_voided(&self) -> Option<DateTime<Utc>> {
        self.date_voided
    }

    pub fn void_reason(&self) -> Option<&NonEmptyText> {
        self.void_reason.as_ref()
    }

    pub fn uuid(&self) -> RecordUuid {
        self.uuid
    }

    pub fn set_membership_id(&mut self, membership_id: Option<i32>) {
        self.membership_id = membership_id;
    }

    pub fn set_start_date(&mut self, start_date: Option<DateTime<Utc>>) {
        self.start_date = start_date;
    }

    pub fn set_end_date(&mut self, end_date: Option<DateTime<Utc>>) {
        self.end_date = end_date;
    }

    /// Sets the voided flag without touching void metadata. Prefer [`Membership::void`].
    pub fn set_voided(&mut self, voided: bool) {
        self.voided = voided;
    }

    pub(crate) fn set_owner_id(&mut self, owner_id: Option<i32>) {
        self.owner_id = owner_id;
    }

    /// Returns whether this membership is in effect at `as_of` (now if `None`).
    ///
    /// A voided membership is never active. Otherwise the interval `[start_date, end_date]` is
    /// closed at both ends, and a missing bound is unbounded.
    pub fn is_active(&self, as_of: Option<DateTime<Utc>>) -> bool {
        self.is_active_at(as_of.unwrap_or_else(Utc::now))
    }

    pub fn is_active_at(&self, as_of: DateTime<Utc>) -> bool {
        if self.voided {
            return false;
        }
        let started = self.start_date.map_or(true, |start| start <= as_of);
        let not_ended = self.end_date.map_or(true, |end| as_of <= end);
        started && not_ended
    }

    /// Marks the record as logically deleted.
    pub fn void(
        &mut self,
        reason: NonEmptyText,
        voided_by: Option<NonEmptyText>,
        date_voided: DateTime<Utc>,
    ) {
        self.voided = true;
        self.void_reason = Some(reason);
        self.voided_by = voided_by;
        self.date_voided = Some(date_voided);
    }

    /// Restores a voided record and clears its void metadata.
    pub fn unvoid(&mut self) {
        self.voided = false;
        self.void_reason = None;
        self.voided_by = None;
        self.date_voided = None;
    }

    /// Ends the membership at `end_date`.
    pub fn end(&mut self, end_date: DateTime<Utc>) {
        self.end_date = Some(end_date);
    }

    /// Copy of this record for a different cohort: same subject, dates and void state, but a
    /// fresh identity and no owner or database id.
    pub(crate) fn copy_for_new_owner(&self) -> Self {
        Self {
            membership_id: None,
            owner_id: None,
            uuid: RecordUuid::new(),
            ..self.clone()
        }
    }

    /// Display/sort order for memberships.
    ///
    /// Start dates are compared first, then end dates, then identity tokens. A missing date is
    /// treated as the latest possible value and the date comparison is reversed, so an unbounded
    /// start comes before any concrete start and concrete dates run most recent first. Owner and
    /// subject ids break the remaining ties between records from different cohorts.
    pub fn compare_to(&self, other: &Self) -> Ordering {
        compare_with_none_as_latest(self.start_date, other.start_date)
            .reverse()
            .then_with(|| compare_with_none_as_latest(self.end_date, other.end_date).reverse())
            .then_with(|| self.uuid.cmp(&other.uuid))
            .then_with(|| self.owner_id.cmp(&other.owner_id))
            .then_with(|| self.subject_id.cmp(&other.subject_id))
    }
}

fn compare_with_none_as_latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

impl PartialEq for Membership {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for Membership {}

impl Hash for Membership {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}
