//! The cohort aggregate: a named set of subjects held as timestamped memberships.
//!
//! A [`Cohort`] exclusively owns its [`Membership`] records. Callers read them through an
//! immutable slice and change them only through the methods here, which keeps the per-subject
//! index consistent with the record list.
//!
//! Two membership questions are deliberately different:
//! - [`Cohort::contains`] asks "is there any non-voided record for this subject", ignoring dates;
//! - [`Cohort::has_active_membership`] asks "is this subject a member at instant T".

use crate::error::{CohortError, CohortResult};
use crate::membership::Membership;
use crate::validation::parse_subject_ids;
use chrono::{DateTime, Utc};
use cohort_types::{NonEmptyText, Subject, SubjectId};
use cohort_uuid::RecordUuid;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

/// A group of subjects and the memberships that place them in it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "CohortRecord")]
pub struct Cohort {
    #[serde(skip_serializing_if = "Option::is_none")]
    cohort_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<NonEmptyText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    uuid: RecordUuid,
    voided: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    voided_by: Option<NonEmptyText>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_voided: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    void_reason: Option<NonEmptyText>,
    memberships: Vec<Membership>,
    /// Positions in `memberships` for each subject, voided records included.
    #[serde(skip)]
    by_subject: HashMap<SubjectId, Vec<usize>>,
}

/// Wire shape of a cohort; the subject index is rebuilt from it on load.
#[derive(Deserialize)]
struct CohortRecord {
    #[serde(default)]
    cohort_id: Option<i32>,
    #[serde(default)]
    name: Option<NonEmptyText>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    uuid: RecordUuid,
    #[serde(default)]
    voided: bool,
    #[serde(default)]
    voided_by: Option<NonEmptyText>,
    #[serde(default)]
    date_voided: Option<DateTime<Utc>>,
    #[serde(default)]
    void_reason: Option<NonEmptyText>,
    #[serde(default)]
    memberships: Vec<Membership>,
}

impl From<CohortRecord> for Cohort {
    fn from(record: CohortRecord) -> Self {
        let mut cohort = Cohort {
            cohort_id: record.cohort_id,
            name: record.name,
            description: record.description,
            uuid: record.uuid,
            voided: record.voided,
            voided_by: record.voided_by,
            date_voided: record.date_voided,
            void_reason: record.void_reason,
            memberships: record.memberships,
            by_subject: HashMap::new(),
        };
        cohort.rebuild_index();
        cohort
    }
}

impl Cohort {
    /// Creates an empty, unnamed cohort.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cohort with the given name.
    pub fn named(name: NonEmptyText) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    /// Builds a cohort from a comma-separated list of subject ids, e.g. `"1, 2,3"`.
    ///
    /// Blank segments are skipped. Each distinct id gets one unbounded, non-voided membership.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::InvalidSubjectId`] if any segment is not an integer; no cohort is
    /// built in that case.
    pub fn from_id_str(ids: &str) -> CohortResult<Self> {
        let ids = parse_subject_ids(ids)?;
        let mut cohort = Self::new();
        cohort.set_member_ids(ids);
        Ok(cohort)
    }

    /// Builds a cohort from subjects, preserving their order as insertion order.
    pub fn from_subjects<I>(subjects: I) -> Self
    where
        I: IntoIterator,
        I::Item: Subject,
    {
        let mut cohort = Self::new();
        cohort.set_member_ids(subjects.into_iter().map(|s| s.subject_id()));
        cohort
    }

    /// Builds a cohort holding exactly the given records.
    pub fn from_memberships<I>(memberships: I) -> Self
    where
        I: IntoIterator<Item = Membership>,
    {
        let mut cohort = Self::new();
        for membership in memberships {
            cohort.add_membership(membership);
        }
        cohort
    }

    pub fn cohort_id(&self) -> Option<i32> {
        self.cohort_id
    }

    pub fn name(&self) -> Option<&NonEmptyText> {
        self.name.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn uuid(&self) -> RecordUuid {
        self.uuid
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

    /// Sets the cohort id and re-points every owned membership at it.
    pub fn set_cohort_id(&mut self, cohort_id: Option<i32>) {
        self.cohort_id = cohort_id;
        for m in &mut self.memberships {
            m.set_owner_id(cohort_id);
        }
    }

    pub fn set_name(&mut self, name: Option<NonEmptyText>) {
        self.name = name;
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Voids the cohort itself. Returns `false`, leaving the existing metadata untouched, if it
    /// was already voided.
    pub fn void(
        &mut self,
        reason: NonEmptyText,
        voided_by: Option<NonEmptyText>,
        date_voided: DateTime<Utc>,
    ) -> bool {
        if self.voided {
            return false;
        }
        self.voided = true;
        self.void_reason = Some(reason);
        self.voided_by = voided_by;
        self.date_voided = Some(date_voided);
        true
    }

    pub fn unvoid(&mut self) {
        self.voided = false;
        self.void_reason = None;
        self.voided_by = None;
        self.date_voided = None;
    }

    /// Every record, voided and expired ones included, in insertion order.
    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }

    /// Records filtered by voided state.
    pub fn get_memberships(&self, include_voided: bool) -> Vec<&Membership> {
        self.memberships
            .iter()
            .filter(|m| include_voided || !m.voided())
            .collect()
    }

    /// Records in effect at `as_of` (now if `None`).
    pub fn active_memberships(&self, as_of: Option<DateTime<Utc>>) -> Vec<&Membership> {
        let as_of = as_of.unwrap_or_else(Utc::now);
        self.memberships
            .iter()
            .filter(|m| m.is_active_at(as_of))
            .collect()
    }

    /// All records for one subject, voided ones included.
    pub fn memberships_for(
        &self,
        subject_id: impl Into<SubjectId>,
    ) -> impl Iterator<Item = &Membership> + '_ {
        let positions = self
            .by_subject
            .get(&subject_id.into())
            .map(Vec::as_slice)
            .unwrap_or_default();
        positions.iter().map(move |&i| &self.memberships[i])
    }

    pub fn membership_by_uuid(&self, uuid: RecordUuid) -> Option<&Membership> {
        self.memberships.iter().find(|m| m.uuid() == uuid)
    }

    /// Records in [`Membership::compare_to`] order.
    pub fn sorted_memberships(&self) -> Vec<&Membership> {
        let mut sorted: Vec<&Membership> = self.memberships.iter().collect();
        sorted.sort_by(|a, b| a.compare_to(b));
        sorted
    }

    /// True if the subject has at least one non-voided record. Dates are not checked.
    pub fn contains(&self, subject_id: impl Into<SubjectId>) -> bool {
        self.has_non_voided(subject_id.into())
    }

    fn has_non_voided(&self, subject_id: SubjectId) -> bool {
        self.by_subject
            .get(&subject_id)
            .is_some_and(|positions| positions.iter().any(|&i| !self.memberships[i].voided()))
    }

    /// Number of distinct subjects with a non-voided record.
    pub fn size(&self) -> usize {
        self.by_subject
            .keys()
            .filter(|&&id| self.has_non_voided(id))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Distinct subjects with a non-voided record, in ascending order.
    pub fn member_ids(&self) -> BTreeSet<SubjectId> {
        self.by_subject
            .keys()
            .copied()
            .filter(|&id| self.has_non_voided(id))
            .collect()
    }

    pub fn has_active_membership(
        &self,
        subject_id: impl Into<SubjectId>,
        as_of: Option<DateTime<Utc>>,
    ) -> bool {
        let as_of = as_of.unwrap_or_else(Utc::now);
        self.memberships_for(subject_id)
            .any(|m| m.is_active_at(as_of))
    }

    /// Number of active records at `as_of`. Counts records, not subjects.
    pub fn active_membership_size(&self, as_of: Option<DateTime<Utc>>) -> usize {
        self.active_memberships(as_of).len()
    }

    pub fn has_no_active_memberships(&self, as_of: Option<DateTime<Utc>>) -> bool {
        let as_of = as_of.unwrap_or_else(Utc::now);
        !self.memberships.iter().any(|m| m.is_active_at(as_of))
    }

    /// Appends a record. No de-duplication is performed.
    pub fn add_membership(&mut self, mut membership: Membership) {
        membership.set_owner_id(self.cohort_id);
        self.by_subject
            .entry(membership.subject_id())
            .or_default()
            .push(self.memberships.len());
        self.memberships.push(membership);
    }

    /// Adds a membership starting now unless the subject is already contained.
    ///
    /// Returns whether a record was added.
    pub fn add_member(&mut self, subject_id: impl Into<SubjectId>) -> bool {
        let subject_id = subject_id.into();
        if self.contains(subject_id) {
            return false;
        }
        self.add_membership(Membership::new(subject_id));
        true
    }

    /// Physically removes every record for the subject and returns them.
    pub fn remove_member(&mut self, subject_id: impl Into<SubjectId>) -> Vec<Membership> {
        let subject_id = subject_id.into();
        if !self.by_subject.contains_key(&subject_id) {
            return Vec::new();
        }
        let (removed, kept): (Vec<Membership>, Vec<Membership>) = std::mem::take(&mut self.memberships)
            .into_iter()
            .partition(|m| m.subject_id() == subject_id);
        self.memberships = kept;
        self.rebuild_index();
        removed
    }

    /// Physically removes a single record.
    pub fn remove_membership(&mut self, uuid: RecordUuid) -> Option<Membership> {
        let position = self.memberships.iter().position(|m| m.uuid() == uuid)?;
        let removed = self.memberships.remove(position);
        self.rebuild_index();
        Some(removed)
    }

    /// Replaces all records with one unbounded, non-voided membership per distinct id.
    ///
    /// Runs in a single pass with hash-based duplicate detection.
    pub fn set_member_ids<I>(&mut self, subject_ids: I)
    where
        I: IntoIterator,
        I::Item: Into<SubjectId>,
    {
        let subject_ids = subject_ids.into_iter();
        let (lower, _) = subject_ids.size_hint();

        self.memberships = Vec::with_capacity(lower);
        self.by_subject = HashMap::with_capacity(lower);

        for id in subject_ids {
            if let Entry::Vacant(slot) = self.by_subject.entry(id.into()) {
                let mut membership = Membership::unbounded(*slot.key());
                membership.set_owner_id(self.cohort_id);
                slot.insert(vec![self.memberships.len()]);
                self.memberships.push(membership);
            }
        }

        tracing::debug!(
            cohort_uuid = %self.uuid,
            members = self.memberships.len(),
            "replaced cohort members"
        );
    }

    fn membership_mut(&mut self, uuid: RecordUuid) -> CohortResult<&mut Membership> {
        self.memberships
            .iter_mut()
            .find(|m| m.uuid() == uuid)
            .ok_or_else(|| CohortError::MembershipNotFound(uuid.to_string()))
    }

    /// Voids one record, addressed by its identity token.
    pub fn void_membership(
        &mut self,
        uuid: RecordUuid,
        reason: NonEmptyText,
        voided_by: Option<NonEmptyText>,
        date_voided: DateTime<Utc>,
    ) -> CohortResult<()> {
        self.membership_mut(uuid)?
            .void(reason, voided_by, date_voided);
        Ok(())
    }

    pub fn unvoid_membership(&mut self, uuid: RecordUuid) -> CohortResult<()> {
        self.membership_mut(uuid)?.unvoid();
        Ok(())
    }

    pub fn end_membership(&mut self, uuid: RecordUuid, end_date: DateTime<Utc>) -> CohortResult<()> {
        self.membership_mut(uuid)?.end(end_date);
        Ok(())
    }

    /// Voids every non-voided record of a subject. Returns how many were voided.
    pub fn void_memberships_for(
        &mut self,
        subject_id: impl Into<SubjectId>,
        reason: &NonEmptyText,
        voided_by: Option<&NonEmptyText>,
        date_voided: DateTime<Utc>,
    ) -> usize {
        let mut voided = 0;
        for m in self.subject_memberships_mut(subject_id.into()) {
            if !m.voided() {
                m.void(reason.clone(), voided_by.cloned(), date_voided);
                voided += 1;
            }
        }
        voided
    }

    /// Mutable access to one subject's records. Subject ids cannot change through
    /// `&mut Membership`, so the index stays valid.
    pub(crate) fn subject_memberships_mut(
        &mut self,
        subject_id: SubjectId,
    ) -> impl Iterator<Item = &mut Membership> + '_ {
        self.memberships
            .iter_mut()
            .filter(move |m| m.subject_id() == subject_id)
    }

    /// Gives every record without a membership id the next id from `next_id`.
    pub(crate) fn assign_missing_membership_ids(&mut self, next_id: &mut i32) {
        for m in self.memberships.iter_mut().filter(|m| m.membership_id().is_none()) {
            m.set_membership_id(Some(*next_id));
            *next_id += 1;
        }
    }

    fn rebuild_index(&mut self) {
        self.by_subject.clear();
        for (position, m) in self.memberships.iter().enumerate() {
            self.by_subject
                .entry(m.subject_id())
                .or_default()
                .push(position);
        }
    }
}
