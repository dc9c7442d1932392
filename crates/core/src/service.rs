//! In-memory cohort registry.
//!
//! [`CohortService`] owns a collection of cohorts keyed by id and implements the cohort
//! workflows that span more than one cohort: lookups by name or uuid, finding the cohorts a
//! patient belongs to, and propagating a patient's void/unvoid to all of their memberships.
//!
//! The registry is a plain owned value mutated through `&mut self`; callers sharing it between
//! threads wrap it in their own lock.

use crate::cohort::Cohort;
use crate::config::CoreConfig;
use crate::error::{CohortError, CohortResult};
use crate::membership::Membership;
use crate::validation::validate_void_reason;
use crate::SetOperation;
use chrono::{DateTime, Utc};
use cohort_types::{NonEmptyText, SubjectId};
use cohort_uuid::RecordUuid;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of cohorts with the service-level cohort operations.
#[derive(Clone, Debug)]
pub struct CohortService {
    cfg: Arc<CoreConfig>,
    cohorts: BTreeMap<i32, Cohort>,
    next_cohort_id: i32,
    next_membership_id: i32,
}

impl CohortService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            cohorts: BTreeMap::new(),
            next_cohort_id: 1,
            next_membership_id: 1,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Stores a cohort, assigning a cohort id on first save and membership ids to any records
    /// that lack one. Returns the cohort id.
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::MissingCohortName`] if the cohort has no name.
    pub fn save_cohort(&mut self, mut cohort: Cohort) -> CohortResult<i32> {
        if cohort.name().is_none() {
            return Err(CohortError::MissingCohortName);
        }

        let cohort_id = match cohort.cohort_id() {
            Some(id) => {
                self.next_cohort_id = self.next_cohort_id.max(id.saturating_add(1));
                id
            }
            None => {
                let id = self.next_cohort_id;
                self.next_cohort_id = id.checked_add(1).ok_or_else(|| {
                    CohortError::InvalidInput("cohort id space exhausted".into())
                })?;
                id
            }
        };
        cohort.set_cohort_id(Some(cohort_id));

        cohort.assign_missing_membership_ids(&mut self.next_membership_id);

        tracing::info!(
            cohort_id,
            members = cohort.size(),
            records = cohort.memberships().len(),
            "saved cohort"
        );
        self.cohorts.insert(cohort_id, cohort);
        Ok(cohort_id)
    }

    pub fn get_cohort(&self, cohort_id: i32) -> Option<&Cohort> {
        self.cohorts.get(&cohort_id)
    }

    pub fn get_cohort_by_uuid(&self, uuid: RecordUuid) -> Option<&Cohort> {
        self.cohorts.values().find(|c| c.uuid() == uuid)
    }

    /// Looks a cohort up by exact name, preferring a non-voided one when several share it.
    pub fn get_cohort_by_name(&self, name: &str) -> Option<&Cohort> {
        let mut matching = self
            .cohorts
            .values()
            .filter(|c| c.name().is_some_and(|n| n.as_str() == name));
        let first = matching.next()?;
        if !first.voided() {
            return Some(first);
        }
        matching.find(|c| !c.voided()).or(Some(first))
    }

    /// Non-voided cohorts whose name contains `fragment`, ignoring case.
    pub fn get_cohorts(&self, fragment: &str) -> Vec<&Cohort> {
        let fragment = fragment.to_lowercase();
        self.cohorts
            .values()
            .filter(|c| !c.voided())
            .filter(|c| {
                c.name()
                    .is_some_and(|n| n.as_str().to_lowercase().contains(&fragment))
            })
            .collect()
    }

    pub fn get_all_cohorts(&self, include_voided: bool) -> Vec<&Cohort> {
        self.cohorts
            .values()
            .filter(|c| include_voided || !c.voided())
            .collect()
    }

    /// Physically deletes a cohort and all of its memberships.
    pub fn purge_cohort(&mut self, cohort_id: i32) -> CohortResult<Cohort> {
        let cohort = self
            .cohorts
            .remove(&cohort_id)
            .ok_or(CohortError::CohortNotFound(cohort_id))?;
        tracing::info!(cohort_id, "purged cohort");
        Ok(cohort)
    }

    /// Voids a cohort. An already-voided cohort keeps its original void metadata.
    pub fn void_cohort(
        &mut self,
        cohort_id: i32,
        reason: &str,
        voided_by: Option<NonEmptyText>,
    ) -> CohortResult<&Cohort> {
        let reason = validate_void_reason(reason)?;
        let now = self.cfg.now();
        let cohort = self.cohort_mut(cohort_id)?;
        if cohort.void(reason, voided_by, now) {
            tracing::info!(cohort_id, "voided cohort");
        }
        Ok(&*cohort)
    }

    pub fn unvoid_cohort(&mut self, cohort_id: i32) -> CohortResult<&Cohort> {
        let cohort = self.cohort_mut(cohort_id)?;
        cohort.unvoid();
        Ok(&*cohort)
    }

    /// Non-voided cohorts in which the patient has a membership active now.
    pub fn cohorts_containing_patient(&self, patient_id: impl Into<SubjectId>) -> Vec<&Cohort> {
        let patient_id = patient_id.into();
        let now = self.cfg.now();
        self.cohorts
            .values()
            .filter(|c| !c.voided() && c.has_active_membership(patient_id, Some(now)))
            .collect()
    }

    /// Adds the patient unless the cohort already contains them. Returns whether a record was
    /// added.
    pub fn add_patient_to_cohort(
        &mut self,
        cohort_id: i32,
        patient_id: impl Into<SubjectId>,
    ) -> CohortResult<bool> {
        let patient_id = patient_id.into();
        let now = self.cfg.now();
        let membership_id = self.next_membership_id;
        let cohort = self.cohort_mut(cohort_id)?;
        if cohort.contains(patient_id) {
            return Ok(false);
        }

        let mut membership = Membership::with_start_date(patient_id, now);
        membership.set_membership_id(Some(membership_id));
        cohort.add_membership(membership);
        self.next_membership_id += 1;

        tracing::info!(cohort_id, %patient_id, "added patient to cohort");
        Ok(true)
    }

    /// Voids the patient's memberships in the cohort. A patient who is not a member is not an
    /// error. Returns how many records were voided.
    pub fn remove_patient_from_cohort(
        &mut self,
        cohort_id: i32,
        patient_id: impl Into<SubjectId>,
        voided_by: Option<&NonEmptyText>,
    ) -> CohortResult<usize> {
        let patient_id = patient_id.into();
        let reason = validate_void_reason("removed from cohort")?;
        let now = self.cfg.now();
        let cohort = self.cohort_mut(cohort_id)?;
        let voided = cohort.void_memberships_for(patient_id, &reason, voided_by, now);
        if voided > 0 {
            tracing::info!(cohort_id, %patient_id, voided, "removed patient from cohort");
        }
        Ok(voided)
    }

    pub fn get_cohort_membership_by_uuid(&self, uuid: RecordUuid) -> Option<&Membership> {
        self.cohorts
            .values()
            .find_map(|c| c.membership_by_uuid(uuid))
    }

    pub fn void_cohort_membership(
        &mut self,
        uuid: RecordUuid,
        reason: &str,
        voided_by: Option<NonEmptyText>,
    ) -> CohortResult<&Membership> {
        let reason = validate_void_reason(reason)?;
        let now = self.cfg.now();
        let cohort = self.owner_of_mut(uuid)?;
        cohort.void_membership(uuid, reason, voided_by, now)?;
        Self::membership_in(cohort, uuid)
    }

    pub fn end_cohort_membership(
        &mut self,
        uuid: RecordUuid,
        end_date: DateTime<Utc>,
    ) -> CohortResult<&Membership> {
        let cohort = self.owner_of_mut(uuid)?;
        cohort.end_membership(uuid, end_date)?;
        Self::membership_in(cohort, uuid)
    }

    /// Physically deletes one membership record.
    pub fn purge_cohort_membership(&mut self, uuid: RecordUuid) -> CohortResult<Membership> {
        let cohort = self.owner_of_mut(uuid)?;
        cohort
            .remove_membership(uuid)
            .ok_or_else(|| CohortError::MembershipNotFound(uuid.to_string()))
    }

    /// Voids every non-voided membership of a patient who has just been voided, copying the
    /// patient's void metadata. Returns how many records were voided.
    pub fn notify_patient_voided(
        &mut self,
        patient_id: impl Into<SubjectId>,
        voided_by: Option<&NonEmptyText>,
        date_voided: DateTime<Utc>,
        reason: &str,
    ) -> CohortResult<usize> {
        let patient_id = patient_id.into();
        let reason = validate_void_reason(reason)?;
        let voided: usize = self
            .cohorts
            .values_mut()
            .map(|c| c.void_memberships_for(patient_id, &reason, voided_by, date_voided))
            .sum();
        tracing::info!(%patient_id, voided, "voided memberships of voided patient");
        Ok(voided)
    }

    /// Unvoids the memberships that were voided together with the patient, identified by
    /// matching `voided_by` and `date_voided`. Returns how many records were restored.
    pub fn notify_patient_unvoided(
        &mut self,
        patient_id: impl Into<SubjectId>,
        voided_by: Option<&NonEmptyText>,
        date_voided: DateTime<Utc>,
    ) -> usize {
        let patient_id = patient_id.into();
        let mut restored = 0;
        for cohort in self.cohorts.values_mut() {
            for m in cohort.subject_memberships_mut(patient_id) {
                if m.voided() && m.voided_by() == voided_by && m.date_voided() == Some(date_voided)
                {
                    m.unvoid();
                    restored += 1;
                }
            }
        }
        tracing::info!(%patient_id, restored, "unvoided memberships of unvoided patient");
        restored
    }

    /// A patient's memberships across all cohorts, ordered by cohort id then membership id.
    ///
    /// With `active_on` only records active at that instant are returned; voided records are
    /// included only when `include_voided` is set.
    pub fn get_cohort_memberships(
        &self,
        patient_id: impl Into<SubjectId>,
        active_on: Option<DateTime<Utc>>,
        include_voided: bool,
    ) -> Vec<&Membership> {
        let patient_id = patient_id.into();
        let mut found: Vec<&Membership> = self
            .cohorts
            .values()
            .flat_map(|c| c.memberships_for(patient_id))
            .filter(|m| include_voided || !m.voided())
            .filter(|m| active_on.map_or(true, |at| m.is_active_at(at)))
            .collect();
        found.sort_by_key(|m| (m.owner_id(), m.membership_id()));
        found
    }

    /// Replaces a stored cohort's members with the given ids.
    pub fn set_member_ids<I>(&mut self, cohort_id: i32, subject_ids: I) -> CohortResult<usize>
    where
        I: IntoIterator,
        I::Item: Into<SubjectId>,
    {
        let threshold = self.cfg.bulk_import_warn_threshold();
        let cohort = self
            .cohorts
            .get_mut(&cohort_id)
            .ok_or(CohortError::CohortNotFound(cohort_id))?;
        cohort.set_member_ids(subject_ids);
        cohort.assign_missing_membership_ids(&mut self.next_membership_id);
        let size = cohort.size();
        if size > threshold {
            tracing::warn!(cohort_id, size, threshold, "large bulk member import");
        }
        Ok(size)
    }

    /// Set algebra over two stored cohorts. The result is not stored.
    ///
    /// # Errors
    ///
    /// An unknown cohort id is reported as [`CohortError::MissingCohort`] for that side.
    pub fn combine(&self, op: SetOperation, left_id: i32, right_id: i32) -> CohortResult<Cohort> {
        op.apply(self.get_cohort(left_id), self.get_cohort(right_id))
    }

    fn cohort_mut(&mut self, cohort_id: i32) -> CohortResult<&mut Cohort> {
        self.cohorts
            .get_mut(&cohort_id)
            .ok_or(CohortError::CohortNotFound(cohort_id))
    }

    fn owner_of_mut(&mut self, uuid: RecordUuid) -> CohortResult<&mut Cohort> {
        self.cohorts
            .values_mut()
            .find(|c| c.membership_by_uuid(uuid).is_some())
            .ok_or_else(|| CohortError::MembershipNotFound(uuid.to_string()))
    }

    fn membership_in(cohort: &Cohort, uuid: RecordUuid) -> CohortResult<&Membership> {
        cohort
            .membership_by_uuid(uuid)
            .ok_or_else(|| CohortError::MembershipNotFound(uuid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::parse_instant;

    fn dt(s: &str) -> DateTime<Utc> {
        parse_instant(s).unwrap()
    }

    fn text(s: &str) -> NonEmptyText {
        NonEmptyText::new(s).unwrap()
    }

    fn service_at(now: &str) -> CohortService {
        let cfg = CoreConfig::new(Some(dt(now)), 100).unwrap();
        CohortService::new(Arc::new(cfg))
    }

    fn named(name: &str, ids: &str) -> Cohort {
        let mut cohort = Cohort::from_id_str(ids).unwrap();
        cohort.set_name(Some(text(name)));
        cohort
    }

    #[test]
    fn test_save_cohort_assigns_ids() {
        let mut service = service_at("2020-01-01");

        let id = service.save_cohort(named("Study", "1,2")).unwrap();
        let cohort = service.get_cohort(id).unwrap();

        assert_eq!(cohort.cohort_id(), Some(id));
        assert!(cohort
            .memberships()
            .iter()
            .all(|m| m.owner_id() == Some(id) && m.membership_id().is_some()));
        assert_eq!(service.save_cohort(named("Other", "3")).unwrap(), id + 1);
    }

    #[test]
    fn test_save_cohort_requires_name() {
        let mut service = service_at("2020-01-01");
        let result = service.save_cohort(Cohort::from_id_str("1").unwrap());
        assert!(matches!(result, Err(CohortError::MissingCohortName)));
        assert!(service.get_all_cohorts(true).is_empty());
    }

    #[test]
    fn test_save_existing_cohort_updates_it() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Study", "1")).unwrap();

        let mut cohort = service.get_cohort(id).unwrap().clone();
        cohort.set_description(Some("updated".into()));
        assert_eq!(service.save_cohort(cohort).unwrap(), id);

        assert_eq!(service.get_cohort(id).unwrap().description(), Some("updated"));
        assert_eq!(service.get_all_cohorts(true).len(), 1);
    }

    #[test]
    fn test_lookups_by_uuid_and_name() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Example Cohort", "1")).unwrap();
        let uuid = service.get_cohort(id).unwrap().uuid();

        assert_eq!(service.get_cohort_by_uuid(uuid).unwrap().cohort_id(), Some(id));
        assert!(service.get_cohort_by_uuid(RecordUuid::new()).is_none());
        assert_eq!(
            service.get_cohort_by_name("Example Cohort").unwrap().cohort_id(),
            Some(id)
        );
        assert!(service.get_cohort_by_name("Missing").is_none());
    }

    #[test]
    fn test_get_cohort_by_name_prefers_non_voided() {
        let mut service = service_at("2020-01-01");
        let voided_id = service.save_cohort(named("Dup", "1")).unwrap();
        service.void_cohort(voided_id, "old", None).unwrap();
        let live_id = service.save_cohort(named("Dup", "2")).unwrap();

        assert_eq!(service.get_cohort_by_name("Dup").unwrap().cohort_id(), Some(live_id));
    }

    #[test]
    fn test_get_cohorts_matches_partial_name() {
        let mut service = service_at("2020-01-01");
        service.save_cohort(named("Example Cohort", "1")).unwrap();
        service.save_cohort(named("Another Example", "2")).unwrap();
        let voided = service.save_cohort(named("Voided example", "3")).unwrap();
        service.void_cohort(voided, "gone", None).unwrap();

        assert_eq!(service.get_cohorts("example").len(), 2);
        assert!(service.get_cohorts("nothing").is_empty());
        assert_eq!(service.get_all_cohorts(false).len(), 2);
        assert_eq!(service.get_all_cohorts(true).len(), 3);
    }

    #[test]
    fn test_void_cohort_requires_reason() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Study", "1")).unwrap();

        assert!(matches!(
            service.void_cohort(id, "  ", None),
            Err(CohortError::MissingVoidReason)
        ));
        assert!(!service.get_cohort(id).unwrap().voided());
    }

    #[test]
    fn test_void_cohort_keeps_existing_reason() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Study", "1")).unwrap();

        service.void_cohort(id, "already voided", Some(text("admin"))).unwrap();
        let cohort = service.void_cohort(id, "voided for test", None).unwrap();

        assert_eq!(cohort.void_reason().map(NonEmptyText::as_str), Some("already voided"));
        assert_eq!(cohort.date_voided(), Some(dt("2020-01-01")));

        let cohort = service.unvoid_cohort(id).unwrap();
        assert!(!cohort.voided());
    }

    #[test]
    fn test_purge_cohort() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Study", "1")).unwrap();

        assert!(service.purge_cohort(id).is_ok());
        assert!(service.get_cohort(id).is_none());
        assert!(matches!(
            service.purge_cohort(id),
            Err(CohortError::CohortNotFound(_))
        ));
    }

    #[test]
    fn test_add_patient_to_cohort_is_idempotent() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Study", "1")).unwrap();

        assert!(service.add_patient_to_cohort(id, 3).unwrap());
        assert!(!service.add_patient_to_cohort(id, 3).unwrap());

        let cohort = service.get_cohort(id).unwrap();
        assert!(cohort.contains(3));
        let added = cohort.memberships_for(3).next().unwrap();
        assert_eq!(added.start_date(), Some(dt("2020-01-01")));
        assert!(added.membership_id().is_some());
    }

    #[test]
    fn test_add_patient_to_unknown_cohort_fails() {
        let mut service = service_at("2020-01-01");
        assert!(matches!(
            service.add_patient_to_cohort(99, 1),
            Err(CohortError::CohortNotFound(99))
        ));
    }

    #[test]
    fn test_remove_patient_from_cohort() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Study", "1,2")).unwrap();

        assert_eq!(service.remove_patient_from_cohort(id, 4, None).unwrap(), 0);
        assert_eq!(service.remove_patient_from_cohort(id, 1, None).unwrap(), 1);

        let cohort = service.get_cohort(id).unwrap();
        assert!(!cohort.contains(1));
        assert_eq!(cohort.memberships().len(), 2);
    }

    #[test]
    fn test_cohorts_containing_patient_excludes_ended_and_voided() {
        let mut service = service_at("2020-06-01");
        let active = service.save_cohort(named("Active", "7")).unwrap();

        let mut ended = Membership::with_start_date(7, dt("2017-01-01"));
        ended.set_end_date(Some(dt("2017-01-31")));
        let mut ended_cohort = Cohort::from_memberships([ended]);
        ended_cohort.set_name(Some(text("Ended")));
        service.save_cohort(ended_cohort).unwrap();

        let voided = service.save_cohort(named("Voided", "7")).unwrap();
        service.void_cohort(voided, "gone", None).unwrap();

        let found: Vec<Option<i32>> = service
            .cohorts_containing_patient(7)
            .into_iter()
            .map(Cohort::cohort_id)
            .collect();
        assert_eq!(found, vec![Some(active)]);
    }

    #[test]
    fn test_membership_lifecycle_by_uuid() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Study", "1,2,3")).unwrap();
        let uuids: Vec<RecordUuid> = service
            .get_cohort(id)
            .unwrap()
            .memberships()
            .iter()
            .map(Membership::uuid)
            .collect();

        let voided = service
            .void_cohort_membership(uuids[0], "Some reason", Some(text("admin")))
            .unwrap();
        assert!(voided.voided());
        assert_eq!(voided.date_voided(), Some(dt("2020-01-01")));
        assert_eq!(voided.void_reason().map(NonEmptyText::as_str), Some("Some reason"));

        let ended = service
            .end_cohort_membership(uuids[1], dt("2020-01-01"))
            .unwrap();
        assert_eq!(ended.end_date(), Some(dt("2020-01-01")));

        let purged = service.purge_cohort_membership(uuids[2]).unwrap();
        assert_eq!(purged.subject_id(), SubjectId::new(3));
        assert!(service.get_cohort_membership_by_uuid(uuids[2]).is_none());

        let cohort = service.get_cohort(id).unwrap();
        assert!(!cohort.contains(1));
        assert!(cohort.contains(2));
        assert!(!cohort.contains(3));
    }

    #[test]
    fn test_unknown_membership_uuid_is_not_found() {
        let mut service = service_at("2020-01-01");
        service.save_cohort(named("Study", "1")).unwrap();

        assert!(service.get_cohort_membership_by_uuid(RecordUuid::new()).is_none());
        assert!(matches!(
            service.void_cohort_membership(RecordUuid::new(), "reason", None),
            Err(CohortError::MembershipNotFound(_))
        ));
    }

    #[test]
    fn test_patient_void_and_unvoid_propagate() {
        let mut service = service_at("2020-01-01");
        let first = service.save_cohort(named("First", "7,8")).unwrap();
        let second = service.save_cohort(named("Second", "7")).unwrap();
        let admin = text("admin");
        let when = dt("2020-02-02");

        let voided = service
            .notify_patient_voided(7, Some(&admin), when, "patient voided")
            .unwrap();
        assert_eq!(voided, 2);
        assert!(!service.get_cohort(first).unwrap().contains(7));
        assert!(!service.get_cohort(second).unwrap().contains(7));
        assert!(service.get_cohort(first).unwrap().contains(8));

        let m = service.get_cohort(first).unwrap().memberships_for(7).next().unwrap();
        assert_eq!(m.voided_by(), Some(&admin));
        assert_eq!(m.date_voided(), Some(when));

        // Records voided on a different occasion stay voided.
        assert_eq!(service.notify_patient_unvoided(7, Some(&admin), dt("2021-01-01")), 0);
        assert_eq!(service.notify_patient_unvoided(7, Some(&admin), when), 2);

        let m = service.get_cohort(first).unwrap().memberships_for(7).next().unwrap();
        assert!(!m.voided());
        assert!(m.voided_by().is_none());
        assert!(m.date_voided().is_none());
        assert!(m.void_reason().is_none());
    }

    #[test]
    fn test_get_cohort_memberships_for_patient() {
        let mut service = service_at("2020-01-01");
        let mut old = Membership::with_start_date(6, dt("2015-01-01"));
        old.set_end_date(Some(dt("2016-01-01")));
        let mut first = Cohort::from_memberships([old]);
        first.set_name(Some(text("First")));
        let first_id = service.save_cohort(first).unwrap();

        let mut current = Cohort::from_memberships([Membership::with_start_date(6, dt("2019-01-01"))]);
        current.set_name(Some(text("Second")));
        let second_id = service.save_cohort(current).unwrap();

        let all = service.get_cohort_memberships(6, None, false);
        assert_eq!(
            all.iter().map(|m| m.owner_id()).collect::<Vec<_>>(),
            vec![Some(first_id), Some(second_id)]
        );

        let now = service.get_cohort_memberships(6, Some(dt("2020-01-01")), false);
        assert_eq!(now.len(), 1);
        assert_eq!(now[0].owner_id(), Some(second_id));

        assert!(service
            .get_cohort_memberships(6, Some(dt("1999-12-31")), false)
            .is_empty());
    }

    #[test]
    fn test_get_cohort_memberships_voided_filter() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Study", "6")).unwrap();
        service.remove_patient_from_cohort(id, 6, None).unwrap();

        assert!(service.get_cohort_memberships(6, None, false).is_empty());
        assert_eq!(service.get_cohort_memberships(6, None, true).len(), 1);
    }

    #[test]
    fn test_set_member_ids_on_stored_cohort() {
        let mut service = service_at("2020-01-01");
        let id = service.save_cohort(named("Study", "1")).unwrap();

        let size = service.set_member_ids(id, 0..500).unwrap();

        assert_eq!(size, 500);
        let cohort = service.get_cohort(id).unwrap();
        assert!(cohort
            .memberships()
            .iter()
            .all(|m| m.owner_id() == Some(id) && m.membership_id().is_some()));
        assert!(!cohort.contains(500));

        let memberships = service.get_cohort_memberships(5, None, false);
        assert_eq!(memberships.len(), 1);
        assert!(memberships[0].membership_id().is_some());
    }

    #[test]
    fn test_save_cohort_at_max_id_does_not_overflow() {
        let mut service = service_at("2020-01-01");
        let mut top = named("Top", "1");
        top.set_cohort_id(Some(i32::MAX));
        assert_eq!(service.save_cohort(top).unwrap(), i32::MAX);

        let err = service.save_cohort(named("Next", "2")).unwrap_err();
        assert!(matches!(err, CohortError::InvalidInput(_)));
        assert!(service.get_cohort_by_name("Next").is_none());
    }

    #[test]
    fn test_combine_stored_cohorts() {
        let mut service = service_at("2020-01-01");
        let a = service.save_cohort(named("A", "1,2,3")).unwrap();
        let b = service.save_cohort(named("B", "2,3,4")).unwrap();

        let union = service.combine(SetOperation::Union, a, b).unwrap();
        assert_eq!(union.size(), 4);
        assert_eq!(union.name().map(NonEmptyText::as_str), Some("(A + B)"));
        assert!(union.memberships().iter().all(|m| m.owner_id().is_none()));

        let intersection = service.combine(SetOperation::Intersect, a, b).unwrap();
        assert_eq!(intersection.size(), 2);

        assert!(matches!(
            service.combine(SetOperation::Subtract, a, 99),
            Err(CohortError::MissingCohort { side: "right", .. })
        ));
    }
}
