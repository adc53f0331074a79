use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::SchoolApi;
use crate::capacity::CapacityGuard;
use crate::error::AppError;
use crate::models::{GroupId, Member, MemberId, Relation};
use crate::roster::{self, MembershipMap, SyncDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub member_id: MemberId,
    pub op: SyncOp,
    pub error: String,
    pub retryable: bool,
}

/// Per-id outcome of a batch of add/remove calls. The backend has no
/// transaction spanning them, so a report may be partially applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub added: Vec<MemberId>,
    pub removed: Vec<MemberId>,
    /// Selected but not attempted (already present, or held by another group).
    pub skipped: Vec<MemberId>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn attempted(&self) -> usize {
        self.added.len() + self.removed.len() + self.failures.len()
    }

    pub fn succeeded(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// e.g. `3 of 4 succeeded`.
    pub fn summary(&self) -> String {
        format!("{} of {} succeeded", self.succeeded(), self.attempted())
    }

    /// The failed operations, ready to be re-issued.
    pub fn retry_diff(&self) -> SyncDiff {
        let mut diff = SyncDiff::default();
        for failure in &self.failures {
            match failure.op {
                SyncOp::Add => diff.to_add.push(failure.member_id),
                SyncOp::Remove => diff.to_remove.push(failure.member_id),
            }
        }
        diff
    }

    fn record(&mut self, op: SyncOp, member_id: MemberId, result: Result<(), AppError>) {
        match result {
            Ok(()) => match op {
                SyncOp::Add => self.added.push(member_id),
                SyncOp::Remove => self.removed.push(member_id),
            },
            Err(e) => {
                warn!("{:?} of member {} failed: {}", op, member_id, e);
                self.failures.push(SyncFailure {
                    member_id,
                    op,
                    retryable: e.is_retryable(),
                    error: e.to_string(),
                });
            }
        }
    }

    pub(crate) fn from_results(results: Vec<(SyncOp, MemberId, Result<(), AppError>)>) -> Self {
        let mut report = SyncReport::default();
        for (op, member_id, result) in results {
            report.record(op, member_id, result);
        }
        report
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Reconciles a paralelo's students or subjects with a desired set.
pub struct MembershipSync {
    api: Arc<dyn SchoolApi>,
    guard: CapacityGuard,
}

impl MembershipSync {
    pub fn new(api: Arc<dyn SchoolApi>, guard: CapacityGuard) -> Self {
        Self { api, guard }
    }

    /// Brings the group to exactly `desired`, one attach/detach call per changed id.
    pub async fn sync(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        desired: &BTreeSet<MemberId>,
    ) -> Result<SyncReport, AppError> {
        let current: BTreeSet<MemberId> = self
            .api
            .fetch_members(relation, paralelo_id)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();

        let diff = roster::diff_for_sync(desired, &current);
        if diff.is_empty() {
            info!("Paralelo {} {} already in sync", paralelo_id, relation);
            return Ok(SyncReport::default());
        }

        info!(
            "Syncing paralelo {} {}: +{} -{}",
            paralelo_id,
            relation,
            diff.to_add.len(),
            diff.to_remove.len()
        );
        let report = self.apply(relation, paralelo_id, &diff).await;
        info!("Sync of paralelo {} {}: {}", paralelo_id, relation, report);
        Ok(report)
    }

    /// Issues every call of `diff` concurrently and aggregates the outcomes.
    pub async fn apply(&self, relation: Relation, paralelo_id: GroupId, diff: &SyncDiff) -> SyncReport {
        let api = &self.api;

        let adds = diff.to_add.iter().map(|&id| async move {
            (
                SyncOp::Add,
                id,
                api.attach_member(relation, paralelo_id, id).await,
            )
        });
        let removes = diff.to_remove.iter().map(|&id| async move {
            (
                SyncOp::Remove,
                id,
                api.detach_member(relation, paralelo_id, id).await,
            )
        });

        let (mut results, removed) = futures::join!(join_all(adds), join_all(removes));
        results.extend(removed);
        SyncReport::from_results(results)
    }

    /// Attaches a multi-selection to `paralelo_id`.
    ///
    /// The capacity check is advisory and only logged; the backend decides.
    /// For students, members already held by another paralelo are skipped, and
    /// so is every other candidate while some paralelo's members are unknown.
    pub async fn assign_selected(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        selected: &[MemberId],
        memberships: &MembershipMap,
    ) -> SyncReport {
        let plan = roster::plan_assignment(selected, memberships, paralelo_id, relation.is_exclusive());

        let current = memberships.members(paralelo_id).len() as u32;
        let incoming = plan.to_attach.len() as u32;
        if !self.guard.can_assign(current, incoming) {
            warn!(
                "Paralelo {} would exceed capacity: {} + {} > {}",
                paralelo_id,
                current,
                incoming,
                self.guard.capacity()
            );
        }
        for (member_id, other) in &plan.assigned_elsewhere {
            warn!("Member {} already belongs to paralelo {}, skipped", member_id, other);
        }
        if !plan.unverified.is_empty() {
            warn!(
                "Memberships of paralelos {:?} are unknown, {} members not assigned",
                memberships.unknown_groups().collect::<Vec<_>>(),
                plan.unverified.len()
            );
        }

        let diff = SyncDiff {
            to_add: plan.to_attach.clone(),
            to_remove: Vec::new(),
        };
        let mut report = self.apply(relation, paralelo_id, &diff).await;
        report.skipped.extend(plan.already_in_target);
        report
            .skipped
            .extend(plan.assigned_elsewhere.iter().map(|(id, _)| *id));
        report.skipped.extend(plan.unverified);
        report
    }

    /// Replaces the whole set in one server-side call.
    pub async fn replace(
        &self,
        relation: Relation,
        paralelo_id: GroupId,
        desired: &BTreeSet<MemberId>,
    ) -> Result<Vec<Member>, AppError> {
        let ids: Vec<MemberId> = desired.iter().copied().collect();
        self.api.replace_members(relation, paralelo_id, &ids).await
    }
}
