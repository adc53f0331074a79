mod common;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Notify;

use aula::capacity::CapacityGuard;
use aula::models::{MemberId, Relation};
use aula::roster::MembershipMap;
use aula::scope::ViewScope;
use aula::services::{MembershipSync, RosterService, SyncOp};
use common::{FakeApi, members, paralelo};

fn set(ids: &[MemberId]) -> BTreeSet<MemberId> {
    ids.iter().copied().collect()
}

#[tokio::test]
async fn test_sync_adds_and_removes_to_reach_desired() {
    let api = Arc::new(FakeApi::default().with_members(Relation::Students, 20, &[1, 2, 3]));
    let sync = MembershipSync::new(api.clone(), CapacityGuard::default());

    let report = sync
        .sync(Relation::Students, 20, &set(&[2, 3, 4]))
        .await
        .unwrap();

    assert_eq!(report.added, vec![4]);
    assert_eq!(report.removed, vec![1]);
    assert!(report.is_complete());
    assert_eq!(report.summary(), "2 of 2 succeeded");
    assert_eq!(api.member_ids(Relation::Students, 20), vec![2, 3, 4]);
}

#[tokio::test]
async fn test_sync_without_changes_issues_no_calls() {
    let api = Arc::new(FakeApi::default().with_members(Relation::Subjects, 5, &[7, 8]));
    let sync = MembershipSync::new(api.clone(), CapacityGuard::default());

    let report = sync.sync(Relation::Subjects, 5, &set(&[8, 7])).await.unwrap();

    assert_eq!(report.attempted(), 0);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_sync_reports_partial_failure_per_id() {
    let api = FakeApi {
        failing: HashSet::from([4, 1]),
        ..Default::default()
    }
    .with_members(Relation::Students, 20, &[1, 2, 3]);
    let api = Arc::new(api);
    let sync = MembershipSync::new(api.clone(), CapacityGuard::default());

    let report = sync
        .sync(Relation::Students, 20, &set(&[2, 4, 5]))
        .await
        .unwrap();

    assert_eq!(report.added, vec![5]);
    assert_eq!(report.removed, vec![3]);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.retryable));
    assert_eq!(report.summary(), "2 of 4 succeeded");

    let retry = report.retry_diff();
    assert_eq!(retry.to_add, vec![4]);
    assert_eq!(retry.to_remove, vec![1]);

    // Successful calls stay applied.
    assert_eq!(api.member_ids(Relation::Students, 20), vec![1, 2, 5]);
}

#[tokio::test]
async fn test_assign_selected_skips_members_of_other_groups() {
    let api = Arc::new(
        FakeApi::default()
            .with_members(Relation::Students, 1, &[10])
            .with_members(Relation::Students, 2, &[20]),
    );
    let mut memberships = MembershipMap::new();
    memberships.insert_paralelo(&paralelo(1, "1", "A"), members(&[10]));
    memberships.insert_paralelo(&paralelo(2, "1", "B"), members(&[20]));

    let sync = MembershipSync::new(api.clone(), CapacityGuard::new(2));
    let report = sync
        .assign_selected(Relation::Students, 1, &[10, 20, 30], &memberships)
        .await;

    assert_eq!(report.added, vec![30]);
    assert_eq!(report.skipped, vec![10, 20]);
    assert_eq!(api.member_ids(Relation::Students, 1), vec![10, 30]);
    assert_eq!(api.member_ids(Relation::Students, 2), vec![20]);
}

#[tokio::test]
async fn test_assign_selected_over_capacity_still_attaches() {
    let api = Arc::new(FakeApi::default().with_members(Relation::Students, 1, &[1, 2]));
    let mut memberships = MembershipMap::new();
    memberships.insert_paralelo(&paralelo(1, "1", "A"), members(&[1, 2]));

    let sync = MembershipSync::new(api.clone(), CapacityGuard::new(2));
    let report = sync
        .assign_selected(Relation::Students, 1, &[3], &memberships)
        .await;

    assert_eq!(report.added, vec![3]);
    assert_eq!(api.member_ids(Relation::Students, 1), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_replace_uses_single_call() {
    let api = Arc::new(FakeApi::default().with_members(Relation::Subjects, 3, &[1]));
    let sync = MembershipSync::new(api.clone(), CapacityGuard::default());

    let members = sync
        .replace(Relation::Subjects, 3, &set(&[4, 2]))
        .await
        .unwrap();

    assert_eq!(members.len(), 2);
    assert_eq!(api.calls(), vec!["replace materias 3 [2, 4]".to_string()]);
}

#[tokio::test]
async fn test_failure_ops_are_labelled() {
    let api = Arc::new(FakeApi {
        failing: HashSet::from([9]),
        ..Default::default()
    });
    let sync = MembershipSync::new(api, CapacityGuard::default());

    let report = sync.sync(Relation::Students, 1, &set(&[9])).await.unwrap();
    assert_eq!(report.failures[0].op, SyncOp::Add);
    assert_eq!(report.failures[0].member_id, 9);
}

#[tokio::test]
async fn test_roster_service_loads_snapshot() {
    let api = FakeApi {
        paralelos: vec![paralelo(1, "3", "A"), paralelo(2, "3", "B")],
        roster: HashMap::from([(Relation::Students, members(&[1, 2, 3, 4, 5]))]),
        ..Default::default()
    }
    .with_members(Relation::Students, 1, &[2, 4]);
    let service = RosterService::new(Arc::new(api));

    let snapshot = service
        .load(Relation::Students, &ViewScope::new())
        .await
        .unwrap()
        .unwrap();

    let parts = snapshot.partition();
    assert_eq!(parts.unassigned.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 3, 5]);
    assert_eq!(parts.assigned.len(), 2);
    assert!(snapshot.is_complete());

    let choices = snapshot.choices(&CapacityGuard::new(3), 2);
    assert!(!choices[0].enabled);
    assert!(choices[1].enabled);
}

#[tokio::test]
async fn test_roster_service_reports_failed_groups() {
    let api = FakeApi {
        paralelos: vec![paralelo(1, "3", "A"), paralelo(2, "3", "B")],
        roster: HashMap::from([(Relation::Students, members(&[1, 2]))]),
        failing_groups: HashSet::from([2]),
        ..Default::default()
    }
    .with_members(Relation::Students, 1, &[1]);
    let service = RosterService::new(Arc::new(api));

    let snapshot = service
        .load(Relation::Students, &ViewScope::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(snapshot.failed_groups, vec![2]);
    assert!(!snapshot.is_complete());
    assert_eq!(snapshot.memberships.members(1).len(), 1);
}

#[tokio::test]
async fn test_roster_service_discards_result_of_closed_view() {
    let gate = Arc::new(Notify::new());
    let api = FakeApi {
        paralelos: vec![paralelo(1, "3", "A")],
        gate: Some(gate.clone()),
        ..Default::default()
    };
    let service = RosterService::new(Arc::new(api));
    let scope = ViewScope::new();

    let (loaded, ()) = tokio::join!(service.load(Relation::Students, &scope), async {
        scope.invalidate();
        gate.notify_one();
    });

    assert!(loaded.unwrap().is_none());
}

#[tokio::test]
async fn test_assign_holds_back_students_while_a_group_failed_to_load() {
    let api = FakeApi {
        paralelos: vec![paralelo(1, "3", "A"), paralelo(2, "3", "B")],
        roster: HashMap::from([(Relation::Students, members(&[1, 2, 3]))]),
        failing_groups: HashSet::from([2]),
        ..Default::default()
    }
    .with_members(Relation::Students, 1, &[1])
    .with_members(Relation::Students, 2, &[3]);
    let api = Arc::new(api);

    let snapshot = RosterService::new(api.clone())
        .load(Relation::Students, &ViewScope::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.memberships.unknown_groups().collect::<Vec<_>>(), vec![2]);

    let sync = MembershipSync::new(api.clone(), CapacityGuard::default());
    let report = sync
        .assign_selected(Relation::Students, 1, &[1, 3], &snapshot.memberships)
        .await;

    assert_eq!(report.attempted(), 0);
    assert_eq!(report.skipped, vec![1, 3]);
    assert_eq!(api.member_ids(Relation::Students, 1), vec![1]);
}
