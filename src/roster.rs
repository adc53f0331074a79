//! Partitioning of a roster against per-group memberships, and the add/remove
//! diff used to replace a group's membership.
//!
//! Everything here is a pure function of its inputs. Mutation happens through
//! [`crate::api::SchoolApi`], driven by [`crate::services::MembershipSync`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{GroupId, Member, MemberId, Paralelo};

/// Memberships of every loaded group, keyed by group id.
#[derive(Debug, Clone, Default)]
pub struct MembershipMap {
    groups: BTreeMap<GroupId, GroupMembers>,
    /// Groups whose member list could not be loaded.
    unknown: BTreeSet<GroupId>,
}

#[derive(Debug, Clone)]
struct GroupMembers {
    label: String,
    members: Vec<Member>,
}

impl MembershipMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the member list of one group, replacing any previous list.
    pub fn insert(&mut self, group_id: GroupId, label: impl Into<String>, members: Vec<Member>) {
        self.unknown.remove(&group_id);
        self.groups.insert(
            group_id,
            GroupMembers {
                label: label.into(),
                members,
            },
        );
    }

    pub fn insert_paralelo(&mut self, paralelo: &Paralelo, members: Vec<Member>) {
        self.insert(paralelo.id, paralelo.label(), members);
    }

    /// Records that `group_id` exists but its members are unknown.
    pub fn mark_unknown(&mut self, group_id: GroupId) {
        self.groups.remove(&group_id);
        self.unknown.insert(group_id);
    }

    pub fn unknown_groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.unknown.iter().copied()
    }

    /// False while any group's members are unknown.
    pub fn is_complete(&self) -> bool {
        self.unknown.is_empty()
    }

    pub fn label(&self, group_id: GroupId) -> Option<&str> {
        self.groups.get(&group_id).map(|g| g.label.as_str())
    }

    pub fn members(&self, group_id: GroupId) -> &[Member] {
        self.groups
            .get(&group_id)
            .map(|g| g.members.as_slice())
            .unwrap_or(&[])
    }

    pub fn member_ids(&self, group_id: GroupId) -> BTreeSet<MemberId> {
        self.members(group_id).iter().map(|m| m.id).collect()
    }

    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups each member id appears in. A member listed twice by the same
    /// group counts once.
    fn groups_by_member(&self) -> HashMap<MemberId, Vec<GroupId>> {
        let mut index: HashMap<MemberId, Vec<GroupId>> = HashMap::new();
        for (group_id, group) in &self.groups {
            for member in &group.members {
                let groups = index.entry(member.id).or_default();
                if !groups.contains(group_id) {
                    groups.push(*group_id);
                }
            }
        }
        index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignedMember {
    pub member: Member,
    pub group_id: GroupId,
    pub group_label: String,
}

/// A member listed by more than one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipConflict {
    pub member: Member,
    pub group_ids: Vec<GroupId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub unassigned: Vec<Member>,
    pub assigned: Vec<AssignedMember>,
    pub conflicted: Vec<MembershipConflict>,
}

impl Partition {
    pub fn total(&self) -> usize {
        self.unassigned.len() + self.assigned.len() + self.conflicted.len()
    }
}

/// Splits `all` into unassigned, singly assigned and conflicted members,
/// preserving roster order inside each part.
pub fn partition(all: &[Member], memberships: &MembershipMap) -> Partition {
    let index = memberships.groups_by_member();
    let mut out = Partition::default();

    for member in all {
        match index.get(&member.id).map(Vec::as_slice) {
            None | Some([]) => out.unassigned.push(member.clone()),
            Some([group_id]) => out.assigned.push(AssignedMember {
                member: member.clone(),
                group_id: *group_id,
                group_label: memberships.label(*group_id).unwrap_or_default().to_string(),
            }),
            Some(groups) => out.conflicted.push(MembershipConflict {
                member: member.clone(),
                group_ids: groups.to_vec(),
            }),
        }
    }

    out
}

/// Members that appear in no group's membership list.
pub fn unassigned(all: &[Member], memberships: &MembershipMap) -> Vec<Member> {
    partition(all, memberships).unassigned
}

/// Members that appear in exactly one group's list, with that group's label.
pub fn assigned(all: &[Member], memberships: &MembershipMap) -> Vec<AssignedMember> {
    partition(all, memberships).assigned
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncDiff {
    pub to_add: Vec<MemberId>,
    pub to_remove: Vec<MemberId>,
}

impl SyncDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// `to_add = desired - current`, `to_remove = current - desired`, both ascending.
pub fn diff_for_sync(desired: &BTreeSet<MemberId>, current: &BTreeSet<MemberId>) -> SyncDiff {
    SyncDiff {
        to_add: desired.difference(current).copied().collect(),
        to_remove: current.difference(desired).copied().collect(),
    }
}

/// Member count per group.
pub fn group_counts(memberships: &MembershipMap) -> BTreeMap<GroupId, usize> {
    memberships
        .groups
        .iter()
        .map(|(id, g)| (*id, g.members.len()))
        .collect()
}

/// Case-insensitive substring match on the member name. A blank term matches all.
pub fn filter_by_name<'a>(members: &'a [Member], term: &str) -> Vec<&'a Member> {
    let needle = term.trim().to_lowercase();
    members
        .iter()
        .filter(|m| needle.is_empty() || m.name.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupFilter {
    #[default]
    All,
    WithMembers,
    WithoutMembers,
}

/// Groups whose label or teacher name contains `term` and whose membership
/// matches `mode`.
pub fn filter_groups<'a>(
    paralelos: &'a [Paralelo],
    memberships: &MembershipMap,
    term: &str,
    mode: GroupFilter,
) -> Vec<&'a Paralelo> {
    let needle = term.trim().to_lowercase();
    paralelos
        .iter()
        .filter(|p| {
            let text = format!("{} {}", p.label(), p.teacher_name().unwrap_or_default()).to_lowercase();
            if !text.contains(&needle) {
                return false;
            }
            let has_members = !memberships.members(p.id).is_empty();
            match mode {
                GroupFilter::All => true,
                GroupFilter::WithMembers => has_members,
                GroupFilter::WithoutMembers => !has_members,
            }
        })
        .collect()
}

/// What assigning a multi-selection to `target` would do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentPlan {
    pub to_attach: Vec<MemberId>,
    pub already_in_target: Vec<MemberId>,
    /// Members that belong to another group. Attaching them would break the
    /// one-group-per-member rule, so they are left out.
    pub assigned_elsewhere: Vec<(MemberId, GroupId)>,
    /// Members that may belong to a group whose list failed to load. Held
    /// back for exclusive relations until the memberships are complete.
    pub unverified: Vec<MemberId>,
}

/// With `exclusive` unset (subjects), membership elsewhere is no obstacle.
pub fn plan_assignment(
    selected: &[MemberId],
    memberships: &MembershipMap,
    target: GroupId,
    exclusive: bool,
) -> AssignmentPlan {
    let index = memberships.groups_by_member();
    let mut plan = AssignmentPlan::default();
    let mut seen = BTreeSet::new();

    for &member_id in selected {
        if !seen.insert(member_id) {
            continue;
        }
        let groups = index.get(&member_id).map(Vec::as_slice).unwrap_or(&[]);
        if groups.contains(&target) {
            plan.already_in_target.push(member_id);
        } else if let Some(other) = groups.first().filter(|_| exclusive) {
            plan.assigned_elsewhere.push((member_id, *other));
        } else if exclusive && !memberships.is_complete() {
            plan.unverified.push(member_id);
        } else {
            plan.to_attach.push(member_id);
        }
    }

    plan
}
