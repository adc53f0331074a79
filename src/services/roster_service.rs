use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::api::SchoolApi;
use crate::capacity::{CapacityGuard, GroupChoice};
use crate::error::AppError;
use crate::models::{GroupId, Member, Paralelo, Relation};
use crate::roster::{self, MembershipMap, Partition};
use crate::scope::ViewScope;

/// Everything the assignment views render for one relation.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    pub relation: Relation,
    pub paralelos: Vec<Paralelo>,
    pub roster: Vec<Member>,
    pub memberships: MembershipMap,
    /// Groups whose membership could not be fetched. Their members show up as
    /// unassigned, and `memberships` marks them unknown so exclusive
    /// assignments are held back.
    pub failed_groups: Vec<GroupId>,
}

impl RosterSnapshot {
    pub fn partition(&self) -> Partition {
        roster::partition(&self.roster, &self.memberships)
    }

    pub fn counts(&self) -> BTreeMap<GroupId, usize> {
        roster::group_counts(&self.memberships)
    }

    pub fn choices(&self, guard: &CapacityGuard, incoming: u32) -> Vec<GroupChoice> {
        guard.choices(&self.paralelos, &self.counts(), incoming)
    }

    pub fn is_complete(&self) -> bool {
        self.failed_groups.is_empty()
    }
}

pub struct RosterService {
    api: Arc<dyn SchoolApi>,
}

impl RosterService {
    pub fn new(api: Arc<dyn SchoolApi>) -> Self {
        Self { api }
    }

    /// Loads groups, roster and every group's members.
    ///
    /// Returns `Ok(None)` when `scope` was invalidated while loading.
    pub async fn load(
        &self,
        relation: Relation,
        scope: &ViewScope,
    ) -> Result<Option<RosterSnapshot>, AppError> {
        let loaded = scope.settle(self.fetch(relation)).await;
        match loaded {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }

    async fn fetch(&self, relation: Relation) -> Result<RosterSnapshot, AppError> {
        let (paralelos, roster) = futures::try_join!(
            self.api.fetch_paralelos(),
            self.api.fetch_roster(relation)
        )?;

        let api = &self.api;
        let fetches = paralelos.iter().map(|p| async move {
            (p, api.fetch_members(relation, p.id).await)
        });

        let mut memberships = MembershipMap::new();
        let mut failed_groups = Vec::new();
        for (paralelo, result) in join_all(fetches).await {
            match result {
                Ok(members) => memberships.insert_paralelo(paralelo, members),
                Err(e) => {
                    warn!("Failed to load {} of paralelo {}: {}", relation, paralelo.id, e);
                    memberships.mark_unknown(paralelo.id);
                    failed_groups.push(paralelo.id);
                }
            }
        }

        info!(
            "Loaded {} paralelos and {} {}",
            paralelos.len(),
            roster.len(),
            relation
        );
        Ok(RosterSnapshot {
            relation,
            paralelos,
            roster,
            memberships,
            failed_groups,
        })
    }
}
