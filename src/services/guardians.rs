use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use crate::api::SchoolApi;
use crate::error::AppError;
use crate::models::{MemberId, NewParentLink, ParentLinkFilter};
use crate::roster;
use crate::services::sync_service::{SyncOp, SyncReport};

/// Reconciles the students linked to one parent.
///
/// Links are created from a `(padre_id, estudiante_id)` pair and deleted by
/// their own id. Ids in the report are student ids.
pub struct GuardianLinks {
    api: Arc<dyn SchoolApi>,
}

impl GuardianLinks {
    pub fn new(api: Arc<dyn SchoolApi>) -> Self {
        Self { api }
    }

    /// Student ids currently linked to `padre_id`.
    pub async fn linked_students(&self, padre_id: i64) -> Result<BTreeSet<MemberId>, AppError> {
        let links = self
            .api
            .fetch_parent_links(ParentLinkFilter::for_parent(padre_id))
            .await?;
        Ok(links
            .iter()
            .filter(|l| l.padre_id == padre_id)
            .map(|l| l.estudiante_id)
            .collect())
    }

    pub async fn sync_parent(
        &self,
        padre_id: i64,
        desired: &BTreeSet<MemberId>,
    ) -> Result<SyncReport, AppError> {
        let links = self
            .api
            .fetch_parent_links(ParentLinkFilter::for_parent(padre_id))
            .await?;

        // A pair may have been linked twice; every copy goes on removal.
        let mut link_ids: BTreeMap<MemberId, Vec<i64>> = BTreeMap::new();
        for link in links.iter().filter(|l| l.padre_id == padre_id) {
            link_ids.entry(link.estudiante_id).or_default().push(link.id);
        }
        let current: BTreeSet<MemberId> = link_ids.keys().copied().collect();

        let diff = roster::diff_for_sync(desired, &current);
        if diff.is_empty() {
            return Ok(SyncReport::default());
        }
        info!(
            "Syncing links of padre {}: +{} -{}",
            padre_id,
            diff.to_add.len(),
            diff.to_remove.len()
        );

        let api = &self.api;
        let creates = diff.to_add.iter().map(|&estudiante_id| async move {
            let result = api
                .create_parent_link(NewParentLink {
                    padre_id,
                    estudiante_id,
                })
                .await
                .map(|_| ());
            (SyncOp::Add, estudiante_id, result)
        });
        let deletes = diff.to_remove.iter().map(|&estudiante_id| {
            let ids = link_ids.get(&estudiante_id).cloned().unwrap_or_default();
            async move {
                let mut result = Ok(());
                for id in ids {
                    if let Err(e) = api.delete_parent_link(id).await {
                        result = Err(e);
                        break;
                    }
                }
                (SyncOp::Remove, estudiante_id, result)
            }
        });

        let (mut results, removed) = futures::join!(join_all(creates), join_all(deletes));
        results.extend(removed);
        let report = SyncReport::from_results(results);
        info!("Links of padre {}: {}", padre_id, report);
        Ok(report)
    }
}
