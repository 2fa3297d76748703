//! Thread deletion
//!
//! Removes a strand together with every transitive reply and prunes the
//! removed ids from the membership lists of the authors and communities that
//! referenced them.
//!
//! Strategy:
//! 1. Walk the reply tree from the target (explicit stack, visited set)
//! 2. Resolve the distinct authors and communities of the deletion set
//! 3. Hand the resulting [`DeletionPlan`] to the store (delete, then prune)
//! 4. Signal revalidation for the caller's path hint
//!
//! A cancellation flag (`watch::Receiver<bool>`) is checked before every
//! storage call up to the point the plan is handed to the store.

use crate::cache::PathRevalidator;
use crate::db::{DeletionCounts, DeletionPlan, StrandStore};
use crate::error::ThreadError;
use crate::metrics::thread_deletion as metrics;
use crate::models::Strand;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use uuid::Uuid;

/// Outcome of a completed thread deletion
#[derive(Debug, Clone, Serialize)]
pub struct ThreadDeletion {
    #[serde(flatten)]
    pub plan: DeletionPlan,
    pub counts: DeletionCounts,
}

#[derive(Clone)]
pub struct ThreadDeletionEngine {
    store: Arc<dyn StrandStore>,
    revalidator: Arc<dyn PathRevalidator>,
}

pub(crate) fn ensure_active(
    cancel: Option<&watch::Receiver<bool>>,
    step: &'static str,
) -> Result<(), ThreadError> {
    match cancel {
        Some(rx) if *rx.borrow() => Err(ThreadError::Cancelled { step }),
        _ => Ok(()),
    }
}

/// Distinct ids in first-seen order
fn distinct(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

impl ThreadDeletionEngine {
    pub fn new(store: Arc<dyn StrandStore>, revalidator: Arc<dyn PathRevalidator>) -> Self {
        Self { store, revalidator }
    }

    /// Delete `strand_id` and all of its descendants
    pub async fn delete_thread(
        &self,
        strand_id: Uuid,
        path_hint: &str,
    ) -> Result<ThreadDeletion, ThreadError> {
        self.run(strand_id, path_hint, None).await
    }

    /// Same as [`Self::delete_thread`], stopping once `cancel` reads `true`
    pub async fn delete_thread_cancellable(
        &self,
        strand_id: Uuid,
        path_hint: &str,
        cancel: &watch::Receiver<bool>,
    ) -> Result<ThreadDeletion, ThreadError> {
        self.run(strand_id, path_hint, Some(cancel)).await
    }

    async fn run(
        &self,
        strand_id: Uuid,
        path_hint: &str,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<ThreadDeletion, ThreadError> {
        let started = Instant::now();

        let result = async {
            let plan = self.plan_deletion(strand_id, cancel).await?;
            ensure_active(cancel, "apply deletion")?;
            let counts = self.apply_plan(&plan).await?;
            Ok::<_, ThreadError>(ThreadDeletion { plan, counts })
        }
        .await;

        match &result {
            Ok(deletion) => {
                metrics::record_deletion("success", started.elapsed());
                metrics::record_thread_size(deletion.plan.strand_ids.len());
                tracing::info!(
                    strand_id = %strand_id,
                    strands_deleted = deletion.counts.strands_deleted,
                    users_updated = deletion.counts.users_updated,
                    communities_updated = deletion.counts.communities_updated,
                    duration_ms = started.elapsed().as_millis(),
                    "Thread deleted"
                );
                self.revalidator.revalidate(path_hint).await;
            }
            Err(ThreadError::NotFound(_)) => {
                metrics::record_deletion("not_found", started.elapsed());
                tracing::debug!(strand_id = %strand_id, "Thread deletion target not found");
            }
            Err(err) => {
                metrics::record_deletion(err.label(), started.elapsed());
                tracing::error!(strand_id = %strand_id, error = %err, "Thread deletion failed");
            }
        }

        result
    }

    /// Discover the deletion set and the records that reference it
    ///
    /// Reads only; nothing is mutated.
    pub async fn plan_deletion(
        &self,
        strand_id: Uuid,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<DeletionPlan, ThreadError> {
        ensure_active(cancel, "find target strand")?;
        let root = self
            .store
            .find_strand(strand_id)
            .await
            .map_err(ThreadError::storage("find target strand"))?
            .ok_or(ThreadError::NotFound(strand_id))?;

        let descendants = self.collect_descendants(&root, cancel).await?;

        let thread: Vec<&Strand> = std::iter::once(&root).chain(descendants.iter()).collect();
        let strand_ids: Vec<Uuid> = thread.iter().map(|s| s.id).collect();

        // a parent inside the deletion set disappears with its children list
        let parent_id = root.parent_id.filter(|id| !strand_ids.contains(id));

        let author_candidates = distinct(thread.iter().map(|s| s.author_id));
        ensure_active(cancel, "resolve authors")?;
        let author_ids: Vec<Uuid> = self
            .store
            .find_users(&author_candidates)
            .await
            .map_err(ThreadError::storage("resolve authors"))?
            .into_iter()
            .map(|u| u.id)
            .collect();

        if author_ids.len() < author_candidates.len() {
            let resolved: HashSet<&Uuid> = author_ids.iter().collect();
            for missing in author_candidates.iter().filter(|id| !resolved.contains(id)) {
                tracing::warn!(strand_id = %strand_id, author_id = %missing, "Skipping unresolved author");
            }
        }

        let community_candidates = distinct(thread.iter().filter_map(|s| s.community_id));
        let community_ids: Vec<Uuid> = if community_candidates.is_empty() {
            Vec::new()
        } else {
            ensure_active(cancel, "resolve communities")?;
            self.store
                .find_communities(&community_candidates)
                .await
                .map_err(ThreadError::storage("resolve communities"))?
                .into_iter()
                .map(|c| c.id)
                .collect()
        };

        if community_ids.len() < community_candidates.len() {
            tracing::warn!(
                strand_id = %strand_id,
                skipped = community_candidates.len() - community_ids.len(),
                "Skipping unresolved communities"
            );
        }

        Ok(DeletionPlan {
            root_id: root.id,
            parent_id,
            strand_ids,
            author_ids,
            community_ids,
        })
    }

    /// Delete the plan's strands, detach the root from its parent and prune
    /// membership lists
    ///
    /// Safe to call again with the same plan after a storage failure.
    pub async fn apply_plan(&self, plan: &DeletionPlan) -> Result<DeletionCounts, ThreadError> {
        self.store
            .apply_deletion(plan)
            .await
            .map_err(ThreadError::storage("apply deletion"))
    }

    /// Depth-first pre-order walk over `parent_id` links below `root`
    ///
    /// Ids already seen are skipped, so a cyclic reply graph terminates.
    async fn collect_descendants(
        &self,
        root: &Strand,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<Vec<Strand>, ThreadError> {
        let mut visited: HashSet<Uuid> = HashSet::from([root.id]);
        let mut descendants = Vec::new();

        let mut stack = self.unvisited_children(root.id, &mut visited, cancel).await?;
        stack.reverse();

        while let Some(strand) = stack.pop() {
            let mut children = self.unvisited_children(strand.id, &mut visited, cancel).await?;
            descendants.push(strand);
            children.reverse();
            stack.extend(children);
        }

        Ok(descendants)
    }

    async fn unvisited_children(
        &self,
        parent_id: Uuid,
        visited: &mut HashSet<Uuid>,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<Vec<Strand>, ThreadError> {
        ensure_active(cancel, "discover descendants")?;
        let children = self
            .store
            .find_children(parent_id)
            .await
            .map_err(ThreadError::storage("discover descendants"))?;

        Ok(children
            .into_iter()
            .filter(|child| {
                let fresh = visited.insert(child.id);
                if !fresh {
                    tracing::warn!(parent_id = %parent_id, strand_id = %child.id, "Reply graph revisits a strand");
                }
                fresh
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NoopRevalidator;
    use crate::db::MemoryStrandStore;
    use chrono::Utc;

    fn strand(author_id: Uuid, parent_id: Option<Uuid>) -> Strand {
        Strand {
            id: Uuid::new_v4(),
            text: "reply text".to_string(),
            author_id,
            community_id: None,
            parent_id,
            children: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn engine(store: Arc<MemoryStrandStore>) -> ThreadDeletionEngine {
        ThreadDeletionEngine::new(store, Arc::new(NoopRevalidator))
    }

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(distinct(vec![a, b, a, b, a]), vec![a, b]);
    }

    #[tokio::test]
    async fn test_plan_is_preorder() {
        let store = Arc::new(MemoryStrandStore::new());
        let user = store.insert_user("ada", "Ada").await;

        // root -> (b -> d), c
        let root = strand(user.id, None);
        let mut b = strand(user.id, Some(root.id));
        let mut c = strand(user.id, Some(root.id));
        b.created_at = root.created_at + chrono::Duration::seconds(1);
        c.created_at = root.created_at + chrono::Duration::seconds(2);
        let mut d = strand(user.id, Some(b.id));
        d.created_at = root.created_at + chrono::Duration::seconds(3);

        for s in [&root, &b, &c, &d] {
            store.put_strand(s.clone()).await;
        }

        let plan = engine(store).plan_deletion(root.id, None).await.unwrap();
        assert_eq!(plan.strand_ids, vec![root.id, b.id, d.id, c.id]);
        assert_eq!(plan.parent_id, None);
        assert_eq!(plan.author_ids, vec![user.id]);
        assert!(plan.community_ids.is_empty());
    }

    #[tokio::test]
    async fn test_plan_for_reply_names_surviving_parent() {
        let store = Arc::new(MemoryStrandStore::new());
        let user = store.insert_user("ada", "Ada").await;

        let root = strand(user.id, None);
        let reply = strand(user.id, Some(root.id));
        store.put_strand(root.clone()).await;
        store.put_strand(reply.clone()).await;

        let plan = engine(store).plan_deletion(reply.id, None).await.unwrap();
        assert_eq!(plan.strand_ids, vec![reply.id]);
        assert_eq!(plan.parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let store = Arc::new(MemoryStrandStore::new());
        let user = store.insert_user("ada", "Ada").await;

        // a's parent is b and b's parent is a
        let mut a = strand(user.id, None);
        let b = strand(user.id, Some(a.id));
        a.parent_id = Some(b.id);
        store.put_strand(a.clone()).await;
        store.put_strand(b.clone()).await;

        let plan = engine(store).plan_deletion(a.id, None).await.unwrap();
        assert_eq!(plan.strand_ids, vec![a.id, b.id]);
        assert_eq!(plan.parent_id, None);
    }

    #[tokio::test]
    async fn test_cancelled_before_any_storage_call() {
        let store = Arc::new(MemoryStrandStore::new());
        let (tx, rx) = watch::channel(true);

        let err = engine(store.clone())
            .delete_thread_cancellable(Uuid::new_v4(), "/", &rx)
            .await
            .unwrap_err();

        assert!(matches!(err, ThreadError::Cancelled { step: "find target strand" }));
        assert!(store.operations().await.is_empty());
        drop(tx);
    }
}
