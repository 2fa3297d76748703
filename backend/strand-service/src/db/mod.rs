/// Storage layer
///
/// `StrandStore` is the seam between the services and persistence:
/// - `strand_repo`: PostgreSQL implementation (sqlx)
/// - `memory`: in-process implementation for tests and local runs
use crate::models::{Community, NewStrand, Strand, User};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod strand_repo;

pub use memory::MemoryStrandStore;
pub use strand_repo::PgStrandStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Everything a thread deletion will remove or prune
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionPlan {
    pub root_id: Uuid,
    /// Surviving parent of the root, whose `children` must drop the root
    pub parent_id: Option<Uuid>,
    /// Root first, then descendants in discovery order
    pub strand_ids: Vec<Uuid>,
    /// Resolved authors whose membership lists reference the deletion set
    pub author_ids: Vec<Uuid>,
    /// Resolved communities whose membership lists reference the deletion set
    pub community_ids: Vec<Uuid>,
}

/// Rows touched by applying a [`DeletionPlan`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeletionCounts {
    pub strands_deleted: u64,
    pub users_updated: u64,
    pub communities_updated: u64,
}

#[async_trait]
pub trait StrandStore: Send + Sync {
    async fn find_strand(&self, id: Uuid) -> StoreResult<Option<Strand>>;

    /// Strands whose `parent_id` equals `parent_id`, oldest first
    async fn find_children(&self, parent_id: Uuid) -> StoreResult<Vec<Strand>>;

    /// Strands whose id is in `ids`; missing ids are skipped
    async fn find_strands(&self, ids: &[Uuid]) -> StoreResult<Vec<Strand>>;

    /// Top-level strands, newest first
    async fn find_top_level(&self, offset: i64, limit: i64) -> StoreResult<Vec<Strand>>;

    async fn count_top_level(&self) -> StoreResult<i64>;

    async fn insert_strand(&self, strand: NewStrand) -> StoreResult<Strand>;

    /// Append `child_id` to the parent's `children`
    async fn push_child(&self, parent_id: Uuid, child_id: Uuid) -> StoreResult<()>;

    /// Remove `child_ids` from the parent's `children`; returns rows updated
    async fn pull_children(&self, parent_id: Uuid, child_ids: &[Uuid]) -> StoreResult<u64>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;

    async fn find_community(&self, id: Uuid) -> StoreResult<Option<Community>>;

    async fn find_communities(&self, ids: &[Uuid]) -> StoreResult<Vec<Community>>;

    async fn push_user_strand(&self, user_id: Uuid, strand_id: Uuid) -> StoreResult<()>;

    async fn push_community_strand(&self, community_id: Uuid, strand_id: Uuid)
        -> StoreResult<()>;

    /// Delete every strand whose id is in `ids`; returns rows deleted
    async fn delete_strands(&self, ids: &[Uuid]) -> StoreResult<u64>;

    /// Remove `strand_ids` from the membership list of every user in `user_ids`
    async fn pull_user_strands(&self, user_ids: &[Uuid], strand_ids: &[Uuid]) -> StoreResult<u64>;

    /// Remove `strand_ids` from the membership list of every community in `community_ids`
    async fn pull_community_strands(
        &self,
        community_ids: &[Uuid],
        strand_ids: &[Uuid],
    ) -> StoreResult<u64>;

    /// Delete the plan's strands, then detach the root from its surviving
    /// parent, then prune authors, then prune communities.
    ///
    /// Every step is a no-op for ids already gone, so re-applying a plan after
    /// a partial failure converges to the same end state. Stores with
    /// multi-statement transactions override this to apply it atomically.
    async fn apply_deletion(&self, plan: &DeletionPlan) -> StoreResult<DeletionCounts> {
        let strands_deleted = self.delete_strands(&plan.strand_ids).await?;

        if let Some(parent_id) = plan.parent_id {
            self.pull_children(parent_id, &plan.strand_ids).await?;
        }

        let users_updated = if plan.author_ids.is_empty() {
            0
        } else {
            self.pull_user_strands(&plan.author_ids, &plan.strand_ids)
                .await?
        };

        let communities_updated = if plan.community_ids.is_empty() {
            0
        } else {
            self.pull_community_strands(&plan.community_ids, &plan.strand_ids)
                .await?
        };

        Ok(DeletionCounts {
            strands_deleted,
            users_updated,
            communities_updated,
        })
    }
}
