use super::{DeletionCounts, DeletionPlan, StoreResult, StrandStore};
use crate::models::{Community, NewStrand, Strand, User};
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const STRAND_COLUMNS: &str = "id, text, author_id, community_id, parent_id, children, created_at";

/// PostgreSQL-backed strand store
#[derive(Clone)]
pub struct PgStrandStore {
    pool: PgPool,
}

impl PgStrandStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations under `migrations/`
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

async fn delete_strands_in<'e, E: PgExecutor<'e>>(executor: E, ids: &[Uuid]) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM strands WHERE id = ANY($1)")
        .bind(ids)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

async fn pull_children_in<'e, E: PgExecutor<'e>>(
    executor: E,
    parent_id: Uuid,
    child_ids: &[Uuid],
) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE strands
        SET children = ARRAY(SELECT c FROM unnest(children) AS c WHERE NOT (c = ANY($2)))
        WHERE id = $1
        "#,
    )
    .bind(parent_id)
    .bind(child_ids)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

async fn pull_user_strands_in<'e, E: PgExecutor<'e>>(
    executor: E,
    user_ids: &[Uuid],
    strand_ids: &[Uuid],
) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET strand_ids = ARRAY(SELECT s FROM unnest(strand_ids) AS s WHERE NOT (s = ANY($2)))
        WHERE id = ANY($1)
        "#,
    )
    .bind(user_ids)
    .bind(strand_ids)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

async fn pull_community_strands_in<'e, E: PgExecutor<'e>>(
    executor: E,
    community_ids: &[Uuid],
    strand_ids: &[Uuid],
) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE communities
        SET strand_ids = ARRAY(SELECT s FROM unnest(strand_ids) AS s WHERE NOT (s = ANY($2)))
        WHERE id = ANY($1)
        "#,
    )
    .bind(community_ids)
    .bind(strand_ids)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

#[async_trait]
impl StrandStore for PgStrandStore {
    async fn find_strand(&self, id: Uuid) -> StoreResult<Option<Strand>> {
        let strand = sqlx::query_as::<_, Strand>(&format!(
            "SELECT {STRAND_COLUMNS} FROM strands WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(strand)
    }

    async fn find_children(&self, parent_id: Uuid) -> StoreResult<Vec<Strand>> {
        let strands = sqlx::query_as::<_, Strand>(&format!(
            "SELECT {STRAND_COLUMNS} FROM strands WHERE parent_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(strands)
    }

    async fn find_strands(&self, ids: &[Uuid]) -> StoreResult<Vec<Strand>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let strands = sqlx::query_as::<_, Strand>(&format!(
            "SELECT {STRAND_COLUMNS} FROM strands WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(strands)
    }

    async fn find_top_level(&self, offset: i64, limit: i64) -> StoreResult<Vec<Strand>> {
        let strands = sqlx::query_as::<_, Strand>(&format!(
            r#"
            SELECT {STRAND_COLUMNS}
            FROM strands
            WHERE parent_id IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(strands)
    }

    async fn count_top_level(&self) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM strands WHERE parent_id IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn insert_strand(&self, strand: NewStrand) -> StoreResult<Strand> {
        let strand = sqlx::query_as::<_, Strand>(&format!(
            r#"
            INSERT INTO strands (text, author_id, community_id, parent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {STRAND_COLUMNS}
            "#
        ))
        .bind(&strand.text)
        .bind(strand.author_id)
        .bind(strand.community_id)
        .bind(strand.parent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(strand)
    }

    async fn push_child(&self, parent_id: Uuid, child_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE strands SET children = array_append(children, $2) WHERE id = $1")
            .bind(parent_id)
            .bind(child_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn pull_children(&self, parent_id: Uuid, child_ids: &[Uuid]) -> StoreResult<u64> {
        pull_children_in(&self.pool, parent_id, child_ids).await
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, name, image, strand_ids, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, name, image, strand_ids, created_at FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn find_community(&self, id: Uuid) -> StoreResult<Option<Community>> {
        let community = sqlx::query_as::<_, Community>(
            "SELECT id, name, image, strand_ids, created_at FROM communities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(community)
    }

    async fn find_communities(&self, ids: &[Uuid]) -> StoreResult<Vec<Community>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let communities = sqlx::query_as::<_, Community>(
            "SELECT id, name, image, strand_ids, created_at FROM communities WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(communities)
    }

    async fn push_user_strand(&self, user_id: Uuid, strand_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE users SET strand_ids = array_append(strand_ids, $2) WHERE id = $1")
            .bind(user_id)
            .bind(strand_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn push_community_strand(
        &self,
        community_id: Uuid,
        strand_id: Uuid,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE communities SET strand_ids = array_append(strand_ids, $2) WHERE id = $1",
        )
        .bind(community_id)
        .bind(strand_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_strands(&self, ids: &[Uuid]) -> StoreResult<u64> {
        delete_strands_in(&self.pool, ids).await
    }

    async fn pull_user_strands(&self, user_ids: &[Uuid], strand_ids: &[Uuid]) -> StoreResult<u64> {
        pull_user_strands_in(&self.pool, user_ids, strand_ids).await
    }

    async fn pull_community_strands(
        &self,
        community_ids: &[Uuid],
        strand_ids: &[Uuid],
    ) -> StoreResult<u64> {
        pull_community_strands_in(&self.pool, community_ids, strand_ids).await
    }

    /// Delete and prune inside one transaction
    async fn apply_deletion(&self, plan: &DeletionPlan) -> StoreResult<DeletionCounts> {
        let mut tx = self.pool.begin().await?;

        let strands_deleted = delete_strands_in(&mut *tx, &plan.strand_ids).await?;

        if let Some(parent_id) = plan.parent_id {
            pull_children_in(&mut *tx, parent_id, &plan.strand_ids).await?;
        }

        let users_updated = if plan.author_ids.is_empty() {
            0
        } else {
            pull_user_strands_in(&mut *tx, &plan.author_ids, &plan.strand_ids).await?
        };

        let communities_updated = if plan.community_ids.is_empty() {
            0
        } else {
            pull_community_strands_in(&mut *tx, &plan.community_ids, &plan.strand_ids).await?
        };

        tx.commit().await?;

        Ok(DeletionCounts {
            strands_deleted,
            users_updated,
            communities_updated,
        })
    }
}
