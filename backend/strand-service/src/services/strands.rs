/// Strand service - creation, replies, threaded reads, feeds and deletion
use crate::cache::PathRevalidator;
use crate::db::StrandStore;
use crate::error::{AppError, Result};
use crate::models::{
    AuthorSummary, CommunitySummary, FeedPage, NewStrand, Strand, StrandText, StrandView,
};
use crate::services::thread_deletion::{ensure_active, ThreadDeletion, ThreadDeletionEngine};
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;
use validator::Validate;

/// Reply levels rendered under a single strand page
const THREAD_REPLY_DEPTH: usize = 2;
/// Reply levels rendered under each feed / profile entry
const LIST_REPLY_DEPTH: usize = 1;

#[derive(Debug, Clone, Copy)]
pub struct FeedLimits {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// A strand with its replies loaded down to some depth
struct ReplyNode {
    strand: Strand,
    replies: Vec<ReplyNode>,
}

impl ReplyNode {
    fn walk<'a>(&'a self, out: &mut Vec<&'a Strand>) {
        out.push(&self.strand);
        for reply in &self.replies {
            reply.walk(out);
        }
    }
}

pub struct StrandService {
    store: Arc<dyn StrandStore>,
    revalidator: Arc<dyn PathRevalidator>,
    deletion: ThreadDeletionEngine,
    feed_limits: FeedLimits,
}

impl StrandService {
    pub fn new(store: Arc<dyn StrandStore>, revalidator: Arc<dyn PathRevalidator>) -> Self {
        Self {
            deletion: ThreadDeletionEngine::new(store.clone(), revalidator.clone()),
            store,
            revalidator,
            feed_limits: FeedLimits::default(),
        }
    }

    pub fn with_feed_limits(mut self, feed_limits: FeedLimits) -> Self {
        self.feed_limits = feed_limits;
        self
    }

    pub fn feed_limits(&self) -> FeedLimits {
        self.feed_limits
    }

    fn validate_text(text: &str) -> Result<()> {
        StrandText {
            text: text.to_string(),
        }
        .validate()?;
        Ok(())
    }

    /// Create a top-level strand and register it with its author and community
    pub async fn create_strand(
        &self,
        text: &str,
        author_id: Uuid,
        community_id: Option<Uuid>,
        path: &str,
    ) -> Result<Strand> {
        Self::validate_text(text)?;

        if self.store.find_user(author_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", author_id)));
        }

        if let Some(community_id) = community_id {
            if self.store.find_community(community_id).await?.is_none() {
                return Err(AppError::NotFound(format!("community {}", community_id)));
            }
        }

        let strand = self
            .store
            .insert_strand(NewStrand {
                text: text.to_string(),
                author_id,
                community_id,
                parent_id: None,
            })
            .await?;

        self.store.push_user_strand(author_id, strand.id).await?;
        if let Some(community_id) = community_id {
            self.store
                .push_community_strand(community_id, strand.id)
                .await?;
        }

        tracing::info!(strand_id = %strand.id, author_id = %author_id, "Strand created");
        self.revalidator.revalidate(path).await;

        Ok(strand)
    }

    /// Reply to an existing strand
    pub async fn add_reply(
        &self,
        parent_id: Uuid,
        text: &str,
        author_id: Uuid,
        path: &str,
    ) -> Result<Strand> {
        Self::validate_text(text)?;

        if self.store.find_strand(parent_id).await?.is_none() {
            return Err(AppError::NotFound(format!("strand {}", parent_id)));
        }

        if self.store.find_user(author_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", author_id)));
        }

        let reply = self
            .store
            .insert_strand(NewStrand {
                text: text.to_string(),
                author_id,
                community_id: None,
                parent_id: Some(parent_id),
            })
            .await?;

        self.store.push_child(parent_id, reply.id).await?;
        self.store.push_user_strand(author_id, reply.id).await?;

        tracing::info!(strand_id = %reply.id, parent_id = %parent_id, "Reply added");
        self.revalidator.revalidate(path).await;

        Ok(reply)
    }

    /// A strand with two levels of replies
    pub async fn fetch_strand(&self, strand_id: Uuid) -> Result<StrandView> {
        let strand = self
            .store
            .find_strand(strand_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("strand {}", strand_id)))?;

        let node = self.expand(strand, THREAD_REPLY_DEPTH).await?;
        let mut views = self.hydrate(vec![node]).await?;

        views
            .pop()
            .ok_or_else(|| AppError::Internal("strand view missing after hydration".into()))
    }

    /// Top-level strands, newest first, with their direct replies
    pub async fn fetch_feed(&self, page_number: i64, page_size: i64) -> Result<FeedPage> {
        if page_number < 1 {
            return Err(AppError::ValidationError(
                "page_number must be at least 1".into(),
            ));
        }
        if page_size < 1 || page_size > self.feed_limits.max_page_size {
            return Err(AppError::ValidationError(format!(
                "page_size must be between 1 and {}",
                self.feed_limits.max_page_size
            )));
        }

        let offset = (page_number - 1).saturating_mul(page_size);
        let strands = self.store.find_top_level(offset, page_size).await?;
        let total = self.store.count_top_level().await?;
        let is_next = total > offset + strands.len() as i64;

        let strands = self.expand_all(strands, LIST_REPLY_DEPTH).await?;

        Ok(FeedPage { strands, is_next })
    }

    /// Strands in a user's membership list, newest first
    pub async fn fetch_user_strands(&self, user_id: Uuid) -> Result<Vec<StrandView>> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;

        self.membership_strands(&user.strand_ids).await
    }

    /// Strands in a community's membership list, newest first
    pub async fn fetch_community_strands(&self, community_id: Uuid) -> Result<Vec<StrandView>> {
        let community = self
            .store
            .find_community(community_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("community {}", community_id)))?;

        self.membership_strands(&community.strand_ids).await
    }

    /// Delete a thread on behalf of `requester`, who must be its author
    pub async fn delete_strand(
        &self,
        strand_id: Uuid,
        requester: Uuid,
        path: &str,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<ThreadDeletion> {
        ensure_active(cancel, "authorize deletion")?;

        let strand = self
            .store
            .find_strand(strand_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("strand {}", strand_id)))?;

        if strand.author_id != requester {
            tracing::warn!(strand_id = %strand_id, requester = %requester, "Delete rejected for non-author");
            return Err(AppError::Forbidden(
                "only the author can delete a strand".into(),
            ));
        }

        let deletion = match cancel {
            Some(rx) => {
                self.deletion
                    .delete_thread_cancellable(strand_id, path, rx)
                    .await?
            }
            None => self.deletion.delete_thread(strand_id, path).await?,
        };

        Ok(deletion)
    }

    async fn membership_strands(&self, ids: &[Uuid]) -> Result<Vec<StrandView>> {
        let mut strands = self.store.find_strands(ids).await?;
        strands.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        self.expand_all(strands, LIST_REPLY_DEPTH).await
    }

    async fn expand_all(&self, strands: Vec<Strand>, depth: usize) -> Result<Vec<StrandView>> {
        let mut nodes = Vec::with_capacity(strands.len());
        for strand in strands {
            nodes.push(self.expand(strand, depth).await?);
        }
        self.hydrate(nodes).await
    }

    fn expand(&self, strand: Strand, depth: usize) -> BoxFuture<'_, Result<ReplyNode>> {
        async move {
            let mut replies = Vec::new();
            if depth > 0 {
                for child in self.store.find_children(strand.id).await? {
                    replies.push(self.expand(child, depth - 1).await?);
                }
            }
            Ok(ReplyNode { strand, replies })
        }
        .boxed()
    }

    /// Resolve author and community summaries for every strand in `nodes`
    async fn hydrate(&self, nodes: Vec<ReplyNode>) -> Result<Vec<StrandView>> {
        let mut all = Vec::new();
        for node in &nodes {
            node.walk(&mut all);
        }

        let mut seen = HashSet::new();
        let author_ids: Vec<Uuid> = all
            .iter()
            .map(|s| s.author_id)
            .filter(|id| seen.insert(*id))
            .collect();
        let mut seen = HashSet::new();
        let community_ids: Vec<Uuid> = all
            .iter()
            .filter_map(|s| s.community_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let authors: HashMap<Uuid, AuthorSummary> = self
            .store
            .find_users(&author_ids)
            .await?
            .iter()
            .map(|u| (u.id, AuthorSummary::from(u)))
            .collect();
        let communities: HashMap<Uuid, CommunitySummary> = if community_ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .find_communities(&community_ids)
                .await?
                .iter()
                .map(|c| (c.id, CommunitySummary::from(c)))
                .collect()
        };

        Ok(nodes
            .into_iter()
            .map(|node| to_view(node, &authors, &communities))
            .collect())
    }
}

fn to_view(
    node: ReplyNode,
    authors: &HashMap<Uuid, AuthorSummary>,
    communities: &HashMap<Uuid, CommunitySummary>,
) -> StrandView {
    let ReplyNode { strand, replies } = node;
    StrandView {
        id: strand.id,
        author: authors.get(&strand.author_id).cloned(),
        community: strand
            .community_id
            .and_then(|id| communities.get(&id).cloned()),
        parent_id: strand.parent_id,
        created_at: strand.created_at,
        reply_count: strand.children.len(),
        replies: replies
            .into_iter()
            .map(|reply| to_view(reply, authors, communities))
            .collect(),
        text: strand.text,
    }
}
