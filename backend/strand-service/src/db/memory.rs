use super::{StoreError, StoreResult, StrandStore};
use crate::models::{Community, NewStrand, Strand, User};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Point-in-time copy of everything the memory store holds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySnapshot {
    pub strands: BTreeMap<Uuid, Strand>,
    pub users: BTreeMap<Uuid, User>,
    pub communities: BTreeMap<Uuid, Community>,
}

#[derive(Default)]
struct MemoryState {
    data: MemorySnapshot,
    failing: HashSet<&'static str>,
    operations: Vec<&'static str>,
    last_created_at: Option<DateTime<Utc>>,
}

impl MemoryState {
    fn record(&mut self, operation: &'static str) -> StoreResult<()> {
        self.operations.push(operation);
        if self.failing.contains(operation) {
            return Err(StoreError::Unavailable(format!(
                "injected failure in {}",
                operation
            )));
        }
        Ok(())
    }

    /// Strictly increasing creation timestamps keep feed ordering stable
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }
}

fn newest_first(strands: &mut [Strand]) {
    strands.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}

fn oldest_first(strands: &mut [Strand]) {
    strands.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
}

/// In-process strand store
///
/// Each call locks the whole store, so single calls are atomic but a
/// [`StrandStore::apply_deletion`] spans several calls. Operations can be made
/// to fail by name (the trait method name) and every call is logged.
#[derive(Default)]
pub struct MemoryStrandStore {
    state: Mutex<MemoryState>,
}

impl MemoryStrandStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, username: &str, name: &str) -> User {
        let mut state = self.state.lock().await;
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            name: name.to_string(),
            image: None,
            strand_ids: Vec::new(),
            created_at: state.next_created_at(),
        };
        state.data.users.insert(user.id, user.clone());
        user
    }

    pub async fn insert_community(&self, name: &str) -> Community {
        let mut state = self.state.lock().await;
        let community = Community {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image: None,
            strand_ids: Vec::new(),
            created_at: state.next_created_at(),
        };
        state.data.communities.insert(community.id, community.clone());
        community
    }

    /// Store a strand exactly as given, without touching any back-reference
    pub async fn put_strand(&self, strand: Strand) {
        let mut state = self.state.lock().await;
        state.data.strands.insert(strand.id, strand);
    }

    pub async fn remove_user(&self, id: Uuid) -> Option<User> {
        self.state.lock().await.data.users.remove(&id)
    }

    /// Make every later call to `operation` fail with `StoreError::Unavailable`
    pub async fn fail_on(&self, operation: &'static str) {
        self.state.lock().await.failing.insert(operation);
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failing.clear();
    }

    /// Names of the trait methods called so far, in order
    pub async fn operations(&self) -> Vec<&'static str> {
        self.state.lock().await.operations.clone()
    }

    pub async fn snapshot(&self) -> MemorySnapshot {
        self.state.lock().await.data.clone()
    }
}

#[async_trait]
impl StrandStore for MemoryStrandStore {
    async fn find_strand(&self, id: Uuid) -> StoreResult<Option<Strand>> {
        let mut state = self.state.lock().await;
        state.record("find_strand")?;
        Ok(state.data.strands.get(&id).cloned())
    }

    async fn find_children(&self, parent_id: Uuid) -> StoreResult<Vec<Strand>> {
        let mut state = self.state.lock().await;
        state.record("find_children")?;
        let mut children: Vec<Strand> = state
            .data
            .strands
            .values()
            .filter(|s| s.parent_id == Some(parent_id))
            .cloned()
            .collect();
        oldest_first(&mut children);
        Ok(children)
    }

    async fn find_strands(&self, ids: &[Uuid]) -> StoreResult<Vec<Strand>> {
        let mut state = self.state.lock().await;
        state.record("find_strands")?;
        let wanted: HashSet<&Uuid> = ids.iter().collect();
        Ok(state
            .data
            .strands
            .values()
            .filter(|s| wanted.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn find_top_level(&self, offset: i64, limit: i64) -> StoreResult<Vec<Strand>> {
        let mut state = self.state.lock().await;
        state.record("find_top_level")?;
        let mut top: Vec<Strand> = state
            .data
            .strands
            .values()
            .filter(|s| s.is_top_level())
            .cloned()
            .collect();
        newest_first(&mut top);
        Ok(top
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_top_level(&self) -> StoreResult<i64> {
        let mut state = self.state.lock().await;
        state.record("count_top_level")?;
        Ok(state.data.strands.values().filter(|s| s.is_top_level()).count() as i64)
    }

    async fn insert_strand(&self, strand: NewStrand) -> StoreResult<Strand> {
        let mut state = self.state.lock().await;
        state.record("insert_strand")?;
        let strand = Strand {
            id: Uuid::new_v4(),
            text: strand.text,
            author_id: strand.author_id,
            community_id: strand.community_id,
            parent_id: strand.parent_id,
            children: Vec::new(),
            created_at: state.next_created_at(),
        };
        state.data.strands.insert(strand.id, strand.clone());
        Ok(strand)
    }

    async fn push_child(&self, parent_id: Uuid, child_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.record("push_child")?;
        if let Some(parent) = state.data.strands.get_mut(&parent_id) {
            parent.children.push(child_id);
        }
        Ok(())
    }

    async fn pull_children(&self, parent_id: Uuid, child_ids: &[Uuid]) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        state.record("pull_children")?;
        let pulled: HashSet<&Uuid> = child_ids.iter().collect();
        match state.data.strands.get_mut(&parent_id) {
            Some(parent) => {
                parent.children.retain(|id| !pulled.contains(id));
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut state = self.state.lock().await;
        state.record("find_user")?;
        Ok(state.data.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let mut state = self.state.lock().await;
        state.record("find_users")?;
        Ok(ids
            .iter()
            .filter_map(|id| state.data.users.get(id).cloned())
            .collect())
    }

    async fn find_community(&self, id: Uuid) -> StoreResult<Option<Community>> {
        let mut state = self.state.lock().await;
        state.record("find_community")?;
        Ok(state.data.communities.get(&id).cloned())
    }

    async fn find_communities(&self, ids: &[Uuid]) -> StoreResult<Vec<Community>> {
        let mut state = self.state.lock().await;
        state.record("find_communities")?;
        Ok(ids
            .iter()
            .filter_map(|id| state.data.communities.get(id).cloned())
            .collect())
    }

    async fn push_user_strand(&self, user_id: Uuid, strand_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.record("push_user_strand")?;
        if let Some(user) = state.data.users.get_mut(&user_id) {
            user.strand_ids.push(strand_id);
        }
        Ok(())
    }

    async fn push_community_strand(
        &self,
        community_id: Uuid,
        strand_id: Uuid,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.record("push_community_strand")?;
        if let Some(community) = state.data.communities.get_mut(&community_id) {
            community.strand_ids.push(strand_id);
        }
        Ok(())
    }

    async fn delete_strands(&self, ids: &[Uuid]) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        state.record("delete_strands")?;
        let deleted = ids
            .iter()
            .filter(|id| state.data.strands.remove(*id).is_some())
            .count();
        Ok(deleted as u64)
    }

    async fn pull_user_strands(&self, user_ids: &[Uuid], strand_ids: &[Uuid]) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        state.record("pull_user_strands")?;
        let pulled: HashSet<&Uuid> = strand_ids.iter().collect();
        let mut updated = 0;
        for user_id in user_ids {
            if let Some(user) = state.data.users.get_mut(user_id) {
                user.strand_ids.retain(|id| !pulled.contains(id));
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn pull_community_strands(
        &self,
        community_ids: &[Uuid],
        strand_ids: &[Uuid],
    ) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        state.record("pull_community_strands")?;
        let pulled: HashSet<&Uuid> = strand_ids.iter().collect();
        let mut updated = 0;
        for community_id in community_ids {
            if let Some(community) = state.data.communities.get_mut(community_id) {
                community.strand_ids.retain(|id| !pulled.contains(id));
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_strand(author_id: Uuid, parent_id: Option<Uuid>) -> NewStrand {
        NewStrand {
            text: "hello there".to_string(),
            author_id,
            community_id: None,
            parent_id,
        }
    }

    #[tokio::test]
    async fn test_top_level_newest_first() {
        let store = MemoryStrandStore::new();
        let user = store.insert_user("ada", "Ada").await;

        let first = store.insert_strand(new_strand(user.id, None)).await.unwrap();
        let second = store.insert_strand(new_strand(user.id, None)).await.unwrap();
        store
            .insert_strand(new_strand(user.id, Some(first.id)))
            .await
            .unwrap();

        let page = store.find_top_level(0, 10).await.unwrap();
        let ids: Vec<Uuid> = page.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(store.count_top_level().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_pull_only_touches_listed_records() {
        let store = MemoryStrandStore::new();
        let ada = store.insert_user("ada", "Ada").await;
        let bob = store.insert_user("bob", "Bob").await;
        let shared = Uuid::new_v4();
        store.push_user_strand(ada.id, shared).await.unwrap();
        store.push_user_strand(bob.id, shared).await.unwrap();

        let updated = store.pull_user_strands(&[ada.id], &[shared]).await.unwrap();
        assert_eq!(updated, 1);

        let snapshot = store.snapshot().await;
        assert!(snapshot.users[&ada.id].strand_ids.is_empty());
        assert_eq!(snapshot.users[&bob.id].strand_ids, vec![shared]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_logged() {
        let store = MemoryStrandStore::new();
        store.fail_on("find_strand").await;

        let err = store.find_strand(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.operations().await, vec!["find_strand"]);

        store.clear_failures().await;
        assert!(store.find_strand(Uuid::new_v4()).await.unwrap().is_none());
    }
}
