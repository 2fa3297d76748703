/// Data models for strand-service
///
/// - `Strand`: a post; top-level when `parent_id` is absent, otherwise a reply
/// - `User`: an author and the strands it has published
/// - `Community`: a group and the strands published under it
/// - `StrandView`: a strand hydrated with author/community summaries and replies
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Strand {
    pub id: Uuid,
    pub text: String,
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    /// Direct replies, in the order they were appended
    pub children: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Strand {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub image: Option<String>,
    /// Membership list of authored strands
    pub strand_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Community {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    /// Membership list of strands published under this community
    pub strand_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when inserting a strand
#[derive(Debug, Clone)]
pub struct NewStrand {
    pub text: String,
    pub author_id: Uuid,
    pub community_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
}

/// Body text of a strand or reply
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StrandText {
    #[validate(length(min = 3, message = "Minimum 3 characters."))]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            image: user.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

impl From<&Community> for CommunitySummary {
    fn from(community: &Community) -> Self {
        Self {
            id: community.id,
            name: community.name.clone(),
            image: community.image.clone(),
        }
    }
}

/// Strand as rendered: summaries resolved and replies nested
///
/// `author` / `community` are `None` when the referenced record no longer
/// exists. `replies` is only populated down to the depth the query asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrandView {
    pub id: Uuid,
    pub text: String,
    pub author: Option<AuthorSummary>,
    pub community: Option<CommunitySummary>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reply_count: usize,
    pub replies: Vec<StrandView>,
}

/// One page of the top-level feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub strands: Vec<StrandView>,
    pub is_next: bool,
}
