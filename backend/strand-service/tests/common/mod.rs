//! Shared fixtures for strand-service integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use strand_service::cache::PathRevalidator;
use strand_service::db::{MemoryStrandStore, StrandStore};
use strand_service::models::{NewStrand, Strand};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Revalidator that remembers every path it was asked to refresh
#[derive(Default)]
pub struct RecordingRevalidator {
    paths: Mutex<Vec<String>>,
}

impl RecordingRevalidator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn paths(&self) -> Vec<String> {
        self.paths.lock().await.clone()
    }
}

#[async_trait]
impl PathRevalidator for RecordingRevalidator {
    async fn revalidate(&self, path_hint: &str) {
        self.paths.lock().await.push(path_hint.to_string());
    }
}

/// Insert a strand and wire up every back-reference the way the service does
pub async fn seed_strand(
    store: &MemoryStrandStore,
    author_id: Uuid,
    community_id: Option<Uuid>,
    parent_id: Option<Uuid>,
) -> Strand {
    let strand = store
        .insert_strand(NewStrand {
            text: "seeded strand".to_string(),
            author_id,
            community_id,
            parent_id,
        })
        .await
        .expect("insert strand");

    if let Some(parent_id) = parent_id {
        store
            .push_child(parent_id, strand.id)
            .await
            .expect("push child");
    }
    store
        .push_user_strand(author_id, strand.id)
        .await
        .expect("push user strand");
    if let Some(community_id) = community_id {
        store
            .push_community_strand(community_id, strand.id)
            .await
            .expect("push community strand");
    }

    strand
}

pub fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}
