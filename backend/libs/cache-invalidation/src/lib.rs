//! Page revalidation over Redis Pub/Sub
//!
//! Services that mutate strands publish a revalidation message naming the route
//! (or entity) whose rendered output is now stale. Frontends and edge caches
//! subscribe and drop whatever they hold for that key.
//!
//! ```text
//! strand-service:
//!   1. Delete a thread in PostgreSQL
//!   2. PUBLISH strands:revalidate {"target": {"Path": "/strand/..."}, ...}
//!      ↓
//! Redis Pub/Sub (broadcast to all subscribers)
//!      ↓
//! web frontend / edge cache:
//!   3. Receive message, drop cached page for build_cache_key(target)
//! ```
//!
//! # Example: Publisher
//!
//! ```no_run
//! use cache_invalidation::RevalidationPublisher;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let publisher = RevalidationPublisher::new(
//!         "redis://localhost:6379",
//!         "strand-service".to_string()
//!     ).await?;
//!
//!     publisher.revalidate_path("/").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Example: Subscriber
//!
//! ```no_run
//! use cache_invalidation::{build_cache_key, RevalidationSubscriber};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let subscriber = RevalidationSubscriber::new("redis://localhost:6379").await?;
//!
//!     let handle = subscriber.subscribe(|msg| async move {
//!         println!("dropping {}", build_cache_key(&msg.target));
//!         Ok(())
//!     }).await?;
//!
//!     handle.await?;
//!     Ok(())
//! }
//! ```

use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod error;
pub mod helpers;

pub use error::InvalidationError;
pub use helpers::{build_cache_key, normalize_path, parse_cache_key};

type Result<T> = std::result::Result<T, InvalidationError>;

/// What a revalidation message makes stale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RevalidationTarget {
    /// A rendered route, e.g. `/` or `/strand/<id>`
    Path(String),
    Strand(Uuid),
    User(Uuid),
    Community(Uuid),
}

impl std::fmt::Display for RevalidationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", build_cache_key(self))
    }
}

/// Revalidation message as carried on the channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevalidationMessage {
    pub message_id: String,
    pub target: RevalidationTarget,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub source_service: String,
}

impl RevalidationMessage {
    pub fn new(target: RevalidationTarget, source_service: String) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            target,
            timestamp: chrono::Utc::now(),
            source_service,
        }
    }

    /// Message for a route path; the path is normalized first
    pub fn path(path: &str, source_service: String) -> Self {
        Self::new(RevalidationTarget::Path(normalize_path(path)), source_service)
    }
}

/// Publisher for revalidation events
#[derive(Clone)]
pub struct RevalidationPublisher {
    client: ConnectionManager,
    channel: String,
    service_name: String,
}

impl RevalidationPublisher {
    /// Default Redis channel for revalidation
    pub const DEFAULT_CHANNEL: &'static str = "strands:revalidate";

    /// Create new publisher on the default channel
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `service_name` - Name of the publishing service (e.g., "strand-service")
    pub async fn new(redis_url: &str, service_name: String) -> Result<Self> {
        Self::with_channel(redis_url, service_name, Self::DEFAULT_CHANNEL.to_string()).await
    }

    /// Create publisher with custom channel
    pub async fn with_channel(
        redis_url: &str,
        service_name: String,
        channel: String,
    ) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self {
            client: connection,
            channel,
            service_name,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish a revalidation message
    ///
    /// Returns number of subscribers that received the message
    pub async fn publish(&self, msg: RevalidationMessage) -> Result<usize> {
        let payload = serde_json::to_string(&msg)?;

        debug!(
            message_id = %msg.message_id,
            target = %msg.target,
            channel = %self.channel,
            "Publishing revalidation message"
        );

        let mut conn = self.client.clone();
        let subscriber_count: usize = conn.publish(&self.channel, payload).await?;

        info!(
            message_id = %msg.message_id,
            subscribers = subscriber_count,
            "Revalidation message published"
        );

        Ok(subscriber_count)
    }

    /// Revalidate a rendered route
    pub async fn revalidate_path(&self, path: &str) -> Result<usize> {
        let msg = RevalidationMessage::path(path, self.service_name.clone());
        self.publish(msg).await
    }

    /// Revalidate everything keyed on a single strand
    pub async fn revalidate_strand(&self, strand_id: Uuid) -> Result<usize> {
        let msg = RevalidationMessage::new(
            RevalidationTarget::Strand(strand_id),
            self.service_name.clone(),
        );
        self.publish(msg).await
    }
}

/// Subscriber for revalidation events
pub struct RevalidationSubscriber {
    client: Client,
    channel: String,
}

impl RevalidationSubscriber {
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::with_channel(redis_url, RevalidationPublisher::DEFAULT_CHANNEL.to_string()).await
    }

    pub async fn with_channel(redis_url: &str, channel: String) -> Result<Self> {
        let client = Client::open(redis_url)?;

        Ok(Self { client, channel })
    }

    /// Subscribe to revalidation events with callback
    ///
    /// Returns JoinHandle for the background task. Malformed payloads and
    /// callback failures are logged and skipped.
    pub async fn subscribe<F, Fut>(&self, callback: F) -> Result<JoinHandle<()>>
    where
        F: Fn(RevalidationMessage) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;

        info!(channel = %self.channel, "Subscribed to revalidation events");

        let callback = Arc::new(callback);

        let handle = tokio::spawn(async move {
            let mut stream = pubsub.on_message();

            while let Some(msg) = stream.next().await {
                let payload = match msg.get_payload::<String>() {
                    Ok(p) => p,
                    Err(e) => {
                        error!(error = ?e, "Failed to get message payload");
                        continue;
                    }
                };

                let message: RevalidationMessage = match serde_json::from_str(&payload) {
                    Ok(m) => m,
                    Err(e) => {
                        error!(error = ?e, payload = %payload, "Failed to deserialize message");
                        continue;
                    }
                };

                debug!(
                    message_id = %message.message_id,
                    target = %message.target,
                    "Received revalidation message"
                );

                let message_id = message.message_id.clone();
                if let Err(e) = callback(message).await {
                    error!(error = ?e, message_id = %message_id, "Callback execution failed");
                }
            }

            warn!("Revalidation subscription ended");
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display_uses_cache_key() {
        let target = RevalidationTarget::Path("strand/1/".into());
        assert_eq!(target.to_string(), "path:/strand/1");
    }

    #[test]
    fn test_path_message_normalizes() {
        let msg = RevalidationMessage::path("/profile/abc/?tab=replies", "test".into());
        assert_eq!(msg.target, RevalidationTarget::Path("/profile/abc".into()));
        assert_eq!(msg.source_service, "test");
    }

    #[test]
    fn test_message_serialization() {
        let id = Uuid::new_v4();
        let msg = RevalidationMessage::new(RevalidationTarget::Strand(id), "test".into());

        let json = serde_json::to_string(&msg).unwrap();
        let decoded: RevalidationMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.message_id, msg.message_id);
        assert_eq!(decoded.target, RevalidationTarget::Strand(id));
    }

    #[test]
    fn test_subscriber_rejects_malformed_url() {
        let result = tokio_test::block_on(RevalidationSubscriber::new("not a redis url"));
        assert!(matches!(result, Err(InvalidationError::Redis(_))));
    }
}
