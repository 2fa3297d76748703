/// Page revalidation
///
/// Mutations signal which rendered route went stale. The signal is
/// fire-and-forget: publish failures are logged and never reach the caller.
use async_trait::async_trait;
use cache_invalidation::RevalidationPublisher;

#[async_trait]
pub trait PathRevalidator: Send + Sync {
    async fn revalidate(&self, path_hint: &str);
}

/// Publishes revalidation messages over Redis Pub/Sub
pub struct RedisRevalidator {
    publisher: RevalidationPublisher,
}

impl RedisRevalidator {
    pub fn new(publisher: RevalidationPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl PathRevalidator for RedisRevalidator {
    async fn revalidate(&self, path_hint: &str) {
        match self.publisher.revalidate_path(path_hint).await {
            Ok(subscribers) => {
                tracing::debug!(path = %path_hint, subscribers, "revalidation published");
            }
            Err(err) => {
                tracing::warn!(path = %path_hint, "revalidation publish failed: {}", err);
            }
        }
    }
}

/// Used when no Redis is configured
pub struct NoopRevalidator;

#[async_trait]
impl PathRevalidator for NoopRevalidator {
    async fn revalidate(&self, path_hint: &str) {
        tracing::debug!(path = %path_hint, "revalidation skipped (no publisher)");
    }
}
