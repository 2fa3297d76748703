//! Helper functions for revalidation cache keys

use crate::{InvalidationError, Result, RevalidationTarget};
use uuid::Uuid;

/// Build the cache key a subscriber should drop for a target
///
/// # Example
///
/// ```
/// use cache_invalidation::{build_cache_key, RevalidationTarget};
///
/// let key = build_cache_key(&RevalidationTarget::Path("/strand/42".into()));
/// assert_eq!(key, "path:/strand/42");
/// ```
pub fn build_cache_key(target: &RevalidationTarget) -> String {
    match target {
        RevalidationTarget::Path(path) => format!("path:{}", normalize_path(path)),
        RevalidationTarget::Strand(id) => format!("strand:{}", id),
        RevalidationTarget::User(id) => format!("user:{}", id),
        RevalidationTarget::Community(id) => format!("community:{}", id),
    }
}

/// Parse a cache key produced by [`build_cache_key`]
///
/// # Example
///
/// ```
/// use cache_invalidation::{parse_cache_key, RevalidationTarget};
///
/// let target = parse_cache_key("path:/").unwrap();
/// assert_eq!(target, RevalidationTarget::Path("/".into()));
/// ```
pub fn parse_cache_key(key: &str) -> Result<RevalidationTarget> {
    let (kind, value) = key.split_once(':').ok_or_else(|| {
        InvalidationError::InvalidMessage(format!(
            "Invalid cache key format: {}. Expected format: <kind>:<value>",
            key
        ))
    })?;

    if value.is_empty() {
        return Err(InvalidationError::InvalidMessage(format!(
            "Cache key has an empty value: {}",
            key
        )));
    }

    let parse_id = |raw: &str| {
        Uuid::parse_str(raw).map_err(|e| {
            InvalidationError::InvalidMessage(format!("Invalid id in cache key {}: {}", key, e))
        })
    };

    match kind {
        "path" => Ok(RevalidationTarget::Path(normalize_path(value))),
        "strand" => Ok(RevalidationTarget::Strand(parse_id(value)?)),
        "user" => Ok(RevalidationTarget::User(parse_id(value)?)),
        "community" => Ok(RevalidationTarget::Community(parse_id(value)?)),
        other => Err(InvalidationError::InvalidMessage(format!(
            "Unknown cache key kind: {}",
            other
        ))),
    }
}

/// Normalize a route path so equivalent hints map to the same key
///
/// Query strings and fragments are dropped, a leading slash is ensured and
/// trailing slashes are removed (except for the root).
///
/// ```
/// use cache_invalidation::helpers::normalize_path;
///
/// assert_eq!(normalize_path("strand/42/"), "/strand/42");
/// assert_eq!(normalize_path("/?tab=replies"), "/");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    let path = path
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let trimmed = path.trim_matches('/');

    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_cache_key() {
        let id = Uuid::new_v4();
        assert_eq!(
            build_cache_key(&RevalidationTarget::Strand(id)),
            format!("strand:{}", id)
        );
        assert_eq!(
            build_cache_key(&RevalidationTarget::Community(id)),
            format!("community:{}", id)
        );
        assert_eq!(
            build_cache_key(&RevalidationTarget::Path("profile/abc/".into())),
            "path:/profile/abc"
        );
    }

    #[test]
    fn test_parse_cache_key_roundtrips_ids() {
        let id = Uuid::new_v4();
        let key = build_cache_key(&RevalidationTarget::User(id));
        assert_eq!(parse_cache_key(&key).unwrap(), RevalidationTarget::User(id));
    }

    #[test]
    fn test_parse_cache_key_path_with_colon() {
        let target = parse_cache_key("path:/search:recent").unwrap();
        assert_eq!(target, RevalidationTarget::Path("/search:recent".into()));
    }

    #[test]
    fn test_parse_cache_key_invalid() {
        assert!(parse_cache_key("invalid").is_err());
        assert!(parse_cache_key("strand:").is_err());
        assert!(parse_cache_key("strand:not-a-uuid").is_err());
        assert!(parse_cache_key("feed:1").is_err());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("///"), "/");
        assert_eq!(normalize_path(" /communities/rust "), "/communities/rust");
        assert_eq!(normalize_path("/strand/1#reply-3"), "/strand/1");
    }
}
