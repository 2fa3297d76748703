/// Configuration management for Strand Service
///
/// Everything is read from environment variables with development defaults.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    /// Redis used for revalidation pub/sub
    pub cache: CacheConfig,
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL; revalidation is disabled when unset
    pub url: Option<String>,
    pub revalidation_channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
            Ok(value) => value,
            Err(_) if production => {
                return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
            }
            Err(_) => "http://localhost:3000".to_string(),
        };
        if production && allowed_origins.trim() == "*" {
            return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
        }

        let default_page_size = parse_env_or_default("FEED_PAGE_SIZE_DEFAULT", 20)?;
        let max_page_size = parse_env_or_default("FEED_PAGE_SIZE_MAX", 100)?;
        if default_page_size < 1 || default_page_size > max_page_size {
            return Err(format!(
                "FEED_PAGE_SIZE_DEFAULT must be between 1 and FEED_PAGE_SIZE_MAX ({})",
                max_page_size
            ));
        }

        Ok(Config {
            app: AppConfig {
                env: app_env,
                host: std::env::var("STRAND_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or_default("STRAND_SERVICE_PORT", 8080)?,
            },
            cors: CorsConfig { allowed_origins },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/strands".to_string()),
                max_connections: parse_env_or_default("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            cache: CacheConfig {
                url: std::env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
                revalidation_channel: std::env::var("REVALIDATION_CHANNEL").unwrap_or_else(
                    |_| cache_invalidation::RevalidationPublisher::DEFAULT_CHANNEL.to_string(),
                ),
            },
            feed: FeedConfig {
                default_page_size,
                max_page_size,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_or_default_falls_back() {
        let value: i64 = parse_env_or_default("STRANDS_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_or_default_rejects_garbage() {
        std::env::set_var("STRANDS_TEST_BAD_NUMBER", "twenty");
        let err = parse_env_or_default::<u16>("STRANDS_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(err.contains("STRANDS_TEST_BAD_NUMBER"));
        std::env::remove_var("STRANDS_TEST_BAD_NUMBER");
    }
}
