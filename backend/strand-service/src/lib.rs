/// Strand Service Library
///
/// Threaded short-form posts ("strands") with replies, community feeds and
/// cascading thread deletion.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers
/// - `models`: Strands, users, communities and rendered views
/// - `services`: Business logic, including the thread deletion engine
/// - `db`: Storage seam with PostgreSQL and in-memory stores
/// - `cache`: Page revalidation signals
/// - `middleware`: Caller identity and request timing
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result, ThreadError};
