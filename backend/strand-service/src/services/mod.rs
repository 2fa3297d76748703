/// Business logic layer for strand-service
///
/// - `strands`: create, reply, threaded reads and feeds
/// - `thread_deletion`: cascading removal of a strand and its replies
pub mod strands;
pub mod thread_deletion;

pub use strands::{FeedLimits, StrandService};
pub use thread_deletion::{ThreadDeletion, ThreadDeletionEngine};
