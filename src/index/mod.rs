//! Bulk indexing of declaration packages.
//!
//! - [`TaskPool`] - runs tasks once their dependencies completed
//! - [`IndexShard`] - what one compiled package contributes to the index
//! - [`ShardStorage`] - on-disk shards plus a digest marker that detects
//!   stale or tampered caches
//! - [`BulkIndexer`] - ties the above to a [`ProjectContext`](crate::project::ProjectContext)

mod bulk;
mod error;
mod shard;
mod storage;
mod task_pool;

pub use bulk::{BulkIndexer, IndexReport};
pub use error::IndexError;
pub use shard::{Extension, IndexShard, Relation};
pub use storage::ShardStorage;
pub use task_pool::{TaskId, TaskPool};
