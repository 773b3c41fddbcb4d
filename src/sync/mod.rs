//! Blocking primitives shared by the scheduler, the cache and the indexer.
//!
//! - [`Semaphore`] - counting semaphore with RAII release
//! - [`Deadline`], [`wait`], [`wait_until`] - bounded condition variable waits
//! - [`build_pool`] - named background pools

mod deadline;
mod pool;
mod semaphore;

pub use deadline::{Deadline, wait, wait_until};
pub use pool::{build_pool, panic_message, spawn_on};
pub use semaphore::{Semaphore, SemaphoreGuard};
