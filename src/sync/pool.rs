//! Named rayon pools for background work.

use std::any::Any;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{error, warn};

/// Build a dedicated pool of `threads` workers named `<name>-<index>`.
///
/// Returns `None` (after logging) when the pool cannot be created; callers
/// then fall back to rayon's global pool.
pub fn build_pool(name: &'static str, threads: usize) -> Option<ThreadPool> {
    match ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(move |index| format!("{name}-{index}"))
        .panic_handler(move |_| error!(pool = name, "background job panicked"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            warn!(pool = name, %err, "failed to build thread pool, using the global pool");
            None
        }
    }
}

/// Run `job` on `pool`, or on the global pool when there is none.
pub fn spawn_on(pool: Option<&ThreadPool>, job: impl FnOnce() + Send + 'static) {
    match pool {
        Some(pool) => pool.spawn(job),
        None => rayon::spawn(job),
    }
}

/// The message of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
