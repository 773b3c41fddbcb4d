use std::time::{Duration, Instant};

use parking_lot::{Condvar, MutexGuard};

/// A point in time we can wait for.
///
/// Can be zero (don't wait) or infinite (wait forever). Infinity is its own
/// variant rather than a far-future instant, which would overflow on some
/// platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    Zero,
    Infinite,
    At(Instant),
}

impl Deadline {
    pub fn zero() -> Self {
        Self::Zero
    }

    pub fn infinite() -> Self {
        Self::Infinite
    }

    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Instant::now()
            .checked_add(timeout)
            .map_or(Self::Infinite, Self::At)
    }

    pub fn expired(&self) -> bool {
        match self {
            Self::Zero => true,
            Self::Infinite => false,
            Self::At(instant) => *instant <= Instant::now(),
        }
    }
}

/// Wait once on `cv` until notified or `deadline` passes.
pub fn wait<T>(guard: &mut MutexGuard<'_, T>, cv: &Condvar, deadline: Deadline) {
    match deadline {
        Deadline::Zero => {}
        Deadline::Infinite => cv.wait(guard),
        Deadline::At(instant) => {
            let _ = cv.wait_until(guard, instant);
        }
    }
}

/// Wait on `cv` until `done` holds or `deadline` expires.
///
/// Returns the final value of `done`. An expired deadline returns without
/// the condition holding, so callers must act on the return value.
pub fn wait_until<T>(
    guard: &mut MutexGuard<'_, T>,
    cv: &Condvar,
    deadline: Deadline,
    mut done: impl FnMut(&T) -> bool,
) -> bool {
    loop {
        if done(&**guard) {
            return true;
        }
        if deadline.expired() {
            return false;
        }
        wait(guard, cv, deadline);
    }
}
