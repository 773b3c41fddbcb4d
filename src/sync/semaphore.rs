use parking_lot::{Condvar, Mutex};

use super::{Deadline, wait_until};

/// Limits the number of threads that can hold a slot at the same time.
///
/// Slots are returned by dropping the [`SemaphoreGuard`], so the free count
/// can never exceed the capacity.
#[derive(Debug)]
pub struct Semaphore {
    free_slots: Mutex<usize>,
    slots_changed: Condvar,
    capacity: usize,
}

/// A held semaphore slot, released on drop.
#[must_use = "the slot is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SemaphoreGuard<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    pub fn new(capacity: usize) -> Self {
        Self {
            free_slots: Mutex::new(capacity),
            slots_changed: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        *self.free_slots.lock()
    }

    /// Take a slot without blocking.
    pub fn try_acquire(&self) -> Option<SemaphoreGuard<'_>> {
        let mut free = self.free_slots.lock();
        if *free == 0 {
            return None;
        }
        *free -= 1;
        Some(SemaphoreGuard { semaphore: self })
    }

    /// Block until a slot is free and take it.
    pub fn acquire(&self) -> SemaphoreGuard<'_> {
        let mut free = self.free_slots.lock();
        self.slots_changed.wait_while(&mut free, |free| *free == 0);
        *free -= 1;
        SemaphoreGuard { semaphore: self }
    }

    /// Take a slot, giving up once `deadline` expires.
    pub fn acquire_until(&self, deadline: Deadline) -> Option<SemaphoreGuard<'_>> {
        let mut free = self.free_slots.lock();
        if !wait_until(&mut free, &self.slots_changed, deadline, |free| *free > 0) {
            return None;
        }
        *free -= 1;
        Some(SemaphoreGuard { semaphore: self })
    }

    fn release(&self) {
        let mut free = self.free_slots.lock();
        debug_assert!(*free < self.capacity, "semaphore released more than acquired");
        *free += 1;
        drop(free);
        self.slots_changed.notify_one();
    }
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}
