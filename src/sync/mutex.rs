//! Exclusion lock built on a binary semaphore.

use super::CountingSemaphore;
use crate::core::{Result, SpoolError};
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

/// Guards a value with a semaphore holding exactly one unit.
///
/// This lets the exclusion lock be a named, system-visible primitive like the
/// slot counters, while access to the guarded value stays safe.
#[derive(Debug)]
pub struct SemaphoreMutex<T> {
    lock: Box<dyn CountingSemaphore>,
    data: UnsafeCell<T>,
}

// Safety: the data is only reachable through a SemaphoreGuard, and at most one
// guard exists at a time because the semaphore starts with one unit and a
// unit is only returned when a guard is released.
unsafe impl<T: Send> Send for SemaphoreMutex<T> {}
unsafe impl<T: Send> Sync for SemaphoreMutex<T> {}

impl<T> SemaphoreMutex<T> {
    /// Wraps `data` behind `lock`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the semaphore reports a count other
    /// than one.
    pub fn new(lock: Box<dyn CountingSemaphore>, data: T) -> Result<Self> {
        match lock.value() {
            Some(1) | None => Ok(Self {
                lock,
                data: UnsafeCell::new(data),
            }),
            Some(other) => Err(SpoolError::invalid_config(
                lock.name(),
                format!("exclusion lock must start with 1 unit, found {}", other),
            )),
        }
    }

    /// Blocks until the lock is held.
    pub fn lock(&self) -> Result<SemaphoreGuard<'_, T>> {
        self.lock.acquire()?;
        Ok(SemaphoreGuard {
            mutex: self,
            released: false,
        })
    }

    /// The underlying semaphore.
    pub fn semaphore(&self) -> &dyn CountingSemaphore {
        self.lock.as_ref()
    }

    /// Consumes the lock, returning the data.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

/// Holds the lock until dropped or [`unlock`](SemaphoreGuard::unlock)ed.
pub struct SemaphoreGuard<'a, T> {
    mutex: &'a SemaphoreMutex<T>,
    released: bool,
}

impl<T> SemaphoreGuard<'_, T> {
    /// Releases the lock, reporting a failed post.
    pub fn unlock(mut self) -> Result<()> {
        self.released = true;
        self.mutex.lock.release()
    }
}

impl<T> Deref for SemaphoreGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the guard holds the only unit of the lock.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for SemaphoreGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: the guard holds the only unit of the lock.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for SemaphoreGuard<'_, T> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.mutex.lock.release() {
            log::error!("failed to release {}: {}", self.mutex.lock.name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::LocalSemaphore;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_and_unlock() {
        let mutex = SemaphoreMutex::new(Box::new(LocalSemaphore::new("mutex", 1)), 0u32).unwrap();
        {
            let mut guard = mutex.lock().unwrap();
            *guard += 1;
            assert_eq!(mutex.semaphore().value(), Some(0));
            guard.unlock().unwrap();
        }
        assert_eq!(mutex.semaphore().value(), Some(1));

        {
            let mut guard = mutex.lock().unwrap();
            *guard += 1;
        }
        assert_eq!(mutex.semaphore().value(), Some(1));
        assert_eq!(mutex.into_inner(), 2);
    }

    #[test]
    fn test_rejects_non_binary_semaphore() {
        let result = SemaphoreMutex::new(Box::new(LocalSemaphore::new("mutex", 2)), ());
        assert!(matches!(
            result,
            Err(SpoolError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_exclusive_across_threads() {
        let mutex = Arc::new(
            SemaphoreMutex::new(Box::new(LocalSemaphore::new("mutex", 1)), 0u64).unwrap(),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&mutex);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut guard = m.lock().unwrap();
                        *guard += 1;
                        guard.unlock().unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*mutex.lock().unwrap(), 4000);
    }
}
