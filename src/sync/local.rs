//! In-process counting semaphore.

use super::CountingSemaphore;
use crate::core::Result;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A counting semaphore built on a `parking_lot` mutex and condition variable.
#[derive(Debug)]
pub struct LocalSemaphore {
    name: String,
    permits: Mutex<usize>,
    available: Condvar,
}

impl LocalSemaphore {
    /// Creates a semaphore holding `permits` units.
    pub fn new(name: impl Into<String>, permits: usize) -> Self {
        Self {
            name: name.into(),
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }
}

impl CountingSemaphore for LocalSemaphore {
    fn acquire(&self) -> Result<()> {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
        Ok(())
    }

    fn try_acquire(&self) -> Result<bool> {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return Ok(false);
        }
        *permits -= 1;
        Ok(true)
    }

    fn acquire_timeout(&self, timeout: Duration) -> Result<bool> {
        // A deadline past the clock's range never expires
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.acquire()?;
            return Ok(true);
        };
        let mut permits = self.permits.lock();
        while *permits == 0 {
            if self
                .available
                .wait_until(&mut permits, deadline)
                .timed_out()
                && *permits == 0
            {
                return Ok(false);
            }
        }
        *permits -= 1;
        Ok(true)
    }

    fn release(&self) -> Result<()> {
        *self.permits.lock() += 1;
        self.available.notify_one();
        Ok(())
    }

    fn value(&self) -> Option<usize> {
        Some(*self.permits.lock())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_try_acquire_counts_down() {
        let sem = LocalSemaphore::new("test", 2);
        assert!(sem.try_acquire().unwrap());
        assert!(sem.try_acquire().unwrap());
        assert!(!sem.try_acquire().unwrap());
        assert_eq!(sem.value(), Some(0));

        sem.release().unwrap();
        assert_eq!(sem.value(), Some(1));
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let sem = Arc::new(LocalSemaphore::new("test", 0));

        let s = Arc::clone(&sem);
        let handle = thread::spawn(move || {
            s.acquire().unwrap();
        });

        // Give the waiter a chance to block
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());

        sem.release().unwrap();
        handle.join().unwrap();
        assert_eq!(sem.value(), Some(0));
    }

    #[test]
    fn test_acquire_timeout_expires() {
        let sem = LocalSemaphore::new("test", 0);
        let start = Instant::now();
        assert!(!sem.acquire_timeout(Duration::from_millis(20)).unwrap());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_acquire_timeout_succeeds_when_released() {
        let sem = Arc::new(LocalSemaphore::new("test", 0));

        let s = Arc::clone(&sem);
        let handle = thread::spawn(move || s.acquire_timeout(Duration::from_secs(5)).unwrap());

        thread::sleep(Duration::from_millis(10));
        sem.release().unwrap();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_unbounded_timeout_waits_for_release() {
        let sem = Arc::new(LocalSemaphore::new("test", 0));

        let s = Arc::clone(&sem);
        let handle = thread::spawn(move || s.acquire_timeout(Duration::MAX).unwrap());

        thread::sleep(Duration::from_millis(10));
        assert!(!handle.is_finished());
        sem.release().unwrap();
        assert!(handle.join().unwrap());
        assert_eq!(sem.value(), Some(0));

        // Also when a unit is already available
        sem.release().unwrap();
        assert!(sem.acquire_timeout(Duration::MAX).unwrap());
    }
}
