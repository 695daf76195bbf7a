//! POSIX named semaphores.

use super::CountingSemaphore;
use crate::core::{Result, SpoolError};
use std::ffi::CString;
use std::io;
use std::ptr::NonNull;
use std::time::Duration;

/// rw-r--r--
const PERMISSIONS: libc::mode_t = libc::S_IRUSR | libc::S_IWUSR | libc::S_IRGRP | libc::S_IROTH;

/// A system-wide semaphore opened with `sem_open`.
///
/// Creation unlinks any semaphore of the same name left over from a previous
/// run, then creates the name exclusively. Dropping closes and unlinks it.
#[derive(Debug)]
pub struct NamedSemaphore {
    name: String,
    c_name: CString,
    sem: NonNull<libc::sem_t>,
}

// Safety: a sem_t opened with sem_open may be used from any thread of the
// process; all access goes through the thread-safe sem_* calls.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Creates the semaphore `name` holding `initial` units.
    ///
    /// # Errors
    ///
    /// Returns `ResourceCreation` if the name is invalid, `initial` exceeds
    /// the semaphore maximum, or `sem_open` fails.
    pub fn create(name: &str, initial: usize) -> Result<Self> {
        let c_name = CString::new(name).map_err(|e| {
            SpoolError::resource_creation(name, io::Error::new(io::ErrorKind::InvalidInput, e))
        })?;
        let initial = libc::c_uint::try_from(initial)
            .ok()
            .filter(|&v| v <= i32::MAX as libc::c_uint)
            .ok_or_else(|| {
                SpoolError::resource_creation(
                    name,
                    io::Error::new(io::ErrorKind::InvalidInput, "initial value too large"),
                )
            })?;

        Self::unlink_stale(name, &c_name);

        // Safety: c_name is a valid NUL-terminated string; the variadic
        // arguments are the mode and initial value required with O_CREAT.
        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                PERMISSIONS as libc::c_uint,
                initial,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(SpoolError::resource_creation(
                name,
                io::Error::last_os_error(),
            ));
        }
        let sem = NonNull::new(sem).ok_or_else(|| {
            SpoolError::resource_creation(
                name,
                io::Error::new(io::ErrorKind::Other, "sem_open returned null"),
            )
        })?;

        log::debug!("opened named semaphore {} with value {}", name, initial);
        Ok(Self {
            name: name.to_string(),
            c_name,
            sem,
        })
    }

    /// Removes a semaphore left behind by a run that did not clean up.
    fn unlink_stale(name: &str, c_name: &CString) {
        // Safety: c_name is a valid NUL-terminated string.
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } == 0 {
            log::info!("removed stale named semaphore {}", name);
            return;
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ENOENT) {
            log::warn!("could not remove stale semaphore {}: {}", name, err);
        }
    }

    fn wait_error(&self, operation: &'static str) -> SpoolError {
        SpoolError::synchronization(&self.name, operation, io::Error::last_os_error())
    }

    fn deadline(timeout: Duration) -> Result<libc::timespec> {
        // Safety: timespec is plain data; clock_gettime fills it in.
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) } == -1 {
            return Err(SpoolError::synchronization(
                "CLOCK_REALTIME",
                "read clock",
                io::Error::last_os_error(),
            ));
        }
        ts.tv_sec = ts
            .tv_sec
            .saturating_add(timeout.as_secs().min(i32::MAX as u64) as libc::time_t);
        ts.tv_nsec += timeout.subsec_nanos() as libc::c_long;
        if ts.tv_nsec >= 1_000_000_000 {
            ts.tv_sec += 1;
            ts.tv_nsec -= 1_000_000_000;
        }
        Ok(ts)
    }
}

fn last_errno() -> Option<i32> {
    io::Error::last_os_error().raw_os_error()
}

impl CountingSemaphore for NamedSemaphore {
    fn acquire(&self) -> Result<()> {
        loop {
            // Safety: self.sem is a live semaphore until drop.
            if unsafe { libc::sem_wait(self.sem.as_ptr()) } == 0 {
                return Ok(());
            }
            if last_errno() != Some(libc::EINTR) {
                return Err(self.wait_error("wait"));
            }
        }
    }

    fn try_acquire(&self) -> Result<bool> {
        loop {
            // Safety: self.sem is a live semaphore until drop.
            if unsafe { libc::sem_trywait(self.sem.as_ptr()) } == 0 {
                return Ok(true);
            }
            match last_errno() {
                Some(libc::EAGAIN) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(self.wait_error("try-wait")),
            }
        }
    }

    fn acquire_timeout(&self, timeout: Duration) -> Result<bool> {
        let deadline = Self::deadline(timeout)?;
        loop {
            // Safety: self.sem is a live semaphore until drop; deadline is valid.
            if unsafe { libc::sem_timedwait(self.sem.as_ptr(), &deadline) } == 0 {
                return Ok(true);
            }
            match last_errno() {
                Some(libc::ETIMEDOUT) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(self.wait_error("timed-wait")),
            }
        }
    }

    fn release(&self) -> Result<()> {
        // Safety: self.sem is a live semaphore until drop.
        if unsafe { libc::sem_post(self.sem.as_ptr()) } == -1 {
            return Err(self.wait_error("post"));
        }
        Ok(())
    }

    fn value(&self) -> Option<usize> {
        let mut value: libc::c_int = 0;
        // Safety: self.sem is a live semaphore until drop.
        if unsafe { libc::sem_getvalue(self.sem.as_ptr(), &mut value) } == -1 {
            return None;
        }
        Some(value.max(0) as usize)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // Teardown keeps going past failures so the remaining names are released.
        // Safety: self.sem was returned by sem_open and is closed exactly once.
        if unsafe { libc::sem_close(self.sem.as_ptr()) } == -1 {
            log::error!(
                "failed to close semaphore {}: {}",
                self.name,
                io::Error::last_os_error()
            );
        }
        if unsafe { libc::sem_unlink(self.c_name.as_ptr()) } == 0 {
            log::debug!("released named semaphore {}", self.name);
            return;
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENOENT) {
            log::debug!("semaphore {} was already unlinked", self.name);
        } else {
            log::error!("failed to unlink semaphore {}: {}", self.name, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("/print-spool-test-{}-{}", std::process::id(), tag)
    }

    #[test]
    fn test_create_and_count() {
        let sem = NamedSemaphore::create(&unique_name("count"), 2).unwrap();
        assert_eq!(sem.value(), Some(2));
        assert!(sem.try_acquire().unwrap());
        assert!(sem.try_acquire().unwrap());
        assert!(!sem.try_acquire().unwrap());
        sem.release().unwrap();
        assert_eq!(sem.value(), Some(1));
    }

    #[test]
    fn test_stale_semaphore_is_replaced() {
        let name = unique_name("stale");
        let stale = NamedSemaphore::create(&name, 7).unwrap();

        // A second creation under the same name unlinks the first one's name
        // and starts from the requested value.
        let fresh = NamedSemaphore::create(&name, 1).unwrap();
        assert_eq!(fresh.value(), Some(1));
        assert_eq!(stale.value(), Some(7));

        drop(fresh);
        // The name is already gone when the stale handle closes.
        drop(stale);
    }

    #[test]
    fn test_timed_wait_expires() {
        let sem = NamedSemaphore::create(&unique_name("timeout"), 0).unwrap();
        assert!(!sem.acquire_timeout(Duration::from_millis(20)).unwrap());
        sem.release().unwrap();
        assert!(sem.acquire_timeout(Duration::from_millis(20)).unwrap());
    }

    #[test]
    fn test_invalid_name_rejected() {
        let result = NamedSemaphore::create("/bad\0name", 1);
        assert!(matches!(result, Err(SpoolError::ResourceCreation { .. })));
    }
}
